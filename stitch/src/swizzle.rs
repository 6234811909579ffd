//! Vector swizzles (`v.xy`, `color.rgba`).

use crate::{
  error::{Error, Result},
  types::{DataType, ScalarKind},
};
use std::fmt;

/// Select a channel to extract from a vector.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwizzleSelector {
  /// Select the `.x` (or `.r`) channel.
  X,

  /// Select the `.y` (or `.g`) channel.
  Y,

  /// Select the `.z` (or `.b`) channel.
  Z,

  /// Select the `.w` (or `.a`) channel.
  W,
}

impl SwizzleSelector {
  pub const fn index(self) -> usize {
    match self {
      SwizzleSelector::X => 0,
      SwizzleSelector::Y => 1,
      SwizzleSelector::Z => 2,
      SwizzleSelector::W => 3,
    }
  }

  fn from_letter(c: char) -> Option<(Self, LetterSet)> {
    let selector = match c {
      'x' | 'r' => SwizzleSelector::X,
      'y' | 'g' => SwizzleSelector::Y,
      'z' | 'b' => SwizzleSelector::Z,
      'w' | 'a' => SwizzleSelector::W,
      _ => return None,
    };

    let set = if "xyzw".contains(c) {
      LetterSet::Xyzw
    } else {
      LetterSet::Rgba
    };

    Some((selector, set))
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LetterSet {
  Xyzw,
  Rgba,
}

impl LetterSet {
  fn letters(self) -> &'static [char; 4] {
    match self {
      LetterSet::Xyzw => &['x', 'y', 'z', 'w'],
      LetterSet::Rgba => &['r', 'g', 'b', 'a'],
    }
  }
}

/// One to four channels selected from a vector, all named from the same letter set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Swizzle {
  selectors: Vec<SwizzleSelector>,
  set: LetterSet,
}

impl Swizzle {
  /// Parse a property name as a swizzle.
  ///
  /// Returns `Ok(None)` if the name is not made of swizzle letters only, and an error if it mixes letter sets.
  pub fn parse(property: &str) -> Result<Option<Self>> {
    if property.is_empty() || property.len() > 4 {
      return Ok(None);
    }

    let mut selectors = Vec::with_capacity(property.len());
    let mut set = None;

    for c in property.chars() {
      let (selector, letter_set) = match SwizzleSelector::from_letter(c) {
        Some(found) => found,
        None => return Ok(None),
      };

      match set {
        Some(set) if set != letter_set => return Err(Error::MixedSwizzle(property.to_owned())),
        _ => set = Some(letter_set),
      }

      selectors.push(selector);
    }

    Ok(set.map(|set| Swizzle { selectors, set }))
  }

  pub fn selectors(&self) -> &[SwizzleSelector] {
    &self.selectors
  }

  pub fn len(&self) -> usize {
    self.selectors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.selectors.is_empty()
  }

  /// Type of this swizzle applied to a `dim`-component vector of `component`.
  pub fn result_type(&self, dim: u8, component: ScalarKind) -> Result<DataType> {
    if let Some(out_of_range) = self.selectors.iter().find(|s| s.index() >= dim as usize) {
      return Err(Error::InvalidConstruct(format!(
        "swizzle `.{}` selects channel `{}` of a {}-component vector",
        self,
        self.set.letters()[out_of_range.index()],
        dim
      )));
    }

    Ok(match self.len() {
      1 => DataType::Scalar(component),
      n => DataType::vec(n as u8, component),
    })
  }
}

impl fmt::Display for Swizzle {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let letters = self.set.letters();

    for selector in &self.selectors {
      write!(f, "{}", letters[selector.index()])?;
    }

    Ok(())
  }
}
