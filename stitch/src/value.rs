//! Compile-time host values.

use crate::types::{DataType, ScalarKind};
use indexmap::IndexMap;

/// A value known while compiling.
///
/// Numbers are stored wide (`i64`, `f64`) whatever their shader type; the type carried next to the value (in a
/// [`Snippet`](crate::snippet::Snippet) or a [`Typed`](crate::dual::Typed)) decides how they are interpreted and printed.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
  Bool(bool),
  Int(i64),
  Float(f64),
  /// Strings exist on the host only; they have no shader representation.
  Str(String),
  /// Components of a vector, columns of a matrix or elements of an array.
  Composite(Vec<ConstValue>),
  Struct(IndexMap<String, ConstValue>),
}

impl ConstValue {
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      ConstValue::Int(i) => Some(*i as f64),
      ConstValue::Float(x) => Some(*x),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      ConstValue::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      ConstValue::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn components(&self) -> Option<&[ConstValue]> {
    match self {
      ConstValue::Composite(items) => Some(items),
      _ => None,
    }
  }

  /// Zero value of a type.
  pub fn zero(ty: &DataType) -> Option<Self> {
    match ty.undecorated() {
      DataType::Scalar(kind) => Some(Self::scalar_zero(*kind)),
      DataType::Vector { dim, component } => Some(ConstValue::Composite(vec![
        Self::scalar_zero(*component);
        *dim as usize
      ])),
      DataType::Matrix { dim, component } => {
        let column = DataType::vec(*dim, *component);
        Some(ConstValue::Composite(vec![Self::zero(&column)?; *dim as usize]))
      }
      DataType::Array {
        element,
        count: Some(count),
      } => Some(ConstValue::Composite(vec![Self::zero(element)?; *count as usize])),
      DataType::Struct(schema) => schema
        .schema()
        .fields()
        .iter()
        .map(|(name, ty)| Some((name.clone(), Self::zero(ty)?)))
        .collect::<Option<IndexMap<_, _>>>()
        .map(ConstValue::Struct),
      _ => None,
    }
  }

  fn scalar_zero(kind: ScalarKind) -> Self {
    match kind {
      ScalarKind::Bool => ConstValue::Bool(false),
      kind if kind.is_float() => ConstValue::Float(0.),
      _ => ConstValue::Int(0),
    }
  }

  /// Convert this value, typed `from`, to `to` the way the shader would.
  ///
  /// Identity and widening conversions only normalize the representation. Integer to integer casts of concrete types
  /// reinterpret bits (`i32(4294967295u)` is `-1`); float to integer casts truncate and saturate.
  pub fn cast(&self, from: &DataType, to: &DataType) -> Result<ConstValue, String> {
    match (from.undecorated(), to.undecorated()) {
      (DataType::Scalar(from), DataType::Scalar(to)) => self.cast_scalar(*from, *to),

      (DataType::Vector { component: from, .. }, DataType::Vector { component: to, .. })
      | (DataType::Matrix { component: from, .. }, DataType::Matrix { component: to, .. }) => {
        let from_ty = DataType::Scalar(*from);
        let to_ty = DataType::Scalar(*to);
        self.map_leaves(&mut |leaf: &ConstValue| leaf.cast(&from_ty, &to_ty))
      }

      (DataType::Array { element: from, .. }, DataType::Array { element: to, .. }) => match self {
        ConstValue::Composite(items) => items
          .iter()
          .map(|item| item.cast(from, to))
          .collect::<Result<_, _>>()
          .map(ConstValue::Composite),
        _ => Err(format!("`{:?}` is not an array value", self)),
      },

      (from, to) if from == to => Ok(self.clone()),

      (from, to) => Err(format!("cannot cast a constant of type `{}` to `{}`", from, to)),
    }
  }

  fn cast_scalar(&self, from: ScalarKind, to: ScalarKind) -> Result<ConstValue, String> {
    let overflow = || format!("{:?} does not fit in `{}`", self, to.name());

    match (self, to) {
      (ConstValue::Bool(b), ScalarKind::Bool) => Ok(ConstValue::Bool(*b)),
      (ConstValue::Bool(b), to) if to.is_float() => Ok(ConstValue::Float(if *b { 1. } else { 0. })),
      (ConstValue::Bool(b), _) => Ok(ConstValue::Int(*b as i64)),

      (value, ScalarKind::Bool) => match value {
        ConstValue::Int(i) => Ok(ConstValue::Bool(*i != 0)),
        ConstValue::Float(x) => Ok(ConstValue::Bool(*x != 0.)),
        _ => Err(format!("`{:?}` is not a scalar", value)),
      },

      (ConstValue::Int(i), to) if to.is_float() => Ok(ConstValue::Float(round_to(*i as f64, to))),
      (ConstValue::Float(x), to) if to.is_float() => Ok(ConstValue::Float(round_to(*x, to))),

      (ConstValue::Int(i), ScalarKind::AbstractInt) => Ok(ConstValue::Int(*i)),
      (ConstValue::Int(i), ScalarKind::I32) => match from {
        ScalarKind::U32 => Ok(ConstValue::Int(*i as u32 as i32 as i64)),
        _ => i32::try_from(*i).map(|i| ConstValue::Int(i as i64)).map_err(|_| overflow()),
      },
      (ConstValue::Int(i), ScalarKind::U32) => match from {
        ScalarKind::I32 => Ok(ConstValue::Int(*i as i32 as u32 as i64)),
        _ => u32::try_from(*i).map(|i| ConstValue::Int(i as i64)).map_err(|_| overflow()),
      },

      (ConstValue::Float(x), ScalarKind::AbstractInt) => {
        if x.fract() == 0. && x.abs() < 9.007_199_254_740_992e15 {
          Ok(ConstValue::Int(*x as i64))
        } else {
          Err(overflow())
        }
      }
      (ConstValue::Float(x), ScalarKind::I32) => Ok(ConstValue::Int(*x as i32 as i64)),
      (ConstValue::Float(x), ScalarKind::U32) => Ok(ConstValue::Int(*x as u32 as i64)),

      (value, to) => Err(format!("cannot cast `{:?}` to `{}`", value, to.name())),
    }
  }

  fn map_leaves(&self, f: &mut dyn FnMut(&ConstValue) -> Result<ConstValue, String>) -> Result<ConstValue, String> {
    match self {
      ConstValue::Composite(items) => items
        .iter()
        .map(|item| item.map_leaves(f))
        .collect::<Result<_, _>>()
        .map(ConstValue::Composite),
      leaf => f(leaf),
    }
  }

  /// Hashable form of this value; floats compare by bit pattern.
  pub(crate) fn key(&self) -> ConstKey {
    match self {
      ConstValue::Bool(b) => ConstKey::Bool(*b),
      ConstValue::Int(i) => ConstKey::Int(*i),
      ConstValue::Float(x) => ConstKey::Float(x.to_bits()),
      ConstValue::Str(s) => ConstKey::Str(s.clone()),
      ConstValue::Composite(items) => ConstKey::Composite(items.iter().map(ConstValue::key).collect()),
      ConstValue::Struct(fields) => {
        ConstKey::Struct(fields.iter().map(|(name, value)| (name.clone(), value.key())).collect())
      }
    }
  }
}

/// Round a host float to the precision of the target kind.
pub(crate) fn round_to(x: f64, kind: ScalarKind) -> f64 {
  match kind {
    ScalarKind::F32 => x as f32 as f64,
    ScalarKind::F16 => round_to_f16(x),
    _ => x,
  }
}

/// Largest finite `f16`.
const F16_MAX: f64 = 65504.;

/// Round to nearest `f16`, ties to even; overflow goes to infinity.
fn round_to_f16(x: f64) -> f64 {
  if !x.is_finite() || x == 0. {
    return x;
  }

  let a = x.abs();

  // 11 significant bits; below 2^-14 the spacing stays 2^-24
  let mut exp = (a.log2().floor() as i32).max(-14);
  if exp > -14 && 2f64.powi(exp) > a {
    exp -= 1;
  } else if 2f64.powi(exp + 1) <= a {
    exp += 1;
  }

  let quantum = 2f64.powi(exp - 10);
  let q = a / quantum;
  let floor = q.floor();
  let steps = match (q - floor).partial_cmp(&0.5) {
    Some(std::cmp::Ordering::Less) => floor,
    Some(std::cmp::Ordering::Greater) => floor + 1.,
    _ if floor % 2. == 0. => floor,
    _ => floor + 1.,
  };

  let rounded = steps * quantum;
  let rounded = if rounded > F16_MAX { f64::INFINITY } else { rounded };

  rounded.copysign(x)
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) enum ConstKey {
  Bool(bool),
  Int(i64),
  Float(u64),
  Str(String),
  Composite(Vec<ConstKey>),
  Struct(Vec<(String, ConstKey)>),
}

impl From<bool> for ConstValue {
  fn from(b: bool) -> Self {
    ConstValue::Bool(b)
  }
}

impl From<i32> for ConstValue {
  fn from(i: i32) -> Self {
    ConstValue::Int(i as i64)
  }
}

impl From<u32> for ConstValue {
  fn from(u: u32) -> Self {
    ConstValue::Int(u as i64)
  }
}

impl From<i64> for ConstValue {
  fn from(i: i64) -> Self {
    ConstValue::Int(i)
  }
}

impl From<f32> for ConstValue {
  fn from(x: f32) -> Self {
    ConstValue::Float(x as f64)
  }
}

impl From<f64> for ConstValue {
  fn from(x: f64) -> Self {
    ConstValue::Float(x)
  }
}

impl<T> From<Vec<T>> for ConstValue
where
  T: Into<ConstValue>,
{
  fn from(items: Vec<T>) -> Self {
    ConstValue::Composite(items.into_iter().map(Into::into).collect())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn scalar_casts() {
    let cast = |v: ConstValue, from: DataType, to: DataType| v.cast(&from, &to);

    assert_eq!(
      cast(ConstValue::Int(3), DataType::ABSTRACT_INT, DataType::F32),
      Ok(ConstValue::Float(3.))
    );
    assert_eq!(
      cast(ConstValue::Float(2.75), DataType::F32, DataType::I32),
      Ok(ConstValue::Int(2))
    );
    assert_eq!(
      cast(ConstValue::Int(4294967295), DataType::U32, DataType::I32),
      Ok(ConstValue::Int(-1))
    );
    assert_eq!(
      cast(ConstValue::Int(0), DataType::I32, DataType::BOOL),
      Ok(ConstValue::Bool(false))
    );
    assert!(cast(ConstValue::Int(1 << 40), DataType::ABSTRACT_INT, DataType::I32).is_err());
  }

  #[test]
  fn f16_precision() {
    let r = |x: f64| round_to(x, ScalarKind::F16);

    assert_eq!(r(1.), 1.);
    assert_eq!(r(0.1), 0.0999755859375);
    assert_eq!(r(-0.1), -0.0999755859375);

    // ties go to the even significand
    assert_eq!(r(1. + 2f64.powi(-11)), 1.);
    assert_eq!(r(1. + 3. * 2f64.powi(-11)), 1. + 2f64.powi(-9));

    assert_eq!(r(2049.), 2048.);
    assert_eq!(r(65519.), 65504.);
    assert_eq!(r(65520.), f64::INFINITY);
    assert_eq!(r(-1e6), f64::NEG_INFINITY);

    // subnormals
    assert_eq!(r(3e-8), 2f64.powi(-24));
    assert_eq!(r(1e-8), 0.);
    assert_eq!(r(2f64.powi(-14)), 2f64.powi(-14));

    let half = ConstValue::Float(0.1).cast(&DataType::ABSTRACT_FLOAT, &DataType::F16).unwrap();
    assert_eq!(half, ConstValue::Float(0.0999755859375));
  }

  #[test]
  fn vector_cast() {
    let v = ConstValue::from(vec![1, 2]);
    let from = DataType::vec(2, ScalarKind::I32);
    let to = DataType::vec(2, ScalarKind::F32);

    assert_eq!(v.cast(&from, &to), Ok(ConstValue::from(vec![1., 2.])));
  }

  #[test]
  fn zero_values() {
    assert_eq!(
      ConstValue::zero(&DataType::vec(2, ScalarKind::U32)),
      Some(ConstValue::from(vec![0, 0]))
    );
    assert_eq!(ConstValue::zero(&DataType::runtime_array(DataType::F32)), None);
  }
}
