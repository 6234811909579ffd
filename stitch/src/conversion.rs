//! Ranking, unification and application of type conversions.
//!
//! Every operand list that must agree on a type goes through [`unify`]: each candidate type is scored by the sum of the
//! ranks of converting every operand to it, and the cheapest candidate wins. Automatic conversions (abstract numbers
//! settling on a concrete type) are always allowed; implicit ones (casts, pointer reference and dereference) only when
//! the caller allows them, and casts are reported as diagnostics.

use crate::{
  context::ResolutionCtx,
  error::{Error, Result},
  snippet::{Origin, Snippet, Value},
  stitch,
  types::{DataType, ScalarKind},
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConversionAction {
  None,
  Cast(DataType),
  Ref,
  Deref,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConversionResult {
  pub target: DataType,
  pub actions: Vec<ConversionAction>,
  pub has_implicit_conversions: bool,
}

/// Cost of converting `src` to `dst`, with the action realizing it, or `None` if no conversion exists.
pub fn rank(src: &DataType, dst: &DataType, allow_implicit: bool) -> Option<(u32, ConversionAction)> {
  let (src, dst) = (src.undecorated(), dst.undecorated());

  if src == dst {
    return Some((0, ConversionAction::None));
  }

  if let Some(cost) = automatic_rank(src, dst) {
    return Some((cost, ConversionAction::None));
  }

  if !allow_implicit {
    return None;
  }

  if let DataType::Pointer { inner, .. } = src {
    if inner.undecorated() == dst {
      return Some((0, ConversionAction::Deref));
    }
  }

  if let DataType::Pointer { inner, .. } = dst {
    if inner.undecorated() == src {
      return Some((1, ConversionAction::Ref));
    }
  }

  cast_rank(src, dst).map(|cost| (cost, ConversionAction::Cast(dst.clone())))
}

fn automatic_rank(src: &DataType, dst: &DataType) -> Option<u32> {
  match (src, dst) {
    (DataType::Scalar(s), DataType::Scalar(d)) => scalar_automatic_rank(*s, *d),

    (DataType::Vector { dim: a, component: s }, DataType::Vector { dim: b, component: d })
    | (DataType::Matrix { dim: a, component: s }, DataType::Matrix { dim: b, component: d })
      if a == b =>
    {
      scalar_automatic_rank(*s, *d)
    }

    (DataType::Array { element: s, count: a }, DataType::Array { element: d, count: b }) if a == b => {
      automatic_rank(s.undecorated(), d.undecorated())
    }

    _ => None,
  }
}

fn scalar_automatic_rank(src: ScalarKind, dst: ScalarKind) -> Option<u32> {
  use ScalarKind::*;

  match (src, dst) {
    (s, d) if s == d => Some(0),
    (AbstractFloat, F32) => Some(1),
    (AbstractFloat, F16) => Some(2),
    (AbstractInt, I32) => Some(3),
    (AbstractInt, U32) => Some(4),
    (AbstractInt, AbstractFloat) => Some(5),
    (AbstractInt, F32) => Some(6),
    (AbstractInt, F16) => Some(7),
    _ => None,
  }
}

fn cast_rank(src: &DataType, dst: &DataType) -> Option<u32> {
  match (src, dst) {
    (DataType::Scalar(s), DataType::Scalar(d)) => scalar_cast_rank(*s, *d),

    (DataType::Vector { dim: a, component: s }, DataType::Vector { dim: b, component: d })
    | (DataType::Matrix { dim: a, component: s }, DataType::Matrix { dim: b, component: d })
      if a == b =>
    {
      scalar_cast_rank(*s, *d)
    }

    _ => None,
  }
}

fn scalar_cast_rank(src: ScalarKind, dst: ScalarKind) -> Option<u32> {
  match (src, dst) {
    (ScalarKind::AbstractFloat, ScalarKind::I32) => Some(1),
    (ScalarKind::AbstractFloat, ScalarKind::U32) => Some(2),
    (s, d) => {
      let (s, d) = (preference(s)?, preference(d)?);
      Some(if d <= s { 10 } else { 20 })
    }
  }
}

/// Cast preference; lower is preferred.
fn preference(kind: ScalarKind) -> Option<u8> {
  match kind {
    ScalarKind::F32 => Some(0),
    ScalarKind::F16 => Some(1),
    ScalarKind::I32 => Some(2),
    ScalarKind::U32 => Some(3),
    ScalarKind::Bool => Some(4),
    _ => None,
  }
}

/// Find the cheapest type every input converts to.
///
/// Candidates are the distinct undecorated inputs in first-seen order, or `restrict_to` if given. Ties go to the first
/// candidate.
pub fn unify(types: &[DataType], restrict_to: Option<&[DataType]>, allow_implicit: bool) -> Option<ConversionResult> {
  if types.iter().any(DataType::is_unknown) {
    return None;
  }

  let candidates: Vec<DataType> = match restrict_to {
    Some(restrict_to) => restrict_to.iter().map(|ty| ty.undecorated().clone()).collect(),
    None => {
      let mut unique: Vec<DataType> = Vec::new();

      for ty in types {
        let ty = ty.undecorated();
        if !unique.contains(ty) {
          unique.push(ty.clone());
        }
      }

      unique
    }
  };

  let mut best: Option<(u32, DataType, Vec<ConversionAction>)> = None;

  for candidate in candidates {
    let mut total = 0;
    let mut actions = Vec::with_capacity(types.len());

    let compatible = types.iter().all(|ty| match rank(ty, &candidate, allow_implicit) {
      Some((cost, action)) => {
        total += cost;
        actions.push(action);
        true
      }

      None => false,
    });

    if compatible && best.as_ref().map_or(true, |(cost, ..)| total < *cost) {
      best = Some((total, candidate, actions));
    }
  }

  best.map(|(_, target, actions)| {
    let has_implicit_conversions = actions.iter().any(|action| matches!(action, ConversionAction::Cast(_)));

    ConversionResult {
      target,
      actions,
      has_implicit_conversions,
    }
  })
}

/// Apply a conversion action to a snippet, producing a snippet of type `target`.
pub fn apply(ctx: &mut ResolutionCtx, snippet: Snippet, action: &ConversionAction, target: &DataType) -> Result<Snippet> {
  match action {
    ConversionAction::None => retype(snippet, target),

    ConversionAction::Cast(to) => {
      if let Some(value) = snippet.as_const() {
        let value = value
          .cast(&snippet.ty, to)
          .map_err(|message| Error::HostEvaluation {
            function: to.to_string(),
            message,
          })?;
        return Ok(Snippet::constant(value, to.clone()));
      }

      let code = stitch!(ctx, "{}({})", to, snippet);
      Ok(Snippet::runtime(code, to.clone()))
    }

    ConversionAction::Deref => match snippet.ty.undecorated() {
      DataType::Pointer { space, access, .. } => {
        let origin = Origin::RuntimeRef {
          space: *space,
          access: *access,
        };
        let code = stitch!(ctx, "(*{})", snippet);
        Ok(Snippet::new(Value::Code(code), target.clone(), origin))
      }

      _ => Err(Error::Conversion {
        from: snippet.ty,
        to: target.clone(),
      }),
    },

    ConversionAction::Ref => {
      let code = stitch!(ctx, "(&{})", snippet);
      Ok(Snippet::runtime(code, target.clone()))
    }
  }
}

/// Change the type of a snippet without emitting anything; constants are normalized to the new type.
fn retype(snippet: Snippet, target: &DataType) -> Result<Snippet> {
  if snippet.ty.undecorated() == target.undecorated() {
    return Ok(snippet);
  }

  match snippet.value {
    Value::Const(value) => {
      let value = value
        .cast(&snippet.ty, target)
        .map_err(|message| Error::HostEvaluation {
          function: target.to_string(),
          message,
        })?;
      Ok(Snippet::new(Value::Const(value), target.clone(), snippet.origin))
    }

    value => Ok(Snippet::new(value, target.clone(), snippet.origin)),
  }
}

/// Convert every snippet to the common type of all of them.
///
/// Returns `Ok(None)` when there is no common type.
pub fn convert_to_common_type(
  ctx: &mut ResolutionCtx,
  snippets: Vec<Snippet>,
  restrict_to: Option<&[DataType]>,
  allow_implicit: bool,
) -> Result<Option<Vec<Snippet>>> {
  let types: Vec<DataType> = snippets.iter().map(|s| s.ty.clone()).collect();

  let result = match unify(&types, restrict_to, allow_implicit) {
    Some(result) => result,
    None => return Ok(None),
  };

  if result.has_implicit_conversions {
    report_casts(ctx, &types, &result.actions);
  }

  snippets
    .into_iter()
    .zip(&result.actions)
    .map(|(snippet, action)| apply(ctx, snippet, action, &result.target))
    .collect::<Result<Vec<_>>>()
    .map(Some)
}

/// Convert a snippet to `target`, implicitly if needed.
pub fn try_convert(ctx: &mut ResolutionCtx, snippet: Snippet, target: &DataType) -> Result<Snippet> {
  let mut converted = convert_all(ctx, vec![snippet], std::slice::from_ref(target))?;
  converted.pop().ok_or_else(|| Error::InvalidConstruct("empty conversion".to_owned()))
}

/// Convert each snippet to the target at the same position; all casts are reported as a single diagnostic.
pub fn convert_all(ctx: &mut ResolutionCtx, snippets: Vec<Snippet>, targets: &[DataType]) -> Result<Vec<Snippet>> {
  let mut plan = Vec::with_capacity(snippets.len());

  for (snippet, target) in snippets.iter().zip(targets) {
    let (_, action) = rank(&snippet.ty, target, true).ok_or_else(|| Error::Conversion {
      from: snippet.ty.clone(),
      to: target.clone(),
    })?;
    plan.push(action);
  }

  if plan.iter().any(|action| matches!(action, ConversionAction::Cast(_))) {
    let types: Vec<DataType> = snippets.iter().map(|s| s.ty.clone()).collect();
    report_casts(ctx, &types, &plan);
  }

  snippets
    .into_iter()
    .zip(plan.iter().zip(targets))
    .map(|(snippet, (action, target))| apply(ctx, snippet, action, target.undecorated()))
    .collect()
}

/// Explicit conversion, as written with a type constructor: never reported.
pub fn cast(ctx: &mut ResolutionCtx, snippet: Snippet, target: &DataType) -> Result<Snippet> {
  let snippet = deref_implicit(ctx, snippet)?;

  match rank(&snippet.ty, target, true) {
    Some((_, ConversionAction::Ref)) | None => Err(Error::Conversion {
      from: snippet.ty,
      to: target.clone(),
    }),
    Some((_, action)) => apply(ctx, snippet, &action, target.undecorated()),
  }
}

/// Dereference a snippet typed with an implicit pointer; other snippets are returned unchanged.
pub fn deref_implicit(ctx: &mut ResolutionCtx, snippet: Snippet) -> Result<Snippet> {
  match snippet.ty.undecorated() {
    DataType::Pointer {
      inner, implicit: true, ..
    } => {
      let inner = inner.undecorated().clone();
      apply(ctx, snippet, &ConversionAction::Deref, &inner)
    }

    _ => Ok(snippet),
  }
}

fn report_casts(ctx: &mut ResolutionCtx, types: &[DataType], actions: &[ConversionAction]) {
  let casts: Vec<String> = types
    .iter()
    .zip(actions)
    .filter_map(|(from, action)| match action {
      ConversionAction::Cast(to) => Some(format!("{} -> {}", from, to)),
      _ => None,
    })
    .collect();

  ctx.report_implicit_conversions(&casts.join(", "));
}
