//! Stitching: turning snippets, types and strings into target-language text.
//!
//! The [`stitch!`](crate::stitch!) macro is `format!` where every argument is resolved through the
//! [`ResolutionCtx`], so that values are printed as literals, types declare the structs they mention and late-bound
//! values are realized before being written.

use crate::{
  context::ResolutionCtx,
  error::{Error, Result},
  snippet::Snippet,
  types::{DataType, ScalarKind},
  value::ConstValue,
};

/// Anything that can be written as target-language text.
pub trait Stitch {
  fn stitch(&self, ctx: &mut ResolutionCtx) -> Result<String>;
}

impl Stitch for Snippet {
  fn stitch(&self, ctx: &mut ResolutionCtx) -> Result<String> {
    ctx.resolve(self)
  }
}

impl Stitch for DataType {
  fn stitch(&self, ctx: &mut ResolutionCtx) -> Result<String> {
    ctx.resolve_type(self)
  }
}

impl Stitch for str {
  fn stitch(&self, _: &mut ResolutionCtx) -> Result<String> {
    Ok(self.to_owned())
  }
}

impl Stitch for String {
  fn stitch(&self, _: &mut ResolutionCtx) -> Result<String> {
    Ok(self.clone())
  }
}

impl<T> Stitch for &T
where
  T: Stitch + ?Sized,
{
  fn stitch(&self, ctx: &mut ResolutionCtx) -> Result<String> {
    (**self).stitch(ctx)
  }
}

/// A comma-separated list of snippets.
pub struct Args<'a>(pub &'a [Snippet]);

impl Stitch for Args<'_> {
  fn stitch(&self, ctx: &mut ResolutionCtx) -> Result<String> {
    let mut out = String::new();

    for (i, arg) in self.0.iter().enumerate() {
      if i > 0 {
        out.push_str(", ");
      }

      out.push_str(&ctx.resolve(arg)?);
    }

    Ok(out)
  }
}

/// `format!` resolving every argument through a [`ResolutionCtx`]; returns early on resolution errors.
#[macro_export]
macro_rules! stitch {
  ($ctx:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
    format!($fmt, $($crate::stitch::Stitch::stitch(&$arg, &mut *$ctx)?),*)
  };
}

/// Largest integer the host represents exactly.
pub(crate) const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Literal text of a constant.
pub(crate) fn literal(ctx: &mut ResolutionCtx, value: &ConstValue, ty: &DataType) -> Result<String> {
  if let ConstValue::Str(s) = value {
    return Err(Error::Capability {
      what: format!("{:?}", s),
      reason: "strings have no WGSL representation".to_owned(),
    });
  }

  match ty.undecorated() {
    DataType::Scalar(kind) => scalar_literal(value, *kind),

    DataType::Vector { component, .. } => {
      let components = composite(value, ty)?
        .iter()
        .map(|c| scalar_literal(c, *component))
        .collect::<Result<Vec<_>>>()?;
      Ok(format!("{}({})", ctx.resolve_type(ty)?, components.join(", ")))
    }

    DataType::Matrix { component, .. } => {
      let mut scalars = Vec::new();

      for column in composite(value, ty)? {
        for c in composite(column, ty)? {
          scalars.push(scalar_literal(c, *component)?);
        }
      }

      Ok(format!("{}({})", ctx.resolve_type(ty)?, scalars.join(", ")))
    }

    DataType::Array { element, .. } => {
      let ty_text = ctx.resolve_type(ty)?;
      let elements = composite(value, ty)?
        .iter()
        .map(|e| literal(ctx, e, element))
        .collect::<Result<Vec<_>>>()?;
      Ok(format!("{}({})", ty_text, elements.join(", ")))
    }

    DataType::Struct(schema) => {
      let fields = match value {
        ConstValue::Struct(fields) => fields,
        _ => return Err(mismatch(value, ty)),
      };

      let name = ctx.resolve_type(ty)?;
      let mut values = Vec::with_capacity(fields.len());

      for (field, field_ty) in schema.schema().fields() {
        let field_value = fields.get(field).ok_or_else(|| mismatch(value, ty))?;
        values.push(literal(ctx, field_value, field_ty)?);
      }

      Ok(format!("{}({})", name, values.join(", ")))
    }

    _ => Err(mismatch(value, ty)),
  }
}

fn composite<'a>(value: &'a ConstValue, ty: &DataType) -> Result<&'a [ConstValue]> {
  value.components().ok_or_else(|| mismatch(value, ty))
}

fn mismatch(value: &ConstValue, ty: &DataType) -> Error {
  Error::Capability {
    what: format!("{:?}", value),
    reason: format!("it cannot be written as a `{}`", ty),
  }
}

fn scalar_literal(value: &ConstValue, kind: ScalarKind) -> Result<String> {
  let invalid = || Error::Capability {
    what: format!("{:?}", value),
    reason: format!("it cannot be written as a `{}`", kind.name()),
  };

  match kind {
    ScalarKind::Bool => value.as_bool().map(|b| b.to_string()).ok_or_else(invalid),

    ScalarKind::AbstractInt | ScalarKind::I32 | ScalarKind::U32 => {
      let i = value.as_i64().ok_or_else(invalid)?;
      Ok(format!("{}{}", i, kind.suffix().unwrap_or("")))
    }

    ScalarKind::AbstractFloat | ScalarKind::F32 | ScalarKind::F16 => {
      let x = value.as_f64().ok_or_else(invalid)?;

      if !x.is_finite() {
        return Err(Error::Capability {
          what: x.to_string(),
          reason: "non-finite floats cannot be written as literals".to_owned(),
        });
      }

      Ok(float_literal(x, kind))
    }
  }
}

fn float_literal(x: f64, kind: ScalarKind) -> String {
  let integral = x.fract() == 0. && x.abs() < 1e16;

  match kind.suffix() {
    Some(suffix) if integral => format!("{}{}", x as i64, suffix),
    Some(suffix) if kind == ScalarKind::F32 => format!("{:?}{}", x as f32, suffix),
    Some(suffix) => format!("{:?}{}", x, suffix),
    None if integral => format!("{:.1}", x),
    None => format!("{:?}", x),
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::compile::CompileOptions;

  fn lit(value: impl Into<ConstValue>, ty: DataType) -> String {
    let mut ctx = ResolutionCtx::new(CompileOptions::default());
    literal(&mut ctx, &value.into(), &ty).unwrap()
  }

  #[test]
  fn scalar_literals() {
    assert_eq!(lit(3, DataType::ABSTRACT_INT), "3");
    assert_eq!(lit(3, DataType::I32), "3i");
    assert_eq!(lit(3, DataType::U32), "3u");
    assert_eq!(lit(-2, DataType::I32), "-2i");
    assert_eq!(lit(1., DataType::F32), "1f");
    assert_eq!(lit(0.5, DataType::F32), "0.5f");
    assert_eq!(lit(0.1, DataType::F32), "0.1f");
    assert_eq!(lit(2., DataType::F16), "2h");
    assert_eq!(lit(1., DataType::ABSTRACT_FLOAT), "1.0");
    assert_eq!(lit(0.25, DataType::ABSTRACT_FLOAT), "0.25");
    assert_eq!(lit(true, DataType::BOOL), "true");
  }

  #[test]
  fn composite_literals() {
    assert_eq!(
      lit(vec![1., 2., 3.], DataType::vec(3, ScalarKind::F32)),
      "vec3f(1f, 2f, 3f)"
    );
    assert_eq!(lit(vec![1, 2], DataType::array(DataType::U32, 2)), "array<u32, 2>(1u, 2u)");
    assert_eq!(
      lit(
        ConstValue::Composite(vec![vec![1., 0.].into(), vec![0., 1.].into()]),
        DataType::mat(2, ScalarKind::F32)
      ),
      "mat2x2f(1f, 0f, 0f, 1f)"
    );
  }

  #[test]
  fn strings_have_no_literal() {
    let mut ctx = ResolutionCtx::new(CompileOptions::default());
    let err = literal(&mut ctx, &ConstValue::Str("hi".to_owned()), &DataType::Unknown).unwrap_err();

    assert!(matches!(err, Error::Capability { .. }));
  }
}
