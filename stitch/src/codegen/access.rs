//! Member and index access.

use super::{auto_deref, generate_expression, value_of};
use crate::{
  ast::Expr,
  context::ResolutionCtx,
  conversion,
  error::{Error, Result},
  snippet::{InfixDispatch, Origin, Snippet, Value},
  stdlib::ArithOp,
  stitch,
  swizzle::Swizzle,
  types::DataType,
  value::ConstValue,
};

pub(super) fn generate_member(ctx: &mut ResolutionCtx, object: &Expr, property: &str) -> Result<Snippet> {
  let target = generate_expression(ctx, object, None)?;

  if let Value::Namespace(namespace) = &target.value {
    let member = namespace
      .get(property)
      .cloned()
      .ok_or_else(|| Error::UnresolvedIdentifier(format!("{}.{}", namespace.name(), property)))?;
    return ctx.realize(member);
  }

  let target = auto_deref(ctx, target)?;
  let no_member = |ty: &DataType| Error::InvalidConstruct(format!("`{}` (of type `{}`) has no member `{}`", object, ty, property));

  match target.ty.undecorated().clone() {
    DataType::Struct(schema) => {
      let ty = schema.schema().field(property).cloned().ok_or_else(|| no_member(&target.ty))?;
      let origin = target.origin.project(&ty);

      if let Some(ConstValue::Struct(fields)) = target.as_const() {
        if let Some(value) = fields.get(property) {
          return Ok(Snippet::new(Value::Const(value.clone()), ty, origin));
        }
      }

      let code = stitch!(ctx, "{}.{}", target, property);
      Ok(Snippet::new(Value::Code(code), ty, origin))
    }

    DataType::Vector { dim, component } => {
      if let Some(op) = ArithOp::from_method(property) {
        return infix(ctx, op, target);
      }

      let swizzle = Swizzle::parse(property)?.ok_or_else(|| no_member(&target.ty))?;
      let ty = swizzle.result_type(dim, component)?;

      if let Some(ConstValue::Composite(components)) = target.as_const() {
        let picked: Option<Vec<ConstValue>> = swizzle
          .selectors()
          .iter()
          .map(|selector| components.get(selector.index()).cloned())
          .collect();

        if let Some(mut picked) = picked {
          let value = if picked.len() == 1 {
            picked.remove(0)
          } else {
            ConstValue::Composite(picked)
          };

          return Ok(Snippet::constant(value, ty));
        }
      }

      // a single component is still a location; a multi-letter swizzle is a temporary
      let origin = if swizzle.len() == 1 {
        target.origin
      } else {
        Origin::Runtime
      };

      let code = stitch!(ctx, "{}.{}", target, swizzle.to_string());
      Ok(Snippet::new(Value::Code(code), ty, origin))
    }

    DataType::Matrix { .. } => {
      if property == "columns" {
        let code = ctx.resolve(&target)?;
        return Ok(Snippet::new(Value::Columns(code), target.ty, target.origin));
      }

      match ArithOp::from_method(property) {
        Some(op) => infix(ctx, op, target),
        None => Err(no_member(&target.ty)),
      }
    }

    DataType::Array { count, .. } if property == "length" => match count {
      Some(count) => Ok(Snippet::constant(i64::from(count), DataType::ABSTRACT_INT)),
      None => {
        let code = stitch!(ctx, "arrayLength(&{})", target);
        Ok(Snippet::runtime(code, DataType::U32))
      }
    },

    _ => Err(no_member(&target.ty)),
  }
}

fn infix(ctx: &mut ResolutionCtx, op: ArithOp, lhs: Snippet) -> Result<Snippet> {
  let code = ctx.resolve(&lhs)?;

  Ok(Snippet::host(Value::Infix(InfixDispatch {
    op,
    lhs: code,
    lhs_ty: lhs.ty,
  })))
}

pub(super) fn generate_index(ctx: &mut ResolutionCtx, object: &Expr, index: &Expr) -> Result<Snippet> {
  let target = generate_expression(ctx, object, None)?;
  let target = auto_deref(ctx, target)?;

  let index_value = value_of(ctx, index, None)?;
  let index_ty = index_value.ty.clone();

  let index_types = if !index_ty.is_abstract() {
    vec![DataType::U32, DataType::I32]
  } else if index_value.as_const().and_then(ConstValue::as_i64).map_or(false, |i| i < 0) {
    // negative literals stay signed so that they reach the bounds check
    vec![DataType::I32]
  } else {
    vec![DataType::U32]
  };

  let index_value = conversion::convert_to_common_type(ctx, vec![index_value], Some(index_types.as_slice()), true)?
    .and_then(|mut converted| converted.pop())
    .ok_or_else(|| Error::TypeMismatch(format!("`{}` of type `{}` cannot be used as an index", index, index_ty)))?;

  let constant_index = index_value.as_const().and_then(ConstValue::as_i64);

  if let Value::Columns(matrix) = &target.value {
    let column = column_type(&target.ty)?;
    let code = stitch!(ctx, "{}[{}]", matrix, index_value);
    return Ok(Snippet::new(Value::Code(code), column, target.origin));
  }

  let (element, len) = match target.ty.undecorated() {
    DataType::Array { element, count } => (element.as_ref().clone(), *count),
    DataType::Vector { dim, component } => (DataType::Scalar(*component), Some(u32::from(*dim))),
    DataType::Matrix { dim, component } => (DataType::vec(*dim, *component), Some(u32::from(*dim))),
    other => {
      return Err(Error::TypeMismatch(format!(
        "`{}` of type `{}` cannot be indexed",
        object, other
      )))
    }
  };

  if let Some(i) = constant_index {
    let out_of_bounds = i < 0 || len.map_or(false, |len| i >= i64::from(len));

    if out_of_bounds {
      return Err(Error::InvalidConstruct(format!(
        "index {} is out of bounds for `{}` of type `{}`",
        i, object, target.ty
      )));
    }

    if let Some(ConstValue::Composite(items)) = target.as_const() {
      if let Some(item) = items.get(i as usize) {
        let origin = target.origin.project(&element);
        return Ok(Snippet::new(Value::Const(item.clone()), element, origin));
      }
    }
  }

  let origin = target.origin.project(&element);
  let code = stitch!(ctx, "{}[{}]", target, index_value);
  Ok(Snippet::new(Value::Code(code), element, origin))
}

fn column_type(matrix: &DataType) -> Result<DataType> {
  match matrix.undecorated() {
    DataType::Matrix { dim, component } => Ok(DataType::vec(*dim, *component)),
    other => Err(Error::TypeMismatch(format!("`{}` has no columns", other))),
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    compile::CompileOptions,
    types::{Access, AddressSpace, ScalarKind},
  };

  fn ctx() -> ResolutionCtx {
    ResolutionCtx::new(CompileOptions::default())
  }

  fn text(snippet: &Snippet) -> &str {
    match &snippet.value {
      Value::Code(code) => code,
      other => panic!("expected code, found {:?}", other),
    }
  }

  fn storage(access: Access) -> Origin {
    Origin::RuntimeRef {
      space: AddressSpace::Storage,
      access,
    }
  }

  #[test]
  fn swizzles() {
    let mut ctx = ctx();
    let vec4f = DataType::vec(4, ScalarKind::F32);
    ctx.define("v", Snippet::new(Value::Code("v".to_owned()), vec4f, storage(Access::ReadWrite)));

    let xy = generate_member(&mut ctx, &Expr::ident("v"), "xy").unwrap();
    assert_eq!(text(&xy), "v.xy");
    assert_eq!(xy.ty, DataType::vec(2, ScalarKind::F32));
    assert_eq!(xy.origin, Origin::Runtime);

    let r = generate_member(&mut ctx, &Expr::ident("v"), "r").unwrap();
    assert_eq!(r.ty, DataType::F32);
    assert!(r.origin.is_reference());

    assert!(matches!(
      generate_member(&mut ctx, &Expr::ident("v"), "xr"),
      Err(Error::MixedSwizzle(_))
    ));
  }

  #[test]
  fn constant_swizzles_fold() {
    let mut ctx = ctx();
    ctx.define("c", Snippet::constant(vec![1., 2., 3.], DataType::vec(3, ScalarKind::F32)));

    let zy = generate_member(&mut ctx, &Expr::ident("c"), "zy").unwrap();
    assert_eq!(zy.as_const(), Some(&ConstValue::from(vec![3., 2.])));
  }

  #[test]
  fn array_lengths() {
    let mut ctx = ctx();
    let fixed = DataType::array(DataType::F32, 8);
    let dynamic = DataType::runtime_array(DataType::F32);
    ctx.define("a", Snippet::new(Value::Code("a".to_owned()), fixed, storage(Access::Read)));
    ctx.define("b", Snippet::new(Value::Code("b".to_owned()), dynamic, storage(Access::Read)));

    let a = generate_member(&mut ctx, &Expr::ident("a"), "length").unwrap();
    assert_eq!(a.as_const(), Some(&ConstValue::Int(8)));

    let b = generate_member(&mut ctx, &Expr::ident("b"), "length").unwrap();
    assert_eq!(text(&b), "arrayLength(&b)");
    assert_eq!(b.ty, DataType::U32);
  }

  #[test]
  fn indexing() {
    let mut ctx = ctx();
    let fixed = DataType::array(DataType::U32, 4);
    ctx.define("a", Snippet::new(Value::Code("a".to_owned()), fixed, storage(Access::Read)));

    let first = generate_index(&mut ctx, &Expr::ident("a"), &Expr::Int(0)).unwrap();
    assert_eq!(text(&first), "a[0u]");
    assert_eq!(first.ty, DataType::U32);

    let err = generate_index(&mut ctx, &Expr::ident("a"), &Expr::Int(4)).unwrap_err();
    assert!(matches!(err, Error::InvalidConstruct(_)));

    let err = generate_index(&mut ctx, &Expr::ident("a"), &Expr::Int(-1)).unwrap_err();
    assert!(matches!(err, Error::InvalidConstruct(message) if message.contains("out of bounds")));
  }

  #[test]
  fn concrete_indices_keep_their_type() {
    let mut ctx = ctx();
    ctx.define(
      "a",
      Snippet::new(Value::Code("a".to_owned()), DataType::array(DataType::F32, 4), storage(Access::Read)),
    );
    ctx.define("i", Snippet::new(Value::Code("i".to_owned()), DataType::I32, Origin::Argument));
    ctx.define("u", Snippet::new(Value::Code("u".to_owned()), DataType::U32, Origin::Argument));

    let signed = generate_index(&mut ctx, &Expr::ident("a"), &Expr::ident("i")).unwrap();
    assert_eq!(text(&signed), "a[i]");

    let unsigned = generate_index(&mut ctx, &Expr::ident("a"), &Expr::ident("u")).unwrap();
    assert_eq!(text(&unsigned), "a[u]");
    assert!(ctx.diagnostics().is_empty());
  }

  #[test]
  fn constant_arrays_fold() {
    let mut ctx = ctx();
    let ty = DataType::array(DataType::F32, 3);
    ctx.define(
      "k",
      Snippet::new(Value::Const(vec![1., 2., 4.].into()), ty, Origin::ConstantRef),
    );

    let k2 = generate_index(&mut ctx, &Expr::ident("k"), &Expr::Int(2)).unwrap();
    assert_eq!(k2.as_const(), Some(&ConstValue::Float(4.)));
    assert_eq!(k2.origin, Origin::Constant);
  }

  #[test]
  fn matrix_columns() {
    let mut ctx = ctx();
    ctx.define("m", Snippet::runtime("m", DataType::mat(3, ScalarKind::F32)));

    let column = generate_index(&mut ctx, &Expr::member(Expr::ident("m"), "columns"), &Expr::Int(1)).unwrap();
    assert_eq!(text(&column), "m[1u]");
    assert_eq!(column.ty, DataType::vec(3, ScalarKind::F32));
  }
}
