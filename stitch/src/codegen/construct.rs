//! Type constructors, object literals and array literals.

use super::{copyable, generate_expression, stored, value_of};
use crate::{
  ast::Expr,
  context::ResolutionCtx,
  conversion,
  error::{Error, Result},
  snippet::{Origin, Snippet},
  stitch,
  stitch::Args,
  types::{DataType, ScalarKind},
  value::ConstValue,
};

/// Call of a type schema: zero value, conversion, copy or construction from parts.
pub(super) fn construct(ctx: &mut ResolutionCtx, ty: &DataType, args: &[Expr]) -> Result<Snippet> {
  match ty.undecorated() {
    DataType::Scalar(_) => match args {
      [] => zero(ty),
      [arg] => {
        let value = value_of(ctx, arg, None)?;
        conversion::cast(ctx, value, ty).map(temporary)
      }
      _ => Err(Error::ArityMismatch {
        what: ty.to_string(),
        expected: 1,
        found: args.len(),
      }),
    },

    DataType::Vector { dim, component } => {
      let parts = values(ctx, args)?;
      construct_vector(ctx, ty, *dim, *component, parts)
    }

    DataType::Matrix { dim, component } => {
      let parts = values(ctx, args)?;
      construct_matrix(ctx, ty, *dim, *component, parts)
    }

    DataType::Array { .. } | DataType::Struct(_) => construct_composite(ctx, ty, args),

    other => Err(Error::InvalidConstruct(format!("`{}` has no constructor", other))),
  }
}

fn values(ctx: &mut ResolutionCtx, args: &[Expr]) -> Result<Vec<Snippet>> {
  args.iter().map(|arg| value_of(ctx, arg, None)).collect()
}

fn zero(ty: &DataType) -> Result<Snippet> {
  ConstValue::zero(ty)
    .map(|value| Snippet::constant(value, ty.undecorated().clone()))
    .ok_or_else(|| Error::InvalidConstruct(format!("`{}` has no zero value", ty)))
}

/// The result of an explicit conversion is a value, never a location.
fn temporary(snippet: Snippet) -> Snippet {
  let origin = if snippet.is_constant() {
    Origin::Constant
  } else {
    Origin::Runtime
  };

  Snippet { origin, ..snippet }
}

fn construct_vector(
  ctx: &mut ResolutionCtx,
  ty: &DataType,
  dim: u8,
  component: ScalarKind,
  mut parts: Vec<Snippet>,
) -> Result<Snippet> {
  let ty = ty.undecorated();
  let scalar = DataType::Scalar(component);

  if parts.is_empty() {
    return zero(ty);
  }

  if parts.len() == 1 {
    match parts[0].ty.undecorated() {
      DataType::Scalar(_) => {
        let part = parts.remove(0);
        let part = conversion::cast(ctx, part, &scalar)?;

        if let Some(value) = part.as_const() {
          return Ok(Snippet::constant(
            ConstValue::Composite(vec![value.clone(); dim as usize]),
            ty.clone(),
          ));
        }

        let code = stitch!(ctx, "{}({})", ty, part);
        return Ok(Snippet::runtime(code, ty.clone()));
      }

      DataType::Vector { dim: d, .. } if *d == dim => {
        let part = parts.remove(0);
        return conversion::cast(ctx, part, ty).map(temporary);
      }

      _ => (),
    }
  }

  let mut found = 0;
  let mut converted = Vec::with_capacity(parts.len());

  for part in parts {
    let (target, count) = match part.ty.undecorated() {
      DataType::Scalar(_) => (scalar.clone(), 1),
      DataType::Vector { dim: d, .. } => (DataType::vec(*d, component), *d as usize),
      other => {
        return Err(Error::TypeMismatch(format!(
          "`{}` cannot be built from a `{}`",
          ty, other
        )))
      }
    };

    found += count;
    converted.push(conversion::cast(ctx, part, &target)?);
  }

  if found != dim as usize {
    return Err(Error::ArityMismatch {
      what: ty.to_string(),
      expected: dim as usize,
      found,
    });
  }

  let constants: Option<Vec<&ConstValue>> = converted.iter().map(Snippet::as_const).collect();

  if let Some(constants) = constants {
    let mut components = Vec::with_capacity(dim as usize);

    for value in constants {
      match value {
        ConstValue::Composite(items) => components.extend(items.iter().cloned()),
        scalar => components.push(scalar.clone()),
      }
    }

    return Ok(Snippet::constant(ConstValue::Composite(components), ty.clone()));
  }

  let code = stitch!(ctx, "{}({})", ty, Args(&converted));
  Ok(Snippet::runtime(code, ty.clone()))
}

fn construct_matrix(
  ctx: &mut ResolutionCtx,
  ty: &DataType,
  dim: u8,
  component: ScalarKind,
  mut parts: Vec<Snippet>,
) -> Result<Snippet> {
  let ty = ty.undecorated();
  let n = dim as usize;

  let is_column = |part: &Snippet| matches!(part.ty.undecorated(), DataType::Vector { dim: d, .. } if *d == dim);
  let is_scalar = |part: &Snippet| matches!(part.ty.undecorated(), DataType::Scalar(_));

  if parts.is_empty() {
    return zero(ty);
  }

  if parts.len() == 1 && matches!(parts[0].ty.undecorated(), DataType::Matrix { dim: d, .. } if *d == dim) {
    let part = parts.remove(0);
    return conversion::cast(ctx, part, ty).map(temporary);
  }

  let target = if parts.len() == n && parts.iter().all(is_column) {
    DataType::vec(dim, component)
  } else if parts.len() == n * n && parts.iter().all(is_scalar) {
    DataType::Scalar(component)
  } else {
    return Err(Error::ArityMismatch {
      what: ty.to_string(),
      expected: n,
      found: parts.len(),
    });
  };

  let converted = parts
    .into_iter()
    .map(|part| conversion::cast(ctx, part, &target))
    .collect::<Result<Vec<_>>>()?;

  let constants: Option<Vec<ConstValue>> = converted.iter().map(|part| part.as_const().cloned()).collect();

  if let Some(constants) = constants {
    let columns = if constants.len() == n {
      constants
    } else {
      constants
        .chunks(n)
        .map(|column| ConstValue::Composite(column.to_vec()))
        .collect()
    };

    return Ok(Snippet::constant(ConstValue::Composite(columns), ty.clone()));
  }

  let code = stitch!(ctx, "{}({})", ty, Args(&converted));
  Ok(Snippet::runtime(code, ty.clone()))
}

fn construct_composite(ctx: &mut ResolutionCtx, ty: &DataType, args: &[Expr]) -> Result<Snippet> {
  let ty = ty.undecorated();

  match args {
    [] => {
      if let DataType::Array { count: None, .. } = ty {
        return Err(runtime_sized(ty));
      }

      let code = stitch!(ctx, "{}()", ty);
      Ok(Snippet::runtime(code, ty.clone()))
    }

    [arg @ (Expr::Object(_) | Expr::Array(_))] => generate_expression(ctx, arg, Some(ty)),

    [arg] => {
      let value = value_of(ctx, arg, Some(ty))?;

      // copy construction
      if conversion::rank(&value.ty, ty, false).is_some() {
        let value = conversion::cast(ctx, value, ty)?;
        return Ok(temporary(value));
      }

      let members = members(ty, 1)?;
      let value = copyable(ctx, value, arg)?;
      let value = conversion::try_convert(ctx, value, &members[0])?;
      compose(ctx, ty, vec![value])
    }

    _ => {
      let members = members(ty, args.len())?;
      let parts = args
        .iter()
        .zip(&members)
        .map(|(arg, member)| stored(ctx, arg, member))
        .collect::<Result<Vec<_>>>()?;

      compose(ctx, ty, parts)
    }
  }
}

fn runtime_sized(ty: &DataType) -> Error {
  Error::InvalidConstruct(format!("runtime-sized `{}` cannot be constructed", ty))
}

/// Types of the parts of a struct or fixed-size array built from `count` values.
fn members(ty: &DataType, count: usize) -> Result<Vec<DataType>> {
  let members: Vec<DataType> = match ty.undecorated() {
    DataType::Struct(schema) => schema.schema().fields().values().cloned().collect(),
    DataType::Array {
      element,
      count: Some(len),
    } => vec![element.as_ref().clone(); *len as usize],
    DataType::Array { count: None, .. } => return Err(runtime_sized(ty)),
    other => return Err(Error::InvalidConstruct(format!("`{}` is not a struct or an array", other))),
  };

  if members.len() != count {
    return Err(Error::ArityMismatch {
      what: ty.to_string(),
      expected: members.len(),
      found: count,
    });
  }

  Ok(members)
}

/// A struct or an array from converted parts; folded if every part is constant.
fn compose(ctx: &mut ResolutionCtx, ty: &DataType, parts: Vec<Snippet>) -> Result<Snippet> {
  let constants: Option<Vec<ConstValue>> = parts.iter().map(|part| part.as_const().cloned()).collect();

  if let Some(constants) = constants {
    let value = match ty.undecorated() {
      DataType::Struct(schema) => ConstValue::Struct(schema.schema().fields().keys().cloned().zip(constants).collect()),
      _ => ConstValue::Composite(constants),
    };

    return Ok(Snippet::constant(value, ty.clone()));
  }

  let code = stitch!(ctx, "{}({})", ty, Args(&parts));
  Ok(Snippet::runtime(code, ty.clone()))
}

pub(super) fn generate_object(
  ctx: &mut ResolutionCtx,
  fields: &[(String, Expr)],
  expected: Option<&DataType>,
) -> Result<Snippet> {
  let ty = match expected.map(DataType::undecorated) {
    Some(ty @ DataType::Struct(_)) => ty.clone(),
    _ => {
      return Err(Error::InvalidConstruct(format!(
        "the type of `{}` is unknown here; wrap it in a struct constructor, as in `Type({})`",
        Expr::Object(fields.to_vec()),
        Expr::Object(fields.to_vec())
      )))
    }
  };

  let schema = match &ty {
    DataType::Struct(schema) => schema.clone(),
    _ => return Err(Error::TypeMismatch(format!("`{}` is not a struct", ty))),
  };
  let schema = schema.schema();

  let given = |name: &str| fields.iter().find(|(field, _)| field == name).map(|(_, value)| value);

  let missing: Vec<String> = schema.fields().keys().filter(|name| given(name.as_str()).is_none()).cloned().collect();
  let unexpected: Vec<String> = fields
    .iter()
    .filter(|(name, _)| schema.field(name).is_none())
    .map(|(name, _)| name.clone())
    .collect();

  if !missing.is_empty() || !unexpected.is_empty() {
    return Err(Error::FieldMismatch {
      ty: schema.name().to_owned(),
      missing,
      unexpected,
    });
  }

  let mut parts = Vec::with_capacity(fields.len());

  for (name, field_ty) in schema.fields() {
    let value = given(name).ok_or_else(|| Error::InvalidConstruct(format!("missing field `{}`", name)))?;
    parts.push(stored(ctx, value, field_ty)?);
  }

  compose(ctx, &ty, parts)
}

pub(super) fn generate_array(ctx: &mut ResolutionCtx, items: &[Expr], expected: Option<&DataType>) -> Result<Snippet> {
  if items.is_empty() {
    return Err(Error::InvalidConstruct(
      "an empty array literal has no type; use the zero value of an array type instead".to_owned(),
    ));
  }

  if let Some(ty @ DataType::Array { .. }) = expected.map(DataType::undecorated) {
    let members = members(ty, items.len())?;
    let parts = items
      .iter()
      .zip(&members)
      .map(|(item, member)| stored(ctx, item, member))
      .collect::<Result<Vec<_>>>()?;

    return compose(ctx, ty, parts);
  }

  // without an expected type, elements settle on a common type without casts
  let parts = items
    .iter()
    .map(|item| {
      let part = generate_expression(ctx, item, None)?;
      copyable(ctx, part, item)
    })
    .collect::<Result<Vec<_>>>()?;

  let types: Vec<DataType> = parts.iter().map(|part| part.ty.clone()).collect();
  let element = conversion::unify(&types, None, false)
    .map(|result| result.target.concretize())
    .ok_or_else(|| Error::NoCommonType {
      context: "the elements of an array literal".to_owned(),
      types: types.clone(),
    })?;

  if element.is_void() || element.is_unknown() {
    return Err(Error::Capability {
      what: Expr::Array(items.to_vec()).to_string(),
      reason: format!("arrays cannot hold `{}` values", element),
    });
  }

  let ty = DataType::array(element.clone(), items.len() as u32);
  let parts = conversion::convert_all(ctx, parts, &vec![element; items.len()])?;
  compose(ctx, &ty, parts)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{compile::CompileOptions, snippet::Value};

  fn ctx() -> ResolutionCtx {
    ResolutionCtx::new(CompileOptions::default())
  }

  fn text(snippet: &Snippet) -> &str {
    match &snippet.value {
      Value::Code(code) => code,
      other => panic!("expected code, found {:?}", other),
    }
  }

  fn argument(name: &str, ty: DataType) -> Snippet {
    Snippet::new(Value::Code(name.to_owned()), ty, Origin::Argument)
  }

  #[test]
  fn vectors_count_components() {
    let mut ctx = ctx();
    ctx.define("xy", argument("xy", DataType::vec(2, ScalarKind::F32)));

    let vec4f = DataType::vec(4, ScalarKind::F32);
    let v = construct(&mut ctx, &vec4f, &[Expr::ident("xy"), Expr::Int(0), Expr::Int(1)]).unwrap();
    assert_eq!(text(&v), "vec4f(xy, 0f, 1f)");

    let err = construct(&mut ctx, &vec4f, &[Expr::ident("xy"), Expr::Int(0)]).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { expected: 4, found: 3, .. }));
  }

  #[test]
  fn constant_vectors_fold() {
    let mut ctx = ctx();
    let vec3f = DataType::vec(3, ScalarKind::F32);

    let splat = construct(&mut ctx, &vec3f, &[Expr::Float(0.5)]).unwrap();
    assert_eq!(splat.as_const(), Some(&ConstValue::from(vec![0.5, 0.5, 0.5])));

    let zero = construct(&mut ctx, &vec3f, &[]).unwrap();
    assert_eq!(zero.as_const(), Some(&ConstValue::from(vec![0., 0., 0.])));
  }

  #[test]
  fn scalar_casts() {
    let mut ctx = ctx();
    ctx.define("i", argument("i", DataType::I32));

    let f = construct(&mut ctx, &DataType::F32, &[Expr::ident("i")]).unwrap();
    assert_eq!(text(&f), "f32(i)");
    assert!(ctx.diagnostics().is_empty());

    let u = construct(&mut ctx, &DataType::U32, &[Expr::Float(2.7)]).unwrap();
    assert_eq!(u.as_const(), Some(&ConstValue::Int(2)));
  }

  #[test]
  fn object_literals() {
    let mut ctx = ctx();
    let light = DataType::structure("Light", [("power", DataType::F32), ("on", DataType::BOOL)]);
    ctx.define("p", argument("p", DataType::F32));

    let lit = Expr::object([("power", Expr::ident("p")), ("on", Expr::Bool(true))]);
    let value = construct(&mut ctx, &light, &[lit]).unwrap();
    assert_eq!(text(&value), "Light(p, true)");

    let missing = Expr::object([("power", Expr::Int(1))]);
    let err = construct(&mut ctx, &light, &[missing]).unwrap_err();
    assert!(matches!(err, Error::FieldMismatch { missing, .. } if missing == ["on"]));

    let untyped = generate_object(&mut ctx, &[("power".to_owned(), Expr::Int(1))], None).unwrap_err();
    assert!(matches!(untyped, Error::InvalidConstruct(_)));
  }

  #[test]
  fn array_literal_inference() {
    let mut ctx = ctx();

    let ints = generate_array(&mut ctx, &[Expr::Int(1), Expr::Int(2)], None).unwrap();
    assert_eq!(ints.ty, DataType::array(DataType::I32, 2));
    assert_eq!(ints.as_const(), Some(&ConstValue::from(vec![1, 2])));

    let floats = generate_array(&mut ctx, &[Expr::Int(1), Expr::Float(2.5)], None).unwrap();
    assert_eq!(floats.ty, DataType::array(DataType::F32, 2));

    ctx.define("v", argument("v", DataType::vec(2, ScalarKind::F32)));
    let mixed = generate_array(&mut ctx, &[Expr::ident("v"), Expr::Float(1.)], None).unwrap_err();
    assert!(matches!(mixed, Error::NoCommonType { .. }));

    assert!(generate_array(&mut ctx, &[], None).is_err());
  }

  #[test]
  fn array_literal_against_expected_type() {
    let mut ctx = ctx();
    let ty = DataType::array(DataType::U32, 3);

    let err = generate_array(&mut ctx, &[Expr::Int(1), Expr::Int(2)], Some(&ty)).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { expected: 3, found: 2, .. }));
  }

  #[test]
  fn composite_copies() {
    let mut ctx = ctx();
    let ty = DataType::array(DataType::F32, 2);
    ctx.define(
      "k",
      Snippet::new(Value::Const(vec![1., 2.].into()), ty.clone(), Origin::ConstantRef),
    );

    let copy = construct(&mut ctx, &ty, &[Expr::ident("k")]).unwrap();
    assert_eq!(copy.origin, Origin::Constant);

    let zero = construct(&mut ctx, &ty, &[]).unwrap();
    assert_eq!(text(&zero), "array<f32, 2>()");
  }
}
