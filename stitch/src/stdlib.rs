//! Builtin operators, type schemas and the `std` namespace.
//!
//! Every builtin is a [`DualFn`]: it folds when its arguments are compile-time constants and emits a call otherwise.

use crate::{
  ast::UnaryOp,
  conversion,
  dual::{ArgConversion, DualFn, HostError, Typed},
  error::{Error, Result},
  snippet::{Namespace, Snippet, Value},
  stitch,
  stitch::Args,
  types::{DataType, ScalarKind, TextureType},
  value::{round_to, ConstValue},
};
use indexmap::IndexMap;
use std::rc::Rc;

/// Arithmetic operators, also available as `add`, `sub`, `mul`, `div` and `rem` methods on vectors and matrices.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
}

impl ArithOp {
  pub const fn symbol(self) -> &'static str {
    match self {
      ArithOp::Add => "+",
      ArithOp::Sub => "-",
      ArithOp::Mul => "*",
      ArithOp::Div => "/",
      ArithOp::Rem => "%",
    }
  }

  pub const fn method(self) -> &'static str {
    match self {
      ArithOp::Add => "add",
      ArithOp::Sub => "sub",
      ArithOp::Mul => "mul",
      ArithOp::Div => "div",
      ArithOp::Rem => "rem",
    }
  }

  pub fn from_method(name: &str) -> Option<Self> {
    match name {
      "add" => Some(ArithOp::Add),
      "sub" => Some(ArithOp::Sub),
      "mul" => Some(ArithOp::Mul),
      "div" => Some(ArithOp::Div),
      "rem" => Some(ArithOp::Rem),
      _ => None,
    }
  }
}

/// Operator duals, built once per context.
pub(crate) struct Operators {
  add: Rc<DualFn>,
  sub: Rc<DualFn>,
  mul: Rc<DualFn>,
  div: Rc<DualFn>,
  rem: Rc<DualFn>,
  neg: Rc<DualFn>,
  not: Rc<DualFn>,
  bit_not: Rc<DualFn>,
}

impl Operators {
  pub(crate) fn new() -> Self {
    Operators {
      add: Rc::new(arithmetic(ArithOp::Add)),
      sub: Rc::new(arithmetic(ArithOp::Sub)),
      mul: Rc::new(arithmetic(ArithOp::Mul)),
      div: Rc::new(arithmetic(ArithOp::Div)),
      rem: Rc::new(arithmetic(ArithOp::Rem)),
      neg: Rc::new(negation()),
      not: Rc::new(logical_not()),
      bit_not: Rc::new(bitwise_not()),
    }
  }

  pub(crate) fn arithmetic(&self, op: ArithOp) -> Rc<DualFn> {
    match op {
      ArithOp::Add => self.add.clone(),
      ArithOp::Sub => self.sub.clone(),
      ArithOp::Mul => self.mul.clone(),
      ArithOp::Div => self.div.clone(),
      ArithOp::Rem => self.rem.clone(),
    }
  }

  pub(crate) fn unary(&self, op: UnaryOp) -> Rc<DualFn> {
    match op {
      UnaryOp::Neg => self.neg.clone(),
      UnaryOp::Not => self.not.clone(),
      UnaryOp::BitNot => self.bit_not.clone(),
    }
  }
}

// operators

fn arithmetic(op: ArithOp) -> DualFn {
  DualFn::new(op.symbol(), move |ctx, args| {
    let ty = arithmetic_result(&args[0].ty, &args[1].ty);
    let code = stitch!(ctx, "({} {} {})", args[0], op.symbol(), args[1]);
    Ok(Snippet::runtime(code, ty))
  })
  .with_arity(2)
  .with_conversion(ArgConversion::PerPosition(Rc::new(move |types| {
    arithmetic_operands(op, types)
  })))
  .with_host(move |args| fold_arithmetic(op, args))
}

/// Operand types of an arithmetic operator: both sides share one scalar kind, with vector/scalar broadcasting and
/// matrix products.
fn arithmetic_operands(op: ArithOp, types: &[DataType]) -> Result<Vec<DataType>> {
  use DataType::*;

  let no_common = || Error::NoCommonType {
    context: format!("`{}`", op.symbol()),
    types: types.to_vec(),
  };

  let (lhs, rhs) = match types {
    [lhs, rhs] => (lhs.deref_implicit().undecorated(), rhs.deref_implicit().undecorated()),
    _ => return Err(no_common()),
  };

  let has_matrix = match (lhs, rhs) {
    (Matrix { dim: a, .. }, Matrix { dim: b, .. }) if a == b && op != ArithOp::Div && op != ArithOp::Rem => true,
    (Matrix { dim: a, .. }, Vector { dim: b, .. }) | (Vector { dim: a, .. }, Matrix { dim: b, .. })
      if a == b && op == ArithOp::Mul =>
    {
      true
    }
    (Matrix { .. }, Scalar(_)) | (Scalar(_), Matrix { .. }) if op == ArithOp::Mul => true,
    (Vector { dim: a, .. }, Vector { dim: b, .. }) if a == b => false,
    (Vector { .. }, Scalar(_)) | (Scalar(_), Vector { .. }) | (Scalar(_), Scalar(_)) => false,
    _ => return Err(no_common()),
  };

  let (l, r) = (lhs.component().ok_or_else(no_common)?, rhs.component().ok_or_else(no_common)?);
  let kind = common_kind(l, r).ok_or_else(no_common)?;

  if !kind.is_numeric() || (has_matrix && !kind.is_float()) {
    return Err(Error::TypeMismatch(format!(
      "`{}` cannot be applied to `{}` and `{}`",
      op.symbol(),
      lhs,
      rhs
    )));
  }

  Ok(vec![
    lhs.with_component(kind).ok_or_else(no_common)?,
    rhs.with_component(kind).ok_or_else(no_common)?,
  ])
}

fn common_kind(a: ScalarKind, b: ScalarKind) -> Option<ScalarKind> {
  conversion::unify(&[DataType::Scalar(a), DataType::Scalar(b)], None, true)?
    .target
    .component()
}

fn arithmetic_result(lhs: &DataType, rhs: &DataType) -> DataType {
  use DataType::*;

  match (lhs.undecorated(), rhs.undecorated()) {
    (Matrix { .. }, v @ Vector { .. }) | (v @ Vector { .. }, Matrix { .. }) => v.clone(),
    (m @ Matrix { .. }, _) | (_, m @ Matrix { .. }) => m.clone(),
    (v @ Vector { .. }, _) | (_, v @ Vector { .. }) => v.clone(),
    (l, _) => l.clone(),
  }
}

fn fold_arithmetic(op: ArithOp, args: &[Typed]) -> Result<Typed, HostError> {
  let (a, b) = match args {
    [a, b] => (a, b),
    _ => return Err(HostError::Unavailable),
  };

  let involves_matrix = |t: &Typed| matches!(t.ty.undecorated(), DataType::Matrix { .. });
  if involves_matrix(a) || involves_matrix(b) {
    return Err(HostError::Unavailable);
  }

  let ty = arithmetic_result(&a.ty, &b.ty);
  let kind = ty.component().ok_or(HostError::Unavailable)?;
  let value = broadcast(&a.value, &b.value, &|x, y| scalar_arithmetic(op, kind, x, y))?;

  Ok(Typed { value, ty })
}

fn scalar_arithmetic(op: ArithOp, kind: ScalarKind, x: &ConstValue, y: &ConstValue) -> Result<ConstValue, HostError> {
  if kind.is_float() {
    let (x, y) = (
      x.as_f64().ok_or(HostError::Unavailable)?,
      y.as_f64().ok_or(HostError::Unavailable)?,
    );

    let r = match op {
      ArithOp::Add => x + y,
      ArithOp::Sub => x - y,
      ArithOp::Mul => x * y,
      ArithOp::Div => x / y,
      ArithOp::Rem => x % y,
    };

    if !r.is_finite() {
      return Err(HostError::Failed(format!("`{} {} {}` is not a finite number", x, op.symbol(), y)));
    }

    return Ok(ConstValue::Float(round_to(r, kind)));
  }

  let (x, y) = (
    x.as_i64().ok_or(HostError::Unavailable)?,
    y.as_i64().ok_or(HostError::Unavailable)?,
  );

  if y == 0 && matches!(op, ArithOp::Div | ArithOp::Rem) {
    return Err(HostError::Failed(format!("`{} {} 0` divides by zero", x, op.symbol())));
  }

  let r = match op {
    ArithOp::Add => x.checked_add(y),
    ArithOp::Sub => x.checked_sub(y),
    ArithOp::Mul => x.checked_mul(y),
    ArithOp::Div => x.checked_div(y),
    ArithOp::Rem => x.checked_rem(y),
  };

  r.filter(|r| fits(*r, kind))
    .map(ConstValue::Int)
    .ok_or_else(|| HostError::Failed(format!("`{} {} {}` overflows `{}`", x, op.symbol(), y, kind.name())))
}

fn fits(i: i64, kind: ScalarKind) -> bool {
  match kind {
    ScalarKind::I32 => i32::try_from(i).is_ok(),
    ScalarKind::U32 => u32::try_from(i).is_ok(),
    _ => true,
  }
}

type ScalarFn<'a> = &'a dyn Fn(&ConstValue, &ConstValue) -> Result<ConstValue, HostError>;

/// Apply `f` componentwise, broadcasting scalars against composites.
fn broadcast(a: &ConstValue, b: &ConstValue, f: ScalarFn) -> Result<ConstValue, HostError> {
  match (a, b) {
    (ConstValue::Composite(xs), ConstValue::Composite(ys)) => xs
      .iter()
      .zip(ys)
      .map(|(x, y)| broadcast(x, y, f))
      .collect::<Result<_, _>>()
      .map(ConstValue::Composite),
    (ConstValue::Composite(xs), y) => xs
      .iter()
      .map(|x| broadcast(x, y, f))
      .collect::<Result<_, _>>()
      .map(ConstValue::Composite),
    (x, ConstValue::Composite(ys)) => ys
      .iter()
      .map(|y| broadcast(x, y, f))
      .collect::<Result<_, _>>()
      .map(ConstValue::Composite),
    (x, y) => f(x, y),
  }
}

fn map_scalars(
  value: &ConstValue,
  f: &dyn Fn(&ConstValue) -> Result<ConstValue, HostError>,
) -> Result<ConstValue, HostError> {
  match value {
    ConstValue::Composite(items) => items
      .iter()
      .map(|item| map_scalars(item, f))
      .collect::<Result<_, _>>()
      .map(ConstValue::Composite),
    scalar => f(scalar),
  }
}

fn single_operand<'a>(name: &str, types: &'a [DataType]) -> Result<&'a DataType> {
  match types {
    [ty] => Ok(ty.deref_implicit().undecorated()),
    _ => Err(Error::ArityMismatch {
      what: name.to_owned(),
      expected: 1,
      found: types.len(),
    }),
  }
}

fn negation() -> DualFn {
  DualFn::new("-", |ctx, args| {
    let code = stitch!(ctx, "(-{})", args[0]);
    Ok(Snippet::runtime(code, args[0].ty.clone()))
  })
  .with_arity(1)
  .with_conversion(ArgConversion::PerPosition(Rc::new(|types| {
    let ty = single_operand("-", types)?;

    match ty.component() {
      Some(kind) if kind.is_numeric() && kind != ScalarKind::U32 => Ok(vec![ty.clone()]),
      _ => Err(Error::TypeMismatch(format!("`-` cannot be applied to `{}`", ty))),
    }
  })))
  .with_host(|args| {
    let kind = args[0].ty.component().ok_or(HostError::Unavailable)?;
    let value = map_scalars(&args[0].value, &|x| match x {
      ConstValue::Float(x) => Ok(ConstValue::Float(-x)),
      ConstValue::Int(i) => i
        .checked_neg()
        .filter(|r| fits(*r, kind))
        .map(ConstValue::Int)
        .ok_or_else(|| HostError::Failed(format!("`-{}` overflows `{}`", i, kind.name()))),
      _ => Err(HostError::Unavailable),
    })?;

    Ok(Typed::new(value, args[0].ty.clone()))
  })
}

fn logical_not() -> DualFn {
  DualFn::new("!", |ctx, args| {
    let code = stitch!(ctx, "!{}", args[0]);
    Ok(Snippet::runtime(code, args[0].ty.clone()))
  })
  .with_arity(1)
  .with_conversion(ArgConversion::PerPosition(Rc::new(|types| {
    let ty = single_operand("!", types)?;
    let target = ty
      .with_component(ScalarKind::Bool)
      .filter(|t| !matches!(t, DataType::Matrix { .. }))
      .ok_or_else(|| Error::TypeMismatch(format!("`!` cannot be applied to `{}`", ty)))?;
    Ok(vec![target])
  })))
  .with_host(|args| {
    let value = map_scalars(&args[0].value, &|x| {
      x.as_bool().map(|b| ConstValue::Bool(!b)).ok_or(HostError::Unavailable)
    })?;
    Ok(Typed::new(value, args[0].ty.clone()))
  })
}

fn bitwise_not() -> DualFn {
  DualFn::new("~", |ctx, args| {
    let code = stitch!(ctx, "~{}", args[0]);
    Ok(Snippet::runtime(code, args[0].ty.clone()))
  })
  .with_arity(1)
  .with_conversion(ArgConversion::PerPosition(Rc::new(|types| {
    let ty = single_operand("~", types)?;

    match ty {
      DataType::Scalar(kind) | DataType::Vector { component: kind, .. } if kind.is_integer() => Ok(vec![ty.clone()]),
      _ => Err(Error::TypeMismatch(format!("`~` cannot be applied to `{}`", ty))),
    }
  })))
  .with_host(|args| {
    let kind = args[0].ty.component().ok_or(HostError::Unavailable)?;
    let value = map_scalars(&args[0].value, &|x| {
      let i = x.as_i64().ok_or(HostError::Unavailable)?;
      Ok(ConstValue::Int(match kind {
        ScalarKind::U32 => (!(i as u32)) as i64,
        _ => !i,
      }))
    })?;
    Ok(Typed::new(value, args[0].ty.clone()))
  })
}

// builtin functions

/// A builtin emitted as `name(args…)`, typed by `result` from the converted argument types.
fn builtin(name: &'static str, result: fn(&[DataType]) -> DataType) -> DualFn {
  DualFn::new(name, move |ctx, args| {
    let types: Vec<DataType> = args.iter().map(|arg| arg.ty.clone()).collect();
    let code = stitch!(ctx, "{}({})", name, Args(args));
    Ok(Snippet::runtime(code, result(&types)))
  })
}

fn first(types: &[DataType]) -> DataType {
  types[0].undecorated().clone()
}

fn first_component(types: &[DataType]) -> DataType {
  types[0]
    .component()
    .map(DataType::Scalar)
    .unwrap_or(DataType::Unknown)
}

/// Unify all operand types, implicitly if needed.
fn unified(name: &str, types: &[DataType]) -> Result<DataType> {
  conversion::unify(types, None, true)
    .map(|result| result.target)
    .ok_or_else(|| Error::NoCommonType {
      context: format!("the arguments of `{}`", name),
      types: types.to_vec(),
    })
}

fn numeric_operands(name: &'static str) -> ArgConversion {
  ArgConversion::PerPosition(Rc::new(move |types| {
    let ty = unified(name, types)?;

    match ty.component() {
      Some(kind) if kind.is_numeric() && !matches!(ty, DataType::Matrix { .. }) => Ok(vec![ty; types.len()]),
      _ => Err(Error::TypeMismatch(format!("`{}` needs numeric arguments, found `{}`", name, ty))),
    }
  }))
}

/// Like [`numeric_operands`], with integers promoted to floats.
fn float_operands(name: &'static str) -> ArgConversion {
  ArgConversion::PerPosition(Rc::new(move |types| Ok(vec![float_type(name, &unified(name, types)?)?; types.len()])))
}

fn float_type(name: &str, ty: &DataType) -> Result<DataType> {
  let kind = match ty.component() {
    Some(ScalarKind::AbstractInt) => ScalarKind::AbstractFloat,
    Some(ScalarKind::I32) | Some(ScalarKind::U32) => ScalarKind::F32,
    Some(kind) if kind.is_float() => kind,
    _ => return Err(Error::TypeMismatch(format!("`{}` needs float arguments, found `{}`", name, ty))),
  };

  match ty.undecorated() {
    DataType::Matrix { .. } => Err(Error::TypeMismatch(format!("`{}` cannot be applied to `{}`", name, ty))),
    _ => ty
      .with_component(kind)
      .ok_or_else(|| Error::TypeMismatch(format!("`{}` needs float arguments, found `{}`", name, ty))),
  }
}

fn float_vector_operands(name: &'static str) -> ArgConversion {
  ArgConversion::PerPosition(Rc::new(move |types| {
    let ty = float_type(name, &unified(name, types)?)?;

    match ty {
      DataType::Vector { .. } => Ok(vec![ty; types.len()]),
      _ => Err(Error::TypeMismatch(format!("`{}` needs vector arguments, found `{}`", name, ty))),
    }
  }))
}

/// Fold a float function componentwise; scalar arguments broadcast against vectors.
fn fold_floats(args: &[Typed], f: fn(&[f64]) -> f64) -> Result<Typed, HostError> {
  let ty = args[0].ty.undecorated().clone();
  let kind = ty.component().ok_or(HostError::Unavailable)?;

  let component = |value: &ConstValue, i: Option<usize>| -> Result<f64, HostError> {
    let x = match (value, i) {
      (ConstValue::Composite(xs), Some(i)) => xs.get(i).and_then(ConstValue::as_f64),
      (scalar, _) => scalar.as_f64(),
    };

    x.ok_or(HostError::Unavailable)
  };

  let apply = |i: Option<usize>| -> Result<ConstValue, HostError> {
    let xs = args
      .iter()
      .map(|arg| component(&arg.value, i))
      .collect::<Result<Vec<_>, _>>()?;
    let r = f(&xs);

    if r.is_finite() {
      Ok(ConstValue::Float(round_to(r, kind)))
    } else {
      Err(HostError::Failed(format!("result is not a finite number ({})", r)))
    }
  };

  let value = match &args[0].value {
    ConstValue::Composite(xs) => ConstValue::Composite((0..xs.len()).map(|i| apply(Some(i))).collect::<Result<_, _>>()?),
    _ => apply(None)?,
  };

  Ok(Typed { value, ty })
}

/// Fold a function over floats or integers depending on the argument kind.
fn fold_numeric(args: &[Typed], float: fn(&[f64]) -> f64, int: fn(&[i64]) -> Option<i64>) -> Result<Typed, HostError> {
  let kind = args[0].ty.component().ok_or(HostError::Unavailable)?;

  if kind.is_float() {
    return fold_floats(args, float);
  }

  let xs: Vec<&[ConstValue]> = args
    .iter()
    .map(|arg| match &arg.value {
      ConstValue::Composite(xs) => xs.as_slice(),
      scalar => std::slice::from_ref(scalar),
    })
    .collect();

  let apply = |i: usize| -> Result<ConstValue, HostError> {
    let operands = xs
      .iter()
      .map(|x| x.get(i).or_else(|| x.first()).and_then(ConstValue::as_i64))
      .collect::<Option<Vec<_>>>()
      .ok_or(HostError::Unavailable)?;

    int(&operands)
      .filter(|r| fits(*r, kind))
      .map(ConstValue::Int)
      .ok_or_else(|| HostError::Failed("integer overflow".to_owned()))
  };

  let value = match &args[0].value {
    ConstValue::Composite(items) => ConstValue::Composite((0..items.len()).map(apply).collect::<Result<_, _>>()?),
    _ => apply(0)?,
  };

  Ok(Typed::new(value, args[0].ty.undecorated().clone()))
}

fn components(value: &ConstValue) -> Result<Vec<f64>, HostError> {
  match value {
    ConstValue::Composite(xs) => xs
      .iter()
      .map(|x| x.as_f64().ok_or(HostError::Unavailable))
      .collect(),
    scalar => Ok(vec![scalar.as_f64().ok_or(HostError::Unavailable)?]),
  }
}

fn scalar_result(args: &[Typed], r: f64) -> Result<Typed, HostError> {
  let kind = args[0].ty.component().ok_or(HostError::Unavailable)?;

  if kind.is_float() {
    return Ok(Typed::new(round_to(r, kind), DataType::Scalar(kind)));
  }

  let i = r as i64;
  if r.fract() != 0. || i as f64 != r || !fits(i, kind) {
    return Err(HostError::Failed("integer overflow".to_owned()));
  }

  Ok(Typed::new(i, DataType::Scalar(kind)))
}

fn integer_dot(args: &[Typed], kind: ScalarKind) -> Result<Typed, HostError> {
  let ints = |value: &ConstValue| match value {
    ConstValue::Composite(xs) => xs
      .iter()
      .map(|x| x.as_i64().ok_or(HostError::Unavailable))
      .collect::<Result<Vec<_>, _>>(),
    _ => Err(HostError::Unavailable),
  };
  let (a, b) = (ints(&args[0].value)?, ints(&args[1].value)?);

  a.iter()
    .zip(&b)
    .try_fold(0i64, |acc, (x, y)| x.checked_mul(*y).and_then(|p| acc.checked_add(p)))
    .filter(|r| fits(*r, kind))
    .map(|r| Typed::new(r, DataType::Scalar(kind)))
    .ok_or_else(|| HostError::Failed("integer overflow".to_owned()))
}

fn unary_float(name: &'static str, f: fn(&[f64]) -> f64) -> DualFn {
  builtin(name, first)
    .with_arity(1)
    .with_conversion(float_operands(name))
    .with_host(move |args| fold_floats(args, f))
}

const UNARY_FLOAT: &[(&str, fn(&[f64]) -> f64)] = &[
  ("sqrt", |x: &[f64]| x[0].sqrt()),
  ("sin", |x: &[f64]| x[0].sin()),
  ("cos", |x: &[f64]| x[0].cos()),
  ("tan", |x: &[f64]| x[0].tan()),
  ("floor", |x: &[f64]| x[0].floor()),
  ("ceil", |x: &[f64]| x[0].ceil()),
  ("fract", |x: &[f64]| x[0] - x[0].floor()),
  ("exp", |x: &[f64]| x[0].exp()),
  ("log", |x: &[f64]| x[0].ln()),
];

fn dot() -> DualFn {
  builtin("dot", first_component)
    .with_arity(2)
    .with_conversion(ArgConversion::PerPosition(Rc::new(|types| {
      let ty = unified("dot", types)?;

      match ty {
        DataType::Vector { component, .. } if component.is_numeric() => Ok(vec![ty; 2]),
        _ => Err(Error::TypeMismatch(format!("`dot` needs vector arguments, found `{}`", ty))),
      }
    })))
    .with_host(|args| {
      let kind = args[0].ty.component().ok_or(HostError::Unavailable)?;
      if !kind.is_float() {
        return integer_dot(args, kind);
      }

      let (a, b) = (components(&args[0].value)?, components(&args[1].value)?);
      scalar_result(args, a.iter().zip(&b).map(|(x, y)| x * y).sum())
    })
}

fn cross() -> DualFn {
  builtin("cross", first)
    .with_arity(2)
    .with_conversion(ArgConversion::PerPosition(Rc::new(|types| {
      let ty = float_type("cross", &unified("cross", types)?)?;

      match ty {
        DataType::Vector { dim: 3, .. } => Ok(vec![ty; 2]),
        _ => Err(Error::TypeMismatch(format!("`cross` needs 3-component vectors, found `{}`", ty))),
      }
    })))
    .with_host(|args| {
      let (a, b) = (components(&args[0].value)?, components(&args[1].value)?);
      let kind = args[0].ty.component().ok_or(HostError::Unavailable)?;
      let c = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
      ];

      Ok(Typed::new(
        c.iter().map(|x| ConstValue::Float(round_to(*x, kind))).collect::<Vec<_>>(),
        args[0].ty.undecorated().clone(),
      ))
    })
}

fn length() -> DualFn {
  builtin("length", first_component)
    .with_arity(1)
    .with_conversion(float_operands("length"))
    .with_host(|args| {
      let v = components(&args[0].value)?;
      scalar_result(args, v.iter().map(|x| x * x).sum::<f64>().sqrt())
    })
}

fn distance() -> DualFn {
  builtin("distance", first_component)
    .with_arity(2)
    .with_conversion(float_operands("distance"))
    .with_host(|args| {
      let (a, b) = (components(&args[0].value)?, components(&args[1].value)?);
      scalar_result(args, a.iter().zip(&b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt())
    })
}

fn normalize() -> DualFn {
  builtin("normalize", first)
    .with_arity(1)
    .with_conversion(float_vector_operands("normalize"))
    .with_host(|args| {
      let v = components(&args[0].value)?;
      let len = v.iter().map(|x| x * x).sum::<f64>().sqrt();

      if len == 0. {
        return Err(HostError::Failed("cannot normalize a zero vector".to_owned()));
      }

      let kind = args[0].ty.component().ok_or(HostError::Unavailable)?;
      Ok(Typed::new(
        v.iter().map(|x| ConstValue::Float(round_to(x / len, kind))).collect::<Vec<_>>(),
        args[0].ty.undecorated().clone(),
      ))
    })
}

fn mix() -> DualFn {
  builtin("mix", first)
    .with_arity(3)
    .with_conversion(ArgConversion::PerPosition(Rc::new(|types| {
      let ty = float_type("mix", &unified("mix", &types[..2])?)?;
      let factor = match types[2].deref_implicit().undecorated() {
        DataType::Scalar(_) => ty.with_component(ty.component().unwrap_or(ScalarKind::F32)),
        _ => None,
      }
      .filter(|_| matches!(ty, DataType::Vector { .. }))
      .unwrap_or_else(|| ty.clone());

      Ok(vec![ty.clone(), ty, factor])
    })))
    .with_host(|args| fold_floats(args, |x| x[0] + (x[1] - x[0]) * x[2]))
}

fn select() -> DualFn {
  builtin("select", first)
    .with_arity(3)
    .with_conversion(ArgConversion::PerPosition(Rc::new(|types| {
      let ty = unified("select", &types[..2])?;
      let condition = match (&ty, types[2].deref_implicit().undecorated()) {
        (DataType::Vector { dim, .. }, DataType::Vector { .. }) => DataType::vec(*dim, ScalarKind::Bool),
        _ => DataType::BOOL,
      };

      Ok(vec![ty.clone(), ty, condition])
    })))
    .with_host(|args| {
      let picked = match (&args[0].value, &args[1].value, &args[2].value) {
        (f, t, ConstValue::Bool(c)) => {
          if *c {
            t.clone()
          } else {
            f.clone()
          }
        }

        (ConstValue::Composite(fs), ConstValue::Composite(ts), ConstValue::Composite(cs)) => ConstValue::Composite(
          fs.iter()
            .zip(ts)
            .zip(cs)
            .map(|((f, t), c)| match c.as_bool() {
              Some(true) => Ok(t.clone()),
              Some(false) => Ok(f.clone()),
              None => Err(HostError::Unavailable),
            })
            .collect::<Result<_, _>>()?,
        ),

        _ => return Err(HostError::Unavailable),
      };

      Ok(Typed::new(picked, args[0].ty.undecorated().clone()))
    })
}

fn texture_sample() -> DualFn {
  DualFn::new("textureSample", |ctx, args| {
    let ty = match args.first().map(|t| t.ty.undecorated()) {
      Some(DataType::Texture(TextureType::Sampled { sample, .. })) => DataType::vec(4, sample.concretize()),
      Some(DataType::Texture(TextureType::Depth { .. })) => DataType::F32,
      _ => {
        return Err(Error::TypeMismatch(
          "`textureSample` needs a sampled or depth texture as first argument".to_owned(),
        ))
      }
    };

    let code = stitch!(ctx, "textureSample({})", Args(args));
    Ok(Snippet::runtime(code, ty))
  })
  .with_arity(3)
}

fn std_namespace() -> Namespace {
  let mut members: Vec<(String, DualFn)> = vec![
    (
      "abs".to_owned(),
      builtin("abs", first)
        .with_arity(1)
        .with_conversion(numeric_operands("abs"))
        .with_host(|args| fold_numeric(args, |x| x[0].abs(), |x| x[0].checked_abs())),
    ),
    (
      "min".to_owned(),
      builtin("min", first)
        .with_arity(2)
        .with_conversion(numeric_operands("min"))
        .with_host(|args| fold_numeric(args, |x| x[0].min(x[1]), |x| Some(x[0].min(x[1])))),
    ),
    (
      "max".to_owned(),
      builtin("max", first)
        .with_arity(2)
        .with_conversion(numeric_operands("max"))
        .with_host(|args| fold_numeric(args, |x| x[0].max(x[1]), |x| Some(x[0].max(x[1])))),
    ),
    (
      "clamp".to_owned(),
      builtin("clamp", first)
        .with_arity(3)
        .with_conversion(numeric_operands("clamp"))
        .with_host(|args| {
          fold_numeric(args, |x| x[0].max(x[1]).min(x[2]), |x| Some(x[0].max(x[1]).min(x[2])))
        }),
    ),
    (
      "pow".to_owned(),
      builtin("pow", first)
        .with_arity(2)
        .with_conversion(float_operands("pow"))
        .with_host(|args| fold_floats(args, |x| x[0].powf(x[1]))),
    ),
    ("dot".to_owned(), dot()),
    ("cross".to_owned(), cross()),
    ("length".to_owned(), length()),
    ("distance".to_owned(), distance()),
    ("normalize".to_owned(), normalize()),
    ("mix".to_owned(), mix()),
    ("select".to_owned(), select()),
    ("textureSample".to_owned(), texture_sample()),
  ];

  for (name, f) in UNARY_FLOAT {
    members.push(((*name).to_owned(), unary_float(name, *f)));
  }

  Namespace::new(
    "std",
    members
      .into_iter()
      .map(|(name, f)| (name, Snippet::host(Value::Dual(Rc::new(f))))),
  )
}

/// Names visible in every function: scalar, vector and matrix schemas and the `std` namespace.
pub fn prelude() -> IndexMap<String, Snippet> {
  let mut prelude = IndexMap::new();

  let scalars = [
    ("f32", ScalarKind::F32, "f"),
    ("f16", ScalarKind::F16, "h"),
    ("i32", ScalarKind::I32, "i"),
    ("u32", ScalarKind::U32, "u"),
    ("bool", ScalarKind::Bool, "b"),
  ];

  for (name, kind, suffix) in scalars {
    prelude.insert(name.to_owned(), Snippet::schema(DataType::Scalar(kind)));

    for dim in 2..=4 {
      prelude.insert(format!("vec{}{}", dim, suffix), Snippet::schema(DataType::vec(dim, kind)));

      if kind.is_float() {
        prelude.insert(format!("mat{}x{}{}", dim, dim, suffix), Snippet::schema(DataType::mat(dim, kind)));
      }
    }
  }

  prelude.insert("std".to_owned(), Snippet::host(Value::Namespace(Rc::new(std_namespace()))));
  prelude
}
