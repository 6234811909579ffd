use super::{access, construct, copyable, value_of};
use crate::{
  ast::{AssignOp, BinaryOp, Expr, LogicalOp},
  context::ResolutionCtx,
  conversion,
  error::{DiagnosticKind, Error, Result},
  snippet::{Origin, Snippet, Value},
  specialization, stitch,
  stitch::MAX_SAFE_INTEGER,
  stdlib::ArithOp,
  types::{DataType, ScalarKind},
  value::ConstValue,
};
use std::cmp::Ordering;

/// Compile an expression.
///
/// `expected` is the type the surrounding code wants, if known. It is only a hint: object and array literals need it,
/// everything else ignores it and is converted by the caller.
pub fn generate_expression(ctx: &mut ResolutionCtx, expr: &Expr, expected: Option<&DataType>) -> Result<Snippet> {
  match expr {
    Expr::Ident(name) => {
      let snippet = ctx
        .lookup(name)
        .ok_or_else(|| Error::UnresolvedIdentifier(name.clone()))?;
      ctx.realize(snippet)
    }

    Expr::Bool(b) => Ok(Snippet::constant(*b, DataType::BOOL)),

    Expr::Int(i) => {
      if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
        ctx.diagnostic(
          DiagnosticKind::PrecisionLoss,
          format!("integer literal {} is outside of the exactly representable range", i),
        );
      }

      Ok(Snippet::constant(*i, DataType::ABSTRACT_INT))
    }

    Expr::Float(x) => Ok(Snippet::constant(*x, DataType::ABSTRACT_FLOAT)),

    Expr::Str(s) => Ok(Snippet::new(
      Value::Const(ConstValue::Str(s.clone())),
      DataType::Unknown,
      Origin::Constant,
    )),

    Expr::Binary { op, lhs, rhs } => generate_binary(ctx, *op, lhs, rhs),

    Expr::Logical { op, lhs, rhs } => generate_logical(ctx, *op, lhs, rhs),

    Expr::Assign { op, target, value } => generate_assignment(ctx, *op, target, value),

    Expr::Unary { op, operand } => {
      let operand = value_of(ctx, operand, None)?;
      let f = ctx.unary_operator(*op);
      f.call(ctx, vec![operand])
    }

    Expr::Update { .. } => Err(Error::InvalidConstruct(format!(
      "`{}` is only valid as a statement or a for-loop update",
      expr
    ))),

    Expr::Member { object, property } => access::generate_member(ctx, object, property),

    Expr::Index { object, index } => access::generate_index(ctx, object, index),

    Expr::Call { callee, args } => generate_call(ctx, callee, args, expected),

    Expr::Object(fields) => construct::generate_object(ctx, fields, expected),

    Expr::Array(items) => construct::generate_array(ctx, items, expected),
  }
}

fn arithmetic(op: BinaryOp) -> Option<ArithOp> {
  match op {
    BinaryOp::Add => Some(ArithOp::Add),
    BinaryOp::Sub => Some(ArithOp::Sub),
    BinaryOp::Mul => Some(ArithOp::Mul),
    BinaryOp::Div => Some(ArithOp::Div),
    BinaryOp::Rem => Some(ArithOp::Rem),
    _ => None,
  }
}

fn generate_binary(ctx: &mut ResolutionCtx, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Snippet> {
  if let Some(arith) = arithmetic(op) {
    let lhs = generate_expression(ctx, lhs, None)?;
    let rhs = generate_expression(ctx, rhs, None)?;
    let f = ctx.operator(arith);
    return f.call(ctx, vec![lhs, rhs]);
  }

  let lhs = value_of(ctx, lhs, None)?;
  let rhs = value_of(ctx, rhs, None)?;

  if op.is_shift() {
    return generate_shift(ctx, op, lhs, rhs);
  }

  let types = vec![lhs.ty.clone(), rhs.ty.clone()];
  let operands = conversion::convert_to_common_type(ctx, vec![lhs, rhs], None, true)?.ok_or_else(|| {
    Error::NoCommonType {
      context: format!("`{}`", op.symbol()),
      types: types.clone(),
    }
  })?;

  let ty = operands[0].ty.undecorated().clone();
  let (kind, dim) = match &ty {
    DataType::Scalar(kind) => (*kind, None),
    DataType::Vector { dim, component } => (*component, Some(*dim)),
    _ => {
      return Err(Error::TypeMismatch(format!(
        "`{}` cannot be applied to `{}`",
        op.symbol(),
        ty
      )))
    }
  };

  let result_ty = if op.is_comparison() {
    dim.map_or(DataType::BOOL, |dim| DataType::vec(dim, ScalarKind::Bool))
  } else if kind.is_integer() || kind == ScalarKind::Bool {
    ty
  } else {
    return Err(Error::TypeMismatch(format!(
      "`{}` needs integer or boolean operands, found `{}`",
      op.symbol(),
      ty
    )));
  };

  if let (Some(a), Some(b)) = (operands[0].as_const(), operands[1].as_const()) {
    let folded = if op.is_comparison() {
      fold_comparison(op, a, b).map(ConstValue::Bool)
    } else {
      fold_bitwise(op, a, b)
    };

    if let Some(value) = folded {
      return Ok(Snippet::constant(value, result_ty));
    }
  }

  let code = stitch!(ctx, "({} {} {})", operands[0], op.symbol(), operands[1]);
  Ok(Snippet::runtime(code, result_ty))
}

fn fold_comparison(op: BinaryOp, a: &ConstValue, b: &ConstValue) -> Option<bool> {
  let ordering = match (a, b) {
    (ConstValue::Int(x), ConstValue::Int(y)) => x.partial_cmp(y),
    (ConstValue::Bool(x), ConstValue::Bool(y)) => x.partial_cmp(y),
    (x, y) => x.as_f64()?.partial_cmp(&y.as_f64()?),
  }?;

  Some(match op {
    BinaryOp::Eq => ordering == Ordering::Equal,
    BinaryOp::Neq => ordering != Ordering::Equal,
    BinaryOp::Lt => ordering == Ordering::Less,
    BinaryOp::Lte => ordering != Ordering::Greater,
    BinaryOp::Gt => ordering == Ordering::Greater,
    BinaryOp::Gte => ordering != Ordering::Less,
    _ => return None,
  })
}

fn fold_bitwise(op: BinaryOp, a: &ConstValue, b: &ConstValue) -> Option<ConstValue> {
  match (a, b) {
    (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(match op {
      BinaryOp::BitAnd => *x & *y,
      BinaryOp::BitOr => *x | *y,
      BinaryOp::BitXor => *x ^ *y,
      _ => return None,
    })),

    (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(match op {
      BinaryOp::BitAnd => *x & *y,
      BinaryOp::BitOr => *x | *y,
      BinaryOp::BitXor => *x ^ *y,
      _ => return None,
    })),

    _ => None,
  }
}

/// Shifts keep the type of their left operand; the shift amount is always unsigned.
fn generate_shift(ctx: &mut ResolutionCtx, op: BinaryOp, lhs: Snippet, rhs: Snippet) -> Result<Snippet> {
  let (kind, dim) = match lhs.ty.undecorated() {
    DataType::Scalar(kind) if kind.is_integer() => (*kind, None),
    DataType::Vector { dim, component } if component.is_integer() => (*component, Some(*dim)),
    other => {
      return Err(Error::TypeMismatch(format!(
        "`{}` needs an integer left operand, found `{}`",
        op.symbol(),
        other
      )))
    }
  };

  let amount = dim.map_or(DataType::U32, |dim| DataType::vec(dim, ScalarKind::U32));
  let rhs = conversion::try_convert(ctx, rhs, &amount)?;

  let folded = match (lhs.as_const(), rhs.as_const()) {
    (Some(ConstValue::Int(x)), Some(ConstValue::Int(s))) => fold_shift(op, kind, *x, *s),
    _ => None,
  };

  if let Some(value) = folded {
    return Ok(Snippet::constant(value, lhs.ty));
  }

  let lhs = if kind.is_abstract() {
    let concrete = lhs.ty.concretize();
    conversion::try_convert(ctx, lhs, &concrete)?
  } else {
    lhs
  };

  let code = stitch!(ctx, "({} {} {})", lhs, op.symbol(), rhs);
  Ok(Snippet::runtime(code, lhs.ty))
}

fn fold_shift(op: BinaryOp, kind: ScalarKind, x: i64, amount: i64) -> Option<i64> {
  let bits = if kind.is_abstract() { 63 } else { 32 };
  let amount = u32::try_from(amount).ok().filter(|s| *s < bits)?;

  let r = match op {
    BinaryOp::Shl => x.checked_mul(1i64 << amount)?,
    BinaryOp::Shr => x >> amount,
    _ => return None,
  };

  match kind {
    ScalarKind::I32 => i32::try_from(r).ok().map(i64::from),
    ScalarKind::U32 => u32::try_from(r).ok().map(i64::from),
    _ => Some(r),
  }
}

fn generate_logical(ctx: &mut ResolutionCtx, op: LogicalOp, lhs: &Expr, rhs: &Expr) -> Result<Snippet> {
  let lhs = value_of(ctx, lhs, Some(&DataType::BOOL))?;
  let lhs = conversion::try_convert(ctx, lhs, &DataType::BOOL)?;
  let rhs = value_of(ctx, rhs, Some(&DataType::BOOL))?;
  let rhs = conversion::try_convert(ctx, rhs, &DataType::BOOL)?;

  let both = lhs
    .as_const()
    .and_then(ConstValue::as_bool)
    .zip(rhs.as_const().and_then(ConstValue::as_bool));

  if let Some((a, b)) = both {
    let value = match op {
      LogicalOp::And => a && b,
      LogicalOp::Or => a || b,
    };

    return Ok(Snippet::constant(value, DataType::BOOL));
  }

  let code = stitch!(ctx, "({} {} {})", lhs, op.symbol(), rhs);
  Ok(Snippet::runtime(code, DataType::BOOL))
}

/// Check that a snippet designates a location that may be written.
pub(super) fn check_assignable(snippet: &Snippet, target: &Expr) -> Result<()> {
  let reason = match snippet.origin {
    Origin::Constant | Origin::ConstantRef => "it is a compile-time constant",
    Origin::Argument => "function parameters are immutable; copy the parameter into a mutable variable first",
    Origin::Runtime => "it is a temporary value, not a storage location",
    Origin::RuntimeRef { access, .. } if !access.is_writable() => "it is a read-only reference",
    Origin::RuntimeRef { .. } => return Ok(()),
  };

  Err(Error::AssignToImmutable {
    target: target.to_string(),
    reason: reason.to_owned(),
  })
}

fn generate_assignment(ctx: &mut ResolutionCtx, op: AssignOp, target: &Expr, value: &Expr) -> Result<Snippet> {
  let place = value_of(ctx, target, None)?;
  check_assignable(&place, target)?;

  let storable = place.ty.undecorated().clone();

  let value = match op {
    AssignOp::Compound(binary) if binary.is_shift() => {
      let amount = storable
        .with_component(ScalarKind::U32)
        .unwrap_or_else(|| storable.clone());
      super::stored(ctx, value, &amount)?
    }

    // vectors accept a scalar right-hand side
    AssignOp::Compound(_) => {
      let snippet = generate_expression(ctx, value, Some(&storable))?;
      let snippet = copyable(ctx, snippet, value)?;
      let scalar_rhs = matches!(snippet.ty.undecorated(), DataType::Scalar(_));

      let target = match &storable {
        DataType::Vector { component, .. } if scalar_rhs => DataType::Scalar(*component),
        _ => storable.clone(),
      };

      conversion::try_convert(ctx, snippet, &target)?
    }

    AssignOp::Assign => super::stored(ctx, value, &storable)?,
  };

  let code = stitch!(ctx, "{} {} {}", place, op.to_string(), value);
  Ok(Snippet::runtime(code, storable))
}

fn generate_call(ctx: &mut ResolutionCtx, callee: &Expr, args: &[Expr], expected: Option<&DataType>) -> Result<Snippet> {
  let function = generate_expression(ctx, callee, None)?;

  match function.value {
    Value::Schema(ty) => construct::construct(ctx, &ty, args),

    Value::Infix(infix) => {
      let rhs = match args {
        [rhs] => value_of(ctx, rhs, None)?,
        _ => {
          return Err(Error::ArityMismatch {
            what: callee.to_string(),
            expected: 1,
            found: args.len(),
          })
        }
      };

      let lhs = Snippet::runtime(infix.lhs, infix.lhs_ty);
      let f = ctx.operator(infix.op);
      f.call(ctx, vec![lhs, rhs])
    }

    Value::Helper(f) => {
      let params = &f.definition().params;

      if params.len() != args.len() {
        return Err(Error::ArityMismatch {
          what: f.definition().name.clone(),
          expected: params.len(),
          found: args.len(),
        });
      }

      let hints: Vec<Option<DataType>> = params.iter().map(|param| param.ty.clone()).collect();
      let snippets = args
        .iter()
        .zip(&hints)
        .map(|(arg, hint)| generate_expression(ctx, arg, hint.as_ref()))
        .collect::<Result<Vec<_>>>()?;

      specialization::call_helper(ctx, &f, snippets, args)
    }

    Value::Dual(f) => {
      let hints = f
        .signature()
        .map(|signature| signature.hints(args.len(), expected))
        .unwrap_or_default();

      let snippets = args
        .iter()
        .enumerate()
        .map(|(i, arg)| value_of(ctx, arg, hints.get(i)))
        .collect::<Result<Vec<_>>>()?;

      f.call(ctx, snippets)
    }

    other => Err(Error::NotCallable {
      what: callee.to_string(),
      kind: other.kind_name(),
    }),
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    ast::{UnaryOp, UpdateOp},
    compile::CompileOptions,
  };

  fn ctx() -> ResolutionCtx {
    ResolutionCtx::new(CompileOptions::default())
  }

  fn code(snippet: &Snippet) -> &str {
    match &snippet.value {
      Value::Code(code) => code,
      other => panic!("expected code, found {:?}", other),
    }
  }

  #[test]
  fn constant_arithmetic_folds() {
    let mut ctx = ctx();
    let sum = generate_expression(&mut ctx, &Expr::binary(BinaryOp::Add, Expr::Int(1), Expr::Int(2)), None).unwrap();

    assert!(sum.is_constant());
    assert_eq!(sum.as_const(), Some(&ConstValue::Int(3)));
    assert_eq!(sum.ty, DataType::ABSTRACT_INT);
  }

  #[test]
  fn mixed_runtime_arithmetic() {
    let mut ctx = ctx();
    ctx.define("x", Snippet::new(Value::Code("x".to_owned()), DataType::F32, Origin::Argument));

    let e = Expr::binary(BinaryOp::Mul, Expr::ident("x"), Expr::Int(2));
    let product = generate_expression(&mut ctx, &e, None).unwrap();

    assert_eq!(code(&product), "(x * 2f)");
    assert_eq!(product.ty, DataType::F32);
    assert!(ctx.diagnostics().is_empty());
  }

  #[test]
  fn comparisons_yield_bool() {
    let mut ctx = ctx();
    ctx.define("i", Snippet::new(Value::Code("i".to_owned()), DataType::U32, Origin::Argument));

    let lt = generate_expression(&mut ctx, &Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::Int(4)), None).unwrap();
    assert_eq!(code(&lt), "(i < 4u)");
    assert_eq!(lt.ty, DataType::BOOL);

    let folded = generate_expression(&mut ctx, &Expr::binary(BinaryOp::Gte, Expr::Int(1), Expr::Float(1.5)), None).unwrap();
    assert_eq!(folded.as_const(), Some(&ConstValue::Bool(false)));
  }

  #[test]
  fn shifts_take_unsigned_amounts() {
    let mut ctx = ctx();
    ctx.define("x", Snippet::new(Value::Code("x".to_owned()), DataType::I32, Origin::Argument));

    let shl = generate_expression(&mut ctx, &Expr::binary(BinaryOp::Shl, Expr::ident("x"), Expr::Int(2)), None).unwrap();
    assert_eq!(code(&shl), "(x << 2u)");
    assert_eq!(shl.ty, DataType::I32);

    let folded = generate_expression(&mut ctx, &Expr::binary(BinaryOp::Shl, Expr::Int(1), Expr::Int(4)), None).unwrap();
    assert_eq!(folded.as_const(), Some(&ConstValue::Int(16)));
  }

  #[test]
  fn unary_operators() {
    let mut ctx = ctx();
    ctx.define("x", Snippet::new(Value::Code("x".to_owned()), DataType::F32, Origin::Argument));
    ctx.define("b", Snippet::new(Value::Code("b".to_owned()), DataType::BOOL, Origin::Argument));
    ctx.define("u", Snippet::new(Value::Code("u".to_owned()), DataType::U32, Origin::Argument));

    let neg = generate_expression(&mut ctx, &Expr::unary(UnaryOp::Neg, Expr::ident("x")), None).unwrap();
    assert_eq!(code(&neg), "(-x)");
    assert_eq!(neg.ty, DataType::F32);

    let not = generate_expression(&mut ctx, &Expr::unary(UnaryOp::Not, Expr::ident("b")), None).unwrap();
    assert_eq!(code(&not), "!b");

    let bit_not = generate_expression(&mut ctx, &Expr::unary(UnaryOp::BitNot, Expr::ident("u")), None).unwrap();
    assert_eq!(code(&bit_not), "~u");

    let folded = generate_expression(&mut ctx, &Expr::unary(UnaryOp::Neg, Expr::Int(3)), None).unwrap();
    assert_eq!(folded.as_const(), Some(&ConstValue::Int(-3)));

    let err = generate_expression(&mut ctx, &Expr::unary(UnaryOp::Neg, Expr::ident("u")), None).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch(_)));
  }

  #[test]
  fn huge_literals_lose_precision() {
    let mut ctx = ctx();
    generate_expression(&mut ctx, &Expr::Int(1 << 60), None).unwrap();

    assert_eq!(ctx.diagnostics().len(), 1);
    assert_eq!(ctx.diagnostics()[0].kind, DiagnosticKind::PrecisionLoss);
  }

  #[test]
  fn unresolved_identifiers() {
    let err = generate_expression(&mut ctx(), &Expr::ident("nope"), None).unwrap_err();
    assert!(matches!(err, Error::UnresolvedIdentifier(name) if name == "nope"));
  }

  #[test]
  fn constants_are_not_assignable() {
    let mut ctx = ctx();
    ctx.define("k", Snippet::constant(3, DataType::ABSTRACT_INT));

    let table = ConstValue::Composite(vec![ConstValue::Float(1.), ConstValue::Float(2.)]);
    ctx.define(
      "table",
      Snippet::new(Value::Const(table), DataType::array(DataType::F32, 2), Origin::ConstantRef),
    );

    let writes = [
      ("k", Expr::assign(AssignOp::Assign, Expr::ident("k"), Expr::Int(1))),
      ("k", Expr::assign(AssignOp::Compound(BinaryOp::Add), Expr::ident("k"), Expr::Int(1))),
      ("table", Expr::assign(AssignOp::Assign, Expr::ident("table"), Expr::ident("table"))),
      (
        "table[0]",
        Expr::assign(AssignOp::Assign, Expr::index(Expr::ident("table"), Expr::Int(0)), Expr::Float(3.)),
      ),
    ];

    for (target, write) in writes {
      match generate_expression(&mut ctx, &write, None) {
        Err(Error::AssignToImmutable { target: name, reason }) => {
          assert_eq!(name, target);
          assert!(reason.contains("compile-time constant"), "{}", reason);
        }

        other => panic!("assigning to `{}` gave {:?}", target, other),
      }
    }
  }

  #[test]
  fn updates_are_statements() {
    let mut ctx = ctx();
    let e = Expr::update(UpdateOp::Increment, Expr::ident("i"));

    assert!(matches!(generate_expression(&mut ctx, &e, None), Err(Error::InvalidConstruct(_))));
  }

  #[test]
  fn calling_a_value() {
    let mut ctx = ctx();
    ctx.define("x", Snippet::runtime("x", DataType::F32));

    let err = generate_expression(&mut ctx, &Expr::call(Expr::ident("x"), []), None).unwrap_err();
    assert!(matches!(err, Error::NotCallable { .. }));
  }
}
