use super::{copyable, expr::check_assignable, generate_expression, value_of};
use crate::{
  ast::{DeclKind, Expr, Stmt, UpdateOp},
  context::ResolutionCtx,
  conversion,
  error::{Error, Result},
  snippet::{Origin, Snippet, Value},
  stitch,
  types::{Access, AddressSpace, DataType},
};

/// Compile a block in its own lexical scope.
///
/// The opening brace is not indented, so that the block can follow a statement header; the closing brace is at the
/// current indentation level.
pub fn generate_block(ctx: &mut ResolutionCtx, stmts: &[Stmt]) -> Result<String> {
  ctx.with_scope(|ctx| {
    let mut text = String::from("{\n");

    ctx.with_indent(|ctx| {
      for stmt in stmts {
        let line = generate_statement(ctx, stmt)?;

        if !line.is_empty() {
          text.push_str(&ctx.indent());
          text.push_str(&line);
          text.push('\n');
        }
      }

      Ok(())
    })?;

    text.push_str(&ctx.indent());
    text.push('}');
    Ok(text)
  })
}

/// Compile a statement, without indentation nor trailing newline.
///
/// Statements that only bind compile-time values produce no text at all.
pub fn generate_statement(ctx: &mut ResolutionCtx, stmt: &Stmt) -> Result<String> {
  match stmt {
    Stmt::Expr(expr) => generate_expression_statement(ctx, expr),

    Stmt::Decl { kind, name, init } => generate_declaration(ctx, *kind, name, init),

    Stmt::If { cond, then, otherwise } => {
      let cond = condition(ctx, cond)?;
      let then = body(ctx, then)?;
      let mut text = stitch!(ctx, "if {} {}", cond, then);

      match otherwise.as_deref() {
        Some(chained @ Stmt::If { .. }) => {
          text.push_str(" else ");
          text.push_str(&generate_statement(ctx, chained)?);
        }

        Some(otherwise) => {
          text.push_str(" else ");
          text.push_str(&body(ctx, otherwise)?);
        }

        None => (),
      }

      Ok(text)
    }

    Stmt::While { cond, body: loop_body } => {
      let cond = condition(ctx, cond)?;
      let loop_body = body(ctx, loop_body)?;
      Ok(stitch!(ctx, "while {} {}", cond, loop_body))
    }

    // the header has its own scope, enclosing the body's
    Stmt::For {
      init,
      cond,
      update,
      body: loop_body,
    } => ctx.with_scope(|ctx| {
      let init = match init {
        Some(init) => generate_statement(ctx, init)?.trim_end_matches(';').to_owned(),
        None => String::new(),
      };

      let cond = match cond {
        Some(cond) => {
          let cond = condition(ctx, cond)?;
          format!(" {}", ctx.resolve(&cond)?)
        }
        None => String::new(),
      };

      let update = match update {
        Some(Expr::Update { op, target }) => format!(" {}", generate_update(ctx, *op, target)?),
        Some(update) => {
          let update = generate_expression(ctx, update, None)?;
          format!(" {}", ctx.resolve(&update)?)
        }
        None => String::new(),
      };

      let loop_body = body(ctx, loop_body)?;
      Ok(format!("for ({};{};{}) {}", init, cond, update, loop_body))
    }),

    Stmt::Return(value) => generate_return(ctx, value.as_ref()),

    Stmt::Break => Ok("break;".to_owned()),

    Stmt::Continue => Ok("continue;".to_owned()),

    Stmt::Block(stmts) => generate_block(ctx, stmts),
  }
}

/// The body of a control-flow statement is always a block.
fn body(ctx: &mut ResolutionCtx, stmt: &Stmt) -> Result<String> {
  match stmt {
    Stmt::Block(stmts) => generate_block(ctx, stmts),
    other => generate_block(ctx, std::slice::from_ref(other)),
  }
}

fn condition(ctx: &mut ResolutionCtx, cond: &Expr) -> Result<Snippet> {
  let value = value_of(ctx, cond, Some(&DataType::BOOL))?;
  conversion::try_convert(ctx, value, &DataType::BOOL)
}

fn generate_expression_statement(ctx: &mut ResolutionCtx, expr: &Expr) -> Result<String> {
  match expr {
    Expr::Update { op, target } => Ok(format!("{};", generate_update(ctx, *op, target)?)),

    Expr::Assign { .. } => {
      let assignment = generate_expression(ctx, expr, None)?;
      Ok(stitch!(ctx, "{};", assignment))
    }

    _ => {
      let value = generate_expression(ctx, expr, None)?;

      // nothing to evaluate on the GPU
      if value.is_constant() || value.ty.is_unknown() {
        return Ok(String::new());
      }

      if value.ty.is_void() {
        Ok(stitch!(ctx, "{};", value))
      } else {
        Ok(stitch!(ctx, "_ = {};", value))
      }
    }
  }
}

fn generate_update(ctx: &mut ResolutionCtx, op: UpdateOp, target: &Expr) -> Result<String> {
  let place = value_of(ctx, target, None)?;
  check_assignable(&place, target)?;

  match place.ty.undecorated() {
    DataType::Scalar(kind) if kind.is_integer() && !kind.is_abstract() => Ok(stitch!(ctx, "{}{}", place, op.symbol())),
    other => Err(Error::TypeMismatch(format!(
      "`{}` needs a concrete integer, found `{}`",
      op.symbol(),
      other
    ))),
  }
}

fn generate_declaration(ctx: &mut ResolutionCtx, kind: DeclKind, name: &str, init: &Expr) -> Result<String> {
  let value = generate_expression(ctx, init, None)?;

  if kind == DeclKind::Const {
    // compile-time values and host values are aliased
    if value.is_constant() || value.ty.is_unknown() {
      ctx.define(name, value);
      return Ok(String::new());
    }

    if let DataType::Pointer { implicit: true, .. } = value.ty.undecorated() {
      ctx.define(name, value);
      return Ok(String::new());
    }

    if let Origin::RuntimeRef { space, access } = value.origin {
      if !value.ty.is_naturally_ephemeral() {
        let local = ctx.local_name(name);
        let text = stitch!(ctx, "let {} = &{};", local, value);
        let ty = DataType::implicit_ptr(space, value.ty.undecorated().clone(), access);
        ctx.define(name, Snippet::new(Value::Code(local), ty, Origin::Runtime));
        return Ok(text);
      }
    }
  }

  let value = copyable(ctx, value, init)?;

  if value.ty.is_unknown() {
    return Err(Error::Capability {
      what: init.to_string(),
      reason: "only data can be stored in a variable".to_owned(),
    });
  }

  if value.ty.is_void() {
    return Err(Error::InvalidConstruct(format!(
      "`{}` has no value to store in `{}`",
      init, name
    )));
  }

  let ty = value.ty.undecorated().concretize();
  let value = conversion::try_convert(ctx, value, &ty)?;

  let local = ctx.local_name(name);
  let text = stitch!(ctx, "var {} = {};", local, value);

  // immutable bindings still get storage but reject writes
  let origin = match kind {
    DeclKind::Const => Origin::Runtime,
    DeclKind::Let | DeclKind::Var => Origin::RuntimeRef {
      space: AddressSpace::Function,
      access: Access::ReadWrite,
    },
  };
  ctx.define(name, Snippet::new(Value::Code(local), ty, origin));

  Ok(text)
}

fn generate_return(ctx: &mut ResolutionCtx, value: Option<&Expr>) -> Result<String> {
  let expr = match value {
    Some(expr) => expr,
    None => {
      ctx.report_return(DataType::Void);
      return Ok("return;".to_owned());
    }
  };

  let declared = ctx.declared_return_type();
  let value = generate_expression(ctx, expr, declared.as_ref())?;
  let value = copyable(ctx, value, expr)?;

  if value.ty.is_unknown() {
    return Err(Error::Capability {
      what: expr.to_string(),
      reason: "only data can be returned".to_owned(),
    });
  }

  let value = match &declared {
    Some(ty) => conversion::try_convert(ctx, value, ty)?,
    None => value,
  };

  ctx.report_return(value.ty.undecorated().clone());
  Ok(stitch!(ctx, "return {};", value))
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    ast::{AssignOp, BinaryOp},
    compile::CompileOptions,
    types::ScalarKind,
    value::ConstValue,
  };

  fn ctx() -> ResolutionCtx {
    ResolutionCtx::new(CompileOptions::default())
  }

  fn storage(name: &str, ty: DataType, access: Access) -> Snippet {
    Snippet::new(
      Value::Code(name.to_owned()),
      ty,
      Origin::RuntimeRef {
        space: AddressSpace::Storage,
        access,
      },
    )
  }

  #[test]
  fn blocks_are_indented() {
    let mut ctx = ctx();
    let block = generate_block(
      &mut ctx,
      &[
        Stmt::decl(DeclKind::Var, "x", Expr::Float(1.)),
        Stmt::Expr(Expr::assign(
          AssignOp::Compound(BinaryOp::Mul),
          Expr::ident("x"),
          Expr::Int(2),
        )),
      ],
    )
    .unwrap();

    assert_eq!(block, "{\n  var x = 1f;\n  x *= 2f;\n}");
    assert!(ctx.lookup("x").is_none());
  }

  #[test]
  fn constants_bind_without_text() {
    let mut ctx = ctx();
    let decl = generate_statement(&mut ctx, &Stmt::decl(DeclKind::Const, "k", Expr::Int(3))).unwrap();

    assert_eq!(decl, "");
    assert_eq!(ctx.lookup("k").and_then(|k| k.as_const().cloned()), Some(ConstValue::Int(3)));

    let dropped = generate_statement(&mut ctx, &Stmt::Expr(Expr::ident("k"))).unwrap();
    assert_eq!(dropped, "");
  }

  #[test]
  fn runtime_values_are_discarded_explicitly() {
    let mut ctx = ctx();
    ctx.define("x", Snippet::runtime("x", DataType::F32));

    let stmt = Stmt::Expr(Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::Int(1)));
    assert_eq!(generate_statement(&mut ctx, &stmt).unwrap(), "_ = (x + 1f);");
  }

  #[test]
  fn references_are_borrowed_by_const() {
    let mut ctx = ctx();
    let particles = DataType::array(DataType::vec(4, ScalarKind::F32), 16);
    ctx.define("particles", storage("particles", particles, Access::ReadWrite));

    let decl = generate_statement(&mut ctx, &Stmt::decl(DeclKind::Const, "ps", Expr::ident("particles"))).unwrap();
    assert_eq!(decl, "let ps = &particles;");

    let assign = Stmt::Expr(Expr::assign(
      AssignOp::Assign,
      Expr::index(Expr::ident("ps"), Expr::Int(0)),
      Expr::index(Expr::ident("ps"), Expr::Int(1)),
    ));
    assert_eq!(generate_statement(&mut ctx, &assign).unwrap(), "(*ps)[0u] = (*ps)[1u];");
  }

  #[test]
  fn references_are_not_copied_implicitly() {
    let mut ctx = ctx();
    ctx.define("buf", storage("buf", DataType::array(DataType::F32, 4), Access::Read));

    let err = generate_statement(&mut ctx, &Stmt::decl(DeclKind::Let, "copy", Expr::ident("buf"))).unwrap_err();
    assert!(
      matches!(err, Error::ExplicitCopyRequired { ref suggestion, .. } if suggestion == "array<f32, 4>(buf)"),
      "{}",
      err
    );
  }

  #[test]
  fn for_loops_scope_their_header() {
    let mut ctx = ctx();
    ctx.define("i", Snippet::runtime("i", DataType::F32));

    let stmt = Stmt::For {
      init: Some(Box::new(Stmt::decl(DeclKind::Let, "i", Expr::Int(0)))),
      cond: Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::Int(4))),
      update: Some(Expr::update(UpdateOp::Increment, Expr::ident("i"))),
      body: Box::new(Stmt::block([Stmt::Break])),
    };

    assert_eq!(
      generate_statement(&mut ctx, &stmt).unwrap(),
      "for (var i = 0i; (i < 4i); i++) {\n  break;\n}"
    );
    assert_eq!(ctx.lookup("i").map(|i| i.ty), Some(DataType::F32));
  }

  #[test]
  fn shadowed_locals_are_renamed() {
    let mut ctx = ctx();
    let block = generate_block(
      &mut ctx,
      &[
        Stmt::decl(DeclKind::Var, "x", Expr::Int(1)),
        Stmt::block([Stmt::decl(DeclKind::Var, "x", Expr::Bool(true))]),
      ],
    )
    .unwrap();

    assert_eq!(block, "{\n  var x = 1i;\n  {\n    var x_1 = true;\n  }\n}");
  }

  #[test]
  fn if_else_chains() {
    let mut ctx = ctx();
    ctx.define("a", Snippet::runtime("a", DataType::BOOL));

    let stmt = Stmt::If {
      cond: Expr::ident("a"),
      then: Box::new(Stmt::Return(None)),
      otherwise: Some(Box::new(Stmt::If {
        cond: Expr::Bool(false),
        then: Box::new(Stmt::Continue),
        otherwise: Some(Box::new(Stmt::block([Stmt::Break]))),
      })),
    };

    assert_eq!(
      generate_statement(&mut ctx, &stmt).unwrap(),
      "if a {\n  return;\n} else if false {\n  continue;\n} else {\n  break;\n}"
    );
  }

  #[test]
  fn updates_need_mutable_integers() {
    let mut ctx = ctx();
    ctx.define("n", Snippet::new(Value::Code("n".to_owned()), DataType::U32, Origin::Argument));

    let err = generate_statement(&mut ctx, &Stmt::Expr(Expr::update(UpdateOp::Increment, Expr::ident("n")))).unwrap_err();
    assert!(matches!(err, Error::AssignToImmutable { .. }));
  }

  #[test]
  fn immutable_bindings_reject_assignment() {
    let mut ctx = ctx();
    ctx.define("a", Snippet::new(Value::Code("a".to_owned()), DataType::F32, Origin::Argument));

    let block = [
      Stmt::decl(DeclKind::Const, "y", Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::Int(1))),
      Stmt::Expr(Expr::assign(AssignOp::Assign, Expr::ident("y"), Expr::Int(2))),
    ];

    match generate_block(&mut ctx, &block) {
      Err(Error::AssignToImmutable { target, .. }) => assert_eq!(target, "y"),
      other => panic!("unexpected result: {:?}", other),
    }

    let mut ctx = self::ctx();
    ctx.define("a", Snippet::new(Value::Code("a".to_owned()), DataType::F32, Origin::Argument));

    let block = [
      Stmt::decl(DeclKind::Const, "y", Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::Int(1))),
      Stmt::Expr(Expr::update(UpdateOp::Increment, Expr::ident("y"))),
    ];
    assert!(matches!(generate_block(&mut ctx, &block), Err(Error::AssignToImmutable { .. })));

    let mut ctx = self::ctx();
    ctx.define("a", Snippet::new(Value::Code("a".to_owned()), DataType::F32, Origin::Argument));

    let block = [
      Stmt::decl(DeclKind::Const, "y", Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::Int(1))),
      Stmt::decl(DeclKind::Let, "z", Expr::ident("y")),
      Stmt::Expr(Expr::assign(AssignOp::Assign, Expr::ident("z"), Expr::ident("y"))),
    ];
    assert_eq!(
      generate_block(&mut ctx, &block).unwrap(),
      "{\n  var y = (a + 1f);\n  var z = y;\n  z = y;\n}"
    );
  }
}
