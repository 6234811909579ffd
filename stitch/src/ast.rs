//! The restricted source language.
//!
//! Function bodies are built from this closed set of expressions and statements, either by hand or by the `shader!`
//! macro of the `stitch-edsl` crate.

use crate::types::DataType;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Eq,
  Neq,
  Lt,
  Lte,
  Gt,
  Gte,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
}

impl BinaryOp {
  pub const fn symbol(self) -> &'static str {
    match self {
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Rem => "%",
      BinaryOp::Eq => "==",
      BinaryOp::Neq => "!=",
      BinaryOp::Lt => "<",
      BinaryOp::Lte => "<=",
      BinaryOp::Gt => ">",
      BinaryOp::Gte => ">=",
      BinaryOp::BitAnd => "&",
      BinaryOp::BitOr => "|",
      BinaryOp::BitXor => "^",
      BinaryOp::Shl => "<<",
      BinaryOp::Shr => ">>",
    }
  }

  pub const fn is_comparison(self) -> bool {
    matches!(
      self,
      BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte
    )
  }

  pub const fn is_shift(self) -> bool {
    matches!(self, BinaryOp::Shl | BinaryOp::Shr)
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogicalOp {
  And,
  Or,
}

impl LogicalOp {
  pub const fn symbol(self) -> &'static str {
    match self {
      LogicalOp::And => "&&",
      LogicalOp::Or => "||",
    }
  }
}

/// `=` or a compound assignment (`+=`, `<<=`…), carrying the underlying operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssignOp {
  Assign,
  Compound(BinaryOp),
}

impl fmt::Display for AssignOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      AssignOp::Assign => f.write_str("="),
      AssignOp::Compound(op) => write!(f, "{}=", op.symbol()),
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UnaryOp {
  Neg,
  Not,
  BitNot,
}

impl UnaryOp {
  pub const fn symbol(self) -> &'static str {
    match self {
      UnaryOp::Neg => "-",
      UnaryOp::Not => "!",
      UnaryOp::BitNot => "~",
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateOp {
  Increment,
  Decrement,
}

impl UpdateOp {
  pub const fn symbol(self) -> &'static str {
    match self {
      UpdateOp::Increment => "++",
      UpdateOp::Decrement => "--",
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
  Ident(String),
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Logical {
    op: LogicalOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Assign {
    op: AssignOp,
    target: Box<Expr>,
    value: Box<Expr>,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  /// Post-increment or post-decrement.
  Update {
    op: UpdateOp,
    target: Box<Expr>,
  },
  Member {
    object: Box<Expr>,
    property: String,
  },
  Index {
    object: Box<Expr>,
    index: Box<Expr>,
  },
  Call {
    callee: Box<Expr>,
    args: Vec<Expr>,
  },
  Object(Vec<(String, Expr)>),
  Array(Vec<Expr>),
}

impl Expr {
  pub fn ident(name: impl Into<String>) -> Self {
    Expr::Ident(name.into())
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Expr::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Self {
    Expr::Logical {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(op: AssignOp, target: Expr, value: Expr) -> Self {
    Expr::Assign {
      op,
      target: Box::new(target),
      value: Box::new(value),
    }
  }

  pub fn unary(op: UnaryOp, operand: Expr) -> Self {
    Expr::Unary {
      op,
      operand: Box::new(operand),
    }
  }

  pub fn update(op: UpdateOp, target: Expr) -> Self {
    Expr::Update {
      op,
      target: Box::new(target),
    }
  }

  pub fn member(object: Expr, property: impl Into<String>) -> Self {
    Expr::Member {
      object: Box::new(object),
      property: property.into(),
    }
  }

  pub fn index(object: Expr, index: Expr) -> Self {
    Expr::Index {
      object: Box::new(object),
      index: Box::new(index),
    }
  }

  pub fn call(callee: Expr, args: impl IntoIterator<Item = Expr>) -> Self {
    Expr::Call {
      callee: Box::new(callee),
      args: args.into_iter().collect(),
    }
  }

  pub fn object<N>(fields: impl IntoIterator<Item = (N, Expr)>) -> Self
  where
    N: Into<String>,
  {
    Expr::Object(fields.into_iter().map(|(name, e)| (name.into(), e)).collect())
  }
}

/// Source-like rendering, used in error messages.
impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Expr::Ident(name) => f.write_str(name),
      Expr::Bool(b) => write!(f, "{}", b),
      Expr::Int(i) => write!(f, "{}", i),
      Expr::Float(x) => write!(f, "{:?}", x),
      Expr::Str(s) => write!(f, "{:?}", s),
      Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
      Expr::Logical { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
      Expr::Assign { op, target, value } => write!(f, "{} {} {}", target, op, value),
      Expr::Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
      Expr::Update { op, target } => write!(f, "{}{}", target, op.symbol()),
      Expr::Member { object, property } => write!(f, "{}.{}", object, property),
      Expr::Index { object, index } => write!(f, "{}[{}]", object, index),

      Expr::Call { callee, args } => {
        write!(f, "{}(", callee)?;
        write_list(f, args)?;
        f.write_str(")")
      }

      Expr::Object(fields) => {
        f.write_str("{ ")?;

        for (i, (name, value)) in fields.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }

          write!(f, "{}: {}", name, value)?;
        }

        f.write_str(" }")
      }

      Expr::Array(items) => {
        f.write_str("[")?;
        write_list(f, items)?;
        f.write_str("]")
      }
    }
  }
}

fn write_list(f: &mut fmt::Formatter, items: &[Expr]) -> fmt::Result {
  for (i, item) in items.iter().enumerate() {
    if i > 0 {
      f.write_str(", ")?;
    }

    write!(f, "{}", item)?;
  }

  Ok(())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeclKind {
  /// Binds compile-time constants without emitting anything.
  Const,
  Let,
  Var,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
  Expr(Expr),
  Decl {
    kind: DeclKind,
    name: String,
    init: Expr,
  },
  If {
    cond: Expr,
    then: Box<Stmt>,
    otherwise: Option<Box<Stmt>>,
  },
  For {
    init: Option<Box<Stmt>>,
    cond: Option<Expr>,
    update: Option<Expr>,
    body: Box<Stmt>,
  },
  While {
    cond: Expr,
    body: Box<Stmt>,
  },
  Return(Option<Expr>),
  Break,
  Continue,
  Block(Vec<Stmt>),
}

impl Stmt {
  pub fn decl(kind: DeclKind, name: impl Into<String>, init: Expr) -> Self {
    Stmt::Decl {
      kind,
      name: name.into(),
      init,
    }
  }

  pub fn ret(value: Expr) -> Self {
    Stmt::Return(Some(value))
  }

  pub fn block(stmts: impl IntoIterator<Item = Stmt>) -> Self {
    Stmt::Block(stmts.into_iter().collect())
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
  pub name: String,
  /// Declared type; inferred from the call site when absent.
  pub ty: Option<DataType>,
}

impl Param {
  pub fn new(name: impl Into<String>) -> Self {
    Param {
      name: name.into(),
      ty: None,
    }
  }

  pub fn typed(name: impl Into<String>, ty: DataType) -> Self {
    Param {
      name: name.into(),
      ty: Some(ty),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
  pub name: String,
  pub params: Vec<Param>,
  pub return_type: Option<DataType>,
  pub body: Vec<Stmt>,
}

impl FunctionDef {
  pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = Param>, body: impl IntoIterator<Item = Stmt>) -> Self {
    FunctionDef {
      name: name.into(),
      params: params.into_iter().collect(),
      return_type: None,
      body: body.into_iter().collect(),
    }
  }

  pub fn returns(mut self, ty: DataType) -> Self {
    self.return_type = Some(ty);
    self
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn display() {
    let e = Expr::call(
      Expr::ident("Particle"),
      [Expr::index(Expr::member(Expr::ident("buf"), "items"), Expr::Int(0))],
    );
    assert_eq!(e.to_string(), "Particle(buf.items[0])");

    let e = Expr::assign(
      AssignOp::Compound(BinaryOp::Shl),
      Expr::ident("x"),
      Expr::unary(UnaryOp::Neg, Expr::Float(1.5)),
    );
    assert_eq!(e.to_string(), "x <<= -1.5");
  }
}
