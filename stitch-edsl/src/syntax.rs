//! Translation of Rust syntax into code building `stitch` ASTs.
//!
//! Every function here takes a piece of Rust syntax and returns the tokens of an expression constructing the matching
//! `stitch::ast` node, or a spanned error for syntax the shader language has no counterpart for.

use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::{
  BinOp, Block, Expr, ExprBinary, ExprForLoop, ExprIf, FnArg, ItemFn, Lit, Local, LocalInit, Member, Pat, Path,
  RangeLimits, ReturnType, Stmt, Type, UnOp,
};

type Result<T> = syn::Result<T>;

fn unsupported(node: impl ToTokens, what: &str) -> syn::Error {
  syn::Error::new_spanned(node, format!("{} is not supported in shader code", what))
}

/// A function item, turned into a function returning its definition.
pub fn function(item: &ItemFn) -> Result<TokenStream> {
  let sig = &item.sig;

  if !sig.generics.params.is_empty() {
    return Err(unsupported(&sig.generics, "a generic function"));
  }

  if let Some(asyncness) = &sig.asyncness {
    return Err(unsupported(asyncness, "an async function"));
  }

  let params = sig.inputs.iter().map(param).collect::<Result<Vec<_>>>()?;

  let return_type = match &sig.output {
    ReturnType::Default => quote! { ::core::option::Option::None },
    ReturnType::Type(_, ty) => optional_type(ty)?,
  };

  let body = body(&item.block)?;

  let attrs = &item.attrs;
  let vis = &item.vis;
  let ident = &sig.ident;
  let name = ident.to_string();

  Ok(quote! {
    #(#attrs)*
    #vis fn #ident() -> ::stitch::ast::FunctionDef {
      ::stitch::ast::FunctionDef {
        name: ::std::string::String::from(#name),
        params: ::std::vec![#(#params),*],
        return_type: #return_type,
        body: ::std::vec![#(#body),*],
      }
    }
  })
}

fn param(arg: &FnArg) -> Result<TokenStream> {
  let typed = match arg {
    FnArg::Typed(typed) => typed,
    FnArg::Receiver(receiver) => return Err(unsupported(receiver, "`self`")),
  };

  let name = match &*typed.pat {
    Pat::Ident(ident) if ident.mutability.is_some() => {
      return Err(syn::Error::new_spanned(
        ident,
        "parameters are immutable; copy the parameter into a `let mut` binding instead",
      ))
    }
    Pat::Ident(ident) if ident.by_ref.is_none() && ident.subpat.is_none() => ident.ident.to_string(),
    other => return Err(unsupported(other, "this parameter pattern")),
  };

  let ty = optional_type(&typed.ty)?;

  Ok(quote! {
    ::stitch::ast::Param {
      name: ::std::string::String::from(#name),
      ty: #ty,
    }
  })
}

/// `_` is inferred; anything else is a type.
fn optional_type(ty: &Type) -> Result<TokenStream> {
  match ty {
    Type::Infer(_) => Ok(quote! { ::core::option::Option::None }),
    ty => {
      let ty = data_type(ty)?;
      Ok(quote! { ::core::option::Option::Some(#ty) })
    }
  }
}

fn data_type(ty: &Type) -> Result<TokenStream> {
  match ty {
    Type::Paren(paren) => data_type(&paren.elem),
    Type::Group(group) => data_type(&group.elem),
    Type::Tuple(tuple) if tuple.elems.is_empty() => Ok(quote! { ::stitch::types::DataType::Void }),

    Type::Array(array) => {
      let element = data_type(&array.elem)?;
      let len = &array.len;
      Ok(quote! { ::stitch::types::DataType::array(#element, (#len) as u32) })
    }

    Type::Path(path) if path.qself.is_none() => {
      if let Some(builtin) = path.path.get_ident().and_then(|ident| builtin_type(&ident.to_string())) {
        return Ok(builtin);
      }

      // user types are functions returning their `DataType`
      let path = &path.path;
      Ok(quote! { #path() })
    }

    other => Err(unsupported(other, "this type")),
  }
}

fn scalar_kind(suffix: &str) -> Option<TokenStream> {
  let kind = match suffix {
    "f" => quote! { F32 },
    "h" => quote! { F16 },
    "i" => quote! { I32 },
    "u" => quote! { U32 },
    "b" => quote! { Bool },
    _ => return None,
  };

  Some(quote! { ::stitch::types::ScalarKind::#kind })
}

fn dimension(c: char) -> Option<u8> {
  match c {
    '2' => Some(2),
    '3' => Some(3),
    '4' => Some(4),
    _ => None,
  }
}

/// `f32`, `vec3f`, `mat4x4h`…
fn builtin_type(name: &str) -> Option<TokenStream> {
  let scalar = match name {
    "f32" => Some(quote! { F32 }),
    "f16" => Some(quote! { F16 }),
    "i32" => Some(quote! { I32 }),
    "u32" => Some(quote! { U32 }),
    "bool" => Some(quote! { BOOL }),
    _ => None,
  };

  if let Some(scalar) = scalar {
    return Some(quote! { ::stitch::types::DataType::#scalar });
  }

  if let Some(rest) = name.strip_prefix("vec") {
    let mut chars = rest.chars();
    let dim = dimension(chars.next()?)?;
    let kind = scalar_kind(chars.as_str())?;
    return Some(quote! { ::stitch::types::DataType::vec(#dim, #kind) });
  }

  let rest = name.strip_prefix("mat")?;
  let chars: Vec<char> = rest.chars().collect();

  match chars.as_slice() {
    [cols, 'x', rows, suffix @ ('f' | 'h')] if cols == rows => {
      let dim = dimension(*cols)?;
      let kind = scalar_kind(&suffix.to_string())?;
      Some(quote! { ::stitch::types::DataType::mat(#dim, #kind) })
    }
    _ => None,
  }
}

/// The body of a function: a trailing expression is returned.
fn body(block: &Block) -> Result<Vec<TokenStream>> {
  let last = block.stmts.len().checked_sub(1);

  block
    .stmts
    .iter()
    .enumerate()
    .map(|(i, stmt)| match stmt {
      Stmt::Expr(expr, None) if Some(i) == last && !is_statement_like(expr) => {
        let expr = expression(expr)?;
        Ok(quote! { ::stitch::ast::Stmt::Return(::core::option::Option::Some(#expr)) })
      }

      stmt => statement(stmt),
    })
    .collect()
}

fn is_statement_like(expr: &Expr) -> bool {
  match expr {
    Expr::If(_)
    | Expr::While(_)
    | Expr::ForLoop(_)
    | Expr::Loop(_)
    | Expr::Block(_)
    | Expr::Return(_)
    | Expr::Break(_)
    | Expr::Continue(_)
    | Expr::Assign(_) => true,
    Expr::Binary(binary) => matches!(operator(&binary.op), Some((_, true))),
    _ => false,
  }
}

fn block(block: &Block) -> Result<TokenStream> {
  let stmts = block.stmts.iter().map(statement).collect::<Result<Vec<_>>>()?;
  Ok(quote! { ::stitch::ast::Stmt::Block(::std::vec![#(#stmts),*]) })
}

fn statement(stmt: &Stmt) -> Result<TokenStream> {
  match stmt {
    Stmt::Local(local) => declaration(local),
    Stmt::Expr(expr, _) => expression_statement(expr),
    Stmt::Item(item) => Err(unsupported(item, "a nested item")),
    Stmt::Macro(mac) => Err(unsupported(mac, "a macro invocation")),
  }
}

/// `let` binds a constant, `let mut` declares a variable.
fn declaration(local: &Local) -> Result<TokenStream> {
  let (pat, ty) = match &local.pat {
    Pat::Type(typed) => (&*typed.pat, Some(&*typed.ty)),
    pat => (pat, None),
  };

  let (name, mutable) = match pat {
    Pat::Ident(ident) if ident.by_ref.is_none() && ident.subpat.is_none() => {
      (ident.ident.to_string(), ident.mutability.is_some())
    }
    other => return Err(unsupported(other, "this binding pattern")),
  };

  let init = match &local.init {
    Some(LocalInit {
      diverge: Some((else_token, _)),
      ..
    }) => return Err(unsupported(else_token, "`let ... else`")),
    Some(init) => expression(&init.expr)?,
    None => return Err(syn::Error::new_spanned(local, "declarations need an initial value")),
  };

  let init = match ty {
    Some(ty) => call(type_callee(ty)?, vec![init]),
    None => init,
  };

  let kind = if mutable {
    quote! { Let }
  } else {
    quote! { Const }
  };

  Ok(quote! { ::stitch::ast::Stmt::decl(::stitch::ast::DeclKind::#kind, #name, #init) })
}

fn expression_statement(expr: &Expr) -> Result<TokenStream> {
  match expr {
    Expr::If(expr_if) => if_statement(expr_if),

    Expr::While(expr_while) => {
      if let Some(label) = &expr_while.label {
        return Err(unsupported(label, "a loop label"));
      }

      let cond = expression(&expr_while.cond)?;
      let body = block(&expr_while.body)?;
      Ok(quote! { ::stitch::ast::Stmt::While { cond: #cond, body: ::std::boxed::Box::new(#body) } })
    }

    Expr::Loop(expr_loop) => {
      if let Some(label) = &expr_loop.label {
        return Err(unsupported(label, "a loop label"));
      }

      let body = block(&expr_loop.body)?;
      Ok(quote! {
        ::stitch::ast::Stmt::While {
          cond: ::stitch::ast::Expr::Bool(true),
          body: ::std::boxed::Box::new(#body),
        }
      })
    }

    Expr::ForLoop(for_loop) => for_statement(for_loop),

    Expr::Block(expr_block) => {
      if let Some(label) = &expr_block.label {
        return Err(unsupported(label, "a block label"));
      }

      block(&expr_block.block)
    }

    Expr::Return(ret) => match &ret.expr {
      Some(value) => {
        let value = expression(value)?;
        Ok(quote! { ::stitch::ast::Stmt::Return(::core::option::Option::Some(#value)) })
      }
      None => Ok(quote! { ::stitch::ast::Stmt::Return(::core::option::Option::None) }),
    },

    Expr::Break(brk) if brk.label.is_none() && brk.expr.is_none() => Ok(quote! { ::stitch::ast::Stmt::Break }),

    Expr::Continue(cont) if cont.label.is_none() => Ok(quote! { ::stitch::ast::Stmt::Continue }),

    expr => {
      let expr = expression(expr)?;
      Ok(quote! { ::stitch::ast::Stmt::Expr(#expr) })
    }
  }
}

fn if_statement(expr: &ExprIf) -> Result<TokenStream> {
  let cond = expression(&expr.cond)?;
  let then = block(&expr.then_branch)?;

  let otherwise = match &expr.else_branch {
    Some((_, otherwise)) => {
      let otherwise = match &**otherwise {
        Expr::If(chained) => if_statement(chained)?,
        Expr::Block(otherwise) => block(&otherwise.block)?,
        other => return Err(unsupported(other, "this `else` branch")),
      };

      quote! { ::core::option::Option::Some(::std::boxed::Box::new(#otherwise)) }
    }

    None => quote! { ::core::option::Option::None },
  };

  Ok(quote! {
    ::stitch::ast::Stmt::If {
      cond: #cond,
      then: ::std::boxed::Box::new(#then),
      otherwise: #otherwise,
    }
  })
}

/// `for i in a..b` is a counting loop on a variable.
fn for_statement(expr: &ExprForLoop) -> Result<TokenStream> {
  if let Some(label) = &expr.label {
    return Err(unsupported(label, "a loop label"));
  }

  let name = match &*expr.pat {
    Pat::Ident(ident) if ident.by_ref.is_none() && ident.subpat.is_none() => ident.ident.to_string(),
    other => return Err(unsupported(other, "this loop pattern")),
  };

  let (start, end, limits) = match &*expr.expr {
    Expr::Range(range) => match (&range.start, &range.end) {
      (Some(start), Some(end)) => (start, end, &range.limits),
      _ => return Err(syn::Error::new_spanned(range, "loop ranges need both bounds")),
    },
    other => return Err(unsupported(other, "iterating over anything but a range")),
  };

  let start = expression(start)?;
  let end = expression(end)?;
  let cmp = match limits {
    RangeLimits::HalfOpen(_) => quote! { Lt },
    RangeLimits::Closed(_) => quote! { Lte },
  };
  let body = block(&expr.body)?;

  Ok(quote! {
    ::stitch::ast::Stmt::For {
      init: ::core::option::Option::Some(::std::boxed::Box::new(
        ::stitch::ast::Stmt::decl(::stitch::ast::DeclKind::Let, #name, #start)
      )),
      cond: ::core::option::Option::Some(::stitch::ast::Expr::binary(
        ::stitch::ast::BinaryOp::#cmp,
        ::stitch::ast::Expr::ident(#name),
        #end,
      )),
      update: ::core::option::Option::Some(::stitch::ast::Expr::update(
        ::stitch::ast::UpdateOp::Increment,
        ::stitch::ast::Expr::ident(#name),
      )),
      body: ::std::boxed::Box::new(#body),
    }
  })
}

fn call(callee: TokenStream, args: Vec<TokenStream>) -> TokenStream {
  quote! {
    ::stitch::ast::Expr::Call {
      callee: ::std::boxed::Box::new(#callee),
      args: ::std::vec![#(#args),*],
    }
  }
}

/// A type used as a conversion, as in `x as f32`: only named types can be called.
fn type_callee(ty: &Type) -> Result<TokenStream> {
  match ty {
    Type::Path(path) if path.qself.is_none() => path_expression(&path.path),
    other => Err(syn::Error::new_spanned(
      other,
      "only named types can be used in conversions and annotations",
    )),
  }
}

/// `a::b::c` is `a.b.c`.
fn path_expression(path: &Path) -> Result<TokenStream> {
  if let Some(colon) = &path.leading_colon {
    return Err(unsupported(colon, "an absolute path"));
  }

  let mut expr = None;

  for segment in &path.segments {
    if !segment.arguments.is_empty() {
      return Err(unsupported(&segment.arguments, "a generic argument"));
    }

    let name = segment.ident.to_string();
    expr = Some(match expr {
      None => quote! { ::stitch::ast::Expr::ident(#name) },
      Some(object) => quote! { ::stitch::ast::Expr::member(#object, #name) },
    });
  }

  expr.ok_or_else(|| syn::Error::new_spanned(path, "empty path"))
}

/// The operator of a binary expression, and whether it is a compound assignment.
fn operator(op: &BinOp) -> Option<(TokenStream, bool)> {
  let (op, assign) = match op {
    BinOp::Add(_) => (quote! { Add }, false),
    BinOp::Sub(_) => (quote! { Sub }, false),
    BinOp::Mul(_) => (quote! { Mul }, false),
    BinOp::Div(_) => (quote! { Div }, false),
    BinOp::Rem(_) => (quote! { Rem }, false),
    BinOp::BitXor(_) => (quote! { BitXor }, false),
    BinOp::BitAnd(_) => (quote! { BitAnd }, false),
    BinOp::BitOr(_) => (quote! { BitOr }, false),
    BinOp::Shl(_) => (quote! { Shl }, false),
    BinOp::Shr(_) => (quote! { Shr }, false),
    BinOp::Eq(_) => (quote! { Eq }, false),
    BinOp::Lt(_) => (quote! { Lt }, false),
    BinOp::Le(_) => (quote! { Lte }, false),
    BinOp::Ne(_) => (quote! { Neq }, false),
    BinOp::Ge(_) => (quote! { Gte }, false),
    BinOp::Gt(_) => (quote! { Gt }, false),
    BinOp::AddAssign(_) => (quote! { Add }, true),
    BinOp::SubAssign(_) => (quote! { Sub }, true),
    BinOp::MulAssign(_) => (quote! { Mul }, true),
    BinOp::DivAssign(_) => (quote! { Div }, true),
    BinOp::RemAssign(_) => (quote! { Rem }, true),
    BinOp::BitXorAssign(_) => (quote! { BitXor }, true),
    BinOp::BitAndAssign(_) => (quote! { BitAnd }, true),
    BinOp::BitOrAssign(_) => (quote! { BitOr }, true),
    BinOp::ShlAssign(_) => (quote! { Shl }, true),
    BinOp::ShrAssign(_) => (quote! { Shr }, true),
    _ => return None,
  };

  Some((op, assign))
}

fn binary(expr: &ExprBinary) -> Result<TokenStream> {
  let lhs = expression(&expr.left)?;
  let rhs = expression(&expr.right)?;

  let logical = match expr.op {
    BinOp::And(_) => Some(quote! { And }),
    BinOp::Or(_) => Some(quote! { Or }),
    _ => None,
  };

  if let Some(op) = logical {
    return Ok(quote! { ::stitch::ast::Expr::logical(::stitch::ast::LogicalOp::#op, #lhs, #rhs) });
  }

  match operator(&expr.op) {
    Some((op, false)) => Ok(quote! { ::stitch::ast::Expr::binary(::stitch::ast::BinaryOp::#op, #lhs, #rhs) }),
    Some((op, true)) => Ok(quote! {
      ::stitch::ast::Expr::assign(
        ::stitch::ast::AssignOp::Compound(::stitch::ast::BinaryOp::#op),
        #lhs,
        #rhs,
      )
    }),
    None => Err(unsupported(&expr.op, "this operator")),
  }
}

fn literal(lit: &Lit) -> Result<TokenStream> {
  match lit {
    Lit::Bool(b) => {
      let value = b.value;
      Ok(quote! { ::stitch::ast::Expr::Bool(#value) })
    }

    Lit::Int(int) => {
      let value: i64 = int.base10_parse()?;
      suffixed(quote! { ::stitch::ast::Expr::Int(#value) }, int.suffix(), lit)
    }

    Lit::Float(float) => {
      let value: f64 = float.base10_parse()?;
      suffixed(quote! { ::stitch::ast::Expr::Float(#value) }, float.suffix(), lit)
    }

    Lit::Str(s) => {
      let value = s.value();
      Ok(quote! { ::stitch::ast::Expr::Str(::std::string::String::from(#value)) })
    }

    other => Err(unsupported(other, "this literal")),
  }
}

/// `1u32` is `u32(1)`.
fn suffixed(expr: TokenStream, suffix: &str, lit: &Lit) -> Result<TokenStream> {
  match suffix {
    "" => Ok(expr),
    "f32" | "f16" | "i32" | "u32" => Ok(call(quote! { ::stitch::ast::Expr::ident(#suffix) }, vec![expr])),
    _ => Err(syn::Error::new_spanned(
      lit,
      format!("`{}` literals are not supported in shader code", suffix),
    )),
  }
}

fn expressions<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> Result<Vec<TokenStream>> {
  exprs.into_iter().map(expression).collect()
}

fn expression(expr: &Expr) -> Result<TokenStream> {
  match expr {
    Expr::Lit(lit) if lit.attrs.is_empty() => literal(&lit.lit),

    Expr::Path(path) if path.qself.is_none() => path_expression(&path.path),

    Expr::Paren(paren) => expression(&paren.expr),

    Expr::Group(group) => expression(&group.expr),

    Expr::Binary(binary_expr) => binary(binary_expr),

    Expr::Assign(assign) => {
      let target = expression(&assign.left)?;
      let value = expression(&assign.right)?;
      Ok(quote! { ::stitch::ast::Expr::assign(::stitch::ast::AssignOp::Assign, #target, #value) })
    }

    Expr::Unary(unary) => {
      let op = match unary.op {
        UnOp::Neg(_) => quote! { Neg },
        UnOp::Not(_) => quote! { Not },
        UnOp::Deref(_) => {
          return Err(syn::Error::new_spanned(
            unary,
            "explicit dereferences are not supported in shader code; pointers are dereferenced automatically",
          ))
        }
        _ => return Err(unsupported(unary, "this unary operator")),
      };
      let operand = expression(&unary.expr)?;
      Ok(quote! { ::stitch::ast::Expr::unary(::stitch::ast::UnaryOp::#op, #operand) })
    }

    Expr::Field(field) => match &field.member {
      Member::Named(ident) => {
        let object = expression(&field.base)?;
        let property = ident.to_string();
        Ok(quote! { ::stitch::ast::Expr::member(#object, #property) })
      }
      Member::Unnamed(index) => Err(unsupported(index, "a tuple field")),
    },

    Expr::Index(index) => {
      let object = expression(&index.expr)?;
      let i = expression(&index.index)?;
      Ok(quote! { ::stitch::ast::Expr::index(#object, #i) })
    }

    Expr::Call(expr_call) => {
      let callee = expression(&expr_call.func)?;
      Ok(call(callee, expressions(&expr_call.args)?))
    }

    Expr::MethodCall(method) => {
      if let Some(turbofish) = &method.turbofish {
        return Err(unsupported(turbofish, "a turbofish"));
      }

      let receiver = expression(&method.receiver)?;
      let name = method.method.to_string();
      let callee = quote! { ::stitch::ast::Expr::member(#receiver, #name) };
      Ok(call(callee, expressions(&method.args)?))
    }

    Expr::Cast(cast) => {
      let callee = type_callee(&cast.ty)?;
      let value = expression(&cast.expr)?;
      Ok(call(callee, vec![value]))
    }

    Expr::Struct(structure) => {
      if let Some(rest) = &structure.rest {
        return Err(unsupported(rest, "a functional record update"));
      }

      if structure.qself.is_some() {
        return Err(unsupported(structure, "a qualified struct path"));
      }

      let callee = path_expression(&structure.path)?;
      let mut fields = Vec::with_capacity(structure.fields.len());

      for field in &structure.fields {
        let name = match &field.member {
          Member::Named(ident) => ident.to_string(),
          Member::Unnamed(index) => return Err(unsupported(index, "a tuple struct field")),
        };
        let value = expression(&field.expr)?;
        fields.push(quote! { (::std::string::String::from(#name), #value) });
      }

      let object = quote! { ::stitch::ast::Expr::Object(::std::vec![#(#fields),*]) };
      Ok(call(callee, vec![object]))
    }

    Expr::Array(array) => {
      let items = expressions(&array.elems)?;
      Ok(quote! { ::stitch::ast::Expr::Array(::std::vec![#(#items),*]) })
    }

    other => Err(unsupported(other, "this expression")),
  }
}
