//! Compilation of the source language into WGSL.
//!
//! Expressions compile to [`Snippet`]s, statements to indented text. Both are driven by a [`ResolutionCtx`], which
//! carries the lexical scopes, the function being compiled and everything declared so far.

mod access;
mod construct;
mod expr;
mod stmt;

pub use self::{
  expr::generate_expression,
  stmt::{generate_block, generate_statement},
};

use crate::{
  ast::Expr,
  context::ResolutionCtx,
  conversion::{self, ConversionAction},
  error::{Error, Result},
  snippet::Snippet,
  types::DataType,
};

/// Compile an expression and dereference it if it is an implicit pointer.
fn value_of(ctx: &mut ResolutionCtx, expr: &Expr, expected: Option<&DataType>) -> Result<Snippet> {
  let snippet = generate_expression(ctx, expr, expected)?;
  conversion::deref_implicit(ctx, snippet)
}

/// Dereference any pointer, implicit or not.
fn auto_deref(ctx: &mut ResolutionCtx, snippet: Snippet) -> Result<Snippet> {
  match snippet.ty.undecorated() {
    DataType::Pointer { inner, .. } => {
      let inner = inner.undecorated().clone();
      conversion::apply(ctx, snippet, &ConversionAction::Deref, &inner)
    }

    _ => Ok(snippet),
  }
}

/// Refuse to copy a reference implicitly.
///
/// Scalars, vectors and matrices are copied freely; arrays and structs referred to by name must be copied with their
/// type constructor.
fn copyable(ctx: &mut ResolutionCtx, snippet: Snippet, source: &Expr) -> Result<Snippet> {
  let snippet = conversion::deref_implicit(ctx, snippet)?;

  if snippet.origin.is_reference() && !snippet.ty.is_naturally_ephemeral() {
    return Err(Error::ExplicitCopyRequired {
      what: format!("`{}`", source),
      suggestion: format!("{}({})", snippet.ty, source),
    });
  }

  Ok(snippet)
}

/// Compile `expr` as a value stored into a location of type `ty`.
fn stored(ctx: &mut ResolutionCtx, expr: &Expr, ty: &DataType) -> Result<Snippet> {
  let snippet = generate_expression(ctx, expr, Some(ty))?;
  let snippet = copyable(ctx, snippet, expr)?;
  conversion::try_convert(ctx, snippet, ty)
}
