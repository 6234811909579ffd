//! Errors and non-fatal diagnostics.
//!
//! Every failure aborts the whole compile: there is no partial output. Errors raised while a function, a root or a
//! resource is being resolved are wrapped in [`Error::Resolution`], which carries the chain of enclosing items so that
//! the message shows the full call path rather than only the innermost failure.

use crate::types::DataType;
use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  /// A set of operands has no type they can all be converted to.
  #[error("no common type for {context} among [{}]", TypeList(.types))]
  NoCommonType { context: String, types: Vec<DataType> },

  #[error("cannot convert a value of type `{from}` to `{to}`")]
  Conversion { from: DataType, to: DataType },

  #[error("type mismatch: {0}")]
  TypeMismatch(String),

  #[error("unresolved identifier `{0}`")]
  UnresolvedIdentifier(String),

  #[error("{0}")]
  InvalidConstruct(String),

  #[error("cannot assign to `{target}`: {reason}")]
  AssignToImmutable { target: String, reason: String },

  /// A reference would be copied implicitly.
  #[error("{what} is a reference and cannot be used here directly; copy it explicitly with `{suggestion}`")]
  ExplicitCopyRequired { what: String, suggestion: String },

  #[error("swizzle `.{0}` mixes the `xyzw` and `rgba` letter sets")]
  MixedSwizzle(String),

  #[error("fields of `{ty}` do not match: missing [{}], unexpected [{}]", .missing.join(", "), .unexpected.join(", "))]
  FieldMismatch {
    ty: String,
    missing: Vec<String>,
    unexpected: Vec<String>,
  },

  #[error("`{what}` expects {expected} argument(s) or component(s), found {found}")]
  ArityMismatch {
    what: String,
    expected: usize,
    found: usize,
  },

  #[error("`{what}` is not callable (it is {kind})")]
  NotCallable { what: String, kind: &'static str },

  #[error("the type of argument #{index} of `{function}` cannot be resolved")]
  UnresolvedArgumentType { function: String, index: usize },

  #[error("expected a single return type, found [{}]; convert the returned values explicitly", TypeList(.types))]
  ReturnTypeMismatch { types: Vec<DataType> },

  /// A value that has no representation in the target language is used where one is required.
  #[error("`{what}` cannot be used as a shader value: {reason}")]
  Capability { what: String, reason: String },

  #[error("constant evaluation of `{function}` failed: {message}")]
  HostEvaluation { function: String, message: String },

  #[error(transparent)]
  Fmt(#[from] fmt::Error),

  #[error("{source}\n  while resolving {}", .path.join(" > "))]
  Resolution { path: Vec<String>, source: Box<Error> },
}

impl Error {
  /// Prefix the resolution path of this error with `label`.
  pub(crate) fn within(self, label: String) -> Self {
    match self {
      Error::Resolution { mut path, source } => {
        path.insert(0, label);
        Error::Resolution { path, source }
      }

      other => Error::Resolution {
        path: vec![label],
        source: Box::new(other),
      },
    }
  }

  /// The innermost error, without its resolution path.
  pub fn root_cause(&self) -> &Error {
    match self {
      Error::Resolution { source, .. } => source.root_cause(),
      other => other,
    }
  }
}

struct TypeList<'a>(&'a [DataType]);

impl fmt::Display for TypeList<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    for (i, ty) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }

      write!(f, "{}", ty)?;
    }

    Ok(())
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DiagnosticKind {
  /// Operands were cast implicitly to unify their types.
  ImplicitConversion,

  /// An integer literal is outside of the range the host represents exactly.
  PrecisionLoss,
}

/// A non-fatal warning recorded while compiling.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
  pub kind: DiagnosticKind,
  pub message: String,
  /// Names of the functions being compiled when the diagnostic was raised, outermost first.
  pub path: Vec<String>,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.path.is_empty() {
      f.write_str(&self.message)
    } else {
      write!(f, "{} (in {})", self.message, self.path.join(" > "))
    }
  }
}
