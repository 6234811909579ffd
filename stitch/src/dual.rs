//! Dual functions: operations that can run on the host while compiling or be emitted as shader code.
//!
//! A [`DualFn`] pairs a host implementation with an emitter. Calls first convert their arguments according to the
//! function's [`ArgConversion`] policy; if every converted argument is a compile-time constant, the host
//! implementation runs and its result is folded into a constant. Otherwise the emitter writes the call.

use crate::{
  context::ResolutionCtx,
  conversion,
  error::{Error, Result},
  snippet::Snippet,
  types::DataType,
  value::ConstValue,
};
use std::{fmt, rc::Rc};

/// A host value with its shader type.
#[derive(Clone, Debug, PartialEq)]
pub struct Typed {
  pub value: ConstValue,
  pub ty: DataType,
}

impl Typed {
  pub fn new(value: impl Into<ConstValue>, ty: DataType) -> Self {
    Typed {
      value: value.into(),
      ty,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostError {
  /// The operation cannot run on the host for these arguments; emit it instead.
  Unavailable,
  Failed(String),
}

pub type HostFn = Rc<dyn Fn(&[Typed]) -> Result<Typed, HostError>>;
pub type EmitFn = Rc<dyn Fn(&mut ResolutionCtx, &[Snippet]) -> Result<Snippet>>;
pub type ConversionFn = Rc<dyn Fn(&[DataType]) -> Result<Vec<DataType>>>;
pub type SignatureFn = Rc<dyn Fn(usize, Option<&DataType>) -> Vec<DataType>>;

/// Parameter types used as hints when compiling arguments (object and array literals need them).
#[derive(Clone)]
pub enum Signature {
  Fixed(Vec<DataType>),
  /// Computed from the argument count and the type expected by the call site.
  Computed(SignatureFn),
}

impl Signature {
  pub fn hints(&self, argc: usize, expected: Option<&DataType>) -> Vec<DataType> {
    match self {
      Signature::Fixed(types) => types.clone(),
      Signature::Computed(f) => f(argc, expected),
    }
  }
}

/// How arguments are converted before a call.
#[derive(Clone)]
pub enum ArgConversion {
  Keep,
  /// Convert every argument to one common type, optionally chosen among `restrict_to`.
  Unify {
    restrict_to: Option<Vec<DataType>>,
  },
  /// Compute the target type of every argument from the argument types.
  PerPosition(ConversionFn),
}

pub struct DualFn {
  name: String,
  host: Option<HostFn>,
  emit: EmitFn,
  signature: Option<Signature>,
  conversion: ArgConversion,
  arity: Option<usize>,
  fold: bool,
}

impl DualFn {
  pub fn new(
    name: impl Into<String>,
    emit: impl Fn(&mut ResolutionCtx, &[Snippet]) -> Result<Snippet> + 'static,
  ) -> Self {
    DualFn {
      name: name.into(),
      host: None,
      emit: Rc::new(emit),
      signature: None,
      conversion: ArgConversion::Keep,
      arity: None,
      fold: true,
    }
  }

  pub fn with_host(mut self, host: impl Fn(&[Typed]) -> Result<Typed, HostError> + 'static) -> Self {
    self.host = Some(Rc::new(host));
    self
  }

  pub fn with_signature(mut self, signature: Signature) -> Self {
    self.signature = Some(signature);
    self
  }

  pub fn with_conversion(mut self, conversion: ArgConversion) -> Self {
    self.conversion = conversion;
    self
  }

  pub fn with_arity(mut self, arity: usize) -> Self {
    self.arity = Some(arity);
    self
  }

  /// Always emit, even when every argument is constant.
  pub fn without_folding(mut self) -> Self {
    self.fold = false;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn signature(&self) -> Option<&Signature> {
    self.signature.as_ref()
  }

  pub fn call(&self, ctx: &mut ResolutionCtx, args: Vec<Snippet>) -> Result<Snippet> {
    if let Some(arity) = self.arity {
      if args.len() != arity {
        return Err(Error::ArityMismatch {
          what: self.name.clone(),
          expected: arity,
          found: args.len(),
        });
      }
    }

    let args = self.convert_args(ctx, args)?;

    if let Some(host) = self.host.as_ref().filter(|_| self.fold) {
      let values: Option<Vec<Typed>> = args
        .iter()
        .map(|arg| arg.as_const().map(|value| Typed::new(value.clone(), arg.ty.clone())))
        .collect();

      if let Some(values) = values {
        match host(&values) {
          Ok(result) => return Ok(Snippet::constant(result.value, result.ty)),
          Err(HostError::Unavailable) => (),
          Err(HostError::Failed(message)) => {
            return Err(Error::HostEvaluation {
              function: self.name.clone(),
              message,
            })
          }
        }
      }
    }

    (self.emit)(ctx, &args)
  }

  fn convert_args(&self, ctx: &mut ResolutionCtx, args: Vec<Snippet>) -> Result<Vec<Snippet>> {
    match &self.conversion {
      ArgConversion::Keep => Ok(args),

      ArgConversion::Unify { restrict_to } => {
        let types: Vec<DataType> = args.iter().map(|arg| arg.ty.clone()).collect();

        conversion::convert_to_common_type(ctx, args, restrict_to.as_deref(), true)?.ok_or_else(|| {
          Error::NoCommonType {
            context: format!("the arguments of `{}`", self.name),
            types,
          }
        })
      }

      ArgConversion::PerPosition(targets) => {
        let types: Vec<DataType> = args.iter().map(|arg| arg.ty.clone()).collect();
        let targets = targets(&types)?;

        if targets.len() != args.len() {
          return Err(Error::ArityMismatch {
            what: self.name.clone(),
            expected: targets.len(),
            found: args.len(),
          });
        }

        conversion::convert_all(ctx, args, &targets)
      }
    }
  }
}

impl fmt::Debug for DualFn {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("DualFn")
      .field("name", &self.name)
      .field("host", &self.host.is_some())
      .field("fold", &self.fold)
      .finish()
  }
}
