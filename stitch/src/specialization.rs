//! Per-call-site specialization of helper functions.
//!
//! Helper functions carry no types of their own: every distinct tuple of argument types (under the active slot
//! bindings) compiles to its own target-language function, declared once and reused by every later call with the same
//! types.

use crate::{
  ast::Expr,
  codegen::generate_block,
  compile::{EntryPoint, IoAttribute},
  context::{BindingKey, FnFrame, ResolutionCtx},
  conversion,
  error::{Error, Result},
  fun::HelperFn,
  snippet::{Origin, Snippet, Value},
  stitch,
  stitch::Args,
  types::DataType,
};
use std::{collections::HashMap, rc::Rc};
use tracing::debug;

/// A helper function compiled for one tuple of argument types.
#[derive(Debug)]
pub struct SpecializedFn {
  /// Name of the function in the output.
  pub name: String,
  pub return_type: DataType,
  // ids of the resources used, directly or through callees
  pub(crate) resources: Vec<usize>,
  pub(crate) functions: Vec<String>,
}

#[derive(Debug)]
struct Entry {
  arg_types: Vec<DataType>,
  bindings: BindingKey,
  handle: Rc<SpecializedFn>,
}

#[derive(Debug, Default)]
pub(crate) struct SpecializationCache {
  entries: HashMap<usize, Vec<Entry>>,
}

impl SpecializationCache {
  fn find(&self, function: usize, arg_types: &[DataType], bindings: &BindingKey) -> Option<Rc<SpecializedFn>> {
    self
      .entries
      .get(&function)?
      .iter()
      .find(|entry| entry.arg_types == arg_types && &entry.bindings == bindings)
      .map(|entry| entry.handle.clone())
  }

  fn insert(&mut self, function: usize, arg_types: Vec<DataType>, bindings: BindingKey, handle: Rc<SpecializedFn>) {
    self.entries.entry(function).or_default().push(Entry {
      arg_types,
      bindings,
      handle,
    });
  }
}

/// How a parameter is bound in a specialization.
pub(crate) enum ParamBinding {
  /// An actual parameter of the emitted function.
  Runtime { ty: DataType, io: Option<IoAttribute> },

  /// A value substituted for the parameter while compiling the body.
  Value(Snippet),
}

impl ParamBinding {
  fn describe(&self) -> String {
    match self {
      ParamBinding::Runtime { ty, .. } => ty.to_string(),
      ParamBinding::Value(value) if value.ty.is_unknown() => value.value.kind_name().to_owned(),
      ParamBinding::Value(value) => format!("const {}", value.ty),
    }
  }
}

/// Compile a call to a helper function, specializing it for the types of `args` if not done yet.
pub(crate) fn call_helper(ctx: &mut ResolutionCtx, f: &Rc<HelperFn>, args: Vec<Snippet>, exprs: &[Expr]) -> Result<Snippet> {
  let def = f.definition();
  let mut param_types = Vec::with_capacity(args.len());

  for (index, ((arg, expr), param)) in args.iter().zip(exprs).zip(&def.params).enumerate() {
    if arg.ty.is_unknown() {
      return Err(Error::UnresolvedArgumentType {
        function: def.name.clone(),
        index,
      });
    }

    if arg.origin == Origin::ConstantRef {
      return Err(Error::ExplicitCopyRequired {
        what: format!("argument `{}` of `{}`", expr, def.name),
        suggestion: format!("{}({})", arg.ty, expr),
      });
    }

    let ty = match &param.ty {
      Some(ty) => ty.clone(),
      None => arg.ty.undecorated().deref_implicit().concretize(),
    };

    param_types.push(ty);
  }

  let id = ctx.function_id(f);
  let bindings = ctx.with_bindings(f.bindings(), |ctx| Ok(ctx.binding_key()))?;

  let handle = match ctx.specializations.find(id, &param_types, &bindings) {
    Some(handle) => handle,

    None => {
      if ctx.in_progress.contains(&id) {
        return Err(Error::InvalidConstruct(format!(
          "recursive call to `{}`; recursion is not supported",
          def.name
        )));
      }

      let params = param_types
        .iter()
        .map(|ty| ParamBinding::Runtime { ty: ty.clone(), io: None })
        .collect();

      ctx.in_progress.push(id);
      let specialized = specialize(ctx, f, params, None, None);
      ctx.in_progress.pop();

      let handle = specialized?;
      ctx.specializations.insert(id, param_types.clone(), bindings, handle.clone());
      handle
    }
  };

  ctx.note_function_use(&handle);

  let args = conversion::convert_all(ctx, args, &param_types)?;
  let code = stitch!(ctx, "{}({})", handle.name, Args(&args));
  Ok(Snippet::runtime(code, handle.return_type.clone()))
}

/// Compile and declare one specialization of `f`.
pub(crate) fn specialize(
  ctx: &mut ResolutionCtx,
  f: &Rc<HelperFn>,
  params: Vec<ParamBinding>,
  entry: Option<&EntryPoint>,
  output: Option<&IoAttribute>,
) -> Result<Rc<SpecializedFn>> {
  let def = f.definition();

  if def.params.len() != params.len() {
    return Err(Error::ArityMismatch {
      what: def.name.clone(),
      expected: def.params.len(),
      found: params.len(),
    });
  }

  let described: Vec<String> = params.iter().map(ParamBinding::describe).collect();
  let label = format!("{}({})", def.name, described.join(", "));

  ctx.with_path(label.clone(), |ctx| {
    ctx.with_bindings(f.bindings(), |ctx| {
      let name = ctx.make_unique(&def.name);
      let frame = FnFrame::new(label.clone(), f.externals(), def.return_type.clone());

      let ((signature, body), frame) = ctx.with_frame(frame, |ctx| {
        let mut signature = Vec::with_capacity(params.len());

        for (param, binding) in def.params.iter().zip(params) {
          match binding {
            ParamBinding::Runtime { ty, io } => {
              let local = ctx.local_name(&param.name);
              let ty_text = ctx.resolve_type(&ty)?;
              let io = io.map(|io| format!("{} ", io)).unwrap_or_default();

              signature.push(format!("{}{}: {}", io, local, ty_text));
              ctx.define(&param.name, Snippet::new(Value::Code(local), ty, Origin::Argument));
            }

            ParamBinding::Value(value) => ctx.define(&param.name, value),
          }
        }

        let body = generate_block(ctx, &def.body)?;
        Ok((signature, body))
      })?;

      let return_type = match &def.return_type {
        Some(ty) => ty.clone(),
        None if frame.returns.is_empty() => DataType::Void,
        None => conversion::unify(&frame.returns, None, false)
          .map(|unified| unified.target.concretize())
          .ok_or_else(|| Error::ReturnTypeMismatch {
            types: frame.returns.clone(),
          })?,
      };

      let mut text = String::new();

      if let Some(entry) = entry {
        text.push_str(&format!("{}\n", entry));
      }

      text.push_str(&format!("fn {}({})", name, signature.join(", ")));

      if !return_type.is_void() {
        let ty_text = ctx.resolve_type(&return_type)?;
        let io = output.map(|io| format!("{} ", io)).unwrap_or_default();
        text.push_str(&format!(" -> {}{}", io, ty_text));
      }

      text.push(' ');
      text.push_str(&body);
      ctx.declare(text);

      let handle = Rc::new(SpecializedFn {
        name: name.clone(),
        return_type,
        resources: frame.resources.into_iter().collect(),
        functions: frame.functions.into_iter().collect(),
      });

      debug!(function = %def.name, %name, "specialized {}", label);
      ctx.specialized.insert(name, handle.clone());

      Ok(handle)
    })
  })
}
