//! Compiling roots: the functions a pipeline calls into.

use crate::{
  context::{ArgKey, ItemKey, MemoKey, ResolutionCtx},
  error::{Diagnostic, Error, Result},
  fun::HelperFn,
  resource::ResourceBinding,
  snippet::Snippet,
  specialization::{self, ParamBinding},
  types::DataType,
};
use std::{fmt, rc::Rc};
use tracing::{trace, trace_span};

/// Options of a compile.
#[derive(Clone, Debug)]
pub struct CompileOptions {
  /// Record a diagnostic whenever operands are cast implicitly.
  pub implicit_conversion_warnings: bool,

  /// Spaces per indentation level.
  pub indent_width: usize,

  /// Group of the resources the compile assigns bindings to.
  pub bind_group: u32,
}

impl Default for CompileOptions {
  fn default() -> Self {
    CompileOptions {
      implicit_conversion_warnings: true,
      indent_width: 2,
      bind_group: 0,
    }
  }
}

/// Pipeline IO of a parameter or of the return value of an entry point.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum IoAttribute {
  Builtin(String),
  Location(u32),
}

impl fmt::Display for IoAttribute {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      IoAttribute::Builtin(name) => write!(f, "@builtin({})", name),
      IoAttribute::Location(location) => write!(f, "@location({})", location),
    }
  }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum EntryPoint {
  Compute { workgroup_size: [u32; 3] },
  Vertex,
  Fragment,
}

impl fmt::Display for EntryPoint {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      EntryPoint::Compute {
        workgroup_size: [x, y, z],
      } => write!(f, "@compute @workgroup_size({}, {}, {})", x, y, z),
      EntryPoint::Vertex => f.write_str("@vertex"),
      EntryPoint::Fragment => f.write_str("@fragment"),
    }
  }
}

/// An argument of a root.
#[derive(Clone, Debug)]
pub enum Argument {
  /// A parameter of the emitted function.
  Runtime { ty: DataType, io: Option<IoAttribute> },

  /// A value bound while compiling; the parameter disappears from the output.
  Value(Snippet),
}

impl Argument {
  pub fn runtime(ty: DataType) -> Self {
    Argument::Runtime { ty, io: None }
  }

  pub fn builtin(name: impl Into<String>, ty: DataType) -> Self {
    Argument::Runtime {
      ty,
      io: Some(IoAttribute::Builtin(name.into())),
    }
  }

  pub fn location(location: u32, ty: DataType) -> Self {
    Argument::Runtime {
      ty,
      io: Some(IoAttribute::Location(location)),
    }
  }

  pub fn value(value: Snippet) -> Self {
    Argument::Value(value)
  }

  fn key(&self) -> ArgKey {
    match self {
      Argument::Runtime { ty, io } => ArgKey::Runtime(ty.clone(), io.as_ref().map(IoAttribute::to_string)),
      Argument::Value(value) => ArgKey::Value(value.key()),
    }
  }

  fn binding(&self) -> ParamBinding {
    match self {
      Argument::Runtime { ty, io } => ParamBinding::Runtime {
        ty: ty.clone(),
        io: io.clone(),
      },
      Argument::Value(value) => ParamBinding::Value(value.clone()),
    }
  }
}

/// A function compiled with fixed arguments, optionally as a pipeline entry point.
#[derive(Clone, Debug)]
pub struct Root {
  pub function: Rc<HelperFn>,
  pub args: Vec<Argument>,
  pub entry: Option<EntryPoint>,
  pub output: Option<IoAttribute>,
}

impl Root {
  pub fn new(function: &Rc<HelperFn>, args: impl IntoIterator<Item = Argument>) -> Self {
    Root {
      function: function.clone(),
      args: args.into_iter().collect(),
      entry: None,
      output: None,
    }
  }

  pub fn entry(mut self, entry: EntryPoint) -> Self {
    self.entry = Some(entry);
    self
  }

  /// Attribute of the return value.
  pub fn output(mut self, output: IoAttribute) -> Self {
    self.output = Some(output);
    self
  }

  fn attributes(&self) -> String {
    let entry = self.entry.as_ref().map(EntryPoint::to_string).unwrap_or_default();
    let output = self.output.as_ref().map(IoAttribute::to_string).unwrap_or_default();
    format!("{}|{}", entry, output)
  }
}

/// A root once declared.
#[derive(Clone, Debug)]
pub struct ResolvedRoot {
  pub name: String,
  pub return_type: DataType,
  /// Resources used by the root, directly or through the functions it calls.
  pub resources: Vec<ResourceBinding>,
  /// Names of the helper specializations the root calls, directly or not.
  pub functions: Vec<String>,
}

impl ResolutionCtx {
  /// Declare a root, or find the declaration made by an earlier identical request.
  pub fn resolve_root(&mut self, root: &Root) -> Result<ResolvedRoot> {
    let function = &root.function;
    let id = self.function_id(function);
    let bindings = self.with_bindings(function.bindings(), |ctx| Ok(ctx.binding_key()))?;

    let key = MemoKey {
      item: ItemKey::Root {
        function: id,
        args: root.args.iter().map(Argument::key).collect(),
        attributes: root.attributes(),
      },
      bindings,
    };

    let name = self.memoized(key, |ctx| {
      if ctx.in_progress.contains(&id) {
        return Err(Error::InvalidConstruct(format!(
          "`{}` is being compiled already",
          function.definition().name
        )));
      }

      let params = root.args.iter().map(Argument::binding).collect();

      ctx.in_progress.push(id);
      let specialized = specialization::specialize(ctx, function, params, root.entry.as_ref(), root.output.as_ref());
      ctx.in_progress.pop();

      Ok(specialized?.name.clone())
    })?;

    let handle = self
      .specialized
      .get(&name)
      .cloned()
      .ok_or_else(|| Error::InvalidConstruct(format!("`{}` was never declared", name)))?;

    let resources = handle
      .resources
      .iter()
      .filter_map(|id| self.resource_bindings.get(id).cloned())
      .collect();

    Ok(ResolvedRoot {
      name,
      return_type: handle.return_type.clone(),
      resources,
      functions: handle.functions.clone(),
    })
  }
}

/// A single root compiled into a module.
#[derive(Clone, Debug)]
pub struct CompiledShader {
  pub code: String,
  pub name: String,
  pub return_type: DataType,
  pub resources: Vec<ResourceBinding>,
  pub functions: Vec<String>,
  pub diagnostics: Vec<Diagnostic>,
}

/// Several roots compiled into one module, sharing their declarations.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
  pub code: String,
  pub roots: Vec<ResolvedRoot>,
  /// Every resource declared in the module.
  pub resources: Vec<ResourceBinding>,
  pub diagnostics: Vec<Diagnostic>,
}

pub fn compile_function(root: &Root, options: CompileOptions) -> Result<CompiledShader> {
  let span = trace_span!("compile_function", root = %root.function.definition().name);
  let _enter = span.enter();
  trace!(args = root.args.len(), "compiling");

  let mut ctx = ResolutionCtx::new(options);
  let resolved = ctx.resolve_root(root)?;
  let (code, diagnostics) = ctx.into_parts();

  Ok(CompiledShader {
    code,
    name: resolved.name,
    return_type: resolved.return_type,
    resources: resolved.resources,
    functions: resolved.functions,
    diagnostics,
  })
}

pub fn compile_program(roots: &[Root], options: CompileOptions) -> Result<CompiledProgram> {
  trace!(roots = roots.len(), "compiling program");

  let mut ctx = ResolutionCtx::new(options);
  let mut resolved = Vec::with_capacity(roots.len());

  for root in roots {
    let span = trace_span!("root", name = %root.function.definition().name);
    let _enter = span.enter();

    resolved.push(ctx.resolve_root(root)?);
  }

  let resources = ctx.resource_bindings.values().cloned().collect();
  let (code, diagnostics) = ctx.into_parts();

  Ok(CompiledProgram {
    code,
    roots: resolved,
    resources,
    diagnostics,
  })
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn attributes() {
    assert_eq!(IoAttribute::Builtin("position".to_owned()).to_string(), "@builtin(position)");
    assert_eq!(IoAttribute::Location(1).to_string(), "@location(1)");

    assert_eq!(
      EntryPoint::Compute {
        workgroup_size: [64, 1, 1]
      }
      .to_string(),
      "@compute @workgroup_size(64, 1, 1)"
    );
    assert_eq!(EntryPoint::Fragment.to_string(), "@fragment");
  }

  #[test]
  fn default_options() {
    let options = CompileOptions::default();

    assert!(options.implicit_conversion_warnings);
    assert_eq!(options.indent_width, 2);
    assert_eq!(options.bind_group, 0);
  }
}
