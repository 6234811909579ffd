//! The resolution context threaded through a compile.
//!
//! A [`ResolutionCtx`] owns everything that lives for one top-level compile: the indentation level, the stack of
//! function frames and their lexical scopes, the active slot bindings, the memo table deduplicating struct, resource and
//! root declarations, the specialization cache, the name registry and the list of emitted declarations.

use crate::{
  ast::UnaryOp,
  compile::CompileOptions,
  dual::DualFn,
  error::{Diagnostic, DiagnosticKind, Error, Result},
  fun::{Externals, HelperFn, Slot},
  resource::{Resource, ResourceBinding},
  snippet::{Snippet, SnippetKey, Value},
  specialization::{SpecializationCache, SpecializedFn},
  stdlib::{self, ArithOp, Operators},
  types::{DataType, StructRef},
};
use indexmap::{IndexMap, IndexSet};
use std::{
  collections::{HashMap, HashSet},
  rc::Rc,
};
use tracing::warn;

/// Words that cannot name a declaration.
const RESERVED: &[&str] = &[
  "alias", "array", "bool", "break", "case", "const", "const_assert", "continue", "continuing", "default", "diagnostic",
  "discard", "else", "enable", "f16", "f32", "false", "fn", "for", "i32", "if", "let", "loop", "mat2x2", "mat3x3",
  "mat4x4", "override", "ptr", "requires", "return", "sampler", "struct", "switch", "true", "u32", "var", "vec2",
  "vec3", "vec4", "while", "abs", "min", "max", "clamp", "sqrt", "sin", "cos", "tan", "floor", "ceil", "fract", "exp",
  "log", "pow", "dot", "cross", "length", "distance", "normalize", "mix", "select", "arrayLength", "textureSample",
];

/// Identity of a slot binding set: slot ids and the values bound to them.
pub(crate) type BindingKey = Vec<(usize, SnippetKey)>;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) enum ArgKey {
  Runtime(DataType, Option<String>),
  Value(SnippetKey),
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) enum ItemKey {
  Struct(StructRef),
  Resource(usize),
  Root {
    function: usize,
    args: Vec<ArgKey>,
    attributes: String,
  },
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct MemoKey {
  pub(crate) item: ItemKey,
  pub(crate) bindings: BindingKey,
}

/// Small integer ids for reference-counted items, assigned on first use.
///
/// Items are kept alive by the arena so that their addresses are never reused during a compile.
pub(crate) struct IdArena<T> {
  ids: HashMap<*const T, (usize, Rc<T>)>,
}

impl<T> Default for IdArena<T> {
  fn default() -> Self {
    IdArena { ids: HashMap::new() }
  }
}

impl<T> IdArena<T> {
  pub(crate) fn id_of(&mut self, item: &Rc<T>) -> usize {
    let next = self.ids.len();
    self.ids.entry(Rc::as_ptr(item)).or_insert_with(|| (next, item.clone())).0
  }
}

#[derive(Default)]
struct NameRegistry {
  taken: HashSet<String>,
}

impl NameRegistry {
  /// `base` if free, otherwise `base_1`, `base_2`…
  fn make_unique_except(&mut self, base: &str, busy: impl Fn(&str) -> bool) -> String {
    let mut name = base.to_owned();
    let mut n = 0;

    while self.taken.contains(&name) || RESERVED.contains(&name.as_str()) || busy(&name) {
      n += 1;
      name = format!("{}_{}", base, n);
    }

    self.taken.insert(name.clone());
    name
  }
}

#[derive(Default)]
struct Scope {
  values: HashMap<String, Snippet>,
  // names emitted for the locals declared in this scope
  locals: HashSet<String>,
}

/// State of the function being compiled.
pub(crate) struct FnFrame {
  label: String,
  scopes: Vec<Scope>,
  externals: Rc<Externals>,
  declared_return: Option<DataType>,
  pub(crate) returns: Vec<DataType>,
  pub(crate) resources: IndexSet<usize>,
  pub(crate) functions: IndexSet<String>,
}

impl FnFrame {
  pub(crate) fn new(label: impl Into<String>, externals: Rc<Externals>, declared_return: Option<DataType>) -> Self {
    FnFrame {
      label: label.into(),
      scopes: vec![Scope::default()],
      externals,
      declared_return,
      returns: Vec::new(),
      resources: IndexSet::new(),
      functions: IndexSet::new(),
    }
  }
}

pub struct ResolutionCtx {
  options: CompileOptions,
  indent: usize,
  prelude: IndexMap<String, Snippet>,
  operators: Operators,
  // never empty: the bottom frame is the global one
  frames: Vec<FnFrame>,
  bindings: Vec<(Rc<Slot>, Snippet)>,
  memo: HashMap<MemoKey, String>,
  pub(crate) specializations: SpecializationCache,
  pub(crate) specialized: HashMap<String, Rc<SpecializedFn>>,
  pub(crate) in_progress: Vec<usize>,
  functions: IdArena<HelperFn>,
  slots: IdArena<Slot>,
  resources: IdArena<Resource>,
  pub(crate) resource_bindings: IndexMap<usize, ResourceBinding>,
  used_bindings: HashSet<u32>,
  next_binding: u32,
  names: NameRegistry,
  declarations: Vec<String>,
  diagnostics: Vec<Diagnostic>,
}

impl ResolutionCtx {
  pub fn new(options: CompileOptions) -> Self {
    ResolutionCtx {
      options,
      indent: 0,
      prelude: stdlib::prelude(),
      operators: Operators::new(),
      frames: vec![FnFrame::new("", Rc::new(Externals::new()), None)],
      bindings: Vec::new(),
      memo: HashMap::new(),
      specializations: SpecializationCache::default(),
      specialized: HashMap::new(),
      in_progress: Vec::new(),
      functions: IdArena::default(),
      slots: IdArena::default(),
      resources: IdArena::default(),
      resource_bindings: IndexMap::new(),
      used_bindings: HashSet::new(),
      next_binding: 0,
      names: NameRegistry::default(),
      declarations: Vec::new(),
      diagnostics: Vec::new(),
    }
  }

  pub fn options(&self) -> &CompileOptions {
    &self.options
  }

  /// Every declaration emitted so far, in dependency order.
  pub fn source(&self) -> String {
    let mut code = self.declarations.join("\n\n");
    code.push('\n');
    code
  }

  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  pub(crate) fn into_parts(self) -> (String, Vec<Diagnostic>) {
    let code = self.source();
    (code, self.diagnostics)
  }

  // indentation

  /// Whitespace of the current indentation level.
  pub fn indent(&self) -> String {
    " ".repeat(self.indent * self.options.indent_width)
  }

  pub(crate) fn with_indent<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
    self.indent += 1;
    let result = f(self);
    self.indent -= 1;
    result
  }

  // frames and scopes

  fn frame(&self) -> &FnFrame {
    &self.frames[self.frames.len() - 1]
  }

  fn frame_mut(&mut self) -> &mut FnFrame {
    let last = self.frames.len() - 1;
    &mut self.frames[last]
  }

  /// Run `f` in a new function frame, starting at indentation zero, and return the frame once done.
  pub(crate) fn with_frame<T>(&mut self, frame: FnFrame, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<(T, FnFrame)> {
    let indent = std::mem::replace(&mut self.indent, 0);
    self.frames.push(frame);

    let result = f(self);

    let frame = self.frames.pop();
    self.indent = indent;

    match (result, frame) {
      (Ok(value), Some(frame)) => Ok((value, frame)),
      (Err(err), _) => Err(err),
      (Ok(_), None) => Err(Error::InvalidConstruct("function frame stack underflow".to_owned())),
    }
  }

  pub(crate) fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
    self.frame_mut().scopes.push(Scope::default());
    let result = f(self);
    self.frame_mut().scopes.pop();
    result
  }

  /// Bind `name` in the innermost scope, shadowing any outer binding.
  pub(crate) fn define(&mut self, name: impl Into<String>, value: Snippet) {
    if let Some(scope) = self.frame_mut().scopes.last_mut() {
      scope.values.insert(name.into(), value);
    }
  }

  /// Target name of a local declared in the innermost scope.
  ///
  /// The name is unique among module-scope declarations and the locals of enclosing scopes.
  pub(crate) fn local_name(&mut self, name: &str) -> String {
    let mut local = name.to_owned();
    let mut n = 0;

    while RESERVED.contains(&local.as_str())
      || self.names.taken.contains(&local)
      || self.frame().scopes.iter().any(|scope| scope.locals.contains(&local))
    {
      n += 1;
      local = format!("{}_{}", name, n);
    }

    if let Some(scope) = self.frame_mut().scopes.last_mut() {
      scope.locals.insert(local.clone());
    }

    local
  }

  /// Look a name up in the scopes of the current function, then its externals, then the prelude.
  pub fn lookup(&self, name: &str) -> Option<Snippet> {
    let frame = self.frame();

    frame
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.values.get(name))
      .or_else(|| frame.externals.get(name))
      .or_else(|| self.prelude.get(name))
      .cloned()
  }

  pub(crate) fn declared_return_type(&self) -> Option<DataType> {
    self.frame().declared_return.clone()
  }

  pub(crate) fn report_return(&mut self, ty: DataType) {
    self.frame_mut().returns.push(ty);
  }

  /// Labels of the functions being compiled, outermost first.
  fn path(&self) -> Vec<String> {
    self.frames[1..].iter().map(|frame| frame.label.clone()).collect()
  }

  /// Run `f`, attributing any error to `label` in the resolution path.
  pub(crate) fn with_path<T>(&mut self, label: String, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
    f(self).map_err(|err| err.within(label))
  }

  // slots

  pub(crate) fn with_bindings<T>(
    &mut self,
    bindings: &[(Rc<Slot>, Snippet)],
    f: impl FnOnce(&mut Self) -> Result<T>,
  ) -> Result<T> {
    let depth = self.bindings.len();
    self.bindings.extend(bindings.iter().cloned());
    let result = f(self);
    self.bindings.truncate(depth);
    result
  }

  pub(crate) fn binding_key(&mut self) -> BindingKey {
    self
      .bindings
      .iter()
      .map(|(slot, value)| (self.slots.id_of(slot), value.key()))
      .collect()
  }

  fn slot_value(&self, slot: &Rc<Slot>) -> Result<Snippet> {
    self
      .bindings
      .iter()
      .rev()
      .find(|(bound, _)| Rc::ptr_eq(bound, slot))
      .map(|(_, value)| value.clone())
      .or_else(|| slot.default().cloned())
      .ok_or_else(|| Error::InvalidConstruct(format!("slot `{}` is not bound and has no default value", slot.name())))
  }

  /// Replace late-bound values (slots, resources) with what they stand for.
  pub fn realize(&mut self, snippet: Snippet) -> Result<Snippet> {
    match snippet.value {
      Value::Slot(slot) => {
        let value = self.slot_value(&slot)?;
        self.realize(value)
      }

      Value::Resource(resource) => self.use_resource(&resource),

      value => Ok(Snippet { value, ..snippet }),
    }
  }

  // memoization and declarations

  pub(crate) fn memoized(&mut self, key: MemoKey, f: impl FnOnce(&mut Self) -> Result<String>) -> Result<String> {
    if let Some(text) = self.memo.get(&key) {
      return Ok(text.clone());
    }

    let text = f(self)?;
    self.memo.insert(key, text.clone());
    Ok(text)
  }

  pub(crate) fn function_id(&mut self, function: &Rc<HelperFn>) -> usize {
    self.functions.id_of(function)
  }

  /// A module-scope name, distinct from the locals of the functions being compiled.
  pub(crate) fn make_unique(&mut self, base: &str) -> String {
    let frames = &self.frames;

    self.names.make_unique_except(base, |name| {
      frames
        .iter()
        .any(|frame| frame.scopes.iter().any(|scope| scope.locals.contains(name)))
    })
  }

  pub(crate) fn declare(&mut self, text: String) {
    self.declarations.push(text);
  }

  /// Record that the current function uses a specialization and everything it uses.
  pub(crate) fn note_function_use(&mut self, function: &SpecializedFn) {
    let frame = self.frame_mut();
    frame.functions.insert(function.name.clone());
    frame.functions.extend(function.functions.iter().cloned());
    frame.resources.extend(function.resources.iter().copied());
  }

  fn use_resource(&mut self, resource: &Rc<Resource>) -> Result<Snippet> {
    let id = self.resources.id_of(resource);
    let key = MemoKey {
      item: ItemKey::Resource(id),
      bindings: Vec::new(),
    };
    let label = format!("resource `{}`", resource.name());
    let name = self.with_path(label, |ctx| ctx.memoized(key, |ctx| ctx.declare_resource(id, resource)))?;

    self.frame_mut().resources.insert(id);

    Ok(Snippet::new(Value::Code(name), resource.data_type(), resource.origin()))
  }

  fn declare_resource(&mut self, id: usize, resource: &Rc<Resource>) -> Result<String> {
    let name = self.make_unique(resource.name());

    let binding = if resource.needs_binding() {
      let binding = match resource.binding() {
        Some(binding) => binding,
        None => {
          while self.used_bindings.contains(&self.next_binding) {
            self.next_binding += 1;
          }

          self.next_binding
        }
      };

      self.used_bindings.insert(binding);
      Some(binding)
    } else {
      None
    };

    let group = binding.map(|_| self.options.bind_group);
    let ty = self.resolve_type(&resource.data_type())?;
    let text = resource.declaration(&name, group.zip(binding), &ty);
    self.declare(text);

    self.resource_bindings.insert(
      id,
      ResourceBinding {
        name: name.clone(),
        group,
        binding,
        resource: resource.clone(),
      },
    );

    Ok(name)
  }

  fn declare_struct(&mut self, schema: &StructRef) -> Result<String> {
    let key = MemoKey {
      item: ItemKey::Struct(schema.clone()),
      bindings: Vec::new(),
    };

    self.memoized(key, |ctx| {
      let name = ctx.make_unique(schema.schema().name());
      let indent = " ".repeat(ctx.options.indent_width);
      let mut text = format!("struct {} {{\n", name);

      for (field, ty) in schema.schema().fields() {
        let ty_text = ctx.resolve_type(ty)?;
        text.push_str(&indent);

        for attribute in ty.attributes() {
          text.push_str(&attribute.to_string());
          text.push(' ');
        }

        text.push_str(&format!("{}: {},\n", field, ty_text));
      }

      text.push('}');
      ctx.declare(text);
      Ok(name)
    })
  }

  // stringification

  /// Target-language spelling of a type, declaring the structs it mentions.
  pub fn resolve_type(&mut self, ty: &DataType) -> Result<String> {
    if ty.is_unknown() {
      return Err(Error::Capability {
        what: "unknown".to_owned(),
        reason: "the type of this value cannot be expressed in WGSL".to_owned(),
      });
    }

    let ty = if ty.is_abstract() { ty.concretize() } else { ty.clone() };
    let mut out = String::new();
    ty.write_wgsl(&mut out, &mut |schema: &StructRef| self.declare_struct(schema))?;
    Ok(out)
  }

  /// Target-language text of a snippet.
  pub fn resolve(&mut self, snippet: &Snippet) -> Result<String> {
    match &snippet.value {
      Value::Code(code) | Value::Columns(code) => Ok(code.clone()),
      Value::Const(value) => crate::stitch::literal(self, value, &snippet.ty),
      Value::Schema(ty) => self.resolve_type(ty),

      Value::Resource(_) | Value::Slot(_) => {
        let realized = self.realize(snippet.clone())?;
        self.resolve(&realized)
      }

      Value::Dual(f) => Err(Error::Capability {
        what: f.name().to_owned(),
        reason: "a function can only be called".to_owned(),
      }),

      Value::Helper(f) => Err(Error::Capability {
        what: f.definition().name.clone(),
        reason: "a function can only be called".to_owned(),
      }),

      Value::Namespace(ns) => Err(Error::Capability {
        what: ns.name().to_owned(),
        reason: "a namespace has no value".to_owned(),
      }),

      Value::Infix(infix) => Err(Error::Capability {
        what: format!("{}.{}", infix.lhs, infix.op.method()),
        reason: "an operator method must be called".to_owned(),
      }),
    }
  }

  // builtins

  pub(crate) fn operator(&self, op: ArithOp) -> Rc<DualFn> {
    self.operators.arithmetic(op)
  }

  pub(crate) fn unary_operator(&self, op: UnaryOp) -> Rc<DualFn> {
    self.operators.unary(op)
  }

  // diagnostics

  pub(crate) fn report_implicit_conversions(&mut self, casts: &str) {
    if self.options.implicit_conversion_warnings {
      self.diagnostic(DiagnosticKind::ImplicitConversion, format!("implicit conversion: {}", casts));
    }
  }

  pub(crate) fn diagnostic(&mut self, kind: DiagnosticKind, message: String) {
    let path = self.path();
    warn!(?kind, path = %path.join(" > "), "{}", message);
    self.diagnostics.push(Diagnostic { kind, message, path });
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::types::ScalarKind;

  #[test]
  fn unique_names() {
    let mut ctx = ResolutionCtx::new(CompileOptions::default());

    assert_eq!(ctx.make_unique("add"), "add");
    assert_eq!(ctx.make_unique("add"), "add_1");
    assert_eq!(ctx.make_unique("add"), "add_2");
    assert_eq!(ctx.make_unique("fn"), "fn_1");

    assert_eq!(ctx.local_name("tile"), "tile");
    assert_eq!(ctx.make_unique("tile"), "tile_1");
  }

  #[test]
  fn scopes_shadow_and_unwind() {
    let mut ctx = ResolutionCtx::new(CompileOptions::default());
    ctx.define("i", Snippet::runtime("i", DataType::F32));

    ctx
      .with_scope(|ctx| {
        ctx.define("i", Snippet::runtime("i_inner", DataType::I32));
        assert_eq!(ctx.lookup("i").map(|s| s.ty), Some(DataType::I32));
        Ok(())
      })
      .unwrap();

    assert_eq!(ctx.lookup("i").map(|s| s.ty), Some(DataType::F32));
  }

  #[test]
  fn prelude_is_visible() {
    let ctx = ResolutionCtx::new(CompileOptions::default());

    assert!(matches!(
      ctx.lookup("vec3f").map(|s| s.value),
      Some(Value::Schema(DataType::Vector {
        dim: 3,
        component: ScalarKind::F32
      }))
    ));
    assert!(ctx.lookup("std").is_some());
    assert!(ctx.lookup("nope").is_none());
  }

  #[test]
  fn structs_are_declared_once() {
    let mut ctx = ResolutionCtx::new(CompileOptions::default());
    let light = DataType::structure("Light", [("power", DataType::F32), ("color", DataType::vec(3, ScalarKind::F32))]);

    assert_eq!(ctx.resolve_type(&light).unwrap(), "Light");
    assert_eq!(ctx.resolve_type(&DataType::array(light, 4)).unwrap(), "array<Light, 4>");
    assert_eq!(ctx.source(), "struct Light {\n  power: f32,\n  color: vec3f,\n}\n");
  }

  #[test]
  fn distinct_structs_with_the_same_name() {
    let mut ctx = ResolutionCtx::new(CompileOptions::default());
    let a = DataType::structure("S", [("x", DataType::F32)]);
    let b = DataType::structure("S", [("x", DataType::F32)]);

    assert_eq!(ctx.resolve_type(&a).unwrap(), "S");
    assert_eq!(ctx.resolve_type(&b).unwrap(), "S_1");
  }
}
