//! Helper functions, their environment and late-bound slots.

use crate::{
  ast::FunctionDef,
  dual::DualFn,
  resource::Resource,
  snippet::{Namespace, Origin, Snippet, Value},
  types::DataType,
  value::ConstValue,
};
use indexmap::IndexMap;
use std::rc::Rc;

/// Names a helper body can refer to besides its parameters and locals.
#[derive(Clone, Debug, Default)]
pub struct Externals {
  values: IndexMap<String, Snippet>,
}

impl Externals {
  pub fn new() -> Self {
    Self::default()
  }

  /// A compile-time constant. Composite constants (arrays, structs) are references and must be copied explicitly.
  pub fn constant(self, name: impl Into<String>, value: impl Into<ConstValue>, ty: DataType) -> Self {
    let origin = if ty.is_naturally_ephemeral() {
      Origin::Constant
    } else {
      Origin::ConstantRef
    };

    self.value(name, Snippet::new(Value::Const(value.into()), ty, origin))
  }

  pub fn function(self, name: impl Into<String>, function: &Rc<HelperFn>) -> Self {
    self.value(name, Snippet::host(Value::Helper(function.clone())))
  }

  pub fn dual(self, name: impl Into<String>, function: DualFn) -> Self {
    self.value(name, Snippet::host(Value::Dual(Rc::new(function))))
  }

  pub fn schema(self, name: impl Into<String>, ty: DataType) -> Self {
    self.value(name, Snippet::schema(ty))
  }

  pub fn resource(self, name: impl Into<String>, resource: &Rc<Resource>) -> Self {
    self.value(name, Snippet::host(Value::Resource(resource.clone())))
  }

  pub fn slot(self, name: impl Into<String>, slot: &Rc<Slot>) -> Self {
    self.value(name, Snippet::host(Value::Slot(slot.clone())))
  }

  pub fn namespace(self, namespace: Namespace) -> Self {
    let name = namespace.name().to_owned();
    self.value(name, Snippet::host(Value::Namespace(Rc::new(namespace))))
  }

  pub fn value(mut self, name: impl Into<String>, snippet: Snippet) -> Self {
    self.values.insert(name.into(), snippet);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Snippet> {
    self.values.get(name)
  }
}

/// A named value provided late, when a function is bound or compiled.
#[derive(Debug)]
pub struct Slot {
  name: String,
  default: Option<Snippet>,
}

impl Slot {
  pub fn new(name: impl Into<String>) -> Rc<Self> {
    Rc::new(Slot {
      name: name.into(),
      default: None,
    })
  }

  pub fn with_default(name: impl Into<String>, default: Snippet) -> Rc<Self> {
    Rc::new(Slot {
      name: name.into(),
      default: Some(default),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn default(&self) -> Option<&Snippet> {
    self.default.as_ref()
  }
}

/// An untagged function: compiled once per distinct tuple of argument types.
#[derive(Debug)]
pub struct HelperFn {
  definition: Rc<FunctionDef>,
  externals: Rc<Externals>,
  bindings: Vec<(Rc<Slot>, Snippet)>,
}

impl HelperFn {
  pub fn new(definition: FunctionDef, externals: Externals) -> Rc<Self> {
    Rc::new(HelperFn {
      definition: Rc::new(definition),
      externals: Rc::new(externals),
      bindings: Vec::new(),
    })
  }

  /// The same function with `slot` bound to `value`. The result is a new function identity.
  pub fn with(self: &Rc<Self>, slot: &Rc<Slot>, value: Snippet) -> Rc<Self> {
    let mut bindings = self.bindings.clone();
    bindings.push((slot.clone(), value));

    Rc::new(HelperFn {
      definition: self.definition.clone(),
      externals: self.externals.clone(),
      bindings,
    })
  }

  pub fn definition(&self) -> &FunctionDef {
    &self.definition
  }

  pub(crate) fn externals(&self) -> Rc<Externals> {
    self.externals.clone()
  }

  pub(crate) fn bindings(&self) -> &[(Rc<Slot>, Snippet)] {
    &self.bindings
  }
}
