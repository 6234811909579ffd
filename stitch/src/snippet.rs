//! Snippets: the value, type and origin triple every compilation step produces and consumes.

use crate::{
  dual::DualFn,
  fun::{HelperFn, Slot},
  resource::Resource,
  stdlib::ArithOp,
  types::{Access, AddressSpace, DataType},
  value::{ConstKey, ConstValue},
};
use indexmap::IndexMap;
use std::rc::Rc;

/// Where a value comes from, which decides what may be done with it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Origin {
  /// Known while compiling.
  Constant,
  /// A compile-time composite (array, struct) referred to by name; it must be copied explicitly.
  ConstantRef,
  /// A temporary computed on the GPU.
  Runtime,
  /// A storage location on the GPU.
  RuntimeRef { space: AddressSpace, access: Access },
  /// A function parameter.
  Argument,
}

impl Origin {
  pub fn is_reference(self) -> bool {
    matches!(self, Origin::ConstantRef | Origin::RuntimeRef { .. })
  }

  /// Origin of a field, element or component of a value with this origin.
  pub fn project(self, ty: &DataType) -> Origin {
    match self {
      Origin::ConstantRef if ty.is_naturally_ephemeral() => Origin::Constant,
      other => other,
    }
  }
}

/// A method of a vector or matrix used as an operator, waiting for its right-hand side.
#[derive(Clone, Debug)]
pub struct InfixDispatch {
  pub op: ArithOp,
  pub lhs: String,
  pub lhs_ty: DataType,
}

/// A named group of values, such as `std`.
#[derive(Debug)]
pub struct Namespace {
  name: String,
  members: IndexMap<String, Snippet>,
}

impl Namespace {
  pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = (String, Snippet)>) -> Self {
    Namespace {
      name: name.into(),
      members: members.into_iter().collect(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn get(&self, member: &str) -> Option<&Snippet> {
    self.members.get(member)
  }
}

#[derive(Clone, Debug)]
pub enum Value {
  Const(ConstValue),
  /// Target-language text that has already been emitted.
  Code(String),
  Schema(DataType),
  Dual(Rc<DualFn>),
  Helper(Rc<HelperFn>),
  Resource(Rc<Resource>),
  Slot(Rc<Slot>),
  Namespace(Rc<Namespace>),
  /// `m.columns` of the matrix whose text is carried.
  Columns(String),
  Infix(InfixDispatch),
}

impl Value {
  /// Short description used in error messages.
  pub fn kind_name(&self) -> &'static str {
    match self {
      Value::Const(_) => "a constant",
      Value::Code(_) => "a runtime value",
      Value::Schema(_) => "a type",
      Value::Dual(_) => "a builtin function",
      Value::Helper(_) => "a function",
      Value::Resource(_) => "a resource",
      Value::Slot(_) => "a slot",
      Value::Namespace(_) => "a namespace",
      Value::Columns(_) => "matrix columns",
      Value::Infix(_) => "an operator method",
    }
  }
}

#[derive(Clone, Debug)]
pub struct Snippet {
  pub value: Value,
  pub ty: DataType,
  pub origin: Origin,
}

impl Snippet {
  pub fn new(value: Value, ty: DataType, origin: Origin) -> Self {
    Snippet { value, ty, origin }
  }

  pub fn constant(value: impl Into<ConstValue>, ty: DataType) -> Self {
    Snippet::new(Value::Const(value.into()), ty, Origin::Constant)
  }

  pub fn runtime(code: impl Into<String>, ty: DataType) -> Self {
    Snippet::new(Value::Code(code.into()), ty, Origin::Runtime)
  }

  /// A host value that is not data: a function, a schema, a namespace…
  pub fn host(value: Value) -> Self {
    Snippet::new(value, DataType::Unknown, Origin::Constant)
  }

  pub fn schema(ty: DataType) -> Self {
    Snippet::host(Value::Schema(ty))
  }

  /// Whether the value is known while compiling and may be folded.
  pub fn is_constant(&self) -> bool {
    matches!(self.origin, Origin::Constant | Origin::ConstantRef) && matches!(self.value, Value::Const(_))
  }

  pub fn as_const(&self) -> Option<&ConstValue> {
    match &self.value {
      Value::Const(value) if self.is_constant() => Some(value),
      _ => None,
    }
  }

  pub(crate) fn key(&self) -> SnippetKey {
    let value = match &self.value {
      Value::Const(value) => ValueKey::Const(value.key()),
      Value::Code(code) | Value::Columns(code) => ValueKey::Code(code.clone()),
      Value::Schema(ty) => ValueKey::Schema(ty.clone()),
      Value::Dual(f) => ValueKey::Addr(Rc::as_ptr(f) as usize),
      Value::Helper(f) => ValueKey::Addr(Rc::as_ptr(f) as usize),
      Value::Resource(r) => ValueKey::Addr(Rc::as_ptr(r) as usize),
      Value::Slot(s) => ValueKey::Addr(Rc::as_ptr(s) as usize),
      Value::Namespace(n) => ValueKey::Addr(Rc::as_ptr(n) as usize),
      Value::Infix(infix) => ValueKey::Code(infix.lhs.clone()),
    };

    SnippetKey {
      value,
      ty: self.ty.clone(),
      origin: self.origin,
    }
  }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) enum ValueKey {
  Const(ConstKey),
  Code(String),
  Schema(DataType),
  Addr(usize),
}

/// Hashable identity of a [`Snippet`], used in memoization keys.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct SnippetKey {
  value: ValueKey,
  ty: DataType,
  origin: Origin,
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::types::ScalarKind;

  #[test]
  fn projection_of_constant_refs() {
    let origin = Origin::ConstantRef;
    assert_eq!(origin.project(&DataType::F32), Origin::Constant);
    assert_eq!(
      origin.project(&DataType::array(DataType::F32, 2)),
      Origin::ConstantRef
    );

    let storage = Origin::RuntimeRef {
      space: AddressSpace::Storage,
      access: Access::Read,
    };
    assert_eq!(storage.project(&DataType::vec(2, ScalarKind::F32)), storage);
  }

  #[test]
  fn constness() {
    assert!(Snippet::constant(1, DataType::ABSTRACT_INT).is_constant());
    assert!(!Snippet::runtime("x", DataType::F32).is_constant());
    assert!(Snippet::constant(1, DataType::I32).as_const().is_some());
  }
}
