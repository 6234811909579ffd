//! Shader data types.
//!
//! [`DataType`] is a closed set of descriptors for everything a value can be in a shader. Struct types compare by
//! identity: two schemas with the same name and fields are still different types. Every other shape compares
//! structurally.

use indexmap::IndexMap;
use std::{
  fmt,
  hash::{Hash, Hasher},
  rc::Rc,
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScalarKind {
  AbstractInt,
  AbstractFloat,
  F32,
  F16,
  I32,
  U32,
  Bool,
}

impl ScalarKind {
  pub const fn is_abstract(self) -> bool {
    matches!(self, ScalarKind::AbstractInt | ScalarKind::AbstractFloat)
  }

  pub const fn is_float(self) -> bool {
    matches!(self, ScalarKind::AbstractFloat | ScalarKind::F32 | ScalarKind::F16)
  }

  pub const fn is_integer(self) -> bool {
    matches!(self, ScalarKind::AbstractInt | ScalarKind::I32 | ScalarKind::U32)
  }

  pub const fn is_numeric(self) -> bool {
    !matches!(self, ScalarKind::Bool)
  }

  /// The concrete kind an abstract kind settles on when nothing else constrains it.
  pub const fn concretize(self) -> Self {
    match self {
      ScalarKind::AbstractInt => ScalarKind::I32,
      ScalarKind::AbstractFloat => ScalarKind::F32,
      other => other,
    }
  }

  pub const fn name(self) -> &'static str {
    match self {
      ScalarKind::AbstractInt => "abstractInt",
      ScalarKind::AbstractFloat => "abstractFloat",
      ScalarKind::F32 => "f32",
      ScalarKind::F16 => "f16",
      ScalarKind::I32 => "i32",
      ScalarKind::U32 => "u32",
      ScalarKind::Bool => "bool",
    }
  }

  /// Literal and short vector name suffix.
  pub(crate) const fn suffix(self) -> Option<&'static str> {
    match self {
      ScalarKind::F32 => Some("f"),
      ScalarKind::F16 => Some("h"),
      ScalarKind::I32 => Some("i"),
      ScalarKind::U32 => Some("u"),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressSpace {
  Function,
  Private,
  Workgroup,
  Uniform,
  Storage,
  Handle,
}

impl AddressSpace {
  pub const fn name(self) -> &'static str {
    match self {
      AddressSpace::Function => "function",
      AddressSpace::Private => "private",
      AddressSpace::Workgroup => "workgroup",
      AddressSpace::Uniform => "uniform",
      AddressSpace::Storage => "storage",
      AddressSpace::Handle => "handle",
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Access {
  Read,
  Write,
  ReadWrite,
}

impl Access {
  pub const fn name(self) -> &'static str {
    match self {
      Access::Read => "read",
      Access::Write => "write",
      Access::ReadWrite => "read_write",
    }
  }

  pub const fn is_writable(self) -> bool {
    !matches!(self, Access::Read)
  }
}

/// Layout attributes carried by [`DataType::Decorated`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Attribute {
  Align(u32),
  Size(u32),
}

impl fmt::Display for Attribute {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Attribute::Align(n) => write!(f, "@align({})", n),
      Attribute::Size(n) => write!(f, "@size({})", n),
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureDim {
  D1,
  D2,
  D2Array,
  D3,
  Cube,
  CubeArray,
}

impl TextureDim {
  const fn name(self) -> &'static str {
    match self {
      TextureDim::D1 => "1d",
      TextureDim::D2 => "2d",
      TextureDim::D2Array => "2d_array",
      TextureDim::D3 => "3d",
      TextureDim::Cube => "cube",
      TextureDim::CubeArray => "cube_array",
    }
  }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TextureType {
  Sampled { dim: TextureDim, sample: ScalarKind },
  Depth { dim: TextureDim },
  Storage { dim: TextureDim, format: String, access: Access },
}

impl fmt::Display for TextureType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      TextureType::Sampled { dim, sample } => write!(f, "texture_{}<{}>", dim.name(), sample.name()),
      TextureType::Depth { dim } => write!(f, "texture_depth_{}", dim.name()),
      TextureType::Storage { dim, format, access } => {
        write!(f, "texture_storage_{}<{}, {}>", dim.name(), format, access.name())
      }
    }
  }
}

/// Fields of a struct type, in declaration order.
#[derive(Debug, PartialEq)]
pub struct StructSchema {
  name: String,
  fields: IndexMap<String, DataType>,
}

impl StructSchema {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn fields(&self) -> &IndexMap<String, DataType> {
    &self.fields
  }

  pub fn field(&self, name: &str) -> Option<&DataType> {
    self.fields.get(name)
  }
}

/// Identity-compared handle on a [`StructSchema`].
#[derive(Clone)]
pub struct StructRef(Rc<StructSchema>);

impl StructRef {
  pub fn schema(&self) -> &StructSchema {
    &self.0
  }

  fn addr(&self) -> usize {
    Rc::as_ptr(&self.0) as usize
  }
}

impl PartialEq for StructRef {
  fn eq(&self, rhs: &Self) -> bool {
    Rc::ptr_eq(&self.0, &rhs.0)
  }
}

impl Eq for StructRef {}

impl Hash for StructRef {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.addr().hash(state);
  }
}

impl fmt::Debug for StructRef {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "StructRef({}@{:#x})", self.0.name, self.addr())
  }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum DataType {
  Void,
  /// Type of host values that are not data (functions, schemas, namespaces…) and of values whose type cannot be known.
  Unknown,
  Scalar(ScalarKind),
  Vector {
    dim: u8,
    component: ScalarKind,
  },
  /// Square matrices; `dim` is both the column count and the column height.
  Matrix {
    dim: u8,
    component: ScalarKind,
  },
  Array {
    element: Box<DataType>,
    /// `None` for runtime-sized arrays.
    count: Option<u32>,
  },
  Struct(StructRef),
  Pointer {
    space: AddressSpace,
    inner: Box<DataType>,
    access: Access,
    /// Implicit pointers are dereferenced automatically wherever a value is needed.
    implicit: bool,
  },
  Atomic(ScalarKind),
  Texture(TextureType),
  Sampler {
    comparison: bool,
  },
  Decorated {
    inner: Box<DataType>,
    attributes: Vec<Attribute>,
  },
}

impl DataType {
  pub const BOOL: DataType = DataType::Scalar(ScalarKind::Bool);
  pub const F32: DataType = DataType::Scalar(ScalarKind::F32);
  pub const F16: DataType = DataType::Scalar(ScalarKind::F16);
  pub const I32: DataType = DataType::Scalar(ScalarKind::I32);
  pub const U32: DataType = DataType::Scalar(ScalarKind::U32);
  pub const ABSTRACT_INT: DataType = DataType::Scalar(ScalarKind::AbstractInt);
  pub const ABSTRACT_FLOAT: DataType = DataType::Scalar(ScalarKind::AbstractFloat);

  pub const fn vec(dim: u8, component: ScalarKind) -> Self {
    DataType::Vector { dim, component }
  }

  pub const fn mat(dim: u8, component: ScalarKind) -> Self {
    DataType::Matrix { dim, component }
  }

  pub fn array(element: DataType, count: u32) -> Self {
    DataType::Array {
      element: Box::new(element),
      count: Some(count),
    }
  }

  pub fn runtime_array(element: DataType) -> Self {
    DataType::Array {
      element: Box::new(element),
      count: None,
    }
  }

  /// Create a new struct type. Every call yields a distinct type, even with identical fields.
  pub fn structure<N>(name: impl Into<String>, fields: impl IntoIterator<Item = (N, DataType)>) -> Self
  where
    N: Into<String>,
  {
    let schema = StructSchema {
      name: name.into(),
      fields: fields.into_iter().map(|(n, ty)| (n.into(), ty)).collect(),
    };

    DataType::Struct(StructRef(Rc::new(schema)))
  }

  pub fn ptr(space: AddressSpace, inner: DataType, access: Access) -> Self {
    DataType::Pointer {
      space,
      inner: Box::new(inner),
      access,
      implicit: false,
    }
  }

  pub fn implicit_ptr(space: AddressSpace, inner: DataType, access: Access) -> Self {
    DataType::Pointer {
      space,
      inner: Box::new(inner),
      access,
      implicit: true,
    }
  }

  pub fn decorated(inner: DataType, attributes: impl IntoIterator<Item = Attribute>) -> Self {
    DataType::Decorated {
      inner: Box::new(inner),
      attributes: attributes.into_iter().collect(),
    }
  }

  /// The type with every decoration layer removed.
  pub fn undecorated(&self) -> &DataType {
    let mut ty = self;

    while let DataType::Decorated { inner, .. } = ty {
      ty = inner;
    }

    ty
  }

  pub fn attributes(&self) -> &[Attribute] {
    match self {
      DataType::Decorated { attributes, .. } => attributes,
      _ => &[],
    }
  }

  /// Dereference implicit pointers; everything else is returned as-is.
  pub fn deref_implicit(&self) -> &DataType {
    match self.undecorated() {
      DataType::Pointer {
        inner, implicit: true, ..
      } => inner.undecorated(),
      _ => self,
    }
  }

  pub fn is_unknown(&self) -> bool {
    matches!(self.undecorated(), DataType::Unknown)
  }

  pub fn is_void(&self) -> bool {
    matches!(self.undecorated(), DataType::Void)
  }

  pub fn is_abstract(&self) -> bool {
    match self.undecorated() {
      DataType::Scalar(kind) | DataType::Vector { component: kind, .. } | DataType::Matrix { component: kind, .. } => {
        kind.is_abstract()
      }
      DataType::Array { element, .. } => element.is_abstract(),
      _ => false,
    }
  }

  /// Values of these types are copied freely; everything else is a reference that must be copied explicitly.
  pub fn is_naturally_ephemeral(&self) -> bool {
    match self.undecorated() {
      DataType::Scalar(_)
      | DataType::Vector { .. }
      | DataType::Matrix { .. }
      | DataType::Pointer { .. }
      | DataType::Texture(_)
      | DataType::Sampler { .. }
      | DataType::Void => true,
      _ => false,
    }
  }

  /// Replace abstract components with their concrete default.
  pub fn concretize(&self) -> DataType {
    match self.undecorated() {
      DataType::Scalar(kind) => DataType::Scalar(kind.concretize()),
      DataType::Vector { dim, component } => DataType::vec(*dim, component.concretize()),
      DataType::Matrix { dim, component } => DataType::mat(*dim, component.concretize()),
      DataType::Array { element, count } => DataType::Array {
        element: Box::new(element.concretize()),
        count: *count,
      },
      other => other.clone(),
    }
  }

  /// Scalar kind of a scalar, vector or matrix.
  pub fn component(&self) -> Option<ScalarKind> {
    match self.undecorated() {
      DataType::Scalar(kind) | DataType::Vector { component: kind, .. } | DataType::Matrix { component: kind, .. } => {
        Some(*kind)
      }
      _ => None,
    }
  }

  /// Same shape with a different scalar kind.
  pub fn with_component(&self, kind: ScalarKind) -> Option<DataType> {
    match self.undecorated() {
      DataType::Scalar(_) => Some(DataType::Scalar(kind)),
      DataType::Vector { dim, .. } => Some(DataType::vec(*dim, kind)),
      DataType::Matrix { dim, .. } => Some(DataType::mat(*dim, kind)),
      _ => None,
    }
  }

  /// Write the target-language spelling of this type, naming structs with `struct_name`.
  pub(crate) fn write_wgsl<E>(
    &self,
    out: &mut String,
    struct_name: &mut dyn FnMut(&StructRef) -> Result<String, E>,
  ) -> Result<(), E> {
    match self {
      DataType::Void => out.push_str("void"),
      DataType::Unknown => out.push_str("unknown"),
      DataType::Scalar(kind) => out.push_str(kind.name()),

      DataType::Vector { dim, component } => match component.suffix() {
        Some(suffix) => {
          out.push_str("vec");
          out.push_str(&dim.to_string());
          out.push_str(suffix);
        }

        None => {
          out.push_str("vec");
          out.push_str(&dim.to_string());
          out.push('<');
          out.push_str(component.name());
          out.push('>');
        }
      },

      DataType::Matrix { dim, component } => {
        out.push_str("mat");
        out.push_str(&format!("{}x{}", dim, dim));

        match component.suffix() {
          Some(suffix) => out.push_str(suffix),
          None => {
            out.push('<');
            out.push_str(component.name());
            out.push('>');
          }
        }
      }

      DataType::Array { element, count } => {
        out.push_str("array<");
        element.write_wgsl(out, struct_name)?;

        if let Some(count) = count {
          out.push_str(", ");
          out.push_str(&count.to_string());
        }

        out.push('>');
      }

      DataType::Struct(schema) => out.push_str(&struct_name(schema)?),

      DataType::Pointer {
        space, inner, access, ..
      } => {
        out.push_str("ptr<");
        out.push_str(space.name());
        out.push_str(", ");
        inner.write_wgsl(out, struct_name)?;

        if *space == AddressSpace::Storage {
          out.push_str(", ");
          out.push_str(access.name());
        }

        out.push('>');
      }

      DataType::Atomic(kind) => {
        out.push_str("atomic<");
        out.push_str(kind.name());
        out.push('>');
      }

      DataType::Texture(texture) => out.push_str(&texture.to_string()),

      DataType::Sampler { comparison } => {
        out.push_str(if *comparison { "sampler_comparison" } else { "sampler" })
      }

      DataType::Decorated { inner, .. } => inner.write_wgsl(out, struct_name)?,
    }

    Ok(())
  }
}

impl fmt::Display for DataType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut out = String::new();
    self.write_wgsl(&mut out, &mut |schema: &StructRef| {
      Ok::<_, fmt::Error>(schema.schema().name().to_owned())
    })?;
    f.write_str(&out)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn type_names() {
    assert_eq!(DataType::F32.to_string(), "f32");
    assert_eq!(DataType::ABSTRACT_INT.to_string(), "abstractInt");
    assert_eq!(DataType::vec(3, ScalarKind::F32).to_string(), "vec3f");
    assert_eq!(DataType::vec(2, ScalarKind::Bool).to_string(), "vec2<bool>");
    assert_eq!(DataType::mat(4, ScalarKind::F16).to_string(), "mat4x4h");
    assert_eq!(DataType::array(DataType::U32, 4).to_string(), "array<u32, 4>");
    assert_eq!(DataType::runtime_array(DataType::F32).to_string(), "array<f32>");
    assert_eq!(
      DataType::ptr(AddressSpace::Function, DataType::I32, Access::ReadWrite).to_string(),
      "ptr<function, i32>"
    );
    assert_eq!(
      DataType::ptr(AddressSpace::Storage, DataType::I32, Access::Read).to_string(),
      "ptr<storage, i32, read>"
    );
  }

  #[test]
  fn struct_identity() {
    let a = DataType::structure("Light", [("power", DataType::F32)]);
    let b = DataType::structure("Light", [("power", DataType::F32)]);

    assert_eq!(a, a.clone());
    assert_ne!(a, b);
    assert_eq!(a.to_string(), "Light");
  }

  #[test]
  fn undecorate_and_deref() {
    let ty = DataType::decorated(DataType::F32, [Attribute::Align(16)]);
    assert_eq!(ty.undecorated(), &DataType::F32);
    assert_eq!(ty.attributes(), &[Attribute::Align(16)]);

    let ptr = DataType::implicit_ptr(AddressSpace::Function, DataType::I32, Access::ReadWrite);
    assert_eq!(ptr.deref_implicit(), &DataType::I32);

    let explicit = DataType::ptr(AddressSpace::Function, DataType::I32, Access::ReadWrite);
    assert_eq!(explicit.deref_implicit(), &explicit);
  }

  #[test]
  fn concretize() {
    assert_eq!(DataType::ABSTRACT_FLOAT.concretize(), DataType::F32);
    assert_eq!(
      DataType::vec(2, ScalarKind::AbstractInt).concretize(),
      DataType::vec(2, ScalarKind::I32)
    );
    assert_eq!(
      DataType::array(DataType::ABSTRACT_INT, 2).concretize(),
      DataType::array(DataType::I32, 2)
    );
  }

  #[test]
  fn ephemerality() {
    assert!(DataType::vec(4, ScalarKind::F32).is_naturally_ephemeral());
    assert!(!DataType::array(DataType::F32, 2).is_naturally_ephemeral());
    assert!(!DataType::structure("S", [("x", DataType::F32)]).is_naturally_ephemeral());
  }
}
