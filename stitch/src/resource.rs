//! Module-scope variables: buffers, textures, samplers and workgroup/private storage.

use crate::{
  snippet::Origin,
  types::{Access, AddressSpace, DataType, TextureType},
};
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum ResourceKind {
  Uniform(DataType),
  Storage { ty: DataType, access: Access },
  Texture(TextureType),
  Sampler { comparison: bool },
  Workgroup(DataType),
  Private(DataType),
}

#[derive(Debug)]
pub struct Resource {
  name: String,
  kind: ResourceKind,
  binding: Option<u32>,
}

impl Resource {
  pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
    Resource {
      name: name.into(),
      kind,
      binding: None,
    }
  }

  pub fn uniform(name: impl Into<String>, ty: DataType) -> Self {
    Self::new(name, ResourceKind::Uniform(ty))
  }

  pub fn storage(name: impl Into<String>, ty: DataType, access: Access) -> Self {
    Self::new(name, ResourceKind::Storage { ty, access })
  }

  pub fn texture(name: impl Into<String>, texture: TextureType) -> Self {
    Self::new(name, ResourceKind::Texture(texture))
  }

  pub fn sampler(name: impl Into<String>) -> Self {
    Self::new(name, ResourceKind::Sampler { comparison: false })
  }

  pub fn workgroup(name: impl Into<String>, ty: DataType) -> Self {
    Self::new(name, ResourceKind::Workgroup(ty))
  }

  pub fn private(name: impl Into<String>, ty: DataType) -> Self {
    Self::new(name, ResourceKind::Private(ty))
  }

  /// Pin the binding number instead of assigning one on first use.
  pub fn at_binding(mut self, binding: u32) -> Self {
    self.binding = Some(binding);
    self
  }

  pub fn shared(self) -> Rc<Self> {
    Rc::new(self)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> &ResourceKind {
    &self.kind
  }

  pub fn binding(&self) -> Option<u32> {
    self.binding
  }

  pub fn data_type(&self) -> DataType {
    match &self.kind {
      ResourceKind::Uniform(ty)
      | ResourceKind::Storage { ty, .. }
      | ResourceKind::Workgroup(ty)
      | ResourceKind::Private(ty) => ty.clone(),
      ResourceKind::Texture(texture) => DataType::Texture(texture.clone()),
      ResourceKind::Sampler { comparison } => DataType::Sampler {
        comparison: *comparison,
      },
    }
  }

  pub(crate) fn origin(&self) -> Origin {
    match &self.kind {
      ResourceKind::Uniform(_) => Origin::RuntimeRef {
        space: AddressSpace::Uniform,
        access: Access::Read,
      },
      ResourceKind::Storage { access, .. } => Origin::RuntimeRef {
        space: AddressSpace::Storage,
        access: *access,
      },
      ResourceKind::Workgroup(_) => Origin::RuntimeRef {
        space: AddressSpace::Workgroup,
        access: Access::ReadWrite,
      },
      ResourceKind::Private(_) => Origin::RuntimeRef {
        space: AddressSpace::Private,
        access: Access::ReadWrite,
      },
      ResourceKind::Texture(_) | ResourceKind::Sampler { .. } => Origin::Runtime,
    }
  }

  pub(crate) fn needs_binding(&self) -> bool {
    !matches!(self.kind, ResourceKind::Workgroup(_) | ResourceKind::Private(_))
  }

  /// Declaration text, given the final name, `(group, binding)` and the spelling of the type.
  pub(crate) fn declaration(&self, name: &str, binding: Option<(u32, u32)>, ty: &str) -> String {
    let attributes = binding
      .map(|(group, binding)| format!("@group({}) @binding({}) ", group, binding))
      .unwrap_or_default();

    let space = match &self.kind {
      ResourceKind::Uniform(_) => "<uniform>".to_owned(),
      ResourceKind::Storage { access, .. } => format!("<storage, {}>", access.name()),
      ResourceKind::Workgroup(_) => "<workgroup>".to_owned(),
      ResourceKind::Private(_) => "<private>".to_owned(),
      ResourceKind::Texture(_) | ResourceKind::Sampler { .. } => String::new(),
    };

    format!("{}var{} {}: {};", attributes, space, name, ty)
  }
}

/// A resource as declared in the output.
#[derive(Clone, Debug)]
pub struct ResourceBinding {
  pub name: String,
  pub group: Option<u32>,
  pub binding: Option<u32>,
  pub resource: Rc<Resource>,
}
