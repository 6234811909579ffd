//! Stitch, a type-directed WGSL code generator for shader functions written in Rust.
//!
//! This crate compiles function bodies written in a small, closed expression and statement language into [WGSL] source
//! text, together with the metadata a pipeline needs: the inferred return type, the resources the code touches and the
//! helper functions it calls. Every value flowing through the compiler is either known while compiling, in which case
//! operations on it are evaluated right away (constant folding), or only known on the GPU, in which case code is emitted
//! for it. The same primitive (an operator, `std.max`, a vector constructor…) handles both cases.
//!
//! # Overview
//!
//! A function is described by a [`FunctionDef`](ast::FunctionDef): parameters, whose types are optional, and a body of
//! [`Stmt`](ast::Stmt)s. It is wrapped into a [`HelperFn`](fun::HelperFn), along with its [`Externals`](fun::Externals):
//! the constants, other functions, struct types and [resources](resource::Resource) its body refers to by name.
//!
//! Untyped helpers are specialized per call site: calling `add(a, b)` with two `f32` and then with two `i32` emits two
//! functions, `add` and `add_1`, while calling it twice with `vec3f` emits only one. Types are unified the way WGSL
//! does it: abstract literals widen silently, and mixing concrete types inserts explicit casts, recorded as
//! [diagnostics](error::Diagnostic).
//!
//! A [`Root`](compile::Root) is a function compiled with fixed arguments, optionally as a pipeline entry point.
//! [`compile_function`](compile::compile_function) compiles one, [`compile_program`](compile::compile_program) several
//! of them into a single module, sharing helper, struct and resource declarations.
//!
//! ```rust
//! use stitch::{
//!   ast::{BinaryOp, Expr, FunctionDef, Param, Stmt},
//!   compile::{compile_function, Argument, CompileOptions, Root},
//!   fun::{Externals, HelperFn},
//!   types::DataType,
//! };
//!
//! let add = HelperFn::new(
//!   FunctionDef::new(
//!     "add",
//!     [Param::new("a"), Param::new("b")],
//!     [Stmt::ret(Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b")))],
//!   ),
//!   Externals::new(),
//! );
//!
//! let root = Root::new(&add, [Argument::runtime(DataType::I32), Argument::runtime(DataType::F32)]);
//! let shader = compile_function(&root, CompileOptions::default())?;
//!
//! assert_eq!(shader.code, "fn add(a: i32, b: f32) -> f32 {\n  return (f32(a) + b);\n}\n");
//! assert_eq!(shader.return_type, DataType::F32);
//! assert_eq!(shader.diagnostics.len(), 1);
//! # Ok::<_, stitch::error::Error>(())
//! ```
//!
//! # The core crate and the EDSL crate
//!
//! Building ASTs by hand is tedious. With the default `edsl` feature, the [`shader!`] macro of the [stitch-edsl] crate
//! turns regular Rust items into [`FunctionDef`](ast::FunctionDef)s:
//!
//! ```rust
//! # #[cfg(feature = "edsl")] {
//! stitch::shader! {
//!   fn add(a: _, b: _) {
//!     a + b
//!   }
//! }
//!
//! let def = add();
//! assert_eq!(def.name, "add");
//! assert_eq!(def.params.len(), 2);
//! # }
//! ```
//!
//! # Errors
//!
//! Compiles either succeed or fail as a whole. Errors raised inside a function, a root or a resource are wrapped with
//! the path of items being resolved, so that a type error deep in a helper reads as such.
//!
//! [WGSL]: https://www.w3.org/TR/WGSL/
//! [stitch-edsl]: https://crates.io/crates/stitch-edsl

pub mod ast;
pub mod codegen;
pub mod compile;
pub mod context;
pub mod conversion;
pub mod dual;
pub mod error;
pub mod fun;
pub mod resource;
pub mod snippet;
pub mod specialization;
pub mod stdlib;
pub mod stitch;
pub mod swizzle;
pub mod types;
pub mod value;

pub use crate::{
  compile::{compile_function, compile_program, CompileOptions},
  error::{Error, Result},
};

#[cfg(feature = "edsl")]
pub use stitch_edsl::shader;
