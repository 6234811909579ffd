use std::{cell::Cell, rc::Rc};
use stitch::{
  ast::{AssignOp, BinaryOp, DeclKind, Expr, FunctionDef, Param, Stmt},
  compile::{compile_function, compile_program, Argument, CompileOptions, EntryPoint, IoAttribute, Root},
  dual::{DualFn, HostError, Typed},
  error::{DiagnosticKind, Error},
  fun::{Externals, HelperFn, Slot},
  resource::Resource,
  snippet::Snippet,
  types::{Access, DataType, ScalarKind},
};

fn add(lhs: Expr, rhs: Expr) -> Expr {
  Expr::binary(BinaryOp::Add, lhs, rhs)
}

fn twice() -> Rc<HelperFn> {
  HelperFn::new(
    FunctionDef::new(
      "twice",
      [Param::new("x")],
      [Stmt::ret(add(Expr::ident("x"), Expr::ident("x")))],
    ),
    Externals::new(),
  )
}

#[test]
fn mixed_operands_are_cast() {
  let f = HelperFn::new(
    FunctionDef::new(
      "add",
      [Param::new("a"), Param::new("b")],
      [Stmt::ret(add(Expr::ident("a"), Expr::ident("b")))],
    ),
    Externals::new(),
  );

  let root = Root::new(&f, [Argument::runtime(DataType::I32), Argument::runtime(DataType::F32)]);
  let shader = compile_function(&root, CompileOptions::default()).unwrap();

  assert_eq!(shader.code, "fn add(a: i32, b: f32) -> f32 {\n  return (f32(a) + b);\n}\n");
  assert_eq!(shader.return_type, DataType::F32);
  assert_eq!(shader.diagnostics.len(), 1);
  assert_eq!(shader.diagnostics[0].kind, DiagnosticKind::ImplicitConversion);
  assert_eq!(shader.diagnostics[0].path, ["add(i32, f32)"]);

  let quiet = CompileOptions {
    implicit_conversion_warnings: false,
    ..CompileOptions::default()
  };
  assert!(compile_function(&root, quiet).unwrap().diagnostics.is_empty());
}

#[test]
fn helpers_specialize_per_type_tuple() {
  let twice = twice();
  let main = HelperFn::new(
    FunctionDef::new(
      "main",
      [Param::new("a"), Param::new("b")],
      [Stmt::ret(add(
        Expr::call(Expr::ident("twice"), [Expr::ident("a")]),
        Expr::call(
          Expr::ident("f32"),
          [Expr::call(Expr::ident("twice"), [Expr::ident("b")])],
        ),
      ))],
    ),
    Externals::new().function("twice", &twice),
  );

  let root = Root::new(&main, [Argument::runtime(DataType::F32), Argument::runtime(DataType::I32)]);
  let shader = compile_function(&root, CompileOptions::default()).unwrap();

  assert_eq!(
    shader.code,
    "fn twice(x: f32) -> f32 {\n  return (x + x);\n}\n\n\
     fn twice_1(x: i32) -> i32 {\n  return (x + x);\n}\n\n\
     fn main(a: f32, b: i32) -> f32 {\n  return (twice(a) + f32(twice_1(b)));\n}\n"
  );
  assert_eq!(shader.functions, ["twice", "twice_1"]);
  assert!(shader.diagnostics.is_empty());
}

#[test]
fn identical_calls_share_a_specialization() {
  let twice = twice();
  let call = || Expr::call(Expr::ident("twice"), [Expr::ident("v")]);
  let main = HelperFn::new(
    FunctionDef::new("main", [Param::new("v")], [Stmt::ret(add(call(), call()))]),
    Externals::new().function("twice", &twice),
  );

  let vec3f = DataType::vec(3, ScalarKind::F32);
  let shader = compile_function(&Root::new(&main, [Argument::runtime(vec3f.clone())]), CompileOptions::default()).unwrap();

  assert_eq!(shader.code.matches("fn twice").count(), 1);
  assert!(shader.code.contains("return (twice(v) + twice(v));"));
  assert_eq!(shader.return_type, vec3f);
}

#[test]
fn parameters_are_immutable() {
  let f = HelperFn::new(
    FunctionDef::new(
      "reset",
      [Param::new("x")],
      [Stmt::Expr(Expr::assign(AssignOp::Assign, Expr::ident("x"), Expr::Int(0)))],
    ),
    Externals::new(),
  );

  let err = compile_function(&Root::new(&f, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap_err();

  assert!(matches!(err.root_cause(), Error::AssignToImmutable { target, .. } if target == "x"), "{}", err);
  assert!(matches!(err, Error::Resolution { ref path, .. } if path == &["reset(f32)"]));
}

#[test]
fn errors_carry_the_resolution_path() {
  let broken = HelperFn::new(
    FunctionDef::new("broken", [Param::new("x")], [Stmt::ret(Expr::ident("missing"))]),
    Externals::new(),
  );
  let main = HelperFn::new(
    FunctionDef::new(
      "main",
      [Param::new("a")],
      [Stmt::ret(Expr::call(Expr::ident("broken"), [Expr::ident("a")]))],
    ),
    Externals::new().function("broken", &broken),
  );

  let err = compile_function(&Root::new(&main, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap_err();

  assert!(matches!(err, Error::Resolution { ref path, .. } if path == &["main(f32)", "broken(f32)"]));
  assert!(matches!(err.root_cause(), Error::UnresolvedIdentifier(name) if name == "missing"));
  assert!(err.to_string().contains("while resolving main(f32) > broken(f32)"));
}

#[test]
fn roots_resolve_once_per_program() {
  let calls = Rc::new(Cell::new(0));
  let counter = calls.clone();

  let triple = DualFn::new("triple", |_, _| Err(Error::InvalidConstruct("runtime triple".to_owned()))).with_host(
    move |args: &[Typed]| {
      counter.set(counter.get() + 1);
      let n = args[0].value.as_i64().ok_or(HostError::Unavailable)?;
      Ok(Typed::new(n * 3, args[0].ty.clone()))
    },
  );

  let f = HelperFn::new(
    FunctionDef::new(
      "nine",
      [],
      [Stmt::ret(Expr::call(Expr::ident("triple"), [Expr::Int(3)]))],
    ),
    Externals::new().dual("triple", triple),
  );

  let root = Root::new(&f, []);
  let program = compile_program(&[root.clone(), root], CompileOptions::default()).unwrap();

  assert_eq!(calls.get(), 1);
  assert_eq!(program.code.matches("fn nine").count(), 1);
  assert_eq!(program.roots[0].name, program.roots[1].name);
  assert_eq!(program.roots[0].return_type, DataType::I32);
}

#[test]
fn resources_are_declared_once_and_reported_through_callees() {
  let particles = Resource::storage("particles", DataType::runtime_array(DataType::F32), Access::ReadWrite).shared();
  let factor = Resource::uniform("factor", DataType::F32).shared();

  let scale = HelperFn::new(
    FunctionDef::new(
      "scale",
      [Param::new("i")],
      [Stmt::Expr(Expr::assign(
        AssignOp::Compound(BinaryOp::Mul),
        Expr::index(Expr::ident("particles"), Expr::ident("i")),
        Expr::ident("factor"),
      ))],
    ),
    Externals::new()
      .resource("particles", &particles)
      .resource("factor", &factor),
  );

  let main = HelperFn::new(
    FunctionDef::new(
      "main",
      [Param::new("id")],
      [
        Stmt::Expr(Expr::call(Expr::ident("scale"), [Expr::member(Expr::ident("id"), "x")])),
        Stmt::Expr(Expr::call(Expr::ident("scale"), [Expr::member(Expr::ident("id"), "y")])),
      ],
    ),
    Externals::new().function("scale", &scale),
  );

  let root = Root::new(
    &main,
    [Argument::builtin(
      "global_invocation_id",
      DataType::vec(3, ScalarKind::U32),
    )],
  )
  .entry(EntryPoint::Compute {
    workgroup_size: [64, 1, 1],
  });

  let shader = compile_function(&root, CompileOptions::default()).unwrap();

  assert_eq!(
    shader.code,
    "@group(0) @binding(0) var<storage, read_write> particles: array<f32>;\n\n\
     @group(0) @binding(1) var<uniform> factor: f32;\n\n\
     fn scale(i: u32) {\n  particles[i] *= factor;\n}\n\n\
     @compute @workgroup_size(64, 1, 1)\n\
     fn main(@builtin(global_invocation_id) id: vec3u) {\n  scale(id.x);\n  scale(id.y);\n}\n"
  );

  let names: Vec<_> = shader.resources.iter().map(|binding| binding.name.as_str()).collect();
  assert_eq!(names, ["particles", "factor"]);
  assert_eq!(shader.resources[1].group, Some(0));
  assert_eq!(shader.resources[1].binding, Some(1));
  assert_eq!(shader.return_type, DataType::Void);
}

#[test]
fn pinned_bindings_are_kept() {
  let lights = Resource::uniform("lights", DataType::vec(4, ScalarKind::F32))
    .at_binding(3)
    .shared();
  let f = HelperFn::new(
    FunctionDef::new("light", [], [Stmt::ret(Expr::member(Expr::ident("lights"), "w"))]),
    Externals::new().resource("lights", &lights),
  );

  let options = CompileOptions {
    bind_group: 2,
    ..CompileOptions::default()
  };
  let shader = compile_function(&Root::new(&f, []), options).unwrap();

  assert!(shader.code.starts_with("@group(2) @binding(3) var<uniform> lights: vec4f;"));
  assert_eq!(shader.return_type, DataType::F32);
}

#[test]
fn entry_points_carry_io_attributes() {
  let f = HelperFn::new(
    FunctionDef::new(
      "main",
      [Param::new("pos")],
      [Stmt::ret(Expr::call(
        Expr::ident("vec4f"),
        [Expr::ident("pos"), Expr::Int(0), Expr::Int(1)],
      ))],
    ),
    Externals::new(),
  );

  let root = Root::new(&f, [Argument::location(0, DataType::vec(2, ScalarKind::F32))])
    .entry(EntryPoint::Vertex)
    .output(IoAttribute::Builtin("position".to_owned()));

  let shader = compile_function(&root, CompileOptions::default()).unwrap();

  assert_eq!(
    shader.code,
    "@vertex\nfn main(@location(0) pos: vec2f) -> @builtin(position) vec4f {\n  return vec4f(pos, 0f, 1f);\n}\n"
  );
}

#[test]
fn constant_root_arguments_are_inlined() {
  let f = HelperFn::new(
    FunctionDef::new(
      "scale_by",
      [Param::new("x"), Param::new("k")],
      [Stmt::ret(Expr::binary(BinaryOp::Mul, Expr::ident("x"), Expr::ident("k")))],
    ),
    Externals::new(),
  );

  let by = |k: f64| {
    Root::new(
      &f,
      [
        Argument::runtime(DataType::F32),
        Argument::value(Snippet::constant(k, DataType::F32)),
      ],
    )
  };

  let program = compile_program(&[by(2.), by(3.), by(2.)], CompileOptions::default()).unwrap();

  assert_eq!(
    program.code,
    "fn scale_by(x: f32) -> f32 {\n  return (x * 2f);\n}\n\nfn scale_by_1(x: f32) -> f32 {\n  return (x * 3f);\n}\n"
  );

  let names: Vec<_> = program.roots.iter().map(|root| root.name.as_str()).collect();
  assert_eq!(names, ["scale_by", "scale_by_1", "scale_by"]);
}

#[test]
fn slots_are_bound_per_function() {
  let gain = Slot::new("gain");
  let amplify = HelperFn::new(
    FunctionDef::new(
      "amplify",
      [Param::new("x")],
      [Stmt::ret(Expr::binary(BinaryOp::Mul, Expr::ident("x"), Expr::ident("gain")))],
    ),
    Externals::new().slot("gain", &gain),
  );

  let loud = amplify.with(&gain, Snippet::constant(4., DataType::F32));
  let soft = amplify.with(&gain, Snippet::constant(0.5, DataType::F32));

  let program = compile_program(
    &[
      Root::new(&loud, [Argument::runtime(DataType::F32)]),
      Root::new(&soft, [Argument::runtime(DataType::F32)]),
    ],
    CompileOptions::default(),
  )
  .unwrap();

  assert!(program.code.contains("fn amplify(x: f32) -> f32 {\n  return (x * 4f);\n}"));
  assert!(program.code.contains("fn amplify_1(x: f32) -> f32 {\n  return (x * 0.5f);\n}"));

  let err = compile_function(&Root::new(&amplify, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap_err();
  assert!(matches!(err.root_cause(), Error::InvalidConstruct(message) if message.contains("gain")));
}

#[test]
fn slot_defaults() {
  let gain = Slot::with_default("gain", Snippet::constant(1.5, DataType::F32));
  let f = HelperFn::new(
    FunctionDef::new(
      "amplify",
      [Param::new("x")],
      [Stmt::ret(Expr::binary(BinaryOp::Mul, Expr::ident("x"), Expr::ident("gain")))],
    ),
    Externals::new().slot("gain", &gain),
  );

  let shader = compile_function(&Root::new(&f, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap();
  assert!(shader.code.contains("return (x * 1.5f);"));
}

#[test]
fn structs_are_declared_before_use() {
  let light = DataType::structure("Light", [("power", DataType::F32), ("on", DataType::BOOL)]);
  let f = HelperFn::new(
    FunctionDef::new(
      "make_light",
      [Param::new("p")],
      [Stmt::ret(Expr::call(
        Expr::ident("Light"),
        [Expr::object([("power", Expr::ident("p")), ("on", Expr::Bool(true))])],
      ))],
    ),
    Externals::new().schema("Light", light.clone()),
  );

  let shader = compile_function(&Root::new(&f, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap();

  assert_eq!(
    shader.code,
    "struct Light {\n  power: f32,\n  on: bool,\n}\n\nfn make_light(p: f32) -> Light {\n  return Light(p, true);\n}\n"
  );
  assert_eq!(shader.return_type, light);
}

#[test]
fn std_namespace() {
  let f = HelperFn::new(
    FunctionDef::new(
      "relu",
      [Param::new("x")],
      [Stmt::ret(Expr::call(
        Expr::member(Expr::ident("std"), "max"),
        [Expr::ident("x"), Expr::Int(0)],
      ))],
    ),
    Externals::new(),
  );

  let shader = compile_function(&Root::new(&f, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap();
  assert!(shader.code.contains("return max(x, 0f);"));
  assert!(shader.diagnostics.is_empty());
}

#[test]
fn locals_never_collide_with_declarations() {
  let twice = twice();
  let main = HelperFn::new(
    FunctionDef::new(
      "main",
      [Param::new("a")],
      [
        Stmt::decl(DeclKind::Var, "twice", Expr::ident("a")),
        Stmt::ret(Expr::ident("twice")),
      ],
    ),
    Externals::new().function("helper", &twice),
  );

  let shader = compile_function(&Root::new(&main, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap();
  assert!(shader.code.contains("var twice = a;"));

  let shadowing = HelperFn::new(
    FunctionDef::new(
      "main",
      [Param::new("a")],
      [
        Stmt::decl(DeclKind::Var, "main", Expr::ident("a")),
        Stmt::ret(Expr::ident("main")),
      ],
    ),
    Externals::new(),
  );

  let shader = compile_function(&Root::new(&shadowing, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap();
  assert!(shader.code.contains("var main_1 = a;"), "{}", shader.code);
  assert!(shader.code.contains("return main_1;"));
}
