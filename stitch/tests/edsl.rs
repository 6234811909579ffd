#![cfg(feature = "edsl")]

use stitch::{
  ast::{BinaryOp, DeclKind, Expr, FunctionDef, Param, Stmt},
  compile::{compile_function, Argument, CompileOptions, Root},
  error::Error,
  fun::{Externals, HelperFn},
  shader,
  types::{DataType, ScalarKind},
};

shader! {
  fn add(a: _, b: _) {
    a + b
  }

  fn sum(n: u32) -> u32 {
    let mut total = 0u32;

    for i in 0u32..n {
      total += i;
    }

    total
  }

  fn to_float(x: i32) -> f32 {
    x as f32
  }

  fn pick(c: bool, a: f32, b: f32) -> f32 {
    if c {
      return a;
    } else {
      return b;
    }
  }

  fn relu(x: f32) {
    std.max(x, 0.0)
  }

  fn scale(v: vec3f, k: _) -> vec3f {
    v * k
  }

  pub fn halves() -> [f32; 2] {
    let k = 0.5;
    [k, k]
  }

  fn make_light(p: f32) {
    Light { power: p, on: true }
  }

  fn dim(l: light) -> f32 {
    l.power * 0.5
  }

  fn frozen(a: f32) {
    let y = a + 1.0;
    y = 2.0;
    y
  }
}

fn light() -> DataType {
  DataType::structure("Light", [("power", DataType::F32), ("on", DataType::BOOL)])
}

fn compile(def: FunctionDef, args: impl IntoIterator<Item = Argument>) -> String {
  let f = HelperFn::new(def, Externals::new());
  compile_function(&Root::new(&f, args), CompileOptions::default())
    .unwrap()
    .code
}

#[test]
fn definitions() {
  assert_eq!(
    add(),
    FunctionDef::new(
      "add",
      [Param::new("a"), Param::new("b")],
      [Stmt::ret(Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b")))],
    )
  );

  let sum = sum();
  assert_eq!(sum.params, [Param::typed("n", DataType::U32)]);
  assert_eq!(sum.return_type, Some(DataType::U32));
  assert_eq!(
    sum.body[0],
    Stmt::decl(DeclKind::Let, "total", Expr::call(Expr::ident("u32"), [Expr::Int(0)]))
  );

  assert_eq!(scale().params, [Param::typed("v", DataType::vec(3, ScalarKind::F32)), Param::new("k")]);
  assert_eq!(halves().return_type, Some(DataType::array(DataType::F32, 2)));
  assert_eq!(halves().body[0], Stmt::decl(DeclKind::Const, "k", Expr::Float(0.5)));
}

#[test]
fn counting_loops() {
  assert_eq!(
    compile(sum(), [Argument::runtime(DataType::U32)]),
    "fn sum(n: u32) -> u32 {\n  var total = 0u;\n  for (var i = 0u; (i < n); i++) {\n    total += i;\n  }\n  return total;\n}\n"
  );
}

#[test]
fn casts() {
  assert_eq!(
    compile(to_float(), [Argument::runtime(DataType::I32)]),
    "fn to_float(x: i32) -> f32 {\n  return f32(x);\n}\n"
  );
}

#[test]
fn branches() {
  let args = [
    Argument::runtime(DataType::BOOL),
    Argument::runtime(DataType::F32),
    Argument::runtime(DataType::F32),
  ];

  assert_eq!(
    compile(pick(), args),
    "fn pick(c: bool, a: f32, b: f32) -> f32 {\n  if c {\n    return a;\n  } else {\n    return b;\n  }\n}\n"
  );
}

#[test]
fn std_calls() {
  let code = compile(relu(), [Argument::runtime(DataType::F32)]);
  assert_eq!(code, "fn relu(x: f32) -> f32 {\n  return max(x, 0f);\n}\n");
}

#[test]
fn struct_literals() {
  let f = HelperFn::new(make_light(), Externals::new().schema("Light", light()));
  let shader = compile_function(&Root::new(&f, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap();

  assert_eq!(
    shader.code,
    "struct Light {\n  power: f32,\n  on: bool,\n}\n\nfn make_light(p: f32) -> Light {\n  return Light(p, true);\n}\n"
  );

  let param = &dim().params[0];
  assert_eq!(param.name, "l");
  assert!(matches!(param.ty, Some(DataType::Struct(_))));
}

#[test]
fn untyped_helpers_infer() {
  let code = compile(
    add(),
    [
      Argument::runtime(DataType::vec(2, ScalarKind::F32)),
      Argument::runtime(DataType::vec(2, ScalarKind::F32)),
    ],
  );

  assert_eq!(code, "fn add(a: vec2f, b: vec2f) -> vec2f {\n  return (a + b);\n}\n");
}

#[test]
fn immutable_lets() {
  let f = HelperFn::new(frozen(), Externals::new());
  let err = compile_function(&Root::new(&f, [Argument::runtime(DataType::F32)]), CompileOptions::default()).unwrap_err();

  assert!(matches!(err.root_cause(), Error::AssignToImmutable { target, .. } if target == "y"), "{}", err);
}
