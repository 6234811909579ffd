use stitch::{
  compile::{compile_program, Argument, EntryPoint, Root},
  fun::{Externals, HelperFn},
  resource::Resource,
  shader,
  types::{Access, DataType, ScalarKind},
  CompileOptions,
};

shader! {
  fn damp(v: _, k: _) {
    v * std.clamp(k, 0.0, 1.0)
  }

  fn step(id: vec3u) {
    let i = id.x;

    if i < particles.length {
      particles[i] = damp(particles[i], friction);
    }
  }
}

fn main() {
  let vec4f = DataType::vec(4, ScalarKind::F32);
  let particles = Resource::storage("particles", DataType::runtime_array(vec4f), Access::ReadWrite).shared();
  let friction = Resource::uniform("friction", DataType::F32).shared();

  let damp = HelperFn::new(damp(), Externals::new());
  let step = HelperFn::new(
    step(),
    Externals::new()
      .function("damp", &damp)
      .resource("particles", &particles)
      .resource("friction", &friction),
  );

  let root = Root::new(
    &step,
    [Argument::builtin("global_invocation_id", DataType::vec(3, ScalarKind::U32))],
  )
  .entry(EntryPoint::Compute {
    workgroup_size: [64, 1, 1],
  });

  match compile_program(&[root], CompileOptions::default()) {
    Ok(program) => {
      println!("{}", program.code);

      for binding in &program.resources {
        println!("// {:?} {:?}: {}", binding.group, binding.binding, binding.name);
      }
    }

    Err(err) => eprintln!("error: {}", err),
  }
}
