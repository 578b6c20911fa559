use memory::Value;
use vm::{ExecContext, ModuleBuilder, NativeRegistry, OpCode, RuntimeError, VM};

fn native_depth(ctx: &mut ExecContext<'_>, _args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    Ok(Some(Value::int(ctx.thread.running.size() as i64)))
}

/// gen: yields 1, then its argument count, then returns 100 + first argument.
fn generator(b: &mut ModuleBuilder) -> vm::Label {
    let body = b.label();
    b.emit_label(OpCode::FuncMk, body).def("gen");
    body
}

fn emit_generator_body(b: &mut ModuleBuilder) {
    b.push_int(100);
    b.push_int(1).op(OpCode::Yield);
    b.op(OpCode::ArgCs).op(OpCode::Yield);
    b.op(OpCode::ArgP).op(OpCode::Add).op(OpCode::Return);
}

// ============================================================================
// Suspension & resumption
// ============================================================================

#[test]
fn test_generator_resumes_with_saved_state() {
    let mut b = ModuleBuilder::new("gen");
    let body = generator(&mut b);

    b.push_ident("gen").call(OpCode::Call, 0); // 1
    b.push_int(7).push_int(8).push_ident("gen").call(OpCode::Call, 2); // argcs = 2
    b.push_int(40).push_ident("gen").call(OpCode::Call, 1); // 100 + 40
    b.push_ident("gen").call(OpCode::Call, 0); // finished, so a fresh run: 1
    b.op(OpCode::Add).op(OpCode::Add).op(OpCode::Add).op(OpCode::Return);

    b.bind(body);
    emit_generator_body(&mut b);

    let mut vm = VM::new();
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(144));
}

#[test]
fn test_generators_belong_to_the_calling_frame() {
    let mut b = ModuleBuilder::new("owner");
    let body = generator(&mut b);
    let h = b.label();
    b.emit_label(OpCode::LambdaMk, h).def("h");

    b.push_ident("gen").call(OpCode::Call, 0); // main's generator: 1
    b.push_ident("h").call(OpCode::Call, 0); // h starts its own: 1
    b.push_int(7).push_int(8).push_ident("gen").call(OpCode::Call, 2); // main's resumes: 2
    b.op(OpCode::Add).op(OpCode::Add).op(OpCode::Return);

    b.bind(h);
    b.push_ident("gen").call(OpCode::Call, 0).op(OpCode::Return);

    b.bind(body);
    emit_generator_body(&mut b);

    let mut vm = VM::new();
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(4));
}

#[test]
fn test_suspended_generator_keeps_running_depth_balanced() {
    let mut b = ModuleBuilder::new("depth");
    let body = generator(&mut b);
    b.push_ident("gen").call(OpCode::Call, 0).op(OpCode::Pop);
    b.push_ident("depth").call(OpCode::Call, 0).op(OpCode::Return);
    b.bind(body);
    emit_generator_body(&mut b);

    let mut vm = VM::new();
    vm.define_native("depth", native_depth, 0);
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(1));
}

// ============================================================================
// Root yield
// ============================================================================

#[test]
fn test_yield_at_root_returns() {
    let mut b = ModuleBuilder::new("root");
    b.push_int(9).op(OpCode::Yield);
    b.push_int(10).op(OpCode::Return);

    let mut vm = VM::new();
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(9));
    assert!(vm.thread(0).unwrap().running.is_empty());
}
