use memory::Value;
use vm::{ExecContext, ModuleBuilder, NativeRegistry, OpCode, RuntimeError, VM};

/// Bumps the global `ticks` counter.
fn native_tick(ctx: &mut ExecContext<'_>, _args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    let ticks = ctx
        .heap
        .lookup(ctx.globals, "ticks")
        .and_then(|v| v.as_int())
        .unwrap_or(0);
    ctx.heap.assign(ctx.globals, "ticks", Value::int(ticks + 1));
    Ok(None)
}

fn vm_with_ticks() -> VM {
    let mut vm = VM::new();
    vm.define_global("ticks", Value::int(0));
    vm.define_native("tick", native_tick, 0);
    vm
}

/// Force promise `name`: `push 'p; solve; push 'p; call 0; promc`.
fn force(b: &mut ModuleBuilder, name: &str) {
    b.push_ident(name).op(OpCode::Solve);
    b.push_ident(name).call(OpCode::Call, 0).op(OpCode::PromC);
}

// ============================================================================
// At-most-once evaluation
// ============================================================================

#[test]
fn test_promise_body_runs_once() {
    let mut b = ModuleBuilder::new("promise");
    let body = b.label();
    b.emit_label(OpCode::PromMk, body).def("p");
    force(&mut b, "p");
    force(&mut b, "p");
    b.op(OpCode::Add).op(OpCode::Return);

    b.bind(body);
    b.push_ident("tick").call(OpCode::Call, 0).op(OpCode::Pop);
    b.push_int(42).op(OpCode::Return);

    let mut vm = vm_with_ticks();
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(84));
    assert_eq!(vm.global("ticks"), Some(Value::int(1)));
}

#[test]
fn test_promise_sees_its_defining_scope() {
    let mut b = ModuleBuilder::new("closure");
    let body = b.label();
    b.push_int(20).def("base");
    b.emit_label(OpCode::PromMk, body).def("p");
    force(&mut b, "p");
    b.op(OpCode::Return);

    b.bind(body);
    b.push_ident("base").push_int(1).op(OpCode::Add).op(OpCode::Return);

    let mut vm = VM::new();
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(21));
}

#[test]
fn test_promise_evaluation_counts_toward_depth() {
    let mut b = ModuleBuilder::new("cached");
    let body = b.label();
    b.emit_label(OpCode::PromMk, body).def("p");
    force(&mut b, "p");
    b.op(OpCode::Pop);
    force(&mut b, "p");
    b.op(OpCode::Return);

    b.bind(body);
    b.push_ident("tick").call(OpCode::Call, 0).op(OpCode::Pop);
    b.push_int(5).op(OpCode::Return);

    let mut vm = vm_with_ticks();
    vm.config.max_depth = 1;
    let err = vm.execute(b.build().unwrap()).unwrap_err();
    assert!(matches!(err.error, RuntimeError::OutOfBounds(_)));
    assert_eq!(vm.global("ticks"), Some(Value::int(0)));
}

// ============================================================================
// Type checks
// ============================================================================

#[test]
fn test_promc_rejects_non_promise() {
    let mut b = ModuleBuilder::new("bad");
    b.push_int(1).push_int(2).op(OpCode::PromC);

    let mut vm = VM::new();
    let err = vm.execute(b.build().unwrap()).unwrap_err();
    assert!(matches!(err.error, RuntimeError::InvalidOperand(_)));
    assert_eq!(err.opcode, "promc");
    assert_eq!(err.pc, 2);
}

#[test]
fn test_promc_rejects_plain_lambda() {
    let mut b = ModuleBuilder::new("lambda");
    let body = b.label();
    b.emit_label(OpCode::LambdaMk, body).push_int(5).op(OpCode::PromC);
    b.bind(body);
    b.op(OpCode::RetNone);

    let mut vm = VM::new();
    let err = vm.execute(b.build().unwrap()).unwrap_err();
    assert!(matches!(err.error, RuntimeError::InvalidOperand(_)));
}
