use memory::Value;
use vm::{ExecContext, ModuleBuilder, NativeRegistry, OpCode, RuntimeError, VM};

fn native_depth(ctx: &mut ExecContext<'_>, _args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    Ok(Some(Value::int(ctx.thread.running.size() as i64)))
}

fn run(b: ModuleBuilder) -> Value {
    let mut vm = VM::new();
    vm.define_native("depth", native_depth, 0);
    let module = b.build().expect("build failed");
    vm.execute(module).expect("runtime error")
}

fn text(vm: &VM, val: Value) -> String {
    vm.heap.text_of(val).expect("not a string").to_string()
}

// ============================================================================
// Data & arithmetic
// ============================================================================

#[test]
fn test_arithmetic_end_to_end() {
    // 1 + 2 * 3
    let mut b = ModuleBuilder::new("t");
    b.push_int(1).push_int(2).push_int(3).op(OpCode::Mul).op(OpCode::Add).op(OpCode::Return);
    assert_eq!(run(b), Value::int(7));
}

#[test]
fn test_negative_immediates_and_remainder() {
    let mut b = ModuleBuilder::new("t");
    b.push_int(-7).push_int(2).op(OpCode::Mod).op(OpCode::Return);
    assert_eq!(run(b), Value::int(-1));
}

#[test]
fn test_comparisons_and_not() {
    let mut b = ModuleBuilder::new("t");
    b.push_int(1).push_int(2).op(OpCode::Lt); // true
    b.push_int(1).push_int(2).op(OpCode::Gt); // false
    b.op(OpCode::Not).op(OpCode::Eq).op(OpCode::Return); // true == !false
    assert_eq!(run(b), Value::bool(true));
}

#[test]
fn test_int_constants_from_data_table() {
    let mut b = ModuleBuilder::new("t");
    let big = b.int(1 << 40);
    b.emit(OpCode::Push, big).push_int(1).op(OpCode::Add).op(OpCode::Return);
    assert_eq!(run(b), Value::int((1 << 40) + 1));
}

#[test]
fn test_def_set_and_solve() {
    let mut b = ModuleBuilder::new("t");
    b.push_int(10).def("x");
    b.push_ident("x").push_int(5).op(OpCode::Add).push_ident("x").op(OpCode::Set);
    b.push_ident("x").op(OpCode::Solve).op(OpCode::Return);
    assert_eq!(run(b), Value::int(15));
}

#[test]
fn test_string_concatenation_and_equality() {
    let mut vm = VM::new();
    let mut b = ModuleBuilder::new("t");
    b.push_str("con").push_str("cat").op(OpCode::Add).op(OpCode::Dup);
    b.push_str("concat").op(OpCode::Eq).op(OpCode::Pop).op(OpCode::Return);
    let result = vm.execute(b.build().unwrap()).unwrap();
    assert_eq!(text(&vm, result), "concat");

    let mut b = ModuleBuilder::new("t2");
    b.push_str("con").push_str("cat").op(OpCode::Add);
    b.push_str("concat").op(OpCode::Eq).op(OpCode::Return);
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::bool(true));
}

#[test]
fn test_conditional_jump_loop() {
    // i = 0; while i < 10 { i = i + 1 }; return i
    let mut b = ModuleBuilder::new("t");
    b.push_int(0).def("i");
    let top = b.here();
    b.push_ident("i").push_int(1).op(OpCode::Add).push_ident("i").op(OpCode::Set);
    b.push_ident("i").push_int(10).op(OpCode::Lt);
    b.emit_label(OpCode::JmpC, top);
    b.push_ident("i").op(OpCode::Return);
    assert_eq!(run(b), Value::int(10));
}

#[test]
fn test_running_off_the_end_returns_none() {
    let mut b = ModuleBuilder::new("t");
    b.push_int(1).op(OpCode::Pop);
    assert_eq!(run(b), Value::none());
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_call_return_restores_depth() {
    let mut b = ModuleBuilder::new("t");
    let f = b.label();
    b.emit_label(OpCode::FuncMk, f).def("f");
    b.push_ident("depth").call(OpCode::Call, 0); // 1
    b.push_ident("f").call(OpCode::Call, 0); // 2, measured inside f
    b.op(OpCode::Pop);
    b.push_ident("depth").call(OpCode::Call, 0); // 1 again
    b.op(OpCode::Eq).op(OpCode::Return);
    b.bind(f);
    b.push_ident("depth").call(OpCode::Call, 0).op(OpCode::Return);
    assert_eq!(run(b), Value::bool(true));

    let mut b = ModuleBuilder::new("inner");
    let f = b.label();
    b.emit_label(OpCode::FuncMk, f).def("f");
    b.push_ident("f").call(OpCode::Call, 0).op(OpCode::Return);
    b.bind(f);
    b.push_ident("depth").call(OpCode::Call, 0).op(OpCode::Return);
    assert_eq!(run(b), Value::int(2));
}

#[test]
fn test_arguments_arrive_in_order() {
    // sub(a, b) = a - b
    let mut b = ModuleBuilder::new("t");
    let sub = b.label();
    b.emit_label(OpCode::FuncMk, sub).def("sub");
    b.push_int(10).push_int(3).push_ident("sub").call(OpCode::Call, 2).op(OpCode::Return);
    b.bind(sub);
    b.op(OpCode::ArgP).def("a").op(OpCode::ArgP).def("b");
    b.push_ident("a").push_ident("b").op(OpCode::Sub).op(OpCode::Return);
    assert_eq!(run(b), Value::int(7));
}

#[test]
fn test_exhausted_arguments_read_as_none_and_argcs_counts() {
    let mut b = ModuleBuilder::new("t");
    let f = b.label();
    b.emit_label(OpCode::FuncMk, f).def("f");
    b.push_int(4).push_ident("f").call(OpCode::Call, 1).op(OpCode::Return);
    b.bind(f);
    // [argc, arg1, arg2] -> arg2 is none
    b.op(OpCode::ArgCs).op(OpCode::ArgP).op(OpCode::Add);
    b.op(OpCode::ArgP).op(OpCode::Not).op(OpCode::Pop).op(OpCode::Return);
    assert_eq!(run(b), Value::int(5));
}

#[test]
fn test_lambda_sees_its_defining_scope() {
    let mut b = ModuleBuilder::new("t");
    let adder = b.label();
    let inner = b.label();
    b.emit_label(OpCode::FuncMk, adder).def("make_adder");
    b.push_int(5).push_ident("make_adder").call(OpCode::Call, 1); // closure over n = 5
    b.def("add5");
    b.push_int(37).push_ident("add5").call(OpCode::Call, 1).op(OpCode::Return);

    b.bind(adder);
    b.op(OpCode::ArgP).def("n");
    b.emit_label(OpCode::LambdaMk, inner).op(OpCode::Return);

    b.bind(inner);
    b.op(OpCode::ArgP).push_ident("n").op(OpCode::Add).op(OpCode::Return);
    assert_eq!(run(b), Value::int(42));
}

#[test]
fn test_plain_functions_do_not_capture() {
    let mut b = ModuleBuilder::new("t");
    let f = b.label();
    b.push_int(1).def("local");
    b.emit_label(OpCode::FuncMk, f).def("f");
    b.push_ident("f").call(OpCode::Call, 0).op(OpCode::Return);
    b.bind(f);
    b.push_ident("local").op(OpCode::Return);

    let mut vm = VM::new();
    let err = vm.execute(b.build().unwrap()).unwrap_err();
    assert_eq!(err.error, RuntimeError::UndefinedVariable("local".into()));
}

#[test]
fn test_computed_call() {
    let mut b = ModuleBuilder::new("t");
    let f = b.label();
    b.emit_label(OpCode::FuncMk, f).def("f");
    b.push_ident("f").op(OpCode::Solve).call(OpCode::CallC, 0).op(OpCode::Return);
    b.bind(f);
    b.push_int(11).op(OpCode::Return);
    assert_eq!(run(b), Value::int(11));
}

#[test]
fn test_tail_calls_keep_depth_flat() {
    // count(n) = n == 0 ? depth() : tailcall count(n - 1)
    let mut vm = VM::with_config(vm::VmConfig {
        max_depth: 8,
        ..Default::default()
    });
    vm.define_native("depth", native_depth, 0);

    let mut b = ModuleBuilder::new("t");
    let count = b.label();
    let done = b.label();
    b.emit_label(OpCode::LambdaMk, count).def("count");
    b.push_int(50).push_ident("count").call(OpCode::Call, 1).op(OpCode::Return);
    b.bind(count);
    b.op(OpCode::ArgP).def("n");
    b.push_ident("n").push_int(0).op(OpCode::Eq).emit_label(OpCode::JmpC, done);
    b.push_ident("n").push_int(1).op(OpCode::Sub);
    b.push_ident("count").call(OpCode::TailCall, 1);
    b.bind(done);
    b.push_ident("depth").call(OpCode::Call, 0).op(OpCode::Return);

    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(2));
}

#[test]
fn test_recursion_hits_depth_limit() {
    let mut vm = VM::with_config(vm::VmConfig {
        max_depth: 8,
        ..Default::default()
    });
    let mut b = ModuleBuilder::new("t");
    let r = b.label();
    b.emit_label(OpCode::LambdaMk, r).def("r");
    b.push_ident("r").call(OpCode::Call, 0).op(OpCode::Return);
    b.bind(r);
    b.push_ident("r").call(OpCode::Call, 0).op(OpCode::Return);

    let err = vm.execute(b.build().unwrap()).unwrap_err();
    assert!(matches!(err.error, RuntimeError::OutOfBounds(_)), "{}", err);
    assert_eq!(err.opcode, "call");
    assert!(vm.thread(0).unwrap().running.is_empty(), "halted thread is torn down");
}

#[test]
fn test_natives_receive_solved_arguments() {
    let mut vm = VM::new();
    let mut b = ModuleBuilder::new("t");
    b.push_str("abc").def("s");
    b.push_ident("s").push_ident("len").call(OpCode::Call, 1);
    b.push_ident("s").push_ident("typeof").call(OpCode::Call, 1);
    b.op(OpCode::Pop).op(OpCode::Return);
    assert_eq!(vm.execute(b.build().unwrap()).unwrap(), Value::int(3));
}

#[test]
fn test_native_without_result_pushes_zero() {
    let mut b = ModuleBuilder::new("t");
    b.push_str("hello from the vm").push_ident("print").call(OpCode::Call, 1);
    b.op(OpCode::Return);
    assert_eq!(run(b), Value::int(0));
}

#[test]
fn test_typeof_reports_function_kinds() {
    let mut vm = VM::new();
    let mut b = ModuleBuilder::new("t");
    let body = b.label();
    b.emit_label(OpCode::PromMk, body).push_ident("typeof").call(OpCode::Call, 1);
    b.op(OpCode::Return);
    b.bind(body);
    b.op(OpCode::RetNone);
    let result = vm.execute(b.build().unwrap()).unwrap();
    assert_eq!(text(&vm, result), "promise");
}

#[test]
fn test_returnto_delivers_solved_value_and_redirects_caller() {
    let mut b = ModuleBuilder::new("t");
    let f = b.label();
    let resume = b.label();
    b.emit_label(OpCode::FuncMk, f).def("f");
    b.push_ident("f").call(OpCode::Call, 0);
    b.push_int(100).op(OpCode::Return); // skipped
    b.bind(resume);
    b.op(OpCode::Return);
    b.bind(f);
    b.push_int(7).def("y");
    b.push_ident("y").emit_label(OpCode::ReturnTo, resume);
    assert_eq!(run(b), Value::int(7));
}

#[test]
fn test_returnto_with_unbound_value_halts() {
    let mut b = ModuleBuilder::new("t");
    let f = b.label();
    let resume = b.label();
    b.emit_label(OpCode::FuncMk, f).def("f");
    b.push_ident("f").call(OpCode::Call, 0).op(OpCode::Return);
    b.bind(resume);
    b.op(OpCode::Return);
    b.bind(f);
    b.push_ident("missing").emit_label(OpCode::ReturnTo, resume);

    let mut vm = VM::new();
    let err = vm.execute(b.build().unwrap()).unwrap_err();
    assert_eq!(err.opcode, "returnto");
    assert_eq!(err.error, RuntimeError::UndefinedVariable("missing".into()));
}

// ============================================================================
// LIFT & traps
// ============================================================================

#[test]
fn test_lift_moves_values_to_caller() {
    let mut b = ModuleBuilder::new("t");
    let l = b.label();
    b.emit_label(OpCode::FuncMk, l).def("l");
    b.push_ident("l").call(OpCode::Call, 0); // [3, 4, none]
    b.op(OpCode::Pop).op(OpCode::Add).op(OpCode::Return);
    b.bind(l);
    b.push_int(3).push_int(4).emit(OpCode::Lift, 2).op(OpCode::RetNone);
    assert_eq!(run(b), Value::int(7));
}

#[test]
fn test_lift_solves_identifiers_in_callee_scope() {
    let mut b = ModuleBuilder::new("t");
    let l = b.label();
    b.push_int(1).def("x");
    b.emit_label(OpCode::FuncMk, l).def("l");
    b.push_ident("l").call(OpCode::Call, 0).op(OpCode::Pop).op(OpCode::Return);
    b.bind(l);
    b.push_int(99).def("x");
    b.push_ident("x").emit(OpCode::Lift, 1).op(OpCode::RetNone);
    assert_eq!(run(b), Value::int(99));
}

#[test]
fn test_trap_is_one_shot() {
    let mut b = ModuleBuilder::new("t");
    let t = b.label();
    b.emit_label(OpCode::TrapSet, t).op(OpCode::Trap);
    b.push_int(1).op(OpCode::Return);
    b.bind(t);
    b.op(OpCode::Trap); // disarmed: falls through
    b.push_int(2).op(OpCode::Return);
    assert_eq!(run(b), Value::int(2));

    let mut b = ModuleBuilder::new("unarmed");
    b.op(OpCode::Trap).push_int(1).op(OpCode::Return);
    assert_eq!(run(b), Value::int(1));
}
