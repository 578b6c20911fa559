use memory::Value;
use proptest::prelude::*;
use vm::loader::{decode_module, decode_text, encode_module, encode_text, read_module, write_module};
use vm::{ExportItem, Instrument, LoaderError, ModuleBuilder, OpCode, VM};

fn sample() -> vm::Module {
    let mut b = ModuleBuilder::new("sample");
    b.export("main", &["a", "b"]);
    b.push_ident("a").push_ident("b").op(OpCode::Add);
    b.push_str("unused").op(OpCode::Pop);
    let big = b.int(-(1 << 50));
    b.emit(OpCode::Push, big).op(OpCode::Pop);
    b.op(OpCode::Return);
    b.build().unwrap()
}

fn le_u32(bytes: &[u8], at: usize) -> usize {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_container_round_trip() {
    let module = sample();
    let mut bytes = Vec::new();
    write_module(&module, &mut bytes).unwrap();
    assert_eq!(&bytes[..4], b"CLNU");

    let decoded = read_module("sample", &mut bytes.as_slice()).unwrap();
    assert_eq!(decoded, module);
}

#[test]
fn test_loaded_module_executes() {
    let mut b = ModuleBuilder::new("exec");
    b.push_str("ab").push_str("cd").op(OpCode::Add);
    b.push_ident("len").call(OpCode::Call, 1).op(OpCode::Return);
    let bytes = encode_module(&b.build().unwrap()).unwrap();

    let module = decode_module("exec", &bytes).unwrap();
    let mut vm = VM::new();
    assert_eq!(vm.execute(module).unwrap(), Value::int(4));
}

#[test]
fn test_spawn_export_binds_arguments() {
    let bytes = encode_module(&sample()).unwrap();
    let mut vm = VM::new();
    let idx = vm.load_module(decode_module("sample", &bytes).unwrap());

    let id = vm
        .spawn_export(idx, "main", vec![Value::int(2), Value::int(3)])
        .unwrap();
    vm.run();
    assert_eq!(vm.outcome(id), Some(Ok(Value::int(5))));
}

#[test]
fn test_spawn_export_missing_arguments_are_none() {
    let mut b = ModuleBuilder::new("partial");
    b.export("main", &["a", "b"]);
    b.push_ident("b").op(OpCode::Return);
    let mut vm = VM::new();
    let idx = vm.load_module(b.build().unwrap());

    let id = vm.spawn_export(idx, "main", vec![Value::int(1)]).unwrap();
    vm.run();
    assert_eq!(vm.outcome(id), Some(Ok(Value::none())));
}

#[test]
fn test_spawn_unknown_export() {
    let mut vm = VM::new();
    let idx = vm.load_module(sample());
    assert!(vm.spawn_export(idx, "nope", Vec::new()).is_err());
}

proptest! {
    #[test]
    fn prop_text_section_round_trip(raw in prop::collection::vec((any::<u32>(), any::<u32>()), 0..64)) {
        let text: Vec<Instrument> = raw
            .into_iter()
            .map(|(opcode, operand)| Instrument { opcode, operand })
            .collect();
        let body = encode_text(&text).unwrap();
        prop_assert_eq!(decode_text(&body).unwrap(), text);
    }
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_bad_magic() {
    let mut bytes = encode_module(&sample()).unwrap();
    bytes[0] = b'X';
    assert!(matches!(
        decode_module("bad", &bytes),
        Err(LoaderError::Format(_))
    ));
}

#[test]
fn test_truncated_header() {
    let bytes = encode_module(&sample()).unwrap();
    assert!(matches!(
        decode_module("short", &bytes[..10]),
        Err(LoaderError::Io(_))
    ));
}

#[test]
fn test_truncated_text_section() {
    let mut body = encode_text(&[Instrument::new(OpCode::Nop, 0)]).unwrap();
    body.truncate(8);
    assert!(matches!(decode_text(&body), Err(LoaderError::Format(_))));
}

#[test]
fn test_section_count_limit() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"CLNU");
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(b"CLVM");
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&20u32.to_le_bytes());
    bytes.extend_from_slice(&1000u32.to_le_bytes());
    assert!(matches!(
        decode_module("bomb", &bytes),
        Err(LoaderError::Security(_))
    ));
}

#[test]
fn test_unknown_data_type() {
    let mut b = ModuleBuilder::new("types");
    b.push_int(0).op(OpCode::Return);
    b.int(1 << 40);
    let mut bytes = encode_module(&b.build().unwrap()).unwrap();

    // first section is .dat: info -> body offset -> first item -> type field
    let info = le_u32(&bytes, 24);
    let data = le_u32(&bytes, info + 8);
    let item = data + le_u32(&bytes, data + 4);
    bytes[item + 4..item + 8].copy_from_slice(&9u32.to_le_bytes());

    assert!(matches!(
        decode_module("types", &bytes),
        Err(LoaderError::Format(msg)) if msg.contains("unknown data type")
    ));
}

#[test]
fn test_export_with_missing_name() {
    let mut module = sample();
    module.exports.push(ExportItem {
        name_id: 999,
        args: Vec::new(),
    });
    let bytes = encode_module(&module).unwrap();
    assert!(matches!(
        decode_module("dangling", &bytes),
        Err(LoaderError::Format(_))
    ));
}
