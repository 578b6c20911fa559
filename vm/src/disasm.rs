//! Human-readable listing of a module.

use crate::module::{DataValue, Module};
use crate::opcode::OpCode;
use std::fmt::Write;

pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {}", module.name);

    let _ = writeln!(out, "\n.dat ({} items)", module.data.len());
    for (id, item) in &module.data {
        let _ = writeln!(out, "  {:>4}  {}", id, describe_item(item));
    }

    let _ = writeln!(out, "\n.txt ({} instruments)", module.text.len());
    for (pc, ins) in module.text.iter().enumerate() {
        let line = match ins.op() {
            Some(op) if op.has_operand() => {
                format!("{:<10} {}{}", op.name(), ins.operand, operand_note(module, op, ins.operand))
            }
            Some(op) => op.name().to_string(),
            None => format!("<0x{:02x}> {}", ins.opcode, ins.operand),
        };
        let _ = writeln!(out, "  {:04}  {}", pc, line);
    }

    let _ = writeln!(out, "\n.exp ({} items)", module.exports.len());
    for export in &module.exports {
        let name = module.data_text(export.name_id).unwrap_or("?");
        let args = module.export_args(export).unwrap_or_default().join(", ");
        let _ = writeln!(out, "  {}({})", name, args);
    }
    out
}

fn describe_item(item: &DataValue) -> String {
    match item {
        DataValue::Int(n) => format!("int {}", n),
        DataValue::Str(s) => format!("string {:?}", s),
        DataValue::Ident(s) => format!("ident {}", s),
        DataValue::None => "none".to_string(),
    }
}

fn operand_note(module: &Module, op: OpCode, operand: u32) -> String {
    match op {
        OpCode::Push => module
            .data
            .get(&operand)
            .map(|item| format!("  ; {}", describe_item(item)))
            .unwrap_or_else(|| "  ; <missing>".to_string()),
        OpCode::PushInt => {
            let n = operand as i32;
            if n < 0 {
                format!("  ; {}", n)
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}
