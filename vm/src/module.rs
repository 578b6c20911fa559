//! Compiled modules and an in-memory builder.
//!
//! A [`Module`] mirrors the three sections of a `.clnu` container: the data
//! table (`.dat`), the instrument array (`.txt`), and the export table
//! (`.exp`). [`ModuleBuilder`] assembles modules directly, with forward
//! labels, for hosts and tests that do not go through a container file.

use crate::error::LoaderError;
use crate::opcode::{Instrument, OpCode};
use std::collections::BTreeMap;

// .dat item types
pub const DATA_TYPE_INT: u32 = 1;
pub const DATA_TYPE_STRING: u32 = 2;
pub const DATA_TYPE_IDENTIFIER: u32 = 3;
pub const DATA_TYPE_NONE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    Int(i64),
    Str(String),
    Ident(String),
    None,
}

impl DataValue {
    pub fn type_tag(&self) -> u32 {
        match self {
            DataValue::Int(_) => DATA_TYPE_INT,
            DataValue::Str(_) => DATA_TYPE_STRING,
            DataValue::Ident(_) => DATA_TYPE_IDENTIFIER,
            DataValue::None => DATA_TYPE_NONE,
        }
    }
}

/// An exported entry: its name and the identifiers its arguments bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportItem {
    pub name_id: u32,
    pub args: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub name: String,
    pub data: BTreeMap<u32, DataValue>,
    pub text: Vec<Instrument>,
    pub exports: Vec<ExportItem>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn instrument(&self, pc: usize) -> Option<Instrument> {
        self.text.get(pc).copied()
    }

    /// Text of a string or identifier data item.
    pub fn data_text(&self, id: u32) -> Option<&str> {
        match self.data.get(&id)? {
            DataValue::Str(s) | DataValue::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn export(&self, name: &str) -> Option<&ExportItem> {
        self.exports
            .iter()
            .find(|e| self.data_text(e.name_id) == Some(name))
    }

    /// Argument names of an export, in binding order.
    pub fn export_args(&self, export: &ExportItem) -> Option<Vec<&str>> {
        export.args.iter().map(|id| self.data_text(*id)).collect()
    }
}

/// A forward-referencable program position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

pub struct ModuleBuilder {
    module: Module,
    next_id: u32,
    labels: Vec<Option<u32>>,
    fixups: Vec<(usize, Label)>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module::new(name),
            next_id: 0,
            labels: Vec::new(),
            fixups: Vec::new(),
        }
    }

    /// Current program counter (index of the next emitted instrument).
    pub fn pc(&self) -> u32 {
        self.module.text.len() as u32
    }

    // --- Data ---

    /// Add a data item, reusing an existing identical one.
    pub fn data(&mut self, value: DataValue) -> u32 {
        if let Some((id, _)) = self.module.data.iter().find(|(_, v)| **v == value) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.module.data.insert(id, value);
        id
    }

    pub fn ident(&mut self, name: &str) -> u32 {
        self.data(DataValue::Ident(name.to_string()))
    }

    pub fn string(&mut self, s: &str) -> u32 {
        self.data(DataValue::Str(s.to_string()))
    }

    pub fn int(&mut self, n: i64) -> u32 {
        self.data(DataValue::Int(n))
    }

    // --- Labels ---

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current pc.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.pc());
        self
    }

    /// A label already bound to the current pc.
    pub fn here(&mut self) -> Label {
        let l = self.label();
        self.bind(l);
        l
    }

    // --- Emission ---

    pub fn emit(&mut self, op: OpCode, operand: u32) -> &mut Self {
        self.module.text.push(Instrument::new(op, operand));
        self
    }

    pub fn op(&mut self, op: OpCode) -> &mut Self {
        self.emit(op, 0)
    }

    /// Emit `op` whose operand is the pc `label` resolves to.
    pub fn emit_label(&mut self, op: OpCode, label: Label) -> &mut Self {
        self.fixups.push((self.module.text.len(), label));
        self.emit(op, 0)
    }

    pub fn push_int(&mut self, n: i32) -> &mut Self {
        self.emit(OpCode::PushInt, n as u32)
    }

    pub fn push_ident(&mut self, name: &str) -> &mut Self {
        let id = self.ident(name);
        self.emit(OpCode::Push, id)
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        let id = self.string(s);
        self.emit(OpCode::Push, id)
    }

    /// `value` must already be on the stack.
    pub fn def(&mut self, name: &str) -> &mut Self {
        self.push_ident(name).op(OpCode::Def)
    }

    /// Push `argc` and emit a call-family opcode.
    pub fn call(&mut self, op: OpCode, argc: i32) -> &mut Self {
        self.push_int(argc).op(op)
    }

    pub fn export(&mut self, name: &str, args: &[&str]) -> &mut Self {
        let name_id = self.ident(name);
        let args = args.iter().map(|a| self.ident(a)).collect();
        self.module.exports.push(ExportItem { name_id, args });
        self
    }

    pub fn build(mut self) -> Result<Module, LoaderError> {
        for (at, label) in &self.fixups {
            let target = self.labels[label.0]
                .ok_or_else(|| LoaderError::Format(format!("unbound label {}", label.0)))?;
            self.module.text[*at].operand = target;
        }
        Ok(self.module)
    }
}
