//! OpCode definitions for the CLVM
//!
//! Every instrument in a module's `.txt` section is a fixed-width pair
//! `(opcode: u32, operand: u32)`. Operands are data ids, program counters,
//! counts, or immediates depending on the opcode; opcodes that take no
//! operand ignore it.
//!
//! The machine is stack-based: operations consume and produce values on the
//! current frame's computing stack.

use std::fmt;

/// Virtual machine instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    /// No operation
    Nop = 0x00,

    // ===== Data =====
    /// Push constant: S.push(D[operand])
    Push = 0x01,
    /// Push immediate integer: S.push(operand as i32)
    PushInt = 0x02,
    /// Push none
    PushNone = 0x03,
    /// Discard top
    Pop = 0x04,
    /// Duplicate top
    Dup = 0x05,
    /// Replace an identifier on top with its bound value
    Solve = 0x06,
    /// Define: [value, ident] -> scope[ident] = value
    Def = 0x07,
    /// Assign to the nearest existing binding: [value, ident]
    Set = 0x08,
    /// Move the next staged argument to the computing stack (none if exhausted)
    ArgP = 0x09,
    /// Push the frame's args_count
    ArgCs = 0x0A,

    // ===== Function values =====
    /// Plain function entering at operand
    FuncMk = 0x10,
    /// Lambda capturing the current scope, entering at operand
    LambdaMk = 0x11,
    /// Promise capturing the current scope, entering at operand
    PromMk = 0x12,
    /// Capture the running stack as a continuation landing at operand
    ContMk = 0x13,

    // ===== Arithmetic & Comparison =====
    /// [a, b] -> a + b (ints, or string concatenation)
    Add = 0x20,
    /// [a, b] -> a - b
    Sub = 0x21,
    /// [a, b] -> a * b
    Mul = 0x22,
    /// [a, b] -> a / b
    Div = 0x23,
    /// [a, b] -> a % b
    Mod = 0x24,
    /// [a, b] -> a == b
    Eq = 0x25,
    /// [a, b] -> a < b
    Lt = 0x26,
    /// [a, b] -> a > b
    Gt = 0x27,
    /// [a] -> !a
    Not = 0x28,

    // ===== Flow Control =====
    /// Unconditional jump: pc = operand
    Jmp = 0x30,
    /// Pop condition, jump to operand if truthy
    JmpC = 0x31,

    // ===== Control transfer =====
    /// [args.., f, n] -> call f
    Call = 0x40,
    /// Call that replaces the caller frame
    TailCall = 0x41,
    /// Call a computed function value (identifiers are rejected)
    CallC = 0x42,
    /// Tail variant of CallC
    TailCallC = 0x43,
    /// Return top to the caller
    Return = 0x44,
    /// Set the caller's pc to operand, then return
    ReturnTo = 0x45,
    /// Return none
    RetNone = 0x46,
    /// Pass top to the caller and suspend this frame as a generator
    Yield = 0x47,
    /// Move the top operand values to the caller without returning
    Lift = 0x48,
    /// Arm a one-shot trap at operand
    TrapSet = 0x49,
    /// Jump to the armed trap pc, if any, and disarm it
    Trap = 0x4A,
    /// [promise, value] -> cached value
    PromC = 0x4B,
}

impl OpCode {
    /// Get opcode from its encoded value
    pub fn from_u32(word: u32) -> Option<Self> {
        match word {
            0x00 => Some(OpCode::Nop),
            0x01 => Some(OpCode::Push),
            0x02 => Some(OpCode::PushInt),
            0x03 => Some(OpCode::PushNone),
            0x04 => Some(OpCode::Pop),
            0x05 => Some(OpCode::Dup),
            0x06 => Some(OpCode::Solve),
            0x07 => Some(OpCode::Def),
            0x08 => Some(OpCode::Set),
            0x09 => Some(OpCode::ArgP),
            0x0A => Some(OpCode::ArgCs),
            0x10 => Some(OpCode::FuncMk),
            0x11 => Some(OpCode::LambdaMk),
            0x12 => Some(OpCode::PromMk),
            0x13 => Some(OpCode::ContMk),
            0x20 => Some(OpCode::Add),
            0x21 => Some(OpCode::Sub),
            0x22 => Some(OpCode::Mul),
            0x23 => Some(OpCode::Div),
            0x24 => Some(OpCode::Mod),
            0x25 => Some(OpCode::Eq),
            0x26 => Some(OpCode::Lt),
            0x27 => Some(OpCode::Gt),
            0x28 => Some(OpCode::Not),
            0x30 => Some(OpCode::Jmp),
            0x31 => Some(OpCode::JmpC),
            0x40 => Some(OpCode::Call),
            0x41 => Some(OpCode::TailCall),
            0x42 => Some(OpCode::CallC),
            0x43 => Some(OpCode::TailCallC),
            0x44 => Some(OpCode::Return),
            0x45 => Some(OpCode::ReturnTo),
            0x46 => Some(OpCode::RetNone),
            0x47 => Some(OpCode::Yield),
            0x48 => Some(OpCode::Lift),
            0x49 => Some(OpCode::TrapSet),
            0x4A => Some(OpCode::Trap),
            0x4B => Some(OpCode::PromC),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Push => "push",
            OpCode::PushInt => "pushint",
            OpCode::PushNone => "pushnone",
            OpCode::Pop => "pop",
            OpCode::Dup => "dup",
            OpCode::Solve => "solve",
            OpCode::Def => "def",
            OpCode::Set => "set",
            OpCode::ArgP => "argp",
            OpCode::ArgCs => "argcs",
            OpCode::FuncMk => "funcmk",
            OpCode::LambdaMk => "lambdamk",
            OpCode::PromMk => "prommk",
            OpCode::ContMk => "contmk",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Mod => "mod",
            OpCode::Eq => "eq",
            OpCode::Lt => "lt",
            OpCode::Gt => "gt",
            OpCode::Not => "not",
            OpCode::Jmp => "jmp",
            OpCode::JmpC => "jmpc",
            OpCode::Call => "call",
            OpCode::TailCall => "tailcall",
            OpCode::CallC => "callc",
            OpCode::TailCallC => "tailcallc",
            OpCode::Return => "return",
            OpCode::ReturnTo => "returnto",
            OpCode::RetNone => "retnone",
            OpCode::Yield => "yield",
            OpCode::Lift => "lift",
            OpCode::TrapSet => "trapset",
            OpCode::Trap => "trap",
            OpCode::PromC => "promc",
        }
    }

    /// Whether the operand is meaningful for this opcode (disassembly).
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            OpCode::Push
                | OpCode::PushInt
                | OpCode::FuncMk
                | OpCode::LambdaMk
                | OpCode::PromMk
                | OpCode::ContMk
                | OpCode::Jmp
                | OpCode::JmpC
                | OpCode::ReturnTo
                | OpCode::Lift
                | OpCode::TrapSet
        )
    }

    /// Opcodes handled by the control dispatcher.
    pub fn is_control(self) -> bool {
        (self as u32) >= 0x40 || self == OpCode::ContMk
    }

    pub fn is_arithmetic(self) -> bool {
        (0x20..0x30).contains(&(self as u32))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One `(opcode, operand)` pair of a module's text section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instrument {
    pub opcode: u32,
    pub operand: u32,
}

impl Instrument {
    pub fn new(op: OpCode, operand: u32) -> Self {
        Self {
            opcode: op.as_u32(),
            operand,
        }
    }

    pub fn op(&self) -> Option<OpCode> {
        OpCode::from_u32(self.opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(OpCode::Call.as_u32(), 0x40);
        assert_eq!(OpCode::from_u32(0x40), Some(OpCode::Call));
        assert_eq!(OpCode::from_u32(0x00), Some(OpCode::Nop));
        assert_eq!(OpCode::from_u32(0x3F), None); // not assigned
    }

    #[test]
    fn test_every_opcode_round_trips() {
        for word in 0..0x100u32 {
            if let Some(op) = OpCode::from_u32(word) {
                assert_eq!(op.as_u32(), word, "{}", op);
            }
        }
    }

    #[test]
    fn test_dispatch_classes() {
        assert!(OpCode::ContMk.is_control());
        assert!(OpCode::PromC.is_control());
        assert!(!OpCode::Push.is_control());
        assert!(OpCode::Mod.is_arithmetic());
        assert!(!OpCode::Jmp.is_arithmetic());
    }

    #[test]
    fn test_instrument_decodes_opcode() {
        let ins = Instrument::new(OpCode::Lift, 2);
        assert_eq!(ins.op(), Some(OpCode::Lift));
        assert_eq!(ins.operand, 2);
        assert_eq!(Instrument { opcode: 0xFFFF, operand: 0 }.op(), None);
    }
}
