use thiserror::Error;

/// Errors raised while executing bytecode.
///
/// None of these are retried. They indicate either corrupt bytecode or a
/// broken VM invariant, and halt the thread that raised them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("null pointer: {0}")]
    NullPointer(String),
    #[error("out of memory")]
    OutOfMemory,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("computing stack empty")]
    ComputingStackEmpty,
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
    #[error("divide by zero")]
    DivideByZero,
    #[error("invalid opcode 0x{0:02x}")]
    InvalidOpcode(u32),
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("{0}")]
    Native(String),
}

impl RuntimeError {
    pub fn internal(msg: impl Into<String>) -> Self {
        RuntimeError::Internal(msg.into())
    }

    pub fn invalid_operand(msg: impl Into<String>) -> Self {
        RuntimeError::InvalidOperand(msg.into())
    }
}

/// Where and why a thread halted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{module}@{pc}: {opcode} {operand}: {error}")]
pub struct ErrorRecord {
    pub module: String,
    pub pc: usize,
    pub opcode: String,
    pub operand: u32,
    pub error: RuntimeError,
}

/// Errors raised while reading or writing a `.clnu` container.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad container: {0}")]
    Format(String),
    #[error("container rejected: {0}")]
    Security(String),
}
