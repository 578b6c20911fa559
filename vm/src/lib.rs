pub mod config;
pub mod disasm;
pub mod error;
pub mod loader;
pub mod machine;
pub mod module;
pub mod native;
pub mod opcode;
pub mod stdlib;

pub use config::VmConfig;
pub use error::{ErrorRecord, LoaderError, RuntimeError};
pub use machine::{ExecContext, GarbageCollector, NativeRegistry, Thread, ThreadStatus, VM};
pub use module::{DataValue, ExportItem, Label, Module, ModuleBuilder};
pub use native::{NativeFn, NativeObj};
pub use opcode::{Instrument, OpCode};
