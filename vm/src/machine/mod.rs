//! Machine module - VM implementation
//!
//! The VM owns the heap, loaded modules, natives and threads. Each dispatch
//! step borrows them into an [`ExecContext`] for the thread being run; the
//! opcode handlers are traits implemented on that context, one per concern.

mod arithmetic;
mod context;
mod continuation;
mod control;
mod data;
mod frame;
mod gc;
mod kernel;
mod native;
mod running;
mod stack;
mod thread;
mod vm;

// Public API
pub use context::{display_value, ExecContext};
pub use continuation::{
    capture, patch_trap_to_environment, rebuild_frame, reentry_point, snapshot_frame,
    ContinuationTracking,
};
pub use control::ControlFlowOps;
pub use frame::{FrameConfig, RunningFrame};
pub use gc::GarbageCollector;
pub use kernel::KernelRecord;
pub use native::NativeRegistry;
pub use running::RunningStack;
pub use stack::{transport, ComputingStack};
pub use thread::{Thread, ThreadStatus};
pub use vm::{LoadedModule, VM};
