//! Continuation capture and the pieces of continuation restore.
//!
//! Capture freezes the running stack into an [`Environment`]: every frame is
//! snapshotted bottom-to-top and its scope chain deep-cloned through one
//! [`KernelRecord`], so ancestors shared by several frames are cloned once.
//!
//! Restore (driven by `ControlFlowOps::invoke_continuation`) works out how
//! much of the live stack still matches the snapshot, crushes the rest, and
//! rebuilds the missing frames from the snapshot with fresh serials.

use super::frame::RunningFrame;
use super::kernel::KernelRecord;
use super::running::RunningStack;
use super::stack::ComputingStack;
use crate::error::RuntimeError;
use memory::{Environment, EnvironmentFrame, Heap};

/// Continuations a thread has created and not yet outlived.
///
/// Entries are function handles. The list does not keep them alive: the
/// collector prunes entries whose function has been swept.
#[derive(Debug, Default)]
pub struct ContinuationTracking {
    entries: Vec<u32>,
}

impl ContinuationTracking {
    pub fn track(&mut self, handle: u32) {
        self.entries.push(handle);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> &[u32] {
        &self.entries
    }

    /// Report a new running stack size to every tracked continuation.
    /// Nothing below depth 1 can change again, so the list is dropped there.
    pub fn update(&mut self, heap: &mut Heap, size: usize) {
        for &handle in &self.entries {
            if let Some(k) = heap
                .get_function_mut(handle)
                .and_then(|f| f.as_continuation_mut())
            {
                k.observe_depth(size);
            }
        }
        if size <= 1 {
            self.entries.clear();
        }
    }

    /// Forget continuations the collector has reclaimed.
    pub fn retain_live(&mut self, heap: &Heap) {
        self.entries.retain(|&handle| {
            heap.get_function(handle)
                .is_some_and(|f| f.is_continuation())
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Freeze `running` into an environment.
pub fn capture(
    heap: &mut Heap,
    running: &RunningStack,
    globals: u32,
) -> Result<Environment, RuntimeError> {
    let mut kernel = KernelRecord::new(globals);
    let frames = running
        .frames()
        .iter()
        .map(|frame| snapshot_frame(heap, &mut kernel, frame))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Environment::new(frames))
}

pub fn snapshot_frame(
    heap: &mut Heap,
    kernel: &mut KernelRecord,
    frame: &RunningFrame,
) -> Result<EnvironmentFrame, RuntimeError> {
    let scope = kernel.clone_chain(heap, frame.scope)?;
    let generators = frame
        .generators
        .iter()
        .map(|g| snapshot_frame(heap, kernel, g))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EnvironmentFrame {
        origin: frame.serial,
        module: frame.module,
        entry: frame.entry,
        pc: frame.pc,
        computing: frame.computing.values().to_vec(),
        arguments: frame.arguments.clone(),
        trap_pc: frame.trap_pc,
        trap_enabled: frame.trap_enabled,
        scope,
        generators,
        args_count: frame.args_count,
        closure: frame.closure,
    })
}

/// Build a brand-new live frame from a snapshot. Serials are fresh; scopes
/// are cloned through `kernel`.
pub fn rebuild_frame(
    heap: &mut Heap,
    kernel: &mut KernelRecord,
    running: &mut RunningStack,
    snapshot: &EnvironmentFrame,
) -> Result<RunningFrame, RuntimeError> {
    let scope = kernel.clone_chain(heap, snapshot.scope)?;
    let generators = snapshot
        .generators
        .iter()
        .map(|g| rebuild_frame(heap, kernel, running, g))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RunningFrame {
        serial: running.fresh_serial(),
        module: snapshot.module,
        entry: snapshot.entry,
        pc: snapshot.pc,
        computing: ComputingStack::from_values(snapshot.computing.clone()),
        arguments: snapshot.arguments.clone(),
        trap_pc: snapshot.trap_pc,
        trap_enabled: snapshot.trap_enabled,
        scope,
        generators,
        args_count: snapshot.args_count,
        closure: snapshot.closure,
    })
}

/// Copy the live trap pcs onto the snapshot frames that still correspond to
/// a live frame.
pub fn patch_trap_to_environment(running: &RunningStack, frames: &mut [EnvironmentFrame]) {
    for (live, snapshot) in running.frames().iter().zip(frames.iter_mut()) {
        if live.serial != snapshot.origin {
            break;
        }
        snapshot.trap_pc = live.trap_pc;
    }
}

/// Number of bottom frames that survive a restore (the reentry index plus
/// one). Bounded by the turning point and the snapshot size, then lowered to
/// the prefix whose live frames are the very frames that were captured.
pub fn reentry_point(running: &RunningStack, frames: &[EnvironmentFrame], turning_point: usize) -> usize {
    let limit = turning_point.min(frames.len()).min(running.size());
    running
        .frames()
        .iter()
        .zip(frames)
        .take(limit)
        .take_while(|(live, snapshot)| live.serial == snapshot.origin)
        .count()
}
