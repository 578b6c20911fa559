use super::frame::{FrameConfig, RunningFrame};
use crate::error::RuntimeError;

/// The live call-frame stack of one thread. `frames[i]` sits at depth `i + 1`.
#[derive(Debug, Default)]
pub struct RunningStack {
    frames: Vec<RunningFrame>,
    next_serial: u64,
}

impl RunningStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[RunningFrame] {
        &self.frames
    }

    /// Create a frame with a fresh serial and install it on top.
    pub fn push_with_configure(&mut self, config: FrameConfig) -> &mut RunningFrame {
        let serial = self.fresh_serial();
        self.push(RunningFrame::new(serial, config))
    }

    /// Install an existing frame (a resumed generator or a rebuilt snapshot).
    pub fn push(&mut self, frame: RunningFrame) -> &mut RunningFrame {
        self.frames.push(frame);
        let idx = self.frames.len() - 1;
        &mut self.frames[idx]
    }

    pub fn pop(&mut self) -> Option<RunningFrame> {
        self.frames.pop()
    }

    /// Remove the frame directly below the top, letting the top take its place.
    pub fn lift_merge(&mut self) -> Result<(), RuntimeError> {
        let len = self.frames.len();
        if len < 2 {
            return Err(RuntimeError::internal("lift_merge without a tail caller"));
        }
        self.frames.remove(len - 2);
        Ok(())
    }

    /// Destroy every frame at index `keep` and above.
    pub fn truncate(&mut self, keep: usize) {
        self.frames.truncate(keep);
    }

    pub fn get(&self, idx: usize) -> Option<&RunningFrame> {
        self.frames.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut RunningFrame> {
        self.frames.get_mut(idx)
    }

    pub fn top(&self) -> Option<&RunningFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut RunningFrame> {
        self.frames.last_mut()
    }

    /// The frame below the top.
    pub fn caller_mut(&mut self) -> Option<&mut RunningFrame> {
        let idx = self.frames.len().checked_sub(2)?;
        self.frames.get_mut(idx)
    }

    pub fn has_caller(&self) -> bool {
        self.frames.len() >= 2
    }
}
