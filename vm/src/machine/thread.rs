use super::continuation::ContinuationTracking;
use super::running::RunningStack;
use crate::error::ErrorRecord;
use memory::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Ready,
    Finished,
    Halted,
}

/// One logical VM thread: its own running stack and continuation tracking.
#[derive(Debug)]
pub struct Thread {
    pub id: usize,
    pub running: RunningStack,
    pub tracking: ContinuationTracking,
    pub status: ThreadStatus,
    pub result: Option<Value>,
    pub error: Option<ErrorRecord>,
    pub steps: u64,
}

impl Thread {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            running: RunningStack::new(),
            tracking: ContinuationTracking::default(),
            status: ThreadStatus::Ready,
            result: None,
            error: None,
            steps: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ThreadStatus::Ready
    }

    /// The root frame returned `value`.
    pub fn finish(&mut self, value: Value) {
        self.result = Some(value);
        self.status = ThreadStatus::Finished;
        self.teardown();
        debug!(thread = self.id, steps = self.steps, "thread finished");
    }

    pub fn halt(&mut self, record: ErrorRecord) {
        self.error = Some(record);
        self.status = ThreadStatus::Halted;
        self.teardown();
    }

    /// Destroy the running stack frame by frame (with any attached generators).
    pub fn teardown(&mut self) {
        while self.running.pop().is_some() {}
        self.tracking.clear();
    }
}
