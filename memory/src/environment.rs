//! Environment stacks: frozen snapshots of a running stack.
//!
//! An [`Environment`] is the payload of a continuation. Frames are stored
//! bottom-to-top, so `frames[i]` is the snapshot of the live frame that sat
//! at index `i` when the environment was captured. Once built, an
//! environment is never mutated; restoring from it always copies.

use crate::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentFrame {
    /// Serial of the running frame this snapshot was taken from.
    pub origin: u64,
    pub module: u32,
    /// Entry pc of the function the frame was executing.
    pub entry: usize,
    pub pc: usize,
    pub computing: Vec<Value>,
    pub arguments: Vec<Value>,
    pub trap_pc: Option<usize>,
    pub trap_enabled: bool,
    /// Cloned scope handle (see `KernelRecord` in the vm crate).
    pub scope: u32,
    pub generators: Vec<EnvironmentFrame>,
    pub args_count: usize,
    pub closure: bool,
}

impl EnvironmentFrame {
    pub fn trace_children(&self, worklist: &mut Vec<Value>) {
        worklist.extend(self.computing.iter().copied());
        worklist.extend(self.arguments.iter().copied());
        worklist.push(Value::scope(self.scope));
        for generator in &self.generators {
            generator.trace_children(worklist);
        }
    }

    fn approx_size(&self) -> usize {
        std::mem::size_of::<EnvironmentFrame>()
            + (self.computing.len() + self.arguments.len()) * std::mem::size_of::<Value>()
            + self
                .generators
                .iter()
                .map(EnvironmentFrame::approx_size)
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    frames: Vec<EnvironmentFrame>,
}

impl Environment {
    pub fn new(frames: Vec<EnvironmentFrame>) -> Self {
        Self { frames }
    }

    /// Number of frames in the snapshot (the running stack size at capture).
    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[EnvironmentFrame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&EnvironmentFrame> {
        self.frames.get(index)
    }

    pub fn top(&self) -> Option<&EnvironmentFrame> {
        self.frames.last()
    }

    pub fn trace_children(&self, worklist: &mut Vec<Value>) {
        for frame in &self.frames {
            frame.trace_children(worklist);
        }
    }

    pub(crate) fn approx_size(&self) -> usize {
        self.frames.iter().map(EnvironmentFrame::approx_size).sum()
    }
}
