use super::stack::ComputingStack;
use memory::Value;

/// Everything needed to install a fresh frame on the running stack.
#[derive(Debug, Clone, Copy)]
pub struct FrameConfig {
    pub module: u32,
    pub entry: usize,
    pub pc: usize,
    pub args_count: usize,
    pub closure: bool,
    pub trap_pc: Option<usize>,
    pub trap_enabled: bool,
    /// Frame scope. Its parent chain is the environment entrance.
    pub scope: u32,
}

/// Represents a single call frame on a thread's running stack.
///
/// - `serial`: per-thread identity, assigned on creation and never reused
/// - `entry`: pc the function was entered at (generator lookup key)
/// - `arguments`: staged call arguments, next argument last
/// - `generators`: frames this frame has suspended with YIELD
#[derive(Debug, Clone)]
pub struct RunningFrame {
    pub serial: u64,
    pub module: u32,
    pub entry: usize,
    pub pc: usize,
    pub computing: ComputingStack,
    pub arguments: Vec<Value>,
    pub trap_pc: Option<usize>,
    pub trap_enabled: bool,
    pub scope: u32,
    pub generators: Vec<RunningFrame>,
    pub args_count: usize,
    pub closure: bool,
}

impl RunningFrame {
    pub fn new(serial: u64, config: FrameConfig) -> Self {
        Self {
            serial,
            module: config.module,
            entry: config.entry,
            pc: config.pc,
            computing: ComputingStack::new(),
            arguments: Vec::new(),
            trap_pc: config.trap_pc,
            trap_enabled: config.trap_enabled,
            scope: config.scope,
            generators: Vec::new(),
            args_count: config.args_count,
            closure: config.closure,
        }
    }

    /// Replace the staged arguments. `args` is in call order.
    pub fn stage_arguments(&mut self, args: Vec<Value>) {
        self.args_count = args.len();
        self.arguments = args;
        self.arguments.reverse();
    }

    /// Next staged argument, first argument first.
    pub fn next_argument(&mut self) -> Option<Value> {
        self.arguments.pop()
    }

    /// Detach the suspended generator entered at (module, entry), if any.
    pub fn take_generator(&mut self, module: u32, entry: usize) -> Option<RunningFrame> {
        let idx = self
            .generators
            .iter()
            .position(|g| g.module == module && g.entry == entry)?;
        Some(self.generators.remove(idx))
    }

    pub fn arm_trap(&mut self, pc: usize) {
        self.trap_pc = Some(pc);
        self.trap_enabled = true;
    }

    /// Consume an armed trap, returning the pc to jump to.
    pub fn fire_trap(&mut self) -> Option<usize> {
        if !self.trap_enabled {
            return None;
        }
        self.trap_enabled = false;
        self.trap_pc
    }

    /// Push every handle this frame (and its generators) keeps alive.
    pub fn roots(&self, out: &mut Vec<Value>) {
        out.extend_from_slice(self.computing.values());
        out.extend_from_slice(&self.arguments);
        out.push(Value::scope(self.scope));
        for generator in &self.generators {
            generator.roots(out);
        }
    }
}
