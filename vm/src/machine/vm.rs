use crate::config::VmConfig;
use crate::error::{ErrorRecord, RuntimeError};
use crate::module::{DataValue, Module};
use crate::native::NativeObj;
use memory::{Heap, Scope, Value};
use std::collections::BTreeMap;
use tracing::{debug, error};

use super::context::{display_value, ExecContext};
use super::frame::FrameConfig;
use super::gc::GarbageCollector;
use super::native::NativeRegistry;
use super::thread::{Thread, ThreadStatus};

/// A module plus its data items materialized as heap values.
#[derive(Debug)]
pub struct LoadedModule {
    pub module: Module,
    pub constants: BTreeMap<u32, Value>,
}

impl LoadedModule {
    pub fn constant(&self, id: u32) -> Option<Value> {
        self.constants.get(&id).copied()
    }
}

/// The Virtual Machine struct
pub struct VM {
    pub heap: Heap,
    pub modules: Vec<LoadedModule>,
    pub natives: Vec<NativeObj>,
    /// Root of every scope chain: natives and host globals live here.
    pub globals: u32,
    pub threads: Vec<Thread>,
    pub config: VmConfig,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    /// Create a new VM instance with bootstrapped native functions
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut heap = Heap::with_threshold(config.gc_threshold);
        let globals = heap.alloc_scope(Scope::new(None));

        let mut vm = Self {
            heap,
            modules: Vec::new(),
            natives: Vec::new(),
            globals,
            threads: Vec::new(),
            config,
        };
        vm.bootstrap_natives();
        vm
    }

    pub fn define_global(&mut self, name: &str, val: Value) {
        self.heap.define(self.globals, name, val);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.heap.lookup(self.globals, name)
    }

    /// Allocate a string value (for host-supplied arguments).
    pub fn string(&mut self, s: &str) -> Value {
        Value::string(self.heap.alloc_string(s.to_string()))
    }

    pub fn val_to_string(&self, val: Value) -> String {
        display_value(&self.heap, val)
    }

    /// Register a module and materialize its data table. Returns its index.
    pub fn load_module(&mut self, module: Module) -> u32 {
        let mut constants = BTreeMap::new();
        for (id, item) in &module.data {
            let val = match item {
                DataValue::Int(n) => Value::int(*n),
                DataValue::Str(s) => Value::string(self.heap.alloc_string(s.clone())),
                DataValue::Ident(s) => Value::identifier(self.heap.alloc_string(s.clone())),
                DataValue::None => Value::none(),
            };
            constants.insert(*id, val);
        }
        debug!(
            module = %module.name,
            instruments = module.text.len(),
            data = constants.len(),
            "module loaded"
        );
        self.modules.push(LoadedModule { module, constants });
        (self.modules.len() - 1) as u32
    }

    pub fn module_index(&self, name: &str) -> Option<u32> {
        self.modules
            .iter()
            .position(|m| m.module.name == name)
            .map(|i| i as u32)
    }

    pub fn thread(&self, id: usize) -> Option<&Thread> {
        self.threads.get(id)
    }

    /// Start a thread whose root frame enters `module` at `pc`.
    pub fn spawn(&mut self, module: u32, pc: usize, args: Vec<Value>) -> Result<usize, RuntimeError> {
        let text_len = self
            .modules
            .get(module as usize)
            .map(|m| m.module.text.len())
            .ok_or_else(|| RuntimeError::internal(format!("module {} not loaded", module)))?;
        if pc > text_len {
            return Err(RuntimeError::OutOfBounds(format!("entry pc {}", pc)));
        }

        let id = self.threads.len();
        let mut thread = Thread::new(id);
        let scope = self.heap.alloc_scope(Scope::new(Some(self.globals)));
        thread
            .running
            .push_with_configure(FrameConfig {
                module,
                entry: pc,
                pc,
                args_count: args.len(),
                closure: false,
                trap_pc: None,
                trap_enabled: false,
                scope,
            })
            .stage_arguments(args);
        self.threads.push(thread);
        debug!(thread = id, module, pc, "thread spawned");
        Ok(id)
    }

    /// Start a thread at an export, binding its declared argument names in
    /// the root scope. Missing arguments are bound to none.
    pub fn spawn_export(&mut self, module: u32, name: &str, args: Vec<Value>) -> Result<usize, RuntimeError> {
        let names: Vec<String> = {
            let loaded = self
                .modules
                .get(module as usize)
                .ok_or_else(|| RuntimeError::internal(format!("module {} not loaded", module)))?;
            let export = loaded
                .module
                .export(name)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?;
            loaded
                .module
                .export_args(export)
                .ok_or_else(|| RuntimeError::internal(format!("export `{}` names a missing item", name)))?
                .into_iter()
                .map(str::to_string)
                .collect()
        };

        let bound: Vec<Value> = (0..names.len())
            .map(|i| args.get(i).copied().unwrap_or_else(Value::none))
            .collect();
        let id = self.spawn(module, 0, args)?;
        let scope = self
            .threads
            .get(id)
            .and_then(|t| t.running.top())
            .map(|f| f.scope)
            .ok_or_else(|| RuntimeError::internal("spawned thread has no frame"))?;
        for (arg_name, val) in names.iter().zip(bound) {
            self.heap.define(scope, arg_name, val);
        }
        Ok(id)
    }

    /// Execute a single step of thread `id`. Returns whether it is still runnable.
    pub fn step(&mut self, id: usize) -> bool {
        self.run_steps(id, 1);
        self.threads.get(id).is_some_and(Thread::is_ready)
    }

    /// Run thread `id` for one time slice. Returns the number of steps taken.
    pub fn run_slice(&mut self, id: usize) -> usize {
        let slice = self.config.effective_slice();
        self.run_steps(id, slice)
    }

    fn run_steps(&mut self, id: usize, limit: usize) -> usize {
        let Some(thread) = self.threads.get_mut(id) else {
            return 0;
        };
        let mut ctx = ExecContext {
            heap: &mut self.heap,
            modules: &self.modules,
            natives: &self.natives,
            globals: self.globals,
            config: &self.config,
            thread,
        };

        let mut steps = 0;
        while steps < limit && ctx.thread.is_ready() {
            steps += 1;
            if let Err(record) = ctx.step() {
                error!(thread = id, %record, "thread halted");
                ctx.thread.halt(record);
            }
        }
        steps
    }

    /// Round-robin over runnable threads until none is left.
    pub fn run(&mut self) {
        loop {
            let ready: Vec<usize> = self
                .threads
                .iter()
                .filter(|t| t.is_ready())
                .map(|t| t.id)
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                self.run_slice(id);
                if self.config.stress_gc || self.heap.should_collect() {
                    self.collect_garbage();
                }
            }
        }
    }

    /// Load `module`, run it from pc 0 to completion, and return its result.
    pub fn execute(&mut self, module: Module) -> Result<Value, ErrorRecord> {
        let name = module.name.clone();
        let idx = self.load_module(module);
        let id = self.spawn(idx, 0, Vec::new()).map_err(|error| ErrorRecord {
            module: name.clone(),
            pc: 0,
            opcode: "spawn".to_string(),
            operand: 0,
            error,
        })?;
        self.run();
        self.outcome(id).unwrap_or_else(|| {
            Err(ErrorRecord {
                module: name,
                pc: 0,
                opcode: "run".to_string(),
                operand: 0,
                error: RuntimeError::internal("thread did not terminate"),
            })
        })
    }

    /// Result of a terminated thread; `None` while it is still runnable.
    pub fn outcome(&self, id: usize) -> Option<Result<Value, ErrorRecord>> {
        let thread = self.threads.get(id)?;
        match thread.status {
            ThreadStatus::Ready => None,
            ThreadStatus::Finished => Some(Ok(thread.result.unwrap_or_else(Value::none))),
            ThreadStatus::Halted => thread.error.clone().map(Err),
        }
    }
}
