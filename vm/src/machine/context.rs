use super::arithmetic::ArithmeticOps;
use super::control::ControlFlowOps;
use super::data::DataOps;
use super::frame::RunningFrame;
use super::thread::Thread;
use super::vm::LoadedModule;
use crate::config::VmConfig;
use crate::error::{ErrorRecord, RuntimeError};
use crate::native::NativeObj;
use crate::opcode::{Instrument, OpCode};
use memory::{Heap, Value};
use tracing::trace;

/// Everything one dispatch step may touch: shared VM state plus the thread
/// being run. Handlers and native callbacks receive this instead of the VM.
pub struct ExecContext<'a> {
    pub heap: &'a mut Heap,
    pub modules: &'a [LoadedModule],
    pub natives: &'a [NativeObj],
    /// Handle of the global scope.
    pub globals: u32,
    pub config: &'a VmConfig,
    pub thread: &'a mut Thread,
}

impl<'a> ExecContext<'a> {
    pub fn top(&self) -> Result<&RunningFrame, RuntimeError> {
        self.thread
            .running
            .top()
            .ok_or_else(|| RuntimeError::internal("no running frame"))
    }

    pub fn top_mut(&mut self) -> Result<&mut RunningFrame, RuntimeError> {
        self.thread
            .running
            .top_mut()
            .ok_or_else(|| RuntimeError::internal("no running frame"))
    }

    pub fn module(&self, idx: u32) -> Result<&'a LoadedModule, RuntimeError> {
        self.modules
            .get(idx as usize)
            .ok_or_else(|| RuntimeError::internal(format!("module {} not loaded", idx)))
    }

    /// Resolve an identifier against the current frame's scope chain. Other
    /// values are returned unchanged.
    pub fn solve(&self, val: Value) -> Result<Value, RuntimeError> {
        if !val.is_identifier() {
            return Ok(val);
        }
        let name = self
            .heap
            .text_of(val)
            .ok_or_else(|| RuntimeError::NullPointer("dangling identifier".into()))?;
        let scope = self.top()?.scope;
        self.heap
            .lookup(scope, name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    pub fn pop_operand(&mut self) -> Result<Value, RuntimeError> {
        self.top_mut()?.computing.pop()
    }

    pub fn push_operand(&mut self, val: Value) -> Result<(), RuntimeError> {
        self.top_mut()?.computing.push(val);
        Ok(())
    }

    /// Fail unless one more frame fits under the depth limit.
    pub fn check_depth(&self, extra: usize) -> Result<(), RuntimeError> {
        let depth = self.thread.running.size() + extra;
        if depth > self.config.max_depth {
            return Err(RuntimeError::OutOfBounds(format!(
                "running stack depth {} exceeds {}",
                depth, self.config.max_depth
            )));
        }
        Ok(())
    }

    /// Fail unless `pc` addresses the text of `module` (the end counts).
    pub fn check_pc(&self, module: u32, pc: usize) -> Result<(), RuntimeError> {
        let len = self.module(module)?.module.text.len();
        if pc > len {
            return Err(RuntimeError::OutOfBounds(format!(
                "pc {} outside text of length {}",
                pc, len
            )));
        }
        Ok(())
    }

    pub fn val_to_string(&self, val: Value) -> String {
        display_value(self.heap, val)
    }

    /// Identity for handles, content for strings.
    pub fn values_equal(&self, a: Value, b: Value) -> bool {
        if a == b {
            return true;
        }
        if a.is_string() && b.is_string() {
            return match (self.heap.text_of(a), self.heap.text_of(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            };
        }
        false
    }

    /// Execute one instrument of the top frame.
    pub fn step(&mut self) -> Result<(), ErrorRecord> {
        let Some(frame) = self.thread.running.top() else {
            return Ok(());
        };
        let (module_idx, pc) = (frame.module, frame.pc);

        // Running off the end of the text is an implicit RETNONE.
        let ins = self
            .modules
            .get(module_idx as usize)
            .and_then(|m| m.module.instrument(pc))
            .unwrap_or_else(|| Instrument::new(OpCode::RetNone, 0));

        if let Some(frame) = self.thread.running.top_mut() {
            frame.pc = pc + 1;
        }
        self.thread.steps += 1;
        trace!(
            thread = self.thread.id,
            pc,
            opcode = ins.opcode,
            operand = ins.operand,
            "step"
        );

        self.dispatch(ins).map_err(|error| ErrorRecord {
            module: self
                .modules
                .get(module_idx as usize)
                .map(|m| m.module.name.clone())
                .unwrap_or_else(|| format!("#{}", module_idx)),
            pc,
            opcode: ins
                .op()
                .map(|op| op.name().to_string())
                .unwrap_or_else(|| format!("0x{:02x}", ins.opcode)),
            operand: ins.operand,
            error,
        })
    }

    fn dispatch(&mut self, ins: Instrument) -> Result<(), RuntimeError> {
        let op = ins.op().ok_or(RuntimeError::InvalidOpcode(ins.opcode))?;
        if op.is_control() {
            self.handle_control(op, ins.operand)
        } else if op.is_arithmetic() {
            self.handle_arithmetic(op)
        } else {
            self.handle_data(op, ins.operand)
        }
    }
}

/// Helper to format values for display
pub fn display_value(heap: &Heap, val: Value) -> String {
    match val {
        v if v.is_int() => format!("{}", v.as_int().unwrap_or_default()),
        v if v.is_bool() => format!("{}", v.as_bool().unwrap_or_default()),
        v if v.is_none() => "none".to_string(),
        v if v.is_string() => heap
            .text_of(v)
            .map(str::to_string)
            .unwrap_or_else(|| "<bad string>".into()),
        v if v.is_identifier() => heap
            .text_of(v)
            .map(|name| format!("'{}", name))
            .unwrap_or_else(|| "<bad identifier>".into()),
        v if v.is_function() => match heap.function_of(v) {
            Some(memory::Function::External(e)) => format!("<native {}>", e.name),
            Some(f) => {
                let pc = f.as_internal().map(|i| i.pc).unwrap_or_default();
                format!("<{} @{}>", f.kind_name(), pc)
            }
            None => "<bad function>".into(),
        },
        v if v.is_scope() => format!("<scope {}>", v.as_handle().unwrap_or_default()),
        _ => format!("{:?}", val),
    }
}
