use super::context::ExecContext;
use super::continuation::{capture, patch_trap_to_environment, reentry_point, rebuild_frame};
use super::frame::FrameConfig;
use super::kernel::KernelRecord;
use super::stack::{transport, ComputingStack};
use crate::error::RuntimeError;
use crate::opcode::OpCode;
use memory::{Function, FunctionKind, PromiseInternal, Scope, Value};
use tracing::{debug, trace};

/// What a call-family opcode resolved its callee to.
#[derive(Debug, Clone, Copy)]
enum CallTarget {
    Native(u32),
    /// An evaluated promise: the body is skipped.
    Cached(Value),
    Continuation(u32),
    Internal {
        module: u32,
        pc: usize,
        entrance: Option<u32>,
    },
}

/// Trait for control flow instruction handlers
pub trait ControlFlowOps {
    fn handle_control(&mut self, op: OpCode, operand: u32) -> Result<(), RuntimeError>;

    fn op_return(&mut self) -> Result<(), RuntimeError>;
    /// Finish a RETURN whose top operand already solved to `value`.
    fn return_value(&mut self, value: Value) -> Result<(), RuntimeError>;
    fn op_yield(&mut self) -> Result<(), RuntimeError>;
    fn op_lift(&mut self, n: usize) -> Result<(), RuntimeError>;
    fn op_call(&mut self, tail: bool, computed: bool) -> Result<(), RuntimeError>;
    fn op_promc(&mut self) -> Result<(), RuntimeError>;
    fn make_continuation(&mut self, landing: usize) -> Result<(), RuntimeError>;

    fn call_native(&mut self, native: u32, args: Vec<Value>) -> Result<(), RuntimeError>;

    /// Restore the environment of continuation `handle` and enter its
    /// landing code with `args`.
    fn invoke_continuation(
        &mut self,
        handle: u32,
        args: Vec<Value>,
        tail: bool,
    ) -> Result<(), RuntimeError>;
}

impl ExecContext<'_> {
    /// Solved copy of the top operand, leaving the stack untouched.
    fn solved_top(&self) -> Result<Value, RuntimeError> {
        let top = self
            .top()?
            .computing
            .peek()
            .ok_or(RuntimeError::ComputingStackEmpty)?;
        self.solve(top)
    }

    fn call_target(&self, callee: Value) -> Result<CallTarget, RuntimeError> {
        let handle = callee.as_handle().filter(|_| callee.is_function());
        let function = handle
            .and_then(|h| self.heap.get_function(h))
            .ok_or_else(|| {
                RuntimeError::invalid_operand(format!(
                    "cannot call {}",
                    self.val_to_string(callee)
                ))
            })?;
        let handle = handle.ok_or_else(|| RuntimeError::internal("function without handle"))?;

        Ok(match function {
            Function::External(e) => CallTarget::Native(e.native),
            Function::Internal(f) => match &f.kind {
                FunctionKind::Continuation(k) if k.owner != self.thread.id => {
                    return Err(RuntimeError::internal(format!(
                        "continuation captured by thread {} invoked from thread {}",
                        k.owner, self.thread.id
                    )));
                }
                FunctionKind::Continuation(_) => CallTarget::Continuation(handle),
                FunctionKind::Promise(PromiseInternal {
                    cached: Some(value),
                }) => CallTarget::Cached(*value),
                _ => CallTarget::Internal {
                    module: f.module,
                    pc: f.pc,
                    entrance: f.entrance,
                },
            },
        })
    }

    fn call_internal(
        &mut self,
        module: u32,
        pc: usize,
        entrance: Option<u32>,
        args: Vec<Value>,
    ) -> Result<(), RuntimeError> {
        if let Some(mut generator) = self.top_mut()?.take_generator(module, pc) {
            trace!(serial = generator.serial, pc = generator.pc, "generator resumed");
            generator.stage_arguments(args);
            self.thread.running.push(generator);
            return Ok(());
        }

        let parent = entrance.unwrap_or(self.globals);
        let scope = self.heap.alloc_scope(Scope::new(Some(parent)));
        let frame = self.thread.running.push_with_configure(FrameConfig {
            module,
            entry: pc,
            pc,
            args_count: args.len(),
            closure: entrance.is_some(),
            trap_pc: None,
            trap_enabled: false,
            scope,
        });
        frame.stage_arguments(args);
        Ok(())
    }

    /// Drop the tail caller below the freshly pushed top frame.
    fn tail_merge(&mut self) -> Result<(), RuntimeError> {
        self.thread.running.lift_merge()?;
        let changed_at = self.thread.running.size().saturating_sub(1);
        self.thread.tracking.update(self.heap, changed_at);
        Ok(())
    }

    /// Hand `values` to the frame below the top, in order.
    fn deliver_to_caller(&mut self, values: Vec<Value>) -> Result<(), RuntimeError> {
        let n = values.len();
        let mut staged = ComputingStack::from_values(values);
        let caller = self
            .thread
            .running
            .caller_mut()
            .ok_or_else(|| RuntimeError::internal("no caller frame"))?;
        transport(&mut caller.computing, &mut staged, n)
    }

    fn after_pop(&mut self) {
        let size = self.thread.running.size();
        self.thread.tracking.update(self.heap, size);
    }
}

impl ControlFlowOps for ExecContext<'_> {
    fn handle_control(&mut self, op: OpCode, operand: u32) -> Result<(), RuntimeError> {
        match op {
            OpCode::Call => self.op_call(false, false),
            OpCode::TailCall => self.op_call(true, false),
            OpCode::CallC => self.op_call(false, true),
            OpCode::TailCallC => self.op_call(true, true),

            OpCode::Return => self.op_return(),

            OpCode::ReturnTo => {
                if !self.thread.running.has_caller() {
                    return Err(RuntimeError::internal("returnto without a caller"));
                }
                let value = self.solved_top()?;
                let target = operand as usize;
                let caller_module = self
                    .thread
                    .running
                    .caller_mut()
                    .map(|c| c.module)
                    .ok_or_else(|| RuntimeError::internal("no caller frame"))?;
                self.check_pc(caller_module, target)?;
                if let Some(caller) = self.thread.running.caller_mut() {
                    caller.pc = target;
                }
                self.return_value(value)
            }

            OpCode::RetNone => {
                self.push_operand(Value::none())?;
                self.op_return()
            }

            OpCode::Yield => self.op_yield(),
            OpCode::Lift => self.op_lift(operand as usize),

            OpCode::TrapSet => {
                let module = self.top()?.module;
                self.check_pc(module, operand as usize)?;
                self.top_mut()?.arm_trap(operand as usize);
                Ok(())
            }

            OpCode::Trap => {
                let frame = self.top_mut()?;
                if let Some(pc) = frame.fire_trap() {
                    frame.pc = pc;
                }
                Ok(())
            }

            OpCode::PromC => self.op_promc(),
            OpCode::ContMk => self.make_continuation(operand as usize),

            _ => Err(RuntimeError::InvalidOpcode(op.as_u32())),
        }
    }

    fn op_return(&mut self) -> Result<(), RuntimeError> {
        let value = self.solved_top()?;
        self.return_value(value)
    }

    fn return_value(&mut self, value: Value) -> Result<(), RuntimeError> {
        if !self.thread.running.has_caller() {
            self.thread.finish(value);
            return Ok(());
        }

        self.top_mut()?.computing.pop()?;
        self.deliver_to_caller(vec![value])?;
        self.thread.running.pop();
        self.after_pop();
        Ok(())
    }

    fn op_yield(&mut self) -> Result<(), RuntimeError> {
        let value = self.solved_top()?;
        if !self.thread.running.has_caller() {
            return self.op_return();
        }

        self.top_mut()?.computing.pop()?;
        self.deliver_to_caller(vec![value])?;
        let generator = self
            .thread
            .running
            .pop()
            .ok_or_else(|| RuntimeError::internal("no running frame"))?;
        trace!(serial = generator.serial, pc = generator.pc, "generator suspended");
        self.top_mut()?.generators.push(generator);
        self.after_pop();
        Ok(())
    }

    fn op_lift(&mut self, n: usize) -> Result<(), RuntimeError> {
        let raw = self.top()?.computing.top_slice(n)?.to_vec();
        if !self.thread.running.has_caller() {
            return Err(RuntimeError::internal("lift without a caller"));
        }
        let solved = raw
            .into_iter()
            .map(|v| self.solve(v))
            .collect::<Result<Vec<_>, _>>()?;

        self.top_mut()?.computing.take_top(n)?;
        self.deliver_to_caller(solved)
    }

    fn op_call(&mut self, tail: bool, computed: bool) -> Result<(), RuntimeError> {
        // [..., arg1, ..., argN, callee, N]
        let frame = self.top()?;
        frame.computing.require(2)?;
        let argc = frame
            .computing
            .peek_at(0)
            .and_then(|v| v.as_int())
            .filter(|n| *n >= 0)
            .ok_or_else(|| RuntimeError::invalid_operand("argument count must be a non-negative int"))?
            as usize;
        let callee = frame
            .computing
            .peek_at(1)
            .ok_or(RuntimeError::ComputingStackEmpty)?;
        let raw_args = frame.computing.top_slice(argc + 2)?[..argc].to_vec();

        let callee = if callee.is_identifier() {
            if computed {
                return Err(RuntimeError::invalid_operand(
                    "computed call expects a function value, got an identifier",
                ));
            }
            self.solve(callee)?
        } else {
            callee
        };
        let target = self.call_target(callee)?;
        let args = raw_args
            .into_iter()
            .map(|v| self.solve(v))
            .collect::<Result<Vec<_>, _>>()?;

        match target {
            CallTarget::Native(idx) => {
                let native = self
                    .natives
                    .get(idx as usize)
                    .ok_or_else(|| RuntimeError::NullPointer(format!("native {}", idx)))?;
                if !native.accepts(args.len()) {
                    return Err(RuntimeError::invalid_operand(format!(
                        "{}() expects {} arguments, got {}",
                        native.name,
                        native.arity,
                        args.len()
                    )));
                }
            }
            CallTarget::Internal { .. } if !tail => self.check_depth(1)?,
            _ => {}
        }

        self.top_mut()?.computing.take_top(argc + 2)?;

        match target {
            CallTarget::Native(idx) => self.call_native(idx, args),
            CallTarget::Cached(value) => self.push_operand(value),
            CallTarget::Continuation(handle) => self.invoke_continuation(handle, args, tail),
            CallTarget::Internal {
                module,
                pc,
                entrance,
            } => {
                self.call_internal(module, pc, entrance, args)?;
                if tail {
                    self.tail_merge()?;
                }
                Ok(())
            }
        }
    }

    fn op_promc(&mut self) -> Result<(), RuntimeError> {
        let frame = self.top()?;
        frame.computing.require(2)?;
        let value = frame.computing.peek_at(0).ok_or(RuntimeError::ComputingStackEmpty)?;
        let promise = frame.computing.peek_at(1).ok_or(RuntimeError::ComputingStackEmpty)?;

        let handle = promise
            .as_handle()
            .filter(|_| promise.is_function())
            .filter(|h| self.heap.get_function(*h).is_some_and(|f| f.is_promise()))
            .ok_or_else(|| {
                RuntimeError::invalid_operand(format!(
                    "promc expects a promise, got {}",
                    self.val_to_string(promise)
                ))
            })?;

        let cached = self
            .heap
            .get_function(handle)
            .and_then(|f| f.as_promise())
            .and_then(|p| p.cached);

        let result = match cached {
            Some(v) => v,
            None => {
                let v = self.solve(value)?;
                if let Some(f) = self
                    .heap
                    .get_function_mut(handle)
                    .and_then(|f| f.as_internal_mut())
                {
                    f.entrance = None;
                    if let FunctionKind::Promise(p) = &mut f.kind {
                        p.cached = Some(v);
                    }
                }
                v
            }
        };

        let computing = &mut self.top_mut()?.computing;
        computing.take_top(2)?;
        computing.push(result);
        Ok(())
    }

    fn make_continuation(&mut self, landing: usize) -> Result<(), RuntimeError> {
        let module = self.top()?.module;
        self.check_pc(module, landing)?;

        let size = self.thread.running.size();
        let environment = capture(self.heap, &self.thread.running, self.globals)?;
        let handle = self
            .heap
            .alloc_function(Function::continuation(
                module,
                landing,
                environment,
                size,
                self.thread.id,
            ));
        self.thread.tracking.track(handle);
        debug!(thread = self.thread.id, frames = size, landing, "continuation captured");
        self.push_operand(Value::function(handle))
    }

    fn call_native(&mut self, native: u32, args: Vec<Value>) -> Result<(), RuntimeError> {
        let func = self
            .natives
            .get(native as usize)
            .map(|n| n.func)
            .ok_or_else(|| RuntimeError::NullPointer(format!("native {}", native)))?;
        let result = func(self, &args)?;
        self.push_operand(result.unwrap_or_else(|| Value::int(0)))
    }

    fn invoke_continuation(
        &mut self,
        handle: u32,
        args: Vec<Value>,
        tail: bool,
    ) -> Result<(), RuntimeError> {
        let (module, landing, mut frames, turning_point) = {
            let function = self
                .heap
                .get_function(handle)
                .ok_or_else(|| RuntimeError::NullPointer(format!("continuation {}", handle)))?;
            let internal = function
                .as_internal()
                .ok_or_else(|| RuntimeError::internal("continuation is not internal"))?;
            let k = function
                .as_continuation()
                .ok_or_else(|| RuntimeError::internal("function is not a continuation"))?;
            (
                internal.module,
                internal.pc,
                k.environment.frames().to_vec(),
                k.turning_point,
            )
        };
        if frames.is_empty() {
            return Err(RuntimeError::internal("continuation has an empty environment"));
        }

        patch_trap_to_environment(&self.thread.running, &mut frames);
        let keep = reentry_point(&self.thread.running, &frames, turning_point);
        let landing_depth = frames.len() + usize::from(!tail);
        if landing_depth > self.config.max_depth {
            return Err(RuntimeError::OutOfBounds(format!(
                "restoring {} frames exceeds depth {}",
                frames.len(),
                self.config.max_depth
            )));
        }

        // Crush everything above the reentry point.
        let crushed = self.thread.running.size().saturating_sub(keep);
        self.thread.running.truncate(keep);

        // Shared frames keep their identity; only their state is rewound.
        let mut kernel = KernelRecord::new(self.globals);
        for (idx, snapshot) in frames.iter().enumerate().take(keep) {
            let live = self
                .thread
                .running
                .get_mut(idx)
                .ok_or_else(|| RuntimeError::internal(format!("shared frame {} missing", idx)))?;
            live.computing = ComputingStack::from_values(snapshot.computing.clone());
            live.pc = snapshot.pc;
            live.trap_pc = snapshot.trap_pc;
            live.trap_enabled = snapshot.trap_enabled;
            kernel.seed(snapshot.scope, live.scope);
        }
        for snapshot in &frames[keep..] {
            let frame = rebuild_frame(self.heap, &mut kernel, &mut self.thread.running, snapshot)?;
            self.thread.running.push(frame);
        }
        self.thread.tracking.update(self.heap, keep);
        debug!(
            thread = self.thread.id,
            crushed,
            kept = keep,
            rebuilt = frames.len() - keep,
            "continuation restored"
        );

        let top = self.top_mut()?;
        top.trap_enabled = top.trap_pc.is_some();
        let parent = top.scope;

        let scope = self.heap.alloc_scope(Scope::new(Some(parent)));
        let frame = self.thread.running.push_with_configure(FrameConfig {
            module,
            entry: landing,
            pc: landing,
            args_count: args.len(),
            closure: true,
            trap_pc: None,
            trap_enabled: false,
            scope,
        });
        frame.stage_arguments(args);

        if tail {
            self.tail_merge()?;
        }
        Ok(())
    }
}
