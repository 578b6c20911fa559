use super::context::ExecContext;
use crate::error::RuntimeError;
use crate::opcode::OpCode;
use memory::{Function, Value};

pub trait DataOps {
    fn handle_data(&mut self, op: OpCode, operand: u32) -> Result<(), RuntimeError>;
}

impl ExecContext<'_> {
    /// Pop `[value, ident]`, returning the identifier's name and the solved value.
    fn pop_binding(&mut self) -> Result<(String, Value), RuntimeError> {
        let frame = self.top()?;
        frame.computing.require(2)?;
        let ident = frame
            .computing
            .peek_at(0)
            .ok_or(RuntimeError::ComputingStackEmpty)?;
        let value = frame
            .computing
            .peek_at(1)
            .ok_or(RuntimeError::ComputingStackEmpty)?;
        if !ident.is_identifier() {
            return Err(RuntimeError::invalid_operand(format!(
                "expected an identifier, got {}",
                self.val_to_string(ident)
            )));
        }
        let name = self
            .heap
            .text_of(ident)
            .ok_or_else(|| RuntimeError::NullPointer("dangling identifier".into()))?
            .to_string();
        let value = self.solve(value)?;
        self.top_mut()?.computing.take_top(2)?;
        Ok((name, value))
    }

    fn make_function(&mut self, op: OpCode, pc: usize) -> Result<(), RuntimeError> {
        let frame = self.top()?;
        let (module, scope) = (frame.module, frame.scope);
        self.check_pc(module, pc)?;
        let function = match op {
            OpCode::FuncMk => Function::plain(module, pc),
            OpCode::LambdaMk => Function::lambda(module, pc, scope),
            _ => Function::promise(module, pc, scope),
        };
        let handle = self.heap.alloc_function(function);
        self.push_operand(Value::function(handle))
    }
}

impl DataOps for ExecContext<'_> {
    fn handle_data(&mut self, op: OpCode, operand: u32) -> Result<(), RuntimeError> {
        match op {
            OpCode::Nop => {}

            OpCode::Push => {
                let module = self.top()?.module;
                let val = self
                    .module(module)?
                    .constant(operand)
                    .ok_or_else(|| RuntimeError::OutOfBounds(format!("data item {}", operand)))?;
                self.push_operand(val)?;
            }

            OpCode::PushInt => self.push_operand(Value::int(operand as i32 as i64))?,
            OpCode::PushNone => self.push_operand(Value::none())?,

            OpCode::Pop => {
                self.pop_operand()?;
            }

            OpCode::Dup => {
                let top = self
                    .top()?
                    .computing
                    .peek()
                    .ok_or(RuntimeError::ComputingStackEmpty)?;
                self.push_operand(top)?;
            }

            OpCode::Solve => {
                let top = self
                    .top()?
                    .computing
                    .peek()
                    .ok_or(RuntimeError::ComputingStackEmpty)?;
                let solved = self.solve(top)?;
                self.pop_operand()?;
                self.push_operand(solved)?;
            }

            OpCode::Def => {
                let (name, value) = self.pop_binding()?;
                let scope = self.top()?.scope;
                if !self.heap.define(scope, &name, value) {
                    return Err(RuntimeError::NullPointer(format!("scope {}", scope)));
                }
            }

            OpCode::Set => {
                let scope = self.top()?.scope;
                let (name, value) = self.pop_binding()?;
                if !self.heap.assign(scope, &name, value) {
                    return Err(RuntimeError::UndefinedVariable(name));
                }
            }

            OpCode::ArgP => {
                let frame = self.top_mut()?;
                let arg = frame.next_argument().unwrap_or_else(Value::none);
                frame.computing.push(arg);
            }

            OpCode::ArgCs => {
                let count = self.top()?.args_count;
                self.push_operand(Value::int(count as i64))?;
            }

            OpCode::FuncMk | OpCode::LambdaMk | OpCode::PromMk => {
                self.make_function(op, operand as usize)?;
            }

            OpCode::Jmp => {
                let module = self.top()?.module;
                self.check_pc(module, operand as usize)?;
                self.top_mut()?.pc = operand as usize;
            }

            OpCode::JmpC => {
                let frame = self.top()?;
                let module = frame.module;
                let cond = frame
                    .computing
                    .peek()
                    .ok_or(RuntimeError::ComputingStackEmpty)?;
                self.check_pc(module, operand as usize)?;
                let cond = self.solve(cond)?;
                self.pop_operand()?;
                if !cond.is_falsey() {
                    self.top_mut()?.pc = operand as usize;
                }
            }

            _ => return Err(RuntimeError::InvalidOpcode(op.as_u32())),
        }
        Ok(())
    }
}
