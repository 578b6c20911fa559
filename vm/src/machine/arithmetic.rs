use super::context::ExecContext;
use crate::error::RuntimeError;
use crate::opcode::OpCode;
use memory::Value;

/// Trait for arithmetic instruction handlers
pub trait ArithmeticOps {
    fn handle_arithmetic(&mut self, op: OpCode) -> Result<(), RuntimeError>;
}

impl ExecContext<'_> {
    /// Solved `[a, b]` from the top of the stack, without popping.
    fn binary_operands(&self) -> Result<(Value, Value), RuntimeError> {
        let stack = &self.top()?.computing;
        stack.require(2)?;
        let b = stack.peek_at(0).ok_or(RuntimeError::ComputingStackEmpty)?;
        let a = stack.peek_at(1).ok_or(RuntimeError::ComputingStackEmpty)?;
        Ok((self.solve(a)?, self.solve(b)?))
    }

    fn int_operands(&self, op: OpCode, a: Value, b: Value) -> Result<(i64, i64), RuntimeError> {
        match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(RuntimeError::invalid_operand(format!(
                "{} expects ints, got {} and {}",
                op,
                self.val_to_string(a),
                self.val_to_string(b)
            ))),
        }
    }

    fn add_values(&mut self, a: Value, b: Value) -> Result<Value, RuntimeError> {
        if a.is_int() && b.is_int() {
            let (x, y) = self.int_operands(OpCode::Add, a, b)?;
            return Ok(Value::int(x.wrapping_add(y)));
        }
        if a.is_string() && b.is_string() {
            let joined = match (self.heap.text_of(a), self.heap.text_of(b)) {
                (Some(x), Some(y)) => format!("{}{}", x, y),
                _ => return Err(RuntimeError::NullPointer("dangling string".into())),
            };
            return Ok(Value::string(self.heap.alloc_string(joined)));
        }
        Err(RuntimeError::invalid_operand(format!(
            "cannot add {} and {}",
            self.val_to_string(a),
            self.val_to_string(b)
        )))
    }
}

impl ArithmeticOps for ExecContext<'_> {
    fn handle_arithmetic(&mut self, op: OpCode) -> Result<(), RuntimeError> {
        if op == OpCode::Not {
            let top = self
                .top()?
                .computing
                .peek()
                .ok_or(RuntimeError::ComputingStackEmpty)?;
            let val = self.solve(top)?;
            self.pop_operand()?;
            return self.push_operand(Value::bool(val.is_falsey()));
        }

        let (a, b) = self.binary_operands()?;
        let result = match op {
            OpCode::Add => self.add_values(a, b)?,
            OpCode::Sub => {
                let (x, y) = self.int_operands(op, a, b)?;
                Value::int(x.wrapping_sub(y))
            }
            OpCode::Mul => {
                let (x, y) = self.int_operands(op, a, b)?;
                Value::int(x.wrapping_mul(y))
            }
            OpCode::Div | OpCode::Mod => {
                let (x, y) = self.int_operands(op, a, b)?;
                if y == 0 {
                    return Err(RuntimeError::DivideByZero);
                }
                if op == OpCode::Div {
                    Value::int(x.wrapping_div(y))
                } else {
                    Value::int(x.wrapping_rem(y))
                }
            }
            OpCode::Eq => Value::bool(self.values_equal(a, b)),
            OpCode::Lt => {
                let (x, y) = self.int_operands(op, a, b)?;
                Value::bool(x < y)
            }
            OpCode::Gt => {
                let (x, y) = self.int_operands(op, a, b)?;
                Value::bool(x > y)
            }
            _ => return Err(RuntimeError::InvalidOpcode(op.as_u32())),
        };

        let stack = &mut self.top_mut()?.computing;
        stack.take_top(2)?;
        stack.push(result);
        Ok(())
    }
}
