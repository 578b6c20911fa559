use crate::error::RuntimeError;
use memory::Value;

/// Per-frame operand stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputingStack {
    values: Vec<Value>,
}

impl ComputingStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn push(&mut self, val: Value) {
        self.values.push(val);
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::ComputingStackEmpty)
    }

    #[inline]
    pub fn peek(&self) -> Option<Value> {
        self.values.last().copied()
    }

    /// Value `depth` slots below the top (0 is the top itself).
    pub fn peek_at(&self, depth: usize) -> Option<Value> {
        let idx = self.values.len().checked_sub(depth + 1)?;
        self.values.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Fail with `ComputingStackEmpty` unless at least `n` values are present.
    pub fn require(&self, n: usize) -> Result<(), RuntimeError> {
        if self.values.len() < n {
            return Err(RuntimeError::ComputingStackEmpty);
        }
        Ok(())
    }

    /// Remove the top `n` values, bottom-most first.
    pub fn take_top(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        self.require(n)?;
        let at = self.values.len() - n;
        Ok(self.values.split_off(at))
    }

    /// The top `n` values without removing them, bottom-most first.
    pub fn top_slice(&self, n: usize) -> Result<&[Value], RuntimeError> {
        self.require(n)?;
        Ok(&self.values[self.values.len() - n..])
    }
}

/// Move the top `n` values of `src` onto `dst`, preserving their order.
///
/// Nothing is touched when `src` holds fewer than `n` values.
pub fn transport(
    dst: &mut ComputingStack,
    src: &mut ComputingStack,
    n: usize,
) -> Result<(), RuntimeError> {
    let moved = src.take_top(n)?;
    dst.values.extend(moved);
    Ok(())
}
