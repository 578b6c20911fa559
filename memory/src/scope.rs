use crate::Value;
use std::collections::HashMap;

/// A lexical scope: the variables a frame defines plus a link to the
/// enclosing scope. Following `parent` from a frame's scope walks its
/// environment entrance chain up to the global scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub variables: HashMap<String, Value>,
    pub parent: Option<u32>,
}

impl Scope {
    pub fn new(parent: Option<u32>) -> Self {
        Self {
            variables: HashMap::new(),
            parent,
        }
    }

    /// Push every handle this scope keeps alive onto the tracing worklist.
    pub fn trace_children(&self, worklist: &mut Vec<Value>) {
        worklist.extend(self.variables.values().copied());
        if let Some(parent) = self.parent {
            worklist.push(Value::scope(parent));
        }
    }

    pub(crate) fn approx_size(&self) -> usize {
        std::mem::size_of::<Scope>()
            + self
                .variables
                .keys()
                .map(|k| k.capacity() + std::mem::size_of::<Value>())
                .sum::<usize>()
    }
}
