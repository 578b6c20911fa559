use crate::error::RuntimeError;
use memory::{Heap, Scope};
use std::collections::HashMap;

/// Scope clone table for a single capture or restore.
///
/// Maps an original scope handle to the one clone made of it during the
/// operation. The global scope maps to itself and is never cloned.
#[derive(Debug)]
pub struct KernelRecord {
    clones: HashMap<u32, u32>,
}

impl KernelRecord {
    pub fn new(globals: u32) -> Self {
        let mut clones = HashMap::new();
        clones.insert(globals, globals);
        Self { clones }
    }

    /// Map `original` to an existing scope instead of cloning it.
    pub fn seed(&mut self, original: u32, replacement: u32) {
        self.clones.insert(original, replacement);
    }

    pub fn get(&self, original: u32) -> Option<u32> {
        self.clones.get(&original).copied()
    }

    pub fn len(&self) -> usize {
        self.clones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }

    /// Clone `scope` and every ancestor not yet recorded, relinking each
    /// clone to the clone of its parent. Returns the clone of `scope`.
    pub fn clone_chain(&mut self, heap: &mut Heap, scope: u32) -> Result<u32, RuntimeError> {
        // Walk up until an already-recorded ancestor (or the chain's end).
        let mut pending = Vec::new();
        let mut cursor = Some(scope);
        while let Some(idx) = cursor {
            if self.clones.contains_key(&idx) {
                break;
            }
            let s = heap
                .get_scope(idx)
                .ok_or_else(|| RuntimeError::NullPointer(format!("scope {}", idx)))?;
            pending.push(idx);
            cursor = s.parent;
        }

        // Outermost first, so every parent clone exists before its child.
        for idx in pending.into_iter().rev() {
            let source = heap
                .get_scope(idx)
                .ok_or_else(|| RuntimeError::NullPointer(format!("scope {}", idx)))?;
            let parent = match source.parent {
                Some(p) => Some(self.get(p).ok_or_else(|| {
                    RuntimeError::internal(format!("scope {} cloned before its parent", idx))
                })?),
                None => None,
            };
            let copy = Scope {
                variables: source.variables.clone(),
                parent,
            };
            let handle = heap.alloc_scope(copy);
            self.clones.insert(idx, handle);
        }

        self.get(scope)
            .ok_or_else(|| RuntimeError::internal("kernel record lost a clone"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::Value;

    #[test]
    fn test_shared_ancestor_is_cloned_once() {
        let mut heap = Heap::new();
        let globals = heap.alloc_scope(Scope::new(None));
        let outer = heap.alloc_scope(Scope::new(Some(globals)));
        let left = heap.alloc_scope(Scope::new(Some(outer)));
        let right = heap.alloc_scope(Scope::new(Some(outer)));
        heap.define(outer, "shared", Value::int(1));

        let before = heap.scopes.live();
        let mut kernel = KernelRecord::new(globals);
        let l = kernel.clone_chain(&mut heap, left).unwrap();
        let r = kernel.clone_chain(&mut heap, right).unwrap();

        // left, right, outer: three clones, globals untouched
        assert_eq!(heap.scopes.live(), before + 3);
        let lp = heap.get_scope(l).unwrap().parent.unwrap();
        let rp = heap.get_scope(r).unwrap().parent.unwrap();
        assert_eq!(lp, rp);
        assert_ne!(lp, outer);
        assert_eq!(heap.get_scope(lp).unwrap().parent, Some(globals));
        assert_eq!(heap.lookup(l, "shared"), Some(Value::int(1)));
    }

    #[test]
    fn test_clones_are_independent_of_originals() {
        let mut heap = Heap::new();
        let globals = heap.alloc_scope(Scope::new(None));
        let s = heap.alloc_scope(Scope::new(Some(globals)));
        heap.define(s, "x", Value::int(1));

        let mut kernel = KernelRecord::new(globals);
        let c = kernel.clone_chain(&mut heap, s).unwrap();
        heap.assign(s, "x", Value::int(2));
        assert_eq!(heap.lookup(c, "x"), Some(Value::int(1)));
    }

    #[test]
    fn test_seeded_scope_is_reused() {
        let mut heap = Heap::new();
        let globals = heap.alloc_scope(Scope::new(None));
        let snapshot = heap.alloc_scope(Scope::new(Some(globals)));
        let live = heap.alloc_scope(Scope::new(Some(globals)));
        let child = heap.alloc_scope(Scope::new(Some(snapshot)));

        let mut kernel = KernelRecord::new(globals);
        kernel.seed(snapshot, live);
        let c = kernel.clone_chain(&mut heap, child).unwrap();
        assert_eq!(heap.get_scope(c).unwrap().parent, Some(live));
        assert_eq!(kernel.clone_chain(&mut heap, snapshot).unwrap(), live);
    }

    #[test]
    fn test_globals_are_never_cloned() {
        let mut heap = Heap::new();
        let globals = heap.alloc_scope(Scope::new(None));
        let mut kernel = KernelRecord::new(globals);
        assert_eq!(kernel.clone_chain(&mut heap, globals).unwrap(), globals);
        assert_eq!(kernel.len(), 1);
    }
}
