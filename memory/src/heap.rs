use crate::function::Function;
use crate::scope::Scope;
use crate::value::{TAG_FUNCTION, TAG_IDENT, TAG_SCOPE, TAG_STRING};
use crate::Value;
use std::collections::HashSet;
use tracing::debug;

/// A typed slab with a free list. Handles are stable for the lifetime of
/// the object; a freed slot is reused by the next allocation.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    pub data: Vec<Option<T>>,
    pub free_indices: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    pub fn alloc(&mut self, item: T) -> u32 {
        if let Some(idx) = self.free_indices.pop() {
            self.data[idx as usize] = Some(item);
            idx
        } else {
            let index = self.data.len() as u32;
            self.data.push(Some(item));
            index
        }
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.data.get(index as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.data.get_mut(index as usize).and_then(Option::as_mut)
    }

    pub fn is_free(&self, index: u32) -> bool {
        self.get(index).is_none()
    }

    /// Number of live objects.
    pub fn live(&self) -> usize {
        self.data.len() - self.free_indices.len()
    }

    /// Free every slot not in `marked`; returns how many were released.
    fn sweep(&mut self, marked: &HashSet<u32>) -> usize {
        let mut released = 0;
        for (i, slot) in self.data.iter_mut().enumerate() {
            let idx = i as u32;
            if slot.is_some() && !marked.contains(&idx) {
                *slot = None;
                self.free_indices.push(idx);
                released += 1;
            }
        }
        released
    }
}

/// Counts reported by a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub strings: usize,
    pub functions: usize,
    pub scopes: usize,
}

impl SweepStats {
    pub fn total(&self) -> usize {
        self.strings + self.functions + self.scopes
    }
}

pub struct Heap {
    // Typed Arenas
    pub strings: Arena<String>,
    pub functions: Arena<Function>,
    pub scopes: Arena<Scope>,

    // Mark State (one set per arena type)
    marked_strings: HashSet<u32>,
    marked_functions: HashSet<u32>,
    marked_scopes: HashSet<u32>,

    // GC Metrics
    pub bytes_allocated: usize,
    pub next_gc_threshold: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self::with_threshold(1024 * 1024) // Start at 1MB
    }

    pub fn with_threshold(next_gc_threshold: usize) -> Self {
        Self {
            strings: Arena::new(),
            functions: Arena::new(),
            scopes: Arena::new(),
            marked_strings: HashSet::new(),
            marked_functions: HashSet::new(),
            marked_scopes: HashSet::new(),
            bytes_allocated: 0,
            next_gc_threshold,
        }
    }

    // --- Allocation ---

    pub fn alloc_string(&mut self, s: String) -> u32 {
        self.bytes_allocated += s.capacity();
        self.strings.alloc(s)
    }

    pub fn alloc_function(&mut self, f: Function) -> u32 {
        self.bytes_allocated += f.approx_size();
        self.functions.alloc(f)
    }

    pub fn alloc_scope(&mut self, scope: Scope) -> u32 {
        self.bytes_allocated += scope.approx_size();
        self.scopes.alloc(scope)
    }

    // --- Access ---

    pub fn get_string(&self, index: u32) -> Option<&String> {
        self.strings.get(index)
    }

    pub fn get_function(&self, index: u32) -> Option<&Function> {
        self.functions.get(index)
    }

    pub fn get_function_mut(&mut self, index: u32) -> Option<&mut Function> {
        self.functions.get_mut(index)
    }

    pub fn get_scope(&self, index: u32) -> Option<&Scope> {
        self.scopes.get(index)
    }

    pub fn get_scope_mut(&mut self, index: u32) -> Option<&mut Scope> {
        self.scopes.get_mut(index)
    }

    /// Function object behind a value, if it is a live function handle.
    pub fn function_of(&self, val: Value) -> Option<&Function> {
        if !val.is_function() {
            return None;
        }
        self.get_function(val.as_handle()?)
    }

    /// Name behind a string or identifier value.
    pub fn text_of(&self, val: Value) -> Option<&str> {
        if !(val.is_string() || val.is_identifier()) {
            return None;
        }
        self.get_string(val.as_handle()?).map(String::as_str)
    }

    // --- Scope chains ---

    /// Resolve `name` by walking the scope chain starting at `scope`.
    pub fn lookup(&self, scope: u32, name: &str) -> Option<Value> {
        let mut cursor = Some(scope);
        while let Some(idx) = cursor {
            let s = self.get_scope(idx)?;
            if let Some(v) = s.variables.get(name) {
                return Some(*v);
            }
            cursor = s.parent;
        }
        None
    }

    /// Bind `name` in `scope` itself, shadowing outer bindings.
    pub fn define(&mut self, scope: u32, name: &str, val: Value) -> bool {
        match self.get_scope_mut(scope) {
            Some(s) => {
                s.variables.insert(name.to_string(), val);
                true
            }
            None => false,
        }
    }

    /// Overwrite the nearest existing binding of `name`. Returns false when
    /// the name is unbound along the whole chain.
    pub fn assign(&mut self, scope: u32, name: &str, val: Value) -> bool {
        let mut cursor = Some(scope);
        while let Some(idx) = cursor {
            let Some(s) = self.scopes.get_mut(idx) else {
                return false;
            };
            if let Some(slot) = s.variables.get_mut(name) {
                *slot = val;
                return true;
            }
            cursor = s.parent;
        }
        false
    }

    // --- Tracing (Mark Phase) ---

    pub fn trace(&mut self, roots: Vec<Value>) {
        let mut worklist = roots;

        while let Some(val) = worklist.pop() {
            let Some(handle) = val.as_handle() else {
                continue;
            };

            match val.tag() {
                TAG_STRING | TAG_IDENT => {
                    // Strings have no children
                    self.marked_strings.insert(handle);
                }
                TAG_FUNCTION => {
                    if self.marked_functions.insert(handle) {
                        if let Some(f) = self.functions.get(handle) {
                            f.trace_children(&mut worklist);
                        }
                    }
                }
                TAG_SCOPE => {
                    if self.marked_scopes.insert(handle) {
                        if let Some(s) = self.scopes.get(handle) {
                            s.trace_children(&mut worklist);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // --- Sweep Phase ---

    pub fn sweep(&mut self) -> SweepStats {
        let stats = SweepStats {
            strings: self.strings.sweep(&self.marked_strings),
            functions: self.functions.sweep(&self.marked_functions),
            scopes: self.scopes.sweep(&self.marked_scopes),
        };
        self.marked_strings.clear();
        self.marked_functions.clear();
        self.marked_scopes.clear();

        self.bytes_allocated = self.live_bytes();
        debug!(
            released = stats.total(),
            live_bytes = self.bytes_allocated,
            "heap swept"
        );
        stats
    }

    fn live_bytes(&self) -> usize {
        let strings: usize = self.strings.data.iter().flatten().map(String::capacity).sum();
        let functions: usize = self
            .functions
            .data
            .iter()
            .flatten()
            .map(Function::approx_size)
            .sum();
        let scopes: usize = self.scopes.data.iter().flatten().map(Scope::approx_size).sum();
        strings + functions + scopes
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc_threshold
    }

    // --- Introspection (tests, diagnostics) ---

    pub fn is_string_free(&self, index: u32) -> bool {
        self.strings.is_free(index)
    }

    pub fn is_function_free(&self, index: u32) -> bool {
        self.functions.is_free(index)
    }

    pub fn is_scope_free(&self, index: u32) -> bool {
        self.scopes.is_free(index)
    }

    pub fn is_function_marked(&self, index: u32) -> bool {
        self.marked_functions.contains(&index)
    }

    pub fn is_scope_marked(&self, index: u32) -> bool {
        self.marked_scopes.contains(&index)
    }
}
