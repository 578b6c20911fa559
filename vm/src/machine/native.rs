use crate::native::{NativeFn, NativeObj};
use memory::{ExternalFunction, Function, Value};

/// Trait for native function registration
pub trait NativeRegistry {
    fn define_native(&mut self, name: &str, func: NativeFn, arity: isize) -> Value;
    fn bootstrap_natives(&mut self);
}

impl NativeRegistry for super::vm::VM {
    fn define_native(&mut self, name: &str, func: NativeFn, arity: isize) -> Value {
        // 1. Register Native Object
        self.natives.push(NativeObj {
            name: name.to_string(),
            func,
            arity,
        });
        let native_idx = (self.natives.len() - 1) as u32;

        // 2. Wrap it as an external function value
        let handle = self.heap.alloc_function(Function::External(ExternalFunction {
            name: name.to_string(),
            native: native_idx,
        }));
        let val = Value::function(handle);

        // 3. Bind it in the global scope
        self.define_global(name, val);
        val
    }

    fn bootstrap_natives(&mut self) {
        // Preamble: Core Intrinsics
        self.define_native("print", crate::stdlib::core::native_print, -1);
        self.define_native("len", crate::stdlib::core::native_len, 1);
        self.define_native("typeof", crate::stdlib::core::native_typeof, 1);
        self.define_native("assert", crate::stdlib::core::native_assert, 1);
    }
}
