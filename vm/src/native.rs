use crate::error::RuntimeError;
use crate::machine::ExecContext;
use memory::Value;

// The unified signature for every host callback.
// args: already solved, in call order.
// Return: `None` means "no value"; the caller pushes an integer status 0.
pub type NativeFn =
    fn(ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Option<Value>, RuntimeError>;

#[derive(Clone)]
pub struct NativeObj {
    pub name: String,
    pub func: NativeFn,
    pub arity: isize, // -1 for variadic
}

impl NativeObj {
    pub fn accepts(&self, argc: usize) -> bool {
        self.arity < 0 || self.arity as usize == argc
    }
}

impl std::fmt::Debug for NativeObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeObj")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}
