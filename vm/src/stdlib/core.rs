use crate::error::RuntimeError;
use crate::machine::ExecContext;
use memory::Value;

pub fn native_print(ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    let line = args
        .iter()
        .map(|arg| ctx.val_to_string(*arg))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(None)
}

/// Name of a value's runtime type, as a fresh string.
pub fn native_typeof(ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    let val = args[0];
    let name = type_name(ctx, val)?;
    let handle = ctx.heap.alloc_string(name.to_string());
    Ok(Some(Value::string(handle)))
}

fn type_name(ctx: &ExecContext<'_>, val: Value) -> Result<&'static str, RuntimeError> {
    Ok(match val {
        v if v.is_int() => "int",
        v if v.is_none() => "none",
        v if v.is_bool() => "bool",
        v if v.is_string() => "string",
        v if v.is_identifier() => "identifier",
        v if v.is_scope() => "scope",
        v if v.is_function() => ctx
            .heap
            .function_of(v)
            .ok_or_else(|| RuntimeError::NullPointer("dangling function handle".into()))?
            .kind_name(),
        _ => return Err(RuntimeError::invalid_operand("unknown value tag")),
    })
}

pub fn native_assert(_ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    if args[0].is_falsey() {
        return Err(RuntimeError::Native("assertion failed".into()));
    }
    Ok(Some(Value::bool(true)))
}

pub fn native_len(ctx: &mut ExecContext<'_>, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    let s = ctx
        .heap
        .text_of(args[0])
        .filter(|_| args[0].is_string())
        .ok_or_else(|| RuntimeError::invalid_operand("len() expects a string"))?;
    Ok(Some(Value::int(s.chars().count() as i64)))
}
