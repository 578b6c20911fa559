use std::fmt;

// --- Tagged u64 Constants ---
// Bits 63..60 = tag  (4 bits, 16 possible types)
// Bits 59..0  = payload (60 bits)

const TAG_SHIFT: u32 = 60;
const PAYLOAD_MASK: u64 = (1u64 << 60) - 1; // 0x0FFF_FFFF_FFFF_FFFF

// Immediate tags
pub const TAG_INT: u64 = 0; // i60 inline (most common -> tag 0 for speed)
pub const TAG_NONE: u64 = 1;
pub const TAG_FALSE: u64 = 2;
pub const TAG_TRUE: u64 = 3;
// Heap tags (payload is an arena handle)
pub const TAG_STRING: u64 = 4;
pub const TAG_IDENT: u64 = 5;
pub const TAG_FUNCTION: u64 = 6;
pub const TAG_SCOPE: u64 = 7;
// 8-15 reserved

// i60 range constants
pub const I60_MIN: i64 = -(1i64 << 59);
pub const I60_MAX: i64 = (1i64 << 59) - 1;

const _: () = assert!(TAG_SCOPE < 16, "tag must fit in 4 bits");

/// A copyable object handle.
///
/// Immediates (ints, none, booleans) live in the payload. Everything else is
/// a handle into one of the [`Heap`](crate::Heap) arenas, so cloning a value
/// never copies the object behind it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(pub u64);

impl Value {
    // --- Constructors ---

    #[inline]
    pub fn int(val: i64) -> Self {
        Value((TAG_INT << TAG_SHIFT) | ((val as u64) & PAYLOAD_MASK))
    }

    #[inline]
    pub fn none() -> Self {
        Value(TAG_NONE << TAG_SHIFT)
    }

    #[inline]
    pub fn bool(b: bool) -> Self {
        if b {
            Value(TAG_TRUE << TAG_SHIFT)
        } else {
            Value(TAG_FALSE << TAG_SHIFT)
        }
    }

    #[inline]
    pub fn string(handle: u32) -> Self {
        Value::make_obj(TAG_STRING, handle)
    }

    /// An unresolved identifier. The handle points at the name in the
    /// string arena; `solve` turns it into the bound value.
    #[inline]
    pub fn identifier(handle: u32) -> Self {
        Value::make_obj(TAG_IDENT, handle)
    }

    #[inline]
    pub fn function(handle: u32) -> Self {
        Value::make_obj(TAG_FUNCTION, handle)
    }

    #[inline]
    pub fn scope(handle: u32) -> Self {
        Value::make_obj(TAG_SCOPE, handle)
    }

    #[inline]
    fn make_obj(tag: u64, handle: u32) -> Self {
        Value((tag << TAG_SHIFT) | (handle as u64))
    }

    // --- Checkers ---

    #[inline]
    pub fn tag(&self) -> u64 {
        (self.0 >> TAG_SHIFT) & 0xF
    }

    #[inline]
    pub fn is_int(&self) -> bool {
        self.tag() == TAG_INT
    }

    #[inline]
    pub fn is_obj(&self) -> bool {
        self.tag() >= TAG_STRING
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.tag() == TAG_NONE
    }

    #[inline]
    pub fn is_bool(&self) -> bool {
        let t = self.tag();
        t == TAG_FALSE || t == TAG_TRUE
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        self.tag() == TAG_STRING
    }

    #[inline]
    pub fn is_identifier(&self) -> bool {
        self.tag() == TAG_IDENT
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        self.tag() == TAG_FUNCTION
    }

    #[inline]
    pub fn is_scope(&self) -> bool {
        self.tag() == TAG_SCOPE
    }

    // --- Accessors ---

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        if self.tag() != TAG_INT {
            return None;
        }
        let raw = self.0 & PAYLOAD_MASK;
        // Sign-extend from bit 59
        let extended = if raw & (1u64 << 59) != 0 {
            raw | !PAYLOAD_MASK
        } else {
            raw
        };
        Some(extended as i64)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self.tag() {
            TAG_TRUE => Some(true),
            TAG_FALSE => Some(false),
            _ => None,
        }
    }

    #[inline]
    pub fn is_falsey(&self) -> bool {
        self.is_none() || self.tag() == TAG_FALSE || self.as_int() == Some(0)
    }

    #[inline]
    pub fn as_handle(&self) -> Option<u32> {
        if self.is_obj() {
            Some((self.0 & 0xFFFF_FFFF) as u32)
        } else {
            None
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handle = (self.0 & 0xFFFF_FFFF) as u32;
        match self.tag() {
            TAG_INT => write!(f, "Int({})", self.as_int().unwrap_or_default()),
            TAG_NONE => write!(f, "None"),
            TAG_FALSE => write!(f, "Bool(false)"),
            TAG_TRUE => write!(f, "Bool(true)"),
            TAG_STRING => write!(f, "String({})", handle),
            TAG_IDENT => write!(f, "Identifier({})", handle),
            TAG_FUNCTION => write!(f, "Function({})", handle),
            TAG_SCOPE => write!(f, "Scope({})", handle),
            _ => write!(f, "Unknown(Bits: {:x})", self.0),
        }
    }
}
