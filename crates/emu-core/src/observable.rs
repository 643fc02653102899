//! Observability trait for inspecting and patching component state.
//!
//! Every CPU core exposes its register file by name so hosts and tests can
//! peek (and, for debugger-style tooling, poke) without knowing the
//! concrete register layout. Queries never affect emulation state.

use std::fmt;

/// A dynamically-typed value for register queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 8-bit unsigned integer.
    U8(u8),
    /// 16-bit unsigned integer.
    U16(u16),
    /// 32-bit unsigned integer.
    U32(u32),
}

impl Value {
    /// Widen to a `u32`, the native width of every register in the system.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Value::Bool(v) => v as u32,
            Value::U8(v) => v as u32,
            Value::U16(v) => v as u32,
            Value::U32(v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

/// A component whose register state can be inspected by name.
pub trait Observable {
    /// Query a specific register or flag by path.
    ///
    /// Paths are lower-case register names (`pc`, `d0`, `sr`) with dots for
    /// sub-fields (`flags.z`). Returns `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// Patch a register by path. Returns `false` for unknown or read-only
    /// paths. Pokes use the same write path as guest stores where one
    /// exists (e.g. writing `sr` re-checks pending interrupts).
    fn poke(&mut self, path: &str, value: u32) -> bool;

    /// List all available query paths.
    fn query_paths(&self) -> &'static [&'static str];
}
