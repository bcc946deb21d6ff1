//! Generic value cell - one native argument or return slot
//!
//! Arguments are written and read at their exact declared width. Return
//! slots are different: the ABI widens integral results narrower than a
//! machine word, so they travel through the `sarg`/`uarg` fields instead.

use libffi::raw::{ffi_arg, ffi_sarg};
use std::ffi::c_void;
use std::os::raw::{c_long, c_ulong};

/// Untagged native value cell, 8 bytes on every supported target.
#[repr(C)]
pub union RawCell {
    /// Widened unsigned return slot.
    pub uarg: ffi_arg,
    /// Widened signed return slot.
    pub sarg: ffi_sarg,
    pub i8: i8,
    pub u8: u8,
    pub i16: i16,
    pub u16: u16,
    pub i32: i32,
    pub u32: u32,
    pub i64: i64,
    pub u64: u64,
    pub slong: c_long,
    pub ulong: c_ulong,
    pub f32: f32,
    pub f64: f64,
    pub ptr: *mut c_void,
}

impl RawCell {
    /// Create a fully zeroed cell
    #[inline]
    pub const fn zeroed() -> Self {
        Self { u64: 0 }
    }

    /// Create null pointer
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: core::ptr::null_mut(),
        }
    }

    /// Create from pointer
    #[inline]
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        Self { ptr }
    }
}

impl Default for RawCell {
    #[inline]
    fn default() -> Self {
        Self::zeroed()
    }
}

// Manual implementations for Copy, Clone, and Debug since union doesn't auto-derive
impl Copy for RawCell {}
impl Clone for RawCell {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl core::fmt::Debug for RawCell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RawCell {{ ... }}")
    }
}
