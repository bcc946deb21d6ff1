//! Native memory - pointer resources and CRT passthroughs
//!
//! Design: a `Pointer` wraps a raw address with a tracked size and an
//! optional finalizer that runs exactly once. Arithmetic, byte access and
//! boundary conversions live here; the `trace` submodule wraps the CRT
//! allocator and keeps a registry of live passthrough allocations.

mod trace;


pub use trace::{
    allocate, allocate_zeroed, memory_report, reallocate, release, MemoryReport,
    MemoryReportEntry,
};

use crate::error::FfiError;
use crate::logging::log_allocation;
use crate::value::Value;
use std::ffi::{c_void, CStr};

/// Finalizer invoked with the raw address when an owning pointer drops.
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

/// A raw native address with a tracked size and optional finalizer.
///
/// The size is bookkeeping, not a hard capacity: byte access is bounds
/// checked only while the size is known (positive). Arithmetic keeps the
/// inverse relation between address and size, so `p + n` tracks `n` fewer
/// reachable bytes and `p - n` that many more.
pub struct Pointer {
    addr: usize,
    size: isize,
    free: Option<FreeFn>,
}

impl Pointer {
    #[inline]
    pub const fn new(addr: usize, size: isize, free: Option<FreeFn>) -> Self {
        Self { addr, size, free }
    }

    /// The null pointer.
    #[inline]
    pub const fn null() -> Self {
        Self {
            addr: 0,
            size: 0,
            free: None,
        }
    }

    /// Allocate `size` zero-filled bytes from the CRT heap.
    ///
    /// The block is owned by the returned pointer only if a finalizer is
    /// supplied; `libc::free` is the usual choice.
    pub fn malloc(size: usize, free: Option<FreeFn>) -> Result<Self, FfiError> {
        let ptr = unsafe { libc::malloc(size) };
        if ptr.is_null() {
            return Err(FfiError::AllocationFailed);
        }
        unsafe { std::ptr::write_bytes(ptr as *mut u8, 0, size) };
        log_allocation("malloc", size, ptr as usize);
        Ok(Self {
            addr: ptr as usize,
            size: size as isize,
            free,
        })
    }

    /// Resolve a host value to a pointer view.
    ///
    /// Nil becomes null, a string the address of its bytes, an integer a
    /// raw address. Views never carry a finalizer.
    pub fn from_value(value: &Value) -> Result<Self, FfiError> {
        match value {
            Value::Nil => Ok(Self::null()),
            Value::Ptr(p) => Ok(p.view()),
            Value::Str(s) => Ok(Self::new(
                s.as_ptr() as usize,
                s.as_bytes().len() as isize,
                None,
            )),
            Value::Int(i) => Ok(Self::new(*i as usize, 0, None)),
            Value::Float(_) => Err(FfiError::ValueConversion {
                expected: "pointer",
                got: "float",
            }),
        }
    }

    /// A non-owning copy; the finalizer stays with `self`.
    #[inline]
    pub const fn view(&self) -> Self {
        Self {
            addr: self.addr,
            size: self.size,
            free: None,
        }
    }

    #[inline]
    pub const fn address(&self) -> usize {
        self.addr
    }

    #[inline]
    pub const fn size(&self) -> isize {
        self.size
    }

    #[inline]
    pub fn set_size(&mut self, size: isize) {
        self.size = size;
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.addr == 0
    }

    #[inline]
    pub const fn free_fn(&self) -> Option<FreeFn> {
        self.free
    }

    #[inline]
    pub fn set_free(&mut self, free: Option<FreeFn>) {
        self.free = free;
    }

    /// Run the finalizer now, consuming it. Drop becomes a no-op.
    pub fn call_free(&mut self) {
        if let Some(free) = self.free.take() {
            if self.addr != 0 {
                unsafe { free(self.addr as *mut c_void) };
            }
        }
    }

    /// Derived view `n` bytes forward; the tracked size shrinks by `n`.
    #[inline]
    pub fn offset(&self, n: isize) -> Self {
        Self {
            addr: self.addr.wrapping_add_signed(n),
            size: self.size.wrapping_sub(n),
            free: None,
        }
    }

    fn check_range(&self, offset: isize, len: usize) -> Result<(), FfiError> {
        if self.addr == 0 {
            return Err(FfiError::NullDereference);
        }
        if self.size > 0 {
            let oob = offset < 0
                || (offset as usize).saturating_add(len) > self.size as usize;
            if oob {
                return Err(FfiError::OutOfBounds {
                    offset,
                    len,
                    size: self.size,
                });
            }
        }
        Ok(())
    }

    /// Read one byte at `offset`.
    ///
    /// # Safety
    /// The address must be readable at `offset` whenever the tracked size
    /// is unknown; with a known size the range is checked first.
    pub unsafe fn read_byte(&self, offset: isize) -> Result<u8, FfiError> {
        self.check_range(offset, 1)?;
        Ok(*(self.addr.wrapping_add_signed(offset) as *const u8))
    }

    /// Write one byte at `offset`.
    ///
    /// # Safety
    /// As for [`Self::read_byte`], but the range must also be writable.
    pub unsafe fn write_byte(&self, offset: isize, byte: u8) -> Result<(), FfiError> {
        self.check_range(offset, 1)?;
        *(self.addr.wrapping_add_signed(offset) as *mut u8) = byte;
        Ok(())
    }

    /// Copy `len` bytes out starting at `offset`.
    ///
    /// # Safety
    /// The whole range must be readable when the tracked size is unknown.
    pub unsafe fn read_bytes(&self, offset: isize, len: usize) -> Result<Vec<u8>, FfiError> {
        self.check_range(offset, len)?;
        let mut out = vec![0u8; len];
        std::ptr::copy_nonoverlapping(
            self.addr.wrapping_add_signed(offset) as *const u8,
            out.as_mut_ptr(),
            len,
        );
        Ok(out)
    }

    /// Copy `bytes` in starting at `offset`.
    ///
    /// # Safety
    /// The whole range must be writable when the tracked size is unknown.
    pub unsafe fn write_bytes(&self, offset: isize, bytes: &[u8]) -> Result<(), FfiError> {
        self.check_range(offset, bytes.len())?;
        std::ptr::copy_nonoverlapping(
            bytes.as_ptr(),
            self.addr.wrapping_add_signed(offset) as *mut u8,
            bytes.len(),
        );
        Ok(())
    }

    /// Read a NUL-terminated string at the address.
    ///
    /// # Safety
    /// The address must point at NUL-terminated data; the scan is not
    /// bounded by the tracked size.
    pub unsafe fn read_cstr(&self) -> Result<String, FfiError> {
        if self.addr == 0 {
            return Err(FfiError::NullDereference);
        }
        let cstr = CStr::from_ptr(self.addr as *const std::os::raw::c_char);
        Ok(cstr.to_string_lossy().into_owned())
    }

    /// Read exactly `len` bytes at the address as a string.
    ///
    /// Unlike [`Self::read_cstr`] the read is bounded and embedded NULs
    /// are kept. Invalid UTF-8 is replaced, not rejected.
    ///
    /// # Safety
    /// The first `len` bytes must be readable when the tracked size is
    /// unknown.
    pub unsafe fn read_exact(&self, len: usize) -> Result<String, FfiError> {
        let bytes = self.read_bytes(0, len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the pointer stored at the address.
    ///
    /// # Safety
    /// The address must hold a readable pointer-sized value.
    pub unsafe fn deref(&self) -> Result<Self, FfiError> {
        if self.addr == 0 {
            return Err(FfiError::NullDereference);
        }
        let target = *(self.addr as *const *mut c_void);
        Ok(Self::new(target as usize, 0, None))
    }
}

impl Drop for Pointer {
    fn drop(&mut self) {
        if let Some(free) = self.free.take() {
            if self.addr != 0 {
                unsafe { free(self.addr as *mut c_void) };
            }
        }
    }
}

impl core::ops::Add<isize> for &Pointer {
    type Output = Pointer;

    fn add(self, n: isize) -> Pointer {
        self.offset(n)
    }
}

impl core::ops::Sub<isize> for &Pointer {
    type Output = Pointer;

    fn sub(self, n: isize) -> Pointer {
        self.offset(n.wrapping_neg())
    }
}

// Identity follows the address alone; size and finalizer are bookkeeping.
impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl PartialOrd for Pointer {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        self.addr.partial_cmp(&other.addr)
    }
}

impl core::fmt::Debug for Pointer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Pointer {{ addr: {:#x}, size: {}, free: {} }}",
            self.addr,
            self.size,
            if self.free.is_some() { "set" } else { "none" }
        )
    }
}
