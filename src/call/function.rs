//! Forward invoker - bound native functions and the last-error slot

use super::CallInterface;
use crate::error::FfiError;
use crate::logging::{log_forward_call, log_forward_return};
use crate::marshal;
use crate::memory::Pointer;
use crate::types::RawCell;
use crate::value::{ConvertibleToAddress, Value};
use libffi::middle::CodePtr;
use libffi::raw::ffi_call;
use std::ffi::c_void;
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

// One process-wide slot, written unconditionally after every forward
// call, mirroring how the CRT exposes errno.
static LAST_ERROR: AtomicI32 = AtomicI32::new(0);

/// The OS error code captured after the most recent forward call.
#[inline]
pub fn last_error() -> i32 {
    LAST_ERROR.load(Ordering::Relaxed)
}

/// Overwrite the captured error code.
#[inline]
pub fn set_last_error(code: i32) {
    LAST_ERROR.store(code, Ordering::Relaxed)
}

/// A native function bound to a compiled call interface.
#[derive(Debug)]
pub struct Function {
    interface: CallInterface,
    target: CodePtr,
    name: Option<String>,
}

impl Function {
    /// Bind `target` (a code address) to a compiled interface.
    pub fn new(interface: CallInterface, target: usize) -> Self {
        Self {
            interface,
            target: CodePtr(target as *mut c_void),
            name: None,
        }
    }

    /// Like [`Self::new`], carrying a symbol name for diagnostics.
    pub fn with_name(interface: CallInterface, target: usize, name: &str) -> Self {
        Self {
            interface,
            target: CodePtr(target as *mut c_void),
            name: Some(name.to_string()),
        }
    }

    #[inline]
    pub fn address(&self) -> usize {
        self.target.as_ptr() as usize
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.interface.arity()
    }

    #[inline]
    pub fn interface(&self) -> &CallInterface {
        &self.interface
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The bound address as a pointer resource.
    pub fn to_pointer(&self) -> Pointer {
        Pointer::new(self.address(), 0, None)
    }

    /// Invoke the bound function with marshalled arguments.
    ///
    /// Arity is checked before anything is marshalled; a mismatch
    /// performs no native call. After the call returns, the OS error
    /// code is captured into the process-wide slot unconditionally.
    ///
    /// # Safety
    /// The bound address must be callable code matching the compiled
    /// signature. Nothing can make a mistyped foreign call safe.
    pub unsafe fn call(&self, args: &[Value]) -> Result<Value, FfiError> {
        let want = self.interface.arity();
        if args.len() != want {
            return Err(FfiError::ArityMismatch {
                got: args.len(),
                want,
            });
        }
        log_forward_call(self.name.as_deref().unwrap_or("<anonymous>"), args.len());

        let mut cells: Vec<RawCell> = Vec::with_capacity(args.len());
        for (value, &ty) in args.iter().zip(self.interface.args()) {
            cells.push(marshal::to_native(ty, value)?);
        }
        // Parallel address array; one extra null slot mirrors the
        // descriptor array's sentinel.
        let mut argv: Vec<*mut c_void> = Vec::with_capacity(cells.len() + 1);
        argv.extend(
            cells
                .iter_mut()
                .map(|cell| cell as *mut RawCell as *mut c_void),
        );
        argv.push(std::ptr::null_mut());

        let mut ret_cell = RawCell::zeroed();
        ffi_call(
            self.interface.cif_ptr(),
            Some(*self.target.as_safe_fun()),
            &mut ret_cell as *mut RawCell as *mut c_void,
            argv.as_mut_ptr(),
        );
        // Capture errno before anything else can clobber it
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
        set_last_error(errno);
        log_forward_return(self.name.as_deref().unwrap_or("<anonymous>"), errno);

        Ok(marshal::from_return(self.interface.return_type(), &ret_cell))
    }
}

impl ConvertibleToAddress for Function {
    #[inline]
    fn to_address(&self) -> usize {
        self.address()
    }
}
