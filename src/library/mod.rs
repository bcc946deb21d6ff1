//! Library handles - loading native images and resolving symbols
//!
//! Design: a handle owns one of three states. `Loaded` wraps an OS
//! loader handle, `Pseudo` wraps a dlsym pseudo-handle that was never
//! opened, `Closed` remembers that the script already released it.
//! Handles stay mapped on drop by default: resolved symbols outlive the
//! handle as raw addresses, so unmapping would leave dangling call
//! targets. The auto-close flag opts back into closing on drop.


use crate::error::FfiError;
use crate::logging::{log_library_close, log_library_open, log_symbol_resolved};
use std::ffi::CString;
use std::mem;
use std::os::raw::{c_int, c_void};

#[cfg(unix)]
pub use libc::{RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

#[cfg(unix)]
type OsLibrary = libloading::os::unix::Library;
#[cfg(windows)]
type OsLibrary = libloading::os::windows::Library;

enum HandleState {
    Loaded(OsLibrary),
    #[cfg(unix)]
    Pseudo(*mut c_void),
    Closed,
}

/// A native library scripts resolve symbols through.
pub struct LibraryHandle {
    state: HandleState,
    name: String,
    enable_close: bool,
}

impl LibraryHandle {
    /// Open `path`, or the program's own image when `None`.
    ///
    /// Unix flags default to `RTLD_LAZY | RTLD_GLOBAL`; windows has no
    /// equivalent and ignores them.
    #[cfg(unix)]
    pub fn open(path: Option<&str>, flags: Option<c_int>) -> Result<Self, FfiError> {
        let flags = flags.unwrap_or(RTLD_LAZY | RTLD_GLOBAL);
        let lib = unsafe { OsLibrary::open(path, flags) }.map_err(|e| FfiError::LibraryError {
            message: e.to_string(),
        })?;
        let name = path.unwrap_or("self").to_string();
        log_library_open(&name);
        Ok(Self {
            state: HandleState::Loaded(lib),
            name,
            enable_close: false,
        })
    }

    /// Open `path`, or the program's own image when `None`.
    ///
    /// Unix flags default to `RTLD_LAZY | RTLD_GLOBAL`; windows has no
    /// equivalent and ignores them.
    #[cfg(windows)]
    pub fn open(path: Option<&str>, _flags: Option<c_int>) -> Result<Self, FfiError> {
        let lib = match path {
            Some(p) => unsafe { OsLibrary::new(p) },
            None => OsLibrary::this(),
        }
        .map_err(|e| FfiError::LibraryError {
            message: e.to_string(),
        })?;
        let name = path.unwrap_or("self").to_string();
        log_library_open(&name);
        Ok(Self {
            state: HandleState::Loaded(lib),
            name,
            enable_close: false,
        })
    }

    /// Handle resolving through the next image in search order.
    #[cfg(unix)]
    pub fn next() -> Self {
        Self {
            state: HandleState::Pseudo(libc::RTLD_NEXT),
            name: "RTLD_NEXT".to_string(),
            enable_close: false,
        }
    }

    /// Handle resolving through the global default search order.
    #[cfg(unix)]
    pub fn default_handle() -> Self {
        Self {
            state: HandleState::Pseudo(libc::RTLD_DEFAULT),
            name: "RTLD_DEFAULT".to_string(),
            enable_close: false,
        }
    }

    /// Resolve `symbol` to its load address.
    ///
    /// The address is directly usable as a forward-call target.
    pub fn resolve(&self, symbol: &str) -> Result<usize, FfiError> {
        let address = match &self.state {
            HandleState::Closed => {
                return Err(FfiError::LibraryError {
                    message: "closed handle".to_string(),
                })
            }
            HandleState::Loaded(lib) => {
                let name = symbol_cstr(symbol)?;
                unsafe {
                    let sym = lib.get::<*mut c_void>(name.as_bytes_with_nul()).map_err(|e| {
                        FfiError::LibraryError {
                            message: e.to_string(),
                        }
                    })?;
                    sym.as_raw_ptr() as usize
                }
            }
            #[cfg(unix)]
            HandleState::Pseudo(handle) => {
                let name = symbol_cstr(symbol)?;
                unsafe {
                    // dlerror protocol: clear, call, re-check.
                    libc::dlerror();
                    let addr = libc::dlsym(*handle, name.as_ptr());
                    let diag = libc::dlerror();
                    if !diag.is_null() {
                        return Err(FfiError::LibraryError {
                            message: std::ffi::CStr::from_ptr(diag).to_string_lossy().into_owned(),
                        });
                    }
                    if addr.is_null() {
                        return Err(FfiError::LibraryError {
                            message: format!("unknown symbol \"{}\"", symbol),
                        });
                    }
                    addr as usize
                }
            }
        };
        log_symbol_resolved(symbol, address);
        Ok(address)
    }

    /// Release the handle. A second close is an error.
    pub fn close(&mut self) -> Result<(), FfiError> {
        match mem::replace(&mut self.state, HandleState::Closed) {
            HandleState::Loaded(lib) => {
                lib.close().map_err(|e| FfiError::LibraryError {
                    message: e.to_string(),
                })?;
                log_library_close(&self.name);
                Ok(())
            }
            #[cfg(unix)]
            HandleState::Pseudo(_) => {
                log_library_close(&self.name);
                Ok(())
            }
            HandleState::Closed => Err(FfiError::DoubleClose),
        }
    }

    /// Close the native handle when this value drops.
    pub fn enable_close(&mut self) {
        self.enable_close = true;
    }

    /// Keep the native handle mapped when this value drops (the default).
    pub fn disable_close(&mut self) {
        self.enable_close = false;
    }

    #[inline]
    pub fn close_enabled(&self) -> bool {
        self.enable_close
    }

    #[inline]
    pub fn closed(&self) -> bool {
        matches!(self.state, HandleState::Closed)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        if !self.enable_close {
            // Resolved addresses outlive the handle; keep the image mapped.
            if let HandleState::Loaded(lib) = mem::replace(&mut self.state, HandleState::Closed) {
                let _ = lib.into_raw();
            }
        }
    }
}

impl core::fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = match &self.state {
            HandleState::Loaded(_) => "loaded",
            #[cfg(unix)]
            HandleState::Pseudo(_) => "pseudo",
            HandleState::Closed => "closed",
        };
        write!(f, "LibraryHandle {{ name: {:?}, state: {} }}", self.name, state)
    }
}

fn symbol_cstr(symbol: &str) -> Result<CString, FfiError> {
    CString::new(symbol).map_err(|_| FfiError::LibraryError {
        message: format!("invalid symbol name \"{}\"", symbol),
    })
}
