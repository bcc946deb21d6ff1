//! Executable trampoline memory
//!
//! Two acquisition strategies. With the `closure-alloc` feature the ABI
//! library hands out a paired writable/executable mapping and takes it
//! back on release. Without it, the trampoline goes into an anonymous
//! page that starts writable and is flipped to read+execute once the
//! trampoline has been emitted.

use crate::error::FfiError;
use libffi::raw::ffi_closure;
use std::ffi::c_void;
use std::io;

#[cfg(feature = "closure-alloc")]
pub(super) struct ExecRegion {
    writable: *mut ffi_closure,
    code: *mut c_void,
}

#[cfg(feature = "closure-alloc")]
impl ExecRegion {
    pub fn acquire() -> Result<Self, FfiError> {
        use libffi::raw::ffi_closure_alloc;

        let mut code: *mut c_void = std::ptr::null_mut();
        let writable =
            unsafe { ffi_closure_alloc(core::mem::size_of::<ffi_closure>(), &mut code) }
                as *mut ffi_closure;
        if writable.is_null() {
            return Err(FfiError::ExecMemory {
                op: "ffi_closure_alloc",
                source: io::Error::last_os_error(),
            });
        }
        Ok(Self { writable, code })
    }

    /// The writable view the trampoline is emitted through.
    #[inline]
    pub fn writable(&self) -> *mut ffi_closure {
        self.writable
    }

    /// The executable entry address native callers jump to.
    #[inline]
    pub fn code(&self) -> *mut c_void {
        self.code
    }

    /// Nothing to flip; the allocator pairs the mappings itself.
    #[inline]
    pub fn seal(&self) -> Result<(), FfiError> {
        Ok(())
    }
}

#[cfg(feature = "closure-alloc")]
impl Drop for ExecRegion {
    fn drop(&mut self) {
        unsafe { libffi::raw::ffi_closure_free(self.writable as *mut c_void) };
    }
}

#[cfg(not(feature = "closure-alloc"))]
pub(super) struct ExecRegion {
    page: *mut c_void,
    len: usize,
}

#[cfg(all(not(feature = "closure-alloc"), unix))]
impl ExecRegion {
    pub fn acquire() -> Result<Self, FfiError> {
        let len = core::mem::size_of::<ffi_closure>();
        let page = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANON | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };
        if page == libc::MAP_FAILED {
            return Err(FfiError::ExecMemory {
                op: "mmap",
                source: io::Error::last_os_error(),
            });
        }
        Ok(Self { page, len })
    }

    #[inline]
    pub fn writable(&self) -> *mut ffi_closure {
        self.page as *mut ffi_closure
    }

    /// Emission happens in place, so code and data share the address.
    #[inline]
    pub fn code(&self) -> *mut c_void {
        self.page
    }

    /// Flip the page to read+execute now that the trampoline is emitted.
    pub fn seal(&self) -> Result<(), FfiError> {
        let rc = unsafe { libc::mprotect(self.page, self.len, libc::PROT_READ | libc::PROT_EXEC) };
        if rc != 0 {
            return Err(FfiError::ExecMemory {
                op: "mprotect",
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

#[cfg(all(not(feature = "closure-alloc"), unix))]
impl Drop for ExecRegion {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.page, self.len) };
    }
}

#[cfg(all(not(feature = "closure-alloc"), windows))]
impl ExecRegion {
    pub fn acquire() -> Result<Self, FfiError> {
        use winapi::um::memoryapi::VirtualAlloc;
        use winapi::um::winnt::{MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};

        let len = core::mem::size_of::<ffi_closure>();
        let page = unsafe {
            VirtualAlloc(
                std::ptr::null_mut(),
                len,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };
        if page.is_null() {
            return Err(FfiError::ExecMemory {
                op: "VirtualAlloc",
                source: io::Error::last_os_error(),
            });
        }
        Ok(Self {
            page: page as *mut c_void,
            len,
        })
    }

    #[inline]
    pub fn writable(&self) -> *mut ffi_closure {
        self.page as *mut ffi_closure
    }

    #[inline]
    pub fn code(&self) -> *mut c_void {
        self.page
    }

    pub fn seal(&self) -> Result<(), FfiError> {
        use winapi::um::memoryapi::VirtualProtect;
        use winapi::um::winnt::PAGE_EXECUTE_READ;

        let mut old = 0u32;
        let ok = unsafe {
            VirtualProtect(self.page as *mut _, self.len, PAGE_EXECUTE_READ, &mut old)
        };
        if ok == 0 {
            return Err(FfiError::ExecMemory {
                op: "VirtualProtect",
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

#[cfg(all(not(feature = "closure-alloc"), windows))]
impl Drop for ExecRegion {
    fn drop(&mut self) {
        use winapi::um::memoryapi::VirtualFree;
        use winapi::um::winnt::MEM_RELEASE;

        unsafe { VirtualFree(self.page as *mut _, 0, MEM_RELEASE) };
    }
}
