//! Typthon FFI - dynamic foreign-call layer for embedded scripts
//!
//! This crate provides the marshalling support scripts use to load
//! native libraries, describe signatures with small integer type tags,
//! invoke native functions, and register native-callable closures
//! backed by host callables.

#![allow(dead_code)]

pub mod error;
pub mod logging;
pub mod types;
pub mod value;
pub mod marshal;
pub mod call;
pub mod closure;
pub mod library;
pub mod memory;

// Re-export the script-facing surface
pub use call::{last_error, set_last_error, Abi, CallInterface, Function, DEFAULT_ABI};
pub use closure::{Closure, HostCallable};
pub use error::FfiError;
pub use library::LibraryHandle;
pub use memory::{
    allocate, allocate_zeroed, memory_report, reallocate, release, FreeFn, MemoryReport,
    MemoryReportEntry, Pointer,
};
pub use types::{
    AbiCategory, CType, RawCell, TYPE_CHAR, TYPE_DOUBLE, TYPE_FLOAT, TYPE_INT, TYPE_LONG,
    TYPE_LONG_LONG, TYPE_POINTER, TYPE_SHORT, TYPE_VOID,
};
pub use value::{ConvertibleToAddress, Value};

#[cfg(all(windows, target_arch = "x86"))]
pub use call::STDCALL_ABI;

#[cfg(unix)]
pub use library::{RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

/// FFI layer initialization
pub fn init() {
    logging::init_ffi_logging();
    logging::log_ffi_init();
}

/// C-linkage initialization for embedders
#[no_mangle]
pub extern "C" fn typthon_ffi_init() {
    init();
}
