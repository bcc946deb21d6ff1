//! Logging utilities for the Typthon FFI layer
//!
//! Provides lightweight logging for foreign calls, closure dispatch, library
//! loading and native memory traffic. Uses `tracing` for structured logging
//! with minimal overhead.

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

/// Initialize FFI logging with sensible defaults
///
/// This should be called early, before the first foreign call.
/// For production builds, logs at INFO level and above are enabled.
/// For debug builds, DEBUG and TRACE levels are also enabled.
pub fn init_ffi_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            EnvFilter::new("typthon_ffi=debug")
        }
        #[cfg(not(debug_assertions))]
        {
            EnvFilter::new("typthon_ffi=info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

/// Initialize FFI logging into a rolling JSON log file
///
/// Returns the worker guard; dropping it flushes and stops the background
/// writer, so callers must keep it alive for the life of the process.
pub fn init_ffi_logging_to_file(
    directory: &str,
    prefix: &str,
) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let appender = tracing_appender::rolling::daily(directory, prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("typthon_ffi=debug"));

    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .json()
        .try_init()
        .ok();

    guard
}

/// Log a forward call about to enter native code
#[inline]
pub fn log_forward_call(function_name: &str, args_count: usize) {
    trace!(
        target: "call",
        function = function_name,
        args_count,
        "foreign call"
    );
}

/// Log a forward call returning, with the captured last-error code
#[inline]
pub fn log_forward_return(function_name: &str, last_error: i32) {
    trace!(
        target: "call",
        function = function_name,
        last_error,
        "foreign return"
    );
}

/// Log a prepared closure trampoline
#[inline]
pub fn log_closure_prepared(code_address: usize, args_count: usize) {
    debug!(
        target: "closure",
        code_address = format_args!("{:#x}", code_address),
        args_count,
        "closure prepared"
    );
}

/// Log native code entering a closure trampoline
#[inline]
pub fn log_closure_entry(args_count: usize) {
    trace!(
        target: "closure",
        args_count,
        "closure invoked"
    );
}

/// Log a closure callable failure contained at the trampoline boundary
#[inline]
pub fn log_closure_error(context: &str, error: &str) {
    error!(
        target: "closure",
        context,
        error,
        "closure error"
    );
}

/// Log a library open
#[inline]
pub fn log_library_open(name: &str) {
    debug!(
        target: "library",
        name,
        "library opened"
    );
}

/// Log a library close
#[inline]
pub fn log_library_close(name: &str) {
    debug!(
        target: "library",
        name,
        "library closed"
    );
}

/// Log a resolved symbol
#[inline]
pub fn log_symbol_resolved(symbol: &str, address: usize) {
    trace!(
        target: "library",
        symbol,
        address = format_args!("{:#x}", address),
        "symbol resolved"
    );
}

/// Log a CRT allocation
#[inline]
pub fn log_allocation(op: &'static str, size: usize, address: usize) {
    trace!(
        target: "memory",
        op,
        size,
        address = format_args!("{:#x}", address),
        "native allocation"
    );
}

/// Log a CRT release
#[inline]
pub fn log_release(address: usize) {
    trace!(
        target: "memory",
        address = format_args!("{:#x}", address),
        "native release"
    );
}

/// Log one live allocation from a memory report
#[inline]
pub fn log_leaked_allocation(address: usize, size: usize, op: &'static str) {
    warn!(
        target: "memory",
        address = format_args!("{:#x}", address),
        size,
        op,
        "leaked allocation"
    );
}

/// Log FFI layer initialization
#[inline]
pub fn log_ffi_init() {
    info!(target: "ffi", "Typthon FFI initialized");
}
