//! Error taxonomy for the FFI layer
//!
//! One closed enum covers every failure the type registry, marshaller,
//! call, closure, library and memory paths can raise. Variants carry the
//! data a host runtime needs to build its own diagnostics.

use std::io;

/// FFI layer errors.
#[derive(Debug)]
pub enum FfiError {
    /// Type tag magnitude matches no known primitive.
    UnknownType { tag: i32 },
    /// Known tag used in a role it does not support (e.g. void as an
    /// argument type).
    UnsupportedType { tag: i32 },
    CifPrepFailed { status: u32 },
    ArityMismatch { got: usize, want: usize },
    ClosurePrepFailed { status: u32 },
    /// Executable-memory acquisition or protection change failed.
    ExecMemory { op: &'static str, source: io::Error },
    /// Library open/close/resolve failure, loader diagnostic verbatim.
    LibraryError { message: String },
    DoubleClose,
    NullDereference,
    OutOfBounds { offset: isize, len: usize, size: isize },
    ValueConversion { expected: &'static str, got: &'static str },
    AllocationFailed,
}

impl core::fmt::Display for FfiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownType { tag } => write!(f, "unknown type {}", tag),
            Self::UnsupportedType { tag } => write!(f, "unsupported type {}", tag),
            Self::CifPrepFailed { status } => {
                write!(f, "error creating CIF (status {})", status)
            }
            Self::ArityMismatch { got, want } => {
                write!(f, "wrong number of arguments ({} for {})", got, want)
            }
            Self::ClosurePrepFailed { status } => {
                write!(f, "error prepping closure (status {})", status)
            }
            Self::ExecMemory { op, source } => write!(f, "{} failed: {}", op, source),
            Self::LibraryError { message } => write!(f, "{}", message),
            Self::DoubleClose => write!(f, "dlclose() called too many times"),
            Self::NullDereference => write!(f, "NULL pointer dereference"),
            Self::OutOfBounds { offset, len, size } => write!(
                f,
                "out-of-bounds pointer access (offset {}, len {}, size {})",
                offset, len, size
            ),
            Self::ValueConversion { expected, got } => {
                write!(f, "cannot convert {} to {}", got, expected)
            }
            Self::AllocationFailed => write!(f, "native allocation failed"),
        }
    }
}

impl std::error::Error for FfiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ExecMemory { source, .. } => Some(source),
            _ => None,
        }
    }
}
