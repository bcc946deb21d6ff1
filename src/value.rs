//! Host value boundary - the dynamically typed currency crossing the FFI
//!
//! Design: a closed enum stands in for the host runtime's dynamic values.
//! Numeric coercions are permissive the way the embedding interpreter is
//! (integers accept floats by truncation and vice versa); everything else
//! is a conversion error naming both sides. Objects that can stand in for
//! a native address implement [`ConvertibleToAddress`].

use crate::error::FfiError;
use crate::memory::Pointer;
use std::ffi::CString;

/// A host value at the FFI boundary.
#[derive(Debug, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Float(f64),
    Str(CString),
    Ptr(Pointer),
}

impl Value {
    /// Wrap a raw address as a pointer resource with unknown size.
    #[inline]
    pub fn wrap_address(addr: usize) -> Self {
        Self::Ptr(Pointer::new(addr, 0, None))
    }

    /// Type name for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Ptr(_) => "pointer",
        }
    }

    #[inline]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Coerce to a host integer. Floats truncate.
    pub fn as_int(&self) -> Result<i64, FfiError> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::Float(f) => Ok(*f as i64),
            other => Err(FfiError::ValueConversion {
                expected: "integer",
                got: other.type_name(),
            }),
        }
    }

    /// Coerce to a host float. Integers widen.
    pub fn as_float(&self) -> Result<f64, FfiError> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            other => Err(FfiError::ValueConversion {
                expected: "float",
                got: other.type_name(),
            }),
        }
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<CString> for Value {
    #[inline]
    fn from(v: CString) -> Self {
        Self::Str(v)
    }
}

impl From<Pointer> for Value {
    #[inline]
    fn from(v: Pointer) -> Self {
        Self::Ptr(v)
    }
}

/// Capability of standing in for a native address.
///
/// Replaces duck-typed probing: anything that can be passed where a
/// pointer is expected says so by implementing this trait.
pub trait ConvertibleToAddress {
    fn to_address(&self) -> usize;
}

impl ConvertibleToAddress for Pointer {
    #[inline]
    fn to_address(&self) -> usize {
        self.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_and_floats_coerce_both_ways() {
        assert_eq!(Value::Int(7).as_int().unwrap(), 7);
        assert_eq!(Value::Float(3.9).as_int().unwrap(), 3);
        assert_eq!(Value::Int(2).as_float().unwrap(), 2.0);
        assert_eq!(Value::Float(2.5).as_float().unwrap(), 2.5);
    }

    #[test]
    fn nil_does_not_coerce_to_numbers() {
        match Value::Nil.as_int() {
            Err(FfiError::ValueConversion { expected, got }) => {
                assert_eq!(expected, "integer");
                assert_eq!(got, "nil");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(Value::Nil.as_float().is_err());
    }

    #[test]
    fn strings_do_not_coerce_to_numbers() {
        let s = Value::Str(CString::new("12").unwrap());
        assert!(s.as_int().is_err());
        assert!(s.as_float().is_err());
    }

    #[test]
    fn wrap_address_produces_a_sizeless_pointer() {
        match Value::wrap_address(0x1000) {
            Value::Ptr(p) => {
                assert_eq!(p.address(), 0x1000);
                assert_eq!(p.size(), 0);
                assert!(p.free_fn().is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn pointer_values_convert_to_their_address() {
        let p = Pointer::new(0x42, 0, None);
        assert_eq!(p.to_address(), 0x42);
    }
}
