//! Type registry - integer tags and their native type descriptors
//!
//! Scripts describe native signatures with small integer tags. A positive
//! tag names a signed primitive, its arithmetic negation the unsigned
//! variant of the same magnitude. `CType` is the resolved, closed form the
//! rest of the crate computes with.

mod cell;

pub use cell::RawCell;

use crate::error::FfiError;
use libffi::middle::Type;
use std::ffi::c_void;
use std::os::raw::{c_long, c_ulong};

pub const TYPE_VOID: i32 = 0;
pub const TYPE_POINTER: i32 = 1;
pub const TYPE_CHAR: i32 = 2;
pub const TYPE_SHORT: i32 = 3;
pub const TYPE_INT: i32 = 4;
pub const TYPE_LONG: i32 = 5;
pub const TYPE_LONG_LONG: i32 = 6;
pub const TYPE_FLOAT: i32 = 7;
pub const TYPE_DOUBLE: i32 = 8;

/// ABI class of a resolved type, for dispatch that only cares about the
/// register family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiCategory {
    Void,
    Integer,
    Float,
    Pointer,
}

/// Resolved native primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CType {
    Void,
    Pointer,
    SChar,
    UChar,
    SShort,
    UShort,
    SInt,
    UInt,
    SLong,
    ULong,
    SLongLong,
    ULongLong,
    Float,
    Double,
}

impl CType {
    /// Resolve an integer tag.
    ///
    /// Negation selects the unsigned variant; the sign is ignored for
    /// void, pointer and the floating types, which have no signedness.
    /// An unknown magnitude is reported with the tag as given.
    pub fn from_tag(tag: i32) -> Result<Self, FfiError> {
        let signed = tag >= 0;
        let resolved = match (tag.unsigned_abs(), signed) {
            (0, _) => Self::Void,
            (1, _) => Self::Pointer,
            (2, true) => Self::SChar,
            (2, false) => Self::UChar,
            (3, true) => Self::SShort,
            (3, false) => Self::UShort,
            (4, true) => Self::SInt,
            (4, false) => Self::UInt,
            (5, true) => Self::SLong,
            (5, false) => Self::ULong,
            (6, true) => Self::SLongLong,
            (6, false) => Self::ULongLong,
            (7, _) => Self::Float,
            (8, _) => Self::Double,
            _ => return Err(FfiError::UnknownType { tag }),
        };
        Ok(resolved)
    }

    /// The canonical tag for this type.
    #[inline]
    pub const fn tag(self) -> i32 {
        match self {
            Self::Void => TYPE_VOID,
            Self::Pointer => TYPE_POINTER,
            Self::SChar => TYPE_CHAR,
            Self::UChar => -TYPE_CHAR,
            Self::SShort => TYPE_SHORT,
            Self::UShort => -TYPE_SHORT,
            Self::SInt => TYPE_INT,
            Self::UInt => -TYPE_INT,
            Self::SLong => TYPE_LONG,
            Self::ULong => -TYPE_LONG,
            Self::SLongLong => TYPE_LONG_LONG,
            Self::ULongLong => -TYPE_LONG_LONG,
            Self::Float => TYPE_FLOAT,
            Self::Double => TYPE_DOUBLE,
        }
    }

    /// Get size of type in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::SChar | Self::UChar => 1,
            Self::SShort | Self::UShort => 2,
            Self::SInt | Self::UInt | Self::Float => 4,
            Self::SLong | Self::ULong => core::mem::size_of::<c_long>(),
            Self::SLongLong | Self::ULongLong | Self::Double => 8,
            Self::Pointer => core::mem::size_of::<*mut c_void>(),
        }
    }

    /// Get alignment requirement
    #[inline]
    pub const fn align(self) -> usize {
        self.size()
    }

    /// Check if type is integral
    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::SChar
                | Self::UChar
                | Self::SShort
                | Self::UShort
                | Self::SInt
                | Self::UInt
                | Self::SLong
                | Self::ULong
                | Self::SLongLong
                | Self::ULongLong
        )
    }

    /// Check if type is floating point
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Check whether an integral type is the signed variant.
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::SChar | Self::SShort | Self::SInt | Self::SLong | Self::SLongLong
        )
    }

    #[inline]
    pub const fn category(self) -> AbiCategory {
        match self {
            Self::Void => AbiCategory::Void,
            Self::Pointer => AbiCategory::Pointer,
            Self::Float | Self::Double => AbiCategory::Float,
            _ => AbiCategory::Integer,
        }
    }

    /// Human-readable type name for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Pointer => "pointer",
            Self::SChar => "char",
            Self::UChar => "unsigned char",
            Self::SShort => "short",
            Self::UShort => "unsigned short",
            Self::SInt => "int",
            Self::UInt => "unsigned int",
            Self::SLong => "long",
            Self::ULong => "unsigned long",
            Self::SLongLong => "long long",
            Self::ULongLong => "unsigned long long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// The libffi descriptor for this type.
    ///
    /// `long` is mapped by the platform's actual width rather than a fixed
    /// alias, so LLP64 targets get the 4-byte descriptor.
    pub fn ffi_type(self) -> Type {
        match self {
            Self::Void => Type::void(),
            Self::Pointer => Type::pointer(),
            Self::SChar => Type::i8(),
            Self::UChar => Type::u8(),
            Self::SShort => Type::i16(),
            Self::UShort => Type::u16(),
            Self::SInt => Type::i32(),
            Self::UInt => Type::u32(),
            Self::SLong => {
                if core::mem::size_of::<c_long>() == 8 {
                    Type::i64()
                } else {
                    Type::i32()
                }
            }
            Self::ULong => {
                if core::mem::size_of::<c_ulong>() == 8 {
                    Type::u64()
                } else {
                    Type::u32()
                }
            }
            Self::SLongLong => Type::i64(),
            Self::ULongLong => Type::u64(),
            Self::Float => Type::f32(),
            Self::Double => Type::f64(),
        }
    }
}
