//! Value marshaller - host values to native cells and back
//!
//! Design: the exhaustive matches here are the single source of truth for
//! how each type crosses the boundary. Argument slots hold exact-width
//! values; return slots follow the ABI's widening of sub-word integers, so
//! they have their own pair of conversions (`from_return`, `write_return`).


use crate::error::FfiError;
use crate::memory::Pointer;
use crate::types::{CType, RawCell};
use crate::value::Value;
use libffi::raw::{ffi_arg, ffi_sarg};
use std::ffi::c_void;
use std::os::raw::{c_long, c_ulong};

/// Marshal a host value into an argument cell for `ty`.
///
/// Integer conversions truncate like a C cast; the pointer case accepts
/// nil (null), pointer resources, strings (address of their bytes) and
/// raw integer addresses. Void performs no conversion and exists only to
/// prime forward-call return slots.
pub fn to_native(ty: CType, value: &Value) -> Result<RawCell, FfiError> {
    let cell = match ty {
        CType::Void => RawCell::zeroed(),
        CType::Pointer => RawCell {
            ptr: Pointer::from_value(value)?.address() as *mut c_void,
        },
        CType::SChar => RawCell {
            i8: value.as_int()? as i8,
        },
        CType::UChar => RawCell {
            u8: value.as_int()? as u8,
        },
        CType::SShort => RawCell {
            i16: value.as_int()? as i16,
        },
        CType::UShort => RawCell {
            u16: value.as_int()? as u16,
        },
        CType::SInt => RawCell {
            i32: value.as_int()? as i32,
        },
        CType::UInt => RawCell {
            u32: value.as_int()? as u32,
        },
        CType::SLong => RawCell {
            slong: value.as_int()? as c_long,
        },
        CType::ULong => RawCell {
            ulong: value.as_int()? as c_ulong,
        },
        CType::SLongLong => RawCell {
            i64: value.as_int()?,
        },
        CType::ULongLong => RawCell {
            u64: value.as_int()? as u64,
        },
        CType::Float => RawCell {
            f32: value.as_float()? as f32,
        },
        CType::Double => RawCell {
            f64: value.as_float()?,
        },
    };
    Ok(cell)
}

/// Demarshal an exact-width argument cell back into a host value.
///
/// Infallible: the type is already resolved and every native value has a
/// host representation. Unsigned 64-bit values wrap into the host's
/// signed integer.
pub fn from_native(ty: CType, cell: &RawCell) -> Value {
    unsafe {
        match ty {
            CType::Void => Value::Nil,
            CType::Pointer => Value::Ptr(Pointer::new(cell.ptr as usize, 0, None)),
            CType::SChar => Value::Int(cell.i8 as i64),
            CType::UChar => Value::Int(cell.u8 as i64),
            CType::SShort => Value::Int(cell.i16 as i64),
            CType::UShort => Value::Int(cell.u16 as i64),
            CType::SInt => Value::Int(cell.i32 as i64),
            CType::UInt => Value::Int(cell.u32 as i64),
            CType::SLong => Value::Int(cell.slong as i64),
            CType::ULong => Value::Int(cell.ulong as i64),
            CType::SLongLong => Value::Int(cell.i64),
            CType::ULongLong => Value::Int(cell.u64 as i64),
            CType::Float => Value::Float(cell.f32 as f64),
            CType::Double => Value::Float(cell.f64),
        }
    }
}

/// Demarshal a forward-call return cell.
///
/// Integral results narrower than a machine word come back widened, so
/// they are read through the widened fields and narrowed at their
/// declared signedness before conversion.
pub fn from_return(ty: CType, cell: &RawCell) -> Value {
    unsafe {
        match ty {
            CType::Void => Value::Nil,
            CType::Pointer => Value::Ptr(Pointer::new(cell.ptr as usize, 0, None)),
            CType::SChar => Value::Int((cell.sarg as i8) as i64),
            CType::UChar => Value::Int((cell.uarg as u8) as i64),
            CType::SShort => Value::Int((cell.sarg as i16) as i64),
            CType::UShort => Value::Int((cell.uarg as u16) as i64),
            CType::SInt => Value::Int((cell.sarg as i32) as i64),
            CType::UInt => Value::Int((cell.uarg as u32) as i64),
            CType::SLong => Value::Int(cell.slong as i64),
            CType::ULong => Value::Int(cell.ulong as i64),
            CType::SLongLong => Value::Int(cell.i64),
            CType::ULongLong => Value::Int(cell.u64 as i64),
            CType::Float => Value::Float(cell.f32 as f64),
            CType::Double => Value::Float(cell.f64),
        }
    }
}

/// Marshal a host value into a closure return slot.
///
/// The mirror of [`from_return`]: sub-word integers are written widened
/// to a machine word at their declared signedness, everything else at its
/// exact width.
///
/// # Safety
/// `slot` must point at writable return storage for `ty` as provided by
/// the trampoline machinery.
pub unsafe fn write_return(ty: CType, value: &Value, slot: *mut c_void) -> Result<(), FfiError> {
    match ty {
        CType::Void => {}
        CType::SLong => *(slot as *mut c_long) = value.as_int()? as c_long,
        CType::ULong => *(slot as *mut c_ulong) = value.as_int()? as c_ulong,
        CType::SChar | CType::SShort | CType::SInt => {
            *(slot as *mut ffi_sarg) = value.as_int()? as ffi_sarg;
        }
        CType::UChar | CType::UShort | CType::UInt => {
            *(slot as *mut ffi_arg) = value.as_int()? as u64 as ffi_arg;
        }
        CType::SLongLong => *(slot as *mut i64) = value.as_int()?,
        CType::ULongLong => *(slot as *mut u64) = value.as_int()? as u64,
        CType::Float => *(slot as *mut f32) = value.as_float()? as f32,
        CType::Double => *(slot as *mut f64) = value.as_float()?,
        CType::Pointer => {
            *(slot as *mut *mut c_void) = Pointer::from_value(value)?.address() as *mut c_void;
        }
    }
    Ok(())
}

/// Copy one incoming closure argument slot into a cell at `ty`'s width.
///
/// # Safety
/// `slot` must point at readable argument storage of (at least) `ty`'s
/// size, as handed to a trampoline by the ABI machinery.
pub unsafe fn read_slot(ty: CType, slot: *const c_void) -> RawCell {
    match ty {
        CType::Void => RawCell::zeroed(),
        CType::Pointer => RawCell {
            ptr: *(slot as *const *mut c_void),
        },
        CType::SChar => RawCell {
            i8: *(slot as *const i8),
        },
        CType::UChar => RawCell {
            u8: *(slot as *const u8),
        },
        CType::SShort => RawCell {
            i16: *(slot as *const i16),
        },
        CType::UShort => RawCell {
            u16: *(slot as *const u16),
        },
        CType::SInt => RawCell {
            i32: *(slot as *const i32),
        },
        CType::UInt => RawCell {
            u32: *(slot as *const u32),
        },
        CType::SLong => RawCell {
            slong: *(slot as *const c_long),
        },
        CType::ULong => RawCell {
            ulong: *(slot as *const c_ulong),
        },
        CType::SLongLong => RawCell {
            i64: *(slot as *const i64),
        },
        CType::ULongLong => RawCell {
            u64: *(slot as *const u64),
        },
        CType::Float => RawCell {
            f32: *(slot as *const f32),
        },
        CType::Double => RawCell {
            f64: *(slot as *const f64),
        },
    }
}
