//! Test suite for compiled interfaces and the forward invoker

use super::*;
use crate::error::FfiError;
use crate::types::{CType, TYPE_CHAR, TYPE_DOUBLE, TYPE_FLOAT, TYPE_INT, TYPE_LONG, TYPE_POINTER, TYPE_VOID};
use crate::value::{ConvertibleToAddress, Value};
use std::ffi::CString;
use std::os::raw::{c_long, c_uint};

// Test targets with C linkage
extern "C" fn add_i32(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

extern "C" fn mul_f64(a: f64, b: f64) -> f64 {
    a * b
}

extern "C" fn add_f32(a: f32, b: f32) -> f32 {
    a + b
}

extern "C" fn identity_ptr(ptr: *const std::ffi::c_void) -> *const std::ffi::c_void {
    ptr
}

extern "C" fn no_args() -> i32 {
    42
}

extern "C" fn negate_long(v: c_long) -> c_long {
    -v
}

extern "C" fn ret_uchar() -> u8 {
    255
}

extern "C" fn ret_schar() -> i8 {
    -5
}

extern "C" fn ret_uint() -> c_uint {
    0xFFFF_FFFF
}

extern "C" fn take_uchar(v: u8) -> i32 {
    v as i32
}

// ===== Interface Building Tests =====

#[test]
fn build_records_the_signature() {
    let iface = CallInterface::build(TYPE_INT, &[TYPE_DOUBLE, -TYPE_CHAR], None).unwrap();
    assert_eq!(iface.arity(), 2);
    assert_eq!(iface.return_type(), CType::SInt);
    assert_eq!(iface.arg(0), Some(CType::Double));
    assert_eq!(iface.arg(1), Some(CType::UChar));
    assert_eq!(iface.arg(2), None);
    assert_eq!(iface.abi(), DEFAULT_ABI);
}

#[test]
fn out_of_range_tags_abort_the_build() {
    match CallInterface::build(999, &[TYPE_INT], None) {
        Err(FfiError::UnknownType { tag }) => assert_eq!(tag, 999),
        other => panic!("unexpected: {:?}", other),
    }
    match CallInterface::build(TYPE_INT, &[TYPE_INT, -999], None) {
        Err(FfiError::UnknownType { tag }) => assert_eq!(tag, -999),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn void_is_rejected_in_argument_position() {
    match CallInterface::build(TYPE_INT, &[TYPE_INT, TYPE_VOID], None) {
        Err(FfiError::UnsupportedType { tag }) => assert_eq!(tag, TYPE_VOID),
        other => panic!("unexpected: {:?}", other),
    }
    // Void stays valid as a return type
    assert!(CallInterface::build(TYPE_VOID, &[TYPE_INT], None).is_ok());
}

#[test]
fn bogus_abi_is_reported_by_the_abi_compiler() {
    match CallInterface::build(TYPE_INT, &[], Some(0xFFFF)) {
        Err(FfiError::CifPrepFailed { .. }) => {}
        other => panic!("unexpected: {:?}", other),
    }
}

// ===== Forward Call Tests =====

#[test]
fn two_ints_add_up() {
    let iface = CallInterface::build(TYPE_INT, &[TYPE_INT, TYPE_INT], None).unwrap();
    let f = Function::with_name(iface, add_i32 as usize, "add_i32");
    let result = unsafe { f.call(&[Value::Int(2), Value::Int(3)]) }.unwrap();
    assert_eq!(result, Value::Int(5));
    assert_eq!(f.name(), Some("add_i32"));
}

#[test]
fn doubles_multiply() {
    let iface = CallInterface::build(TYPE_DOUBLE, &[TYPE_DOUBLE, TYPE_DOUBLE], None).unwrap();
    let f = Function::new(iface, mul_f64 as usize);
    let result = unsafe { f.call(&[Value::Float(1.5), Value::Float(4.0)]) }.unwrap();
    assert_eq!(result, Value::Float(6.0));
}

#[test]
fn floats_travel_at_single_precision() {
    let iface = CallInterface::build(TYPE_FLOAT, &[TYPE_FLOAT, TYPE_FLOAT], None).unwrap();
    let f = Function::new(iface, add_f32 as usize);
    let result = unsafe { f.call(&[Value::Float(0.5), Value::Float(0.25)]) }.unwrap();
    assert_eq!(result, Value::Float(0.75));
}

#[test]
fn zero_argument_calls_work() {
    let iface = CallInterface::build(TYPE_INT, &[], None).unwrap();
    let f = Function::new(iface, no_args as usize);
    assert_eq!(unsafe { f.call(&[]) }.unwrap(), Value::Int(42));
}

#[test]
fn platform_long_round_trips() {
    let iface = CallInterface::build(TYPE_LONG, &[TYPE_LONG], None).unwrap();
    let f = Function::new(iface, negate_long as usize);
    let result = unsafe { f.call(&[Value::Int(-123_456)]) }.unwrap();
    assert_eq!(result, Value::Int(123_456));
}

#[test]
fn nil_crosses_as_the_null_pointer() {
    let iface = CallInterface::build(TYPE_POINTER, &[TYPE_POINTER], None).unwrap();
    let f = Function::new(iface, identity_ptr as usize);
    let result = unsafe { f.call(&[Value::Nil]) }.unwrap();
    match result {
        Value::Ptr(p) => assert!(p.is_null()),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn strings_cross_as_the_address_of_their_bytes() {
    let s = CString::new("payload").unwrap();
    let expected = s.as_ptr() as usize;
    let iface = CallInterface::build(TYPE_POINTER, &[TYPE_POINTER], None).unwrap();
    let f = Function::new(iface, identity_ptr as usize);
    let result = unsafe { f.call(&[Value::Str(s)]) }.unwrap();
    match result {
        Value::Ptr(p) => assert_eq!(p.address(), expected),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn pointer_resources_cross_by_address() {
    let iface = CallInterface::build(TYPE_POINTER, &[TYPE_POINTER], None).unwrap();
    let f = Function::new(iface, identity_ptr as usize);
    let result = unsafe { f.call(&[Value::wrap_address(0xB00)]) }.unwrap();
    match result {
        Value::Ptr(p) => assert_eq!(p.address(), 0xB00),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn arity_is_checked_before_any_native_call() {
    let iface = CallInterface::build(TYPE_INT, &[TYPE_INT, TYPE_INT], None).unwrap();
    let f = Function::new(iface, add_i32 as usize);
    match unsafe { f.call(&[Value::Int(1)]) } {
        Err(FfiError::ArityMismatch { got, want }) => {
            assert_eq!(got, 1);
            assert_eq!(want, 2);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn bad_argument_values_fail_during_marshalling() {
    let iface = CallInterface::build(TYPE_INT, &[TYPE_INT], None).unwrap();
    let f = Function::new(iface, no_args as usize);
    assert!(matches!(
        unsafe { f.call(&[Value::Nil]) },
        Err(FfiError::ValueConversion { .. })
    ));
}

// ===== Return Widening Tests =====

#[test]
fn unsigned_char_returns_read_unsigned() {
    let iface = CallInterface::build(-TYPE_CHAR, &[], None).unwrap();
    let f = Function::new(iface, ret_uchar as usize);
    assert_eq!(unsafe { f.call(&[]) }.unwrap(), Value::Int(255));
}

#[test]
fn signed_char_returns_keep_their_sign() {
    let iface = CallInterface::build(TYPE_CHAR, &[], None).unwrap();
    let f = Function::new(iface, ret_schar as usize);
    assert_eq!(unsafe { f.call(&[]) }.unwrap(), Value::Int(-5));
}

#[test]
fn unsigned_int_returns_do_not_sign_extend() {
    let iface = CallInterface::build(-TYPE_INT, &[], None).unwrap();
    let f = Function::new(iface, ret_uint as usize);
    assert_eq!(unsafe { f.call(&[]) }.unwrap(), Value::Int(0xFFFF_FFFF));
}

#[test]
fn unsigned_char_arguments_narrow_by_truncation() {
    let iface = CallInterface::build(TYPE_INT, &[-TYPE_CHAR], None).unwrap();
    let f = Function::new(iface, take_uchar as usize);
    // 0x1FF truncates to 0xFF at the argument boundary
    assert_eq!(unsafe { f.call(&[Value::Int(0x1FF)]) }.unwrap(), Value::Int(0xFF));
}

// ===== Binding Tests =====

#[test]
fn functions_expose_their_bound_address() {
    let iface = CallInterface::build(TYPE_INT, &[], None).unwrap();
    let f = Function::new(iface, no_args as usize);
    assert_eq!(f.address(), no_args as usize);
    assert_eq!(f.to_address(), no_args as usize);
    assert_eq!(f.to_pointer().address(), no_args as usize);
    assert_eq!(f.arity(), 0);
}

// ===== Last Error Tests =====

#[cfg(target_os = "linux")]
extern "C" fn poke_errno() -> i32 {
    unsafe { *libc::__errno_location() = 42 };
    7
}

#[test]
#[cfg(target_os = "linux")]
fn forward_calls_capture_errno() {
    let iface = CallInterface::build(TYPE_INT, &[], None).unwrap();
    let f = Function::new(iface, poke_errno as usize);
    // The slot is process-wide; a concurrent test's call can interleave
    // between our call and the read, so sample until we observe our own.
    let mut seen = false;
    for _ in 0..64 {
        assert_eq!(unsafe { f.call(&[]) }.unwrap(), Value::Int(7));
        if last_error() == 42 {
            seen = true;
            break;
        }
    }
    assert!(seen, "errno from the call never surfaced in the slot");
}

#[test]
fn the_error_slot_is_writable_from_the_host() {
    let mut seen = false;
    for _ in 0..64 {
        set_last_error(1234);
        if last_error() == 1234 {
            seen = true;
            break;
        }
    }
    assert!(seen);
}
