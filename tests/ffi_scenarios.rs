//! End-to-end scenarios through the public surface.

use std::ffi::c_void;
use typthon_ffi::{
    CallInterface, Closure, FfiError, Function, LibraryHandle, Pointer, Value, TYPE_DOUBLE,
    TYPE_INT, TYPE_POINTER, TYPE_VOID,
};

extern "C" fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

extern "C" fn is_null(ptr: *const c_void) -> i32 {
    ptr.is_null() as i32
}

#[test]
fn test_forward_call_add() {
    typthon_ffi::init();

    let interface = CallInterface::build(TYPE_INT, &[TYPE_INT, TYPE_INT], None).unwrap();
    let function = Function::with_name(interface, add as usize, "add");
    let sum = unsafe { function.call(&[Value::Int(2), Value::Int(3)]) }.unwrap();
    assert_eq!(sum, Value::Int(5));
}

#[cfg(target_os = "linux")]
#[test]
fn test_sqrt_through_libm() {
    let lib = LibraryHandle::open(Some("libm.so.6"), None).unwrap();
    let interface = CallInterface::build(TYPE_DOUBLE, &[TYPE_DOUBLE], None).unwrap();
    let sqrt = Function::with_name(interface, lib.resolve("sqrt").unwrap(), "sqrt");
    let root = unsafe { sqrt.call(&[Value::Float(9.0)]) }.unwrap();
    assert_eq!(root, Value::Float(3.0));
}

#[test]
fn test_zero_arg_closure_returns_ten() {
    let closure = Closure::new(TYPE_INT, &[], None, |_| Value::Int(10)).unwrap();

    // The trampoline address is an ordinary call target.
    let interface = CallInterface::build(TYPE_INT, &[], None).unwrap();
    let function = Function::new(interface, closure.code_address().unwrap());
    let out = unsafe { function.call(&[]) }.unwrap();
    assert_eq!(out, Value::Int(10));
}

#[test]
fn test_nil_crosses_as_null() {
    let interface = CallInterface::build(TYPE_INT, &[TYPE_POINTER], None).unwrap();
    let function = Function::new(interface, is_null as usize);
    assert_eq!(unsafe { function.call(&[Value::Nil]) }.unwrap(), Value::Int(1));

    let data = 5u8;
    let view = Value::Ptr(Pointer::new(&data as *const u8 as usize, 1, None));
    assert_eq!(unsafe { function.call(&[view]) }.unwrap(), Value::Int(0));
}

#[test]
fn test_unknown_tag_fails_before_any_native_resource() {
    assert!(matches!(
        CallInterface::build(999, &[], None),
        Err(FfiError::UnknownType { tag: 999 })
    ));
    assert!(matches!(
        CallInterface::build(TYPE_INT, &[999], None),
        Err(FfiError::UnknownType { tag: 999 })
    ));

    let err = Closure::new(TYPE_INT, &[999], None, |_| Value::Nil).unwrap_err();
    assert!(matches!(err, FfiError::UnknownType { tag: 999 }));
}

#[test]
fn test_void_arguments_are_rejected() {
    assert!(matches!(
        CallInterface::build(TYPE_INT, &[TYPE_VOID], None),
        Err(FfiError::UnsupportedType { tag: TYPE_VOID })
    ));
}

#[test]
fn test_arity_mismatch_diagnostic() {
    let interface = CallInterface::build(TYPE_INT, &[TYPE_INT, TYPE_INT], None).unwrap();
    let function = Function::new(interface, add as usize);
    let err = unsafe { function.call(&[Value::Int(2)]) }.unwrap_err();
    assert_eq!(err.to_string(), "wrong number of arguments (1 for 2)");
}

#[test]
fn test_idempotent_close_diagnostic() {
    let mut lib = LibraryHandle::open(None, None).unwrap();
    lib.close().unwrap();
    let err = lib.close().unwrap_err();
    assert_eq!(err.to_string(), "dlclose() called too many times");
}

#[test]
fn test_closure_reinitialization_swaps_behavior() {
    let mut closure = Closure::new(TYPE_INT, &[], None, |_| Value::Int(10)).unwrap();
    closure
        .initialize(TYPE_INT, &[TYPE_INT], None, |args| {
            Value::Int(args[0].as_int().unwrap_or(0) * 2)
        })
        .unwrap();

    let interface = CallInterface::build(TYPE_INT, &[TYPE_INT], None).unwrap();
    let function = Function::new(interface, closure.code_address().unwrap());
    assert_eq!(
        unsafe { function.call(&[Value::Int(21)]) }.unwrap(),
        Value::Int(42)
    );
}

#[test]
fn test_allocation_passthroughs_round_trip() {
    let addr = typthon_ffi::allocate(16).unwrap();
    assert_ne!(addr, 0);

    let p = Pointer::new(addr, 16, None);
    unsafe {
        p.write_bytes(0, b"abc").unwrap();
        assert_eq!(p.read_bytes(0, 3).unwrap(), b"abc");
        typthon_ffi::release(addr);
    }
}
