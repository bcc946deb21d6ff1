use criterion::{black_box, criterion_group, criterion_main, Criterion};
use typthon_ffi::{CallInterface, Closure, Function, Value, TYPE_INT};

extern "C" fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

fn bench_interface_build(c: &mut Criterion) {
    c.bench_function("build_two_int_interface", |b| {
        b.iter(|| CallInterface::build(TYPE_INT, black_box(&[TYPE_INT, TYPE_INT]), None).unwrap());
    });
}

fn bench_forward_call(c: &mut Criterion) {
    let interface = CallInterface::build(TYPE_INT, &[TYPE_INT, TYPE_INT], None).unwrap();
    let function = Function::new(interface, add as usize);
    let args = [Value::Int(2), Value::Int(3)];
    c.bench_function("forward_call_add", |b| {
        b.iter(|| unsafe { function.call(black_box(&args)).unwrap() });
    });
}

fn bench_closure_dispatch(c: &mut Criterion) {
    let closure = Closure::new(TYPE_INT, &[TYPE_INT], None, |args| {
        Value::Int(args[0].as_int().unwrap_or(0) + 1)
    })
    .unwrap();
    let entry: extern "C" fn(i32) -> i32 =
        unsafe { std::mem::transmute(closure.code_address().unwrap()) };
    c.bench_function("closure_dispatch", |b| {
        b.iter(|| entry(black_box(41)));
    });
}

criterion_group!(
    benches,
    bench_interface_build,
    bench_forward_call,
    bench_closure_dispatch
);
criterion_main!(benches);
