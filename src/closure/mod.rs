//! Reverse invoker - native-callable trampolines over host callables
//!
//! Design: a registration owns its compiled interface, its callable state
//! and its executable region as one unit, so teardown in any order of
//! events releases everything exactly once. Re-initializing tears the
//! previous generation down first; a failed rebuild leaves the
//! registration unprepared but safely destroyable. A string return
//! crosses as the address of its bytes; the backing buffer stays live
//! until the next invocation or teardown.
//!
//! The host side is single-threaded: native code invokes a trampoline on
//! the thread that is driving the runtime, never concurrently with host
//! access to the same registration.

mod exec;


use crate::call::{Abi, CallInterface};
use crate::error::FfiError;
use crate::logging::{log_closure_entry, log_closure_error, log_closure_prepared};
use crate::marshal;
use crate::memory::Pointer;
use crate::types::{AbiCategory, CType};
use crate::value::{ConvertibleToAddress, Value};
use exec::ExecRegion;
use libffi::raw::{ffi_cif, ffi_prep_closure_loc};
use std::ffi::{c_void, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The host side of a registration.
pub type HostCallable = Box<dyn FnMut(&[Value]) -> Value>;

struct ClosureState {
    ret: CType,
    args: Vec<CType>,
    callable: HostCallable,
    // Backing bytes of the most recent string return, released on the
    // next invocation or at teardown.
    retained: Option<CString>,
}

/// One prepared generation: interface, callable state and trampoline.
struct Trampoline {
    interface: CallInterface,
    // Boxed so the address handed to the trampoline stays stable.
    state: Box<ClosureState>,
    region: ExecRegion,
}

impl Trampoline {
    fn build(
        return_tag: i32,
        arg_tags: &[i32],
        abi: Option<Abi>,
        callable: HostCallable,
    ) -> Result<Self, FfiError> {
        let interface = CallInterface::build(return_tag, arg_tags, abi)?;
        let mut state = Box::new(ClosureState {
            ret: interface.return_type(),
            args: interface.args().to_vec(),
            callable,
            retained: None,
        });
        let region = ExecRegion::acquire()?;
        let status = unsafe {
            ffi_prep_closure_loc(
                region.writable(),
                interface.cif_ptr(),
                Some(closure_entry),
                state.as_mut() as *mut ClosureState as *mut c_void,
                region.code(),
            )
        };
        if status != libffi::raw::ffi_status_FFI_OK {
            return Err(FfiError::ClosurePrepFailed { status });
        }
        region.seal()?;
        log_closure_prepared(region.code() as usize, interface.arity());
        Ok(Self {
            interface,
            state,
            region,
        })
    }
}

/// A native-callable closure backed by a host callable.
pub struct Closure {
    tramp: Option<Trampoline>,
}

impl Closure {
    /// Register a callable under a native signature.
    ///
    /// The signature is compiled exactly as for a forward call, with the
    /// same tag resolution and the same rejection of void arguments.
    pub fn new<F>(
        return_tag: i32,
        arg_tags: &[i32],
        abi: Option<Abi>,
        callable: F,
    ) -> Result<Self, FfiError>
    where
        F: FnMut(&[Value]) -> Value + 'static,
    {
        let tramp = Trampoline::build(return_tag, arg_tags, abi, Box::new(callable))?;
        Ok(Self { tramp: Some(tramp) })
    }

    /// Rebuild the registration under a new signature and callable.
    ///
    /// The previous generation is fully released before the new one is
    /// built. On failure the registration is left unprepared; its
    /// addresses go away and it reports no trampoline.
    pub fn initialize<F>(
        &mut self,
        return_tag: i32,
        arg_tags: &[i32],
        abi: Option<Abi>,
        callable: F,
    ) -> Result<(), FfiError>
    where
        F: FnMut(&[Value]) -> Value + 'static,
    {
        self.tramp = None;
        self.tramp = Some(Trampoline::build(return_tag, arg_tags, abi, Box::new(callable))?);
        Ok(())
    }

    /// Whether a trampoline is currently live.
    #[inline]
    pub fn prepared(&self) -> bool {
        self.tramp.is_some()
    }

    /// The executable entry address native callers jump to.
    #[inline]
    pub fn code_address(&self) -> Option<usize> {
        self.tramp.as_ref().map(|t| t.region.code() as usize)
    }

    /// The registration data address the trampoline dereferences.
    #[inline]
    pub fn data_address(&self) -> Option<usize> {
        self.tramp
            .as_ref()
            .map(|t| t.state.as_ref() as *const ClosureState as usize)
    }

    /// Declared arity of the current generation.
    #[inline]
    pub fn arity(&self) -> Option<usize> {
        self.tramp.as_ref().map(|t| t.interface.arity())
    }

    /// The entry address as a pointer resource (null when unprepared).
    pub fn to_pointer(&self) -> Pointer {
        Pointer::new(self.code_address().unwrap_or(0), 0, None)
    }
}

impl ConvertibleToAddress for Closure {
    #[inline]
    fn to_address(&self) -> usize {
        self.code_address().unwrap_or(0)
    }
}

impl core::fmt::Debug for Closure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.tramp {
            Some(t) => write!(
                f,
                "Closure {{ code: {:#x}, arity: {} }}",
                t.region.code() as usize,
                t.interface.arity()
            ),
            None => write!(f, "Closure {{ unprepared }}"),
        }
    }
}

/// A value that writes as all-zero bits for `ty`'s return convention.
fn neutral_value(ty: CType) -> Value {
    match ty.category() {
        AbiCategory::Float => Value::Float(0.0),
        AbiCategory::Integer => Value::Int(0),
        AbiCategory::Pointer | AbiCategory::Void => Value::Nil,
    }
}

// Shared entry for every trampoline. Demarshals the incoming slots, runs
// the callable, writes the return slot. Panics and conversion failures
// are contained here: they are logged, the return slot is zeroed, and
// the trampoline returns normally so native code never sees an unwind.
unsafe extern "C" fn closure_entry(
    _cif: *mut ffi_cif,
    result: *mut c_void,
    argv: *mut *mut c_void,
    userdata: *mut c_void,
) {
    let state = &mut *(userdata as *mut ClosureState);
    log_closure_entry(state.args.len());

    let ret = state.ret;
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut params = Vec::with_capacity(state.args.len());
        for (i, &ty) in state.args.iter().enumerate() {
            let cell = marshal::read_slot(ty, *argv.add(i) as *const c_void);
            params.push(marshal::from_native(ty, &cell));
        }
        let value = (state.callable)(&params);
        marshal::write_return(ret, &value, result)?;
        // A string return crossed as the address of its bytes, which
        // must stay readable after the trampoline returns.
        state.retained = match value {
            Value::Str(s) => Some(s),
            _ => None,
        };
        Ok::<(), FfiError>(())
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            log_closure_error("retval", &err.to_string());
            let _ = marshal::write_return(ret, &neutral_value(ret), result);
        }
        Err(_) => {
            log_closure_error("callable", "panicked");
            let _ = marshal::write_return(ret, &neutral_value(ret), result);
        }
    }
}
