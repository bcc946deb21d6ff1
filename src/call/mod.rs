//! Call interface builder - signatures compiled into calling-convention plans
//!
//! Design: tags are resolved up front, so nothing native is touched for a
//! signature that can never work. The prepared plan owns its descriptor
//! array (argument count plus a trailing null sentinel) and the CIF it
//! was compiled into, at stable heap addresses.

mod function;

#[cfg(test)]
mod tests;

pub use function::{last_error, set_last_error, Function};

use crate::error::FfiError;
use crate::types::{CType, TYPE_VOID};
use libffi::middle::Type;
use libffi::raw::{ffi_abi, ffi_cif, ffi_prep_cif, ffi_type};
use std::os::raw::c_uint;

/// Calling convention identifier, passed to the ABI compiler verbatim.
pub type Abi = ffi_abi;

/// The platform's default calling convention.
pub const DEFAULT_ABI: Abi = libffi::raw::ffi_abi_FFI_DEFAULT_ABI;

/// The stdcall convention, on the targets that define it.
#[cfg(all(windows, target_arch = "x86"))]
pub const STDCALL_ABI: Abi = libffi::raw::ffi_abi_FFI_STDCALL;

/// A compiled calling-convention plan for one native signature.
#[derive(Debug)]
pub struct CallInterface {
    cif: Box<ffi_cif>,
    ret: CType,
    args: Vec<CType>,
    abi: Abi,
    // The CIF holds raw pointers into these; they must live (at stable
    // addresses) as long as the CIF does.
    ret_type: Type,
    arg_types: Vec<Type>,
    type_array: Box<[*mut ffi_type]>,
}

impl CallInterface {
    /// Compile a signature from integer tags.
    ///
    /// Every tag is resolved before the ABI compiler runs; the first
    /// unknown tag aborts the build with nothing allocated natively. Void
    /// is a return type only and is rejected in argument position.
    pub fn build(
        return_tag: i32,
        arg_tags: &[i32],
        abi: Option<Abi>,
    ) -> Result<Self, FfiError> {
        let ret = CType::from_tag(return_tag)?;
        let args = arg_tags
            .iter()
            .map(|&tag| CType::from_tag(tag))
            .collect::<Result<Vec<_>, _>>()?;
        if args.contains(&CType::Void) {
            return Err(FfiError::UnsupportedType { tag: TYPE_VOID });
        }
        let abi = abi.unwrap_or(DEFAULT_ABI);

        let ret_type = ret.ffi_type();
        let arg_types: Vec<Type> = args.iter().map(|ty| ty.ffi_type()).collect();
        let mut type_array: Vec<*mut ffi_type> = Vec::with_capacity(arg_types.len() + 1);
        type_array.extend(arg_types.iter().map(|ty| ty.as_raw_ptr()));
        type_array.push(std::ptr::null_mut());
        let mut type_array = type_array.into_boxed_slice();

        let mut cif: Box<ffi_cif> = Box::new(Default::default());
        let status = unsafe {
            ffi_prep_cif(
                cif.as_mut(),
                abi,
                args.len() as c_uint,
                ret_type.as_raw_ptr(),
                type_array.as_mut_ptr(),
            )
        };
        if status != libffi::raw::ffi_status_FFI_OK {
            return Err(FfiError::CifPrepFailed { status });
        }

        Ok(Self {
            cif,
            ret,
            args,
            abi,
            ret_type,
            arg_types,
            type_array,
        })
    }

    /// Number of declared arguments.
    #[inline]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn return_type(&self) -> CType {
        self.ret
    }

    #[inline]
    pub fn args(&self) -> &[CType] {
        &self.args
    }

    #[inline]
    pub fn arg(&self, index: usize) -> Option<CType> {
        self.args.get(index).copied()
    }

    #[inline]
    pub fn abi(&self) -> Abi {
        self.abi
    }

    #[inline]
    pub(crate) fn cif_ptr(&self) -> *mut ffi_cif {
        self.cif.as_ref() as *const ffi_cif as *mut ffi_cif
    }
}
