//! CRT allocator passthroughs with a live-allocation registry
//!
//! Every passthrough allocation is recorded in a lock-free map keyed by
//! address; releases remove their entry. `memory_report` snapshots what is
//! still live so a host can surface leaks at shutdown.

use crate::error::FfiError;
use crate::logging::{log_allocation, log_leaked_allocation, log_release, warn};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::ffi::c_void;

static ALLOCATIONS: Lazy<DashMap<usize, AllocationRecord>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, Copy)]
struct AllocationRecord {
    size: usize,
    op: &'static str,
}

/// Allocate `size` bytes from the CRT heap and record the block.
pub fn allocate(size: usize) -> Result<usize, FfiError> {
    let ptr = unsafe { libc::malloc(size) };
    if ptr.is_null() {
        return Err(FfiError::AllocationFailed);
    }
    let addr = ptr as usize;
    ALLOCATIONS.insert(addr, AllocationRecord { size, op: "malloc" });
    log_allocation("malloc", size, addr);
    Ok(addr)
}

/// Allocate `count * size` zeroed bytes from the CRT heap.
pub fn allocate_zeroed(count: usize, size: usize) -> Result<usize, FfiError> {
    let ptr = unsafe { libc::calloc(count, size) };
    if ptr.is_null() {
        return Err(FfiError::AllocationFailed);
    }
    let addr = ptr as usize;
    ALLOCATIONS.insert(
        addr,
        AllocationRecord {
            size: count.saturating_mul(size),
            op: "calloc",
        },
    );
    log_allocation("calloc", count.saturating_mul(size), addr);
    Ok(addr)
}

/// Resize a passthrough allocation, returning its new address.
///
/// On failure the old block stays live and registered, matching the CRT
/// contract.
///
/// # Safety
/// `addr` must be null or a live passthrough allocation.
pub unsafe fn reallocate(addr: usize, size: usize) -> Result<usize, FfiError> {
    let ptr = libc::realloc(addr as *mut c_void, size);
    if ptr.is_null() && size > 0 {
        return Err(FfiError::AllocationFailed);
    }
    ALLOCATIONS.remove(&addr);
    let new_addr = ptr as usize;
    if new_addr != 0 {
        ALLOCATIONS.insert(new_addr, AllocationRecord { size, op: "realloc" });
    }
    log_allocation("realloc", size, new_addr);
    Ok(new_addr)
}

/// Release a passthrough allocation.
///
/// # Safety
/// `addr` must be null or an address previously returned by one of the
/// passthrough allocators and not yet released.
pub unsafe fn release(addr: usize) {
    libc::free(addr as *mut c_void);
    if ALLOCATIONS.remove(&addr).is_none() && addr != 0 {
        warn!(target: "memory", address = format_args!("{:#x}", addr), "released untracked allocation");
    }
    log_release(addr);
}

/// One live allocation in a [`MemoryReport`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryReportEntry {
    pub address: usize,
    pub size: usize,
    pub op: &'static str,
}

/// Snapshot of live passthrough allocations for monitoring and debugging
#[derive(Debug, Clone)]
pub struct MemoryReport {
    pub live: usize,
    pub bytes: usize,
    pub entries: Vec<MemoryReportEntry>,
}

/// Snapshot live passthrough allocations, logging each as a leak.
pub fn memory_report() -> MemoryReport {
    let mut entries = Vec::with_capacity(ALLOCATIONS.len());
    let mut bytes = 0usize;
    for item in ALLOCATIONS.iter() {
        let record = *item.value();
        bytes += record.size;
        entries.push(MemoryReportEntry {
            address: *item.key(),
            size: record.size,
            op: record.op,
        });
        log_leaked_allocation(*item.key(), record.size, record.op);
    }
    MemoryReport {
        live: entries.len(),
        bytes,
        entries,
    }
}
