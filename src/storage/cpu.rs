//! CPU storage backend implementation.

use super::{Allocator, DataPtr, Deleter};
use crate::device::Device;
use crate::error::{RemoteTensorError, Result};
use std::alloc::{self, Layout};
use std::ffi::c_void;
use std::sync::Arc;

const ALIGNMENT: usize = 64;

/// Host memory allocator. Buffers are zero-initialized and 64-byte aligned.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuAllocator;

impl CpuAllocator {
    pub fn new() -> Self {
        Self
    }
}

impl Allocator for CpuAllocator {
    fn allocate(&self, nbytes: usize) -> Result<DataPtr> {
        if nbytes == 0 {
            return Ok(DataPtr::null(Device::cpu()));
        }

        let layout = Layout::from_size_align(nbytes, ALIGNMENT)
            .map_err(|e| RemoteTensorError::invalid_input(format!("cannot allocate {nbytes} bytes: {e}")))?;
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            alloc::handle_alloc_error(layout);
        }

        // SAFETY: `ptr` came from `alloc_zeroed` with this exact layout and the
        // DataPtr calls the deleter at most once.
        let deleter: Deleter = Arc::new(move |p: *mut c_void| unsafe {
            alloc::dealloc(p.cast::<u8>(), layout)
        });
        Ok(DataPtr::new(ptr.cast::<c_void>(), Some(deleter), Device::cpu()))
    }

    fn copy_data(&self, dest: *mut c_void, src: *const c_void, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if dest.is_null() || src.is_null() {
            return Err(RemoteTensorError::InvalidPointer);
        }
        // SAFETY: callers pass buffers from this allocator of at least `count`
        // bytes; distinct allocations never overlap.
        unsafe { std::ptr::copy_nonoverlapping(src.cast::<u8>(), dest.cast::<u8>(), count) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_storage() {
        let allocator = CpuAllocator::new();
        let a = allocator.allocate(8).unwrap();
        let b = allocator.allocate(8).unwrap();
        assert_eq!(a.device(), Device::cpu());
        assert_eq!(a.get() as usize % ALIGNMENT, 0);

        unsafe { a.get().cast::<u8>().write_bytes(7, 8) };
        allocator.copy_data(b.get(), a.get(), 8).unwrap();
        let copied = unsafe { std::slice::from_raw_parts(b.get().cast::<u8>(), 8) };
        assert_eq!(copied, &[7; 8]);
    }

    #[test]
    fn test_zero_bytes_is_null() {
        let data = CpuAllocator::new().allocate(0).unwrap();
        assert!(data.is_null());
    }
}
