//! Handle-based allocator for remote storage.
//!
//! Every allocation mints a fresh [`StorageHandle`], asks the backend to realize
//! it and returns the handle disguised as a data pointer. Copies and frees read
//! the handle back out and forward to the backend. No bytes move locally.

use super::{Allocator, DataPtr, Deleter, StorageHandle};
use crate::backend::{self, context, CallbackMethod, RemoteBackend};
use crate::device::Device;
use crate::error::{RemoteTensorError, Result};
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Allocator whose data pointers are remote storage handles.
#[derive(Clone)]
pub struct RemoteAllocator {
    backend: Arc<dyn RemoteBackend>,
}

impl RemoteAllocator {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn RemoteBackend> {
        &self.backend
    }

    /// Frees the storage behind `ptr`. Never fails; problems are logged.
    pub fn free(&self, ptr: *mut c_void) {
        report_and_delete(self.backend.as_ref(), ptr);
    }

    fn deleter(&self) -> Deleter {
        let backend = Arc::clone(&self.backend);
        Arc::new(move |ptr| report_and_delete(backend.as_ref(), ptr))
    }
}

impl Allocator for RemoteAllocator {
    fn allocate(&self, nbytes: usize) -> Result<DataPtr> {
        let _ctx = context::acquire();

        let device = backend::current_device(self.backend.as_ref())?;
        let raw = self.backend.generate_storage_id()?;
        let handle = StorageHandle::new(raw).ok_or(RemoteTensorError::InvalidHandle(raw))?;

        if !self.backend.create_storage(handle, nbytes, device)? {
            return Err(RemoteTensorError::Allocation {
                handle: handle.get(),
                nbytes,
                device,
            });
        }

        debug!(%handle, nbytes, device, "allocated remote storage");
        Ok(DataPtr::new(handle.into_ptr(), Some(self.deleter()), Device::remote(device)))
    }

    fn copy_data(&self, dest: *mut c_void, src: *const c_void, count: usize) -> Result<()> {
        let dest = StorageHandle::from_ptr(dest).ok_or(RemoteTensorError::InvalidPointer)?;
        let src = StorageHandle::from_ptr(src).ok_or(RemoteTensorError::InvalidPointer)?;

        let _ctx = context::acquire();
        self.backend
            .copy_data_by_id(dest, src, count)
            .map_err(|source| RemoteTensorError::Copy {
                dest: dest.get(),
                src: src.get(),
                nbytes: count,
                source,
            })?;

        debug!(%dest, %src, nbytes = count, "copied remote storage");
        Ok(())
    }

    fn raw_deleter(&self) -> Option<Deleter> {
        Some(self.deleter())
    }
}

impl std::fmt::Debug for RemoteAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAllocator").finish_non_exhaustive()
    }
}

/// Deleter body. Runs during drops, possibly at teardown, so nothing may escape.
fn report_and_delete(backend: &dyn RemoteBackend, ptr: *mut c_void) {
    let Some(handle) = StorageHandle::from_ptr(ptr) else {
        return;
    };

    let _ctx = context::acquire();
    match panic::catch_unwind(AssertUnwindSafe(|| backend.free_storage(handle))) {
        Ok(Ok(())) => debug!(%handle, "freed remote storage"),
        Ok(Err(err)) => warn!(%handle, error = %err, "failed to free remote storage"),
        Err(_) => warn!(
            %handle,
            callback = CallbackMethod::FreeStorage.name(),
            "remote storage free panicked"
        ),
    }
}

#[cfg(all(test, feature = "loopback"))]
mod tests {
    use super::*;
    use crate::backend::{FailureMode, LoopbackBackend, LoopbackConfig};

    fn allocator(device_count: i64) -> (Arc<LoopbackBackend>, RemoteAllocator) {
        let backend = Arc::new(LoopbackBackend::new(LoopbackConfig::with_devices(device_count)));
        (backend.clone(), RemoteAllocator::new(backend))
    }

    #[test]
    fn test_allocate_registers_handle() {
        let (backend, allocator) = allocator(1);
        let data = allocator.allocate(64).unwrap();
        let handle = StorageHandle::from_ptr(data.get()).unwrap();

        assert_eq!(data.device(), Device::remote(0));
        assert_eq!(backend.storage_len(handle), Some(64));
        assert_eq!(backend.calls(CallbackMethod::GenerateStorageId), 1);
        assert_eq!(backend.calls(CallbackMethod::CreateStorage), 1);

        drop(data);
        assert_eq!(backend.storage_len(handle), None);
        assert_eq!(backend.calls(CallbackMethod::FreeStorage), 1);
    }

    #[test]
    fn test_create_failure_is_allocation_error() {
        let (backend, allocator) = allocator(1);
        backend.fail(CallbackMethod::CreateStorage, FailureMode::Report);

        let err = allocator.allocate(32).unwrap_err();
        match err {
            RemoteTensorError::Allocation { nbytes, device, .. } => {
                assert_eq!(nbytes, 32);
                assert_eq!(device, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_copy_failure_propagates() {
        let (backend, allocator) = allocator(1);
        let a = allocator.allocate(8).unwrap();
        let b = allocator.allocate(8).unwrap();
        backend.fail(CallbackMethod::CopyDataById, FailureMode::Raise);

        let err = allocator.copy_data(b.get(), a.get(), 8).unwrap_err();
        assert!(matches!(err, RemoteTensorError::Copy { nbytes: 8, .. }));
        assert_eq!(backend.calls(CallbackMethod::CopyDataById), 1);
    }

    #[test]
    fn test_free_failure_is_swallowed() {
        let (backend, allocator) = allocator(1);
        let data = allocator.allocate(4).unwrap();
        backend.fail(CallbackMethod::FreeStorage, FailureMode::Raise);
        drop(data);
        assert_eq!(backend.calls(CallbackMethod::FreeStorage), 1);

        allocator.free(std::ptr::null_mut());
        assert_eq!(backend.calls(CallbackMethod::FreeStorage), 1);
    }
}
