//! Storage abstraction for tensor data.
//!
//! This module provides the `Allocator` trait, the `DataPtr` it hands out and the
//! reference-counted `Storage` that tensors share. Allocators exist for host
//! memory and for remote memory, where the data pointer is a storage handle.

mod cpu;
mod handle;
pub mod registry;
mod remote;

pub use cpu::CpuAllocator;
pub use handle::StorageHandle;
pub use remote::RemoteAllocator;

use crate::device::Device;
use crate::error::Result;
use std::ffi::c_void;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Releases the memory behind a data pointer. Called at most once per pointer.
pub type Deleter = Arc<dyn Fn(*mut c_void) + Send + Sync>;

/// An address-shaped reference to a buffer plus the means to free it.
pub struct DataPtr {
    ptr: *mut c_void,
    deleter: Option<Deleter>,
    device: Device,
}

impl DataPtr {
    pub fn new(ptr: *mut c_void, deleter: Option<Deleter>, device: Device) -> Self {
        Self {
            ptr,
            deleter,
            device,
        }
    }

    /// A null pointer that frees nothing.
    pub fn null(device: Device) -> Self {
        Self::new(std::ptr::null_mut(), None, device)
    }

    pub fn get(&self) -> *mut c_void {
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl Drop for DataPtr {
    fn drop(&mut self) {
        if let Some(deleter) = self.deleter.take() {
            if !self.ptr.is_null() {
                deleter(self.ptr);
            }
        }
    }
}

impl Debug for DataPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPtr")
            .field("ptr", &self.ptr)
            .field("device", &self.device)
            .field("has_deleter", &self.deleter.is_some())
            .finish()
    }
}

// SAFETY: the pointer is either a handle (never dereferenced) or host memory
// owned exclusively by this DataPtr; deleters are Send + Sync.
unsafe impl Send for DataPtr {}
unsafe impl Sync for DataPtr {}

/// The allocator contract the host model expects from every device type.
pub trait Allocator: Send + Sync + 'static {
    /// Allocates `nbytes` on the allocator's current device.
    fn allocate(&self, nbytes: usize) -> Result<DataPtr>;

    /// Copies `count` bytes between two pointers produced by this allocator.
    fn copy_data(&self, dest: *mut c_void, src: *const c_void, count: usize) -> Result<()>;

    /// The deleter used for pointers this allocator hands out, if it has a
    /// context-free one.
    fn raw_deleter(&self) -> Option<Deleter> {
        None
    }
}

struct StorageImpl {
    data: DataPtr,
    nbytes: usize,
    allocator: Arc<dyn Allocator>,
}

/// A reference-counted block of bytes. Clones alias the same block; the block is
/// released when the last clone is dropped.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageImpl>,
}

impl Storage {
    /// Allocates `nbytes` from `allocator`.
    pub fn new(nbytes: usize, allocator: Arc<dyn Allocator>) -> Result<Self> {
        let data = allocator.allocate(nbytes)?;
        Ok(Self::from_data_ptr(data, nbytes, allocator))
    }

    /// Wraps an existing allocation.
    pub fn from_data_ptr(data: DataPtr, nbytes: usize, allocator: Arc<dyn Allocator>) -> Self {
        Self {
            inner: Arc::new(StorageImpl {
                data,
                nbytes,
                allocator,
            }),
        }
    }

    pub fn nbytes(&self) -> usize {
        self.inner.nbytes
    }

    pub fn device(&self) -> Device {
        self.inner.data.device()
    }

    /// The opaque data reference; never dereference it for remote storage.
    pub fn data_ptr(&self) -> *mut c_void {
        self.inner.data.get()
    }

    /// The handle behind remote storage. `None` for host storage.
    pub fn handle(&self) -> Option<StorageHandle> {
        if self.device().is_remote() {
            StorageHandle::from_ptr(self.data_ptr())
        } else {
            None
        }
    }

    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.inner.allocator
    }

    /// `true` if both refer to the same block.
    pub fn is_alias_of(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("data", &self.inner.data)
            .field("nbytes", &self.inner.nbytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_deleter_runs_once_on_last_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let deleter: Deleter = Arc::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let data = DataPtr::new(StorageHandle::new(9).unwrap().into_ptr(), Some(deleter), Device::remote(0));
        let storage = Storage::from_data_ptr(data, 16, Arc::new(CpuAllocator::new()));
        let alias = storage.clone();
        assert!(alias.is_alias_of(&storage));
        assert_eq!(storage.handle().map(StorageHandle::get), Some(9));

        drop(storage);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(alias);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_null_data_ptr_skips_deleter() {
        let deleter: Deleter = Arc::new(|_| panic!("must not run"));
        drop(DataPtr::new(std::ptr::null_mut(), Some(deleter), Device::cpu()));
    }
}
