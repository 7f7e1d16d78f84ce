//! Integration tests for the handle-based allocator.

#![cfg(feature = "loopback")]

use std::collections::HashSet;
use std::sync::Arc;
use tensorust_remote::backend::{FailureMode, LoopbackBackend, LoopbackConfig};
use tensorust_remote::{
    Allocator, CallbackMethod, Device, RemoteAllocator, RemoteTensorError, Storage, StorageHandle,
};

fn setup(devices: i64) -> (Arc<LoopbackBackend>, Arc<RemoteAllocator>) {
    let backend = Arc::new(LoopbackBackend::new(LoopbackConfig::with_devices(devices)));
    let allocator = Arc::new(RemoteAllocator::new(backend.clone()));
    (backend, allocator)
}

#[test]
fn test_handles_are_unique_and_non_zero() {
    let (_backend, allocator) = setup(1);
    let storages: Vec<Storage> = (0..256)
        .map(|_| Storage::new(8, allocator.clone()).unwrap())
        .collect();

    let handles: HashSet<StorageHandle> = storages.iter().filter_map(Storage::handle).collect();
    assert_eq!(handles.len(), storages.len());
    assert!(handles.iter().all(|handle| handle.get() != 0));
}

#[test]
fn test_allocate_then_free_for_any_size() {
    let (backend, allocator) = setup(1);
    for nbytes in [0, 1, 7, 4096] {
        let data = allocator.allocate(nbytes).unwrap();
        let handle = StorageHandle::from_ptr(data.get()).unwrap();
        assert_eq!(backend.storage_len(handle), Some(nbytes));

        drop(data);
        assert_eq!(backend.storage_len(handle), None);
    }
    assert_eq!(backend.calls(CallbackMethod::CreateStorage), 4);
    assert_eq!(backend.calls(CallbackMethod::FreeStorage), 4);
    assert_eq!(backend.live_storages(), 0);
}

#[test]
fn test_storage_frees_once_after_last_alias() {
    let (backend, allocator) = setup(1);
    let storage = Storage::new(32, allocator).unwrap();
    let alias = storage.clone();
    assert_eq!(storage.device(), Device::remote(0));

    drop(storage);
    assert_eq!(backend.calls(CallbackMethod::FreeStorage), 0);
    drop(alias);
    assert_eq!(backend.calls(CallbackMethod::FreeStorage), 1);
}

#[test]
fn test_rejected_creation_surfaces_handle_and_size() {
    let (backend, allocator) = setup(1);
    backend.fail(CallbackMethod::CreateStorage, FailureMode::Report);

    match allocator.allocate(128).unwrap_err() {
        RemoteTensorError::Allocation { handle, nbytes, device } => {
            assert_ne!(handle, 0);
            assert_eq!(nbytes, 128);
            assert_eq!(device, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.live_storages(), 0);
}

#[test]
fn test_zero_id_is_never_accepted() {
    let (backend, allocator) = setup(1);
    backend.fail(CallbackMethod::GenerateStorageId, FailureMode::Report);
    assert!(matches!(allocator.allocate(4), Err(RemoteTensorError::InvalidHandle(0))));
    assert_eq!(backend.calls(CallbackMethod::CreateStorage), 0);
}

#[test]
fn test_copy_failure_is_copy_error() {
    let (backend, allocator) = setup(1);
    let dest = allocator.allocate(16).unwrap();
    let src = allocator.allocate(16).unwrap();
    backend.fail(CallbackMethod::CopyDataById, FailureMode::Raise);

    let err = allocator.copy_data(dest.get(), src.get(), 16).unwrap_err();
    assert!(matches!(err, RemoteTensorError::Copy { nbytes: 16, .. }));
}

#[test]
fn test_free_failures_do_not_escape() {
    let (backend, allocator) = setup(1);
    let storage = Storage::new(16, allocator.clone()).unwrap();
    backend.fail(CallbackMethod::FreeStorage, FailureMode::Raise);

    drop(storage);
    assert_eq!(backend.calls(CallbackMethod::FreeStorage), 1);

    // Freeing an unknown or null handle is logged, not raised.
    allocator.free(std::ptr::null_mut());
    allocator.free(StorageHandle::new(42).unwrap().into_ptr());
}

#[test]
fn test_raw_deleter_frees_handle() {
    let (backend, allocator) = setup(1);
    let data = allocator.allocate(8).unwrap();
    let handle = StorageHandle::from_ptr(data.get()).unwrap();
    // Take the pointer out of the DataPtr so only the raw deleter frees it.
    std::mem::forget(data);

    let deleter = allocator.raw_deleter().unwrap();
    deleter(handle.into_ptr());
    assert_eq!(backend.storage_len(handle), None);
}
