//! The callback surface of the remote backend.
//!
//! The backend owns the real bytes. This crate only ever reaches it through the
//! named callbacks of [`RemoteBackend`], each invoked while holding the
//! execution context from [`context`].

use crate::device::DeviceIndex;
use crate::storage::StorageHandle;
use std::fmt;
use thiserror::Error;

pub mod context;
#[cfg(feature = "loopback")]
pub mod loopback;

#[cfg(feature = "loopback")]
pub use loopback::{FailureMode, LoopbackBackend, LoopbackConfig};

/// Names of the callbacks the backend must expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackMethod {
    GenerateStorageId,
    CreateStorage,
    FreeStorage,
    CopyDataById,
    GetDevice,
    SetDevice,
    DeviceCount,
}

impl CallbackMethod {
    pub const ALL: [CallbackMethod; 7] = [
        CallbackMethod::GenerateStorageId,
        CallbackMethod::CreateStorage,
        CallbackMethod::FreeStorage,
        CallbackMethod::CopyDataById,
        CallbackMethod::GetDevice,
        CallbackMethod::SetDevice,
        CallbackMethod::DeviceCount,
    ];

    /// The name the backend exposes the callback under.
    pub fn name(self) -> &'static str {
        match self {
            CallbackMethod::GenerateStorageId => "generateStorageId",
            CallbackMethod::CreateStorage => "createStorage",
            CallbackMethod::FreeStorage => "freeStorage",
            CallbackMethod::CopyDataById => "copy_data_by_id",
            CallbackMethod::GetDevice => "getDevice",
            CallbackMethod::SetDevice => "setDevice",
            CallbackMethod::DeviceCount => "deviceCount",
        }
    }
}

impl fmt::Display for CallbackMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A callback raised instead of returning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{method} callback failed: {message}")]
pub struct BackendError {
    pub method: CallbackMethod,
    pub message: String,
}

impl BackendError {
    pub fn new(method: CallbackMethod, message: impl Into<String>) -> Self {
        Self {
            method,
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Callbacks implemented by the remote backend.
///
/// Integer-valued device queries return `i64` as they cross a dynamically typed
/// boundary; the crate narrows them to [`DeviceIndex`] with a checked cast.
pub trait RemoteBackend: Send + Sync {
    /// Mints a new storage id. Must be unique for the process lifetime and
    /// never zero.
    fn generate_storage_id(&self) -> BackendResult<u64>;

    /// Realizes `nbytes` of storage for `handle` on `device`.
    fn create_storage(
        &self,
        handle: StorageHandle,
        nbytes: usize,
        device: DeviceIndex,
    ) -> BackendResult<bool>;

    /// Releases the storage behind `handle`. Best effort.
    fn free_storage(&self, handle: StorageHandle) -> BackendResult<()>;

    /// Copies `nbytes` from the start of `src` to the start of `dest`.
    fn copy_data_by_id(
        &self,
        dest: StorageHandle,
        src: StorageHandle,
        nbytes: usize,
    ) -> BackendResult<()>;

    /// Current device index of the calling thread.
    fn get_device(&self) -> BackendResult<i64>;

    /// Makes `device` current for the calling thread.
    fn set_device(&self, device: DeviceIndex) -> BackendResult<()>;

    /// Number of valid device indices.
    fn device_count(&self) -> BackendResult<i64>;
}

fn narrow(method: CallbackMethod, raw: i64) -> BackendResult<DeviceIndex> {
    num_traits::cast::<i64, DeviceIndex>(raw).ok_or_else(|| {
        BackendError::new(method, format!("value {raw} does not fit a device index"))
    })
}

/// `getDevice`, narrowed to a [`DeviceIndex`].
pub(crate) fn current_device(backend: &dyn RemoteBackend) -> BackendResult<DeviceIndex> {
    narrow(CallbackMethod::GetDevice, backend.get_device()?)
}

/// `deviceCount`, narrowed to a [`DeviceIndex`].
pub(crate) fn device_count(backend: &dyn RemoteBackend) -> BackendResult<DeviceIndex> {
    narrow(CallbackMethod::DeviceCount, backend.device_count()?)
}
