//! In-process backend that keeps "remote" bytes in local memory.
//!
//! Useful as a reference implementation of the callback surface and as a test
//! double: every callback is counted and any of them can be made to fail.

use super::{BackendError, BackendResult, CallbackMethod, RemoteBackend};
use crate::device::{DeviceIndex, DeviceRegistry};
use crate::storage::StorageHandle;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// How an injected failure shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// The callback returns its failure value: `false` from `createStorage`,
    /// a zero id from `generateStorageId`. Callbacks without a failure value
    /// raise instead.
    Report,
    /// The callback returns an error.
    Raise,
}

#[derive(Debug, Clone)]
enum DeviceSource {
    Fixed(i64),
    Registry(Arc<RwLock<DeviceRegistry>>),
}

/// Settings for a [`LoopbackBackend`].
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    devices: DeviceSource,
    initial_device: DeviceIndex,
}

impl LoopbackConfig {
    /// A fixed number of devices.
    pub fn with_devices(count: i64) -> Self {
        Self {
            devices: DeviceSource::Fixed(count),
            initial_device: 0,
        }
    }

    /// Device count follows the registry as devices are registered.
    pub fn with_registry(registry: Arc<RwLock<DeviceRegistry>>) -> Self {
        Self {
            devices: DeviceSource::Registry(registry),
            initial_device: 0,
        }
    }

    /// Device reported by `getDevice` before any `setDevice` on a thread.
    pub fn initial_device(mut self, device: DeviceIndex) -> Self {
        self.initial_device = device;
        self
    }
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self::with_devices(1)
    }
}

#[derive(Debug)]
struct StorageRecord {
    bytes: Vec<u8>,
    device: DeviceIndex,
}

/// A [`RemoteBackend`] living in the current process.
#[derive(Debug)]
pub struct LoopbackBackend {
    config: LoopbackConfig,
    storages: Mutex<HashMap<StorageHandle, StorageRecord>>,
    minted: Mutex<HashSet<u64>>,
    current: Mutex<HashMap<ThreadId, DeviceIndex>>,
    calls: HashMap<CallbackMethod, AtomicUsize>,
    failures: Mutex<HashMap<CallbackMethod, FailureMode>>,
}

impl LoopbackBackend {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            storages: Mutex::new(HashMap::new()),
            minted: Mutex::new(HashSet::new()),
            current: Mutex::new(HashMap::new()),
            calls: CallbackMethod::ALL
                .iter()
                .map(|&method| (method, AtomicUsize::new(0)))
                .collect(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Makes every later call to `method` fail in the given way.
    pub fn fail(&self, method: CallbackMethod, mode: FailureMode) {
        self.failures.lock().insert(method, mode);
    }

    pub fn clear_failure(&self, method: CallbackMethod) {
        self.failures.lock().remove(&method);
    }

    /// Number of times `method` was invoked, failed calls included.
    pub fn calls(&self, method: CallbackMethod) -> usize {
        self.calls[&method].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.values().map(|count| count.load(Ordering::SeqCst)).sum()
    }

    pub fn reset_calls(&self) {
        for count in self.calls.values() {
            count.store(0, Ordering::SeqCst);
        }
    }

    /// Byte length of a live storage.
    pub fn storage_len(&self, handle: StorageHandle) -> Option<usize> {
        self.storages.lock().get(&handle).map(|record| record.bytes.len())
    }

    /// Device a live storage was created on.
    pub fn storage_device(&self, handle: StorageHandle) -> Option<DeviceIndex> {
        self.storages.lock().get(&handle).map(|record| record.device)
    }

    pub fn live_storages(&self) -> usize {
        self.storages.lock().len()
    }

    /// Writes `data` into a live storage starting at `offset`.
    pub fn write_bytes(&self, handle: StorageHandle, offset: usize, data: &[u8]) -> BackendResult<()> {
        let mut storages = self.storages.lock();
        let record = storages
            .get_mut(&handle)
            .ok_or_else(|| unknown(CallbackMethod::CopyDataById, handle))?;
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= record.bytes.len())
            .ok_or_else(|| {
                BackendError::new(
                    CallbackMethod::CopyDataById,
                    format!("write of {} bytes at {offset} overruns storage {handle}", data.len()),
                )
            })?;
        record.bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// A copy of a live storage's bytes.
    pub fn read_bytes(&self, handle: StorageHandle) -> Option<Vec<u8>> {
        self.storages.lock().get(&handle).map(|record| record.bytes.clone())
    }

    fn check(&self, method: CallbackMethod) -> BackendResult<bool> {
        self.calls[&method].fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().get(&method) {
            None => Ok(true),
            Some(FailureMode::Report) => Ok(false),
            Some(FailureMode::Raise) => Err(BackendError::new(method, "injected failure")),
        }
    }

    /// Like [`check`](Self::check) for callbacks that cannot report failure.
    fn check_raising(&self, method: CallbackMethod) -> BackendResult<()> {
        if self.check(method)? {
            Ok(())
        } else {
            Err(BackendError::new(method, "injected failure"))
        }
    }

    fn count(&self) -> i64 {
        match &self.config.devices {
            DeviceSource::Fixed(count) => *count,
            DeviceSource::Registry(registry) => registry.read().device_count() as i64,
        }
    }
}

impl Default for LoopbackBackend {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

fn unknown(method: CallbackMethod, handle: StorageHandle) -> BackendError {
    BackendError::new(method, format!("unknown storage {handle}"))
}

impl RemoteBackend for LoopbackBackend {
    fn generate_storage_id(&self) -> BackendResult<u64> {
        if !self.check(CallbackMethod::GenerateStorageId)? {
            return Ok(0);
        }
        let mut minted = self.minted.lock();
        let mut rng = rand::thread_rng();
        loop {
            let id: u64 = rng.gen();
            if id != 0 && minted.insert(id) {
                return Ok(id);
            }
        }
    }

    fn create_storage(
        &self,
        handle: StorageHandle,
        nbytes: usize,
        device: DeviceIndex,
    ) -> BackendResult<bool> {
        if !self.check(CallbackMethod::CreateStorage)? {
            return Ok(false);
        }
        if device < 0 || i64::from(device) >= self.count() {
            return Ok(false);
        }
        let mut storages = self.storages.lock();
        if storages.contains_key(&handle) {
            return Ok(false);
        }
        storages.insert(
            handle,
            StorageRecord {
                bytes: vec![0; nbytes],
                device,
            },
        );
        Ok(true)
    }

    fn free_storage(&self, handle: StorageHandle) -> BackendResult<()> {
        self.check_raising(CallbackMethod::FreeStorage)?;
        self.storages
            .lock()
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| unknown(CallbackMethod::FreeStorage, handle))
    }

    fn copy_data_by_id(
        &self,
        dest: StorageHandle,
        src: StorageHandle,
        nbytes: usize,
    ) -> BackendResult<()> {
        const METHOD: CallbackMethod = CallbackMethod::CopyDataById;
        self.check_raising(METHOD)?;

        let mut storages = self.storages.lock();
        let source = storages.get(&src).ok_or_else(|| unknown(METHOD, src))?;
        if nbytes > source.bytes.len() {
            return Err(BackendError::new(
                METHOD,
                format!("copy of {nbytes} bytes overruns source storage {src}"),
            ));
        }
        let chunk = source.bytes[..nbytes].to_vec();

        let target = storages.get_mut(&dest).ok_or_else(|| unknown(METHOD, dest))?;
        if nbytes > target.bytes.len() {
            return Err(BackendError::new(
                METHOD,
                format!("copy of {nbytes} bytes overruns destination storage {dest}"),
            ));
        }
        target.bytes[..nbytes].copy_from_slice(&chunk);
        Ok(())
    }

    fn get_device(&self) -> BackendResult<i64> {
        self.check_raising(CallbackMethod::GetDevice)?;
        let current = self.current.lock();
        let device = current
            .get(&thread::current().id())
            .copied()
            .unwrap_or(self.config.initial_device);
        Ok(i64::from(device))
    }

    fn set_device(&self, device: DeviceIndex) -> BackendResult<()> {
        self.check_raising(CallbackMethod::SetDevice)?;
        if device < 0 || i64::from(device) >= self.count() {
            return Err(BackendError::new(
                CallbackMethod::SetDevice,
                format!("device {device} out of range"),
            ));
        }
        // Threads back on the initial device need no entry.
        let mut current = self.current.lock();
        let thread = thread::current().id();
        if device == self.config.initial_device {
            current.remove(&thread);
        } else {
            current.insert(thread, device);
        }
        Ok(())
    }

    fn device_count(&self) -> BackendResult<i64> {
        self.check_raising(CallbackMethod::DeviceCount)?;
        Ok(self.count())
    }
}
