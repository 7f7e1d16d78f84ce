//! Scoped current-device switching.

use super::{Device, DeviceIndex};
use crate::backend::{self, context, RemoteBackend};
use crate::error::Result;
use tracing::warn;

/// Makes a remote device current on the backend and restores the previous one
/// when dropped.
#[must_use = "the previous device is restored as soon as the guard is dropped"]
pub struct DeviceGuard<'a> {
    backend: &'a dyn RemoteBackend,
    previous: DeviceIndex,
    current: DeviceIndex,
}

impl<'a> DeviceGuard<'a> {
    pub fn new(backend: &'a dyn RemoteBackend, device: Device) -> Result<Self> {
        let _ctx = context::acquire();
        let current = device.index();
        let previous = backend::current_device(backend)?;
        if previous != current {
            backend.set_device(current)?;
        }
        Ok(Self {
            backend,
            previous,
            current,
        })
    }

    /// The device made current by this guard.
    pub fn current(&self) -> DeviceIndex {
        self.current
    }

    /// The device that was current before this guard.
    pub fn original(&self) -> DeviceIndex {
        self.previous
    }
}

impl Drop for DeviceGuard<'_> {
    fn drop(&mut self) {
        if self.previous == self.current {
            return;
        }
        let _ctx = context::acquire();
        if let Err(err) = self.backend.set_device(self.previous) {
            warn!(device = self.previous, error = %err, "failed to restore current device");
        }
    }
}
