//! Advisory validation of remote device indices.

use super::DeviceIndex;
use crate::backend::{self, context, RemoteBackend};
use std::sync::Arc;
use tracing::debug;

/// Answers whether a device index is currently valid on the backend.
///
/// The device count is queried on every call; the backend may add devices at
/// any time.
#[derive(Clone)]
pub struct DeviceValidator {
    backend: Arc<dyn RemoteBackend>,
}

impl DeviceValidator {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self { backend }
    }

    /// `0 <= index < deviceCount()`. A failed count query fails closed.
    pub fn is_valid(&self, index: DeviceIndex) -> bool {
        let _ctx = context::acquire();
        match backend::device_count(self.backend.as_ref()) {
            Ok(count) => index >= 0 && index < count,
            Err(err) => {
                debug!(index, error = %err, "device count query failed, treating device as invalid");
                false
            }
        }
    }
}
