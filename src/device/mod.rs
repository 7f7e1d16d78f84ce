//! Device identities for remote and host tensors.
//!
//! A remote device is addressed by a small index that is only meaningful to the
//! backend; whether an index is usable is decided by [`DeviceValidator`] at the
//! time of use.

use std::fmt;

pub mod guard;
pub mod registry;
pub mod validator;

pub use guard::DeviceGuard;
pub use registry::{BackendDevice, BackendProvider, DeviceRegistry, GpuType};
pub use validator::DeviceValidator;

/// Index of a device within its device type. Signed so that negative indices
/// can be represented and rejected.
pub type DeviceIndex = i16;

/// The kind of device a buffer lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Cpu,
    /// Storage owned by the remote backend; the local address is a handle.
    Remote,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => f.write_str("cpu"),
            DeviceType::Remote => f.write_str("remote"),
        }
    }
}

/// A device type plus an optional index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    ty: DeviceType,
    index: Option<DeviceIndex>,
}

impl Device {
    pub const fn new(ty: DeviceType, index: Option<DeviceIndex>) -> Self {
        Self { ty, index }
    }

    pub const fn cpu() -> Self {
        Self::new(DeviceType::Cpu, None)
    }

    pub const fn remote(index: DeviceIndex) -> Self {
        Self::new(DeviceType::Remote, Some(index))
    }

    pub fn device_type(&self) -> DeviceType {
        self.ty
    }

    /// The explicit index, if any.
    pub fn index_opt(&self) -> Option<DeviceIndex> {
        self.index
    }

    /// The index, with a missing index read as 0.
    pub fn index(&self) -> DeviceIndex {
        self.index.unwrap_or(0)
    }

    pub fn is_remote(&self) -> bool {
        self.ty == DeviceType::Remote
    }

    /// Same index on another device type.
    pub fn with_type(self, ty: DeviceType) -> Self {
        Self { ty, ..self }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}:{}", self.ty, index),
            None => write!(f, "{}", self.ty),
        }
    }
}
