//! Registry of backend machines and the device indices assigned to them.
//!
//! Each [`BackendDevice`] is one remote GPU instance. Registering it assigns the
//! next free index; that index is what remote tensors carry. Tensors on
//! different instances never interoperate.

use super::DeviceIndex;
use crate::error::{RemoteTensorError, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// GPU models a backend machine can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuType {
    T4,
    L4,
    A10G,
    A100_40GB,
    A100_80GB,
    L40S,
    H100,
    H200,
    B200,
}

impl GpuType {
    pub const ALL: [GpuType; 9] = [
        GpuType::T4,
        GpuType::L4,
        GpuType::A10G,
        GpuType::A100_40GB,
        GpuType::A100_80GB,
        GpuType::L40S,
        GpuType::H100,
        GpuType::H200,
        GpuType::B200,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GpuType::T4 => "T4",
            GpuType::L4 => "L4",
            GpuType::A10G => "A10G",
            GpuType::A100_40GB => "A100-40GB",
            GpuType::A100_80GB => "A100-80GB",
            GpuType::L40S => "L40S",
            GpuType::H100 => "H100",
            GpuType::H200 => "H200",
            GpuType::B200 => "B200",
        }
    }
}

impl fmt::Display for GpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GpuType {
    type Err = RemoteTensorError;

    fn from_str(s: &str) -> Result<Self> {
        GpuType::ALL
            .into_iter()
            .find(|gpu| gpu.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = GpuType::ALL.iter().map(|gpu| gpu.as_str()).collect();
                RemoteTensorError::invalid_input(format!(
                    "Invalid GPU type '{s}'. Valid types: {valid:?}"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendProvider {
    Modal,
}

impl BackendProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendProvider::Modal => "modal",
        }
    }
}

/// One remote GPU instance.
#[derive(Debug, Clone)]
pub struct BackendDevice {
    provider: BackendProvider,
    gpu_type: GpuType,
    device_id: String,
}

impl BackendDevice {
    pub fn new(provider: BackendProvider, gpu_type: GpuType) -> Self {
        let device_id = generate_device_id(provider, gpu_type);
        Self {
            provider,
            gpu_type,
            device_id,
        }
    }

    pub fn provider(&self) -> BackendProvider {
        self.provider
    }

    pub fn gpu_type(&self) -> GpuType {
        self.gpu_type
    }

    /// Unique id, `<provider>-<gpu>-<8 hex digits>`.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Human-readable name such as `Modal A100-40GB`.
    pub fn device_name(&self) -> String {
        let provider = self.provider.as_str();
        let mut chars = provider.chars();
        let title: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        format!("{title} {}", self.gpu_type)
    }
}

impl PartialEq for BackendDevice {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
    }
}

impl Eq for BackendDevice {}

impl fmt::Display for BackendDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackendDevice(provider={}, gpu={}, id={})",
            self.provider.as_str(),
            self.gpu_type,
            self.device_id
        )
    }
}

fn generate_device_id(provider: BackendProvider, gpu_type: GpuType) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    let gpu: String = gpu_type
        .as_str()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase();
    format!("{}-{}-{}", provider.as_str(), gpu, &uuid[..8])
}

/// Maps backend devices to the indices remote tensors use.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, BackendDevice>,
    device_to_index: HashMap<String, DeviceIndex>,
    index_to_device: HashMap<DeviceIndex, String>,
    next_index: DeviceIndex,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device` and returns its index. Registering the same device
    /// again returns the index it already has.
    pub fn register_device(&mut self, device: BackendDevice) -> Result<DeviceIndex> {
        if let Some(&index) = self.device_to_index.get(device.device_id()) {
            return Ok(index);
        }

        let index = self.next_index;
        self.next_index = index
            .checked_add(1)
            .ok_or_else(|| RemoteTensorError::invalid_input("device registry is full"))?;

        let id = device.device_id().to_owned();
        self.device_to_index.insert(id.clone(), index);
        self.index_to_device.insert(index, id.clone());
        self.devices.insert(id, device);
        Ok(index)
    }

    pub fn get_device_by_index(&self, index: DeviceIndex) -> Option<&BackendDevice> {
        self.index_to_device
            .get(&index)
            .and_then(|id| self.devices.get(id))
    }

    pub fn get_device_by_id(&self, device_id: &str) -> Option<&BackendDevice> {
        self.devices.get(device_id)
    }

    pub fn get_device_index(&self, device: &BackendDevice) -> Option<DeviceIndex> {
        self.device_to_index.get(device.device_id()).copied()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Devices only interoperate with themselves.
    pub fn devices_compatible(&self, a: &BackendDevice, b: &BackendDevice) -> bool {
        a.device_id() == b.device_id()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.device_to_index.clear();
        self.index_to_device.clear();
        self.next_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_format() {
        let device = BackendDevice::new(BackendProvider::Modal, GpuType::A100_40GB);
        let parts: Vec<&str> = device.device_id().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "modal");
        assert_eq!(parts[1], "a10040gb");
        assert_eq!(parts[2].len(), 8);
        assert_eq!(device.device_name(), "Modal A100-40GB");
    }

    #[test]
    fn test_parse_gpu_type() {
        assert_eq!("H100".parse::<GpuType>().unwrap(), GpuType::H100);
        let err = "V100".parse::<GpuType>().unwrap_err();
        assert!(err.to_string().contains("Valid types"));
    }

    #[test]
    fn test_register_assigns_stable_indices() {
        let mut registry = DeviceRegistry::new();
        let t4 = BackendDevice::new(BackendProvider::Modal, GpuType::T4);
        let l4 = BackendDevice::new(BackendProvider::Modal, GpuType::L4);

        assert_eq!(registry.register_device(t4.clone()).unwrap(), 0);
        assert_eq!(registry.register_device(l4.clone()).unwrap(), 1);
        assert_eq!(registry.register_device(t4.clone()).unwrap(), 0);
        assert_eq!(registry.device_count(), 2);

        assert_eq!(registry.get_device_by_index(1), Some(&l4));
        assert_eq!(registry.get_device_index(&t4), Some(0));
        assert!(registry.get_device_by_id(t4.device_id()).is_some());
        assert!(!registry.devices_compatible(&t4, &l4));

        registry.clear();
        assert_eq!(registry.device_count(), 0);
        assert!(registry.get_device_by_index(0).is_none());
    }
}
