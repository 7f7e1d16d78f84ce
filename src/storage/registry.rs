//! Process-wide allocator table, one entry per device type.
//!
//! Entries are set once when a backend is installed and never reassigned.

use super::Allocator;
use crate::device::DeviceType;
use crate::error::{RemoteTensorError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

fn table() -> &'static RwLock<HashMap<DeviceType, Arc<dyn Allocator>>> {
    static TABLE: OnceLock<RwLock<HashMap<DeviceType, Arc<dyn Allocator>>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers `allocator` for `device_type`. Fails if one is already present.
pub fn register_allocator(device_type: DeviceType, allocator: Arc<dyn Allocator>) -> Result<()> {
    let mut table = table().write();
    if table.contains_key(&device_type) {
        return Err(RemoteTensorError::AllocatorAlreadyRegistered(device_type));
    }
    table.insert(device_type, allocator);
    Ok(())
}

/// The allocator registered for `device_type`.
pub fn allocator_for(device_type: DeviceType) -> Option<Arc<dyn Allocator>> {
    table().read().get(&device_type).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CpuAllocator;

    #[test]
    fn test_register_once() {
        register_allocator(DeviceType::Cpu, Arc::new(CpuAllocator::new())).unwrap();
        assert!(allocator_for(DeviceType::Cpu).is_some());

        let err = register_allocator(DeviceType::Cpu, Arc::new(CpuAllocator::new())).unwrap_err();
        assert!(matches!(err, RemoteTensorError::AllocatorAlreadyRegistered(DeviceType::Cpu)));
    }
}
