//! Construction of empty tensors on the remote device.
//!
//! Parameters are resolved and validated before any storage is requested: layout
//! and pin-memory rejections happen first so they hold whatever else was asked
//! for, then the device is resolved and checked against the backend.

use crate::backend::RemoteBackend;
use crate::device::{Device, DeviceGuard, DeviceType, DeviceValidator};
use crate::dimension::{self, Stride};
use crate::dtype::{self, DType, Element};
use crate::error::{RemoteTensorError, Result};
use crate::layout::{Layout, MemoryFormat};
use crate::storage::{Allocator, CpuAllocator, RemoteAllocator, Storage};
use crate::tensor::{Tensor, TensorOptions};
use std::sync::Arc;

/// Builds remote tensors backed by freshly minted storage handles.
#[derive(Clone)]
pub struct TensorFactory {
    allocator: Arc<RemoteAllocator>,
    validator: DeviceValidator,
}

impl TensorFactory {
    pub fn new(allocator: Arc<RemoteAllocator>) -> Self {
        let validator = DeviceValidator::new(Arc::clone(allocator.backend()));
        Self {
            allocator,
            validator,
        }
    }

    pub fn allocator(&self) -> &Arc<RemoteAllocator> {
        &self.allocator
    }

    pub fn validator(&self) -> &DeviceValidator {
        &self.validator
    }

    /// A new tensor of `size` with strides from `memory_format` (default
    /// contiguous).
    pub fn empty(
        &self,
        size: &[usize],
        options: &TensorOptions,
        memory_format: Option<MemoryFormat>,
    ) -> Result<Tensor> {
        let (device, dtype) = self.resolve(options)?;
        let format = memory_format.unwrap_or_default();
        let strides = Stride::for_memory_format(size, format)?;
        let nbytes = dimension::checked_nbytes(size, dtype.size_in_bytes())?;

        let storage = self.allocate_on(device, nbytes)?;
        Tensor::from_parts(storage, size.to_vec(), strides, 0, dtype)
    }

    /// A new tensor of `size` with explicit `stride`, sized to cover every
    /// element the stride reaches.
    pub fn empty_strided(
        &self,
        size: &[usize],
        stride: &[usize],
        options: &TensorOptions,
    ) -> Result<Tensor> {
        let (device, dtype) = self.resolve(options)?;
        let nbytes = dimension::compute_storage_nbytes(size, stride, dtype.size_in_bytes(), 0)?;

        let storage = self.allocate_on(device, nbytes)?;
        Tensor::from_parts(storage, size.to_vec(), Stride::from(stride), 0, dtype)
    }

    /// Contiguous tensor whose dtype follows `T`.
    pub fn empty_typed<T: Element>(&self, size: &[usize], device: Device) -> Result<Tensor> {
        let options = TensorOptions::new().dtype(DType::of::<T>()).device(device);
        self.empty(size, &options, None)
    }

    fn resolve(&self, options: &TensorOptions) -> Result<(Device, DType)> {
        let layout = options.layout.unwrap_or(Layout::Strided);
        if layout != Layout::Strided {
            return Err(RemoteTensorError::UnsupportedLayout(layout));
        }
        if options.pin_memory.unwrap_or(false) {
            return Err(RemoteTensorError::UnsupportedFeature(
                "Pin memory is not supported on remote devices".to_string(),
            ));
        }

        // Any other device type is coerced to remote, keeping its index.
        let device = match options.device {
            Some(device) => Device::remote(device.with_type(DeviceType::Remote).index()),
            None => Device::remote(0),
        };
        if !self.validator.is_valid(device.index()) {
            return Err(RemoteTensorError::InvalidDevice(device.index()));
        }

        let dtype = options.dtype.unwrap_or_else(dtype::default_dtype);
        Ok((device, dtype))
    }

    fn allocate_on(&self, device: Device, nbytes: usize) -> Result<Storage> {
        let backend: &dyn RemoteBackend = self.allocator.backend().as_ref();
        let _guard = DeviceGuard::new(backend, device)?;
        let allocator: Arc<dyn Allocator> = self.allocator.clone();
        Storage::new(nbytes, allocator)
    }
}

impl std::fmt::Debug for TensorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorFactory")
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}

/// A contiguous host tensor. Host storage is zero-initialized.
pub fn empty_cpu(size: &[usize], dtype: DType) -> Result<Tensor> {
    let nbytes = dimension::checked_nbytes(size, dtype.size_in_bytes())?;
    let strides = Stride::row_major(size)?;
    let storage = Storage::new(nbytes, Arc::new(CpuAllocator::new()))?;
    Tensor::from_parts(storage, size.to_vec(), strides, 0, dtype)
}

#[cfg(all(test, feature = "loopback"))]
mod tests {
    use super::*;
    use crate::backend::{CallbackMethod, LoopbackBackend, LoopbackConfig};

    fn factory(devices: i64) -> (Arc<LoopbackBackend>, TensorFactory) {
        let backend = Arc::new(LoopbackBackend::new(LoopbackConfig::with_devices(devices)));
        let allocator = Arc::new(RemoteAllocator::new(backend.clone()));
        (backend, TensorFactory::new(allocator))
    }

    #[test]
    fn test_empty_contiguous() {
        let (backend, factory) = factory(1);
        let options = TensorOptions::new().dtype(DType::F32).device(Device::remote(0));
        let tensor = factory.empty(&[4, 4], &options, None).unwrap();

        assert_eq!(tensor.size(), &[4, 4]);
        assert_eq!(tensor.stride(), &[4, 1]);
        assert_eq!(tensor.dtype(), DType::F32);
        assert_eq!(tensor.device(), Device::remote(0));
        let handle = tensor.storage_handle().unwrap();
        assert_eq!(backend.storage_len(handle), Some(64));
    }

    #[test]
    fn test_cpu_device_is_coerced() {
        let (backend, factory) = factory(2);
        let options = TensorOptions::new().device(Device::new(DeviceType::Cpu, Some(1)));
        let tensor = factory.empty(&[2], &options, None).unwrap();
        assert_eq!(tensor.device(), Device::remote(1));
        assert_eq!(backend.storage_device(tensor.storage_handle().unwrap()), Some(1));
    }

    #[test]
    fn test_allocates_on_requested_device_and_restores() {
        let (backend, factory) = factory(3);
        let tensor = factory.empty_typed::<i64>(&[3], Device::remote(2)).unwrap();
        assert_eq!(tensor.dtype(), DType::I64);
        assert_eq!(backend.storage_device(tensor.storage_handle().unwrap()), Some(2));
        assert_eq!(backend.get_device().unwrap(), 0);
    }

    #[test]
    fn test_rejections_precede_device_checks() {
        let (backend, factory) = factory(1);
        let sparse = TensorOptions::new().layout(Layout::SparseCoo).device(Device::remote(9));
        assert!(matches!(
            factory.empty(&[2], &sparse, None),
            Err(RemoteTensorError::UnsupportedLayout(Layout::SparseCoo))
        ));

        let pinned = TensorOptions::new().pin_memory(true).device(Device::remote(9));
        assert!(matches!(
            factory.empty_strided(&[2], &[1], &pinned),
            Err(RemoteTensorError::UnsupportedFeature(_))
        ));
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn test_empty_strided_extent() {
        let (backend, factory) = factory(1);
        let tensor = factory
            .empty_strided(&[2, 3], &[1, 2], &TensorOptions::new().dtype(DType::F64))
            .unwrap();
        assert_eq!(tensor.stride(), &[1, 2]);
        assert!(!tensor.is_contiguous());
        assert_eq!(backend.storage_len(tensor.storage_handle().unwrap()), Some(48));
    }

    #[test]
    fn test_zero_sized_tensor_still_mints_handle() {
        let (backend, factory) = factory(1);
        let tensor = factory.empty(&[0, 5], &TensorOptions::new(), None).unwrap();
        let handle = tensor.storage_handle().unwrap();
        assert_eq!(backend.storage_len(handle), Some(0));
        assert_eq!(backend.calls(CallbackMethod::CreateStorage), 1);
    }

    #[test]
    fn test_oversized_shapes_are_rejected_before_allocation() {
        let (backend, factory) = factory(1);
        for size in [&[1 << 33, 1 << 33][..], &[2, 1 << 33, 1 << 33][..]] {
            assert!(matches!(
                factory.empty(size, &TensorOptions::new(), None),
                Err(RemoteTensorError::InvalidShape(_))
            ));
            assert!(matches!(empty_cpu(size, DType::F32), Err(RemoteTensorError::InvalidShape(_))));
        }
        assert_eq!(backend.calls(CallbackMethod::CreateStorage), 0);
    }

    #[test]
    fn test_empty_cpu() {
        let tensor = empty_cpu(&[2, 2], DType::I32).unwrap();
        assert_eq!(tensor.device(), Device::cpu());
        assert_eq!(tensor.storage().nbytes(), 16);
    }
}
