//! Tensor views for zero-copy operations.
//!
//! `as_strided` and `set_storage` only rewrite local descriptors. They build
//! results through [`Tensor::from_parts`] and [`Tensor::rebind`] rather than the
//! dispatcher: routing them through dispatch would reach the remote fallback,
//! which itself creates views with `as_strided`.

use crate::dimension::Stride;
use crate::error::{RemoteTensorError, Result};
use crate::storage::Storage;
use crate::tensor::Tensor;

mod ops;

pub use ops::ViewOps;

/// A view of `tensor`'s storage with new geometry. `storage_offset` defaults to
/// the input's offset. Never contacts the backend.
pub fn as_strided(
    tensor: &Tensor,
    size: &[usize],
    stride: &[usize],
    storage_offset: Option<usize>,
) -> Result<Tensor> {
    if !tensor.device().is_remote() {
        return Err(RemoteTensorError::precondition(format!(
            "as_strided expects a remote tensor, got a tensor on {}",
            tensor.device()
        )));
    }
    restride(tensor, size, stride, storage_offset)
}

/// Points `tensor` at `storage` with the given geometry, in place. Never
/// contacts the backend.
pub fn set_storage(
    tensor: &mut Tensor,
    storage: Storage,
    storage_offset: usize,
    size: &[usize],
    stride: &[usize],
) -> Result<()> {
    check_rank(size, stride)?;
    tensor.rebind(storage, storage_offset, size.to_vec(), Stride::from(stride))
}

/// Makes `dst` alias `src`: same storage, offset, size and stride.
pub fn set_source_tensor(dst: &mut Tensor, src: &Tensor) -> Result<()> {
    set_storage(
        dst,
        src.storage().clone(),
        src.storage_offset(),
        src.size(),
        src.stride(),
    )
}

/// The local view construction shared by `as_strided` and [`ViewOps`].
pub(crate) fn restride(
    tensor: &Tensor,
    size: &[usize],
    stride: &[usize],
    storage_offset: Option<usize>,
) -> Result<Tensor> {
    check_rank(size, stride)?;
    Tensor::from_parts(
        tensor.storage().clone(),
        size.to_vec(),
        Stride::from(stride),
        storage_offset.unwrap_or_else(|| tensor.storage_offset()),
        tensor.dtype(),
    )
}

fn check_rank(size: &[usize], stride: &[usize]) -> Result<()> {
    if size.len() != stride.len() {
        return Err(RemoteTensorError::invalid_input(format!(
            "mismatch in length of strides and shape: {} vs {}",
            stride.len(),
            size.len()
        )));
    }
    Ok(())
}

#[cfg(all(test, feature = "loopback"))]
mod tests {
    use super::*;
    use crate::backend::{LoopbackBackend, LoopbackConfig};
    use crate::device::Device;
    use crate::dtype::DType;
    use crate::factory::{empty_cpu, TensorFactory};
    use crate::storage::RemoteAllocator;
    use crate::tensor::TensorOptions;
    use std::sync::Arc;

    fn remote(size: &[usize]) -> (Arc<LoopbackBackend>, Tensor) {
        let backend = Arc::new(LoopbackBackend::new(LoopbackConfig::with_devices(1)));
        let factory = TensorFactory::new(Arc::new(RemoteAllocator::new(backend.clone())));
        let tensor = factory
            .empty(size, &TensorOptions::new().dtype(DType::F32).device(Device::remote(0)), None)
            .unwrap();
        (backend, tensor)
    }

    #[test]
    fn test_as_strided_shares_storage_without_backend_calls() {
        let (backend, tensor) = remote(&[4, 4]);
        backend.reset_calls();

        let view = as_strided(&tensor, &[2, 2], &[4, 1], Some(5)).unwrap();
        assert_eq!(view.size(), &[2, 2]);
        assert_eq!(view.stride(), &[4, 1]);
        assert_eq!(view.storage_offset(), 5);
        assert_eq!(view.storage_handle(), tensor.storage_handle());
        assert!(view.storage().is_alias_of(tensor.storage()));
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn test_as_strided_keeps_offset_by_default() {
        let (_backend, tensor) = remote(&[8]);
        let shifted = as_strided(&tensor, &[4], &[1], Some(2)).unwrap();
        let view = as_strided(&shifted, &[2], &[2], None).unwrap();
        assert_eq!(view.storage_offset(), 2);
    }

    #[test]
    fn test_as_strided_on_cpu_is_rejected() {
        let tensor = empty_cpu(&[4], DType::F32).unwrap();
        let err = as_strided(&tensor, &[2], &[1], None).unwrap_err();
        assert!(matches!(err, RemoteTensorError::Precondition(_)));
    }

    #[test]
    fn test_as_strided_bounds() {
        let (_backend, tensor) = remote(&[4]);
        assert!(matches!(
            as_strided(&tensor, &[4], &[1], Some(1)),
            Err(RemoteTensorError::StorageOutOfBounds { .. })
        ));
        assert!(as_strided(&tensor, &[4], &[1, 1], None).is_err());
    }

    #[test]
    fn test_set_storage_rebinds_in_place() {
        let (backend, source) = remote(&[6]);
        let (_other, mut target) = remote(&[2]);
        backend.reset_calls();

        set_storage(&mut target, source.storage().clone(), 2, &[2, 2], &[2, 1]).unwrap();
        assert_eq!(target.storage_handle(), source.storage_handle());
        assert_eq!(target.size(), &[2, 2]);
        assert_eq!(target.storage_offset(), 2);
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn test_set_source_tensor() {
        let (_backend, source) = remote(&[3, 2]);
        let source = as_strided(&source, &[2, 3], &[1, 2], Some(0)).unwrap();
        let (_other, mut target) = remote(&[1]);

        set_source_tensor(&mut target, &source).unwrap();
        assert!(target.storage().is_alias_of(source.storage()));
        assert_eq!(target.stride(), &[1, 2]);
    }
}
