//! Plain snapshots of tensor descriptors.
//!
//! A snapshot carries everything needed to describe a tensor to the backend
//! without holding a reference to its storage.

use crate::dtype::DType;
use crate::storage::StorageHandle;
use crate::tensor::Tensor;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorMetadata {
    /// A host tensor; there is no handle to name.
    Local {
        shape: Vec<usize>,
        stride: Vec<usize>,
        storage_offset: usize,
        dtype: DType,
    },
    Remote {
        shape: Vec<usize>,
        stride: Vec<usize>,
        storage_offset: usize,
        dtype: DType,
        storage_id: StorageHandle,
    },
}

impl TensorMetadata {
    pub fn of(tensor: &Tensor) -> Self {
        let shape = tensor.size().to_vec();
        let stride = tensor.stride().to_vec();
        let storage_offset = tensor.storage_offset();
        let dtype = tensor.dtype();

        match tensor.storage_handle() {
            Some(storage_id) => TensorMetadata::Remote {
                shape,
                stride,
                storage_offset,
                dtype,
                storage_id,
            },
            None => TensorMetadata::Local {
                shape,
                stride,
                storage_offset,
                dtype,
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, TensorMetadata::Remote { .. })
    }

    pub fn storage_handle(&self) -> Option<StorageHandle> {
        match self {
            TensorMetadata::Remote { storage_id, .. } => Some(*storage_id),
            TensorMetadata::Local { .. } => None,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            TensorMetadata::Local { shape, .. } | TensorMetadata::Remote { shape, .. } => shape,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            TensorMetadata::Local { dtype, .. } | TensorMetadata::Remote { dtype, .. } => *dtype,
        }
    }
}

impl fmt::Display for TensorMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorMetadata::Local {
                shape,
                stride,
                storage_offset,
                dtype,
            } => write!(
                f,
                "LocalTensorMetadata(shape={shape:?}, stride={stride:?}, storage_offset={storage_offset}, dtype={dtype})"
            ),
            TensorMetadata::Remote {
                shape,
                stride,
                storage_offset,
                dtype,
                storage_id,
            } => write!(
                f,
                "RemoteTensorMetadata(shape={shape:?}, stride={stride:?}, storage_offset={storage_offset}, dtype={dtype}, storage_id={storage_id})"
            ),
        }
    }
}
