//! Strided tensor descriptors.
//!
//! A `Tensor` is bookkeeping only: which storage it aliases and how to walk it.
//! For remote tensors the storage's data pointer is a handle, so nothing here
//! ever reads element data.

use crate::device::Device;
use crate::dimension::{self, Stride};
use crate::dtype::DType;
use crate::error::{RemoteTensorError, Result};
use crate::layout::Layout;
use crate::storage::{Storage, StorageHandle};

/// A strided view over a [`Storage`]. Clones share the storage.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Storage,
    sizes: Vec<usize>,
    strides: Stride,
    storage_offset: usize,
    dtype: DType,
}

impl Tensor {
    /// Builds a descriptor directly, bypassing dispatch. Checks that the
    /// described elements lie inside `storage`.
    pub(crate) fn from_parts(
        storage: Storage,
        sizes: Vec<usize>,
        strides: Stride,
        storage_offset: usize,
        dtype: DType,
    ) -> Result<Self> {
        check_in_bounds(&storage, &sizes, strides.as_slice(), storage_offset, dtype)?;
        Ok(Self {
            storage,
            sizes,
            strides,
            storage_offset,
            dtype,
        })
    }

    /// Points this descriptor at new storage and geometry, keeping the dtype.
    /// On error the descriptor is left untouched.
    pub(crate) fn rebind(
        &mut self,
        storage: Storage,
        storage_offset: usize,
        sizes: Vec<usize>,
        strides: Stride,
    ) -> Result<()> {
        check_in_bounds(&storage, &sizes, strides.as_slice(), storage_offset, self.dtype)?;
        self.storage = storage;
        self.storage_offset = storage_offset;
        self.sizes = sizes;
        self.strides = strides;
        Ok(())
    }

    pub fn size(&self) -> &[usize] {
        &self.sizes
    }

    pub fn stride(&self) -> &[usize] {
        self.strides.as_slice()
    }

    pub fn storage_offset(&self) -> usize {
        self.storage_offset
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn layout(&self) -> Layout {
        Layout::Strided
    }

    pub fn device(&self) -> Device {
        self.storage.device()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The remote handle of the backing storage; `None` for host tensors.
    pub fn storage_handle(&self) -> Option<StorageHandle> {
        self.storage.handle()
    }

    pub fn ndim(&self) -> usize {
        self.sizes.len()
    }

    pub fn numel(&self) -> usize {
        dimension::numel(&self.sizes)
    }

    pub fn nbytes(&self) -> usize {
        self.numel() * self.dtype.size_in_bytes()
    }

    pub fn is_contiguous(&self) -> bool {
        dimension::is_contiguous(&self.sizes, self.strides.as_slice())
    }
}

fn check_in_bounds(
    storage: &Storage,
    sizes: &[usize],
    strides: &[usize],
    storage_offset: usize,
    dtype: DType,
) -> Result<()> {
    // Keeps `numel` and `nbytes` free of overflow for every descriptor.
    dimension::checked_nbytes(sizes, dtype.size_in_bytes())?;
    let required =
        dimension::compute_storage_nbytes(sizes, strides, dtype.size_in_bytes(), storage_offset)?;
    if required > storage.nbytes() {
        return Err(RemoteTensorError::StorageOutOfBounds {
            required,
            available: storage.nbytes(),
        });
    }
    Ok(())
}

/// Optional construction parameters; unset fields take the factory defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TensorOptions {
    pub dtype: Option<DType>,
    pub layout: Option<Layout>,
    pub device: Option<Device>,
    pub pin_memory: Option<bool>,
}

impl TensorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn pin_memory(mut self, pin_memory: bool) -> Self {
        self.pin_memory = Some(pin_memory);
        self
    }
}
