//! Shape-changing views built on `as_strided`.
//!
//! Each operation works out the new size and stride from the descriptor alone
//! and then re-strides the same storage, so remote views keep their handle and
//! never reach the backend.

use super::{as_strided, restride};
use crate::dimension::{self, infer_size, Stride};
use crate::error::{RemoteTensorError, Result};
use crate::tensor::Tensor;

/// A trait for view operations on tensors.
pub trait ViewOps {
    /// Swaps two dimensions.
    fn transpose(&self, dim0: usize, dim1: usize) -> Result<Tensor>;

    /// Reorders all dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if `dims` is not a permutation of the tensor's axes.
    fn permute(&self, dims: &[usize]) -> Result<Tensor>;

    /// Removes every dimension of extent 1.
    fn squeeze(&self) -> Result<Tensor>;

    /// Removes `dim` if its extent is 1, otherwise returns an alias.
    fn squeeze_dim(&self, dim: usize) -> Result<Tensor>;

    /// Inserts a dimension of extent 1 at `dim`.
    fn unsqueeze(&self, dim: usize) -> Result<Tensor>;

    /// Reinterprets the tensor with a new shape; one entry may be `-1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the element count differs or the current strides
    /// cannot express the new shape without copying.
    fn view(&self, shape: &[isize]) -> Result<Tensor>;

    /// Collapses all dimensions into one.
    fn flatten(&self) -> Result<Tensor>;
}

impl ViewOps for Tensor {
    fn transpose(&self, dim0: usize, dim1: usize) -> Result<Tensor> {
        let ndim = self.ndim();
        for dim in [dim0, dim1] {
            if dim >= ndim {
                return Err(RemoteTensorError::invalid_axis(dim, ndim));
            }
        }

        let mut size = self.size().to_vec();
        let mut stride = self.stride().to_vec();
        size.swap(dim0, dim1);
        stride.swap(dim0, dim1);
        self.restrided(&size, &stride)
    }

    fn permute(&self, dims: &[usize]) -> Result<Tensor> {
        let ndim = self.ndim();
        if dims.len() != ndim {
            return Err(RemoteTensorError::InvalidAxes(dims.to_vec(), ndim));
        }

        let mut seen = vec![false; ndim];
        for &axis in dims {
            if axis >= ndim {
                return Err(RemoteTensorError::invalid_axis(axis, ndim));
            }
            if seen[axis] {
                return Err(RemoteTensorError::DuplicateAxis(axis));
            }
            seen[axis] = true;
        }

        let size: Vec<usize> = dims.iter().map(|&axis| self.size()[axis]).collect();
        let stride = Stride::from(self.stride()).permute(dims)?;
        self.restrided(&size, stride.as_slice())
    }

    fn squeeze(&self) -> Result<Tensor> {
        let (size, stride): (Vec<usize>, Vec<usize>) = self
            .size()
            .iter()
            .zip(self.stride())
            .filter(|(extent, _)| **extent != 1)
            .map(|(extent, step)| (*extent, *step))
            .unzip();
        self.restrided(&size, &stride)
    }

    fn squeeze_dim(&self, dim: usize) -> Result<Tensor> {
        let ndim = self.ndim();
        if dim >= ndim {
            return Err(RemoteTensorError::invalid_axis(dim, ndim));
        }

        let mut size = self.size().to_vec();
        let mut stride = self.stride().to_vec();
        if size[dim] == 1 {
            size.remove(dim);
            stride.remove(dim);
        }
        self.restrided(&size, &stride)
    }

    fn unsqueeze(&self, dim: usize) -> Result<Tensor> {
        let ndim = self.ndim();
        if dim > ndim {
            return Err(RemoteTensorError::invalid_axis(dim, ndim));
        }

        let new_stride = if dim >= ndim {
            1
        } else {
            self.size()[dim].checked_mul(self.stride()[dim]).ok_or_else(|| {
                RemoteTensorError::invalid_shape(format!("stride for new dimension {dim} overflows"))
            })?
        };
        let mut size = self.size().to_vec();
        let mut stride = self.stride().to_vec();
        size.insert(dim, 1);
        stride.insert(dim, new_stride);
        self.restrided(&size, &stride)
    }

    fn view(&self, shape: &[isize]) -> Result<Tensor> {
        let size = infer_size(shape, self.numel())?;
        let stride = view_stride(self.size(), self.stride(), &size)?.ok_or_else(|| {
            RemoteTensorError::invalid_input(
                "view size is not compatible with input tensor's size and stride",
            )
        })?;
        self.restrided(&size, &stride)
    }

    fn flatten(&self) -> Result<Tensor> {
        self.view(&[-1])
    }
}

impl Tensor {
    fn restrided(&self, size: &[usize], stride: &[usize]) -> Result<Tensor> {
        if self.device().is_remote() {
            as_strided(self, size, stride, None)
        } else {
            restride(self, size, stride, None)
        }
    }
}

/// Strides that let `new_size` alias a tensor of `old_size`/`old_stride`, or
/// `None` if a copy would be needed. Groups of old dimensions that are
/// contiguous with each other may be split or merged freely.
fn view_stride(
    old_size: &[usize],
    old_stride: &[usize],
    new_size: &[usize],
) -> Result<Option<Vec<usize>>> {
    if old_size.is_empty() {
        return Ok(Some(vec![1; new_size.len()]));
    }

    if dimension::checked_numel(old_size)? == 0 {
        if old_size == new_size {
            return Ok(Some(old_stride.to_vec()));
        }
        return Ok(Some(Stride::row_major(new_size)?.into_vec()));
    }

    let overflow = || RemoteTensorError::invalid_shape(format!("view strides overflow for {new_size:?}"));
    let mut new_stride = vec![0; new_size.len()];
    let mut view_d = new_size.len() as isize - 1;
    let Some(&last_stride) = old_stride.last() else {
        return Ok(None);
    };
    let mut chunk_base_stride = last_stride;
    let mut tensor_numel: usize = 1;
    let mut view_numel: usize = 1;

    for tensor_d in (0..old_size.len()).rev() {
        tensor_numel = tensor_numel.checked_mul(old_size[tensor_d]).ok_or_else(overflow)?;
        let chunk_ends = tensor_d == 0
            || (old_size[tensor_d - 1] != 1
                && tensor_numel
                    .checked_mul(chunk_base_stride)
                    .map_or(true, |span| old_stride[tensor_d - 1] != span));
        if !chunk_ends {
            continue;
        }

        while view_d >= 0 && (view_numel < tensor_numel || new_size[view_d as usize] == 1) {
            new_stride[view_d as usize] = view_numel.checked_mul(chunk_base_stride).ok_or_else(overflow)?;
            view_numel = view_numel.checked_mul(new_size[view_d as usize]).ok_or_else(overflow)?;
            view_d -= 1;
        }
        if view_numel != tensor_numel {
            return Ok(None);
        }
        if tensor_d > 0 {
            chunk_base_stride = old_stride[tensor_d - 1];
            tensor_numel = 1;
            view_numel = 1;
        }
    }

    Ok((view_d == -1).then_some(new_stride))
}
