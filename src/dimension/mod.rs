//! Shape and stride arithmetic for strided descriptors.
//!
//! Nothing here touches storage; these helpers size allocations and check that
//! views stay inside the storage they alias.

use crate::error::{RemoteTensorError, Result};

pub mod shape;
pub mod stride;

pub use shape::infer_size;
pub use stride::Stride;

/// Number of elements described by `size`. Any zero extent makes the count
/// zero without multiplying the others.
///
/// Only for geometry already accepted by [`checked_numel`]; every tensor
/// descriptor is.
pub fn numel(size: &[usize]) -> usize {
    if size.contains(&0) {
        return 0;
    }
    size.iter().product()
}

/// Number of elements described by `size`, or `InvalidShape` if it does not
/// fit in `usize`.
pub fn checked_numel(size: &[usize]) -> Result<usize> {
    if size.contains(&0) {
        return Ok(0);
    }
    size.iter()
        .try_fold(1usize, |count, &extent| count.checked_mul(extent))
        .ok_or_else(|| RemoteTensorError::invalid_shape(format!("number of elements overflows for {size:?}")))
}

/// Bytes needed for `numel(size)` elements of `itemsize` bytes.
pub fn checked_nbytes(size: &[usize], itemsize: usize) -> Result<usize> {
    checked_numel(size)?
        .checked_mul(itemsize)
        .ok_or_else(|| RemoteTensorError::invalid_shape(format!("tensor of size {size:?} is too large")))
}

/// Bytes of storage a tensor of `size`/`stride` starting at `storage_offset`
/// needs. Zero when the tensor has no elements.
pub fn compute_storage_nbytes(
    size: &[usize],
    stride: &[usize],
    itemsize: usize,
    storage_offset: usize,
) -> Result<usize> {
    if size.len() != stride.len() {
        return Err(RemoteTensorError::invalid_input(format!(
            "mismatch in length of strides and shape: {} vs {}",
            stride.len(),
            size.len()
        )));
    }
    if size.contains(&0) {
        return Ok(0);
    }

    let overflow = || RemoteTensorError::invalid_shape(format!("storage size overflows for {size:?}"));
    let mut last = storage_offset;
    for (&extent, &step) in size.iter().zip(stride) {
        let span = (extent - 1).checked_mul(step).ok_or_else(overflow)?;
        last = last.checked_add(span).ok_or_else(overflow)?;
    }
    last.checked_add(1)
        .and_then(|elements| elements.checked_mul(itemsize))
        .ok_or_else(overflow)
}

/// Whether `stride` is the row-major layout of `size`, ignoring extent-1 dims.
pub fn is_contiguous(size: &[usize], stride: &[usize]) -> bool {
    if numel(size) == 0 {
        return true;
    }
    let mut expected = 1;
    for (&extent, &step) in size.iter().zip(stride).rev() {
        if extent == 1 {
            continue;
        }
        if step != expected {
            return false;
        }
        match expected.checked_mul(extent) {
            Some(next) => expected = next,
            None => return false,
        }
    }
    true
}
