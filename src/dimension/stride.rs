//! Stride handling for tensors.
//!
//! Strides are counted in elements: the number of elements to skip in storage
//! to move one step along each dimension.

use crate::error::{RemoteTensorError, Result};
use crate::layout::MemoryFormat;
use std::ops::Index;

/// Represents the stride of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Stride {
    strides: Vec<usize>,
}

impl Stride {
    /// Creates a new stride from a vector of strides.
    pub fn new(strides: Vec<usize>) -> Self {
        Self { strides }
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.strides.len()
    }

    /// Returns the stride values as a slice.
    pub fn as_slice(&self) -> &[usize] {
        &self.strides
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.strides
    }

    /// Row-major strides for `shape`. Zero-sized dimensions count as one so
    /// every stride stays non-zero.
    pub fn row_major(shape: &[usize]) -> Result<Self> {
        let ndim = shape.len();
        let mut strides = vec![1usize; ndim];

        for i in (0..ndim.saturating_sub(1)).rev() {
            strides[i] = strides[i + 1]
                .checked_mul(shape[i + 1].max(1))
                .ok_or_else(|| overflow(shape))?;
        }

        Ok(Self { strides })
    }

    /// Channels-last strides: the channel dimension (index 1) varies fastest.
    /// Needs a 4-d shape for [`MemoryFormat::ChannelsLast`] and a 5-d shape
    /// for [`MemoryFormat::ChannelsLast3d`].
    pub fn channels_last(shape: &[usize]) -> Result<Self> {
        let ndim = shape.len();
        if ndim < 3 {
            return Err(RemoteTensorError::invalid_input(
                "channels last format needs at least 3 dimensions",
            ));
        }

        let grow = |step: usize, extent: usize| step.checked_mul(extent.max(1)).ok_or_else(|| overflow(shape));
        let mut strides = vec![0; ndim];
        let mut step = 1;
        strides[1] = step;
        step = grow(step, shape[1])?;
        for i in (2..ndim).rev() {
            strides[i] = step;
            step = grow(step, shape[i])?;
        }
        strides[0] = step;

        Ok(Self { strides })
    }

    /// Strides for a new tensor of `shape` laid out in `format`.
    pub fn for_memory_format(shape: &[usize], format: MemoryFormat) -> Result<Self> {
        match format {
            MemoryFormat::Contiguous => Self::row_major(shape),
            MemoryFormat::ChannelsLast if shape.len() == 4 => Self::channels_last(shape),
            MemoryFormat::ChannelsLast => Err(RemoteTensorError::invalid_input(
                "required rank 4 tensor to use channels_last format",
            )),
            MemoryFormat::ChannelsLast3d if shape.len() == 5 => Self::channels_last(shape),
            MemoryFormat::ChannelsLast3d => Err(RemoteTensorError::invalid_input(
                "required rank 5 tensor to use channels_last_3d format",
            )),
            MemoryFormat::Preserve => Err(RemoteTensorError::invalid_input(
                "unsupported memory format option Preserve",
            )),
        }
    }

    /// Permutes the dimensions according to the given permutation.
    pub fn permute(&self, permutation: &[usize]) -> Result<Self> {
        if permutation.len() != self.strides.len() {
            return Err(RemoteTensorError::invalid_input(
                "Permutation length must match number of dimensions",
            ));
        }

        let mut new_strides = vec![0; self.strides.len()];
        for (i, &p) in permutation.iter().enumerate() {
            if p >= self.strides.len() {
                return Err(RemoteTensorError::invalid_input("Invalid permutation index"));
            }
            new_strides[i] = self.strides[p];
        }

        Ok(Self { strides: new_strides })
    }
}

fn overflow(shape: &[usize]) -> RemoteTensorError {
    RemoteTensorError::invalid_shape(format!("strides overflow for shape {shape:?}"))
}

impl Index<usize> for Stride {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.strides[index]
    }
}

impl AsRef<[usize]> for Stride {
    fn as_ref(&self) -> &[usize] {
        &self.strides
    }
}

impl From<Vec<usize>> for Stride {
    fn from(strides: Vec<usize>) -> Self {
        Self { strides }
    }
}

impl From<&[usize]> for Stride {
    fn from(strides: &[usize]) -> Self {
        Self {
            strides: strides.to_vec(),
        }
    }
}
