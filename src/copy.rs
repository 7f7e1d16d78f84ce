//! Byte copies between remote tensors on the same device.

use crate::error::{RemoteTensorError, Result};
use crate::tensor::Tensor;
use tracing::debug;

/// Copies the elements of `src` into `dst`, both remote and on the same device.
///
/// Both tensors must share dtype and size and be contiguous from offset zero,
/// so the copy is a single `numel * itemsize` byte transfer between the two
/// storage handles.
pub fn copy_(dst: &mut Tensor, src: &Tensor) -> Result<()> {
    let (to, from) = (dst.device(), src.device());
    if !to.is_remote() || !from.is_remote() {
        return Err(RemoteTensorError::precondition(format!(
            "copy_ expects remote tensors, got {from} -> {to}"
        )));
    }
    if to.index() != from.index() {
        return Err(RemoteTensorError::precondition(format!(
            "Cannot transfer tensor between different remote devices. \
             Source device index {}, target device index {}",
            from.index(),
            to.index()
        )));
    }
    if dst.dtype() != src.dtype() {
        return Err(RemoteTensorError::precondition(format!(
            "copy_ expects matching dtypes, got {} -> {}",
            src.dtype(),
            dst.dtype()
        )));
    }
    if dst.size() != src.size() {
        return Err(RemoteTensorError::precondition(format!(
            "copy_ expects matching sizes, got {:?} -> {:?}",
            src.size(),
            dst.size()
        )));
    }
    for tensor in [&*dst, src] {
        if !tensor.is_contiguous() || tensor.storage_offset() != 0 {
            return Err(RemoteTensorError::UnsupportedFeature(
                "copy_ between remote tensors needs contiguous tensors at offset 0".to_string(),
            ));
        }
    }

    if dst.storage().is_alias_of(src.storage()) {
        debug!("copy_ onto the same storage skipped");
        return Ok(());
    }

    let nbytes = src.nbytes();
    dst.storage()
        .allocator()
        .copy_data(dst.storage().data_ptr(), src.storage().data_ptr(), nbytes)
}
