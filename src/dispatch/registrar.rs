use super::{
    DispatchKey, Dispatcher, OpCall, OpOutput, AS_STRIDED, EMPTY_MEMORY_FORMAT, EMPTY_STRIDED,
    SET_SOURCE_STORAGE,
};
use crate::error::Result;
use crate::factory::TensorFactory;
use crate::view;
use std::sync::Arc;
use tracing::debug;

/// Binds the four remote-owned operators under [`DispatchKey::Remote`].
/// Every other operator is left to the key's fallback.
pub fn register_remote_kernels(dispatcher: &mut Dispatcher, factory: Arc<TensorFactory>) -> Result<()> {
    let empty_factory = Arc::clone(&factory);
    dispatcher.impl_kernel(
        DispatchKey::Remote,
        EMPTY_MEMORY_FORMAT,
        Arc::new(move |call: OpCall<'_>| -> Result<OpOutput> {
            match call {
                OpCall::Empty {
                    size,
                    options,
                    memory_format,
                } => empty_factory.empty(size, &options, memory_format).map(OpOutput::Tensor),
                other => Err(other.mismatch(EMPTY_MEMORY_FORMAT)),
            }
        }),
    )?;

    dispatcher.impl_kernel(
        DispatchKey::Remote,
        EMPTY_STRIDED,
        Arc::new(move |call: OpCall<'_>| -> Result<OpOutput> {
            match call {
                OpCall::EmptyStrided {
                    size,
                    stride,
                    options,
                } => factory.empty_strided(size, stride, &options).map(OpOutput::Tensor),
                other => Err(other.mismatch(EMPTY_STRIDED)),
            }
        }),
    )?;

    dispatcher.impl_kernel(
        DispatchKey::Remote,
        AS_STRIDED,
        Arc::new(|call: OpCall<'_>| -> Result<OpOutput> {
            match call {
                OpCall::AsStrided {
                    tensor,
                    size,
                    stride,
                    storage_offset,
                } => view::as_strided(tensor, size, stride, storage_offset).map(OpOutput::Tensor),
                other => Err(other.mismatch(AS_STRIDED)),
            }
        }),
    )?;

    dispatcher.impl_kernel(
        DispatchKey::Remote,
        SET_SOURCE_STORAGE,
        Arc::new(|call: OpCall<'_>| -> Result<OpOutput> {
            match call {
                OpCall::SetStorage {
                    tensor,
                    storage,
                    storage_offset,
                    size,
                    stride,
                } => {
                    view::set_storage(tensor, storage, storage_offset, size, stride)?;
                    Ok(OpOutput::InPlace)
                }
                other => Err(other.mismatch(SET_SOURCE_STORAGE)),
            }
        }),
    )?;

    debug!(count = 4, "registered remote kernels");
    Ok(())
}
