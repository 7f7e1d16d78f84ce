//! A small operator table keyed by dispatch key and operator name.
//!
//! The host framework routes each named operation to the kernel registered for
//! the device type of its arguments. Anything without a kernel goes to the
//! key's fallback when one is set.

mod registrar;

pub use registrar::register_remote_kernels;

use crate::device::DeviceType;
use crate::error::{RemoteTensorError, Result};
use crate::layout::MemoryFormat;
use crate::storage::Storage;
use crate::tensor::{Tensor, TensorOptions};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const EMPTY_MEMORY_FORMAT: &str = "aten::empty.memory_format";
pub const EMPTY_STRIDED: &str = "aten::empty_strided";
pub const AS_STRIDED: &str = "aten::as_strided";
pub const SET_SOURCE_STORAGE: &str = "aten::set_.source_Storage_storage_offset";

/// The operators the remote device must own locally.
pub const REMOTE_OPERATORS: [&str; 4] = [EMPTY_MEMORY_FORMAT, EMPTY_STRIDED, AS_STRIDED, SET_SOURCE_STORAGE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKey {
    Cpu,
    Remote,
}

impl From<DeviceType> for DispatchKey {
    fn from(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Cpu => DispatchKey::Cpu,
            DeviceType::Remote => DispatchKey::Remote,
        }
    }
}

/// Arguments of one operator invocation.
pub enum OpCall<'a> {
    Empty {
        size: &'a [usize],
        options: TensorOptions,
        memory_format: Option<MemoryFormat>,
    },
    EmptyStrided {
        size: &'a [usize],
        stride: &'a [usize],
        options: TensorOptions,
    },
    AsStrided {
        tensor: &'a Tensor,
        size: &'a [usize],
        stride: &'a [usize],
        storage_offset: Option<usize>,
    },
    SetStorage {
        tensor: &'a mut Tensor,
        storage: Storage,
        storage_offset: usize,
        size: &'a [usize],
        stride: &'a [usize],
    },
    /// Any operator this crate does not model; only its tensor arguments.
    Other(&'a [Tensor]),
}

impl OpCall<'_> {
    fn kind(&self) -> &'static str {
        match self {
            OpCall::Empty { .. } => "empty",
            OpCall::EmptyStrided { .. } => "empty_strided",
            OpCall::AsStrided { .. } => "as_strided",
            OpCall::SetStorage { .. } => "set_storage",
            OpCall::Other(_) => "other",
        }
    }

    /// Error for a kernel handed arguments of another operator.
    pub fn mismatch(&self, op: &str) -> RemoteTensorError {
        RemoteTensorError::invalid_input(format!("{op} cannot take {} arguments", self.kind()))
    }
}

#[derive(Debug)]
pub enum OpOutput {
    Tensor(Tensor),
    InPlace,
}

impl OpOutput {
    pub fn into_tensor(self) -> Result<Tensor> {
        match self {
            OpOutput::Tensor(tensor) => Ok(tensor),
            OpOutput::InPlace => Err(RemoteTensorError::invalid_input(
                "operator returned no new tensor",
            )),
        }
    }
}

pub type Kernel = Arc<dyn Fn(OpCall<'_>) -> Result<OpOutput> + Send + Sync>;

/// Receives every operator on its key that has no kernel, by name.
pub type Fallback = Arc<dyn Fn(&str, OpCall<'_>) -> Result<OpOutput> + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    kernels: HashMap<(DispatchKey, String), Kernel>,
    fallbacks: HashMap<DispatchKey, Fallback>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kernel` for `op` under `key`. Each pair can be bound once.
    pub fn impl_kernel(&mut self, key: DispatchKey, op: &str, kernel: Kernel) -> Result<()> {
        let slot = (key, op.to_string());
        if self.kernels.contains_key(&slot) {
            return Err(RemoteTensorError::DuplicateKernel {
                op: op.to_string(),
                key,
            });
        }
        self.kernels.insert(slot, kernel);
        Ok(())
    }

    /// Sets the handler for unbound operators on `key`, replacing any previous one.
    pub fn set_fallback(&mut self, key: DispatchKey, fallback: Fallback) {
        self.fallbacks.insert(key, fallback);
    }

    pub fn has_kernel(&self, key: DispatchKey, op: &str) -> bool {
        self.kernels.contains_key(&(key, op.to_string()))
    }

    /// Operator names bound under `key`, sorted.
    pub fn operators(&self, key: DispatchKey) -> Vec<&str> {
        let mut ops: Vec<&str> = self
            .kernels
            .keys()
            .filter(|(k, _)| *k == key)
            .map(|(_, op)| op.as_str())
            .collect();
        ops.sort_unstable();
        ops
    }

    pub fn call(&self, key: DispatchKey, op: &str, call: OpCall<'_>) -> Result<OpOutput> {
        if let Some(kernel) = self.kernels.get(&(key, op.to_string())) {
            return kernel(call);
        }
        match self.fallbacks.get(&key) {
            Some(fallback) => fallback(op, call),
            None => Err(RemoteTensorError::NoKernel {
                op: op.to_string(),
                key,
            }),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kernels", &self.kernels.len())
            .field("fallbacks", &self.fallbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}
