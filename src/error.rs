use crate::backend::BackendError;
use crate::device::{DeviceIndex, DeviceType};
use crate::layout::Layout;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteTensorError {
    #[error("Failed to allocate storage with ID {handle} ({nbytes} bytes) on remote device {device}")]
    Allocation {
        handle: u64,
        nbytes: usize,
        device: DeviceIndex,
    },
    #[error("Backend minted invalid storage handle {0}")]
    InvalidHandle(u64),
    #[error("Failed to copy {nbytes} bytes from storage {src} to storage {dest}")]
    Copy {
        dest: u64,
        src: u64,
        nbytes: usize,
        #[source]
        source: BackendError,
    },
    #[error("Invalid device index: {0}")]
    InvalidDevice(DeviceIndex),
    #[error("Only strided layout is supported, got {0:?}")]
    UnsupportedLayout(Layout),
    #[error("{0}")]
    UnsupportedFeature(String),
    #[error("{0}")]
    Precondition(String),
    #[error("Storage of {available} bytes is too small, view needs {required} bytes")]
    StorageOutOfBounds { required: usize, available: usize },
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
    #[error("Invalid axis: {0} for tensor of dimension {1}")]
    InvalidAxis(usize, usize),
    #[error("Duplicate axis: {0}")]
    DuplicateAxis(usize),
    #[error("Invalid axes: {0:?} for tensor of dimension {1}")]
    InvalidAxes(Vec<usize>, usize),
    #[error("Reshape error: cannot view tensor of size {0:?} as {1:?}")]
    ReshapeError(Vec<usize>, Vec<isize>),
    #[error("Invalid pointer")]
    InvalidPointer,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("No kernel registered for {op} on {key:?}")]
    NoKernel { op: String, key: crate::dispatch::DispatchKey },
    #[error("Kernel for {op} on {key:?} is already registered")]
    DuplicateKernel { op: String, key: crate::dispatch::DispatchKey },
    #[error("An allocator is already registered for {0:?}")]
    AllocatorAlreadyRegistered(DeviceType),
    #[error("Remote runtime is already installed")]
    AlreadyInstalled,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RemoteTensorError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn invalid_axis(axis: usize, ndim: usize) -> Self {
        Self::InvalidAxis(axis, ndim)
    }
}

pub type Result<T, E = RemoteTensorError> = std::result::Result<T, E>;
