//! Remote tensor storage for a strided tensor host.
//!
//! Tensors built here look like ordinary strided tensors, but their storage
//! lives on a remote backend. The data pointer of every remote storage is a
//! [`StorageHandle`]: a non-zero 64-bit id minted by the backend, never an
//! address. Allocation, copies and frees go through the [`RemoteBackend`]
//! callbacks; views only rewrite local descriptors.
//!
//! ```
//! # #[cfg(feature = "loopback")]
//! # fn main() -> tensorust_remote::Result<()> {
//! use std::sync::Arc;
//! use tensorust_remote::backend::{LoopbackBackend, LoopbackConfig};
//! use tensorust_remote::{Device, RemoteAllocator, TensorFactory, ViewOps};
//!
//! let backend = Arc::new(LoopbackBackend::new(LoopbackConfig::with_devices(1)));
//! let factory = TensorFactory::new(Arc::new(RemoteAllocator::new(backend)));
//!
//! let tensor = factory.empty_typed::<f32>(&[4, 4], Device::remote(0))?;
//! let transposed = tensor.transpose(0, 1)?;
//! assert_eq!(transposed.storage_handle(), tensor.storage_handle());
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "loopback"))]
//! # fn main() {}
//! ```

pub mod backend;
pub mod copy;
pub mod device;
pub mod dimension;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod factory;
pub mod layout;
pub mod metadata;
pub mod runtime;
pub mod storage;
pub mod tensor;
pub mod view;

pub use backend::{BackendError, CallbackMethod, RemoteBackend};
pub use copy::copy_;
pub use device::{Device, DeviceIndex, DeviceType, DeviceValidator};
pub use dispatch::{DispatchKey, Dispatcher, OpCall, OpOutput};
pub use dtype::DType;
pub use error::{RemoteTensorError, Result};
pub use factory::{empty_cpu, TensorFactory};
pub use layout::{Layout, MemoryFormat};
pub use metadata::TensorMetadata;
pub use runtime::RemoteRuntime;
pub use storage::{Allocator, RemoteAllocator, Storage, StorageHandle};
pub use tensor::{Tensor, TensorOptions};
pub use view::{as_strided, set_source_tensor, set_storage, ViewOps};
