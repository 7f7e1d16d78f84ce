//! Process-wide installation of a remote backend.
//!
//! Installing wires one backend into the allocator table and an operator table
//! with the remote kernels. It happens at most once per process.

use crate::backend::RemoteBackend;
use crate::device::DeviceType;
use crate::dispatch::{self, Dispatcher};
use crate::error::{RemoteTensorError, Result};
use crate::factory::TensorFactory;
use crate::storage::{registry, Allocator, RemoteAllocator};
use parking_lot::{const_mutex, Mutex};
use std::sync::{Arc, OnceLock};
use tracing::info;

static RUNTIME: OnceLock<RemoteRuntime> = OnceLock::new();
static INSTALL: Mutex<()> = const_mutex(());

/// One backend's allocator, tensor factory and operator table.
#[derive(Debug)]
pub struct RemoteRuntime {
    allocator: Arc<RemoteAllocator>,
    factory: Arc<TensorFactory>,
    dispatcher: Dispatcher,
}

impl RemoteRuntime {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Result<Self> {
        let allocator = Arc::new(RemoteAllocator::new(backend));
        let factory = Arc::new(TensorFactory::new(Arc::clone(&allocator)));
        let mut dispatcher = Dispatcher::new();
        dispatch::register_remote_kernels(&mut dispatcher, Arc::clone(&factory))?;
        Ok(Self {
            allocator,
            factory,
            dispatcher,
        })
    }

    pub fn allocator(&self) -> &Arc<RemoteAllocator> {
        &self.allocator
    }

    pub fn factory(&self) -> &TensorFactory {
        &self.factory
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// For adding a fallback or extra kernels before installing.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }
}

/// Builds a runtime for `backend` and installs it.
pub fn install(backend: Arc<dyn RemoteBackend>) -> Result<&'static RemoteRuntime> {
    install_runtime(RemoteRuntime::new(backend)?)
}

/// Installs a prepared runtime and registers its allocator for
/// [`DeviceType::Remote`].
pub fn install_runtime(runtime: RemoteRuntime) -> Result<&'static RemoteRuntime> {
    let _installing = INSTALL.lock();
    if RUNTIME.get().is_some() {
        return Err(RemoteTensorError::AlreadyInstalled);
    }

    let allocator: Arc<dyn Allocator> = runtime.allocator.clone();
    registry::register_allocator(DeviceType::Remote, allocator)?;
    let installed = RUNTIME.get_or_init(|| runtime);

    info!(
        operators = installed.dispatcher.operators(dispatch::DispatchKey::Remote).len(),
        "installed remote runtime"
    );
    Ok(installed)
}

/// The installed runtime, if any.
pub fn get() -> Option<&'static RemoteRuntime> {
    RUNTIME.get()
}
