//! Integration tests for the remote operator table.

#![cfg(feature = "loopback")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tensorust_remote::backend::{LoopbackBackend, LoopbackConfig};
use tensorust_remote::dispatch::{
    register_remote_kernels, AS_STRIDED, EMPTY_MEMORY_FORMAT, REMOTE_OPERATORS, SET_SOURCE_STORAGE,
};
use tensorust_remote::{
    CallbackMethod, DispatchKey, Dispatcher, OpCall, OpOutput, RemoteAllocator, RemoteTensorError,
    Result, TensorFactory, TensorOptions,
};

fn setup() -> (Arc<LoopbackBackend>, Dispatcher) {
    let backend = Arc::new(LoopbackBackend::new(LoopbackConfig::with_devices(1)));
    let factory = Arc::new(TensorFactory::new(Arc::new(RemoteAllocator::new(backend.clone()))));
    let mut dispatcher = Dispatcher::new();
    register_remote_kernels(&mut dispatcher, factory).unwrap();
    (backend, dispatcher)
}

#[test]
fn test_only_remote_operators_are_bound() {
    let (_backend, dispatcher) = setup();
    for op in REMOTE_OPERATORS {
        assert!(dispatcher.has_kernel(DispatchKey::Remote, op));
    }
    assert!(!dispatcher.has_kernel(DispatchKey::Remote, "aten::add.Tensor"));
    assert!(matches!(
        dispatcher.call(DispatchKey::Remote, "aten::add.Tensor", OpCall::Other(&[])),
        Err(RemoteTensorError::NoKernel { .. })
    ));
}

#[test]
fn test_unbound_operators_reach_fallback() {
    let (backend, mut dispatcher) = setup();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    dispatcher.set_fallback(
        DispatchKey::Remote,
        Arc::new(move |_op: &str, call: OpCall<'_>| -> Result<OpOutput> {
            match call {
                OpCall::Other(tensors) => {
                    counter.fetch_add(tensors.len(), Ordering::SeqCst);
                    Ok(OpOutput::InPlace)
                }
                other => Err(other.mismatch("fallback")),
            }
        }),
    );

    let tensor = dispatcher
        .call(
            DispatchKey::Remote,
            EMPTY_MEMORY_FORMAT,
            OpCall::Empty {
                size: &[2],
                options: TensorOptions::new(),
                memory_format: None,
            },
        )
        .unwrap()
        .into_tensor()
        .unwrap();

    let args = [tensor.clone(), tensor];
    dispatcher
        .call(DispatchKey::Remote, "aten::mul.Tensor", OpCall::Other(&args))
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(backend.calls(CallbackMethod::CreateStorage), 1);
}

#[test]
fn test_bound_views_skip_backend() {
    let (backend, dispatcher) = setup();
    let source = dispatcher
        .call(
            DispatchKey::Remote,
            EMPTY_MEMORY_FORMAT,
            OpCall::Empty {
                size: &[4, 4],
                options: TensorOptions::new(),
                memory_format: None,
            },
        )
        .unwrap()
        .into_tensor()
        .unwrap();
    let mut target = dispatcher
        .call(
            DispatchKey::Remote,
            AS_STRIDED,
            OpCall::AsStrided {
                tensor: &source,
                size: &[2],
                stride: &[1],
                storage_offset: Some(3),
            },
        )
        .unwrap()
        .into_tensor()
        .unwrap();
    backend.reset_calls();

    let out = dispatcher
        .call(
            DispatchKey::Remote,
            SET_SOURCE_STORAGE,
            OpCall::SetStorage {
                tensor: &mut target,
                storage: source.storage().clone(),
                storage_offset: 0,
                size: &[16],
                stride: &[1],
            },
        )
        .unwrap();
    assert!(matches!(out, OpOutput::InPlace));
    assert_eq!(target.size(), &[16]);
    assert_eq!(backend.total_calls(), 0);
}
