//! Storage handles and their address-shaped representation.
//!
//! The host model stores a `*mut c_void` for every buffer. For remote storage
//! that value is the handle itself, reinterpreted. The two conversions below are
//! the only places that reinterpretation happens; the resulting pointer is never
//! dereferenced.

use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroU64;

#[cfg(not(target_pointer_width = "64"))]
compile_error!("storage handles are stored in data pointers and need 64-bit addresses");

/// Globally unique identifier of one remote storage allocation. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageHandle(NonZeroU64);

impl StorageHandle {
    /// Returns `None` for zero, which is reserved for "no storage".
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// The opaque data reference stored in place of an address.
    pub fn into_ptr(self) -> *mut c_void {
        self.0.get() as usize as *mut c_void
    }

    /// Reads a handle back out of an opaque data reference. Null yields `None`.
    pub fn from_ptr(ptr: *const c_void) -> Option<Self> {
        Self::new(ptr as usize as u64)
    }
}

impl From<StorageHandle> for u64 {
    fn from(handle: StorageHandle) -> Self {
        handle.get()
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
