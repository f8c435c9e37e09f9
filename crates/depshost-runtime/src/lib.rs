//! Runtime embedding boundary for depshost.
//!
//! This crate implements the layer between the host and the managed runtime:
//! the `RuntimeBackend` trait with opaque handle types, an in-process `mock`
//! runtime that enforces the embedding contract (used by every test), and,
//! behind the `mono` cargo feature, bindings to the Mono embedding API.

pub mod backend;
pub mod handle;
pub mod mock;
#[cfg(feature = "mono")]
pub mod mono;

pub use backend::{
    available_backends, select_backend, RuntimeBackend, RuntimeProperty,
    TRUSTED_PLATFORM_ASSEMBLIES,
};
pub use handle::{
    AssemblyHandle, ClassHandle, DomainHandle, ImageHandle, MethodHandle, ObjectHandle,
    ThreadHandle,
};
pub use mock::{MockBackend, MockClass, MockEvent, MockMethod};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("backend '{0}' is not available in this build")]
    BackendUnavailable(String),
    #[error("runtime initialization failed: {0}")]
    InitFailed(String),
    #[error("couldn't open assembly \"{0}\"")]
    AssemblyNotFound(String),
    #[error("couldn't find class {namespace}.{name}")]
    ClassNotFound { namespace: String, name: String },
    #[error("no {name}/{arity} method in {class}")]
    MethodNotFound {
        class: String,
        name: String,
        arity: u32,
    },
    #[error("managed invocation failed: {0}")]
    InvokeFailed(String),
    #[error("thread attach failed: {0}")]
    AttachFailed(String),
    #[error("thread detach failed: {0}")]
    DetachFailed(String),
    #[error("invalid argument for runtime call: {0}")]
    InvalidArgument(String),
    #[error("runtime state poisoned: {0}")]
    Poisoned(String),
}
