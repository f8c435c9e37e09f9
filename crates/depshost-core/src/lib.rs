//! Core orchestration for depshost.
//!
//! This crate ties together manifest resolution and the runtime backend: the
//! `RuntimeHost` starts the runtime with the resolved trusted list and loads
//! the entry assembly, the `CrossThreadInvoker` calls into managed code from
//! the main thread or from a foreign thread that attaches and detaches around
//! each round, and the `Bootstrapper` runs the whole sequence for one manifest.

pub mod bootstrap;
pub mod config;
pub mod host;
pub mod invoker;
pub mod lifecycle;

pub use bootstrap::{BootReport, Bootstrapper};
pub use config::{EntryPoint, HostConfig, FRAMEWORK_VERSION, HOST_NAME};
pub use host::RuntimeHost;
pub use invoker::{CrossThreadInvoker, InvocationReport, MainThread, RoundOutcome, ThreadRole};
pub use lifecycle::{validate_transition, AttachState};

use depshost_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] depshost_manifest::ManifestError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("no entry assembly to load: {0}")]
    NoEntryAssembly(String),
    #[error("invalid attach transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("could not create thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
    #[error("could not join thread: {0}")]
    ThreadJoin(String),
}

/// Coarse failure class, one per process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ManifestUnreadable,
    RuntimeInit,
    NotFound,
    Invocation,
    Thread,
}

impl CoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Manifest(_) => FailureKind::ManifestUnreadable,
            Self::Runtime(e) => match e {
                RuntimeError::BackendUnavailable(_) | RuntimeError::InitFailed(_) => {
                    FailureKind::RuntimeInit
                }
                RuntimeError::AssemblyNotFound(_)
                | RuntimeError::ClassNotFound { .. }
                | RuntimeError::MethodNotFound { .. } => FailureKind::NotFound,
                RuntimeError::InvokeFailed(_)
                | RuntimeError::AttachFailed(_)
                | RuntimeError::DetachFailed(_)
                | RuntimeError::InvalidArgument(_)
                | RuntimeError::Poisoned(_) => FailureKind::Invocation,
            },
            Self::NoEntryAssembly(_) => FailureKind::NotFound,
            Self::InvalidTransition { .. } => FailureKind::Invocation,
            Self::ThreadSpawn(_) | Self::ThreadJoin(_) => FailureKind::Thread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_errors_map_to_failure_kinds() {
        let init = CoreError::from(RuntimeError::InitFailed("x".to_owned()));
        assert_eq!(init.kind(), FailureKind::RuntimeInit);

        let missing = CoreError::from(RuntimeError::ClassNotFound {
            namespace: "A".to_owned(),
            name: "B".to_owned(),
        });
        assert_eq!(missing.kind(), FailureKind::NotFound);

        let invoke = CoreError::from(RuntimeError::InvokeFailed("x".to_owned()));
        assert_eq!(invoke.kind(), FailureKind::Invocation);
    }

    #[test]
    fn thread_errors_map_to_thread_kind() {
        let err = CoreError::ThreadJoin("panicked".to_owned());
        assert_eq!(err.kind(), FailureKind::Thread);
        assert_eq!(err.to_string(), "could not join thread: panicked");
    }
}
