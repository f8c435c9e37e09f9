//! Invocation of the entry class from the main thread or a foreign thread.
//!
//! A round is exactly two managed calls: the static factory, then the
//! instance method on the object it returned. On a foreign thread every
//! round is bracketed by attach and detach, so a second round re-attaches
//! and works on a newly constructed object.

use crate::config::EntryPoint;
use crate::lifecycle::{validate_transition, AttachState};
use crate::CoreError;
use depshost_runtime::{
    ClassHandle, DomainHandle, MethodHandle, ObjectHandle, RuntimeBackend, RuntimeError,
    ThreadHandle,
};
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

/// Identity of the thread that started the runtime, captured at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainThread(ThreadId);

impl MainThread {
    pub fn current() -> Self {
        Self(thread::current().id())
    }

    pub fn is_current(self) -> bool {
        thread::current().id() == self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRole {
    /// Started the runtime; implicitly attached, never attaches or detaches.
    Main,
    Foreign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub object: ObjectHandle,
    pub attached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    pub role: ThreadRole,
    pub rounds: Vec<RoundOutcome>,
    /// Attach-state transitions in order. Empty for the main thread.
    pub transitions: Vec<AttachState>,
}

impl InvocationReport {
    pub fn final_state(&self) -> AttachState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(AttachState::NotAttached)
    }
}

/// Per-thread attach bookkeeping for one run.
struct ThreadSession {
    role: ThreadRole,
    state: AttachState,
    transitions: Vec<AttachState>,
}

impl ThreadSession {
    fn new(main_thread: MainThread) -> Self {
        let role = if main_thread.is_current() {
            ThreadRole::Main
        } else {
            ThreadRole::Foreign
        };
        Self {
            role,
            state: AttachState::NotAttached,
            transitions: Vec::new(),
        }
    }

    fn record(&mut self, to: AttachState) {
        self.state = to;
        self.transitions.push(to);
    }

    fn attach(
        &mut self,
        backend: &dyn RuntimeBackend,
        domain: DomainHandle,
    ) -> Result<Option<ThreadHandle>, CoreError> {
        if self.role == ThreadRole::Main {
            return Ok(None);
        }
        validate_transition(self.state, AttachState::Attached)?;
        let handle = backend.attach_thread(domain)?;
        if self.state == AttachState::NotAttached {
            info!("% attached foreign thread");
        } else {
            info!("% attached again");
        }
        self.record(AttachState::Attached);
        Ok(Some(handle))
    }

    fn detach(
        &mut self,
        backend: &dyn RuntimeBackend,
        handle: ThreadHandle,
    ) -> Result<(), CoreError> {
        validate_transition(self.state, AttachState::Detached)?;
        backend.detach_thread(handle)?;
        let again = self.transitions.contains(&AttachState::Detached);
        self.record(AttachState::Detached);
        if again {
            info!("% detached again");
        } else {
            info!("% detached");
        }
        Ok(())
    }
}

pub struct CrossThreadInvoker<'b> {
    backend: &'b dyn RuntimeBackend,
    domain: DomainHandle,
    class: ClassHandle,
    entry: EntryPoint,
    main_thread: MainThread,
}

impl<'b> CrossThreadInvoker<'b> {
    pub fn new(
        backend: &'b dyn RuntimeBackend,
        domain: DomainHandle,
        class: ClassHandle,
        entry: EntryPoint,
        main_thread: MainThread,
    ) -> Self {
        Self {
            backend,
            domain,
            class,
            entry,
            main_thread,
        }
    }

    /// Run `rounds` rounds on the calling thread, attaching around each one
    /// unless this is the main thread.
    pub fn run_here(&self, rounds: usize) -> Result<InvocationReport, CoreError> {
        let mut session = ThreadSession::new(self.main_thread);
        let mut outcomes = Vec::with_capacity(rounds);
        for round in 1..=rounds {
            outcomes.push(self.run_round(&mut session, round)?);
        }
        Ok(InvocationReport {
            role: session.role,
            rounds: outcomes,
            transitions: session.transitions,
        })
    }

    /// Spawn a foreign thread, run the rounds there, and join it.
    pub fn run_on_foreign_thread(&self, rounds: usize) -> Result<InvocationReport, CoreError> {
        info!("== running on a foreign thread");
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("depshost-foreign".to_owned())
                .spawn_scoped(scope, || self.run_here(rounds))
                .map_err(CoreError::ThreadSpawn)?;
            worker
                .join()
                .map_err(|_| CoreError::ThreadJoin("foreign thread panicked".to_owned()))?
        })
    }

    fn run_round(
        &self,
        session: &mut ThreadSession,
        round: usize,
    ) -> Result<RoundOutcome, CoreError> {
        let attachment = session.attach(self.backend, self.domain)?;
        let invoked = self.invoke_round();
        // Detach whatever the round's outcome; the invocation error wins.
        let detached = match attachment {
            Some(handle) => session.detach(self.backend, handle),
            None => Ok(()),
        };
        if let (Err(_), Err(e)) = (&invoked, &detached) {
            warn!("detach after failed round: {e}");
        }
        let object = invoked?;
        detached?;
        debug!("round {round} on {:?} thread used {object}", session.role);
        Ok(RoundOutcome {
            object,
            attached: attachment.is_some(),
        })
    }

    fn invoke_round(&self) -> Result<ObjectHandle, CoreError> {
        let create = self.method(self.entry.factory)?;
        let object = self.backend.invoke(create, None, &[])?.ok_or_else(|| {
            RuntimeError::InvokeFailed(format!(
                "{}.{} returned null",
                self.entry.qualified_class(),
                self.entry.factory
            ))
        })?;

        let method = self.method(self.entry.method)?;
        self.backend.invoke(method, Some(object), &[])?;
        Ok(object)
    }

    fn method(&self, name: &str) -> Result<MethodHandle, CoreError> {
        self.backend
            .get_method(self.class, name, 0)
            .map_err(|e| name_class(e, &self.entry).into())
    }
}

/// Backends only know the class handle; report the entry class by name.
fn name_class(err: RuntimeError, entry: &EntryPoint) -> RuntimeError {
    match err {
        RuntimeError::MethodNotFound { name, arity, .. } => RuntimeError::MethodNotFound {
            class: entry.qualified_class(),
            name,
            arity,
        },
        other => other,
    }
}
