//! In-process stand-in for the managed runtime.
//!
//! Enforces the parts of the embedding contract the host relies on:
//! properties are only accepted before start, assemblies resolve only through
//! the trusted list, and managed code may only be invoked from the starting
//! thread or an attached one. Every successful call is recorded as a
//! [`MockEvent`]. Classes are not tied to assemblies: every loaded image
//! exposes every configured class.

use crate::backend::{RuntimeBackend, RuntimeProperty, TRUSTED_PLATFORM_ASSEMBLIES};
use crate::handle::{
    AssemblyHandle, ClassHandle, DomainHandle, ImageHandle, MethodHandle, ObjectHandle,
    ThreadHandle,
};
use crate::RuntimeError;
use depshost_manifest::{AssemblyIdentity, TRUSTED_PATH_SEPARATOR};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use tracing::debug;

const ROOT_DOMAIN: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockMethod {
    /// Static; returns a freshly constructed object.
    Factory,
    /// Instance; requires a live receiver, returns nothing.
    Instance,
    /// Raises a managed exception with this message.
    Throws(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockClass {
    pub namespace: String,
    pub name: String,
    pub methods: Vec<(String, u32, MockMethod)>,
}

impl MockClass {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, name: &str, arity: u32, kind: MockMethod) -> Self {
        self.methods.push((name.to_owned(), arity, kind));
        self
    }

    /// `CSharpSample.SampleClass` with `Create()` and `Hello()`.
    pub fn sample() -> Self {
        Self::new("CSharpSample", "SampleClass")
            .with_method("Create", 0, MockMethod::Factory)
            .with_method("Hello", 0, MockMethod::Instance)
    }

    fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Initialize(Vec<RuntimeProperty>),
    Start {
        host_name: String,
        version_token: String,
    },
    LoadAssembly(String),
    Attach(ThreadHandle),
    Detach(ThreadHandle),
    Invoke {
        method: String,
        receiver: Option<ObjectHandle>,
        result: Option<ObjectHandle>,
    },
}

#[derive(Default)]
struct MockState {
    properties: Vec<RuntimeProperty>,
    started_on: Option<ThreadId>,
    assemblies: Vec<String>,
    attached: HashMap<usize, ThreadId>,
    next_thread: usize,
    next_object: usize,
    events: Vec<MockEvent>,
}

impl MockState {
    fn require_started(&self) -> Result<(), RuntimeError> {
        if self.started_on.is_some() {
            Ok(())
        } else {
            Err(RuntimeError::InitFailed("runtime not started".to_owned()))
        }
    }

    fn trusted_platform_assemblies(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == TRUSTED_PLATFORM_ASSEMBLIES)
            .map(|p| p.value.as_str())
    }

    fn current_thread_known(&self) -> bool {
        let me = thread::current().id();
        self.started_on == Some(me) || self.attached.values().any(|t| *t == me)
    }
}

pub struct MockBackend {
    classes: Vec<MockClass>,
    fail_detach: bool,
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_classes(vec![MockClass::sample()])
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes(classes: Vec<MockClass>) -> Self {
        Self {
            classes,
            fail_detach: false,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Make every `detach_thread` fail after its ownership checks.
    #[must_use]
    pub fn with_failing_detach(mut self) -> Self {
        self.fail_detach = true;
        self
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state
            .lock()
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    /// Threads currently attached (the starting thread is not counted).
    pub fn attached_threads(&self) -> usize {
        self.state.lock().map_or(0, |s| s.attached.len())
    }

    pub fn started_on(&self) -> Option<ThreadId> {
        self.state.lock().ok().and_then(|s| s.started_on)
    }

    pub fn trusted_platform_assemblies(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.trusted_platform_assemblies().map(str::to_owned))
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::Poisoned(format!("mutex poisoned: {e}")))
    }

    fn class(&self, class: ClassHandle) -> Result<&MockClass, RuntimeError> {
        class
            .raw()
            .checked_sub(1)
            .and_then(|i| self.classes.get(i))
            .ok_or_else(|| RuntimeError::InvalidArgument(format!("unknown {class}")))
    }

    /// Method handles index the classes' method lists flattened in order.
    fn method(
        &self,
        method: MethodHandle,
    ) -> Result<(&MockClass, &str, &MockMethod), RuntimeError> {
        method
            .raw()
            .checked_sub(1)
            .and_then(|i| {
                self.classes
                    .iter()
                    .flat_map(|c| c.methods.iter().map(move |(n, _, k)| (c, n.as_str(), k)))
                    .nth(i)
            })
            .ok_or_else(|| RuntimeError::InvalidArgument(format!("unknown {method}")))
    }
}

impl RuntimeBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn initialize(&self, properties: &[RuntimeProperty]) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        if state.started_on.is_some() {
            return Err(RuntimeError::InitFailed(
                "properties must be set before the runtime starts".to_owned(),
            ));
        }
        state.properties = properties.to_vec();
        state.events.push(MockEvent::Initialize(properties.to_vec()));
        Ok(())
    }

    fn start(&self, host_name: &str, version_token: &str) -> Result<DomainHandle, RuntimeError> {
        let mut state = self.lock()?;
        if state.started_on.is_some() {
            return Err(RuntimeError::InitFailed("runtime already started".to_owned()));
        }
        state.started_on = Some(thread::current().id());
        state.events.push(MockEvent::Start {
            host_name: host_name.to_owned(),
            version_token: version_token.to_owned(),
        });
        Ok(DomainHandle::from_raw(ROOT_DOMAIN))
    }

    fn root_domain(&self) -> Result<DomainHandle, RuntimeError> {
        self.lock()?.require_started()?;
        Ok(DomainHandle::from_raw(ROOT_DOMAIN))
    }

    fn load_assembly_by_name(&self, identity: &str) -> Result<AssemblyHandle, RuntimeError> {
        let mut state = self.lock()?;
        state.require_started()?;

        let name = AssemblyIdentity::new(identity).simple_name().to_owned();
        let trusted = state
            .trusted_platform_assemblies()
            .unwrap_or_default()
            .split(TRUSTED_PATH_SEPARATOR)
            .any(|entry| {
                Path::new(entry)
                    .file_stem()
                    .is_some_and(|stem| !name.is_empty() && stem == name.as_str())
            });
        if !trusted {
            return Err(RuntimeError::AssemblyNotFound(identity.to_owned()));
        }

        debug!("mock runtime loaded {identity}");
        state.assemblies.push(name);
        state
            .events
            .push(MockEvent::LoadAssembly(identity.to_owned()));
        Ok(AssemblyHandle::from_raw(state.assemblies.len()))
    }

    fn image_of(&self, assembly: AssemblyHandle) -> Result<ImageHandle, RuntimeError> {
        let state = self.lock()?;
        if assembly.raw() == 0 || assembly.raw() > state.assemblies.len() {
            return Err(RuntimeError::InvalidArgument(format!("unknown {assembly}")));
        }
        Ok(ImageHandle::from_raw(assembly.raw()))
    }

    fn find_class(
        &self,
        image: ImageHandle,
        namespace: &str,
        name: &str,
    ) -> Result<ClassHandle, RuntimeError> {
        let state = self.lock()?;
        if image.raw() == 0 || image.raw() > state.assemblies.len() {
            return Err(RuntimeError::InvalidArgument(format!("unknown {image}")));
        }
        self.classes
            .iter()
            .position(|c| c.namespace == namespace && c.name == name)
            .map(|i| ClassHandle::from_raw(i + 1))
            .ok_or_else(|| RuntimeError::ClassNotFound {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            })
    }

    fn get_method(
        &self,
        class: ClassHandle,
        name: &str,
        arity: u32,
    ) -> Result<MethodHandle, RuntimeError> {
        let target = self.class(class)?;
        let preceding: usize = self
            .classes
            .iter()
            .take(class.raw() - 1)
            .map(|c| c.methods.len())
            .sum();
        target
            .methods
            .iter()
            .position(|(n, a, _)| n == name && *a == arity)
            .map(|i| MethodHandle::from_raw(preceding + i + 1))
            .ok_or_else(|| RuntimeError::MethodNotFound {
                class: target.full_name(),
                name: name.to_owned(),
                arity,
            })
    }

    fn invoke(
        &self,
        method: MethodHandle,
        receiver: Option<ObjectHandle>,
        args: &[ObjectHandle],
    ) -> Result<Option<ObjectHandle>, RuntimeError> {
        let (class, name, kind) = self.method(method)?;
        let qualified = format!("{}::{name}", class.full_name());
        let mut state = self.lock()?;
        state.require_started()?;
        if !state.current_thread_known() {
            return Err(RuntimeError::InvokeFailed(format!(
                "{qualified} called from a thread that is not attached"
            )));
        }
        if !args.is_empty() {
            return Err(RuntimeError::InvalidArgument(format!(
                "{qualified} takes no arguments, got {}",
                args.len()
            )));
        }

        let result = match kind {
            MockMethod::Factory => {
                state.next_object += 1;
                Some(ObjectHandle::from_raw(state.next_object))
            }
            MockMethod::Instance => {
                let live = receiver.is_some_and(|r| r.raw() > 0 && r.raw() <= state.next_object);
                if !live {
                    return Err(RuntimeError::InvokeFailed(format!(
                        "{qualified} requires a live receiver"
                    )));
                }
                None
            }
            MockMethod::Throws(message) => {
                return Err(RuntimeError::InvokeFailed(format!(
                    "{qualified} threw: {message}"
                )));
            }
        };
        state.events.push(MockEvent::Invoke {
            method: qualified,
            receiver,
            result,
        });
        Ok(result)
    }

    fn attach_thread(&self, domain: DomainHandle) -> Result<ThreadHandle, RuntimeError> {
        let mut state = self.lock()?;
        state.require_started()?;
        if domain.raw() != ROOT_DOMAIN {
            return Err(RuntimeError::AttachFailed(format!("unknown {domain}")));
        }
        let me = thread::current().id();
        if state.attached.values().any(|t| *t == me) {
            return Err(RuntimeError::AttachFailed(
                "thread is already attached".to_owned(),
            ));
        }
        state.next_thread += 1;
        let handle = ThreadHandle::from_raw(state.next_thread);
        state.attached.insert(handle.raw(), me);
        state.events.push(MockEvent::Attach(handle));
        Ok(handle)
    }

    fn detach_thread(&self, thread: ThreadHandle) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        let me = thread::current().id();
        match state.attached.get(&thread.raw()) {
            Some(owner) if *owner == me => {}
            Some(_) => {
                return Err(RuntimeError::DetachFailed(format!(
                    "{thread} belongs to another thread"
                )))
            }
            None => {
                return Err(RuntimeError::DetachFailed(format!(
                    "{thread} is not attached"
                )))
            }
        }
        if self.fail_detach {
            return Err(RuntimeError::DetachFailed(format!(
                "{thread} could not be detached"
            )));
        }
        state.attached.remove(&thread.raw());
        state.events.push(MockEvent::Detach(thread));
        Ok(())
    }
}
