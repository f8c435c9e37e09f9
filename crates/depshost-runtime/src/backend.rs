use crate::handle::{
    AssemblyHandle, ClassHandle, DomainHandle, ImageHandle, MethodHandle, ObjectHandle,
    ThreadHandle,
};
use crate::RuntimeError;

/// Startup property carrying the joined trusted library list.
pub const TRUSTED_PLATFORM_ASSEMBLIES: &str = "TRUSTED_PLATFORM_ASSEMBLIES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProperty {
    pub key: String,
    pub value: String,
}

impl RuntimeProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn trusted_platform_assemblies(list: impl Into<String>) -> Self {
        Self::new(TRUSTED_PLATFORM_ASSEMBLIES, list)
    }
}

/// Synchronous embedding API of a managed runtime.
///
/// Implementations must be callable from any thread; a thread other than the
/// one that called [`RuntimeBackend::start`] has to be attached before it
/// invokes managed code.
pub trait RuntimeBackend: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Set startup properties. Only valid before [`RuntimeBackend::start`].
    fn initialize(&self, properties: &[RuntimeProperty]) -> Result<(), RuntimeError>;

    fn start(&self, host_name: &str, version_token: &str) -> Result<DomainHandle, RuntimeError>;

    fn root_domain(&self) -> Result<DomainHandle, RuntimeError>;

    /// Load by fully-qualified name; the assembly must be reachable through
    /// the trusted list passed to [`RuntimeBackend::initialize`].
    fn load_assembly_by_name(&self, identity: &str) -> Result<AssemblyHandle, RuntimeError>;

    fn image_of(&self, assembly: AssemblyHandle) -> Result<ImageHandle, RuntimeError>;

    fn find_class(
        &self,
        image: ImageHandle,
        namespace: &str,
        name: &str,
    ) -> Result<ClassHandle, RuntimeError>;

    fn get_method(
        &self,
        class: ClassHandle,
        name: &str,
        arity: u32,
    ) -> Result<MethodHandle, RuntimeError>;

    /// Invoke `method`. `receiver` is `None` for static methods. Returns the
    /// managed return value, `None` for void or null.
    fn invoke(
        &self,
        method: MethodHandle,
        receiver: Option<ObjectHandle>,
        args: &[ObjectHandle],
    ) -> Result<Option<ObjectHandle>, RuntimeError>;

    fn attach_thread(&self, domain: DomainHandle) -> Result<ThreadHandle, RuntimeError>;

    fn detach_thread(&self, thread: ThreadHandle) -> Result<(), RuntimeError>;
}

pub fn available_backends() -> &'static [&'static str] {
    if cfg!(feature = "mono") {
        &["mono", "mock"]
    } else {
        &["mock"]
    }
}

pub fn select_backend(name: &str) -> Result<Box<dyn RuntimeBackend>, RuntimeError> {
    match name {
        #[cfg(feature = "mono")]
        "mono" => Ok(Box::new(crate::mono::MonoBackend::new())),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
