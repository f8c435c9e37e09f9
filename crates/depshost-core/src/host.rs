use crate::config::{EntryPoint, FRAMEWORK_VERSION, HOST_NAME};
use crate::CoreError;
use depshost_manifest::{AssemblyIdentity, LibraryIdentity};
use depshost_runtime::{ClassHandle, DomainHandle, ImageHandle, RuntimeBackend, RuntimeProperty};
use tracing::{info, warn};

/// A started runtime with the entry assembly loaded.
pub struct RuntimeHost<'b> {
    backend: &'b dyn RuntimeBackend,
    domain: DomainHandle,
    image: ImageHandle,
}

impl<'b> RuntimeHost<'b> {
    /// Hand the trusted list to the runtime, start it, and load the entry
    /// assembly by name.
    ///
    /// The trusted list is set before start; the runtime does not accept it
    /// afterwards, and the entry assembly is only found through it.
    pub fn start(
        backend: &'b dyn RuntimeBackend,
        trusted_path_list: &str,
        entry_assembly: Option<&AssemblyIdentity>,
    ) -> Result<Self, CoreError> {
        backend.initialize(&[RuntimeProperty::trusted_platform_assemblies(
            trusted_path_list,
        )])?;
        let domain = backend.start(HOST_NAME, FRAMEWORK_VERSION)?;
        info!("runtime initialized ({} backend)", backend.name());

        let entry = entry_assembly.ok_or_else(|| {
            CoreError::NoEntryAssembly("manifest has no versioned project library".to_owned())
        })?;
        info!("loading {entry}");
        let assembly = backend.load_assembly_by_name(entry)?;
        let image = backend.image_of(assembly)?;

        Ok(Self {
            backend,
            domain,
            image,
        })
    }

    pub fn domain(&self) -> DomainHandle {
        self.domain
    }

    /// Find the designated entry class in the entry assembly's image.
    pub fn entry_class(
        &self,
        entry: &EntryPoint,
        library: Option<&LibraryIdentity>,
    ) -> Result<ClassHandle, CoreError> {
        self.backend
            .find_class(self.image, entry.namespace, entry.class)
            .map_err(|e| {
                warn!(
                    "couldn't find {} in \"{}\"",
                    entry.qualified_class(),
                    library.map_or("<unknown>", LibraryIdentity::as_str)
                );
                CoreError::from(e)
            })
    }
}
