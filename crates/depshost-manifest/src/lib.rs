//! Dependency manifest loading and trusted library resolution for depshost.
//!
//! This crate defines the manifest layer: reading a `*.deps.json` file into a
//! generic JSON document (`DepsDocument`), and walking that document to find
//! the application's entry assembly and the ordered list of library paths the
//! managed runtime may load (`ResolvedContext`).

pub mod manifest;
pub mod resolve;
pub mod types;

pub use manifest::{load_deps_file, parse_deps_str, DepsDocument, ManifestError};
pub use resolve::{
    is_assembly_file, resolve, ResolveStop, ResolvedContext, ASSEMBLY_EXTENSION,
    TRUSTED_PATH_SEPARATOR,
};
pub use types::{AssemblyIdentity, LibraryIdentity};
