//! Trusted platform assembly list resolution.
//!
//! Walks a parsed dependency manifest in a single forward pass:
//!
//! 1. `runtimeTarget.name` names the active target.
//! 2. `targets[<name>]` is the framework target (library identity -> metadata).
//! 3. The first `libraries` entry with `"type": "project"` is the entry library.
//! 4. Its `<name>/<version>` identity becomes `<name>, Version=<version>`.
//! 5. The entry library's framework-target entry is the project target.
//! 6. Every `.dll` key of the project target's `runtime` map is trusted.
//! 7. Every dependency's `runtime` then `native` `.dll` keys are trusted.
//!
//! A missing field in steps 1-6 stops the whole pass
//! ([`require_or_abort`]); a missing field while visiting one dependency
//! skips that dependency only ([`lookup_or_skip`]). Neither is an error:
//! the partial [`ResolvedContext`] is returned with the reason in
//! [`ResolvedContext::stopped`].

use crate::manifest::DepsDocument;
use crate::types::{AssemblyIdentity, LibraryIdentity};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of loadable libraries, matched case-insensitively.
pub const ASSEMBLY_EXTENSION: &str = ".dll";

/// Separator between entries of the joined trusted path list.
pub const TRUSTED_PATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

const PROJECT_KIND: &str = "project";

/// Why a resolution pass stopped before visiting every dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ResolveStop {
    MissingField(String),
    NoProjectLibrary,
    UnversionedEntry(LibraryIdentity),
}

impl fmt::Display for ResolveStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing manifest field {field}"),
            Self::NoProjectLibrary => f.write_str("no library of type \"project\""),
            Self::UnversionedEntry(id) => {
                write!(f, "entry library '{id}' has no version component")
            }
        }
    }
}

/// Output of a resolution pass. Built once, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedContext {
    pub entry_library_identity: Option<LibraryIdentity>,
    pub entry_assembly_identity: Option<AssemblyIdentity>,
    /// Absolute library paths in traversal order. Never sorted.
    pub trusted_paths: Vec<PathBuf>,
    pub stopped: Option<ResolveStop>,
}

impl ResolvedContext {
    /// The trusted paths joined with the platform separator.
    pub fn trusted_path_list(&self) -> String {
        self.trusted_paths
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join(TRUSTED_PATH_SEPARATOR)
    }

    pub fn is_complete(&self) -> bool {
        self.stopped.is_none()
    }
}

pub fn is_assembly_file(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(ASSEMBLY_EXTENSION)
}

/// Resolve the trusted library list of the manifest at `manifest_path`.
///
/// Never fails; see the module docs for the stop/skip policy.
pub fn resolve(manifest_path: &Path, document: &DepsDocument) -> ResolvedContext {
    let base_dir = manifest_dir(manifest_path);
    let mut ctx = ResolvedContext::default();

    if let Err(stop) = walk(document.root(), &base_dir, &mut ctx) {
        debug!("resolution stopped: {stop}");
        ctx.stopped = Some(stop);
    }
    debug!(
        "resolved {} trusted libraries from {}",
        ctx.trusted_paths.len(),
        manifest_path.display()
    );
    ctx
}

fn walk(root: &Value, base_dir: &Path, ctx: &mut ResolvedContext) -> Result<(), ResolveStop> {
    let runtime_target = require_or_abort(root.get("runtimeTarget"), "runtimeTarget")?;
    let target_name = require_or_abort(string(runtime_target, "name"), "runtimeTarget.name")?;

    let targets = require_or_abort(root.get("targets"), "targets")?;
    let framework = require_or_abort(
        object(targets, target_name),
        format_args!("targets[{target_name}]"),
    )?;

    let libraries = require_or_abort(object(root, "libraries"), "libraries")?;
    let project = libraries
        .iter()
        .find_map(|(identity, library)| {
            let kind = lookup_or_skip(string(library, "type"), identity, "type")?;
            (kind == PROJECT_KIND).then(|| LibraryIdentity::new(identity.as_str()))
        })
        .ok_or(ResolveStop::NoProjectLibrary)?;
    ctx.entry_library_identity = Some(project.clone());

    let assembly = project
        .assembly_identity()
        .ok_or_else(|| ResolveStop::UnversionedEntry(project.clone()))?;
    ctx.entry_assembly_identity = Some(assembly);

    let project_target = require_or_abort(
        framework.get(project.as_str()),
        format_args!("targets[{target_name}][{project}]"),
    )?;
    let runtime = require_or_abort(
        object(project_target, "runtime"),
        format_args!("targets[{target_name}][{project}].runtime"),
    )?;
    append_libraries(&mut ctx.trusted_paths, base_dir, runtime);

    let Some(dependencies) = object(project_target, "dependencies") else {
        return Ok(());
    };
    for (name, version) in dependencies {
        let Some(version) = lookup_or_skip(version.as_str(), name, "version") else {
            continue;
        };
        let dependency = LibraryIdentity::from_parts(name, version);
        let Some(target) = lookup_or_skip(
            framework.get(dependency.as_str()),
            &dependency,
            format_args!("targets[{target_name}] entry"),
        ) else {
            continue;
        };
        for section in ["runtime", "native"] {
            if let Some(libs) = object(target, section) {
                append_libraries(&mut ctx.trusted_paths, base_dir, libs);
            }
        }
    }
    Ok(())
}

/// A field every later step depends on: its absence ends the pass.
fn require_or_abort<T>(found: Option<T>, field: impl fmt::Display) -> Result<T, ResolveStop> {
    found.ok_or_else(|| ResolveStop::MissingField(field.to_string()))
}

/// A field of one independent item: its absence skips that item only.
fn lookup_or_skip<T>(
    found: Option<T>,
    item: impl fmt::Display,
    field: impl fmt::Display,
) -> Option<T> {
    if found.is_none() {
        debug!("skipping {item}: no {field}");
    }
    found
}

fn object<'a>(node: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    node.get(key)?.as_object()
}

fn string<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)?.as_str()
}

fn append_libraries(paths: &mut Vec<PathBuf>, base_dir: &Path, section: &Map<String, Value>) {
    paths.extend(
        section
            .keys()
            .filter(|name| is_assembly_file(name))
            .map(|name| base_dir.join(name)),
    );
}

fn manifest_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::path::absolute(parent).unwrap_or_else(|_| parent.to_path_buf())
        }
        _ => std::env::current_dir().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> DepsDocument {
        DepsDocument::from_value(value)
    }

    fn app_path(name: &str) -> PathBuf {
        manifest_dir(Path::new("/app/MyApp.deps.json")).join(name)
    }

    fn resolve_app(value: Value) -> ResolvedContext {
        resolve(Path::new("/app/MyApp.deps.json"), &doc(value))
    }

    fn single_project(runtime: Value, dependencies: Value, extra_targets: &Value) -> Value {
        let mut framework = json!({
            "MyApp/1.0.0": { "runtime": runtime, "dependencies": dependencies }
        });
        if let (Some(map), Some(extra)) = (framework.as_object_mut(), extra_targets.as_object()) {
            map.extend(extra.clone());
        }
        json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": framework },
            "libraries": { "MyApp/1.0.0": { "type": "project" } }
        })
    }

    #[test]
    #[cfg(unix)]
    fn minimal_project_scenario() {
        let ctx = resolve_app(single_project(
            json!({ "MyApp.dll": {} }),
            json!({}),
            &json!({}),
        ));

        assert_eq!(ctx.trusted_paths, vec![PathBuf::from("/app/MyApp.dll")]);
        assert_eq!(ctx.trusted_path_list(), "/app/MyApp.dll");
        assert_eq!(
            ctx.entry_assembly_identity.as_ref().unwrap(),
            "MyApp, Version=1.0.0"
        );
        assert_eq!(ctx.entry_library_identity.as_ref().unwrap(), "MyApp/1.0.0");
        assert!(ctx.is_complete());
    }

    #[test]
    fn entry_identity_is_qualified_with_version() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": { "MyApp/1.2.3": { "runtime": {} } } },
            "libraries": { "MyApp/1.2.3": { "type": "project" } }
        }));
        assert_eq!(
            ctx.entry_assembly_identity.unwrap().as_str(),
            "MyApp, Version=1.2.3"
        );
    }

    #[test]
    fn project_runtime_order_is_preserved() {
        let ctx = resolve_app(single_project(
            json!({ "B.dll": {}, "A.dll": {} }),
            json!({}),
            &json!({}),
        ));
        assert_eq!(ctx.trusted_paths, vec![app_path("B.dll"), app_path("A.dll")]);
    }

    #[test]
    fn extension_match_ignores_case() {
        let ctx = resolve_app(single_project(
            json!({ "Foo.DLL": {}, "Foo.json": {}, "Bar.pdb": {} }),
            json!({}),
            &json!({}),
        ));
        assert_eq!(ctx.trusted_paths, vec![app_path("Foo.DLL")]);
    }

    #[test]
    fn missing_dependency_target_skips_only_that_dependency() {
        let ctx = resolve_app(single_project(
            json!({}),
            json!({ "Ghost": "9.9.9", "Real": "2.0.0" }),
            &json!({ "Real/2.0.0": { "runtime": { "lib/Real.dll": {} } } }),
        ));
        assert_eq!(ctx.trusted_paths, vec![app_path("lib/Real.dll")]);
        assert!(ctx.is_complete());
    }

    #[test]
    fn unversioned_entry_stops_before_accumulating() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": {
                "MyApp": {
                    "runtime": { "MyApp.dll": {} },
                    "dependencies": { "Dep": "1.0.0" }
                },
                "Dep/1.0.0": { "runtime": { "Dep.dll": {} } }
            } },
            "libraries": { "MyApp": { "type": "project" } }
        }));

        assert!(ctx.entry_assembly_identity.is_none());
        assert_eq!(ctx.entry_library_identity.as_ref().unwrap(), "MyApp");
        assert!(ctx.trusted_paths.is_empty());
        assert_eq!(
            ctx.stopped,
            Some(ResolveStop::UnversionedEntry(LibraryIdentity::new("MyApp")))
        );
    }

    #[test]
    fn empty_document_resolves_to_nothing() {
        let ctx = resolve(Path::new("/app/MyApp.deps.json"), &DepsDocument::empty());
        assert!(ctx.trusted_paths.is_empty());
        assert!(ctx.trusted_path_list().is_empty());
        assert!(ctx.entry_assembly_identity.is_none());
        assert!(ctx.entry_library_identity.is_none());
        assert_eq!(
            ctx.stopped,
            Some(ResolveStop::MissingField("runtimeTarget".to_owned()))
        );
    }

    #[test]
    fn malformed_text_degrades_to_empty_context() {
        let path = Path::new("/app/MyApp.deps.json");
        let document = crate::parse_deps_str("<<not json>>", path);
        let ctx = resolve(path, &document);
        assert!(ctx.trusted_paths.is_empty());
        assert!(ctx.entry_assembly_identity.is_none());
    }

    #[test]
    fn dependency_runtime_precedes_native() {
        let ctx = resolve_app(single_project(
            json!({ "MyApp.dll": {} }),
            json!({ "Sqlite": "3.0.0" }),
            &json!({ "Sqlite/3.0.0": {
                "native": { "runtimes/linux-x64/native/e_sqlite3.dll": {} },
                "runtime": { "lib/Sqlite.dll": {} }
            } }),
        ));
        assert_eq!(
            ctx.trusted_paths,
            vec![
                app_path("MyApp.dll"),
                app_path("lib/Sqlite.dll"),
                app_path("runtimes/linux-x64/native/e_sqlite3.dll"),
            ]
        );
    }

    #[test]
    fn dependency_without_sections_contributes_nothing() {
        let ctx = resolve_app(single_project(
            json!({ "MyApp.dll": {} }),
            json!({ "Meta": "1.0.0", "Native": "1.0.0" }),
            &json!({
                "Meta/1.0.0": { "dependencies": { "Other": "1.0.0" } },
                "Native/1.0.0": { "native": { "native.dll": {} } }
            }),
        ));
        assert_eq!(
            ctx.trusted_paths,
            vec![app_path("MyApp.dll"), app_path("native.dll")]
        );
    }

    #[test]
    fn dependencies_are_not_followed_transitively() {
        let ctx = resolve_app(single_project(
            json!({}),
            json!({ "Meta": "1.0.0" }),
            &json!({
                "Meta/1.0.0": { "dependencies": { "Leaf": "1.0.0" } },
                "Leaf/1.0.0": { "runtime": { "Leaf.dll": {} } }
            }),
        ));
        assert!(ctx.trusted_paths.is_empty());
    }

    #[test]
    fn non_string_dependency_version_is_skipped() {
        let ctx = resolve_app(single_project(
            json!({}),
            json!({ "Odd": 3, "Good": "1.0.0" }),
            &json!({ "Good/1.0.0": { "runtime": { "Good.dll": {} } } }),
        ));
        assert_eq!(ctx.trusted_paths, vec![app_path("Good.dll")]);
    }

    #[test]
    fn first_project_library_wins() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": {
                "First/1.0.0": { "runtime": { "First.dll": {} } },
                "Second/2.0.0": { "runtime": { "Second.dll": {} } }
            } },
            "libraries": {
                "Untyped/1.0.0": { "serviceable": true },
                "Pkg/1.0.0": { "type": "package" },
                "First/1.0.0": { "type": "project" },
                "Second/2.0.0": { "type": "project" }
            }
        }));
        assert_eq!(ctx.entry_library_identity.unwrap(), "First/1.0.0");
        assert_eq!(ctx.trusted_paths, vec![app_path("First.dll")]);
    }

    #[test]
    fn no_project_library_leaves_entry_unset() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": {} },
            "libraries": { "Pkg/1.0.0": { "type": "package" } }
        }));
        assert!(ctx.entry_library_identity.is_none());
        assert_eq!(ctx.stopped, Some(ResolveStop::NoProjectLibrary));
    }

    #[test]
    fn missing_project_runtime_aborts_the_pass() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": {
                "MyApp/1.0.0": { "dependencies": { "Dep": "1.0.0" } },
                "Dep/1.0.0": { "runtime": { "Dep.dll": {} } }
            } },
            "libraries": { "MyApp/1.0.0": { "type": "project" } }
        }));
        assert_eq!(
            ctx.entry_assembly_identity.unwrap(),
            "MyApp, Version=1.0.0"
        );
        assert!(ctx.trusted_paths.is_empty());
        assert_eq!(
            ctx.stopped,
            Some(ResolveStop::MissingField(
                "targets[net1.0][MyApp/1.0.0].runtime".to_owned()
            ))
        );
    }

    #[test]
    fn missing_project_target_aborts_after_identity() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": {
                "Dep/1.0.0": { "runtime": { "Dep.dll": {} } }
            } },
            "libraries": { "MyApp/1.0.0": { "type": "project" } }
        }));
        assert_eq!(ctx.entry_library_identity.unwrap(), "MyApp/1.0.0");
        assert_eq!(
            ctx.entry_assembly_identity.unwrap(),
            "MyApp, Version=1.0.0"
        );
        assert!(ctx.trusted_paths.is_empty());
        assert_eq!(
            ctx.stopped,
            Some(ResolveStop::MissingField(
                "targets[net1.0][MyApp/1.0.0]".to_owned()
            ))
        );
    }

    #[test]
    fn missing_libraries_aborts_the_pass() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net1.0" },
            "targets": { "net1.0": {
                "MyApp/1.0.0": { "runtime": { "MyApp.dll": {} } }
            } }
        }));
        assert!(ctx.entry_library_identity.is_none());
        assert!(ctx.entry_assembly_identity.is_none());
        assert!(ctx.trusted_paths.is_empty());
        assert_eq!(
            ctx.stopped,
            Some(ResolveStop::MissingField("libraries".to_owned()))
        );
    }

    #[test]
    fn unknown_runtime_target_aborts_the_pass() {
        let ctx = resolve_app(json!({
            "runtimeTarget": { "name": "net9.0" },
            "targets": { "net1.0": {} },
            "libraries": { "MyApp/1.0.0": { "type": "project" } }
        }));
        assert!(ctx.entry_library_identity.is_none());
        assert_eq!(
            ctx.stopped,
            Some(ResolveStop::MissingField("targets[net9.0]".to_owned()))
        );
    }

    #[test]
    fn relative_manifest_path_yields_absolute_entries() {
        let ctx = resolve(
            Path::new("MyApp.deps.json"),
            &doc(single_project(json!({ "MyApp.dll": {} }), json!({}), &json!({}))),
        );
        assert_eq!(ctx.trusted_paths.len(), 1);
        assert!(ctx.trusted_paths[0].is_absolute());
        assert!(ctx.trusted_paths[0].ends_with("MyApp.dll"));
    }

    #[test]
    fn joined_list_uses_platform_separator() {
        let ctx = ResolvedContext {
            trusted_paths: vec![PathBuf::from("a.dll"), PathBuf::from("b.dll")],
            ..ResolvedContext::default()
        };
        assert_eq!(
            ctx.trusted_path_list(),
            format!("a.dll{TRUSTED_PATH_SEPARATOR}b.dll")
        );
    }

    #[test]
    fn stop_reason_serializes_with_tag() {
        let stop = ResolveStop::MissingField("libraries".to_owned());
        let json = serde_json::to_value(&stop).unwrap();
        assert_eq!(json, json!({ "reason": "missing_field", "detail": "libraries" }));
    }
}
