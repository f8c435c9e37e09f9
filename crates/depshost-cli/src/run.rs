use depshost_core::{BootReport, Bootstrapper, CoreError, FailureKind, HostConfig};
use depshost_runtime::select_backend;
use std::path::Path;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_MANIFEST_ERROR: u8 = 3;
pub const EXIT_RUNTIME_INIT: u8 = 4;
pub const EXIT_NOT_FOUND: u8 = 5;
pub const EXIT_THREAD: u8 = 6;

pub fn exit_code(err: &CoreError) -> u8 {
    match err.kind() {
        FailureKind::ManifestUnreadable => EXIT_MANIFEST_ERROR,
        FailureKind::RuntimeInit => EXIT_RUNTIME_INIT,
        FailureKind::NotFound => EXIT_NOT_FOUND,
        FailureKind::Invocation => EXIT_FAILURE,
        FailureKind::Thread => EXIT_THREAD,
    }
}

pub fn run(manifest: &Path, config: HostConfig) -> Result<u8, CoreError> {
    let backend = select_backend(&config.backend)?;
    debug!("using {} backend", backend.name());
    let report = Bootstrapper::new(backend.as_ref(), config).run(manifest)?;
    print_summary(&report);
    Ok(EXIT_SUCCESS)
}

fn print_summary(report: &BootReport) {
    if let Some(entry) = &report.context.entry_assembly_identity {
        println!("entry assembly: {entry}");
    }
    println!("trusted libraries: {}", report.context.trusted_paths.len());
    for (label, pass) in [("foreign thread", &report.foreign), ("main thread", &report.main)] {
        if let Some(pass) = pass {
            println!("{label}: {} rounds completed", pass.rounds.len());
        }
    }
}
