use crate::config::HostConfig;
use crate::host::RuntimeHost;
use crate::invoker::{CrossThreadInvoker, InvocationReport, MainThread};
use crate::CoreError;
use depshost_manifest::{load_deps_file, resolve, ResolvedContext};
use depshost_runtime::RuntimeBackend;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a full host run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub context: ResolvedContext,
    pub foreign: Option<InvocationReport>,
    pub main: Option<InvocationReport>,
}

/// Runs load -> resolve -> start -> invoke for one manifest.
pub struct Bootstrapper<'b> {
    backend: &'b dyn RuntimeBackend,
    config: HostConfig,
}

impl<'b> Bootstrapper<'b> {
    pub fn new(backend: &'b dyn RuntimeBackend, config: HostConfig) -> Self {
        Self { backend, config }
    }

    pub fn run(&self, manifest_path: &Path) -> Result<BootReport, CoreError> {
        info!("loading {}", manifest_path.display());
        let document = load_deps_file(manifest_path)?;
        let context = resolve(manifest_path, &document);
        if let Some(stop) = &context.stopped {
            warn!("manifest resolution incomplete: {stop}");
        }
        match serde_json::to_string(&context) {
            Ok(json) => debug!("resolved context: {json}"),
            Err(e) => debug!("resolved context not serializable: {e}"),
        }

        let main_thread = MainThread::current();
        let host = RuntimeHost::start(
            self.backend,
            &context.trusted_path_list(),
            context.entry_assembly_identity.as_ref(),
        )?;
        let class = host.entry_class(&self.config.entry, context.entry_library_identity.as_ref())?;
        let invoker = CrossThreadInvoker::new(
            self.backend,
            host.domain(),
            class,
            self.config.entry.clone(),
            main_thread,
        );

        let rounds = self.config.rounds_per_thread;
        let foreign = if self.config.foreign_thread {
            Some(invoker.run_on_foreign_thread(rounds)?)
        } else {
            None
        };
        let main = if self.config.main_thread_pass || foreign.is_none() {
            info!("== running on the main thread");
            Some(invoker.run_here(rounds)?)
        } else {
            None
        };

        Ok(BootReport {
            context,
            foreign,
            main,
        })
    }
}
