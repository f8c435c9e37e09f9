/// Compatibility token the embedding API requires at start-up.
pub const FRAMEWORK_VERSION: &str = "v4.0.30319";

/// Name the host registers its root domain under.
pub const HOST_NAME: &str = "embedder_sample";

pub const BACKEND_ENV: &str = "DEPSHOST_BACKEND";

pub const DEFAULT_BACKEND: &str = "mono";

/// The managed class and the two zero-argument methods called each round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub namespace: &'static str,
    pub class: &'static str,
    /// Static factory returning a fresh instance.
    pub factory: &'static str,
    /// Instance method invoked on the factory's result.
    pub method: &'static str,
}

impl EntryPoint {
    pub const SAMPLE: Self = Self {
        namespace: "CSharpSample",
        class: "SampleClass",
        factory: "Create",
        method: "Hello",
    };

    pub fn qualified_class(&self) -> String {
        format!("{}.{}", self.namespace, self.class)
    }
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self::SAMPLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Runtime backend name passed to `select_backend`.
    pub backend: String,
    /// Run the invocation rounds on a freshly spawned thread.
    pub foreign_thread: bool,
    /// After a successful foreign-thread run, repeat the rounds on the main thread.
    pub main_thread_pass: bool,
    pub rounds_per_thread: usize,
    pub entry: EntryPoint,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_owned(),
            foreign_thread: true,
            main_thread_pass: true,
            rounds_per_thread: 2,
            entry: EntryPoint::SAMPLE,
        }
    }
}

impl HostConfig {
    /// Defaults, with the backend overridden by `DEPSHOST_BACKEND`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(backend) = lookup(BACKEND_ENV).filter(|b| !b.trim().is_empty()) {
            backend.trim().clone_into(&mut config.backend);
        }
        config
    }

    #[must_use]
    pub fn with_backend(mut self, backend: &str) -> Self {
        backend.clone_into(&mut self.backend);
        self
    }
}
