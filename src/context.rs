use crate::labels::Labels;
use crate::manifest::Manifest;

/// Per-operation input: the cluster coordinates of one service plus the
/// manifests rendered for it.
///
/// Created per command invocation and read-only from then on; concurrent
/// operations never share a context.
#[derive(Clone, Debug)]
pub struct DeploymentContext {
    namespace: String,
    app_name: String,
    environment: String,
    service_name: String,
    manifests: Vec<Manifest>,
    wait_for_readiness: bool,
    log_options: LogOptions,
}

/// How much of a pod's log to read: the last `lines` entries, or a live tail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub follow: bool,
    pub lines: Option<i64>,
}

impl DeploymentContext {
    pub fn new(
        namespace: &str,
        app_name: &str,
        environment: &str,
        service_name: &str,
        manifests: Vec<Manifest>,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            app_name: app_name.to_string(),
            environment: environment.to_string(),
            service_name: service_name.to_string(),
            manifests,
            wait_for_readiness: false,
            log_options: LogOptions::default(),
        }
    }

    pub fn with_wait_for_readiness(mut self, wait: bool) -> Self {
        self.wait_for_readiness = wait;
        self
    }

    pub fn with_log_options(mut self, log_options: LogOptions) -> Self {
        self.log_options = log_options;
        self
    }

    /// A fresh context addressing another service of the same app, for
    /// per-service loops. The original is left untouched.
    pub fn for_service(&self, service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            manifests: Vec::new(),
            ..self.clone()
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn wait_for_readiness(&self) -> bool {
        self.wait_for_readiness
    }

    pub fn log_options(&self) -> LogOptions {
        self.log_options
    }

    /// Labels stamped on (and selecting) every resource of this service.
    pub fn service_labels(&self) -> Labels {
        Labels::new()
            .with_app(&self.app_name)
            .with_environment(&self.environment)
            .with_service(&self.service_name)
    }

    /// Selector matching all resources of this service.
    pub fn service_selector(&self) -> String {
        self.service_labels().selector()
    }

    /// Selector matching every service of the app in this environment.
    pub fn app_selector(&self) -> String {
        Labels::new()
            .with_app(&self.app_name)
            .with_environment(&self.environment)
            .selector()
    }
}
