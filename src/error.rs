use std::time::Duration;

/// Error taxonomy of the deployment engine.
///
/// `ResourceNotFound` is a control-flow signal (create-vs-update, deletion
/// completed) and is kept apart from every other API failure. All outward
/// variants carry the resource kind/name or the operation that failed.
#[derive(thiserror::Error, Debug)]
pub enum DeployError {
    #[error("resource {kind}/{name} not found")]
    ResourceNotFound { kind: String, name: String },

    #[error("failed to get resource {kind}/{name}: {source}")]
    FailedToGetResource {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to initialize pod: `{condition}` not reached within {timeout:?} by [{pending}]")]
    FailedToInitializePod {
        condition: String,
        timeout: Duration,
        pending: String,
    },

    #[error("failed to delete resources, still present after {timeout:?}: [{remaining}]")]
    FailedToDeleteResource {
        timeout: Duration,
        remaining: String,
    },

    #[error("operation not supported: no handler registered for kind `{kind}`")]
    OperationNotSupported { kind: String },

    #[error("no resource handlers registered")]
    NoHandlersRegistered,

    #[error("failed to compute patch for {kind}/{name}: {reason}")]
    PatchComputation {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("manifest for kind `{kind}` misses field `{field}`")]
    MissingField { kind: String, field: String },

    #[error("cannot parse {kind} object: {reason}")]
    ParseDynamic { kind: String, reason: String },

    #[error("the kube client returned an error: `{0}`")]
    Client(#[from] kube::Error),

    #[error("it is not possible to read kubeconfig: `{0}`")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("error deserializing manifest: `{0}`")]
    SerdeYaml(#[from] serde_yaml::Error),
}

impl DeployError {
    /// Whether this error is the distinguished not-found signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DeployError::ResourceNotFound { .. })
    }

    /// Maps a kube API error for a get on `kind`/`name`: 404 becomes
    /// [`DeployError::ResourceNotFound`], anything else keeps the transport
    /// error with the resource attached.
    pub(crate) fn from_get(kind: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 404 => {
                DeployError::ResourceNotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
            }
            source => DeployError::FailedToGetResource {
                kind: kind.to_string(),
                name: name.to_string(),
                source,
            },
        }
    }
}
