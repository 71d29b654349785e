use duration_str::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;

/// Same as upstream kube-rs default client timeout (read/write).
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(295);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_DELETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Engine configuration: client bootstrap plus polling budgets.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// The maximum duration the client will wait for a response from the
    /// cluster API before timing out.
    #[serde(
        default = "default_client_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub client_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

/// Budgets for the readiness/deletion poller. Timeouts are wall-clock
/// deadlines, not retry counts: slow clusters get proportionally fewer
/// iterations instead of failing sooner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollConfig {
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub interval: Duration,
    #[serde(
        default = "default_readiness_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub readiness_timeout: Duration,
    #[serde(
        default = "default_deletion_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub deletion_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            deletion_timeout: DEFAULT_DELETION_TIMEOUT,
        }
    }
}

fn default_client_timeout() -> Duration {
    DEFAULT_CLIENT_TIMEOUT
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_readiness_timeout() -> Duration {
    DEFAULT_READINESS_TIMEOUT
}

fn default_deletion_timeout() -> Duration {
    DEFAULT_DELETION_TIMEOUT
}
