use crate::config::ClientConfig;
use crate::error::DeployError;
use kube::{config::KubeConfigOptions, Client, Config};
use tracing::debug;

/// Constructs a new Kubernetes client.
///
/// If loading from the inCluster config fails we fall back to kube-config.
/// This will respect the `$KUBECONFIG` envvar, but otherwise default to
/// `~/.kube/config`. Not leveraging infer() to check inClusterConfig first.
pub async fn try_client(client_config: &ClientConfig) -> Result<Client, DeployError> {
    debug!("trying inClusterConfig for k8s client");

    let mut config = match Config::incluster() {
        Ok(c) => c,
        Err(e) => {
            debug!("inClusterConfig {}, trying kubeconfig for k8s client", e);
            let c = KubeConfigOptions::default();
            Config::from_kubeconfig(&c).await?
        }
    };
    config.read_timeout = Some(client_config.client_timeout);
    config.write_timeout = Some(client_config.client_timeout);

    let client = Client::try_from(config)?;
    debug!("k8s client initialization succeeded");
    Ok(client)
}
