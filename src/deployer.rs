use crate::client::try_client;
use crate::config::DeployConfig;
use crate::context::DeploymentContext;
use crate::dispatcher::Dispatcher;
use crate::error::DeployError;
use crate::handler::UpdatePolicy;
use crate::manifest::ResourceId;
use crate::registry::registry;
use crate::status::{self, DeploymentStatus, ServiceAddress};
use futures::{AsyncBufReadExt, Stream};
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{ListParams, LogParams};
use kube::{Api, Client};
use tracing::debug;

/// The single entry point composing dispatcher, poller and status aggregation
/// for one service (or one pod's logs).
pub struct Deployer {
    client: Client,
    config: DeployConfig,
}

impl Deployer {
    /// Builds a deployer against the ambient cluster credential (in-cluster
    /// config first, kubeconfig fallback).
    pub async fn try_default(config: DeployConfig) -> Result<Self, DeployError> {
        let client = try_client(&config.client).await?;
        Ok(Self::new(client, config))
    }

    /// Builds a deployer around an already-resolved client.
    pub fn new(client: Client, config: DeployConfig) -> Self {
        Self { client, config }
    }

    fn dispatcher(&self) -> Dispatcher<'static> {
        Dispatcher::new(self.client.clone(), registry(), self.config.poll.clone())
    }

    /// Applies the context's manifests, blocking on workload readiness when
    /// the context asks for it.
    pub async fn deploy(&self, ctx: &DeploymentContext) -> Result<Vec<ResourceId>, DeployError> {
        self.dispatcher().apply(ctx, None).await
    }

    /// Same as [`Deployer::deploy`] but forcing one update policy across all
    /// kinds.
    pub async fn deploy_with_policy(
        &self,
        ctx: &DeploymentContext,
        policy: UpdatePolicy,
    ) -> Result<Vec<ResourceId>, DeployError> {
        self.dispatcher().apply(ctx, Some(policy)).await
    }

    /// Deletes every resource of the service and confirms disappearance.
    pub async fn undeploy(&self, ctx: &DeploymentContext) -> Result<Vec<ResourceId>, DeployError> {
        self.dispatcher().undeploy(ctx).await
    }

    /// Blocks until the service's workload pods are scheduled, initialized
    /// and ready.
    pub async fn wait_for_deployment(&self, ctx: &DeploymentContext) -> Result<(), DeployError> {
        self.dispatcher().await_workload_ready(ctx).await
    }

    /// The status of the context's service, with the exposed address merged
    /// in when the service object is available.
    pub async fn get_deployment_status(
        &self,
        ctx: &DeploymentContext,
    ) -> Result<DeploymentStatus, DeployError> {
        let pods = self.list_pods(ctx.namespace(), &ctx.service_selector()).await?;
        let address = self
            .service_address(ctx.namespace(), ctx.service_name())
            .await?;
        Ok(status::reduce(ctx.service_name(), &pods).with_address(address))
    }

    /// One status per service of the app, derived from a single pod listing
    /// partitioned by the service-name label.
    pub async fn status(
        &self,
        ctx: &DeploymentContext,
    ) -> Result<Vec<DeploymentStatus>, DeployError> {
        let pods = self.list_pods(ctx.namespace(), &ctx.app_selector()).await?;

        let mut statuses = Vec::new();
        for (service, pods) in status::partition(pods) {
            let service_ctx = ctx.for_service(&service);
            let address = self
                .service_address(service_ctx.namespace(), service_ctx.service_name())
                .await?;
            statuses.push(status::reduce(&service, &pods).with_address(address));
        }
        Ok(statuses)
    }

    /// The last `lines` of the first pod matching the service selector (the
    /// whole log when no line budget is set).
    pub async fn logs(&self, ctx: &DeploymentContext) -> Result<String, DeployError> {
        let pod = self.first_pod(ctx).await?;
        let params = LogParams {
            tail_lines: ctx.log_options().lines,
            ..Default::default()
        };
        let api: Api<Pod> = Api::namespaced(self.client.clone(), ctx.namespace());
        Ok(api.logs(&pod, &params).await?)
    }

    /// Live tail of the first pod matching the service selector.
    pub async fn follow_logs(
        &self,
        ctx: &DeploymentContext,
    ) -> Result<impl Stream<Item = std::io::Result<String>>, DeployError> {
        let pod = self.first_pod(ctx).await?;
        let params = LogParams {
            follow: true,
            tail_lines: ctx.log_options().lines,
            ..Default::default()
        };
        let api: Api<Pod> = Api::namespaced(self.client.clone(), ctx.namespace());
        let reader = api.log_stream(&pod, &params).await?;
        Ok(reader.lines())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, DeployError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default().labels(selector))
            .await?;
        debug!(selector, pods = list.items.len(), "listed pods");
        Ok(list.items)
    }

    async fn first_pod(&self, ctx: &DeploymentContext) -> Result<String, DeployError> {
        let pods = self.list_pods(ctx.namespace(), &ctx.service_selector()).await?;
        pods.first()
            .and_then(|pod| pod.metadata.name.clone())
            .ok_or(DeployError::ResourceNotFound {
                kind: "Pod".to_string(),
                name: ctx.service_name().to_string(),
            })
    }

    /// Side query for the exposed address. A missing service never fails the
    /// status, it only leaves the address empty.
    async fn service_address(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<Option<ServiceAddress>, DeployError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .get_opt(service_name)
            .await?
            .map(|service| ServiceAddress::from_service(&service)))
    }
}
