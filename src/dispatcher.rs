use crate::config::PollConfig;
use crate::context::DeploymentContext;
use crate::error::DeployError;
use crate::handler::{ResourceHandler, Selector, UpdatePolicy};
use crate::manifest::{Manifest, ResourceId};
use crate::pod::PodCondition;
use crate::poll::{self, PollError};
use crate::registry::HandlerRegistry;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::{debug, info};

/// Drives an ordered list of manifests for one service through
/// create/reconcile/delete against the cluster.
///
/// One dispatcher handles one in-flight operation at a time; within an apply
/// pass resources are mutated strictly by ascending handler weight, and
/// readiness waiting happens strictly after all mutations.
pub struct Dispatcher<'a> {
    client: Client,
    registry: &'a HandlerRegistry,
    poll_config: PollConfig,
}

impl<'a> Dispatcher<'a> {
    pub fn new(client: Client, registry: &'a HandlerRegistry, poll_config: PollConfig) -> Self {
        Self {
            client,
            registry,
            poll_config,
        }
    }

    /// Applies the context's manifests in dependency order.
    ///
    /// Per resource: a missing one is created, an existing one reconciled
    /// under `policy_override` (or the handler's default policy). Exactly one
    /// mutation is issued per resource per pass; any failure aborts the
    /// remaining resources and already-applied ones are left as-is.
    pub async fn apply(
        &self,
        ctx: &DeploymentContext,
        policy_override: Option<UpdatePolicy>,
    ) -> Result<Vec<ResourceId>, DeployError> {
        let mut planned: Vec<(&Manifest, &dyn ResourceHandler)> = ctx
            .manifests()
            .iter()
            .map(|manifest| {
                self.registry
                    .handler_for(manifest.kind())
                    .map(|handler| (manifest, handler))
                    .ok_or(DeployError::OperationNotSupported {
                        kind: manifest.kind().to_string(),
                    })
            })
            .collect::<Result<_, _>>()?;
        planned.sort_by_key(|(_, handler)| handler.weight());
        let has_workload = planned.iter().any(|(_, handler)| handler.is_workload());

        let mut applied = Vec::with_capacity(planned.len());
        for (manifest, handler) in planned {
            let name = manifest.name()?;
            let namespace = manifest.namespace().unwrap_or(ctx.namespace());

            match handler.get(&self.client, name, namespace).await {
                Err(err) if err.is_not_found() => {
                    handler.create(&self.client, manifest, namespace).await?;
                }
                Ok(_) => {
                    let policy = policy_override.unwrap_or(handler.default_policy());
                    match policy {
                        UpdatePolicy::Patch => {
                            handler.patch(&self.client, name, namespace, manifest).await?;
                        }
                        UpdatePolicy::Replace => {
                            handler
                                .replace(&self.client, name, namespace, manifest)
                                .await?;
                        }
                    }
                }
                Err(err) => return Err(err),
            }
            applied.push(manifest.resource_id(ctx.namespace())?);
        }
        info!(
            service = ctx.service_name(),
            resources = applied.len(),
            "applied manifests"
        );

        // Readiness waiting only makes sense when the pass touched a
        // workload kind; a config-only apply has no pods to wait for.
        if ctx.wait_for_readiness() && has_workload {
            self.await_workload_ready(ctx).await?;
        }
        Ok(applied)
    }

    /// Blocks until the service's workload pods are scheduled, initialized
    /// and ready, in that fixed sequence. Each sub-wait is its own bounded
    /// poll over freshly listed pods.
    pub async fn await_workload_ready(&self, ctx: &DeploymentContext) -> Result<(), DeployError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), ctx.namespace());
        let params = ListParams::default().labels(&ctx.service_selector());

        for condition in [
            PodCondition::Scheduled,
            PodCondition::Initialized,
            PodCondition::Ready,
        ] {
            let fetch = || {
                let api = api.clone();
                let params = params.clone();
                async move {
                    api.list(&params)
                        .await
                        .map(|list| list.items)
                        .map_err(DeployError::from)
                }
            };

            let result = poll::poll_until(
                self.poll_config.interval,
                self.poll_config.readiness_timeout,
                fetch,
                |pods: &Vec<Pod>| {
                    !pods.is_empty() && pods.iter().all(|pod| condition.is_satisfied_by(pod))
                },
            )
            .await;

            match result {
                Ok(pods) => {
                    info!(
                        service = ctx.service_name(),
                        pods = pods.len(),
                        "workload pods {condition}"
                    );
                }
                Err(PollError::DeadlineExceeded { last }) => {
                    return Err(DeployError::FailedToInitializePod {
                        condition: condition.to_string(),
                        timeout: self.poll_config.readiness_timeout,
                        pending: pending_pods(&last, condition),
                    });
                }
                Err(PollError::Fetch(err)) => return Err(err),
            }
        }
        Ok(())
    }

    /// Reverses an apply: resolves this service's resources by label selector
    /// across every prunable handler, deletes them, and confirms full
    /// disappearance before reporting success.
    pub async fn undeploy(&self, ctx: &DeploymentContext) -> Result<Vec<ResourceId>, DeployError> {
        let selector = Selector::Label(ctx.service_selector());

        let mut deleted: Vec<ResourceId> = Vec::new();
        // Deletion runs in reverse weight order, workloads' dependents first.
        for handler in self
            .registry
            .all_handlers()
            .iter()
            .rev()
            .map(|handler| handler.as_ref())
            .filter(|handler| handler.clean_up())
        {
            let ids = handler
                .delete_by_selector(&self.client, &selector, ctx.namespace(), None)
                .await?;
            deleted.extend(ids);
        }
        debug!(
            service = ctx.service_name(),
            resources = deleted.len(),
            "resources marked for deletion"
        );

        let mut remaining: Vec<String> = Vec::new();
        for id in &deleted {
            let handler =
                self.registry
                    .handler_for(&id.kind)
                    .ok_or(DeployError::OperationNotSupported {
                        kind: id.kind.clone(),
                    })?;
            let wait = poll::wait_until_gone(
                self.poll_config.interval,
                self.poll_config.deletion_timeout,
                || handler.get(&self.client, &id.name, &id.namespace),
            )
            .await;
            match wait {
                Ok(()) => {}
                Err(PollError::DeadlineExceeded { .. }) => remaining.push(id.to_string()),
                Err(PollError::Fetch(err)) => return Err(err),
            }
        }

        if !remaining.is_empty() {
            return Err(DeployError::FailedToDeleteResource {
                timeout: self.poll_config.deletion_timeout,
                remaining: remaining.join(", "),
            });
        }
        info!(
            service = ctx.service_name(),
            resources = deleted.len(),
            "undeployed service"
        );
        Ok(deleted)
    }
}

fn pending_pods(pods: &[Pod], condition: PodCondition) -> String {
    if pods.is_empty() {
        return "no pods found".to_string();
    }
    pods.iter()
        .filter(|pod| !condition.is_satisfied_by(pod))
        .map(crate::pod::pod_name)
        .collect::<Vec<_>>()
        .join(", ")
}
