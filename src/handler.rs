use crate::annotations;
use crate::config::PollConfig;
use crate::error::DeployError;
use crate::manifest::{Manifest, ResourceId};
use crate::patch;
use crate::poll::{self, PollError};
use async_trait::async_trait;
use either::Either;
use json_patch::{PatchOperation, ReplaceOperation};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject};
use kube::{Api, Client};
use tracing::debug;

pub mod kinds;

/// How an existing resource is reconciled against a new manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Apply the structural diff between the last-applied configuration and
    /// the desired document.
    Patch,
    /// Overwrite all mutable fields with the desired document.
    Replace,
}

/// Label- or field-based filter used to locate the resources of one
/// service/app.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Label(String),
    Field(String),
}

impl Selector {
    fn list_params(&self) -> ListParams {
        match self {
            Selector::Label(selector) => ListParams::default().labels(selector),
            Selector::Field(selector) => ListParams::default().fields(selector),
        }
    }
}

/// Lifecycle operations for exactly one resource kind, uniform across kinds.
///
/// Implementations contribute the kind descriptor (kind name, apply weight,
/// workload/prune flags, API coordinates); the operations themselves are
/// provided over `Api<DynamicObject>`.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Apply order: lower weights are mutated first (namespace/config before
    /// workloads before services).
    fn weight(&self) -> u16;

    fn api_resource(&self) -> ApiResource;

    /// Whether resources of this kind participate in readiness waiting.
    fn is_workload(&self) -> bool {
        false
    }

    /// Whether resources of this kind are subject to pruning on undeploy.
    fn clean_up(&self) -> bool {
        true
    }

    fn namespaced(&self) -> bool {
        true
    }

    fn default_policy(&self) -> UpdatePolicy {
        UpdatePolicy::Patch
    }

    fn api(&self, client: &Client, namespace: &str) -> Api<DynamicObject> {
        if self.namespaced() {
            Api::namespaced_with(client.clone(), namespace, &self.api_resource())
        } else {
            Api::all_with(client.clone(), &self.api_resource())
        }
    }

    async fn create(
        &self,
        client: &Client,
        manifest: &Manifest,
        namespace: &str,
    ) -> Result<DynamicObject, DeployError> {
        let name = manifest.name()?;
        let mut desired = manifest.object().clone();
        annotations::stamp_last_applied(&mut desired)?;

        let created = self
            .api(client, namespace)
            .create(&PostParams::default(), &desired)
            .await?;
        debug!(kind = self.kind(), name, namespace, "created resource");
        Ok(created)
    }

    /// A missing resource is the distinguished
    /// [`DeployError::ResourceNotFound`], which callers branch on to decide
    /// create-vs-update and to detect completed deletions.
    async fn get(
        &self,
        client: &Client,
        name: &str,
        namespace: &str,
    ) -> Result<DynamicObject, DeployError> {
        self.api(client, namespace)
            .get(name)
            .await
            .map_err(|err| DeployError::from_get(self.kind(), name, err))
    }

    /// Empty vec, not an error, when nothing matches.
    async fn get_by_selector(
        &self,
        client: &Client,
        selector: &Selector,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>, DeployError> {
        let list = self
            .api(client, namespace)
            .list(&selector.list_params())
            .await?;
        Ok(list.items)
    }

    /// Reconciles `desired` against the live resource.
    ///
    /// Missing resource: creates it. Otherwise the last-applied-configuration
    /// annotation is the patch source and `desired` the target; an empty diff
    /// issues no mutation at all. Returns whether a mutation was issued.
    async fn patch(
        &self,
        client: &Client,
        name: &str,
        namespace: &str,
        desired: &Manifest,
    ) -> Result<bool, DeployError> {
        let current = match self.get(client, name, namespace).await {
            Err(err) if err.is_not_found() => {
                self.create(client, desired, namespace).await?;
                return Ok(true);
            }
            other => other?,
        };

        let target = desired.object().clone();
        let Some(source) = annotations::last_applied(&current)? else {
            // No patch source to diff against; replacing is the only
            // reconciliation that cannot echo server-owned fields.
            self.replace(client, name, namespace, desired).await?;
            return Ok(true);
        };

        let mut operations = patch::diff(&source, &target)?;
        if patch::is_noop(&operations) {
            debug!(
                kind = self.kind(),
                name, namespace, "resource already up to date, skipping patch"
            );
            return Ok(false);
        }
        operations.0.push(refresh_last_applied_op(&target)?);

        self.api(client, namespace)
            .patch(
                name,
                &PatchParams::default(),
                &Patch::<DynamicObject>::Json(operations),
            )
            .await?;
        debug!(kind = self.kind(), name, namespace, "patched resource");
        Ok(true)
    }

    async fn replace(
        &self,
        client: &Client,
        name: &str,
        namespace: &str,
        desired: &Manifest,
    ) -> Result<DynamicObject, DeployError> {
        let current = self.get(client, name, namespace).await?;

        let mut target = desired.object().clone();
        annotations::stamp_last_applied(&mut target)?;
        target.metadata.resource_version = current.metadata.resource_version;

        let replaced = self
            .api(client, namespace)
            .replace(name, &PostParams::default(), &target)
            .await?;
        debug!(kind = self.kind(), name, namespace, "replaced resource");
        Ok(replaced)
    }

    /// Issues a single delete call; an already-gone resource yields `false`.
    /// With `wait`, blocks on the deletion poller until the resource has
    /// fully disappeared.
    async fn delete(
        &self,
        client: &Client,
        name: &str,
        namespace: &str,
        wait: Option<&PollConfig>,
    ) -> Result<bool, DeployError> {
        let result = self
            .api(client, namespace)
            .delete(name, &DeleteParams::default())
            .await;
        match result {
            Ok(Either::Left(obj)) => {
                debug!(
                    kind = self.kind(),
                    name = obj.metadata.name.as_deref().unwrap_or(name),
                    namespace,
                    "deleting resource"
                );
            }
            Ok(Either::Right(status)) => {
                debug!(
                    kind = self.kind(),
                    name,
                    namespace,
                    ?status,
                    "deleted resource"
                );
            }
            Err(kube::Error::Api(ref response)) if response.code == 404 => {
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(poll_config) = wait {
            poll::wait_until_gone(poll_config.interval, poll_config.deletion_timeout, || {
                self.get(client, name, namespace)
            })
            .await
            .map_err(|err| match err {
                PollError::DeadlineExceeded { .. } => DeployError::FailedToDeleteResource {
                    timeout: poll_config.deletion_timeout,
                    remaining: format!("{namespace}/{}/{name}", self.kind()),
                },
                PollError::Fetch(err) => err,
            })?;
        }
        Ok(true)
    }

    /// Resolves matches via the selector and deletes each one, returning the
    /// identities that were deleted. The first hard failure aborts.
    async fn delete_by_selector(
        &self,
        client: &Client,
        selector: &Selector,
        namespace: &str,
        wait: Option<&PollConfig>,
    ) -> Result<Vec<ResourceId>, DeployError> {
        let matches = self.get_by_selector(client, selector, namespace).await?;

        let mut deleted = Vec::with_capacity(matches.len());
        for obj in matches {
            let name = obj
                .metadata
                .name
                .as_deref()
                .ok_or(DeployError::MissingField {
                    kind: self.kind().to_string(),
                    field: "metadata.name".to_string(),
                })?;
            self.delete(client, name, namespace, wait).await?;
            deleted.push(ResourceId {
                kind: self.kind().to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }
        Ok(deleted)
    }
}

/// The patch operation keeping the last-applied annotation in sync with the
/// rest of the diff, so the next reconciliation diffs against what was
/// actually applied.
fn refresh_last_applied_op(target: &DynamicObject) -> Result<PatchOperation, DeployError> {
    let mut stamped = target.clone();
    annotations::stamp_last_applied(&mut stamped)?;
    let value = stamped
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotations::LAST_APPLIED_CONFIG_KEY))
        .cloned()
        .ok_or(DeployError::PatchComputation {
            kind: target
                .types
                .as_ref()
                .map(|tm| tm.kind.clone())
                .unwrap_or_default(),
            name: target.metadata.name.clone().unwrap_or_default(),
            reason: "last-applied annotation missing after stamping".to_string(),
        })?;

    Ok(PatchOperation::Replace(ReplaceOperation {
        path: jsonptr::PointerBuf::from_tokens([
            "metadata",
            "annotations",
            annotations::LAST_APPLIED_CONFIG_KEY,
        ]),
        value: serde_json::Value::String(value),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::handler::kinds::ConfigMapHandler;
    use crate::manifest::tests::CONFIG_MAP_DOC;
    use assert_matches::assert_matches;
    use kube::Client;
    use tower_test::mock;

    pub(crate) type ApiServerHandle =
        mock::Handle<http::Request<kube::client::Body>, http::Response<kube::client::Body>>;

    pub(crate) fn mocked_client() -> (Client, ApiServerHandle) {
        let (mock_service, handle) =
            mock::pair::<http::Request<kube::client::Body>, http::Response<kube::client::Body>>();
        (Client::new(mock_service, "default"), handle)
    }

    pub(crate) fn respond_json(
        send: mock::SendResponse<http::Response<kube::client::Body>>,
        data: &serde_json::Value,
    ) {
        let response = serde_json::to_vec(data).unwrap();
        send.send_response(
            http::Response::builder()
                .body(kube::client::Body::from(response))
                .unwrap(),
        );
    }

    pub(crate) fn respond_not_found(send: mock::SendResponse<http::Response<kube::client::Body>>) {
        let body = serde_json::to_vec(&serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": "not found",
            "reason": "NotFound",
            "code": 404,
        }))
        .unwrap();
        send.send_response(
            http::Response::builder()
                .status(404)
                .body(kube::client::Body::from(body))
                .unwrap(),
        );
    }

    pub(crate) fn list_of(items: Vec<serde_json::Value>) -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "List",
            "metadata": { "resourceVersion": "1" },
            "items": items,
        })
    }

    pub(crate) struct ApiServerVerifier(pub(crate) ApiServerHandle);

    pub(crate) enum Scenario {
        /// Responds 404 to everything.
        NotFound,
        /// Responds to a single GET with the given object, then 404s.
        GetOk(serde_json::Value),
        /// Responds to a single LIST with the given item list.
        List(Vec<serde_json::Value>),
        /// Echoes the request body of a single POST back.
        Create,
        /// DELETE is acknowledged, subsequent GETs return 404.
        DeleteThenGone,
        /// Responds to any number of requests with the given object and
        /// records the request methods (retrieve them via the join handle).
        Record(serde_json::Value),
    }

    impl ApiServerVerifier {
        pub(crate) fn run(mut self, scenario: Scenario) -> tokio::task::JoinHandle<Vec<String>> {
            tokio::spawn(async move {
                let mut methods: Vec<String> = vec![];
                match scenario {
                    Scenario::NotFound => loop {
                        let Some((request, send)) = self.0.next_request().await else {
                            return methods;
                        };
                        methods.push(request.method().as_str().to_string());
                        respond_not_found(send);
                    },
                    Scenario::GetOk(object) => {
                        let (request, send) =
                            self.0.next_request().await.expect("service not called");
                        assert_eq!(request.method().as_str(), "GET");
                        methods.push(request.method().as_str().to_string());
                        respond_json(send, &object);
                        while let Some((request, send)) = self.0.next_request().await {
                            methods.push(request.method().as_str().to_string());
                            respond_not_found(send);
                        }
                    }
                    Scenario::List(items) => {
                        let (request, send) =
                            self.0.next_request().await.expect("service not called");
                        assert_eq!(request.method().as_str(), "GET");
                        methods.push(request.method().as_str().to_string());
                        respond_json(send, &list_of(items));
                    }
                    Scenario::Create => {
                        let (request, send) =
                            self.0.next_request().await.expect("service not called");
                        assert_eq!(request.method().as_str(), "POST");
                        methods.push(request.method().as_str().to_string());
                        use http_body_util::BodyExt;
                        let bytes = request
                            .into_body()
                            .collect()
                            .await
                            .expect("request body")
                            .to_bytes();
                        let object: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                        respond_json(send, &object);
                    }
                    Scenario::DeleteThenGone => {
                        let (request, send) =
                            self.0.next_request().await.expect("service not called");
                        assert_eq!(request.method().as_str(), "DELETE");
                        methods.push(request.method().as_str().to_string());
                        respond_json(
                            send,
                            &serde_json::json!({
                                "kind": "Status",
                                "apiVersion": "v1",
                                "status": "Success",
                            }),
                        );
                        while let Some((request, send)) = self.0.next_request().await {
                            methods.push(request.method().as_str().to_string());
                            respond_not_found(send);
                        }
                    }
                    Scenario::Record(object) => {
                        while let Some((request, send)) = self.0.next_request().await {
                            methods.push(request.method().as_str().to_string());
                            respond_json(send, &object);
                        }
                    }
                }
                methods
            })
        }
    }

    fn manifest() -> Manifest {
        Manifest::from_yaml(CONFIG_MAP_DOC).unwrap()
    }

    fn live_object_with_last_applied() -> serde_json::Value {
        let mut desired = manifest().object().clone();
        annotations::stamp_last_applied(&mut desired).unwrap();
        let mut live = serde_json::to_value(&desired).unwrap();
        live["metadata"]["resourceVersion"] = serde_json::json!("42");
        live
    }

    #[tokio::test]
    async fn get_maps_missing_resource_to_not_found() {
        let (client, handle) = mocked_client();
        ApiServerVerifier(handle).run(Scenario::NotFound);

        let err = ConfigMapHandler
            .get(&client, "cfg", "shop")
            .await
            .unwrap_err();
        assert_matches!(err, DeployError::ResourceNotFound { kind, name } => {
            assert_eq!(kind, "ConfigMap");
            assert_eq!(name, "cfg");
        });
    }

    #[tokio::test]
    async fn get_by_selector_with_no_matches_is_an_empty_list() {
        let (client, handle) = mocked_client();
        ApiServerVerifier(handle).run(Scenario::List(vec![]));

        let matches = ConfigMapHandler
            .get_by_selector(
                &client,
                &Selector::Label("kubedeploy.io/service=web".to_string()),
                "shop",
            )
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn create_stamps_the_last_applied_annotation() {
        let (client, handle) = mocked_client();
        ApiServerVerifier(handle).run(Scenario::Create);

        let created = ConfigMapHandler
            .create(&client, &manifest(), "shop")
            .await
            .unwrap();
        assert!(annotations::last_applied(&created).unwrap().is_some());
    }

    #[tokio::test]
    async fn patch_of_unchanged_manifest_issues_no_mutation() {
        let (client, handle) = mocked_client();
        let verifier = ApiServerVerifier(handle).run(Scenario::GetOk(live_object_with_last_applied()));

        let applied = ConfigMapHandler
            .patch(&client, "cfg", "shop", &manifest())
            .await
            .unwrap();
        assert!(!applied, "empty diff must be a no-op");

        drop(client);
        assert_eq!(verifier.await.unwrap(), vec!["GET"]);
    }

    #[tokio::test]
    async fn patch_of_changed_manifest_issues_one_patch() {
        let (client, handle) = mocked_client();
        let verifier = ApiServerVerifier(handle).run(Scenario::Record(live_object_with_last_applied()));

        let changed = Manifest::from_yaml(&CONFIG_MAP_DOC.replace("value", "changed")).unwrap();
        let applied = ConfigMapHandler
            .patch(&client, "cfg", "shop", &changed)
            .await
            .unwrap();
        assert!(applied);

        drop(client);
        assert_eq!(verifier.await.unwrap(), vec!["GET", "PATCH"]);
    }

    #[tokio::test]
    async fn patch_without_last_applied_annotation_falls_back_to_replace() {
        let (client, handle) = mocked_client();
        let mut live = serde_json::to_value(manifest().object()).unwrap();
        live["metadata"]["resourceVersion"] = serde_json::json!("42");
        let verifier = ApiServerVerifier(handle).run(Scenario::Record(live));

        let applied = ConfigMapHandler
            .patch(&client, "cfg", "shop", &manifest())
            .await
            .unwrap();
        assert!(applied);

        drop(client);
        // get for the patch, get inside replace, then the overwrite itself
        assert_eq!(verifier.await.unwrap(), vec!["GET", "GET", "PUT"]);
    }

    #[tokio::test]
    async fn delete_of_missing_resource_reports_not_deleted() {
        let (client, handle) = mocked_client();
        ApiServerVerifier(handle).run(Scenario::NotFound);

        let deleted = ConfigMapHandler
            .delete(&client, "cfg", "shop", None)
            .await
            .unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn delete_with_wait_blocks_until_gone() {
        let (client, handle) = mocked_client();
        ApiServerVerifier(handle).run(Scenario::DeleteThenGone);

        let poll_config = PollConfig {
            interval: std::time::Duration::from_millis(10),
            ..Default::default()
        };
        let deleted = ConfigMapHandler
            .delete(&client, "cfg", "shop", Some(&poll_config))
            .await
            .unwrap();
        assert!(deleted);
    }
}
