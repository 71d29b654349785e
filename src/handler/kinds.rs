//! The closed, compile-time-known set of supported resource kinds.
//!
//! Weights encode dependency order: namespace and configuration objects are
//! mutated before workloads, workloads before the objects exposing them.

use super::{ResourceHandler, UpdatePolicy};
use kube::core::{ApiResource, GroupVersionKind};

fn core_v1(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk("", "v1", kind), plural)
}

fn apps_v1(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk("apps", "v1", kind), plural)
}

pub struct NamespaceHandler;

impl ResourceHandler for NamespaceHandler {
    fn kind(&self) -> &'static str {
        "Namespace"
    }
    fn weight(&self) -> u16 {
        0
    }
    fn api_resource(&self) -> ApiResource {
        core_v1("Namespace", "namespaces")
    }
    fn namespaced(&self) -> bool {
        false
    }
    // Other services may live in the namespace; never pruned on undeploy.
    fn clean_up(&self) -> bool {
        false
    }
}

pub struct ServiceAccountHandler;

impl ResourceHandler for ServiceAccountHandler {
    fn kind(&self) -> &'static str {
        "ServiceAccount"
    }
    fn weight(&self) -> u16 {
        10
    }
    fn api_resource(&self) -> ApiResource {
        core_v1("ServiceAccount", "serviceaccounts")
    }
}

pub struct SecretHandler;

impl ResourceHandler for SecretHandler {
    fn kind(&self) -> &'static str {
        "Secret"
    }
    fn weight(&self) -> u16 {
        20
    }
    fn api_resource(&self) -> ApiResource {
        core_v1("Secret", "secrets")
    }
}

pub struct ConfigMapHandler;

impl ResourceHandler for ConfigMapHandler {
    fn kind(&self) -> &'static str {
        "ConfigMap"
    }
    fn weight(&self) -> u16 {
        21
    }
    fn api_resource(&self) -> ApiResource {
        core_v1("ConfigMap", "configmaps")
    }
}

pub struct PersistentVolumeClaimHandler;

impl ResourceHandler for PersistentVolumeClaimHandler {
    fn kind(&self) -> &'static str {
        "PersistentVolumeClaim"
    }
    fn weight(&self) -> u16 {
        30
    }
    fn api_resource(&self) -> ApiResource {
        core_v1("PersistentVolumeClaim", "persistentvolumeclaims")
    }
}

pub struct DeploymentHandler;

impl ResourceHandler for DeploymentHandler {
    fn kind(&self) -> &'static str {
        "Deployment"
    }
    fn weight(&self) -> u16 {
        40
    }
    fn api_resource(&self) -> ApiResource {
        apps_v1("Deployment", "deployments")
    }
    fn is_workload(&self) -> bool {
        true
    }
}

pub struct StatefulSetHandler;

impl ResourceHandler for StatefulSetHandler {
    fn kind(&self) -> &'static str {
        "StatefulSet"
    }
    fn weight(&self) -> u16 {
        41
    }
    fn api_resource(&self) -> ApiResource {
        apps_v1("StatefulSet", "statefulsets")
    }
    fn is_workload(&self) -> bool {
        true
    }
}

pub struct DaemonSetHandler;

impl ResourceHandler for DaemonSetHandler {
    fn kind(&self) -> &'static str {
        "DaemonSet"
    }
    fn weight(&self) -> u16 {
        42
    }
    fn api_resource(&self) -> ApiResource {
        apps_v1("DaemonSet", "daemonsets")
    }
    fn is_workload(&self) -> bool {
        true
    }
}

pub struct JobHandler;

impl ResourceHandler for JobHandler {
    fn kind(&self) -> &'static str {
        "Job"
    }
    fn weight(&self) -> u16 {
        43
    }
    fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk("batch", "v1", "Job"), "jobs")
    }
    fn is_workload(&self) -> bool {
        true
    }
    // Job templates are immutable, a structural patch on them is rejected.
    fn default_policy(&self) -> UpdatePolicy {
        UpdatePolicy::Replace
    }
}

pub struct PodHandler;

impl ResourceHandler for PodHandler {
    fn kind(&self) -> &'static str {
        "Pod"
    }
    fn weight(&self) -> u16 {
        44
    }
    fn api_resource(&self) -> ApiResource {
        core_v1("Pod", "pods")
    }
    fn is_workload(&self) -> bool {
        true
    }
}

pub struct ServiceHandler;

impl ResourceHandler for ServiceHandler {
    fn kind(&self) -> &'static str {
        "Service"
    }
    fn weight(&self) -> u16 {
        50
    }
    fn api_resource(&self) -> ApiResource {
        core_v1("Service", "services")
    }
}

pub struct IngressHandler;

impl ResourceHandler for IngressHandler {
    fn kind(&self) -> &'static str {
        "Ingress"
    }
    fn weight(&self) -> u16 {
        60
    }
    fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk("networking.k8s.io", "v1", "Ingress"),
            "ingresses",
        )
    }
}
