use crate::labels::SERVICE_LABEL_KEY;
use crate::pod;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Pod, Service};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// The deployment-status verdict for one service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    NotDeployed,
    Running,
    NotRunning,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceState::NotDeployed => "NOT_DEPLOYED",
            ServiceState::Running => "RUNNING",
            ServiceState::NotRunning => "NOT_RUNNING",
        };
        f.write_str(label)
    }
}

/// Where a service is reachable; `host` stays empty until the load balancer
/// has assigned an ingress point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceAddress {
    pub host: Option<String>,
    pub ports: Vec<i32>,
}

impl ServiceAddress {
    pub fn from_service(service: &Service) -> Self {
        let host = service
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|ingress| ingress.first())
            .and_then(|entry| entry.ip.clone().or_else(|| entry.hostname.clone()));

        let ports = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_ref())
            .map(|ports| ports.iter().map(|port| port.port).collect())
            .unwrap_or_default();

        Self { host, ports }
    }
}

/// Aggregated verdict over all pods of one service. Constructed fresh on
/// every status query, never mutated after return.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeploymentStatus {
    pub service: String,
    pub state: ServiceState,
    /// Start time of the oldest replica.
    pub age: Option<DateTime<Utc>>,
    /// Aggregated failure reasons of non-ready pods; absent when all pods
    /// are ready.
    pub message: Option<String>,
    pub address: Option<ServiceAddress>,
}

impl DeploymentStatus {
    pub(crate) fn with_address(mut self, address: Option<ServiceAddress>) -> Self {
        self.address = address;
        self
    }
}

/// Reduces the pods matching one service selector into a single status.
///
/// Zero pods is `NOT_DEPLOYED`; `RUNNING` iff every pod satisfies the ready
/// condition, `NOT_RUNNING` with an aggregated message otherwise.
pub fn reduce(service: &str, pods: &[Pod]) -> DeploymentStatus {
    if pods.is_empty() {
        return DeploymentStatus {
            service: service.to_string(),
            state: ServiceState::NotDeployed,
            age: None,
            message: None,
            address: None,
        };
    }

    let age = pods.iter().filter_map(pod::start_time).min();
    let not_ready: Vec<&Pod> = pods.iter().filter(|p| !pod::is_ready(p)).collect();

    if not_ready.is_empty() {
        return DeploymentStatus {
            service: service.to_string(),
            state: ServiceState::Running,
            age,
            message: None,
            address: None,
        };
    }

    let mut parts: Vec<String> = Vec::new();
    for pod in not_ready {
        let mut line = format!("pod '{}'", pod::pod_name(pod));
        let summary = pod::container_summary(pod);
        if !summary.is_empty() {
            line.push_str(&format!(" [{summary}]"));
        }
        if let Some(reason) = pod::failure_reason(pod) {
            line.push_str(&format!(": {reason}"));
        }
        if !parts.contains(&line) {
            parts.push(line);
        }
    }

    DeploymentStatus {
        service: service.to_string(),
        state: ServiceState::NotRunning,
        age,
        message: Some(parts.join("; ")),
        address: None,
    }
}

/// Partitions a flat pod list by the per-pod service-name label, for
/// multi-service status queries. Pods missing the label cannot be attributed
/// to a service and are skipped.
pub fn partition(pods: Vec<Pod>) -> BTreeMap<String, Vec<Pod>> {
    let mut grouped: BTreeMap<String, Vec<Pod>> = BTreeMap::new();
    for pod in pods {
        let Some(service) = pod
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(SERVICE_LABEL_KEY))
            .cloned()
        else {
            warn!(
                pod = pod::pod_name(&pod),
                "pod carries no service label, skipping"
            );
            continue;
        };
        grouped.entry(service).or_default().push(pod);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::tests::{crash_looping_pod, pod_with_conditions, ready_pod, with_start_time};
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, ServicePort, ServiceSpec, ServiceStatus,
    };

    #[test]
    fn no_pods_means_not_deployed() {
        let status = reduce("web", &[]);
        assert_eq!(status.state, ServiceState::NotDeployed);
        assert!(status.age.is_none());
        assert!(status.message.is_none());
    }

    #[test]
    fn all_ready_pods_mean_running_without_message() {
        let status = reduce("web", &[ready_pod("web-0"), ready_pod("web-1")]);
        assert_eq!(status.state, ServiceState::Running);
        assert!(status.message.is_none());
    }

    #[test]
    fn any_non_ready_pod_means_not_running_with_a_message() {
        let pods = vec![
            ready_pod("web-0"),
            ready_pod("web-1"),
            crash_looping_pod("web-2"),
        ];
        let status = reduce("web", &pods);
        assert_eq!(status.state, ServiceState::NotRunning);
        let message = status.message.unwrap();
        assert!(message.contains("web-2"), "{message}");
        assert!(message.contains("CrashLoopBackOff"), "{message}");
    }

    #[test]
    fn duplicate_failure_lines_are_folded() {
        // two anonymous pods failing identically produce one line
        let pod = pod_with_conditions("", vec![("Ready", "False", Some("not ready"))]);
        let status = reduce("web", &[pod.clone(), pod]);
        assert_eq!(status.message.unwrap(), "pod '': not ready");
    }

    #[test]
    fn age_is_the_start_time_of_the_oldest_replica() {
        let pods = vec![
            with_start_time(ready_pod("web-0"), "2026-01-10T09:00:00Z"),
            with_start_time(ready_pod("web-1"), "2026-01-10T08:00:00Z"),
        ];
        let status = reduce("web", &pods);
        assert_eq!(
            status.age.unwrap().to_rfc3339(),
            "2026-01-10T08:00:00+00:00"
        );
    }

    #[test]
    fn the_condition_message_wins_over_the_container_state() {
        let pod = pod_with_conditions(
            "web-0",
            vec![("Ready", "False", Some("containers with unready status: [app]"))],
        );
        let status = reduce("web", &[pod]);
        assert_eq!(
            status.message.unwrap(),
            "pod 'web-0': containers with unready status: [app]"
        );
    }

    #[test]
    fn partition_groups_pods_by_service_label() {
        let labeled = |name: &str, service: &str| {
            let mut pod = ready_pod(name);
            pod.metadata.labels = Some(BTreeMap::from([(
                SERVICE_LABEL_KEY.to_string(),
                service.to_string(),
            )]));
            pod
        };

        let grouped = partition(vec![
            labeled("web-0", "web"),
            labeled("worker-0", "worker"),
            labeled("web-1", "web"),
            ready_pod("orphan"),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["web"].len(), 2);
        assert_eq!(grouped["worker"].len(), 1);
    }

    #[test]
    fn address_resolution_from_a_service_object() {
        let service = Service {
            spec: Some(ServiceSpec {
                ports: Some(vec![
                    ServicePort {
                        port: 80,
                        ..Default::default()
                    },
                    ServicePort {
                        port: 443,
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(vec![LoadBalancerIngress {
                        ip: Some("203.0.113.7".to_string()),
                        ..Default::default()
                    }]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let address = ServiceAddress::from_service(&service);
        assert_eq!(address.host.as_deref(), Some("203.0.113.7"));
        assert_eq!(address.ports, vec![80, 443]);
    }

    #[test]
    fn unassigned_load_balancer_leaves_the_host_empty() {
        let address = ServiceAddress::from_service(&Service::default());
        assert!(address.host.is_none());
        assert!(address.ports.is_empty());
    }
}
