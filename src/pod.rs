use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use std::fmt;

/// Pod lifecycle predicates used as poll conditions and as status inputs.
///
/// The variants follow the order the kubelet reports them: a pod is scheduled
/// onto a node, its containers are created, then it passes its health checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodCondition {
    Scheduled,
    Initialized,
    Ready,
}

impl PodCondition {
    /// The `type` value of the corresponding entry in `status.conditions`.
    pub fn condition_type(&self) -> &'static str {
        match self {
            PodCondition::Scheduled => "PodScheduled",
            PodCondition::Initialized => "Initialized",
            PodCondition::Ready => "Ready",
        }
    }

    pub fn is_satisfied_by(&self, pod: &Pod) -> bool {
        pod.status
            .as_ref()
            .and_then(|status| status.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == self.condition_type() && c.status == "True")
            })
    }
}

impl fmt::Display for PodCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PodCondition::Scheduled => "scheduled",
            PodCondition::Initialized => "initialized",
            PodCondition::Ready => "ready",
        };
        f.write_str(label)
    }
}

pub fn pod_name(pod: &Pod) -> String {
    pod.metadata.name.clone().unwrap_or_default()
}

pub fn is_ready(pod: &Pod) -> bool {
    PodCondition::Ready.is_satisfied_by(pod)
}

pub fn start_time(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.status
        .as_ref()
        .and_then(|status| status.start_time.as_ref())
        .and_then(|time| DateTime::from_timestamp(time.0.as_second(), time.0.subsec_nanosecond() as u32))
}

/// One-line aggregation of the pod's container states, e.g.
/// `web: CrashLoopBackOff, sidecar: Running`.
pub fn container_summary(pod: &Pod) -> String {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|cs| format!("{}: {}", cs.name, container_state(cs)))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

/// The most specific failure reason of a non-ready pod: the structured
/// `Ready` condition message when the kubelet set one, otherwise a reason
/// derived from the first failing container.
pub fn failure_reason(pod: &Pod) -> Option<String> {
    let condition_message = pod
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.type_ == PodCondition::Ready.condition_type() && c.status != "True")
        })
        .and_then(|c| c.message.clone());

    condition_message.or_else(|| derived_container_failure(pod))
}

fn derived_container_failure(pod: &Pod) -> Option<String> {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .and_then(|statuses| {
            statuses.iter().filter(|cs| !cs.ready).find_map(|cs| {
                let state = cs.state.as_ref()?;
                if let Some(waiting) = &state.waiting {
                    return waiting.message.clone().or_else(|| waiting.reason.clone());
                }
                if let Some(terminated) = &state.terminated {
                    return Some(format!(
                        "{} (exit code {})",
                        terminated.reason.clone().unwrap_or("Terminated".to_string()),
                        terminated.exit_code
                    ));
                }
                None
            })
        })
}

fn container_state(cs: &ContainerStatus) -> String {
    let Some(state) = cs.state.as_ref() else {
        return "Unknown".to_string();
    };
    if let Some(waiting) = &state.waiting {
        return waiting.reason.clone().unwrap_or("Waiting".to_string());
    }
    if let Some(terminated) = &state.terminated {
        return terminated.reason.clone().unwrap_or("Terminated".to_string());
    }
    if state.running.is_some() {
        return "Running".to_string();
    }
    "Unknown".to_string()
}
