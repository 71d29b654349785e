//! # kubedeploy
//!
//! Deploys application workloads onto a Kubernetes cluster and reports on
//! their health. The crate's core is the resource lifecycle orchestration
//! engine: it takes a list of already-rendered manifests for one service,
//! reconciles each against live cluster state, waits for workload readiness
//! under bounded time budgets, tears resources down with deletion
//! confirmation, and aggregates pod state into one deployment-status verdict.
//!
//! Manifest rendering, image builds, CLI parsing and table output are
//! upstream/downstream collaborators and live outside this crate.

pub mod annotations;
pub mod client;
pub mod config;
pub mod context;
pub mod deployer;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod labels;
pub mod manifest;
pub mod patch;
pub mod pod;
pub mod poll;
pub mod registry;
pub mod status;

pub use crate::config::DeployConfig;
pub use crate::context::{DeploymentContext, LogOptions};
pub use crate::deployer::Deployer;
pub use crate::error::DeployError;
pub use crate::handler::UpdatePolicy;
pub use crate::manifest::{Manifest, ResourceId};
pub use crate::status::{DeploymentStatus, ServiceAddress, ServiceState};
