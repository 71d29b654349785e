use crate::error::DeployError;
use kube::core::DynamicObject;

/// Computes the RFC6902 patch turning `source` into `target`.
///
/// Pure function over the canonical JSON trees of the two documents. It is
/// only ever fed (last-applied-configuration, desired) pairs so fields owned
/// by the cluster (status, resourceVersion) never show up in the result.
pub fn diff(source: &DynamicObject, target: &DynamicObject) -> Result<json_patch::Patch, DeployError> {
    let source_tree = to_tree(source)?;
    let target_tree = to_tree(target)?;
    Ok(json_patch::diff(&source_tree, &target_tree))
}

/// An empty patch means the desired state is already applied; reconciliation
/// must not issue any mutation for it.
pub fn is_noop(patch: &json_patch::Patch) -> bool {
    patch.0.is_empty()
}

fn to_tree(obj: &DynamicObject) -> Result<serde_json::Value, DeployError> {
    serde_json::to_value(obj).map_err(|err| DeployError::PatchComputation {
        kind: obj
            .types
            .as_ref()
            .map(|tm| tm.kind.clone())
            .unwrap_or_default(),
        name: obj.metadata.name.clone().unwrap_or_default(),
        reason: err.to_string(),
    })
}
