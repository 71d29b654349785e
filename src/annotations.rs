use crate::error::DeployError;
use kube::core::DynamicObject;
use std::collections::BTreeMap;

/// Annotation holding the manifest that was last applied to a resource, the
/// same convention `kubectl apply` uses. It is the *source* side of every
/// patch computation.
pub const LAST_APPLIED_CONFIG_KEY: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Stamps `obj` with its own serialization under the last-applied annotation.
///
/// The stored document never contains the annotation itself, so the stamp is
/// stable across repeated applications of the same manifest.
pub fn stamp_last_applied(obj: &mut DynamicObject) -> Result<(), DeployError> {
    let mut stripped = obj.clone();
    remove_last_applied(&mut stripped);

    let serialized = serde_json::to_string(&stripped).map_err(|err| DeployError::ParseDynamic {
        kind: kind_of(obj),
        reason: err.to_string(),
    })?;

    obj.metadata
        .annotations
        .get_or_insert_with(BTreeMap::default)
        .insert(LAST_APPLIED_CONFIG_KEY.to_string(), serialized);
    Ok(())
}

/// Reads the last-applied annotation back as a full object, `None` when the
/// resource was not created through this engine (or the annotation was lost).
pub fn last_applied(obj: &DynamicObject) -> Result<Option<DynamicObject>, DeployError> {
    let Some(serialized) = obj
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(LAST_APPLIED_CONFIG_KEY))
    else {
        return Ok(None);
    };

    let parsed =
        serde_json::from_str(serialized).map_err(|err| DeployError::ParseDynamic {
            kind: kind_of(obj),
            reason: err.to_string(),
        })?;
    Ok(Some(parsed))
}

fn remove_last_applied(obj: &mut DynamicObject) {
    if let Some(annotations) = obj.metadata.annotations.as_mut() {
        annotations.remove(LAST_APPLIED_CONFIG_KEY);
        if annotations.is_empty() {
            obj.metadata.annotations = None;
        }
    }
}

fn kind_of(obj: &DynamicObject) -> String {
    obj.types
        .as_ref()
        .map(|tm| tm.kind.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::{ObjectMeta, TypeMeta};

    fn config_map(name: &str) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta {
                api_version: "v1".to_string(),
                kind: "ConfigMap".to_string(),
            }),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            data: serde_json::json!({"data": {"key": "value"}}),
        }
    }

    #[test]
    fn stamp_and_read_back() {
        let mut obj = config_map("cfg");
        stamp_last_applied(&mut obj).unwrap();

        let stored = last_applied(&obj).unwrap().expect("annotation must exist");
        assert_eq!(stored.metadata.name.as_deref(), Some("cfg"));
        assert_eq!(stored.data, obj.data);
        // the stored document never embeds the annotation itself
        assert!(last_applied(&stored).unwrap().is_none());
    }

    #[test]
    fn stamp_twice_is_stable() {
        let mut first = config_map("cfg");
        stamp_last_applied(&mut first).unwrap();

        let mut second = first.clone();
        stamp_last_applied(&mut second).unwrap();

        assert_eq!(
            first.metadata.annotations, second.metadata.annotations,
            "re-stamping the same manifest must not change the annotation"
        );
    }

    #[test]
    fn missing_annotation_reads_as_none() {
        assert!(last_applied(&config_map("cfg")).unwrap().is_none());
    }
}
