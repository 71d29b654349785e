use crate::error::DeployError;
use kube::core::DynamicObject;
use std::collections::BTreeMap;
use std::fmt;

/// A rendered cluster resource document to be applied.
///
/// Wraps the parsed object together with the kind string used to look up its
/// lifecycle handler. Immutable once rendered; the dispatcher only reads it.
#[derive(Clone, Debug)]
pub struct Manifest {
    kind: String,
    object: DynamicObject,
}

impl Manifest {
    /// Parses a single YAML (or JSON) resource document.
    pub fn from_yaml(document: &str) -> Result<Self, DeployError> {
        let object: DynamicObject = serde_yaml::from_str(document)?;
        Self::from_object(object)
    }

    pub fn from_object(object: DynamicObject) -> Result<Self, DeployError> {
        let kind = object
            .types
            .as_ref()
            .map(|tm| tm.kind.clone())
            .filter(|kind| !kind.is_empty())
            .ok_or(DeployError::MissingField {
                kind: String::default(),
                field: "kind".to_string(),
            })?;
        Ok(Self { kind, object })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> Result<&str, DeployError> {
        self.object
            .metadata
            .name
            .as_deref()
            .ok_or(DeployError::MissingField {
                kind: self.kind.clone(),
                field: "metadata.name".to_string(),
            })
    }

    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.object.metadata.labels.as_ref()
    }

    pub fn object(&self) -> &DynamicObject {
        &self.object
    }

    /// The unique key a handler uses for get/patch/delete, with the
    /// operation's namespace filled in when the document carries none.
    pub fn resource_id(&self, fallback_namespace: &str) -> Result<ResourceId, DeployError> {
        Ok(ResourceId {
            kind: self.kind.clone(),
            name: self.name()?.to_string(),
            namespace: self
                .namespace()
                .unwrap_or(fallback_namespace)
                .to_string(),
        })
    }
}

/// (`kind`, `name`, `namespace`) identity of a cluster resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;

    pub(crate) const CONFIG_MAP_DOC: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: cfg
  namespace: shop
  labels:
    kubedeploy.io/service: web
data:
  key: value
"#;

    #[test]
    fn parses_kind_name_namespace() {
        let manifest = Manifest::from_yaml(CONFIG_MAP_DOC).unwrap();
        assert_eq!(manifest.kind(), "ConfigMap");
        assert_eq!(manifest.name().unwrap(), "cfg");
        assert_eq!(manifest.namespace(), Some("shop"));
        assert_eq!(
            manifest.labels().unwrap().get("kubedeploy.io/service"),
            Some(&"web".to_string())
        );
    }

    #[test]
    fn resource_id_uses_fallback_namespace() {
        let manifest = Manifest::from_yaml(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n",
        )
        .unwrap();
        let id = manifest.resource_id("fallback").unwrap();
        assert_eq!(id.to_string(), "fallback/ConfigMap/cfg");
    }

    #[test]
    fn document_without_kind_is_rejected() {
        let err = Manifest::from_yaml("metadata:\n  name: cfg\n").unwrap_err();
        assert_matches!(err, DeployError::MissingField { field, .. } => {
            assert_eq!(field, "kind");
        });
    }

    #[test]
    fn document_without_name_is_rejected_on_identity() {
        let manifest =
            Manifest::from_yaml("apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n").unwrap();
        assert_matches!(
            manifest.name().unwrap_err(),
            DeployError::MissingField { kind, field } => {
                assert_eq!(kind, "ConfigMap");
                assert_eq!(field, "metadata.name");
            }
        );
    }
}
