use std::collections::BTreeMap;

pub const MANAGED_BY_KEY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VAL: &str = "kubedeploy";
pub const APP_LABEL_KEY: &str = "kubedeploy.io/app";
pub const ENVIRONMENT_LABEL_KEY: &str = "kubedeploy.io/environment";
pub const SERVICE_LABEL_KEY: &str = "kubedeploy.io/service";

/// Collection of labels used to identify the resources of one app/service.
///
/// The same set is stamped on created resources and rendered as a label
/// selector to find them again.
#[derive(Clone, Default)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// Creates a new collection holding only the managed-by marker.
    pub fn new() -> Self {
        Labels(BTreeMap::from([(
            MANAGED_BY_KEY.to_string(),
            MANAGED_BY_VAL.to_string(),
        )]))
    }

    pub fn with_app(mut self, app: &str) -> Self {
        self.0.insert(APP_LABEL_KEY.to_string(), app.to_string());
        self
    }

    pub fn with_environment(mut self, environment: &str) -> Self {
        self.0
            .insert(ENVIRONMENT_LABEL_KEY.to_string(), environment.to_string());
        self
    }

    pub fn with_service(mut self, service: &str) -> Self {
        self.0
            .insert(SERVICE_LABEL_KEY.to_string(), service.to_string());
        self
    }

    pub fn get(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }

    /// Prints a label selector that matches all labels in the set.
    pub fn selector(&self) -> String {
        let mut selector = String::new();

        let mut iter = self.0.iter();

        if let Some((k, v)) = iter.next() {
            selector.push_str(format!("{k}={v}").as_str());
        }

        for (k, v) in iter {
            selector.push_str(format!(",{k}={v}").as_str());
        }

        selector
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn selector() {
        let labels = Labels::new()
            .with_app("shop")
            .with_environment("staging")
            .with_service("web");
        assert_eq!(
            format!(
                "{MANAGED_BY_KEY}={MANAGED_BY_VAL},{APP_LABEL_KEY}=shop,\
                 {ENVIRONMENT_LABEL_KEY}=staging,{SERVICE_LABEL_KEY}=web"
            ),
            labels.selector()
        );
    }

    #[test]
    fn selector_with_managed_by_only() {
        assert_eq!(
            format!("{MANAGED_BY_KEY}={MANAGED_BY_VAL}"),
            Labels::new().selector()
        );
    }
}
