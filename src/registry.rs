use crate::error::DeployError;
use crate::handler::kinds::{
    ConfigMapHandler, DaemonSetHandler, DeploymentHandler, IngressHandler, JobHandler,
    NamespaceHandler, PersistentVolumeClaimHandler, PodHandler, SecretHandler,
    ServiceAccountHandler, ServiceHandler, StatefulSetHandler,
};
use crate::handler::ResourceHandler;
use std::sync::OnceLock;

/// Mapping from a resource kind name to its lifecycle handler, ordered by
/// ascending weight. Built once, read-only thereafter.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn ResourceHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl HandlerRegistry {
    /// An empty handler set is a fatal configuration error, never
    /// "nothing to do".
    pub fn new(mut handlers: Vec<Box<dyn ResourceHandler>>) -> Result<Self, DeployError> {
        if handlers.is_empty() {
            return Err(DeployError::NoHandlersRegistered);
        }
        handlers.sort_by_key(|handler| handler.weight());
        Ok(Self { handlers })
    }

    pub fn handler_for(&self, kind: &str) -> Option<&dyn ResourceHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.kind() == kind)
            .map(|handler| handler.as_ref())
    }

    /// All registered handlers, ordered by ascending weight.
    pub fn all_handlers(&self) -> &[Box<dyn ResourceHandler>] {
        &self.handlers
    }
}

fn builtin_handlers() -> Vec<Box<dyn ResourceHandler>> {
    vec![
        Box::new(NamespaceHandler),
        Box::new(ServiceAccountHandler),
        Box::new(SecretHandler),
        Box::new(ConfigMapHandler),
        Box::new(PersistentVolumeClaimHandler),
        Box::new(DeploymentHandler),
        Box::new(StatefulSetHandler),
        Box::new(DaemonSetHandler),
        Box::new(JobHandler),
        Box::new(PodHandler),
        Box::new(ServiceHandler),
        Box::new(IngressHandler),
    ]
}

/// The process-wide registry over the built-in kind set. Initialized lazily
/// exactly once; every later call returns the same instance.
pub fn registry() -> &'static HandlerRegistry {
    static REGISTRY: OnceLock<HandlerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        HandlerRegistry::new(builtin_handlers()).expect("the built-in handler set is not empty")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_handler_set_is_rejected() {
        assert_matches!(
            HandlerRegistry::new(vec![]).unwrap_err(),
            DeployError::NoHandlersRegistered
        );
    }

    #[test]
    fn handlers_are_ordered_by_weight() {
        let registry = registry();
        let weights: Vec<u16> = registry
            .all_handlers()
            .iter()
            .map(|handler| handler.weight())
            .collect();
        let mut sorted = weights.clone();
        sorted.sort();
        assert_eq!(weights, sorted);
    }

    #[test]
    fn lookup_by_kind() {
        let registry = registry();
        assert_eq!(registry.handler_for("Pod").unwrap().kind(), "Pod");
        assert!(registry.handler_for("HorizontalPodAutoscaler").is_none());
    }

    #[test]
    fn repeated_access_yields_the_same_registry() {
        let first = registry() as *const HandlerRegistry;
        let second = registry() as *const HandlerRegistry;
        assert_eq!(first, second);
    }
}
