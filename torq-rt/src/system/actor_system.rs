// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::builder::ActorSystemBuilder;
use super::config::SystemConfig;
use super::modules::system_module;
use crate::actor::handle::ActorRef;
use crate::message::{ControlMsg, Envelope};
use crate::util::ActorAddress;
use crate::value::Value;

/// State shared by every actor of one system instance.
///
/// Module and actor registries are concurrent maps: registration happens
/// from whichever actor turn spawns a child, lookup from any turn.
pub(crate) struct SystemShared {
    config: SystemConfig,
    modules: DashMap<String, Value>,
    registry: DashMap<String, ActorRef>,
}

impl SystemShared {
    pub(crate) fn new(config: SystemConfig, modules: Vec<(String, Value)>) -> Self {
        let map = DashMap::new();
        for (qualifier, module) in modules {
            map.insert(qualifier, module);
        }
        Self {
            config,
            modules: map,
            registry: DashMap::new(),
        }
    }

    pub(crate) fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Resolve a module qualifier. `"system"` always resolves to the
    /// built-in module; everything else goes through the registry.
    pub(crate) fn module_at(&self, qualifier: &str) -> Option<Value> {
        if qualifier == "system" {
            return Some(system_module());
        }
        self.modules.get(qualifier).map(|entry| entry.value().clone())
    }

    pub(crate) fn register(&self, actor: &ActorRef) {
        self.registry
            .insert(actor.address().path().to_string(), actor.clone());
    }

    pub(crate) fn deregister(&self, address: &ActorAddress) {
        self.registry.remove(address.path());
    }

    pub(crate) fn actor_count(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn actor_at(&self, path: &str) -> Option<ActorRef> {
        self.registry.get(path).map(|entry| entry.value().clone())
    }
}

/// A per-process actor system instance.
///
/// Owns the module registry consulted by `import` and the registry of live
/// actors. Cloning shares the instance.
///
/// # Example
/// ```rust,ignore
/// use torq_rt::system::ActorSystem;
///
/// let system = ActorSystem::builder()
///     .add_default_modules()
///     .build();
/// assert!(system.module_at("system").is_some());
/// ```
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemShared>,
}

impl ActorSystem {
    /// Start building a system.
    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::new()
    }

    pub(crate) fn from_shared(inner: Arc<SystemShared>) -> Self {
        Self { inner }
    }

    pub(crate) fn shared(&self) -> Arc<SystemShared> {
        Arc::clone(&self.inner)
    }

    /// The system configuration.
    pub fn config(&self) -> &SystemConfig {
        self.inner.config()
    }

    /// Resolve a module qualifier to its record.
    pub fn module_at(&self, qualifier: &str) -> Option<Value> {
        self.inner.module_at(qualifier)
    }

    /// Number of live actors.
    pub fn actor_count(&self) -> usize {
        self.inner.actor_count()
    }

    /// Look up a live actor by address path.
    pub fn actor_at(&self, path: &str) -> Option<ActorRef> {
        self.inner.actor_at(path)
    }

    /// Send the cooperative stop signal (priority 0).
    pub fn stop_actor(&self, actor: &ActorRef) {
        actor.send(Envelope::control(ControlMsg::Stop));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::value::{Lit, Rec, Value, ValueOrVar};

    #[test]
    fn system_module_is_always_resolvable() {
        let shared = SystemShared::new(SystemConfig::default(), Vec::new());
        assert!(shared.module_at("system").is_some());
        assert!(shared.module_at("missing").is_none());
    }

    #[test]
    fn registered_modules_resolve_by_qualifier() {
        let module = Value::Rec(
            Rec::new(
                Lit::str("examples.pi"),
                vec![(Lit::str("Pi"), ValueOrVar::Value(Value::Int(3)))],
            )
            .unwrap(),
        );
        let shared = SystemShared::new(
            SystemConfig::default(),
            vec![("examples.pi".to_string(), module)],
        );
        match shared.module_at("examples.pi") {
            Some(Value::Rec(rec)) => assert!(rec.find(&Lit::str("Pi")).is_some()),
            other => panic!("module missing: {other:?}"),
        }
    }
}
