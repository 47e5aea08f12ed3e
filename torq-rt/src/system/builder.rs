// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::actor_system::{ActorSystem, SystemShared};
use super::config::SystemConfig;
use super::errors::SystemError;
use super::modules::system_module;
use crate::actor::core::launch;
use crate::actor::handle::ActorRef;
use crate::message::{ControlMsg, Envelope};
use crate::util::ActorAddress;
use crate::value::{ActorCfg, Value};

/// Builds an [`ActorSystem`]: configuration plus the module registry.
///
/// # Example
/// ```rust,ignore
/// use torq_rt::system::{ActorSystem, SystemConfig};
///
/// let system = ActorSystem::builder()
///     .with_config(SystemConfig::default().with_instruction_budget(1_000))
///     .add_default_modules()
///     .build();
/// ```
pub struct ActorSystemBuilder {
    config: SystemConfig,
    modules: Vec<(String, Value)>,
}

impl ActorSystemBuilder {
    /// A builder with default configuration and no modules.
    pub fn new() -> Self {
        Self {
            config: SystemConfig::default(),
            modules: Vec::new(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the built-in modules under their qualifiers. The `system`
    /// qualifier is special-cased at lookup regardless; registering it here
    /// makes the default set explicit.
    pub fn add_default_modules(mut self) -> Self {
        self.modules.push(("system".to_string(), system_module()));
        self
    }

    /// Register a module record under a qualifier. The record must be a
    /// Complete value.
    pub fn add_module(mut self, qualifier: impl Into<String>, module: Value) -> Self {
        self.modules.push((qualifier.into(), module));
        self
    }

    /// Build the system.
    pub fn build(self) -> ActorSystem {
        ActorSystem::from_shared(Arc::new(SystemShared::new(self.config, self.modules)))
    }
}

impl Default for ActorSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds one actor: address, system, trace flag, then `spawn(cfg)`.
///
/// The builder accepts kernel-level configurations; lowering surface syntax
/// into a handler constructor is the front end's concern, not the runtime's.
///
/// # Example
/// ```rust,ignore
/// use torq_rt::system::{ActorBuilder, ActorSystem};
/// use torq_rt::util::ActorAddress;
///
/// # async fn example(system: ActorSystem, cfg: torq_rt::value::ActorCfg) {
/// let actor = ActorBuilder::new()
///     .set_system(system)
///     .set_address(ActorAddress::named("greeter"))
///     .spawn(cfg)
///     .unwrap();
/// # }
/// ```
pub struct ActorBuilder {
    system: Option<ActorSystem>,
    address: Option<ActorAddress>,
    trace: Option<bool>,
}

impl ActorBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self {
            system: None,
            address: None,
            trace: None,
        }
    }

    /// The system to spawn into (required).
    pub fn set_system(mut self, system: ActorSystem) -> Self {
        self.system = Some(system);
        self
    }

    /// The actor's address (default: anonymous).
    pub fn set_address(mut self, address: ActorAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// Per-actor trace override (default: the system's trace flag).
    pub fn set_trace(mut self, trace: bool) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Spawn the actor and send its `Configure` control message.
    ///
    /// Must run within a tokio runtime; actors are tasks.
    pub fn spawn(self, cfg: ActorCfg) -> Result<ActorRef, SystemError> {
        let system = self.system.ok_or(SystemError::NoSystem)?;
        let address = self.address.unwrap_or_else(ActorAddress::anonymous);
        if system.actor_at(address.path()).is_some() {
            return Err(SystemError::ActorAlreadyRegistered(
                address.path().to_string(),
            ));
        }
        let trace = self.trace.unwrap_or(system.config().trace);
        let actor = launch(system.shared(), address, trace, false)?;
        actor.send(Envelope::control(ControlMsg::Configure { cfg }));
        Ok(actor)
    }
}

impl Default for ActorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
