use crate::captain::CaptainAgent;
use crate::file::FileAgent;
use crate::network::NetworkAgent;
use crate::research::ResearchAgent;
use conductor_core::{Agent, AgentKind, ConductorError, ConductorResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an agent from `(id, name)`.
pub type AgentConstructor = Arc<dyn Fn(&str, &str) -> Arc<dyn Agent> + Send + Sync>;

/// Maps agent type tags to constructors.
///
/// New kinds are registered here; nothing that dispatches work needs to know
/// about them.
#[derive(Clone)]
pub struct AgentFactory {
    constructors: HashMap<String, AgentConstructor>,
}

impl AgentFactory {
    /// An empty factory.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A factory with the captain, file, network and research agents.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register(AgentKind::Captain, |id, name| {
            Arc::new(CaptainAgent::new(id, name))
        });
        factory.register(AgentKind::File, |id, name| Arc::new(FileAgent::new(id, name)));
        factory.register(AgentKind::Network, |id, name| {
            Arc::new(NetworkAgent::new(id, name))
        });
        factory.register(AgentKind::Research, |id, name| {
            Arc::new(ResearchAgent::new(id, name))
        });
        factory
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<AgentKind>, constructor: F)
    where
        F: Fn(&str, &str) -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        let kind: AgentKind = kind.into();
        self.constructors
            .insert(kind.as_str().to_string(), Arc::new(constructor));
    }

    pub fn supports(&self, kind: &AgentKind) -> bool {
        self.constructors.contains_key(kind.as_str())
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<AgentKind> {
        let mut tags: Vec<&String> = self.constructors.keys().collect();
        tags.sort();
        tags.into_iter().map(|t| AgentKind::from(t.as_str())).collect()
    }

    pub fn create(&self, kind: &AgentKind, id: &str, name: &str) -> ConductorResult<Arc<dyn Agent>> {
        let constructor = self
            .constructors
            .get(kind.as_str())
            .ok_or_else(|| ConductorError::Validation(format!("unknown agent kind: {kind}")))?;
        Ok(constructor(id, name))
    }
}

impl Default for AgentFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}
