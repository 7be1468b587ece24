//! Agent registry
//!
//! An explicit value constructed once at startup and passed by reference
//! into the orchestrator. No ambient global lookup: tests build isolated
//! registries with fake executors.

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::capability::{AgentAvailability, AgentCapabilities};
use crate::executor::SharedExecutor;

/// Registry lookup errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Unknown agent name. Distinct from "registered but unavailable",
    /// which is a normal non-error listing result.
    #[error("agent '{0}' not found")]
    NotFound(String),
}

struct Entry {
    caps: AgentCapabilities,
    executor: SharedExecutor,
}

/// Central registry of investigation agents
#[derive(Default)]
pub struct AgentRegistry {
    entries: HashMap<String, Entry>,
    /// Registration order, for stable listings
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its capability name. Re-registering a name
    /// replaces the executor but keeps the original position.
    pub fn register(&mut self, caps: AgentCapabilities, executor: SharedExecutor) {
        let name = caps.name.clone();
        if self.entries.insert(name.clone(), Entry { caps, executor }).is_none() {
            self.order.push(name.clone());
        }
        debug!(agent = %name, "registered agent");
    }

    /// Look up an executor by name.
    pub fn get(&self, name: &str) -> Result<SharedExecutor, RegistryError> {
        self.entries
            .get(name)
            .map(|e| e.executor.clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Capability metadata for one agent.
    pub fn capabilities(&self, name: &str) -> Result<&AgentCapabilities, RegistryError> {
        self.entries
            .get(name)
            .map(|e| &e.caps)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All registered names, in registration order.
    pub fn list_all(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Names plus availability (env-var presence only; no network).
    pub fn list_available(&self) -> Vec<AgentAvailability> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|entry| {
                let (available, reason) = entry.caps.availability();
                AgentAvailability {
                    name: entry.caps.name.clone(),
                    available,
                    reason,
                }
            })
            .collect()
    }

    /// Names of agents whose keyword set matches the given token,
    /// case-insensitively.
    pub fn get_by_capability(&self, token: &str) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .filter(|entry| entry.caps.matches_keyword(token))
            .map(|entry| entry.caps.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{AgentError, AgentExecutor};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct CannedAgent(&'static str);

    #[async_trait]
    impl AgentExecutor for CannedAgent {
        async fn run(&self, _instruction: &str) -> Result<String, AgentError> {
            Ok(self.0.to_string())
        }
    }

    fn registry() -> AgentRegistry {
        let mut reg = AgentRegistry::new();
        reg.register(
            AgentCapabilities::new("SearchAgent", "general search")
                .with_keywords(&["search", "news"]),
            Arc::new(CannedAgent("search results")),
        );
        reg.register(
            AgentCapabilities::new("ThreatIntelAgent", "threat intel")
                .with_keywords(&["threat", "apt", "ransomware"])
                .with_required_env(&["CORVUS_UNSET_FOR_TEST"]),
            Arc::new(CannedAgent("threat report")),
        );
        reg
    }

    #[tokio::test]
    async fn test_get_known_agent() {
        let reg = registry();
        let executor = reg.get("SearchAgent").unwrap();
        assert_eq!(executor.run("x").await.unwrap(), "search results");
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.get("NoSuchAgent"),
            Err(RegistryError::NotFound(name)) if name == "NoSuchAgent"
        ));
    }

    #[test]
    fn test_unavailable_is_listed_not_error() {
        let reg = registry();
        // Missing credentials do not make the agent unknown
        assert!(reg.get("ThreatIntelAgent").is_ok());

        let listing = reg.list_available();
        let threat = listing.iter().find(|a| a.name == "ThreatIntelAgent").unwrap();
        assert!(!threat.available);
        assert!(threat.reason.contains("CORVUS_UNSET_FOR_TEST"));
    }

    #[test]
    fn test_list_all_preserves_order() {
        let reg = registry();
        assert_eq!(reg.list_all(), vec!["SearchAgent", "ThreatIntelAgent"]);
    }

    #[test]
    fn test_get_by_capability() {
        let reg = registry();
        assert_eq!(reg.get_by_capability("ransomware"), vec!["ThreatIntelAgent"]);
        assert_eq!(reg.get_by_capability("NEWS"), vec!["SearchAgent"]);
        assert!(reg.get_by_capability("astrology").is_empty());
    }
}
