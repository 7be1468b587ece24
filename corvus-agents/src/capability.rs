//! Agent capability descriptors
//!
//! Immutable metadata used for discovery and keyword routing. Availability
//! is derived from required environment variables only; checking it never
//! touches the network.

use serde::{Deserialize, Serialize};

/// Static description of one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    /// Unique registry key
    pub name: String,
    pub description: String,
    /// Environment variables that must be set for the agent to work
    pub required_env: Vec<String>,
    /// Topic keywords this agent responds to (lowercase)
    pub keywords: Vec<String>,
    /// Optional cap on results the agent should return
    pub max_results: Option<usize>,
    /// Optional requests-per-minute limit of the underlying service
    pub rate_limit: Option<u32>,
}

impl AgentCapabilities {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required_env: Vec::new(),
            keywords: Vec::new(),
            max_results: None,
            rate_limit: None,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }

    pub fn with_required_env(mut self, vars: &[&str]) -> Self {
        self.required_env = vars.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Side-effect-free availability check against the process environment.
    ///
    /// Returns `(false, reason)` naming the first missing variable.
    pub fn availability(&self) -> (bool, String) {
        for var in &self.required_env {
            if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
                return (false, format!("{} is not set", var));
            }
        }
        (true, "ready".to_string())
    }

    /// Case-insensitive keyword match against a topic token.
    ///
    /// Matches when the token contains a keyword or a keyword contains the
    /// token, so "ransomware-as-a-service" still routes to "ransomware".
    pub fn matches_keyword(&self, token: &str) -> bool {
        let token = token.to_lowercase();
        if token.is_empty() {
            return false;
        }
        // The reverse direction requires a few characters so stopwords like
        // "of" cannot match inside longer keywords.
        self.keywords.iter().any(|k| {
            token.contains(k.as_str()) || (token.len() >= 3 && k.contains(token.as_str()))
        })
    }
}

/// Availability entry returned by the registry listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAvailability {
    pub name: String,
    pub available: bool,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_missing_env() {
        let caps = AgentCapabilities::new("T", "test")
            .with_required_env(&["CORVUS_TEST_DEFINITELY_UNSET_VAR"]);
        let (available, reason) = caps.availability();
        assert!(!available);
        assert!(reason.contains("CORVUS_TEST_DEFINITELY_UNSET_VAR"));
    }

    #[test]
    fn test_availability_no_requirements() {
        let caps = AgentCapabilities::new("T", "test");
        assert!(caps.availability().0);
    }

    #[test]
    fn test_keyword_matching() {
        let caps = AgentCapabilities::new("T", "test").with_keywords(&["ransomware", "apt"]);
        assert!(caps.matches_keyword("ransomware"));
        assert!(caps.matches_keyword("RANSOMWARE-as-a-service"));
        assert!(caps.matches_keyword("ransom")); // token contained in keyword
        assert!(!caps.matches_keyword("phishing"));
        assert!(!caps.matches_keyword(""));
    }
}
