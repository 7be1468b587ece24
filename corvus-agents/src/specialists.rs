//! Built-in specialist agents
//!
//! Each specialist is a system prompt over a shared LLM backend. The prompt
//! asks for a JSON `evidence` block so results take the structured
//! extraction path; free-form answers still go through the markdown
//! fallback.

use async_trait::async_trait;
use tracing::debug;

use crate::backend::SharedBackend;
use crate::capability::AgentCapabilities;
use crate::executor::{AgentError, AgentExecutor};
use crate::registry::AgentRegistry;

/// Shared output contract appended to every specialist prompt
const EVIDENCE_CONTRACT: &str = r#"
Evidence requirements:
- Collect IOCs (IPs, domains, URLs, hashes, emails, CVEs, crypto addresses),
  entities (threat actors, malware, organizations, personas) and MITRE
  ATT&CK technique IDs.
- Respond with a single JSON object:
  {
    "report": "<markdown narrative>",
    "evidence": {
      "iocs": [{"kind": "ip|domain|url|hash-md5|hash-sha1|hash-sha256|email|cve|crypto-address", "value": "...", "context": "..."}],
      "entities": [{"kind": "threat-actor|malware|organization|persona", "name": "...", "context": "..."}],
      "techniques": ["T1059.001"]
    }
  }
- Every IOC needs context. Never fabricate indicators.
"#;

const SEARCH_PROMPT: &str = r#"
You are a web intelligence search specialist. Given an investigation
instruction, identify the most relevant open sources, summarize what public
reporting says about the topic, and surface concrete leads worth deeper
analysis. Stay factual; attribute claims to their sources.
"#;

const DORKING_PROMPT: &str = r#"
You are an advanced search-operator specialist. Construct targeted search
queries (site:, filetype:, intitle:, inurl: operators) that would expose
overlooked material about the investigation topic, and report what such
queries are known to surface. Flag exposed credentials or sensitive files
as findings, never reproduce their content.
"#;

const THREAT_INTEL_PROMPT: &str = r#"
You are a threat intelligence analyst. Given an investigation instruction,
characterize the relevant threat actors, campaigns, malware families and
TTPs. Map observed behavior to MITRE ATT&CK techniques and assess
confidence for each attribution claim.
"#;

const IOC_ANALYSIS_PROMPT: &str = r#"
You are an IOC analysis specialist. Extract every indicator of compromise
referenced by the investigation instruction or implied by the topic,
classify it precisely (ip, domain, url, hash type, email, cve,
crypto-address), and enrich each with the context in which it appears.
"#;

const USERNAME_PROMPT: &str = r#"
You are a username and persona research specialist. Given a handle, alias
or persona in the instruction, reason about platform presence, reuse
patterns and linked identities. Report identity linkages as persona
entities with the connecting evidence as context.
"#;

/// A prompt-driven specialist agent
pub struct LlmAgent {
    name: String,
    system_prompt: String,
    backend: SharedBackend,
}

impl LlmAgent {
    pub fn new(name: &str, system_prompt: &str, backend: SharedBackend) -> Self {
        Self {
            name: name.to_string(),
            system_prompt: format!("{}\n{}", system_prompt.trim(), EVIDENCE_CONTRACT.trim()),
            backend,
        }
    }
}

#[async_trait]
impl AgentExecutor for LlmAgent {
    async fn run(&self, instruction: &str) -> Result<String, AgentError> {
        debug!(agent = %self.name, model = %self.backend.model_name(), "dispatching to LLM");
        self.backend
            .generate(&self.system_prompt, instruction)
            .await
            .map_err(|e| AgentError::Llm(e.to_string()))
    }
}

/// Capabilities of the general-purpose search specialist (the default-set
/// agent used when auto-routing finds no keyword match)
pub fn search_capabilities() -> AgentCapabilities {
    AgentCapabilities::new("SearchAgent", "General-purpose web intelligence search")
        .with_keywords(&["search", "news", "web", "general", "research", "investigate"])
        .with_max_results(20)
}

pub fn dorking_capabilities() -> AgentCapabilities {
    AgentCapabilities::new("GoogleDorkingAgent", "Advanced search operators for hidden data")
        .with_keywords(&["dork", "exposed", "leak", "filetype", "index"])
        .with_max_results(10)
}

pub fn threat_intel_capabilities() -> AgentCapabilities {
    AgentCapabilities::new("ThreatIntelAgent", "Threat actors, campaigns and TTP analysis")
        .with_keywords(&["threat", "apt", "malware", "ransomware", "actor", "campaign", "ttp"])
}

pub fn ioc_analysis_capabilities() -> AgentCapabilities {
    AgentCapabilities::new("IocAnalysisAgent", "IOC extraction, classification and enrichment")
        .with_keywords(&["ioc", "indicator", "hash", "ip", "domain", "cve", "c2"])
}

pub fn username_capabilities() -> AgentCapabilities {
    AgentCapabilities::new("UsernameAgent", "Username and persona research across platforms")
        .with_keywords(&["username", "handle", "persona", "account", "alias", "profile"])
}

/// Assemble the built-in specialist registry over one shared backend.
pub fn builtin_registry(backend: SharedBackend) -> AgentRegistry {
    let mut registry = AgentRegistry::new();

    let specialists: [(AgentCapabilities, &str); 5] = [
        (search_capabilities(), SEARCH_PROMPT),
        (dorking_capabilities(), DORKING_PROMPT),
        (threat_intel_capabilities(), THREAT_INTEL_PROMPT),
        (ioc_analysis_capabilities(), IOC_ANALYSIS_PROMPT),
        (username_capabilities(), USERNAME_PROMPT),
    ];

    for (caps, prompt) in specialists {
        let agent = LlmAgent::new(&caps.name, prompt, backend.clone());
        registry.register(caps, std::sync::Arc::new(agent));
    }

    registry
}
