//! Investigation control loop
//!
//! The orchestrator owns one investigation end to end: create the run,
//! choose agents, dispatch them concurrently under the depth's time budget,
//! extract evidence from each result, classify the run and persist the
//! report. Every step lands in the trace store as it happens, so a crash
//! mid-run leaves an inspectable partial record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use corvus_agents::AgentRegistry;
use corvus_core::{
    confidence_score, dedup_evidence, extract_evidence, AgentResult, Depth, Evidence, Finding,
    InvestigationProgress, ProgressSummary, RunId, RunStatus, TraceType,
};

use crate::continuation::ContinuationContext;
use crate::publish::ReportPublisher;
use crate::recorder::TraceRecorder;
use crate::report::build_report;
use crate::store::{InvestigationStore, NewTrace, StoreError, TraceCompletion};

/// Agents dispatched when auto-routing matches nothing
pub const DEFAULT_AGENTS: &[&str] = &["SearchAgent"];

/// Stored agent output is capped at this many characters
const MAX_STORED_OUTPUT: usize = 5000;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Explicitly requested agent names that are not registered. Raised
    /// before any run is created.
    #[error("unknown agents: {0}")]
    InvalidAgent(String),

    /// The registry has no agents at all
    #[error("no agents registered")]
    NoAgents,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One investigation request
#[derive(Clone, Default)]
pub struct InvestigationRequest {
    pub topic: String,
    pub depth: Depth,
    /// Explicit agent names; `None` selects by topic keywords
    pub agents: Option<Vec<String>>,
    /// Prior-run context when this is a follow-up
    pub continuation: Option<ContinuationContext>,
    /// Deliver the finished report through the configured publisher
    pub publish: bool,
}

impl InvestigationRequest {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..Default::default()
        }
    }

    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_agents(mut self, agents: Vec<String>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn with_continuation(mut self, continuation: ContinuationContext) -> Self {
        self.continuation = Some(continuation);
        self
    }

    pub fn with_publish(mut self) -> Self {
        self.publish = true;
        self
    }
}

/// Result of a finished investigation
#[derive(Debug)]
pub struct InvestigationOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    pub report: String,
    pub summary: ProgressSummary,
    /// Deduplicated evidence across all agents
    pub evidence: Vec<Evidence>,
    /// Set when publishing was requested but failed; never fails the run
    pub publish_warning: Option<String>,
}

/// Drives investigations against a registry, a store and an optional
/// publisher.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn InvestigationStore>,
    recorder: TraceRecorder,
    publisher: Option<Arc<dyn ReportPublisher>>,
    /// Test hook; production timeouts come from the depth
    timeout_override: Option<Duration>,
}

impl Orchestrator {
    pub fn new(registry: Arc<AgentRegistry>, store: Arc<dyn InvestigationStore>) -> Self {
        let recorder = TraceRecorder::new(store.clone());
        Self {
            registry,
            store,
            recorder,
            publisher: None,
            timeout_override: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ReportPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    /// Agent names for a request: explicit names validated strictly, or
    /// keyword routing over the topic with a default fallback.
    fn select_agents(&self, request: &InvestigationRequest) -> Result<Vec<String>, OrchestratorError> {
        if self.registry.is_empty() {
            return Err(OrchestratorError::NoAgents);
        }

        if let Some(requested) = &request.agents {
            let unknown: Vec<&str> = requested
                .iter()
                .filter(|name| self.registry.get(name).is_err())
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                return Err(OrchestratorError::InvalidAgent(unknown.join(", ")));
            }
            return Ok(requested.clone());
        }

        let mut selected: Vec<String> = Vec::new();
        for token in request.topic.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            for name in self.registry.get_by_capability(token) {
                if !selected.iter().any(|s| s == name) {
                    selected.push(name.to_string());
                }
            }
        }

        if selected.is_empty() {
            selected = DEFAULT_AGENTS
                .iter()
                .filter(|name| self.registry.get(name).is_ok())
                .map(|name| name.to_string())
                .collect();
        }
        if selected.is_empty() {
            // Registry without any default agent: fall back to the first
            // registered one so a run always dispatches something.
            selected.push(self.registry.list_all()[0].to_string());
        }
        Ok(selected)
    }

    fn build_instruction(&self, request: &InvestigationRequest) -> String {
        let mut instruction = format!(
            "Investigate: {}\n\n{}\n",
            request.topic,
            request.depth.instruction()
        );
        if let Some(continuation) = &request.continuation {
            instruction.push('\n');
            instruction.push_str(&continuation.preamble());
        }
        instruction
    }

    /// Run one investigation to completion.
    ///
    /// Agent failures and timeouts degrade the run to partial or failed;
    /// only store failures and invalid requests surface as errors.
    pub async fn investigate(
        &self,
        request: InvestigationRequest,
    ) -> Result<InvestigationOutcome, OrchestratorError> {
        // Validate before creating the run so a bad request leaves no record
        let agent_names = self.select_agents(&request)?;

        let run_id = self.store.create_run(
            &request.topic,
            request.continuation.as_ref().map(|c| c.prior_run_id),
        )?;
        info!(run_id, topic = %request.topic, depth = %request.depth, agents = ?agent_names, "investigation started");

        let mut progress = InvestigationProgress::new(run_id, &request.topic, request.depth);
        self.recorder.record_decision(
            run_id,
            &format!("dispatching agents: {}", agent_names.join(", ")),
            Some(if request.agents.is_some() {
                "explicitly requested"
            } else {
                "selected by topic keywords"
            }),
        )?;

        let instruction = self.build_instruction(&request);
        let timeout = self
            .timeout_override
            .unwrap_or_else(|| request.depth.agent_timeout());

        // Open every trace before dispatch so a crash mid-run still shows
        // what was in flight.
        let mut dispatches = Vec::with_capacity(agent_names.len());
        for name in &agent_names {
            let trace_id = self.recorder.start(
                NewTrace::new(run_id, TraceType::AgentAction)
                    .agent(name)
                    .instruction(&instruction),
            )?;
            // Cannot fail: select_agents only returns registered names
            let executor = self
                .registry
                .get(name)
                .map_err(|e| OrchestratorError::InvalidAgent(e.to_string()))?;
            dispatches.push((name.clone(), trace_id, executor));
        }

        let tasks = dispatches.into_iter().map(|(name, trace_id, executor)| {
            let instruction = instruction.clone();
            async move {
                let started = Instant::now();
                let outcome =
                    tokio::time::timeout(timeout, executor.run(&instruction)).await;
                let duration = started.elapsed().as_secs_f64();
                match outcome {
                    Ok(Ok(text)) => AgentOutcome::ok(name, trace_id, text, duration),
                    Ok(Err(error)) => AgentOutcome::err(
                        name,
                        trace_id,
                        error.kind(),
                        error.to_string(),
                        duration,
                    ),
                    Err(_) => AgentOutcome::err(
                        name,
                        trace_id,
                        "timeout",
                        format!("agent exceeded {}s budget", timeout.as_secs()),
                        duration,
                    ),
                }
            }
        });
        let outcomes = join_all(tasks).await;

        let mut all_evidence: Vec<Evidence> = Vec::new();
        let mut all_findings: Vec<Finding> = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(text) => {
                    let extraction = extract_evidence(&text);
                    let confidence = confidence_score(&extraction);
                    let ioc_count = extraction.evidence.iter().filter(|e| e.is_ioc()).count();
                    debug!(
                        agent = %outcome.agent_name,
                        structured = extraction.structured,
                        evidence = extraction.evidence.len(),
                        "agent finished"
                    );

                    self.recorder.complete(
                        outcome.trace_id,
                        TraceCompletion {
                            output: Some(serialize_output(&text)),
                            evidence: extraction.evidence.clone(),
                            confidence: Some(confidence),
                            reasoning: None,
                        },
                    )?;

                    all_evidence.extend(extraction.evidence);
                    all_findings.extend(extraction.findings);
                    progress.add_agent_result(AgentResult::success(
                        &outcome.agent_name,
                        text,
                        outcome.duration_seconds,
                        ioc_count,
                    ));
                }
                Err((kind, message)) => {
                    warn!(agent = %outcome.agent_name, kind, %message, "agent failed");
                    self.recorder.fail(outcome.trace_id, kind, &message)?;
                    progress.add_agent_result(AgentResult::failure(
                        &outcome.agent_name,
                        message,
                        outcome.duration_seconds,
                    ));
                }
            }
        }

        let status = progress.classify();
        let evidence = dedup_evidence(all_evidence);
        let report = build_report(status, &progress, &evidence, &all_findings);
        let summary = progress.summary();

        self.store.save_report(run_id, &report, &evidence)?;
        self.store.update_run(
            run_id,
            status,
            Some(serde_json::to_value(&summary).unwrap_or_default()),
        )?;
        self.recorder.record_checkpoint(
            run_id,
            "run finished",
            Some(serde_json::json!({"status": status, "evidence": evidence.len()})),
        )?;
        info!(run_id, %status, evidence = evidence.len(), "investigation finished");

        let mut publish_warning = None;
        if request.publish {
            match &self.publisher {
                Some(publisher) => {
                    if let Err(error) = publisher
                        .publish_report(&request.topic, &report, Some(&summary))
                        .await
                    {
                        warn!(run_id, %error, "publish failed, report kept in store");
                        publish_warning = Some(error.to_string());
                    }
                }
                None => {
                    publish_warning = Some("no publisher configured".to_string());
                }
            }
        }

        Ok(InvestigationOutcome {
            run_id,
            status,
            report,
            summary,
            evidence,
            publish_warning,
        })
    }
}

struct AgentOutcome {
    agent_name: String,
    trace_id: corvus_core::TraceId,
    result: Result<String, (&'static str, String)>,
    duration_seconds: f64,
}

impl AgentOutcome {
    fn ok(agent_name: String, trace_id: corvus_core::TraceId, text: String, duration: f64) -> Self {
        Self {
            agent_name,
            trace_id,
            result: Ok(text),
            duration_seconds: duration,
        }
    }

    fn err(
        agent_name: String,
        trace_id: corvus_core::TraceId,
        kind: &'static str,
        message: String,
        duration: f64,
    ) -> Self {
        Self {
            agent_name,
            trace_id,
            result: Err((kind, message)),
            duration_seconds: duration,
        }
    }
}

/// Agent output stored on the trace, capped so one chatty agent cannot
/// bloat the store.
fn serialize_output(text: &str) -> serde_json::Value {
    let stored: String = text.chars().take(MAX_STORED_OUTPUT).collect();
    serde_json::json!({
        "text": stored,
        "chars": text.chars().count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use corvus_agents::{AgentCapabilities, AgentError, AgentExecutor};
    use corvus_core::TraceStatus;

    struct CannedAgent(&'static str);

    #[async_trait]
    impl AgentExecutor for CannedAgent {
        async fn run(&self, _instruction: &str) -> Result<String, AgentError> {
            Ok(self.0.to_string())
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl AgentExecutor for SlowAgent {
        async fn run(&self, _instruction: &str) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl AgentExecutor for FailingAgent {
        async fn run(&self, _instruction: &str) -> Result<String, AgentError> {
            Err(AgentError::Network("connection refused".to_string()))
        }
    }

    const STRUCTURED_REPLY: &str = r#"{
        "report": "Tracked C2 infrastructure.",
        "evidence": {
            "iocs": [
                {"kind": "ip", "value": "1.2.3.4", "context": "C2 server"},
                {"kind": "domain", "value": "evil.example", "context": "payload host"}
            ],
            "entities": [],
            "techniques": ["T1071.001"]
        }
    }"#;

    fn registry() -> Arc<AgentRegistry> {
        let mut reg = AgentRegistry::new();
        reg.register(
            AgentCapabilities::new("SearchAgent", "search").with_keywords(&["search", "news"]),
            Arc::new(CannedAgent(STRUCTURED_REPLY)),
        );
        reg.register(
            AgentCapabilities::new("ThreatIntelAgent", "ti")
                .with_keywords(&["ransomware", "apt", "threat"]),
            Arc::new(SlowAgent),
        );
        reg.register(
            AgentCapabilities::new("UsernameAgent", "personas")
                .with_keywords(&["username", "handle"]),
            Arc::new(FailingAgent),
        );
        Arc::new(reg)
    }

    fn orchestrator(store: Arc<MemoryStore>) -> Orchestrator {
        Orchestrator::new(registry(), store).with_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_mixed_run_is_partial_with_deduped_evidence() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store.clone());

        let outcome = orchestrator
            .investigate(
                InvestigationRequest::new("lockbit ransomware infrastructure").with_agents(vec![
                    "SearchAgent".to_string(),
                    "ThreatIntelAgent".to_string(),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Partial);
        // Two IOCs and one technique from the structured agent
        assert_eq!(outcome.evidence.len(), 3);
        assert_eq!(outcome.evidence.iter().filter(|e| e.is_ioc()).count(), 2);
        assert_eq!(outcome.summary.agents_succeeded, 1);
        assert_eq!(outcome.summary.agents_failed, 1);
        assert!(outcome.report.contains("ThreatIntelAgent"));

        // The timed-out agent's trace carries the distinguished error kind
        let traces = store.list_traces(outcome.run_id).unwrap();
        let timed_out = traces
            .iter()
            .find(|t| t.agent_name.as_deref() == Some("ThreatIntelAgent"))
            .unwrap();
        assert_eq!(timed_out.status, TraceStatus::Failed);
        assert_eq!(timed_out.error_type.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_invalid_agent_creates_no_run() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store.clone());

        let result = orchestrator
            .investigate(
                InvestigationRequest::new("anything")
                    .with_agents(vec!["NoSuchAgent".to_string()]),
            )
            .await;

        assert!(matches!(
            result,
            Err(OrchestratorError::InvalidAgent(names)) if names.contains("NoSuchAgent")
        ));
        assert!(matches!(store.get_run(1), Err(StoreError::RunNotFound(1))));
    }

    #[tokio::test]
    async fn test_keyword_routing_picks_matching_agents() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store.clone());

        let outcome = orchestrator
            .investigate(InvestigationRequest::new("apt41 threat campaign"))
            .await
            .unwrap();

        // Only ThreatIntelAgent matches, and it times out
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.summary.agents_failed, 1);
        assert!(outcome.report.contains("exceeded"));
    }

    #[tokio::test]
    async fn test_unmatched_topic_falls_back_to_default_agent() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store.clone());

        let outcome = orchestrator
            .investigate(InvestigationRequest::new("zzqx"))
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        let traces = store.list_traces(outcome.run_id).unwrap();
        assert!(traces
            .iter()
            .any(|t| t.agent_name.as_deref() == Some("SearchAgent")));
    }

    #[tokio::test]
    async fn test_all_failures_classify_failed_with_report() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store.clone());

        let outcome = orchestrator
            .investigate(
                InvestigationRequest::new("who is handle x")
                    .with_agents(vec!["UsernameAgent".to_string()]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(!outcome.report.is_empty());
        assert!(outcome.report.contains("connection refused"));

        let run = store.get_run(outcome.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_continuation_links_runs_and_filters_iocs() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store.clone());

        let first = orchestrator
            .investigate(
                InvestigationRequest::new("initial sweep")
                    .with_agents(vec!["SearchAgent".to_string()]),
            )
            .await
            .unwrap();
        assert_eq!(first.evidence.len(), 3);

        let ctx = crate::continuation::build_continuation(
            store.as_ref(),
            first.run_id,
            crate::continuation::ContinuationOptions {
                selected_iocs: Some(vec!["1.2.3.4".to_string()]),
                new_instructions: Some("pivot on the C2 address".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ctx.evidence.len(), 1);

        let second = orchestrator
            .investigate(
                InvestigationRequest::new("pivot on the C2 address")
                    .with_agents(vec!["SearchAgent".to_string()])
                    .with_continuation(ctx),
            )
            .await
            .unwrap();

        let run = store.get_run(second.run_id).unwrap();
        assert_eq!(run.continued_from, Some(first.run_id));

        // The follow-up instruction carried the selected IOC to the agent
        let traces = store.list_traces(second.run_id).unwrap();
        let action = traces
            .iter()
            .find(|t| t.trace_type == TraceType::AgentAction)
            .unwrap();
        let instruction = action.instruction.as_deref().unwrap();
        assert!(instruction.contains("1.2.3.4"));
        assert!(!instruction.contains("evil.example"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_a_warning_not_an_error() {
        struct BrokenPublisher;

        #[async_trait]
        impl crate::publish::ReportPublisher for BrokenPublisher {
            async fn publish_report(
                &self,
                _topic: &str,
                _report: &str,
                _stats: Option<&ProgressSummary>,
            ) -> Result<crate::publish::PublishReceipt, crate::publish::PublishError> {
                Err(crate::publish::PublishError::Delivery("503".to_string()))
            }
        }

        let store = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::new(registry(), store.clone())
            .with_timeout(Duration::from_millis(50))
            .with_publisher(Arc::new(BrokenPublisher));

        let outcome = orchestrator
            .investigate(
                InvestigationRequest::new("searchable topic")
                    .with_agents(vec!["SearchAgent".to_string()])
                    .with_publish(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert!(outcome.publish_warning.unwrap().contains("503"));
        // The report survived in the store regardless
        assert!(store.get_report(outcome.run_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duration_recorded_per_agent() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store.clone());

        let outcome = orchestrator
            .investigate(
                InvestigationRequest::new("t").with_agents(vec!["SearchAgent".to_string()]),
            )
            .await
            .unwrap();

        let traces = store.list_traces(outcome.run_id).unwrap();
        let action = traces
            .iter()
            .find(|t| t.trace_type == TraceType::AgentAction)
            .unwrap();
        assert!(action.duration_ms.is_some());
        assert!(action.confidence.unwrap() > 0.8); // structured output
    }
}
