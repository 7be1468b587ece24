//! Per-run progress tracking and status classification
//!
//! The orchestrator appends one immutable [`AgentResult`] per agent
//! invocation; classification of the overall run falls out of the
//! accumulated results and is order-independent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::{Depth, RunId, RunStatus};

/// Outcome of running one agent within one run. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub success: bool,
    /// Result text; empty on failure
    #[serde(default)]
    pub result: String,
    /// Error text; empty on success
    #[serde(default)]
    pub error: String,
    pub duration_seconds: f64,
    pub iocs_extracted: usize,
}

impl AgentResult {
    pub fn success(agent_name: &str, result: String, duration_seconds: f64, iocs: usize) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            success: true,
            result,
            error: String::new(),
            duration_seconds,
            iocs_extracted: iocs,
        }
    }

    pub fn failure(agent_name: &str, error: String, duration_seconds: f64) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            success: false,
            result: String::new(),
            error,
            duration_seconds,
            iocs_extracted: 0,
        }
    }

    /// A success that actually carries usable output
    pub fn is_useful(&self) -> bool {
        self.success && !self.result.trim().is_empty()
    }
}

/// Aggregate execution state for one run.
///
/// Append-only while the run executes; consumed once to classify the run
/// and build the final report.
#[derive(Debug, Clone)]
pub struct InvestigationProgress {
    pub run_id: RunId,
    pub topic: String,
    pub depth: Depth,
    pub started_at: DateTime<Utc>,
    pub agent_results: Vec<AgentResult>,
    /// Human-readable "agent: error" lines, in arrival order
    pub errors: Vec<String>,
}

impl InvestigationProgress {
    pub fn new(run_id: RunId, topic: &str, depth: Depth) -> Self {
        Self {
            run_id,
            topic: topic.to_string(),
            depth,
            started_at: Utc::now(),
            agent_results: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_agent_result(&mut self, result: AgentResult) {
        if !result.success {
            self.errors
                .push(format!("{}: {}", result.agent_name, result.error));
        }
        self.agent_results.push(result);
    }

    pub fn successful_count(&self) -> usize {
        self.agent_results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.agent_results.iter().filter(|r| !r.success).count()
    }

    pub fn total_iocs(&self) -> usize {
        self.agent_results.iter().map(|r| r.iocs_extracted).sum()
    }

    /// At least one agent succeeded with non-trivial output
    pub fn has_useful_results(&self) -> bool {
        self.agent_results.iter().any(|r| r.is_useful())
    }

    /// Classify the run once all agents have reported.
    ///
    /// failed: no agent produced usable output (even if some "succeeded"
    /// with empty text). completed: usable output and every agent succeeded.
    /// partial: everything in between.
    pub fn classify(&self) -> RunStatus {
        if !self.has_useful_results() {
            RunStatus::Failed
        } else if self.agent_results.iter().all(|r| r.success) {
            RunStatus::Completed
        } else {
            RunStatus::Partial
        }
    }

    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            run_id: self.run_id,
            topic: self.topic.clone(),
            depth: self.depth,
            agents_succeeded: self.successful_count(),
            agents_failed: self.failed_count(),
            total_iocs: self.total_iocs(),
            has_useful_results: self.has_useful_results(),
            duration_seconds: (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0,
            errors: self.errors.clone(),
        }
    }
}

/// Serialized progress, stored as the Run's stats blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub run_id: RunId,
    pub topic: String,
    pub depth: Depth,
    pub agents_succeeded: usize,
    pub agents_failed: usize,
    pub total_iocs: usize,
    pub has_useful_results: bool,
    pub duration_seconds: f64,
    pub errors: Vec<String>,
}
