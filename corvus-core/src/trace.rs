//! Execution traces
//!
//! One trace per recorded unit of work: an agent action, a tool call, a
//! reasoning step, a decision or a checkpoint. Traces form a tree within a
//! run via `parent_id`; status moves monotonically
//! pending -> running -> {completed | failed | skipped} and a terminal trace
//! is never reopened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::evidence::Evidence;
use crate::run::RunId;

/// Identifier for a trace, assigned by the store
pub type TraceId = i64;

/// Kind of recorded step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    ToolCall,
    AgentAction,
    LlmReasoning,
    Decision,
    Error,
    Checkpoint,
}

impl TraceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::AgentAction => "agent_action",
            Self::LlmReasoning => "llm_reasoning",
            Self::Decision => "decision",
            Self::Error => "error",
            Self::Checkpoint => "checkpoint",
        }
    }
}

impl fmt::Display for TraceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TraceStatus {
    /// Terminal statuses are never left again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One recorded step of execution within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub id: TraceId,
    pub run_id: RunId,
    /// Parent trace in the same run; `None` for top-level traces
    pub parent_id: Option<TraceId>,
    /// Order within the run
    pub sequence: u64,

    pub trace_type: TraceType,
    pub agent_name: Option<String>,
    pub tool_name: Option<String>,

    /// Instruction or prompt that triggered this step
    pub instruction: Option<String>,
    /// Reasoning the agent gave for this step
    pub reasoning: Option<String>,

    pub input: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,

    pub evidence: Vec<Evidence>,
    /// 0.0 - 1.0, set at completion when known
    pub confidence: Option<f64>,

    pub status: TraceStatus,
    pub started_at: DateTime<Utc>,
    /// Set together with the terminal status, never separately
    pub duration_ms: Option<i64>,

    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl Trace {
    pub fn start(
        id: TraceId,
        run_id: RunId,
        trace_type: TraceType,
        parent_id: Option<TraceId>,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            run_id,
            parent_id,
            sequence,
            trace_type,
            agent_name: None,
            tool_name: None,
            instruction: None,
            reasoning: None,
            input: None,
            output: None,
            evidence: Vec::new(),
            confidence: None,
            status: TraceStatus::Running,
            started_at: Utc::now(),
            duration_ms: None,
            error_type: None,
            error_message: None,
        }
    }

    fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0)
    }

    /// Mark completed. Duration and terminal status are set together so a
    /// completed trace is never observable without a duration.
    pub fn complete(
        &mut self,
        output: Option<serde_json::Value>,
        evidence: Vec<Evidence>,
        confidence: Option<f64>,
    ) {
        debug_assert!(!self.status.is_terminal(), "trace {} reopened", self.id);
        self.duration_ms = Some(self.elapsed_ms());
        self.status = TraceStatus::Completed;
        self.output = output;
        self.evidence = evidence;
        self.confidence = confidence.map(|c| c.clamp(0.0, 1.0));
    }

    /// Mark failed with an error kind and message.
    pub fn fail(&mut self, error_type: &str, error_message: &str) {
        debug_assert!(!self.status.is_terminal(), "trace {} reopened", self.id);
        self.duration_ms = Some(self.elapsed_ms());
        self.status = TraceStatus::Failed;
        self.error_type = Some(error_type.to_string());
        self.error_message = Some(error_message.to_string());
    }

    /// Mark skipped (e.g. cancelled before dispatch).
    pub fn skip(&mut self) {
        debug_assert!(!self.status.is_terminal(), "trace {} reopened", self.id);
        self.duration_ms = Some(self.elapsed_ms());
        self.status = TraceStatus::Skipped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::IocKind;

    #[test]
    fn test_complete_sets_duration_with_status() {
        let mut trace = Trace::start(1, 10, TraceType::ToolCall, None, 0);
        assert_eq!(trace.status, TraceStatus::Running);
        assert!(trace.duration_ms.is_none());

        trace.complete(None, vec![Evidence::ioc(IocKind::Ip, "1.2.3.4")], Some(0.8));

        assert_eq!(trace.status, TraceStatus::Completed);
        let dur = trace.duration_ms.expect("duration set at completion");
        assert!(dur >= 0);
        assert_eq!(trace.evidence.len(), 1);
        assert_eq!(trace.confidence, Some(0.8));
    }

    #[test]
    fn test_fail_records_error_kind() {
        let mut trace = Trace::start(2, 10, TraceType::AgentAction, Some(1), 1);
        trace.fail("timeout", "agent exceeded 60s budget");

        assert_eq!(trace.status, TraceStatus::Failed);
        assert_eq!(trace.error_type.as_deref(), Some("timeout"));
        assert!(trace.duration_ms.unwrap() >= 0);
    }

    #[test]
    fn test_confidence_clamped() {
        let mut trace = Trace::start(3, 10, TraceType::LlmReasoning, None, 2);
        trace.complete(None, Vec::new(), Some(1.7));
        assert_eq!(trace.confidence, Some(1.0));
    }
}
