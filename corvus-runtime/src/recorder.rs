//! Trace recording and summarization
//!
//! [`TraceRecorder`] is a thin convenience layer over the store: open and
//! close traces, drop one-shot decision and checkpoint markers, and compute
//! per-run summaries. It holds no state of its own, so clones are cheap and
//! every write lands in the store immediately.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use corvus_core::{RunId, TraceId, TraceStatus, TraceType};

use crate::store::{InvestigationStore, NewTrace, StoreError, TraceCompletion};

/// Records execution traces against a shared store.
#[derive(Clone)]
pub struct TraceRecorder {
    store: Arc<dyn InvestigationStore>,
}

impl TraceRecorder {
    pub fn new(store: Arc<dyn InvestigationStore>) -> Self {
        Self { store }
    }

    /// Open a trace in running status.
    pub fn start(&self, new: NewTrace) -> Result<TraceId, StoreError> {
        self.store.create_trace(new)
    }

    /// Close a trace as completed.
    pub fn complete(&self, id: TraceId, completion: TraceCompletion) -> Result<(), StoreError> {
        self.store.complete_trace(id, completion)
    }

    /// Close a trace as failed.
    pub fn fail(&self, id: TraceId, error_type: &str, error_message: &str) -> Result<(), StoreError> {
        debug!(trace_id = id, error_type, "trace failed");
        self.store.fail_trace(id, error_type, error_message)
    }

    /// Record an orchestration decision as a single already-closed trace.
    pub fn record_decision(
        &self,
        run_id: RunId,
        decision: &str,
        reasoning: Option<&str>,
    ) -> Result<TraceId, StoreError> {
        let mut new = NewTrace::new(run_id, TraceType::Decision).instruction(decision);
        new.reasoning = reasoning.map(str::to_string);
        let id = self.store.create_trace(new)?;
        self.store.complete_trace(id, TraceCompletion::default())?;
        Ok(id)
    }

    /// Record a named checkpoint with an optional state snapshot.
    pub fn record_checkpoint(
        &self,
        run_id: RunId,
        name: &str,
        state: Option<serde_json::Value>,
    ) -> Result<TraceId, StoreError> {
        let mut new = NewTrace::new(run_id, TraceType::Checkpoint).instruction(name);
        new.input = state;
        let id = self.store.create_trace(new)?;
        self.store.complete_trace(id, TraceCompletion::default())?;
        Ok(id)
    }

    /// Aggregate statistics over every trace of a run.
    pub fn summary(&self, run_id: RunId) -> Result<TraceSummary, StoreError> {
        let traces = self.store.list_traces(run_id)?;

        let mut by_agent: BTreeMap<String, GroupStats> = BTreeMap::new();
        let mut by_tool: BTreeMap<String, GroupStats> = BTreeMap::new();
        let mut confidences: Vec<f64> = Vec::new();
        let mut total_evidence = 0usize;
        let mut total_duration_ms = 0i64;
        let mut completed = 0usize;
        let mut failed = 0usize;

        for trace in &traces {
            total_evidence += trace.evidence.len();
            match trace.status {
                TraceStatus::Completed => completed += 1,
                TraceStatus::Failed => failed += 1,
                _ => {}
            }
            if let Some(c) = trace.confidence {
                confidences.push(c);
            }
            // Child traces run inside their parent's window; counting only
            // top-level durations keeps the total from double-counting.
            if trace.parent_id.is_none() {
                total_duration_ms += trace.duration_ms.unwrap_or(0);
            }
            if let Some(agent) = &trace.agent_name {
                by_agent.entry(agent.clone()).or_default().add(trace);
            }
            if let Some(tool) = &trace.tool_name {
                by_tool.entry(tool.clone()).or_default().add(trace);
            }
        }

        let avg_confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        };

        Ok(TraceSummary {
            run_id,
            total_traces: traces.len(),
            completed_traces: completed,
            failed_traces: failed,
            total_evidence,
            total_duration_ms,
            avg_confidence,
            by_agent: by_agent
                .into_iter()
                .map(|(name, stats)| stats.finish(name))
                .collect(),
            by_tool: by_tool
                .into_iter()
                .map(|(name, stats)| stats.finish(name))
                .collect(),
        })
    }
}

/// Per-run trace statistics
#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    pub run_id: RunId,
    pub total_traces: usize,
    pub completed_traces: usize,
    pub failed_traces: usize,
    pub total_evidence: usize,
    /// Wall time summed over top-level traces only
    pub total_duration_ms: i64,
    /// Mean over traces that reported a confidence; `None` when none did
    pub avg_confidence: Option<f64>,
    pub by_agent: Vec<GroupSummary>,
    pub by_tool: Vec<GroupSummary>,
}

/// Statistics for one agent or tool within a run
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub trace_count: usize,
    pub evidence_count: usize,
    pub avg_duration_ms: Option<f64>,
}

#[derive(Default)]
struct GroupStats {
    trace_count: usize,
    evidence_count: usize,
    durations: Vec<i64>,
}

impl GroupStats {
    fn add(&mut self, trace: &corvus_core::Trace) {
        self.trace_count += 1;
        self.evidence_count += trace.evidence.len();
        if let Some(d) = trace.duration_ms {
            self.durations.push(d);
        }
    }

    fn finish(self, name: String) -> GroupSummary {
        let avg_duration_ms = if self.durations.is_empty() {
            None
        } else {
            Some(self.durations.iter().sum::<i64>() as f64 / self.durations.len() as f64)
        };
        GroupSummary {
            name,
            trace_count: self.trace_count,
            evidence_count: self.evidence_count,
            avg_duration_ms,
        }
    }
}
