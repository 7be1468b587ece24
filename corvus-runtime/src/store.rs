//! Persistence boundary for runs, traces and reports
//!
//! [`InvestigationStore`] is the only surface the orchestrator talks to for
//! durable state. The bundled [`MemoryStore`] keeps everything in a mutex'd
//! arena; a database-backed store would implement the same trait.
//!
//! Stores enforce two invariants the rest of the runtime relies on:
//! a trace's parent must belong to the same run, and a trace in a terminal
//! status is never modified again.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use corvus_core::{Evidence, Run, RunId, RunStatus, Trace, TraceId, TraceType};

/// Store-level failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run {0} not found")]
    RunNotFound(RunId),

    #[error("trace {0} not found")]
    TraceNotFound(TraceId),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Fields supplied when opening a trace. The store assigns id, sequence and
/// start time.
#[derive(Debug, Clone)]
pub struct NewTrace {
    pub run_id: RunId,
    pub trace_type: TraceType,
    pub parent_id: Option<TraceId>,
    pub agent_name: Option<String>,
    pub tool_name: Option<String>,
    pub instruction: Option<String>,
    pub reasoning: Option<String>,
    pub input: Option<serde_json::Value>,
}

impl NewTrace {
    pub fn new(run_id: RunId, trace_type: TraceType) -> Self {
        Self {
            run_id,
            trace_type,
            parent_id: None,
            agent_name: None,
            tool_name: None,
            instruction: None,
            reasoning: None,
            input: None,
        }
    }

    pub fn agent(mut self, name: &str) -> Self {
        self.agent_name = Some(name.to_string());
        self
    }

    pub fn tool(mut self, name: &str) -> Self {
        self.tool_name = Some(name.to_string());
        self
    }

    pub fn instruction(mut self, text: &str) -> Self {
        self.instruction = Some(text.to_string());
        self
    }

    pub fn parent(mut self, id: TraceId) -> Self {
        self.parent_id = Some(id);
        self
    }

    pub fn input(mut self, value: serde_json::Value) -> Self {
        self.input = Some(value);
        self
    }
}

/// Fields supplied when closing a trace successfully
#[derive(Debug, Clone, Default)]
pub struct TraceCompletion {
    pub output: Option<serde_json::Value>,
    pub evidence: Vec<Evidence>,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
}

/// A finished report with its deduplicated evidence
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub run_id: RunId,
    pub report: String,
    pub evidence: Vec<Evidence>,
}

/// Durable state operations for investigations.
///
/// Methods are synchronous; implementations must be cheap enough to call
/// from async context without blocking meaningfully.
pub trait InvestigationStore: Send + Sync {
    /// Open a new run in `Started` status and return its id.
    fn create_run(&self, topic: &str, continued_from: Option<RunId>) -> Result<RunId, StoreError>;

    /// Write the final status and stats blob. Sets `finished_at` when the
    /// status is terminal.
    fn update_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        stats: Option<serde_json::Value>,
    ) -> Result<(), StoreError>;

    fn get_run(&self, run_id: RunId) -> Result<Run, StoreError>;

    /// Open a trace in `Running` status. Fails if the run is unknown or the
    /// parent trace belongs to a different run.
    fn create_trace(&self, new: NewTrace) -> Result<TraceId, StoreError>;

    /// Close a trace as completed. Fails if the trace is already terminal.
    fn complete_trace(&self, trace_id: TraceId, completion: TraceCompletion)
        -> Result<(), StoreError>;

    /// Close a trace as failed with an error kind and message.
    fn fail_trace(
        &self,
        trace_id: TraceId,
        error_type: &str,
        error_message: &str,
    ) -> Result<(), StoreError>;

    /// All traces of a run in creation (sequence) order.
    fn list_traces(&self, run_id: RunId) -> Result<Vec<Trace>, StoreError>;

    /// Persist the final report and its evidence. Overwrites any prior
    /// report for the run.
    fn save_report(
        &self,
        run_id: RunId,
        report: &str,
        evidence: &[Evidence],
    ) -> Result<(), StoreError>;

    /// The stored report, if the run has produced one yet.
    fn get_report(&self, run_id: RunId) -> Result<Option<StoredReport>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    runs: HashMap<RunId, Run>,
    traces: HashMap<TraceId, Trace>,
    /// Trace ids per run, in creation order
    run_traces: HashMap<RunId, Vec<TraceId>>,
    reports: HashMap<RunId, StoredReport>,
    next_run_id: RunId,
    next_trace_id: TraceId,
}

/// In-memory [`InvestigationStore`] backed by a single mutex'd arena.
///
/// Ids are monotonically increasing and never reused within the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InvestigationStore for MemoryStore {
    fn create_run(&self, topic: &str, continued_from: Option<RunId>) -> Result<RunId, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(prior) = continued_from {
            if !inner.runs.contains_key(&prior) {
                return Err(StoreError::RunNotFound(prior));
            }
        }
        inner.next_run_id += 1;
        let id = inner.next_run_id;
        inner.runs.insert(id, Run::new(id, topic, continued_from));
        inner.run_traces.insert(id, Vec::new());
        debug!(run_id = id, topic, "created run");
        Ok(id)
    }

    fn update_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        stats: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        run.status = status;
        if let Some(stats) = stats {
            run.stats = Some(stats);
        }
        if status != RunStatus::Started {
            run.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    fn get_run(&self, run_id: RunId) -> Result<Run, StoreError> {
        self.inner
            .lock()
            .runs
            .get(&run_id)
            .cloned()
            .ok_or(StoreError::RunNotFound(run_id))
    }

    fn create_trace(&self, new: NewTrace) -> Result<TraceId, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.runs.contains_key(&new.run_id) {
            return Err(StoreError::RunNotFound(new.run_id));
        }
        if let Some(parent_id) = new.parent_id {
            match inner.traces.get(&parent_id) {
                None => return Err(StoreError::TraceNotFound(parent_id)),
                Some(parent) if parent.run_id != new.run_id => {
                    return Err(StoreError::Invariant(format!(
                        "parent trace {} belongs to run {}, not run {}",
                        parent_id, parent.run_id, new.run_id
                    )));
                }
                Some(_) => {}
            }
        }

        inner.next_trace_id += 1;
        let id = inner.next_trace_id;
        let sequence = inner
            .run_traces
            .get(&new.run_id)
            .map(|v| v.len() as u64)
            .unwrap_or(0);

        let mut trace = Trace::start(id, new.run_id, new.trace_type, new.parent_id, sequence);
        trace.agent_name = new.agent_name;
        trace.tool_name = new.tool_name;
        trace.instruction = new.instruction;
        trace.reasoning = new.reasoning;
        trace.input = new.input;

        inner.traces.insert(id, trace);
        inner
            .run_traces
            .entry(new.run_id)
            .or_default()
            .push(id);
        Ok(id)
    }

    fn complete_trace(
        &self,
        trace_id: TraceId,
        completion: TraceCompletion,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let trace = inner
            .traces
            .get_mut(&trace_id)
            .ok_or(StoreError::TraceNotFound(trace_id))?;
        if trace.status.is_terminal() {
            return Err(StoreError::Invariant(format!(
                "trace {} is already {}",
                trace_id, trace.status
            )));
        }
        if completion.reasoning.is_some() {
            trace.reasoning = completion.reasoning;
        }
        trace.complete(completion.output, completion.evidence, completion.confidence);
        Ok(())
    }

    fn fail_trace(
        &self,
        trace_id: TraceId,
        error_type: &str,
        error_message: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let trace = inner
            .traces
            .get_mut(&trace_id)
            .ok_or(StoreError::TraceNotFound(trace_id))?;
        if trace.status.is_terminal() {
            return Err(StoreError::Invariant(format!(
                "trace {} is already {}",
                trace_id, trace.status
            )));
        }
        trace.fail(error_type, error_message);
        Ok(())
    }

    fn list_traces(&self, run_id: RunId) -> Result<Vec<Trace>, StoreError> {
        let inner = self.inner.lock();
        let ids = inner
            .run_traces
            .get(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.traces.get(id))
            .cloned()
            .collect())
    }

    fn save_report(
        &self,
        run_id: RunId,
        report: &str,
        evidence: &[Evidence],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        inner.reports.insert(
            run_id,
            StoredReport {
                run_id,
                report: report.to_string(),
                evidence: evidence.to_vec(),
            },
        );
        Ok(())
    }

    fn get_report(&self, run_id: RunId) -> Result<Option<StoredReport>, StoreError> {
        let inner = self.inner.lock();
        if !inner.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(inner.reports.get(&run_id).cloned())
    }
}
