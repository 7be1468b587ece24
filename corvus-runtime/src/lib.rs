//! Corvus Runtime - Investigation orchestration
//!
//! Ties the domain model to running agents:
//! - [`store`]: the persistence boundary and the in-memory store
//! - [`recorder`]: trace recording and per-run summaries
//! - [`orchestrator`]: the control loop that runs an investigation
//! - [`continuation`]: carrying a prior run's context into a follow-up
//! - [`report`]: markdown report assembly per run outcome
//! - [`publish`]: best-effort report delivery

pub mod continuation;
pub mod orchestrator;
pub mod publish;
pub mod recorder;
pub mod report;
pub mod store;

pub use continuation::{build_continuation, ContinuationContext, ContinuationOptions};
pub use orchestrator::{
    InvestigationOutcome, InvestigationRequest, Orchestrator, OrchestratorError, DEFAULT_AGENTS,
};
pub use publish::{PublishError, PublishReceipt, ReportPublisher, WebhookPublisher};
pub use recorder::{GroupSummary, TraceRecorder, TraceSummary};
pub use report::build_report;
pub use store::{
    InvestigationStore, MemoryStore, NewTrace, StoreError, StoredReport, TraceCompletion,
};
