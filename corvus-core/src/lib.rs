//! Corvus Core - Domain model for multi-agent OSINT investigations
//!
//! This crate provides the foundational types, free of any I/O:
//! - Evidence variants (IOCs, entities, ATT&CK techniques) with dedup
//! - Run lifecycle and depth settings
//! - Execution traces with hierarchical parent linkage
//! - Per-run progress tracking and status classification
//! - Evidence extraction from agent output (structured JSON + markdown fallback)

pub mod evidence;
pub mod extract;
pub mod progress;
pub mod run;
pub mod trace;

pub use evidence::*;
pub use extract::*;
pub use progress::*;
pub use run::*;
pub use trace::*;

/// Maximum findings accepted from the fallback markdown extractor
pub const MAX_FALLBACK_FINDINGS: usize = 20;

/// Minimum title length for a narrative finding to be kept
pub const MIN_FINDING_TITLE: usize = 10;

/// Narrative finding titles are truncated to this length
pub const MAX_FINDING_TITLE: usize = 80;
