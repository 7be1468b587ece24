//! Investigation runs and depth settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identifier for an investigation run, assigned by the store on creation
pub type RunId = i64;

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, agents not yet finished
    Started,
    /// Every dispatched agent succeeded with usable output
    Completed,
    /// Some agents succeeded with usable output, others did not
    Partial,
    /// No agent produced usable output
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-chosen effort level, controls per-agent timeout and instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl Depth {
    /// Time budget for a single agent invocation at this depth
    pub fn agent_timeout(&self) -> Duration {
        match self {
            Self::Quick => Duration::from_secs(60),
            Self::Standard => Duration::from_secs(180),
            Self::Deep => Duration::from_secs(420),
        }
    }

    /// Depth guidance merged into every agent instruction
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Quick => "Conduct a quick investigation - key findings only.",
            Self::Standard => "Standard investigation - balanced depth and coverage.",
            Self::Deep => "Deep investigation - comprehensive analysis, follow every lead.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Depth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "deep" => Ok(Self::Deep),
            other => Err(format!("unknown depth '{}', expected quick|standard|deep", other)),
        }
    }
}

/// One investigation execution.
///
/// Owned by the orchestrator while running; the store takes over after the
/// final status is written. Never deleted implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub topic: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Serialized progress summary, written once on completion
    pub stats: Option<serde_json::Value>,
    /// Prior run this one was continued from
    pub continued_from: Option<RunId>,
}

impl Run {
    pub fn new(id: RunId, topic: &str, continued_from: Option<RunId>) -> Self {
        Self {
            id,
            topic: topic.to_string(),
            status: RunStatus::Started,
            started_at: Utc::now(),
            finished_at: None,
            stats: None,
            continued_from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_timeouts_ordered() {
        assert!(Depth::Quick.agent_timeout() < Depth::Standard.agent_timeout());
        assert!(Depth::Standard.agent_timeout() < Depth::Deep.agent_timeout());
    }

    #[test]
    fn test_depth_from_str() {
        assert_eq!("deep".parse::<Depth>().unwrap(), Depth::Deep);
        assert_eq!("Quick".parse::<Depth>().unwrap(), Depth::Quick);
        assert!("extreme".parse::<Depth>().is_err());
    }

    #[test]
    fn test_new_run_is_started() {
        let run = Run::new(1, "ransomware payments", None);
        assert_eq!(run.status, RunStatus::Started);
        assert!(run.finished_at.is_none());
        assert!(run.continued_from.is_none());
    }
}
