//! Continuing a prior investigation
//!
//! A continuation builds a context bundle from a stored run: its topic, a
//! short excerpt of its report and a selection of its evidence. The
//! orchestrator folds that bundle into the new run's agent instructions and
//! links the runs via `continued_from`.

use corvus_core::{Depth, Evidence, RunId};

use crate::store::{InvestigationStore, StoreError};

/// Excerpt length folded into the follow-up instruction. Long reports are
/// summarized by truncation; the full report stays in the store.
const EXCERPT_CHARS: usize = 600;

/// Caller choices for a follow-up run
#[derive(Debug, Clone, Default)]
pub struct ContinuationOptions {
    /// Replacement instruction text; defaults to a deeper look at the prior
    /// topic when absent
    pub new_instructions: Option<String>,
    /// Restrict carried evidence to IOCs with these exact values
    pub selected_iocs: Option<Vec<String>>,
    /// Explicit agents for the follow-up; `None` keeps keyword routing
    pub agents: Option<Vec<String>>,
    /// Depth for the follow-up; `None` falls back to the prior run's depth
    pub depth: Option<Depth>,
}

/// Prior-run context carried into a follow-up run
#[derive(Debug, Clone)]
pub struct ContinuationContext {
    pub prior_run_id: RunId,
    pub prior_topic: String,
    pub prior_depth: Option<Depth>,
    /// Leading excerpt of the prior report; empty when no report was stored
    pub report_excerpt: String,
    /// Evidence carried forward, after any IOC selection
    pub evidence: Vec<Evidence>,
    pub new_instructions: Option<String>,
    /// Agents chosen for the follow-up, when the caller named any
    pub agents: Option<Vec<String>>,
    /// Depth chosen for the follow-up, falling back to the prior run's
    pub depth: Option<Depth>,
}

impl ContinuationContext {
    /// Instruction preamble describing the prior run.
    pub fn preamble(&self) -> String {
        let mut out = format!(
            "This is a follow-up investigation continuing run {} on \"{}\".\n",
            self.prior_run_id, self.prior_topic
        );
        if !self.report_excerpt.is_empty() {
            out.push_str("\nPrior findings (excerpt):\n");
            out.push_str(&self.report_excerpt);
            out.push('\n');
        }
        if !self.evidence.is_empty() {
            out.push_str("\nEvidence carried forward:\n");
            for item in &self.evidence {
                out.push_str(&format!("- {}\n", item));
            }
        }
        if let Some(instructions) = &self.new_instructions {
            out.push_str("\nNew instructions: ");
            out.push_str(instructions);
            out.push('\n');
        }
        out
    }

    /// Topic for the follow-up run.
    pub fn topic(&self) -> String {
        match &self.new_instructions {
            Some(instructions) => instructions.clone(),
            None => format!("{} (continued)", self.prior_topic),
        }
    }
}

fn excerpt(report: &str) -> String {
    if report.chars().count() <= EXCERPT_CHARS {
        return report.trim().to_string();
    }
    let cut: String = report.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Assemble the continuation context for a prior run.
///
/// Fails only when the run itself is unknown. A run without a stored report
/// still continues; the excerpt and evidence are simply empty.
pub fn build_continuation(
    store: &dyn InvestigationStore,
    prior_run_id: RunId,
    options: ContinuationOptions,
) -> Result<ContinuationContext, StoreError> {
    let run = store.get_run(prior_run_id)?;
    let stored = store.get_report(prior_run_id)?;

    let (report, mut evidence) = match stored {
        Some(stored) => (stored.report, stored.evidence),
        None => (String::new(), Vec::new()),
    };

    let report_excerpt = match &options.selected_iocs {
        Some(selected) => {
            // The prior report embeds the full evidence set, so the excerpt
            // must not carry IOC values the caller deselected. Dropping
            // whole lines keeps the remaining prose intact.
            let unselected: Vec<&str> = evidence
                .iter()
                .filter_map(|item| match item {
                    Evidence::Ioc { value, .. } if !selected.iter().any(|s| s == value) => {
                        Some(value.as_str())
                    }
                    _ => None,
                })
                .collect();
            let kept: Vec<&str> = report
                .lines()
                .filter(|line| !unselected.iter().any(|v| line.contains(v)))
                .collect();
            evidence.retain(|item| match item {
                Evidence::Ioc { value, .. } => selected.iter().any(|s| s == value),
                _ => false,
            });
            excerpt(&kept.join("\n"))
        }
        None => excerpt(&report),
    };

    let prior_depth = run
        .stats
        .as_ref()
        .and_then(|s| s.get("depth"))
        .and_then(|d| serde_json::from_value(d.clone()).ok());

    let depth = options.depth.or(prior_depth);

    Ok(ContinuationContext {
        prior_run_id,
        prior_topic: run.topic,
        prior_depth,
        report_excerpt,
        evidence,
        new_instructions: options.new_instructions,
        agents: options.agents,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use corvus_core::IocKind;

    fn seeded_store() -> (MemoryStore, RunId) {
        let store = MemoryStore::new();
        let run = store.create_run("lockbit infrastructure", None).unwrap();
        let evidence = vec![
            Evidence::ioc(IocKind::Ip, "1.2.3.4").with_context("C2"),
            Evidence::ioc(IocKind::Domain, "evil.example"),
            Evidence::ioc(IocKind::Ip, "9.9.9.9"),
        ];
        store
            .save_report(run, "# Investigation Report: lockbit infrastructure\n\nFindings.", &evidence)
            .unwrap();
        (store, run)
    }

    #[test]
    fn test_unknown_run_is_an_error() {
        let store = MemoryStore::new();
        assert!(matches!(
            build_continuation(&store, 42, ContinuationOptions::default()),
            Err(StoreError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_carries_all_evidence_by_default() {
        let (store, run) = seeded_store();
        let ctx = build_continuation(&store, run, ContinuationOptions::default()).unwrap();
        assert_eq!(ctx.prior_topic, "lockbit infrastructure");
        assert_eq!(ctx.evidence.len(), 3);
        assert!(ctx.report_excerpt.contains("Findings."));
    }

    #[test]
    fn test_selected_iocs_filter_exact_values() {
        let (store, run) = seeded_store();
        let ctx = build_continuation(
            &store,
            run,
            ContinuationOptions {
                selected_iocs: Some(vec!["9.9.9.9".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ctx.evidence.len(), 1);
        assert!(matches!(
            &ctx.evidence[0],
            Evidence::Ioc { value, .. } if value == "9.9.9.9"
        ));
    }

    #[test]
    fn test_deselected_iocs_redacted_from_excerpt() {
        let store = MemoryStore::new();
        let run = store.create_run("lockbit infrastructure", None).unwrap();
        let report = "# Investigation Report\n\n\
                      Beacons to 1.2.3.4 observed nightly.\n\n\
                      | Type | Value | Context |\n|---|---|---|\n\
                      | ip | 1.2.3.4 | C2 |\n\
                      | domain | evil.example | payload host |\n";
        let evidence = vec![
            Evidence::ioc(IocKind::Ip, "1.2.3.4").with_context("C2"),
            Evidence::ioc(IocKind::Domain, "evil.example"),
        ];
        store.save_report(run, report, &evidence).unwrap();

        let ctx = build_continuation(
            &store,
            run,
            ContinuationOptions {
                selected_iocs: Some(vec!["1.2.3.4".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();

        // The deselected value must not reach agents through any channel
        let preamble = ctx.preamble();
        assert!(preamble.contains("1.2.3.4"));
        assert!(!preamble.contains("evil.example"));
        assert!(!ctx.report_excerpt.contains("evil.example"));
        assert_eq!(ctx.evidence.len(), 1);
    }

    #[test]
    fn test_missing_report_is_tolerated() {
        let store = MemoryStore::new();
        let run = store.create_run("no report yet", None).unwrap();
        let ctx = build_continuation(&store, run, ContinuationOptions::default()).unwrap();
        assert!(ctx.report_excerpt.is_empty());
        assert!(ctx.evidence.is_empty());
        assert_eq!(ctx.topic(), "no report yet (continued)");
    }

    #[test]
    fn test_long_report_is_excerpted() {
        let store = MemoryStore::new();
        let run = store.create_run("t", None).unwrap();
        let long = "finding line\n".repeat(200);
        store.save_report(run, &long, &[]).unwrap();

        let ctx = build_continuation(&store, run, ContinuationOptions::default()).unwrap();
        assert!(ctx.report_excerpt.chars().count() <= EXCERPT_CHARS + 3);
        assert!(ctx.report_excerpt.ends_with("..."));
    }

    #[test]
    fn test_preamble_mentions_prior_run_and_instructions() {
        let (store, run) = seeded_store();
        let ctx = build_continuation(
            &store,
            run,
            ContinuationOptions {
                new_instructions: Some("pivot on the C2 address".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let preamble = ctx.preamble();
        assert!(preamble.contains(&format!("continuing run {}", run)));
        assert!(preamble.contains("pivot on the C2 address"));
        assert!(preamble.contains("1.2.3.4"));
        assert_eq!(ctx.topic(), "pivot on the C2 address");
    }
}
