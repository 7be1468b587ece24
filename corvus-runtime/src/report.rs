//! Markdown report assembly
//!
//! One builder per run outcome. The partial and failed variants always say
//! what went wrong; a failed run never yields an empty report.

use corvus_core::{Evidence, Finding, InvestigationProgress, RunStatus};

/// Build the report matching the run's classified status.
pub fn build_report(
    status: RunStatus,
    progress: &InvestigationProgress,
    evidence: &[Evidence],
    findings: &[Finding],
) -> String {
    match status {
        RunStatus::Partial => build_partial_report(progress, evidence, findings),
        RunStatus::Failed => build_failed_report(progress),
        _ => build_full_report(progress, evidence, findings),
    }
}

fn header(progress: &InvestigationProgress, status_line: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Investigation Report: {}\n\n", progress.topic));
    out.push_str(&format!(
        "Depth: {} | Agents: {} succeeded, {} failed | {}\n",
        progress.depth,
        progress.successful_count(),
        progress.failed_count(),
        status_line
    ));
    out
}

fn agent_sections(progress: &InvestigationProgress) -> String {
    let mut out = String::new();
    for result in progress.agent_results.iter().filter(|r| r.is_useful()) {
        out.push_str(&format!("\n## {}\n\n", result.agent_name));
        out.push_str(result.result.trim());
        out.push('\n');
    }
    out
}

/// IOC and entity table plus technique list.
fn evidence_section(evidence: &[Evidence]) -> String {
    if evidence.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n## Evidence\n\n| Type | Value | Context |\n|---|---|---|\n");
    let mut techniques: Vec<&str> = Vec::new();
    for item in evidence {
        match item {
            Evidence::Ioc { kind, value, context } => {
                out.push_str(&format!("| {} | {} | {} |\n", kind, value, context));
            }
            Evidence::Entity { kind, name, context } => {
                out.push_str(&format!("| {} | {} | {} |\n", kind, name, context));
            }
            Evidence::Technique { id } => techniques.push(id),
        }
    }
    if !techniques.is_empty() {
        out.push_str("\nATT&CK techniques: ");
        out.push_str(&techniques.join(", "));
        out.push('\n');
    }
    out
}

fn findings_section(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n## Key Findings\n\n");
    for finding in findings {
        match &finding.url {
            Some(url) => out.push_str(&format!("- [{}]({})\n", finding.title, url)),
            None => out.push_str(&format!("- {}\n", finding.title)),
        }
    }
    out
}

fn failure_section(progress: &InvestigationProgress) -> String {
    let mut out = String::from("\n## Failed Agents\n\n");
    for result in progress.agent_results.iter().filter(|r| !r.success) {
        out.push_str(&format!(
            "- {}: {} (after {:.1}s)\n",
            result.agent_name, result.error, result.duration_seconds
        ));
    }
    out
}

/// Every agent succeeded with usable output.
pub fn build_full_report(
    progress: &InvestigationProgress,
    evidence: &[Evidence],
    findings: &[Finding],
) -> String {
    let mut out = header(progress, "Status: completed");
    out.push_str(&agent_sections(progress));
    out.push_str(&evidence_section(evidence));
    out.push_str(&findings_section(findings));
    out
}

/// Some agents produced results, others failed. Reports what was found and
/// names the gaps so the caller can retry or continue.
pub fn build_partial_report(
    progress: &InvestigationProgress,
    evidence: &[Evidence],
    findings: &[Finding],
) -> String {
    let mut out = header(progress, "Status: partial (some agents failed)");
    out.push_str(&agent_sections(progress));
    out.push_str(&evidence_section(evidence));
    out.push_str(&findings_section(findings));
    out.push_str(&failure_section(progress));
    out.push_str(
        "\nCoverage is incomplete. Retry the failed agents, or continue this \
         run to pursue the evidence above.\n",
    );
    out
}

/// No agent produced usable output. The report still explains what was
/// attempted and why nothing came back.
pub fn build_failed_report(progress: &InvestigationProgress) -> String {
    let mut out = header(progress, "Status: failed (no usable results)");
    out.push_str(&format!(
        "\nNo agent produced usable output for \"{}\".\n",
        progress.topic
    ));
    if progress.errors.is_empty() {
        out.push_str("\nAgents completed but returned empty results. The topic may be too \
                      narrow or too ambiguous; rephrase it or raise the depth.\n");
    } else {
        out.push_str("\n## Errors\n\n");
        for error in &progress.errors {
            out.push_str(&format!("- {}\n", error));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_core::{AgentResult, Depth, IocKind};

    fn progress_with(results: Vec<AgentResult>) -> InvestigationProgress {
        let mut progress = InvestigationProgress::new(1, "lockbit infrastructure", Depth::Standard);
        for r in results {
            progress.add_agent_result(r);
        }
        progress
    }

    #[test]
    fn test_full_report_contains_agent_output_and_evidence() {
        let progress = progress_with(vec![AgentResult::success(
            "SearchAgent",
            "Infrastructure overlaps with prior campaigns.".to_string(),
            2.0,
            1,
        )]);
        let evidence = vec![Evidence::ioc(IocKind::Ip, "1.2.3.4").with_context("C2")];

        let report = build_report(progress.classify(), &progress, &evidence, &[]);
        assert!(report.starts_with("# Investigation Report: lockbit infrastructure"));
        assert!(report.contains("## SearchAgent"));
        assert!(report.contains("| ip | 1.2.3.4 | C2 |"));
        assert!(!report.contains("Failed Agents"));
    }

    #[test]
    fn test_partial_report_names_failures_and_hints_continue() {
        let progress = progress_with(vec![
            AgentResult::success("SearchAgent", "findings".to_string(), 2.0, 0),
            AgentResult::failure("ThreatIntelAgent", "agent exceeded 180s budget".to_string(), 180.0),
        ]);

        let report = build_report(progress.classify(), &progress, &[], &[]);
        assert!(report.contains("Status: partial"));
        assert!(report.contains("- ThreatIntelAgent: agent exceeded 180s budget"));
        assert!(report.contains("continue this"));
    }

    #[test]
    fn test_failed_report_is_never_empty() {
        let progress = progress_with(vec![AgentResult::failure(
            "SearchAgent",
            "connection refused".to_string(),
            0.3,
        )]);

        let report = build_report(progress.classify(), &progress, &[], &[]);
        assert!(report.contains("Status: failed"));
        assert!(report.contains("SearchAgent: connection refused"));
    }

    #[test]
    fn test_failed_report_for_empty_successes() {
        // Agents "succeeded" with blank output; the report must still explain.
        let progress = progress_with(vec![AgentResult::success(
            "SearchAgent",
            "   ".to_string(),
            0.2,
            0,
        )]);
        assert_eq!(progress.classify(), corvus_core::RunStatus::Failed);

        let report = build_report(progress.classify(), &progress, &[], &[]);
        assert!(report.contains("empty results"));
    }

    #[test]
    fn test_findings_render_links() {
        let progress = progress_with(vec![AgentResult::success(
            "SearchAgent",
            "x".to_string(),
            1.0,
            0,
        )]);
        let findings = vec![Finding {
            title: "Leaked negotiation portal".to_string(),
            url: Some("https://example.org/post".to_string()),
            section: None,
        }];
        let report = build_report(progress.classify(), &progress, &[], &findings);
        assert!(report.contains("- [Leaked negotiation portal](https://example.org/post)"));
    }
}
