//! Evidence extraction from agent result text
//!
//! Two paths, tried in order:
//! 1. Structured: the result parses as a JSON object with an `evidence` key
//!    holding `iocs` / `entities` / `techniques` arrays. Primary path.
//! 2. Fallback: best-effort markdown scan for free-form reports. Collects
//!    hyperlink references and narrative findings under "finding" sections,
//!    and parses IOC tables whose header carries both "Type" and "Value".
//!
//! Fallback output is lower-confidence by construction; see
//! [`confidence_score`].

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

use crate::evidence::{dedup_evidence, EntityKind, Evidence, Finding, IocKind};
use crate::{MAX_FALLBACK_FINDINGS, MAX_FINDING_TITLE, MIN_FINDING_TITLE};

/// Result of extracting evidence from one block of agent output
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub evidence: Vec<Evidence>,
    pub findings: Vec<Finding>,
    /// Whether the structured JSON path succeeded
    pub structured: bool,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty() && self.findings.is_empty()
    }
}

// =============================================================================
// Structured path
// =============================================================================

#[derive(Debug, Deserialize)]
struct StructuredEnvelope {
    evidence: StructuredEvidence,
}

#[derive(Debug, Deserialize, Default)]
struct StructuredEvidence {
    #[serde(default)]
    iocs: Vec<StructuredIoc>,
    #[serde(default)]
    entities: Vec<StructuredEntity>,
    #[serde(default)]
    techniques: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredIoc {
    #[serde(alias = "type")]
    kind: String,
    value: String,
    #[serde(default)]
    context: String,
}

#[derive(Debug, Deserialize)]
struct StructuredEntity {
    #[serde(alias = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    context: String,
}

/// Strip an optional ```json fenced block wrapper from LLM output
fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Try the structured JSON path. Returns `None` when the text is not a JSON
/// object carrying an `evidence` key.
pub fn extract_structured(text: &str) -> Option<Extraction> {
    let envelope: StructuredEnvelope = serde_json::from_str(unfence(text)).ok()?;

    let mut evidence = Vec::new();
    for ioc in envelope.evidence.iocs {
        let Some(kind) = IocKind::parse(&ioc.kind) else {
            debug!(kind = %ioc.kind, "skipping IOC with unknown kind");
            continue;
        };
        evidence.push(Evidence::Ioc {
            kind,
            value: ioc.value,
            context: ioc.context,
        });
    }
    for entity in envelope.evidence.entities {
        let Some(kind) = EntityKind::parse(&entity.kind) else {
            debug!(kind = %entity.kind, "skipping entity with unknown kind");
            continue;
        };
        evidence.push(Evidence::Entity {
            kind,
            name: entity.name,
            context: entity.context,
        });
    }
    for id in envelope.evidence.techniques {
        let id = id.trim().to_uppercase();
        if !id.is_empty() {
            evidence.push(Evidence::Technique { id });
        }
    }

    Some(Extraction {
        evidence: dedup_evidence(evidence),
        findings: Vec::new(),
        structured: true,
    })
}

// =============================================================================
// Fallback markdown path
// =============================================================================

static LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").unwrap());

static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.+)$").unwrap());

static LIST_ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(.+)$").unwrap());

/// A table row whose cells are only dashes/colons is a separator
fn is_separator_row(cells: &[&str]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
}

fn split_table_row(line: &str) -> Vec<&str> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(str::trim)
        .collect()
}

fn truncate_title(title: &str) -> String {
    let cleaned = title.trim().trim_matches('*').trim();
    cleaned.chars().take(MAX_FINDING_TITLE).collect()
}

/// Best-effort extraction from free-form report markdown.
///
/// Pure function of the input text: re-running it on the same report yields
/// the same result, so replaying a trace cannot duplicate evidence.
pub fn extract_fallback(text: &str) -> Extraction {
    let mut findings: Vec<Finding> = Vec::new();
    let mut iocs: Vec<Evidence> = Vec::new();

    let mut section: Option<String> = None;
    let mut in_ioc_table = false;

    for line in text.lines() {
        if let Some(caps) = HEADER_REGEX.captures(line) {
            section = Some(caps[1].trim().to_string());
            in_ioc_table = false;
            continue;
        }

        // IOC table detection: header row mentioning both Type and Value
        if line.contains('|') {
            let cells = split_table_row(line);
            if cells.len() >= 2 {
                if is_separator_row(&cells) {
                    continue;
                }
                let lowered: Vec<String> = cells.iter().map(|c| c.to_lowercase()).collect();
                if lowered.iter().any(|c| c.contains("type"))
                    && lowered.iter().any(|c| c.contains("value"))
                {
                    in_ioc_table = true;
                    continue;
                }
                if in_ioc_table {
                    if let Some(kind) = IocKind::parse(cells[0]) {
                        let value = cells[1].trim_matches('`').trim();
                        if !value.is_empty() {
                            let context = cells.get(2).map(|c| c.to_string()).unwrap_or_default();
                            iocs.push(Evidence::Ioc {
                                kind,
                                value: value.to_string(),
                                context,
                            });
                        }
                    }
                    continue;
                }
            }
        } else {
            in_ioc_table = false;
        }

        if findings.len() >= MAX_FALLBACK_FINDINGS {
            continue;
        }

        // Hyperlink references are candidate findings anywhere in the report
        if let Some(caps) = LINK_REGEX.captures(line) {
            findings.push(Finding {
                title: truncate_title(&caps[1]),
                url: Some(caps[2].to_string()),
                section: section.clone(),
            });
            continue;
        }

        // Narrative findings: list items under a "finding" section
        let under_findings = section
            .as_deref()
            .map(|s| s.to_lowercase().contains("finding"))
            .unwrap_or(false);
        if under_findings {
            if let Some(caps) = LIST_ITEM_REGEX.captures(line) {
                let title = truncate_title(&caps[1]);
                if title.len() >= MIN_FINDING_TITLE {
                    findings.push(Finding {
                        title,
                        url: None,
                        section: section.clone(),
                    });
                }
            }
        }
    }

    findings.truncate(MAX_FALLBACK_FINDINGS);

    Extraction {
        evidence: dedup_evidence(iocs),
        findings,
        structured: false,
    }
}

/// Extract evidence from agent result text, preferring the structured path.
pub fn extract_evidence(text: &str) -> Extraction {
    if let Some(extraction) = extract_structured(text) {
        return extraction;
    }
    extract_fallback(text)
}

// =============================================================================
// Confidence scoring
// =============================================================================

/// Base score for structured-schema output
const STRUCTURED_BASE: f64 = 0.9;
/// Base score when the fallback parser recovered something
const FALLBACK_BASE: f64 = 0.4;
/// Base score when nothing was recovered at all
const EMPTY_BASE: f64 = 0.2;
/// Bonus per evidence item carrying non-empty context
const CONTEXT_BONUS: f64 = 0.05;

/// Score an extraction in [0, 1].
///
/// Contract: monotone. More structured compliance and more corroborated
/// (context-bearing) evidence never lowers the score.
pub fn confidence_score(extraction: &Extraction) -> f64 {
    let base = if extraction.structured {
        STRUCTURED_BASE
    } else if extraction.is_empty() {
        EMPTY_BASE
    } else {
        FALLBACK_BASE
    };
    let bonus = extraction
        .evidence
        .iter()
        .filter(|e| e.has_context())
        .count() as f64
        * CONTEXT_BONUS;
    (base + bonus).clamp(0.0, 1.0)
}
