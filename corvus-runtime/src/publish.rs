//! Report publishing
//!
//! Publishing is best-effort: the orchestrator persists the report first and
//! treats a publish failure as a warning on the outcome, never as a run
//! failure.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use corvus_core::ProgressSummary;

/// Reports longer than this are truncated before delivery; the stored copy
/// is always complete.
pub const MAX_PUBLISH_CHARS: usize = 4000;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher not configured: {0}")]
    Config(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Acknowledgement from the publishing channel
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Channel-assigned message identifier, when the channel provides one
    pub message_id: Option<String>,
    /// Whether the delivered report was truncated
    pub truncated: bool,
}

/// Delivery channel for finished reports.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish_report(
        &self,
        topic: &str,
        report: &str,
        stats: Option<&ProgressSummary>,
    ) -> Result<PublishReceipt, PublishError>;
}

/// Posts reports to an HTTP webhook as JSON.
pub struct WebhookPublisher {
    url: String,
    client: reqwest::Client,
}

impl WebhookPublisher {
    pub fn new(url: &str) -> Result<Self, PublishError> {
        if url.trim().is_empty() {
            return Err(PublishError::Config("webhook URL is empty".to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        })
    }
}

const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Cut at a char boundary and mark the cut. The marked result never
/// exceeds [`MAX_PUBLISH_CHARS`].
pub(crate) fn truncate_report(report: &str) -> (String, bool) {
    if report.chars().count() <= MAX_PUBLISH_CHARS {
        return (report.to_string(), false);
    }
    let keep = MAX_PUBLISH_CHARS - TRUNCATION_MARKER.chars().count();
    let cut: String = report.chars().take(keep).collect();
    (format!("{}{}", cut, TRUNCATION_MARKER), true)
}

#[async_trait]
impl ReportPublisher for WebhookPublisher {
    async fn publish_report(
        &self,
        topic: &str,
        report: &str,
        stats: Option<&ProgressSummary>,
    ) -> Result<PublishReceipt, PublishError> {
        let (body, truncated) = truncate_report(report);
        let payload = serde_json::json!({
            "topic": topic,
            "report": body,
            "truncated": truncated,
            "stats": stats,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PublishError::Delivery(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        info!(topic, truncated, "report published");
        Ok(PublishReceipt {
            message_id,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_marks_cut() {
        let long = "x".repeat(MAX_PUBLISH_CHARS + 500);
        let (body, truncated) = truncate_report(&long);
        assert!(truncated);
        assert_eq!(body.chars().count(), MAX_PUBLISH_CHARS);
        assert!(body.ends_with("(truncated)"));
    }

    #[test]
    fn test_one_over_cap_stays_within_cap() {
        let long = "x".repeat(MAX_PUBLISH_CHARS + 1);
        let (body, truncated) = truncate_report(&long);
        assert!(truncated);
        assert!(body.chars().count() <= MAX_PUBLISH_CHARS);
    }

    #[test]
    fn test_short_report_unchanged() {
        let (body, truncated) = truncate_report("# Short report");
        assert!(!truncated);
        assert_eq!(body, "# Short report");
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(
            WebhookPublisher::new("  "),
            Err(PublishError::Config(_))
        ));
        assert!(WebhookPublisher::new("https://hooks.example/corvus").is_ok());
    }
}
