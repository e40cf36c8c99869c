//! User-facing sync status.

use crate::sync::reconcile::MergeReport;
use chrono::{DateTime, Utc};

/// Result of the most recent sync trigger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No sync has run yet.
    #[default]
    Idle,
    /// Trigger arrived while another sync was in flight and was folded into it.
    Coalesced,
    Completed {
        report: MergeReport,
        /// Set when the merge succeeded but pushing the result did not.
        push_error: Option<String>,
        at: DateTime<Utc>,
    },
    /// Nothing was merged; the local store is unchanged.
    Failed { error: String, at: DateTime<Utc> },
}

impl SyncStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn report(&self) -> Option<MergeReport> {
        match self {
            Self::Completed { report, .. } => Some(*report),
            _ => None,
        }
    }

    /// Renders a one-line status message.
    pub fn message(&self) -> String {
        match self {
            Self::Idle => "Not synced yet.".to_string(),
            Self::Coalesced => "Sync already in progress.".to_string(),
            Self::Completed {
                report,
                push_error,
                at,
            } => {
                let mut message = format!(
                    "Quotes synced with server at {}: {} added, {} conflicts",
                    format_timestamp(at),
                    report.added,
                    report.conflicts
                );
                if let Some(error) = push_error {
                    message.push_str(&format!(" (upload failed: {error})"));
                }
                message
            }
            Self::Failed { error, at } => format!(
                "Sync failed at {}: {error}. Working offline.",
                format_timestamp(at)
            ),
        }
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::SyncStatus;
    use crate::sync::reconcile::MergeReport;
    use chrono::{TimeZone, Utc};

    #[test]
    fn completed_message_reports_counts_and_timestamp() {
        let at = Utc
            .with_ymd_and_hms(2026, 10, 19, 10, 0, 0)
            .single()
            .expect("valid timestamp");
        let status = SyncStatus::Completed {
            report: MergeReport {
                added: 2,
                conflicts: 1,
                unchanged: 0,
            },
            push_error: None,
            at,
        };
        assert_eq!(
            status.message(),
            "Quotes synced with server at 2026-10-19 10:00:00 UTC: 2 added, 1 conflicts"
        );
    }

    #[test]
    fn failed_message_mentions_offline_mode() {
        let status = SyncStatus::Failed {
            error: "http fetch failed (timeout): slow".to_string(),
            at: Utc::now(),
        };
        assert!(status.is_failure());
        assert!(status.message().ends_with("Working offline."));
        assert!(status.report().is_none());
    }
}
