//! Local/remote quote reconciliation.
//!
//! # Responsibility
//! - Merge a remote snapshot into the local sequence.
//! - Report how many quotes were added, conflicted or already present.
//!
//! # Invariants
//! - Local quotes are never removed or reordered.
//! - Every remote quote matches exactly one merged quote afterwards.
//! - Re-merging the same snapshot adds nothing.

use crate::model::quote::Quote;
use serde::{Deserialize, Serialize};

/// Rule deciding when a local and a remote quote are the same record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Same `text`; category is ignored.
    #[default]
    Content,
    /// Same `id`. Quotes without an id fall back to `Content`.
    Id,
}

/// What to do when an id-matched pair differs in text or category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Overwrite the local fields with the remote values.
    #[default]
    ServerWins,
    /// Count the conflict, keep the local record.
    KeepLocal,
}

/// Identity rule and conflict policy for one reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub identity: IdentityMode,
    pub policy: ConflictPolicy,
}

/// Counters produced by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: usize,
    pub conflicts: usize,
    pub unchanged: usize,
}

impl MergeReport {
    /// Whether the merge produced a different sequence.
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.conflicts > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: Vec<Quote>,
    pub report: MergeReport,
}

/// Stateless merge routine configured by `ReconcileOptions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Merges `remote` into a copy of `local`.
    ///
    /// Lookups run against the sequence built so far, so a quote repeated
    /// inside `remote` is appended once.
    pub fn merge(&self, local: &[Quote], remote: &[Quote]) -> MergeOutcome {
        let mut merged = local.to_vec();
        let mut report = MergeReport::default();

        for incoming in remote {
            let Some(index) = self.find_match(&merged, incoming) else {
                merged.push(incoming.clone());
                report.added += 1;
                continue;
            };

            let existing = &mut merged[index];
            if !self.compares_fields(existing, incoming) || existing.same_content(incoming) {
                report.unchanged += 1;
                continue;
            }

            report.conflicts += 1;
            if self.options.policy == ConflictPolicy::ServerWins {
                existing.text = incoming.text.clone();
                existing.category = incoming.category.clone();
            }
        }

        MergeOutcome { merged, report }
    }

    // An exact id match wins over a text match against an id-less quote.
    fn find_match(&self, merged: &[Quote], incoming: &Quote) -> Option<usize> {
        if self.options.identity == IdentityMode::Id && incoming.id.is_some() {
            if let Some(index) = merged.iter().position(|existing| existing.id == incoming.id) {
                return Some(index);
            }
        }
        merged
            .iter()
            .position(|existing| self.is_same_record(existing, incoming))
    }

    fn is_same_record(&self, existing: &Quote, incoming: &Quote) -> bool {
        match (self.options.identity, &existing.id, &incoming.id) {
            (IdentityMode::Id, Some(left), Some(right)) => left == right,
            _ => existing.text == incoming.text,
        }
    }

    // Content matches already agree on the key field; the remaining category
    // difference is dropped, not reported.
    fn compares_fields(&self, existing: &Quote, incoming: &Quote) -> bool {
        self.options.identity == IdentityMode::Id && existing.id.is_some() && incoming.id.is_some()
    }
}
