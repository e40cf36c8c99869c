//! Quote book application state.
//!
//! # Responsibility
//! - Own the in-memory quote sequence and the selected category.
//! - Provide add/filter/random/import/export/merge use-cases.
//! - Persist every mutation wholesale through `QuoteStore`.
//!
//! # Invariants
//! - In-memory state only takes values read from, or already written to, the store.
//! - Rejected input (validation, malformed import) never mutates state.
//! - `None` selection means "all categories".

use crate::model::quote::{normalize_field, seed_quotes, Quote, QuoteValidationError};
use crate::repo::quote_store::{QuoteStore, StoreError};
use crate::sync::reconcile::{MergeReport, Reconciler};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Selection value that clears the category filter.
pub const ALL_CATEGORIES: &str = "all";

/// Service error for quote book use-cases.
#[derive(Debug)]
pub enum QuoteBookError {
    /// User input failed quote validation.
    Validation(QuoteValidationError),
    /// Import payload is not valid JSON.
    InvalidJson(String),
    /// Import payload is valid JSON but not an array.
    NotAnArray,
    /// One imported entry is not a valid quote.
    InvalidEntry { index: usize, reason: String },
    Store(StoreError),
    Io(std::io::Error),
}

impl Display for QuoteBookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidJson(details) => write!(f, "invalid JSON format: {details}"),
            Self::NotAnArray => write!(f, "invalid format: expected a JSON array of quotes"),
            Self::InvalidEntry { index, reason } => {
                write!(f, "invalid quote at position {index}: {reason}")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QuoteBookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuoteValidationError> for QuoteBookError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for QuoteBookError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

impl From<std::io::Error> for QuoteBookError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// How imported quotes combine with the current collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Imported array becomes the whole collection.
    #[default]
    Replace,
    /// Imported quotes go after the existing ones.
    Append,
}

/// Explicit application state over a durable store.
pub struct QuoteBook<S: QuoteStore> {
    store: S,
    quotes: Vec<Quote>,
    selected_category: Option<String>,
}

impl<S: QuoteStore> QuoteBook<S> {
    /// Loads quotes and the last selected category from `store`.
    ///
    /// A store that was never written starts from the seed quotes; a stored
    /// empty array stays empty.
    pub fn load(store: S) -> Result<Self, QuoteBookError> {
        let quotes = match store.load_quotes()? {
            Some(quotes) => quotes,
            None => {
                let seeds = seed_quotes();
                store.save_quotes(&seeds)?;
                info!(
                    "event=book_seed module=service status=ok count={}",
                    seeds.len()
                );
                seeds
            }
        };
        let selected_category = store.load_last_category()?;

        info!(
            "event=book_load module=service status=ok count={} has_filter={}",
            quotes.len(),
            selected_category.is_some()
        );
        Ok(Self {
            store,
            quotes,
            selected_category,
        })
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Unique categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for quote in &self.quotes {
            if !categories.contains(&quote.category) {
                categories.push(quote.category.clone());
            }
        }
        categories
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.selected_category.as_deref()
    }

    /// Sets and persists the category filter.
    ///
    /// `None`, blank input and `"all"` (any case) clear the filter.
    pub fn select_category(&mut self, category: Option<&str>) -> Result<(), QuoteBookError> {
        let normalized = category
            .map(normalize_field)
            .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case(ALL_CATEGORIES));

        self.store.save_last_category(normalized.as_deref())?;
        self.selected_category = normalized;
        Ok(())
    }

    /// Quotes visible under the current filter.
    pub fn filtered(&self) -> Vec<&Quote> {
        match self.selected_category.as_deref() {
            Some(category) => self
                .quotes
                .iter()
                .filter(|quote| quote.category == category)
                .collect(),
            None => self.quotes.iter().collect(),
        }
    }

    /// Picks one quote uniformly from `filtered()`.
    pub fn random_quote<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Quote> {
        let visible = self.filtered();
        visible.choose(rng).copied()
    }

    /// Appends a new locally identified quote.
    ///
    /// # Errors
    /// - `Validation` when text or category is blank; nothing is stored.
    pub fn add_quote(
        &mut self,
        text: impl AsRef<str>,
        category: impl AsRef<str>,
    ) -> Result<Quote, QuoteBookError> {
        let quote = Quote::new_local(text, category);
        quote.validate()?;

        let mut next = self.quotes.clone();
        next.push(quote.clone());
        self.commit(next)?;

        info!(
            "event=quote_add module=service status=ok count={}",
            self.quotes.len()
        );
        Ok(quote)
    }

    /// Serializes every quote as a pretty-printed JSON array.
    pub fn export_json(&self) -> Result<String, QuoteBookError> {
        serde_json::to_string_pretty(&self.quotes)
            .map_err(|err| QuoteBookError::InvalidJson(err.to_string()))
    }

    pub fn export_to_file(&self, path: impl AsRef<Path>) -> Result<usize, QuoteBookError> {
        let payload = self.export_json()?;
        std::fs::write(path.as_ref(), payload)?;
        info!(
            "event=quote_export module=service status=ok count={}",
            self.quotes.len()
        );
        Ok(self.quotes.len())
    }

    /// Imports a JSON array of quotes.
    ///
    /// Returns the number of imported quotes.
    ///
    /// # Errors
    /// - `InvalidJson`, `NotAnArray` or `InvalidEntry`; the book is unchanged.
    pub fn import_json(&mut self, payload: &str, mode: ImportMode) -> Result<usize, QuoteBookError> {
        let imported = match parse_import(payload) {
            Ok(imported) => imported,
            Err(err) => {
                warn!("event=quote_import module=service status=error error={err}");
                return Err(err);
            }
        };
        let count = imported.len();

        let next = match mode {
            ImportMode::Replace => imported,
            ImportMode::Append => {
                let mut next = self.quotes.clone();
                next.extend(imported);
                next
            }
        };
        self.commit(next)?;

        info!(
            "event=quote_import module=service status=ok mode={:?} imported={} total={}",
            mode,
            count,
            self.quotes.len()
        );
        Ok(count)
    }

    pub fn import_from_file(
        &mut self,
        path: impl AsRef<Path>,
        mode: ImportMode,
    ) -> Result<usize, QuoteBookError> {
        let payload = std::fs::read_to_string(path.as_ref())?;
        self.import_json(&payload, mode)
    }

    /// Re-reads the quote sequence from the store.
    ///
    /// Picks up writes made by other processes sharing the database. A store
    /// that holds no quotes key keeps the current sequence.
    pub fn refresh(&mut self) -> Result<(), QuoteBookError> {
        if let Some(quotes) = self.store.load_quotes()? {
            if quotes != self.quotes {
                debug!(
                    "event=book_refresh module=service status=ok before={} after={}",
                    self.quotes.len(),
                    quotes.len()
                );
            }
            self.quotes = quotes;
        }
        Ok(())
    }

    /// Reconciles a remote snapshot into the stored sequence and persists the
    /// result.
    ///
    /// The merge base is re-read from the store first, so quotes written by
    /// another process since `load` are kept.
    ///
    /// # Errors
    /// - `Validation` when the snapshot holds an invalid quote.
    /// - `Store` when the read or write fails; memory keeps the last stored sequence.
    pub fn apply_merge(
        &mut self,
        remote: &[Quote],
        reconciler: &Reconciler,
    ) -> Result<MergeReport, QuoteBookError> {
        let remote: Vec<Quote> = remote.iter().map(Quote::normalized).collect();
        for quote in &remote {
            quote.validate()?;
        }

        self.refresh()?;
        let outcome = reconciler.merge(&self.quotes, &remote);
        if outcome.report.has_changes() {
            self.commit(outcome.merged)?;
        }
        Ok(outcome.report)
    }

    fn commit(&mut self, next: Vec<Quote>) -> Result<(), QuoteBookError> {
        self.store.save_quotes(&next)?;
        self.quotes = next;
        Ok(())
    }
}

fn parse_import(payload: &str) -> Result<Vec<Quote>, QuoteBookError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|err| QuoteBookError::InvalidJson(err.to_string()))?;
    let Value::Array(entries) = value else {
        return Err(QuoteBookError::NotAnArray);
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let quote: Quote = serde_json::from_value(entry).map_err(|err| {
                QuoteBookError::InvalidEntry {
                    index,
                    reason: err.to_string(),
                }
            })?;
            let quote = quote.normalized();
            quote
                .validate()
                .map_err(|err| QuoteBookError::InvalidEntry {
                    index,
                    reason: err.to_string(),
                })?;
            Ok(quote)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_import;
    use super::QuoteBookError;

    #[test]
    fn parse_import_distinguishes_error_kinds() {
        assert!(matches!(
            parse_import("not json"),
            Err(QuoteBookError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_import(r#"{"text":"A","category":"X"}"#),
            Err(QuoteBookError::NotAnArray)
        ));
        assert!(matches!(
            parse_import(r#"[{"text":"A","category":"X"},{"text":"B"}]"#),
            Err(QuoteBookError::InvalidEntry { index: 1, .. })
        ));
        assert!(matches!(
            parse_import(r#"[{"text":"  ","category":"X"}]"#),
            Err(QuoteBookError::InvalidEntry { index: 0, .. })
        ));
    }

    #[test]
    fn parse_import_normalizes_fields() {
        let quotes = parse_import(r#"[{"id":"9","text":" A  b ","category":"X "}]"#)
            .expect("valid payload");
        assert_eq!(quotes[0].text, "A b");
        assert_eq!(quotes[0].category, "X");
        assert_eq!(quotes[0].id.as_deref(), Some("9"));
    }
}
