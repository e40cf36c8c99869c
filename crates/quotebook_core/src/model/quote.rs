//! Quote domain model.
//!
//! # Responsibility
//! - Define the `{id?, text, category}` record stored in the local book.
//! - Normalize and validate user-facing text fields.
//!
//! # Invariants
//! - `text` and `category` are trimmed with inner whitespace collapsed.
//! - `validate()` rejects empty text or category after normalization.
//! - `id`, when present, is stable for the lifetime of the record.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const LOCAL_ID_PREFIX: &str = "local-";

/// Stable quote identifier.
///
/// Locally created quotes use `local-<uuid>`, remote quotes keep whatever
/// identifier the remote source assigned.
pub type QuoteId = String;

/// Validation failures for quote fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteValidationError {
    EmptyText,
    EmptyCategory,
    EmptyId,
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "quote text cannot be empty"),
            Self::EmptyCategory => write!(f, "quote category cannot be empty"),
            Self::EmptyId => write!(f, "quote id cannot be blank when present"),
        }
    }
}

impl Error for QuoteValidationError {}

/// One quote in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Present for id-identified records; omitted from JSON when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<QuoteId>,
    pub text: String,
    pub category: String,
}

impl Quote {
    /// Creates a quote without an id, normalizing both fields.
    pub fn new(text: impl AsRef<str>, category: impl AsRef<str>) -> Self {
        Self {
            id: None,
            text: normalize_field(text.as_ref()),
            category: normalize_field(category.as_ref()),
        }
    }

    /// Creates a quote with a caller-provided id.
    ///
    /// Used by import/sync paths where identity already exists externally.
    pub fn with_id(
        id: impl Into<QuoteId>,
        text: impl AsRef<str>,
        category: impl AsRef<str>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(text, category)
        }
    }

    /// Creates a quote with a freshly generated local id.
    pub fn new_local(text: impl AsRef<str>, category: impl AsRef<str>) -> Self {
        Self::with_id(generate_local_id(), text, category)
    }

    /// Checks field invariants.
    ///
    /// # Errors
    /// - `EmptyText` / `EmptyCategory` when the field is blank.
    /// - `EmptyId` when `id` is present but blank.
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        if self.text.trim().is_empty() {
            return Err(QuoteValidationError::EmptyText);
        }
        if self.category.trim().is_empty() {
            return Err(QuoteValidationError::EmptyCategory);
        }
        if matches!(self.id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(QuoteValidationError::EmptyId);
        }
        Ok(())
    }

    /// Returns a copy with text and category normalized.
    pub fn normalized(&self) -> Self {
        Self {
            id: self.id.as_ref().map(|id| id.trim().to_string()),
            text: normalize_field(&self.text),
            category: normalize_field(&self.category),
        }
    }

    /// Returns whether both user-visible fields are equal.
    pub fn same_content(&self, other: &Quote) -> bool {
        self.text == other.text && self.category == other.category
    }
}

/// Trims and collapses inner whitespace runs to a single space.
pub fn normalize_field(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

fn generate_local_id() -> QuoteId {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())
}

/// Quotes used when the store has never been written.
pub fn seed_quotes() -> Vec<Quote> {
    vec![
        Quote::new(
            "The only way to do great work is to love what you do.",
            "Inspiration",
        ),
        Quote::new(
            "Innovation distinguishes between a leader and a follower.",
            "Leadership",
        ),
        Quote::new("Stay hungry, stay foolish.", "Motivation"),
    ]
}
