//! Core logic for Quotebook.
//! This crate owns the quote collection, its persistence and server sync.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{default_config_path, ConfigError, QuotebookConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::quote::{seed_quotes, Quote, QuoteId, QuoteValidationError};
pub use repo::quote_store::{QuoteStore, SqliteQuoteStore, StoreError, StoreResult};
pub use service::quote_book::{ImportMode, QuoteBook, QuoteBookError, ALL_CATEGORIES};
pub use sync::driver::{SyncDriver, SyncError, SyncSettings};
pub use sync::reconcile::{
    ConflictPolicy, IdentityMode, MergeOutcome, MergeReport, ReconcileOptions, Reconciler,
};
pub use sync::remote::{
    HttpQuoteSource, HttpSourceSettings, RemoteError, RemoteQuoteSource, RemoteResult, SyncStage,
};
pub use sync::status::SyncStatus;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
