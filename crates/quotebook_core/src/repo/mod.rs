//! Persistence contracts for the quote book.
//!
//! # Responsibility
//! - Define the flat key-value store the book reads and overwrites.
//! - Keep SQLite details out of the service and sync layers.
//!
//! # Invariants
//! - The quote sequence is written wholesale, never diffed.
//! - Read paths reject invalid persisted quotes instead of masking them.

pub mod quote_store;
