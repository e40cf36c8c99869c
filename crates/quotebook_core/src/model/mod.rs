//! Domain model for the quote collection.
//!
//! # Responsibility
//! - Define the canonical quote record shared by store, service and sync.
//!
//! # Invariants
//! - A persisted quote always has non-empty, normalized text and category.
//! - `id` is optional; content-identified quotes carry none.

pub mod quote;
