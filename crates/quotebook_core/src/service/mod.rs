//! Core use-case services.
//!
//! # Responsibility
//! - Hold application state behind explicit types instead of globals.
//! - Keep CLI and sync layers decoupled from storage details.

pub mod quote_book;
