//! Drop-folder ingestion and batch assembly for scanned documents.
//!
//! A document scanner deposits sequentially numbered page images into a
//! watched directory. This crate groups consecutive pages into logical
//! documents and binds each completed group into a single multi-page
//! artifact:
//!
//! - [`watch`] forwards file-creation notifications into a bounded channel;
//! - [`naming`] validates file names and extracts page indices;
//! - [`ingest`] runs the single-worker state machine that tracks sequence
//!   continuity, consults the separator [`oracle`], and flushes batches on
//!   separator pages, sequence breaks, or idle timeouts;
//! - [`assemble`] renders each flushed batch into an artifact on its own
//!   task and deletes the source pages;
//! - [`quarantine`] preserves failed batches for manual inspection;
//! - [`gate`] serializes every read/delete/move of scan files so ingestion
//!   and concurrent assemblies never race on the same file.
//!
//! [`service::SheafService`] wires the pieces together and owns their
//! lifecycle.

pub mod artifact;
pub mod assemble;
pub mod config;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod naming;
pub mod oracle;
pub mod quarantine;
pub mod service;
pub mod watch;

pub use config::{NamingConfig, PipelineConfig, RetryConfig};
pub use error::{Result, SheafError};
pub use service::SheafService;
