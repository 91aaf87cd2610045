//! The ingestion state machine.
//!
//! A single worker task consumes file-creation events one at a time, tracks
//! page-sequence continuity, asks the separator oracle about each accepted
//! page, and hands completed batches to detached assembler tasks. Its
//! internal state is never shared, so the loop itself needs no locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::assemble::Assembler;
use crate::config::PipelineConfig;
use crate::gate::FileGate;
use crate::naming::PagePattern;
use crate::oracle::{SeparatorOracle, read_page_bytes};

/// One file-creation notification from the watched drop folder.
#[derive(Clone, Debug)]
pub struct ScanEvent {
    pub path: PathBuf,
    pub name: String,
}

/// Drives the two-state machine: Idle (empty batch, cursor unset) and
/// Accumulating (non-empty batch, cursor on the last accepted index).
pub struct Ingestor {
    rx: mpsc::Receiver<ScanEvent>,
    pattern: PagePattern,
    oracle: Arc<dyn SeparatorOracle>,
    assembler: Arc<Assembler>,
    gate: FileGate,
    config: PipelineConfig,
    batch: Vec<PathBuf>,
    cursor: Option<u32>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("pending_pages", &self.batch.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Ingestor {
    pub fn new(
        rx: mpsc::Receiver<ScanEvent>,
        pattern: PagePattern,
        oracle: Arc<dyn SeparatorOracle>,
        assembler: Arc<Assembler>,
        gate: FileGate,
        config: PipelineConfig,
    ) -> Self {
        Self {
            rx,
            pattern,
            oracle,
            assembler,
            gate,
            config,
            batch: Vec::new(),
            cursor: None,
        }
    }

    /// Process events until the channel closes. Flushes are handed off as
    /// detached tasks; the worker never waits for assembly.
    pub async fn run(mut self) {
        loop {
            let event = match timeout(self.config.idle_flush(), self.rx.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    // Watcher gone: drain what we have and stop. In-flight
                    // assemblies keep running on their own tasks.
                    self.flush();
                    break;
                }
                Err(_) => {
                    if !self.batch.is_empty() {
                        debug!(
                            pages = self.batch.len(),
                            "idle timeout elapsed, flushing pending batch"
                        );
                        self.flush();
                    }
                    self.cursor = None;
                    continue;
                }
            };

            self.handle_event(event).await;
        }
        info!("ingestion worker stopped");
    }

    async fn handle_event(&mut self, event: ScanEvent) {
        let Some(page) = self.pattern.validate(&event.name, &event.path) else {
            // Names that fail the pattern are scanner noise, not an error.
            debug!(name = %event.name, "deleting file with unrecognized name");
            if let Err(err) = tokio::fs::remove_file(&event.path).await {
                warn!(
                    path = %event.path.display(),
                    "failed to delete unrecognized file: {err}"
                );
            }
            return;
        };

        let continuation = match self.cursor {
            None => true,
            Some(prev) => prev.checked_add(1) == Some(page.index),
        };

        if continuation {
            self.batch.push(page.path.clone());
            self.cursor = Some(page.index);
            if self.separator_on(&page.path).await {
                debug!(index = page.index, "separator page closes the batch");
                self.flush();
            }
        } else {
            // A gap or restart ends the current document. The new page opens
            // the next batch; its own separator status is not consulted so a
            // single event never produces two flush boundaries.
            debug!(
                index = page.index,
                cursor = ?self.cursor,
                "sequence break, flushing pending batch"
            );
            self.flush();
            self.batch.push(page.path);
            self.cursor = Some(page.index);
        }
    }

    /// Ask the oracle whether this page closes the current document.
    ///
    /// Read failures and oracle errors degrade to "no separator" so scanned
    /// pages are accumulated rather than silently dropped.
    async fn separator_on(&self, path: &Path) -> bool {
        let bytes = match read_page_bytes(path, &self.gate, &self.config.retry).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    "could not read page for separator detection: {err}"
                );
                return false;
            }
        };

        let oracle = Arc::clone(&self.oracle);
        match spawn_blocking(move || oracle.detect(&bytes)).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!(path = %path.display(), "separator detection failed: {err}");
                false
            }
            Err(join_err) => {
                warn!(path = %path.display(), "separator detection panicked: {join_err}");
                false
            }
        }
    }

    /// Hand the current batch to a new assembler task and return to Idle.
    /// Exactly one snapshot leaves per flush; the in-memory batch is empty
    /// afterwards.
    fn flush(&mut self) {
        self.cursor = None;
        if self.batch.is_empty() {
            return;
        }
        let pages = std::mem::take(&mut self.batch);
        info!(pages = pages.len(), "flushing batch to assembly");

        let assembler = Arc::clone(&self.assembler);
        tokio::spawn(assembler.assemble(pages));
    }
}
