//! Lifecycle wiring for one drop-folder pipeline.

use std::sync::Arc;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::artifact::ArtifactWriter;
use crate::assemble::Assembler;
use crate::config::PipelineConfig;
use crate::error::{Result, SheafError};
use crate::gate::FileGate;
use crate::ingest::Ingestor;
use crate::naming::PagePattern;
use crate::oracle::SeparatorOracle;
use crate::watch;

/// Owns the watcher and the ingestion worker for one drop folder.
///
/// `start` brings the whole pipeline up; `stop` detaches the watcher and
/// lets the worker drain. Assemblies dispatched before `stop` run to
/// completion on their own tasks.
pub struct SheafService {
    config: PipelineConfig,
    oracle: Arc<dyn SeparatorOracle>,
    writer: Arc<dyn ArtifactWriter>,
    running: Option<Running>,
}

struct Running {
    watcher: RecommendedWatcher,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for SheafService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheafService")
            .field("root", &self.config.root)
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl SheafService {
    pub fn new(
        config: PipelineConfig,
        oracle: Arc<dyn SeparatorOracle>,
        writer: Arc<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            config,
            oracle,
            writer,
            running: None,
        }
    }

    /// Create the drop folder if needed, attach the watcher, and start the
    /// ingestion worker. A no-op while already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }

        // The only fatal startup condition: no root directory, no pipeline.
        tokio::fs::create_dir_all(&self.config.root).await?;

        let pattern = PagePattern::new(&self.config.naming)?;
        let gate = FileGate::new();
        let assembler = Arc::new(Assembler::new(
            self.config.root.clone(),
            gate.clone(),
            Arc::clone(&self.writer),
        ));

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let root = self.config.root.clone();
        let watcher = tokio::task::spawn_blocking(move || watch::spawn_watcher(&root, tx))
            .await
            .map_err(|err| {
                SheafError::Internal(format!("watcher initialization panicked: {err}"))
            })??;

        let ingestor = Ingestor::new(
            rx,
            pattern,
            Arc::clone(&self.oracle),
            assembler,
            gate,
            self.config.clone(),
        );
        let worker = tokio::spawn(ingestor.run());

        info!(root = %self.config.root.display(), "sheaf pipeline started");
        self.running = Some(Running { watcher, worker });
        Ok(())
    }

    /// Stop watching and wait for the worker to drain. Any batch still in
    /// memory is flushed on the way out; in-flight assemblies are not
    /// interrupted.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        // Dropping the watcher releases its callback and with it the channel
        // sender; the worker sees the channel close and exits after a final
        // flush.
        drop(running.watcher);
        if let Err(err) = running.worker.await {
            warn!("ingestion worker ended abnormally: {err}");
        }
        info!("sheaf pipeline stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}
