//! Batch assembly.
//!
//! Each flushed batch is rendered into a single artifact on its own task,
//! independent of the ingestion worker and of any other in-flight assembly.
//! Failure never propagates: a broken batch is quarantined instead.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactError, ArtifactWriter};
use crate::gate::FileGate;
use crate::quarantine;

/// Subdirectory of the root that receives finished artifacts.
pub const RESULT_DIR: &str = "Result";

/// Date key shared by the `Result` and `Broken` trees.
pub(crate) fn date_key() -> String {
    Local::now().format("%d-%m-%y").to_string()
}

/// Renders one flushed batch into an artifact and deletes its source pages.
pub struct Assembler {
    root: PathBuf,
    gate: FileGate,
    writer: Arc<dyn ArtifactWriter>,
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("root", &self.root)
            .field("artifact_extension", &self.writer.extension())
            .finish()
    }
}

impl Assembler {
    pub fn new(root: PathBuf, gate: FileGate, writer: Arc<dyn ArtifactWriter>) -> Self {
        Self { root, gate, writer }
    }

    /// Assemble `pages` (already in page order) into one uniquely named
    /// artifact under the dated output directory.
    ///
    /// Never returns an error: on failure the batch is handed to quarantine
    /// and the partial output is cleaned up.
    pub async fn assemble(self: Arc<Self>, pages: Vec<PathBuf>) {
        let out_dir = self.root.join(RESULT_DIR).join(date_key());
        if let Err(err) = tokio::fs::create_dir_all(&out_dir).await {
            warn!(dir = %out_dir.display(), "failed to create output directory: {err}");
            quarantine::quarantine_batch(&self.root, &self.gate, pages, None, &err.to_string())
                .await;
            return;
        }

        let artifact = out_dir.join(format!("{}.{}", Uuid::new_v4(), self.writer.extension()));

        match self.render(&pages, &artifact).await {
            Ok(()) => {
                // Sources are only touched under the gate; rendering above
                // ran gate-free since nobody else deletes these files.
                let guard = self.gate.acquire().await;
                for page in &pages {
                    if let Err(err) = tokio::fs::remove_file(page).await {
                        warn!(path = %page.display(), "failed to delete assembled page: {err}");
                    }
                }
                drop(guard);
                info!(
                    artifact = %artifact.display(),
                    pages = pages.len(),
                    "batch assembled"
                );
            }
            Err(err) => {
                warn!(artifact = %artifact.display(), "assembly failed: {err}");
                let mut files = pages;
                files.push(artifact.clone());
                quarantine::quarantine_batch(&self.root, &self.gate, files, err.page, &err.message)
                    .await;
                cleanup_attempt(&artifact, &out_dir).await;
            }
        }
    }

    async fn render(&self, pages: &[PathBuf], dest: &Path) -> Result<(), ArtifactError> {
        let mut contents = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let bytes = tokio::fs::read(page).await.map_err(|err| {
                ArtifactError::page(index, format!("unreadable page {}: {err}", page.display()))
            })?;
            contents.push(bytes);
        }

        let writer = Arc::clone(&self.writer);
        let dest = dest.to_path_buf();
        match spawn_blocking(move || writer.write(&contents, &dest)).await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(ArtifactError::whole(format!(
                "artifact rendering panicked: {join_err}"
            ))),
        }
    }
}

/// Remove the failed attempt's artifact, then the dated directory if this
/// attempt was its only content. The directory is shared by every batch
/// assembled the same day, so the removal is non-recursive and best-effort.
async fn cleanup_attempt(artifact: &Path, out_dir: &Path) {
    match tokio::fs::remove_file(artifact).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %artifact.display(), "failed to remove partial artifact: {err}"),
    }
    if let Err(err) = tokio::fs::remove_dir(out_dir).await {
        debug!(dir = %out_dir.display(), "dated output directory kept: {err}");
    }
}
