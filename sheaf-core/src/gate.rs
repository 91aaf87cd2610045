use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Mutual-exclusion gate over the scan-file set.
///
/// Every read of page bytes for separator decoding and every delete or move
/// of a scan file must hold this gate, so the ingestion path and concurrent
/// assembly tasks never touch the same file at once. Strictly exclusive on
/// purpose: a read racing a delete on the same file is undefined behaviour,
/// and contention is low enough that a reader/writer split buys nothing.
#[derive(Clone, Debug, Default)]
pub struct FileGate {
    inner: Arc<Mutex<()>>,
}

impl FileGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the gate is free. Released when the guard drops.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.inner).lock_owned().await
    }
}
