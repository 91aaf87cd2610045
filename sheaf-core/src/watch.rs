//! Thin wrapper around `notify` for the drop folder.
//!
//! Raw creation notifications are forwarded into a bounded channel so rapid
//! arrivals queue up instead of overwriting each other; the ingestion worker
//! drains the channel one event at a time.

use std::path::Path;

use notify::event::{CreateKind, EventKind};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{Result, SheafError};
use crate::ingest::ScanEvent;

/// Attach a notify watcher to the drop folder, sending one [`ScanEvent`] per
/// created file into `tx`. Dropping the returned watcher stops the stream,
/// which in turn closes the channel once the callback is released.
pub fn spawn_watcher(root: &Path, tx: mpsc::Sender<ScanEvent>) -> Result<RecommendedWatcher> {
    let root_label = root.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                for scan_event in creation_events(event) {
                    if let Err(err) = tx.blocking_send(scan_event) {
                        warn!(
                            "scan event channel send failed for {}: {}",
                            root_label.display(),
                            err
                        );
                    }
                }
            }
            Err(err) => {
                warn!("watcher error on {}: {}", root_label.display(), err);
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| SheafError::Watch(format!("failed to create watcher: {err}")))?;

    watcher
        .watch(root, RecursiveMode::NonRecursive)
        .map_err(|err| {
            SheafError::Watch(format!("failed to watch {}: {err}", root.display()))
        })?;

    Ok(watcher)
}

fn creation_events(event: Event) -> Vec<ScanEvent> {
    if !matches!(
        event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
    ) {
        return Vec::new();
    }

    event
        .paths
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some(ScanEvent { path, name })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    #[test]
    fn only_creation_events_pass_through() {
        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/scan/img_001.jpg"));
        let events = creation_events(created);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "img_001.jpg");

        let removed = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/scan/img_001.jpg"));
        assert!(creation_events(removed).is_empty());
    }
}
