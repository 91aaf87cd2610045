//! Terminal storage for batches that failed assembly.
//!
//! A quarantined batch is preserved for manual inspection and never
//! reprocessed. Nothing in here raises errors past logging: quarantine is
//! the last stop.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::assemble::date_key;
use crate::gate::FileGate;

/// Subdirectory of the root that receives quarantined batches.
pub const BROKEN_DIR: &str = "Broken";

const MAX_TAG_LEN: usize = 120;

/// Move a failed batch into a dated, uniquely named folder. The file at
/// `failed_index` is renamed with the error message prefixed so the folder
/// is self-describing; `None` means the failure was not page-specific.
/// Moves are serialized through the gate, one file at a time.
pub async fn quarantine_batch(
    root: &Path,
    gate: &FileGate,
    files: Vec<PathBuf>,
    failed_index: Option<usize>,
    message: &str,
) {
    let dir = root
        .join(BROKEN_DIR)
        .join(date_key())
        .join(Uuid::new_v4().to_string());
    if let Err(err) = tokio::fs::create_dir_all(&dir).await {
        warn!(dir = %dir.display(), "failed to create quarantine directory: {err}");
        return;
    }

    let tag = sanitize_tag(message);
    for (index, file) in files.iter().enumerate() {
        let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
            warn!(path = %file.display(), "quarantined file has no usable name, skipping");
            continue;
        };
        let target = if failed_index == Some(index) {
            dir.join(format!("{tag}_{name}"))
        } else {
            dir.join(name)
        };

        let guard = gate.acquire().await;
        let outcome = tokio::fs::rename(file, &target).await;
        drop(guard);

        if let Err(err) = outcome {
            warn!(path = %file.display(), "failed to move file into quarantine: {err}");
        }
    }

    info!(dir = %dir.display(), files = files.len(), "batch quarantined");
}

/// Error messages become part of a file name; keep them filesystem-safe and
/// bounded.
fn sanitize_tag(message: &str) -> String {
    let mut tag: String = message
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if tag.len() > MAX_TAG_LEN {
        let mut cut = MAX_TAG_LEN;
        while !tag.is_char_boundary(cut) {
            cut -= 1;
        }
        tag.truncate(cut);
    }
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(
            sanitize_tag("No such file: /scan/img_003.jpg"),
            "No such file- -scan-img_003.jpg"
        );
    }

    #[test]
    fn sanitize_bounds_length_on_char_boundaries() {
        let long = "ä".repeat(200);
        let tag = sanitize_tag(&long);
        assert!(tag.len() <= MAX_TAG_LEN);
        assert!(tag.chars().all(|c| c == 'ä'));
    }

    #[tokio::test]
    async fn quarantine_tags_only_the_failing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let gate = FileGate::new();

        let files: Vec<_> = (1..=3)
            .map(|i| root.join(format!("img_00{i}.jpg")))
            .collect();
        for file in &files {
            std::fs::write(file, b"page").unwrap();
        }

        quarantine_batch(root, &gate, files.clone(), Some(1), "torn page").await;

        for file in &files {
            assert!(!file.exists(), "{} should have been moved", file.display());
        }

        let dated = std::fs::read_dir(root.join(BROKEN_DIR))
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let batch_dir = std::fs::read_dir(dated).unwrap().next().unwrap().unwrap().path();
        let mut names: Vec<_> = std::fs::read_dir(batch_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["img_001.jpg", "img_003.jpg", "torn page_img_002.jpg"]);
    }
}
