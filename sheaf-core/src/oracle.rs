//! Separator detection boundary.
//!
//! A batch ends when a page carries a recognizable separator marking. The
//! ingestion worker only knows the [`SeparatorOracle`] trait; the production
//! implementation decodes the page with `image` and scans it for any barcode
//! with `rxing`.

use std::io;
use std::path::Path;

use rxing::common::HybridBinarizer;
use rxing::{BinaryBitmap, Luma8LuminanceSource, MultiFormatReader, Reader};
use tracing::debug;

use crate::config::RetryConfig;
use crate::error::{Result, SheafError};
use crate::gate::FileGate;

/// Reports whether an image contains a separator marking.
///
/// Synchronous and potentially expensive; callers run it on a blocking
/// thread.
pub trait SeparatorOracle: Send + Sync {
    fn detect(&self, bytes: &[u8]) -> Result<bool>;
}

/// Production oracle: any decodable barcode counts as a separator.
#[derive(Clone, Copy, Debug, Default)]
pub struct BarcodeOracle;

impl SeparatorOracle for BarcodeOracle {
    fn detect(&self, bytes: &[u8]) -> Result<bool> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|err| SheafError::Oracle(format!("image decode failed: {err}")))?;
        let luma = decoded.to_luma8();
        let (width, height) = luma.dimensions();

        let source = Luma8LuminanceSource::new(luma.into_raw(), width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        let mut reader = MultiFormatReader::default();
        match reader.decode(&mut bitmap) {
            Ok(result) => {
                debug!(format = ?result.getBarcodeFormat(), "separator barcode found");
                Ok(true)
            }
            // The normal miss: the page is just a page.
            Err(err) => {
                debug!("no separator barcode found: {err}");
                Ok(false)
            }
        }
    }
}

/// Read a page's bytes for decoding while holding the gate.
///
/// The scanner may still have the file open when its creation event fires,
/// so lock-flavored errors are retried with a fixed backoff instead of
/// failing the pipeline. The gate is held only across each read attempt,
/// never across a backoff sleep.
pub async fn read_page_bytes(path: &Path, gate: &FileGate, retry: &RetryConfig) -> Result<Vec<u8>> {
    tokio::time::sleep(retry.settle()).await;

    // The closure captures owned copies: rustc cannot prove `Send` for its
    // futures when the captures are borrowed (higher-ranked lifetime limit).
    let path = path.to_path_buf();
    let gate = gate.clone();
    read_with_retry(retry, async move || {
        let guard = gate.acquire().await;
        let outcome = tokio::fs::read(&path).await;
        drop(guard);
        outcome
    })
    .await
    .map_err(SheafError::Io)
}

async fn read_with_retry<F>(retry: &RetryConfig, mut read: F) -> io::Result<Vec<u8>>
where
    F: AsyncFnMut() -> io::Result<Vec<u8>>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match read().await {
            Ok(bytes) => return Ok(bytes),
            Err(err) if is_transient(&err) && attempt < max_attempts => {
                debug!(attempt, "page still locked by its writer, backing off");
                attempt += 1;
                tokio::time::sleep(retry.backoff()).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use tempfile::tempdir;

    fn png_with(pixel: image::Rgb<u8>) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        let img = image::RgbImage::from_pixel(64, 64, pixel);
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn blank_page_has_no_separator() {
        let found = BarcodeOracle.detect(&png_with(image::Rgb([255, 255, 255]))).unwrap();
        assert!(!found);
    }

    #[test]
    fn garbage_bytes_are_an_oracle_error() {
        assert!(BarcodeOracle.detect(b"definitely not an image").is_err());
    }

    #[tokio::test]
    async fn read_returns_bytes_for_settled_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("img_001.jpg");
        tokio::fs::write(&path, b"page bytes").await.unwrap();

        let retry = RetryConfig {
            max_attempts: 2,
            backoff_ms: 1,
            settle_ms: 0,
        };
        let bytes = read_page_bytes(&path, &FileGate::new(), &retry).await.unwrap();
        assert_eq!(bytes, b"page bytes");
    }

    #[tokio::test]
    async fn locked_file_is_retried_until_the_writer_lets_go() {
        let retry = RetryConfig {
            max_attempts: 5,
            backoff_ms: 1,
            settle_ms: 0,
        };
        let mut attempts = 0u32;
        let bytes = read_with_retry(&retry, async || {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "still open"))
            } else {
                Ok(b"page bytes".to_vec())
            }
        })
        .await
        .unwrap();
        assert_eq!(bytes, b"page bytes");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn lock_retries_stop_after_max_attempts() {
        let retry = RetryConfig {
            max_attempts: 3,
            backoff_ms: 1,
            settle_ms: 0,
        };
        let mut attempts = 0u32;
        let err = read_with_retry(&retry, async || {
            attempts += 1;
            Err::<Vec<u8>, _>(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "scanner holds the file",
            ))
        })
        .await
        .unwrap_err();
        assert_eq!(attempts, 3);
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_on_the_first_attempt() {
        let retry = RetryConfig {
            max_attempts: 5,
            backoff_ms: 1,
            settle_ms: 0,
        };
        let mut attempts = 0u32;
        let err = read_with_retry(&retry, async || {
            attempts += 1;
            Err::<Vec<u8>, _>(io::Error::new(io::ErrorKind::NotFound, "gone"))
        })
        .await
        .unwrap_err();
        assert_eq!(attempts, 1);
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn missing_file_is_not_retried_forever() {
        let dir = tempdir().unwrap();
        let retry = RetryConfig {
            max_attempts: 3,
            backoff_ms: 1,
            settle_ms: 0,
        };
        let err = read_page_bytes(&dir.path().join("gone.jpg"), &FileGate::new(), &retry)
            .await
            .unwrap_err();
        assert!(matches!(err, SheafError::Io(_)));
    }
}
