//! # Sheaf Server
//!
//! Service host for the sheaf scan pipeline: watches a scanner drop folder,
//! groups numbered page images into documents, and binds each document into
//! a PDF artifact. Batches that cannot be assembled land in a dated
//! quarantine folder instead of being lost.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sheaf_core::artifact::PdfWriter;
use sheaf_core::oracle::BarcodeOracle;
use sheaf_core::{PipelineConfig, SheafService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "sheaf-server",
    about = "Scan drop-folder batch assembly service"
)]
struct Cli {
    /// Watched drop folder; created if absent.
    #[arg(long, env = "SHEAF_ROOT")]
    root: Option<PathBuf>,

    /// Optional TOML configuration file. CLI flags override its values.
    #[arg(long, env = "SHEAF_CONFIG")]
    config: Option<PathBuf>,

    /// Override for the idle flush timeout, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut service = SheafService::new(config, Arc::new(BarcodeOracle), Arc::new(PdfWriter));
    service.start().await.context("failed to start pipeline")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    service.stop().await;

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => {
            let root = cli
                .root
                .clone()
                .context("either --root or --config is required")?;
            PipelineConfig::new(root)
        }
    };

    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.idle_flush_ms = secs.saturating_mul(1_000);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("sheaf-server").chain(args.iter().copied()))
    }

    #[test]
    fn root_flag_alone_builds_default_config() {
        let config = load_config(&cli(&["--root", "/tmp/scans"])).unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/scans"));
        assert_eq!(config.idle_flush_ms, 500_000);
        assert_eq!(config.naming.prefix, "img_");
    }

    #[test]
    fn config_file_values_are_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheaf.toml");
        std::fs::write(
            &path,
            "root = \"/data/scans\"\nidle_flush_ms = 1000\n\n[naming]\nprefix = \"scan_\"\nindex_width = 4\nextensions = [\"png\"]\n",
        )
        .unwrap();

        let config = load_config(&cli(&[
            "--config",
            path.to_str().unwrap(),
            "--timeout-secs",
            "30",
        ]))
        .unwrap();
        assert_eq!(config.root, PathBuf::from("/data/scans"));
        assert_eq!(config.idle_flush_ms, 30_000);
        assert_eq!(config.naming.index_width, 4);
    }

    #[test]
    fn partial_config_tables_keep_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheaf.toml");
        std::fs::write(
            &path,
            "root = \"/data/scans\"\n\n[naming]\nprefix = \"scan_\"\n\n[retry]\nmax_attempts = 2\n",
        )
        .unwrap();

        let config = load_config(&cli(&["--config", path.to_str().unwrap()])).unwrap();
        assert_eq!(config.naming.prefix, "scan_");
        assert_eq!(config.naming.index_width, 3);
        assert_eq!(config.naming.extensions, ["jpg", "png", "bmp"]);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.backoff_ms, 100);
        assert_eq!(config.retry.settle_ms, 100);
    }

    #[test]
    fn missing_root_and_config_is_an_error() {
        assert!(load_config(&cli(&[])).is_err());
    }
}
