/*!
 * blobrelay CLI - Command Line Interface
 *
 * Copies one object (or a JSON batch of objects) from Google Cloud Storage
 * to Amazon S3 and prints the JSON outcome on stdout. Diagnostics go to
 * stderr or to the `--log` file.
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use blobrelay::{
    batch::{run_batch, BatchPayload},
    config::{LogLevel, RelayConfig},
    error::{RelayError, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    protocol::{SourceStore, TargetStore},
    request::{Flag, TransferRequest},
    transfer, TransferStatus,
};
use clap::{Parser, ValueEnum};
use tracing::info;

#[derive(Parser)]
#[command(name = "blobrelay")]
#[command(version, about = "Chunked, parallel, checksum-verified copy from GCS to S3", long_about = None)]
struct Cli {
    /// Source locator (gs://bucket/path); `{}` / `{:%Y-%m-%d}` expand to the current time
    #[arg(short = 's', long = "source", value_name = "URI", required_unless_present = "batch")]
    source: Option<String>,

    /// Target locator (s3://bucket/key)
    #[arg(short = 't', long = "target", value_name = "URI", required_unless_present = "batch")]
    target: Option<String>,

    /// Part size in bytes
    #[arg(short = 'c', long = "chunk-size", value_name = "BYTES")]
    chunk_size: Option<u64>,

    /// Maximum concurrent part workers (0 or 1 = sequential)
    #[arg(short = 'w', long = "max-workers", value_name = "N")]
    max_workers: Option<usize>,

    /// Attach CRC32C checksums (true/false, yes/no, y/n, 1/0)
    #[arg(short = 'k', long = "checksum", value_name = "FLAG")]
    checksum: Option<Flag>,

    /// KMS key id for server-side encryption of the target object
    #[arg(long = "kms-key", value_name = "KEY_ID")]
    kms_key: Option<String>,

    /// JSON batch payload to copy instead of a single object
    #[arg(long = "batch", value_name = "FILE", conflicts_with_all = ["source", "target"])]
    batch: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write logs (JSON) to this file instead of stderr
    #[arg(long = "log", value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Verbose output (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// S3 region
    #[arg(long = "s3-region", value_name = "REGION")]
    s3_region: Option<String>,

    /// Custom S3 endpoint (MinIO, LocalStack, ...)
    #[arg(long = "s3-endpoint", value_name = "URL")]
    s3_endpoint: Option<String>,

    /// Use path-style S3 addressing
    #[arg(long = "s3-path-style")]
    s3_path_style: bool,

    /// Leave the multipart session open when a part fails
    #[arg(long = "no-abort-on-failure")]
    no_abort_on_failure: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<RelayError>()
                .map(RelayError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    logging::init_logging(&config)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(execute(cli, config))
}

/// Config file first, then command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<RelayConfig> {
    let mut config = match cli.config {
        Some(ref path) => RelayConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => RelayConfig::default(),
    };

    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(max_workers) = cli.max_workers {
        config.max_workers = max_workers;
    }
    if let Some(checksum) = cli.checksum {
        config.checksum = checksum.get();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    if cli.verbose {
        config.verbose = true;
    }
    if cli.s3_region.is_some() {
        config.s3_region = cli.s3_region.clone();
    }
    if cli.s3_endpoint.is_some() {
        config.s3_endpoint = cli.s3_endpoint.clone();
    }
    if cli.s3_path_style {
        config.s3_force_path_style = true;
    }
    if cli.no_abort_on_failure {
        config.abort_on_failure = false;
    }

    Ok(config)
}

async fn execute(cli: Cli, config: RelayConfig) -> anyhow::Result<i32> {
    let (source, target) = cloud_stores(&config).await?;

    if let Some(ref batch_path) = cli.batch {
        let payload = BatchPayload::from_file(batch_path)?;
        info!("Running batch of {} object(s)", payload.objects.len());

        let response = run_batch(&payload, source, target, &config).await;
        println!("{}", serde_json::to_string_pretty(&response)?);

        return Ok(if response.has_problems() {
            EXIT_PARTIAL
        } else {
            EXIT_SUCCESS
        });
    }

    // clap enforces both locators when no batch is given
    let (Some(src), Some(dst)) = (cli.source, cli.target) else {
        return Err(RelayError::Config("--source and --target are required".to_string()).into());
    };

    let request = TransferRequest::builder(src, dst)
        .defaults_from(&config)
        .encryption_key(cli.kms_key)
        .expand_templates()?
        .build()?;

    let outcome = transfer(&request, source, target, &config).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(match outcome.status {
        TransferStatus::SizeMatched => EXIT_SUCCESS,
        _ => EXIT_PARTIAL,
    })
}

#[cfg(all(feature = "gcs-native", feature = "s3-native"))]
async fn cloud_stores(
    config: &RelayConfig,
) -> anyhow::Result<(Arc<dyn SourceStore>, Arc<dyn TargetStore>)> {
    use blobrelay::protocol::gcs::GcsSource;
    use blobrelay::protocol::s3::{S3Config, S3Target};

    let source: Arc<dyn SourceStore> = Arc::new(GcsSource::new());
    let target: Arc<dyn TargetStore> = Arc::new(S3Target::new(&S3Config::from(config)).await);
    Ok((source, target))
}

#[cfg(not(all(feature = "gcs-native", feature = "s3-native")))]
async fn cloud_stores(
    _config: &RelayConfig,
) -> anyhow::Result<(Arc<dyn SourceStore>, Arc<dyn TargetStore>)> {
    let missing: Vec<&str> = [
        ("gcs-native", cfg!(feature = "gcs-native")),
        ("s3-native", cfg!(feature = "s3-native")),
    ]
    .into_iter()
    .filter(|(_, enabled)| !enabled)
    .map(|(name, _)| name)
    .collect();

    Err(RelayError::Config(format!(
        "blobrelay was built without the {} feature(s); rebuild with --features cloud",
        missing.join(", ")
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "blobrelay",
            "-s",
            "gs://src/a.bin",
            "-t",
            "s3://dst/a.bin",
            "-c",
            "10485760",
            "-w",
            "8",
            "-k",
            "yes",
            "--no-abort-on-failure",
            "--log-level",
            "warn",
        ]);
        let config = build_config(&cli).unwrap();

        assert_eq!(config.chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.max_workers, 8);
        assert!(config.checksum);
        assert!(!config.abort_on_failure);
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_checksum_flag_rejected() {
        let result = Cli::try_parse_from([
            "blobrelay", "-s", "gs://a/b", "-t", "s3://c/d", "-k", "maybe",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_locators_required_without_batch() {
        assert!(Cli::try_parse_from(["blobrelay", "-s", "gs://a/b"]).is_err());
        assert!(Cli::try_parse_from(["blobrelay", "--batch", "objects.json"]).is_ok());
    }
}
