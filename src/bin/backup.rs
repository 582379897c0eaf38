use anyhow::{Context, Result};
use clap::Parser;
use permafrost::audit::RemoteAuditor;
use permafrost::database::BackupDatabase;
use permafrost::manifest::store::{self, ManifestStore};
use permafrost::objectstore::s3::S3ObjectStore;
use permafrost::objectstore::{ObjectStore, StorageClass};
use permafrost::packer::{Packer, DEFAULT_MIN_SIZE};
use permafrost::report::render_csv;
use permafrost::walker::list_files;
use std::path::PathBuf;

/// Back a local directory up to tiered object storage, deduplicating by
/// content hash and batching files into size-bounded archives.
#[derive(Debug, Parser)]
#[command(name = "backup")]
struct Args {
    /// Remote location, as scheme://bucket[/prefix].
    s3url: String,

    /// Input directory to back up. If omitted, only sync and audit run.
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Storage class archives are uploaded with.
    #[arg(short = 'c', long, default_value = "DEEP_ARCHIVE")]
    class: String,

    /// Do not upload anything; log what would happen.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Run the full remote audit, including bucket-policy checks.
    #[arg(short = 'v', long)]
    verify: bool,

    /// Minimum bytes to accumulate before flushing an archive.
    #[arg(long, default_value_t = DEFAULT_MIN_SIZE)]
    min_size: u64,

    #[arg(long, value_enum, default_value_t = Verbosity::Info)]
    verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity);

    let (bucket, prefix) = parse_s3_url(&args.s3url)?;
    let store = S3ObjectStore::new(&bucket, &prefix, None)
        .with_context(|| format!("connecting to {}", args.s3url))?;

    let cache_dir = store::cache_dir_for(&args.s3url)?;
    let manifests = ManifestStore::new(cache_dir, &store);

    tracing::info!("syncing local manifest cache");
    manifests.sync()?;

    let db = BackupDatabase::from_store(&manifests).context("building database from manifests")?;
    tracing::info!(entries = db.len(), "database loaded");

    if let Some(input) = &args.input {
        let files = list_files(input).with_context(|| format!("walking {}", input.display()))?;
        let mut packer = Packer::new(
            input.clone(),
            StorageClass::new(args.class.clone()),
            args.min_size,
            args.dry_run,
            &db,
            &store,
            &manifests,
        );
        let summary = packer.run(&files)?;
        tracing::info!(
            archives = summary.archives_written,
            packed = summary.files_packed,
            skipped = summary.files_skipped,
            "backup complete"
        );
    }

    let auditor = RemoteAuditor::new(&store, StorageClass::new(args.class.clone()));
    let report = auditor.run(args.verify)?;
    for w in &report.warnings {
        tracing::warn!("{w}");
    }
    for e in &report.errors {
        tracing::error!("{e}");
    }

    if args.input.is_some() {
        let db = BackupDatabase::from_store(&manifests)?;
        let csv = render_csv(&db)?;
        let report_name = format!("report/{}.csv", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
        let tmp = tempfile::NamedTempFile::new()?;
        std::fs::write(tmp.path(), &csv)?;
        store.upload(tmp.path(), &report_name, &StorageClass::new("STANDARD"), args.dry_run)?;
    }

    if !report.errors.is_empty() {
        tracing::warn!(count = report.errors.len(), "audit found errors");
    }

    Ok(())
}

fn parse_s3_url(raw: &str) -> Result<(String, String)> {
    let url = url::Url::parse(raw).with_context(|| format!("invalid s3 url: {raw}"))?;
    let bucket = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("s3 url missing bucket: {raw}"))?
        .to_string();
    let prefix = url.path().trim_start_matches('/').to_string();
    Ok((bucket, prefix))
}

fn init_logging(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Error => "error",
        Verbosity::Warn => "warn",
        Verbosity::Info => "info",
        Verbosity::Debug => "debug",
        Verbosity::Trace => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()),
        ))
        .init();
}
