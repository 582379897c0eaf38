use anyhow::{Context, Result};
use clap::Parser;
use permafrost::objectstore::s3::S3ObjectStore;
use permafrost::objectstore::{ObjectStore, StorageClass};
use std::path::PathBuf;

/// Operational helper for inspecting and manually patching the remote
/// object set: list current objects, dump version history, print bucket
/// configuration, or push an ad hoc file/directory to a key.
#[derive(Debug, Parser)]
#[command(name = "s3")]
struct Args {
    s3url: String,

    #[arg(short = 'c', long, default_value = "DEEP_ARCHIVE")]
    class: String,

    #[arg(short = 'n', long)]
    dry_run: bool,

    /// List current objects under the prefix.
    #[arg(long, conflicts_with_all = ["versions", "dump", "upload", "file"])]
    list: bool,

    /// List current and noncurrent object versions.
    #[arg(long, conflicts_with_all = ["list", "dump", "upload", "file"])]
    versions: bool,

    /// Print the bucket's versioning/lifecycle/access configuration.
    #[arg(long, conflicts_with_all = ["list", "versions", "upload", "file"])]
    dump: bool,

    /// Upload every file under DIR to the corresponding key.
    #[arg(long, value_name = "DIR", conflicts_with_all = ["list", "versions", "dump"])]
    upload: Option<PathBuf>,

    /// Local file to upload; used with `--upload`'s single-file form when
    /// paired with an explicit remote key via `--key`.
    #[arg(long, requires = "upload")]
    file: Option<PathBuf>,

    /// Remote key to upload `--file` to.
    #[arg(long)]
    key: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let url = url::Url::parse(&args.s3url).with_context(|| format!("invalid s3 url: {}", args.s3url))?;
    let bucket = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("s3 url missing bucket"))?
        .to_string();
    let prefix = url.path().trim_start_matches('/').to_string();
    let store = S3ObjectStore::new(&bucket, &prefix, None)?;

    if args.list {
        let objects = store.list_current("")?;
        let mut keys: Vec<_> = objects.keys().collect();
        keys.sort();
        for key in keys {
            let info = &objects[key];
            println!("{key}\t{}\t{}", info.size, info.storage_class);
        }
    } else if args.versions {
        let (current, outdated) = store.list_versions("")?;
        println!("current: {} objects", current.len());
        for (key, versions) in outdated {
            println!("{key}: {} noncurrent version(s)", versions.len());
        }
    } else if args.dump {
        let config = store.get_bucket_config()?;
        println!("{config:#?}");
    } else if let Some(dir) = &args.upload {
        if let Some(file) = &args.file {
            let key = args
                .key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--file requires --key"))?;
            store.upload(file, &key, &StorageClass::new(args.class.clone()), args.dry_run)?;
        } else {
            for entry in walkdir_files(dir)? {
                let rel = entry.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/");
                store.upload(&entry, &rel, &StorageClass::new(args.class.clone()), args.dry_run)?;
            }
        }
    } else {
        anyhow::bail!("one of --list, --versions, --dump, --upload is required");
    }

    Ok(())
}

fn walkdir_files(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let names = permafrost::walker::list_files(dir)?;
    Ok(names.into_iter().map(|n| dir.join(n)).collect())
}
