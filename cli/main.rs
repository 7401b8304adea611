use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genc::config::Config;
use genc::file_ops::{default_destination, encrypted_path};
use genc::{decrypt_file, encrypt_file, DecryptOptions, EncryptOptions, TruncationPolicy};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// genc - Encrypt and decrypt files with a passphrase (Argon2id + AES-256-GCM)
#[derive(Parser)]
#[command(name = "genc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt files into <file>.genc
    Encrypt {
        /// File to encrypt (repeat for several files)
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Encryption passphrase
        #[arg(short, long, env = "GENC_PASSPHRASE", hide_env_values = true)]
        passphrase: String,

        /// Remove the original file after encryption
        #[arg(long)]
        delete_origin: bool,
    },

    /// Decrypt .genc files
    Decrypt {
        /// File to decrypt (repeat for several files)
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Decryption passphrase
        #[arg(short, long, env = "GENC_PASSPHRASE", hide_env_values = true)]
        passphrase: String,

        /// Output file path (single input only)
        #[arg(short, long)]
        outpath: Option<PathBuf>,

        /// Fail on truncated containers instead of keeping the complete chunks
        #[arg(long)]
        strict: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Encrypt { .. } => "encrypt",
            Commands::Decrypt { .. } => "decrypt",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Use RUST_LOG to control log level (e.g., RUST_LOG=genc=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = cli.command.name(), "genc starting");

    let cfg = Config::load_with_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Encrypt {
            files,
            passphrase,
            delete_origin,
        } => {
            let mut opts = cfg.encrypt_options();
            if delete_origin {
                opts = opts.with_delete_origin(true);
            }
            cmd_encrypt(&cfg, files, passphrase, opts).await
        }

        Commands::Decrypt {
            files,
            passphrase,
            outpath,
            strict,
        } => {
            let mut opts = cfg.decrypt_options();
            if strict {
                opts = opts.with_truncation(TruncationPolicy::Strict);
            }
            if let Some(out) = outpath {
                opts = opts.with_out_path(out);
            }
            cmd_decrypt(files, passphrase, opts).await
        }
    }
}

fn create_spinner(progress: &MultiProgress, message: String) -> Result<ProgressBar> {
    let pb = progress.add(ProgressBar::new_spinner());
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Input must be an existing, readable regular file
fn check_input(file: &Path, verb: &str) -> Result<()> {
    let meta = fs::metadata(file)
        .with_context(|| format!("cannot access file {}", file.display()))?;
    if meta.is_dir() {
        anyhow::bail!("cannot {} directories: {}", verb, file.display());
    }
    fs::File::open(file).with_context(|| format!("file is not readable: {}", file.display()))?;
    Ok(())
}

fn check_output_dir(out: &Path) -> Result<()> {
    match out.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            let meta = fs::metadata(dir)
                .with_context(|| format!("output directory does not exist: {}", dir.display()))?;
            if !meta.is_dir() {
                anyhow::bail!("output directory path is not a directory: {}", dir.display());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Drop repeated inputs and reject any whose output would land on another
/// input or on another input's output. Paths are compared canonicalized.
fn dedup_inputs<F>(files: Vec<PathBuf>, destination: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> PathBuf,
{
    let mut sources = HashSet::new();
    let mut unique = Vec::with_capacity(files.len());
    for file in files {
        let canonical = fs::canonicalize(&file)
            .with_context(|| format!("cannot access file {}", file.display()))?;
        if sources.insert(canonical.clone()) {
            unique.push((file, canonical));
        } else {
            warn!(file = %file.display(), "skipping duplicate input");
        }
    }

    let mut destinations = HashSet::new();
    for (file, canonical) in &unique {
        let dest = destination(canonical);
        if sources.contains(&dest) || !destinations.insert(dest.clone()) {
            anyhow::bail!(
                "output {} for {} collides with another input or output",
                dest.display(),
                file.display()
            );
        }
    }

    Ok(unique.into_iter().map(|(file, _)| file).collect())
}

/// Encrypt each file on the blocking pool, one independent call per file
async fn cmd_encrypt(
    cfg: &Config,
    files: Vec<PathBuf>,
    passphrase: String,
    opts: EncryptOptions,
) -> Result<()> {
    cfg.check_passphrase(&passphrase)?;
    for file in &files {
        check_input(file, "encrypt")?;
    }
    let files = dedup_inputs(files, encrypted_path)?;

    let total = files.len();
    let passphrase = Arc::new(passphrase);
    let progress = MultiProgress::new();
    let mut tasks = JoinSet::new();

    for file in files {
        let spinner = create_spinner(&progress, format!("Encrypting {}...", file.display()))?;
        let passphrase = Arc::clone(&passphrase);
        let opts = opts.clone();
        tasks.spawn_blocking(move || {
            let result = encrypt_file(&passphrase, &file, &opts);
            (file, spinner, result)
        });
    }

    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        let (file, spinner, result) = joined.context("encryption task panicked")?;
        spinner.finish_and_clear();

        match result {
            Ok(summary) => progress.suspend(|| {
                println!(
                    "successfully encrypted: {} -> {}",
                    summary.source.display(),
                    summary.destination.display()
                );
                if summary.origin_removed {
                    println!("original file deleted: {}", summary.source.display());
                }
            }),
            Err(e) if !e.is_fatal() => {
                warn!(file = %file.display(), error = %e, "encrypted but original kept");
                progress.suspend(|| {
                    println!(
                        "successfully encrypted: {} -> {}",
                        file.display(),
                        encrypted_path(&file).display()
                    );
                    eprintln!("warning: {}", e);
                });
            }
            Err(e) => {
                failed += 1;
                progress.suspend(|| eprintln!("encryption failed: {}: {}", file.display(), e));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed to encrypt", failed, total);
    }
    Ok(())
}

async fn cmd_decrypt(files: Vec<PathBuf>, passphrase: String, opts: DecryptOptions) -> Result<()> {
    if passphrase.is_empty() {
        anyhow::bail!("passphrase cannot be empty");
    }

    for file in &files {
        check_input(file, "decrypt")?;
        if opts.out_path.is_none() && default_destination(file) == *file {
            anyhow::bail!(
                "file must have .genc extension: {} (or pass --outpath)",
                file.display()
            );
        }
    }
    let files = dedup_inputs(files, |file| {
        opts
            .out_path
            .clone()
            .unwrap_or_else(|| default_destination(file))
    })?;

    match &opts.out_path {
        Some(_) if files.len() > 1 => {
            anyhow::bail!("--outpath can only be used with a single input file")
        }
        Some(out) => check_output_dir(out)?,
        None => {}
    }

    let total = files.len();
    let passphrase = Arc::new(passphrase);
    let progress = MultiProgress::new();
    let mut tasks = JoinSet::new();

    for file in files {
        let spinner = create_spinner(&progress, format!("Decrypting {}...", file.display()))?;
        let passphrase = Arc::clone(&passphrase);
        let opts = opts.clone();
        tasks.spawn_blocking(move || {
            let result = decrypt_file(&passphrase, &file, &opts);
            (file, spinner, result)
        });
    }

    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        let (file, spinner, result) = joined.context("decryption task panicked")?;
        spinner.finish_and_clear();

        match result {
            Ok(summary) => progress.suspend(|| {
                if let Some(backup) = &summary.backup {
                    println!("existing output backed up to: {}", backup.display());
                }
                if summary.truncated {
                    eprintln!(
                        "warning: {} ends mid-chunk; only {} complete chunk(s) recovered",
                        summary.source.display(),
                        summary.chunks
                    );
                }
                println!(
                    "successfully decrypted: {} -> {}",
                    summary.source.display(),
                    summary.destination.display()
                );
            }),
            Err(e) => {
                failed += 1;
                progress.suspend(|| eprintln!("decryption failed: {}: {}", file.display(), e));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed to decrypt", failed, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_repeated_inputs_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.txt");
        fs::write(&file, b"notes").unwrap();
        let other = tmp.path().join("other.txt");
        fs::write(&other, b"other").unwrap();

        let files = vec![
            file.clone(),
            tmp.path().join(".").join("notes.txt"),
            other.clone(),
            file.clone(),
        ];
        let unique = dedup_inputs(files, encrypted_path).unwrap();
        assert_eq!(unique, vec![file, other]);
    }

    #[test]
    fn test_output_landing_on_input_rejected() {
        let tmp = TempDir::new().unwrap();
        let plain = tmp.path().join("notes.txt");
        fs::write(&plain, b"notes").unwrap();
        let container = tmp.path().join("notes.txt.genc");
        fs::write(&container, b"genc").unwrap();

        // notes.txt encrypts onto notes.txt.genc, which is also an input
        assert!(dedup_inputs(vec![plain, container.clone()], encrypted_path).is_err());
        assert!(dedup_inputs(vec![container], encrypted_path).is_ok());
    }

    #[test]
    fn test_shared_destination_rejected() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.genc");
        let b = tmp.path().join("b.genc");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let out = tmp.path().join("out.txt");

        assert!(dedup_inputs(vec![a.clone(), b.clone()], |_| out.clone()).is_err());
        assert_eq!(
            dedup_inputs(vec![a.clone(), b.clone()], default_destination).unwrap(),
            vec![a, b]
        );
    }
}
