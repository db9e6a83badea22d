//! Batch command: sync a folder of invoices to S3, analyze each document,
//! and write extracted records, reports, and a run summary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use futures_util::StreamExt;
use futures_util::stream;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use invox_aws::analysis::{AnalysisQuery, BlockSource};
use invox_aws::{BucketSync, DocumentAnalyzer};
use invox_core::InvoiceAssembler;

use crate::config::InvoxConfig;
use crate::report::{self, BatchOutcome};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Directory containing invoice PDFs
    input_dir: PathBuf,

    /// Glob filter applied to file names
    #[arg(long, default_value = "*.pdf")]
    pattern: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// S3 bucket for invoice uploads
    #[arg(short, long)]
    bucket: Option<String>,

    /// Number of documents analyzed concurrently
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Save each document's raw block set for offline re-extraction
    #[arg(long)]
    keep_blocks: bool,

    /// Skip the S3 sync step, assuming objects are already uploaded
    #[arg(long)]
    no_sync: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = InvoxConfig::load(config_path)?;
    if let Some(bucket) = &args.bucket {
        config.storage.bucket = bucket.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.output.output_dir = output_dir.clone();
    }
    if args.keep_blocks {
        config.output.keep_blocks = true;
    }
    if config.storage.bucket.is_empty() {
        anyhow::bail!("no S3 bucket configured; pass --bucket or set storage.bucket");
    }

    let files = matching_files(&args.input_dir, &args.pattern)?;
    if files.is_empty() {
        anyhow::bail!(
            "no files matching {} in {}",
            args.pattern,
            args.input_dir.display()
        );
    }

    println!(
        "{} Found {} invoice file(s) to process",
        style("ℹ").blue(),
        files.len()
    );

    fs::create_dir_all(&config.output.output_dir)?;

    let aws_config = invox_aws::load_config(config.storage.region.clone()).await;
    let sync = BucketSync::from_config(
        &aws_config,
        config.storage.bucket.clone(),
        config.storage.prefix.clone(),
    );

    if args.no_sync {
        debug!("sync skipped");
    } else {
        let report = sync.sync(&args.input_dir).await?;
        println!(
            "{} Synced: {} uploaded, {} unchanged, {} deleted",
            style("✓").green(),
            report.uploaded.len(),
            report.skipped.len(),
            report.deleted.len()
        );
    }

    let analyzer = DocumentAnalyzer::from_config(
        &aws_config,
        Duration::from_secs(config.analysis.poll_interval_secs),
        Duration::from_secs(config.analysis.max_wait_secs),
    )
    .with_queries(
        config
            .analysis
            .queries
            .iter()
            .map(|q| AnalysisQuery {
                text: q.text.clone(),
                alias: q.alias.clone(),
            })
            .collect(),
    );

    let jobs = args.jobs.unwrap_or(config.analysis.max_parallel).max(1);
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    // One failed document never aborts the rest of the batch.
    let mut outcomes: Vec<BatchOutcome> = stream::iter(files.iter())
        .map(|path| {
            let analyzer = &analyzer;
            let sync = &sync;
            let config = &config;
            let pb = &pb;
            async move {
                let file_start = Instant::now();
                let result = process_single(analyzer, sync, path, config).await;
                let elapsed_ms = file_start.elapsed().as_millis() as u64;
                pb.inc(1);

                let file = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("invoice")
                    .to_string();
                match result {
                    Ok(record) => BatchOutcome {
                        file,
                        record: Some(record),
                        error: None,
                        elapsed_ms,
                    },
                    Err(e) => {
                        warn!("failed to process {}: {}", path.display(), e);
                        BatchOutcome {
                            file,
                            record: None,
                            error: Some(e.to_string()),
                            elapsed_ms,
                        }
                    }
                }
            }
        })
        .buffer_unordered(jobs)
        .collect()
        .await;
    pb.finish_with_message("Complete");

    // Completion order is nondeterministic; the summary is not.
    outcomes.sort_by(|a, b| a.file.cmp(&b.file));

    let summary_path = config.output.output_dir.join("SUMMARY.md");
    fs::write(&summary_path, report::batch_summary(&outcomes))?;

    let succeeded = outcomes.iter().filter(|o| o.record.is_some()).count();
    let failed = outcomes.len() - succeeded;
    println!();
    println!(
        "{} Processed {} file(s) in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(succeeded).green(),
        style(failed).red()
    );
    println!("   Summary written to {}", summary_path.display());

    if failed > 0 {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in outcomes.iter().filter(|o| o.error.is_some()) {
            println!(
                "  - {}: {}",
                outcome.file,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Analyze one uploaded document and write its artifacts.
async fn process_single<S: BlockSource>(
    source: &S,
    sync: &BucketSync,
    path: &Path,
    config: &InvoxConfig,
) -> anyhow::Result<invox_core::InvoiceRecord> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("invoice");

    let key = sync.remote_key(name);
    let doc = source.fetch(sync.bucket(), &key).await?;
    let record = InvoiceAssembler::new().assemble(&doc);

    let out_dir = &config.output.output_dir;
    fs::write(
        out_dir.join(format!("{stem}_extracted.json")),
        serde_json::to_string_pretty(&record)?,
    )?;
    if config.output.keep_blocks {
        fs::write(out_dir.join(format!("{stem}_blocks.json")), doc.to_json()?)?;
    }
    if config.output.write_reports {
        fs::write(
            out_dir.join(format!("{stem}_report.md")),
            report::invoice_report(stem, &record),
        )?;
    }

    debug!("wrote artifacts for {}", name);
    Ok(record)
}

/// Files in the directory whose names match the glob pattern, sorted.
fn matching_files(dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let matcher = glob::Pattern::new(pattern)
        .map_err(|e| anyhow::anyhow!("invalid pattern {}: {}", pattern, e))?;
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::default()
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| matcher.matches_with(n, options));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
