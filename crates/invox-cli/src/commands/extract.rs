//! Extract command: re-run the extraction engine on block sets saved by
//! `batch --keep-blocks`. Runs entirely offline.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use glob::glob;
use tracing::debug;

use invox_core::{Document, InvoiceAssembler};

use crate::report;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Saved block-set JSON files or a glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory; defaults next to each input file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also write a markdown report per invoice
    #[arg(long)]
    report: bool,
}

pub async fn run(args: ExtractArgs, _config_path: Option<&str>) -> anyhow::Result<()> {
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    if files.is_empty() {
        anyhow::bail!("no files matching pattern: {}", args.input);
    }

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
    }

    let assembler = InvoiceAssembler::new();
    for path in &files {
        let out_dir = args
            .output_dir
            .clone()
            .or_else(|| path.parent().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let record_path = extract_file(&assembler, path, &out_dir, args.report)?;

        debug!("extracted {}", path.display());
        println!(
            "{} {} -> {}",
            style("✓").green(),
            path.display(),
            record_path.display()
        );
    }

    println!();
    println!(
        "{} Extracted {} record(s)",
        style("✓").green(),
        files.len()
    );
    Ok(())
}

/// Decode one saved block set and write the record, plus a report when
/// asked. Returns the record path.
fn extract_file(
    assembler: &InvoiceAssembler,
    path: &Path,
    out_dir: &Path,
    write_report: bool,
) -> anyhow::Result<PathBuf> {
    let data = fs::read_to_string(path)?;
    let doc = Document::from_json(&data)
        .map_err(|e| anyhow::anyhow!("failed to decode {}: {}", path.display(), e))?;
    let record = assembler.assemble(&doc);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("invoice");
    let stem = stem.strip_suffix("_blocks").unwrap_or(stem);

    let record_path = out_dir.join(format!("{stem}_extracted.json"));
    fs::write(&record_path, serde_json::to_string_pretty(&record)?)?;
    if write_report {
        fs::write(
            out_dir.join(format!("{stem}_report.md")),
            report::invoice_report(stem, &record),
        )?;
    }
    Ok(record_path)
}

#[cfg(test)]
mod tests {
    use invox_core::{Geometry, RawBlock, TextLine};

    use super::*;

    fn saved_blocks(dir: &Path) -> PathBuf {
        let doc = Document::new(vec![RawBlock::Line(TextLine {
            text: "Total: $93.50".to_string(),
            geometry: Geometry {
                page: 1,
                left: 0.1,
                top: 0.8,
                width: 0.3,
                height: 0.02,
            },
            confidence: 99.0,
        })]);
        let path = dir.join("inv-1_blocks.json");
        fs::write(&path, doc.to_json().unwrap()).unwrap();
        path
    }

    #[test]
    fn report_is_written_only_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let input = saved_blocks(dir.path());
        let assembler = InvoiceAssembler::new();

        extract_file(&assembler, &input, dir.path(), false).unwrap();
        assert!(dir.path().join("inv-1_extracted.json").exists());
        assert!(!dir.path().join("inv-1_report.md").exists());

        extract_file(&assembler, &input, dir.path(), true).unwrap();
        assert!(dir.path().join("inv-1_report.md").exists());
    }
}
