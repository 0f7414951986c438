//! Batch processing command for multiple receipt images.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{debug, error, warn};

use rcpt_core::{ExpenseReport, ImageMime, ReceiptExtractor, UploadedImage};

use crate::output::{render, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory (default: next to each input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    data: Option<Value>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = super::load_config(config_path)?;

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| ImageMime::from_path(p).is_some())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching receipt images found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} receipts to process",
        style("ℹ").blue(),
        files.len()
    );

    // One backend for the whole run
    let extractor = ReceiptExtractor::from_config(&config)?;

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} receipts")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());

    for path in files {
        let file_start = Instant::now();
        let result = process_single_file(&path, &extractor, config.server.max_upload_bytes)
            .await
            .and_then(|data| write_output(&path, &data, &args).map(|()| data));
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(data) => {
                results.push(ProcessResult {
                    path,
                    data: Some(data),
                    error: None,
                    processing_time_ms,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(ProcessResult {
                        path,
                        data: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    pb.abandon();
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Processed {} receipts in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn process_single_file(
    path: &Path,
    extractor: &ReceiptExtractor,
    limit: usize,
) -> anyhow::Result<Value> {
    let image = UploadedImage::from_file(path, limit)?;
    let extraction = extractor.extract(&image).await?;
    debug!(
        "{} extracted in {}ms",
        path.display(),
        extraction.processing_time_ms
    );
    Ok(extraction.data)
}

/// Output path for an input: `<stem>.<ext>` in the output directory or
/// next to the input.
fn output_path(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("receipt");
    let name = format!("{}.{}", stem, format.extension());

    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn write_output(input: &Path, data: &Value, args: &BatchArgs) -> anyhow::Result<()> {
    let path = output_path(input, args.output_dir.as_deref(), args.format);
    fs::write(&path, render(data, args.format)?)?;
    debug!("Wrote output to {}", path.display());
    Ok(())
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "merchant",
        "date",
        "total",
        "currency",
        "category",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let report = result
            .data
            .as_ref()
            .map(|d| ExpenseReport::from_value(d).unwrap_or_default());

        if let Some(report) = report {
            wtr.write_record([
                filename,
                "success",
                report.receipt_info.merchant_name.as_deref().unwrap_or(""),
                report.receipt_info.date.as_deref().unwrap_or(""),
                &report.totals.total.map(|t| t.to_string()).unwrap_or_default(),
                report.currency().unwrap_or(""),
                report.expense_category.as_deref().unwrap_or(""),
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("scans/lunch.jpg"), None, OutputFormat::Json),
            PathBuf::from("scans/lunch.json")
        );
        assert_eq!(
            output_path(Path::new("scans/lunch.jpg"), Some(Path::new("out")), OutputFormat::Csv),
            PathBuf::from("out/lunch.csv")
        );
    }

    #[test]
    fn test_write_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let results = vec![
            ProcessResult {
                path: PathBuf::from("a.jpg"),
                data: Some(json!({
                    "receipt_info": { "merchant_name": "Deli", "date": "2024-01-02" },
                    "totals": { "total": 9.5, "currency": "EUR" },
                    "expense_category": "Meals & Entertainment"
                })),
                error: None,
                processing_time_ms: 120,
            },
            ProcessResult {
                path: PathBuf::from("b.png"),
                data: None,
                error: Some("quota exceeded".to_string()),
                processing_time_ms: 30,
            },
        ];

        write_summary(&path, &results).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "a.jpg,success,Deli,2024-01-02,9.5,EUR,Meals & Entertainment,120,");
        assert_eq!(lines[2], "b.png,error,,,,,,30,quota exceeded");
    }
}
