//! Process command - extract an expense report from a single receipt.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use rcpt_core::{ReceiptExtractor, UploadedImage};

use crate::output::{render, OutputFormat};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Receipt image (JPEG, PNG or WebP)
    #[arg(default_value = "receipt.jpg")]
    input: PathBuf,

    /// Output file (default: expense_report.<format extension>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Don't write the output file, only print
    #[arg(long)]
    no_write: bool,

    /// Cross-check extracted amounts
    #[arg(long)]
    validate: bool,

    /// Print the model's raw answer
    #[arg(long)]
    raw: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = super::load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let image = UploadedImage::from_file(&args.input, config.server.max_upload_bytes)?;
    info!(
        "Processing {} ({} bytes, {})",
        args.input.display(),
        image.size(),
        image.mime
    );

    let extractor = ReceiptExtractor::from_config(&config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Extracting with {}...", extractor.model()));

    let result = extractor.extract(&image).await;
    pb.finish_and_clear();
    let extraction = result?;

    if args.raw {
        eprintln!("{}", style("Model answer:").dim());
        eprintln!("{}", extraction.raw_text);
        eprintln!();
    }

    if args.validate {
        match extraction.report() {
            Ok(report) => {
                let issues = report.validate();
                if !issues.is_empty() {
                    eprintln!("{}", style("Validation issues:").yellow());
                    for issue in &issues {
                        eprintln!("  - {}", issue);
                    }
                }
            }
            Err(e) => eprintln!("{} {}", style("Report does not match schema:").yellow(), e),
        }
    }

    let output = render(&extraction.data, args.format)?;
    println!("{}", output);

    if !args.no_write {
        let output_path = args
            .output
            .unwrap_or_else(|| default_output_path(args.format));
        fs::write(&output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    }

    debug!(
        "Total processing time: {:?} (model: {}ms)",
        start.elapsed(),
        extraction.processing_time_ms
    );

    Ok(())
}

fn default_output_path(format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("expense_report.{}", format.extension()))
}
