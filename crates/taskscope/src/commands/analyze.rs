//! `taskscope analyze`: run the full pipeline over local documents.
//!
//! Files are analyzed in place. Nothing is copied into the upload directory
//! and the workshop lives only for the duration of the command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use taskscope_core::extractor::{ACCEPTED_EXTENSIONS, is_accepted_extension};
use taskscope_core::types::{AutomationLevel, FileStatus, NewWorkshop, Task, Workshop, WorkshopFile};
use taskscope_core::upload::StoredUpload;
use taskscope_core::{
    AnalysisEngine, AnalysisEvent, AnalysisOptions, AnalysisSummary, InMemoryWorkshopStore,
    ResponseCache, WorkshopOrchestrator,
};
use tokio::sync::mpsc;
use tracing::debug;

use super::open_cache;
use crate::cli::AnalyzeArgs;
use crate::config::Config;

/// Everything `--json` prints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub workshop: Workshop,
    pub summary: AnalysisSummary,
    pub files: Vec<WorkshopFile>,
    pub tasks: Vec<Task>,
}

pub async fn execute(args: AnalyzeArgs, config: &Config) -> Result<()> {
    let uploads = collect_files(&args.files, config.pipeline.upload.max_file_size)?;
    debug!(files = uploads.len(), domains = ?args.domains, "Collected input files");

    let cache = if args.no_cache {
        Arc::new(ResponseCache::disabled())
    } else {
        open_cache(config)?
    };
    let engine = AnalysisEngine::from_config(config.pipeline.analysis.clone(), cache)?;
    if !engine.uses_provider() && !args.json {
        eprintln!(
            "{} ANTHROPIC_API_KEY not set, using keyword heuristics",
            "○".yellow()
        );
    }

    let orchestrator =
        WorkshopOrchestrator::new(Arc::new(InMemoryWorkshopStore::new()), Arc::new(engine));
    let input = NewWorkshop {
        name: args.name.unwrap_or_default(),
        domains: args.domains,
        participant_count: args.participants,
    };

    let bar = if args.json {
        ProgressBar::hidden()
    } else {
        progress_bar()?
    };
    let report = run(&orchestrator, input, uploads, &bar).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Check each path and describe it as an upload the orchestrator can attach.
pub fn collect_files(paths: &[impl AsRef<Path>], max_file_size: u64) -> Result<Vec<StoredUpload>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if !meta.is_file() {
            bail!("{} is not a file", path.display());
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_accepted_extension(&name) {
            bail!(
                "unsupported file type: {} (accepted: {})",
                name,
                ACCEPTED_EXTENSIONS.join(", ")
            );
        }
        if meta.len() > max_file_size {
            bail!(
                "{} is {} bytes, over the {} byte limit",
                name,
                meta.len(),
                max_file_size
            );
        }

        uploads.push(StoredUpload {
            original_name: name,
            stored_path: path.to_path_buf(),
            // Generic type: the extension decides the parser
            media_type: "application/octet-stream".to_string(),
            size: meta.len(),
        });
    }
    Ok(uploads)
}

/// Create a workshop over `uploads`, analyze it, and gather the results.
pub async fn run(
    orchestrator: &WorkshopOrchestrator,
    input: NewWorkshop,
    uploads: Vec<StoredUpload>,
    bar: &ProgressBar,
) -> Result<AnalysisReport> {
    let workshop = orchestrator.create_workshop(input)?;
    orchestrator.attach_files(&workshop.id, uploads)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<AnalysisEvent>();
    let progress = bar.clone();
    let consumer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AnalysisEvent::Progress { percent, message } => {
                    progress.set_position(u64::from(percent));
                    progress.set_message(message);
                }
                AnalysisEvent::FileStarted { filename, .. } => {
                    progress.set_message(format!("Reading {}", filename));
                }
                AnalysisEvent::TaskFound { task } => {
                    progress.set_message(format!("Found: {}", task.title));
                }
                AnalysisEvent::FileCompleted {
                    filename,
                    task_count,
                    ..
                } => {
                    progress.println(format!(
                        "  {} {} ({} tasks)",
                        "✓".green(),
                        filename,
                        task_count
                    ));
                }
            }
        }
    });

    let result = orchestrator
        .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &tx)
        .await;
    drop(tx);
    let _ = consumer.await;
    bar.finish_and_clear();

    let summary = result.context("analysis failed")?;
    Ok(AnalysisReport {
        workshop: orchestrator.get_workshop(&workshop.id)?,
        files: orchestrator.workshop_files(&workshop.id)?,
        tasks: orchestrator.workshop_tasks(&workshop.id)?,
        summary,
    })
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(bar)
}

fn print_report(report: &AnalysisReport) {
    println!();
    println!(
        "{} {}",
        "Workshop".cyan().bold(),
        report.workshop.name.bold()
    );
    println!("  Domains: {}", report.workshop.domains.join(", "));
    println!("{}", "─".repeat(60));

    if report.tasks.is_empty() {
        println!("  {}", "No tasks found".yellow());
    }

    for (i, task) in report.tasks.iter().enumerate() {
        println!();
        println!(
            "  {:>2}. {}  {}",
            i + 1,
            task.title.bold(),
            format!("[{}]", task.category).cyan()
        );
        println!(
            "      {}h per run · {} · automation {}",
            task.time_spent,
            task.frequency,
            automation_label(task.automation)
        );
        if !task.description.is_empty() {
            println!("      {}", task.description.dimmed());
        }
        if !task.automation_method.is_empty() {
            println!("      → {}", task.automation_method);
        }
        println!("      {}", task.source_filename.dimmed());
    }

    for file in report.files.iter().filter(|f| f.status == FileStatus::Error) {
        println!();
        println!("  {} {} could not be analyzed", "✗".red(), file.original_name);
    }

    println!();
    println!("{}", "─".repeat(60));
    println!(
        "  {} tasks from {} files ({} failed)",
        report.summary.total_tasks.to_string().bold(),
        report.summary.total_files,
        report.summary.failed_files
    );
}

fn automation_label(level: AutomationLevel) -> colored::ColoredString {
    match level {
        AutomationLevel::High => level.as_str().green(),
        AutomationLevel::Medium => level.as_str().yellow(),
        AutomationLevel::Low => level.as_str().red(),
    }
}
