//! `taskscope extract`: show what the analyzer would read from a document.

use anyhow::Result;
use colored::Colorize;
use taskscope_core::extractor::{self, MediaFamily};

use crate::cli::ExtractArgs;

pub async fn execute(args: ExtractArgs) -> Result<()> {
    let media_type = args
        .media_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let text = extractor::extract_as(&args.file, &media_type, &name).await?;

    if let Some(family) = MediaFamily::detect(&media_type, &name) {
        eprintln!(
            "{} {} ({}, {} chars)",
            "✓".green(),
            name,
            family.as_str(),
            text.chars().count()
        );
    }
    println!("{}", text);
    Ok(())
}
