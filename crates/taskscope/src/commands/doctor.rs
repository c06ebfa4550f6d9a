//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;
use taskscope_core::cache::SqliteCacheBackend;
use taskscope_core::extractor::ACCEPTED_EXTENSIONS;

use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    println!("{}", "taskscope Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    if config.config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check data directory
    print!("  Data directory: ");
    if config.data_dir.exists() {
        println!("{}", format!("✓ {}", config.data_dir.display()).green());
    } else {
        println!("{}", "○ will be created".yellow());
    }

    // Check response cache
    print!("  Response cache: ");
    if !config.pipeline.cache.enabled {
        println!("{}", "○ disabled".yellow());
    } else if !config.cache_db.exists() {
        println!("{}", "○ not created yet".yellow());
    } else {
        match SqliteCacheBackend::open_path(&config.cache_db).and_then(|db| db.ping()) {
            Ok(()) => println!("{}", "✓ connected".green()),
            Err(e) => {
                println!("{}", format!("✗ {}", e).red());
                issues.push("Response cache database is not readable");
            }
        }
    }

    // Check analysis provider
    print!("  Analysis provider: ");
    if config.pipeline.analysis.has_credentials() {
        println!(
            "{}",
            format!("✓ anthropic ({})", config.pipeline.analysis.model).green()
        );
    } else {
        println!(
            "{}",
            "○ ANTHROPIC_API_KEY not set (keyword heuristics)".yellow()
        );
    }

    // Check server
    print!("  Server: ");
    let pid_file = config.data_dir.join("server").join("server.pid");
    match std::fs::read_to_string(&pid_file) {
        Ok(pid) => println!("{}", format!("✓ pid {}", pid.trim()).green()),
        Err(_) => println!("{}", "○ not running".yellow()),
    }
    print!("  Access token: ");
    if config.token_file.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ created on first server start".yellow());
    }

    println!();
    println!(
        "  {} {}",
        "Formats:".cyan(),
        ACCEPTED_EXTENSIONS.join(", ")
    );

    if let Err(e) = config.pipeline.validate() {
        issues.push("Configuration is invalid");
        println!("  {}", format!("✗ {}", e).red());
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
