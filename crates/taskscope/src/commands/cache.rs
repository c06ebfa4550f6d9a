//! Response cache commands.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use taskscope_core::analysis::domain_scope;
use taskscope_core::types::normalize_domains;
use taskscope_core::{CacheStats, ResponseCache};

use super::open_cache;
use crate::cli::{CacheAction, CacheCommand};
use crate::config::Config;

pub async fn execute(cmd: CacheCommand, config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    match cmd.action {
        CacheAction::Stats { json } => {
            let stats = cache.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
        CacheAction::Clear { yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt("Remove every cached analysis response?")
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("{}", "Cancelled.".yellow());
                    return Ok(());
                }
            }
            let removed = cache.clear();
            println!("{} Removed {} cached responses", "✓".green(), removed);
        }
        CacheAction::Invalidate { domains } => {
            let removed = invalidate_domains(&cache, &domains)?;
            println!(
                "{} Removed {} responses for {}",
                "✓".green(),
                removed,
                domains.join(", ").cyan()
            );
        }
        CacheAction::Purge => {
            let removed = cache.purge_expired();
            println!("{} Purged {} expired entries", "✓".green(), removed);
        }
    }
    Ok(())
}

/// Drop responses produced for exactly this domain set
pub fn invalidate_domains(cache: &ResponseCache, domains: &[String]) -> Result<usize> {
    let domains = normalize_domains(domains)?;
    Ok(cache.invalidate(&domain_scope(&domains)))
}

fn print_stats(stats: &CacheStats) {
    println!("{}", "Response Cache".cyan().bold());
    println!("{}", "─".repeat(40));

    let state = if stats.enabled {
        "enabled".green()
    } else {
        "disabled".yellow()
    };
    println!("  Status:        {}", state);
    println!("  Entries:       {}", stats.entries);
    println!(
        "  Today:         {} hits / {} misses ({:.2}%)",
        stats.hits, stats.misses, stats.hit_rate
    );
    println!(
        "  Retained days: {} hits / {} misses ({:.2}%)",
        stats.total_hits, stats.total_misses, stats.total_hit_rate
    );
}
