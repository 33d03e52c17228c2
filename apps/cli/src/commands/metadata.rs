//! Metadata command implementation.

use super::types::MetadataCommand;
use anyhow::Context;
use colored::Colorize;
use dreamfusion_training::metadata::format_elapsed;
use dreamfusion_training::RunMetadata;
use serde_json::json;

/// Execute the metadata command.
pub fn execute(command: &MetadataCommand) -> anyhow::Result<()> {
    let metadata = RunMetadata::scrape_file(&command.log)
        .with_context(|| format!("Failed to read run metadata from {}", command.log.display()))?;

    if command.append {
        metadata.append_to_log(&command.log)?;
    }

    if command.json {
        let output = json!({
            "metadata": metadata,
            "time": format_elapsed(metadata.elapsed()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Run Metadata".bold().cyan());
    print!("{}", metadata.render());
    println!();
    if command.append {
        println!();
        println!("  {} {}", "Appended to".dimmed(), command.log.display());
    }

    Ok(())
}
