//! Params command implementation.

use super::types::{ParamsCommand, ParamsSource};
use anyhow::Context;
use colored::Colorize;
use dreamfusion_training::{
    apply_rules, build_store, resolve_local, resolve_remote, DriverSettings, RunConfig, RunPlan,
};
use serde_json::json;

/// Merge the selected parameter source over `base`.
pub async fn resolve_config(
    base: RunConfig,
    source: ParamsSource,
    settings: &DriverSettings,
) -> anyhow::Result<RunConfig> {
    let merged = match source {
        ParamsSource::None => return Ok(base),
        ParamsSource::Local => resolve_local(&base, &settings.platform_root)
            .context("Failed to read local hyperparameters")?,
        ParamsSource::Remote => {
            let uri = settings.params_uri()?;
            let store = build_store(settings)?;
            resolve_remote(&base, store.as_ref(), &uri)
                .await
                .with_context(|| format!("Failed to fetch parameters from {uri}"))?
        }
    };
    Ok(merged.config)
}

/// Execute the params command.
///
/// Prints the configuration a run would use, after derived rules, without
/// launching the trainer.
pub async fn execute(command: ParamsCommand, settings: &DriverSettings) -> anyhow::Result<()> {
    let config = resolve_config(command.flags.into(), command.params_source, settings).await?;
    let derived = apply_rules(&config)?;
    let plan = RunPlan::new(derived.config)?;

    // Effective learning rate at the first and last step.
    let lr_range = plan.optimization.as_ref().map(|optimization| {
        let lr = optimization.optimizer.lr();
        (lr * optimization.schedule.factor(0), lr * optimization.schedule.factor(plan.config.iters))
    });

    if command.json {
        let output = json!({
            "rules": derived.applied,
            "lr_range": lr_range.map(|(start, end)| json!({ "start": start, "end": end })),
            "plan": plan,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Resolved Parameters".bold().cyan());
    println!();
    println!("  Text: {}", plan.config.text.as_deref().unwrap_or("(none)").green());
    println!("  Workspace: {}", plan.workspace().green());
    println!("  Mode: {:?}", plan.mode);
    println!("  Backbone: {:?}", plan.backbone);
    println!("  Ray marcher: {:?}", plan.ray_marcher);
    match &plan.guidance {
        Some(guidance) => println!("  Guidance: {}", guidance.name().green()),
        None => println!("  Guidance: {}", "none".dimmed()),
    }
    if let Some(optimization) = &plan.optimization {
        println!("  Optimizer: {:?}", optimization.optimizer);
        println!("  Max epoch: {}", optimization.max_epoch);
    }
    if let Some((start, end)) = lr_range {
        println!("  Learning rate: {start:e} -> {end:e}");
    }
    if derived.applied.is_empty() {
        println!("  Rules: {}", "none".dimmed());
    } else {
        let rules: Vec<String> = derived.applied.iter().map(|rule| format!("{rule:?}")).collect();
        println!("  Rules: {}", rules.join(", ").yellow());
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&plan.config)?);

    Ok(())
}
