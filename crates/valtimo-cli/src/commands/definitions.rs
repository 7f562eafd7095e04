use crate::builtin;
use crate::commands::print_json;
use crate::GlobalOpts;
use anyhow::Context;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use valtimo_definitions::{ActivityType, PluginDefinition};
use valtimo_logger as logger;

#[derive(Subcommand, Debug, Clone)]
pub enum DefinitionsAction {
    /// List registered plugin definitions
    List {
        /// Only definitions with an action for this activity type (e.g. bpmn:ServiceTask:start)
        #[arg(long)]
        activity_type: Option<ActivityType>,
    },
    /// Show one definition as JSON
    Show { key: String },
    /// Write the definition catalog to a TOML file
    Catalog { file: PathBuf },
}

pub fn handle_definitions(action: DefinitionsAction, opts: &GlobalOpts) -> anyhow::Result<()> {
    let registry = builtin::registry().context("Failed to register built-in plugins")?;

    match action {
        DefinitionsAction::List { activity_type } => {
            let definitions: Vec<&PluginDefinition> = match activity_type {
                Some(activity_type) => registry.definitions_for_activity(activity_type).collect(),
                None => registry.all_definitions().collect(),
            };
            if definitions.is_empty() {
                println!("{}", "No plugin definitions found.".yellow());
                return Ok(());
            }
            for definition in definitions {
                print_definition(definition, opts.verbose > 0);
            }
        }
        DefinitionsAction::Show { key } => {
            let definition = registry
                .find_definition(&key)
                .with_context(|| format!("Plugin definition with key '{}' not found", key))?;
            print_json(definition)?;
        }
        DefinitionsAction::Catalog { file } => {
            let catalog = registry.catalog();
            catalog
                .save_to_path(&file)
                .with_context(|| format!("Failed to write catalog to {}", file.display()))?;
            logger::success(&format!(
                "Wrote {} plugin definitions to {}",
                catalog.plugins.len(),
                file.display()
            ));
        }
    }
    Ok(())
}

fn print_definition(definition: &PluginDefinition, detailed: bool) {
    let categories = definition
        .categories
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "{} {} {}",
        definition.key.cyan().bold(),
        definition.title,
        format!("[{}]", categories).dimmed()
    );
    if !detailed {
        return;
    }

    for property in &definition.properties {
        let mut flags = Vec::new();
        if property.required {
            flags.push("required");
        }
        if property.secret {
            flags.push("secret");
        }
        println!(
            "  {} {}: {} {}",
            "property".dimmed(),
            property.name,
            property.value_type,
            flags.join(" ").yellow()
        );
    }
    for action in &definition.actions {
        let activities = action
            .activity_types
            .iter()
            .map(|at| at.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {} {} ({})", "action".dimmed(), action.key.green(), activities);
    }
}
