use crate::app::App;
use crate::commands::{parse_object, print_json, read_document};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;
use valtimo_definitions::{ActivityType, PluginDefinition};
use valtimo_logger as logger;
use valtimo_plugin::{Batch, ConfigurationFilter, PluginConfiguration};

const MASK: &str = "********";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// List plugin configurations
    List {
        /// Only configurations whose definition has this category
        #[arg(long)]
        category: Option<String>,
        /// Only configurations whose definition supports this activity type
        #[arg(long)]
        activity_type: Option<ActivityType>,
    },
    /// Show one configuration as JSON
    Show {
        id: Uuid,
        /// Print secret properties in plain text
        #[arg(long)]
        reveal: bool,
    },
    /// Create a configuration
    Create {
        /// Plugin definition key
        #[arg(long)]
        definition: String,
        #[arg(long)]
        title: String,
        /// Properties as a JSON object
        #[arg(long, default_value = "{}")]
        properties: String,
        /// Use this identifier instead of a generated one
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// Replace the title and properties of a configuration
    Update {
        id: Uuid,
        #[arg(long)]
        title: String,
        /// Properties as a JSON object; omitted secrets keep their value
        #[arg(long, default_value = "{}")]
        properties: String,
        /// Move the configuration to a new identifier
        #[arg(long)]
        new_id: Option<Uuid>,
    },
    /// Delete a configuration
    Delete { id: Uuid },
    /// Export every configuration with secrets replaced by placeholders
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
    /// Create or update configurations from a JSON or YAML file
    Deploy { file: PathBuf },
}

pub fn handle_config(action: ConfigAction, app: &App) -> anyhow::Result<()> {
    let service = &app.service;

    match action {
        ConfigAction::List {
            category,
            activity_type,
        } => {
            let mut filter = ConfigurationFilter::default();
            if let Some(category) = category {
                filter = filter.category(&category);
            }
            if let Some(activity_type) = activity_type {
                filter = filter.activity_type(activity_type);
            }
            let batch = service.store().search(&filter)?;
            report_failures(&batch);
            if batch.items.is_empty() {
                println!("{}", "No plugin configurations found.".yellow());
            }
            for configuration in &batch.items {
                println!(
                    "{} {} {}",
                    configuration.id.to_string().cyan(),
                    configuration.title.bold(),
                    format!("({})", configuration.definition_key).dimmed()
                );
            }
        }
        ConfigAction::Show { id, reveal } => {
            let mut configuration = service.store().get(id)?;
            if !reveal {
                if let Some(definition) = service
                    .store()
                    .registry()
                    .find_definition(&configuration.definition_key)
                {
                    mask_secrets(definition, &mut configuration);
                }
            }
            print_json(&configuration)?;
        }
        ConfigAction::Create {
            definition,
            title,
            properties,
            id,
        } => {
            let properties = parse_object(&properties, "--properties")?;
            let configuration = service.create_configuration(id, &title, properties, &definition)?;
            logger::success(&format!(
                "Created plugin configuration '{}' ({})",
                configuration.title, configuration.id
            ));
            println!("{}", configuration.id);
        }
        ConfigAction::Update {
            id,
            title,
            properties,
            new_id,
        } => {
            let properties = parse_object(&properties, "--properties")?;
            let configuration = service.update_configuration(id, new_id, &title, properties)?;
            logger::success(&format!(
                "Updated plugin configuration '{}' ({})",
                configuration.title, configuration.id
            ));
            println!("{}", configuration.id);
        }
        ConfigAction::Delete { id } => {
            let configuration = service.delete_configuration(id)?;
            logger::success(&format!(
                "Deleted plugin configuration '{}' ({})",
                configuration.title, configuration.id
            ));
        }
        ConfigAction::Export { format } => {
            let batch = service.store().export()?;
            report_failures(&batch);
            match format {
                ExportFormat::Json => print_json(&batch.items)?,
                ExportFormat::Yaml => print!("{}", serde_yaml::to_string(&batch.items)?),
            }
        }
        ConfigAction::Deploy { file } => {
            let document = read_document(&file)?;
            let deployed = service.store().deploy(&document, &app.placeholders())?;
            logger::success(&format!(
                "Deployed {} plugin configuration(s) from {}",
                deployed.len(),
                file.display()
            ));
            for configuration in &deployed {
                println!("{}", configuration.id);
            }
        }
    }
    Ok(())
}

fn report_failures<T>(batch: &Batch<T>) {
    for failure in &batch.failures {
        logger::warn(&format!(
            "Skipped plugin configuration {}: {}",
            failure.id, failure.error
        ));
    }
}

fn mask_secrets(definition: &PluginDefinition, configuration: &mut PluginConfiguration) {
    for property in definition.secret_properties() {
        if let Some(value) = configuration.properties.get_mut(property.name.as_ref()) {
            if !value.is_null() {
                *value = Value::String(MASK.to_string());
            }
        }
    }
}
