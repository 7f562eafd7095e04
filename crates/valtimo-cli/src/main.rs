use clap::{Parser, Subcommand};
use std::path::PathBuf;
use valtimo_cli::{
    app::App,
    commands::{
        config::{self, ConfigAction},
        definitions::{self, DefinitionsAction},
        invoke,
        secret::{self, SecretAction},
    },
    GlobalOpts,
};
use valtimo_config::Config;
use valtimo_logger::{self as logger, LogFormat};

#[derive(Parser)]
#[command(name = "valtimo-plugin")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Manage valtimo plugin configurations",
    long_about = "valtimo-plugin manages plugin configurations, deploys them from files and runs plugin actions against process activities."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the registered plugin definitions
    Definitions {
        #[command(subcommand)]
        action: DefinitionsAction,
    },
    /// Manage plugin configurations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run a plugin action described by a JSON or YAML request file
    Invoke { file: PathBuf },
    /// Encrypt or decrypt property values
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            logger::error(&format!("Failed to load configuration: {}", e));
            std::process::exit(1);
        }
    };

    let format = if cli.global.log_json || config.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(config.verbosity()), format) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }

    let result = match cli.command {
        Commands::Definitions { action } => definitions::handle_definitions(action, &cli.global),
        Commands::Secret { action } => secret::handle_secret(action, &config),
        Commands::Config { action } => {
            App::load(config).and_then(|app| config::handle_config(action, &app))
        }
        Commands::Invoke { file } => App::load(config).and_then(|app| invoke::handle_invoke(&file, &app)),
    };

    if let Err(e) = result {
        logger::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
