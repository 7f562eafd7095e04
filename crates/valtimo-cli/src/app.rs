//! Wiring of the plugin service from the loaded configuration

use crate::builtin;
use anyhow::Context;
use std::sync::Arc;
use valtimo_config::Config;
use valtimo_plugin::placeholder::{ChainSource, EnvSource, MapSource};
use valtimo_plugin::{
    ConfigurationStore, Encryptor, FileConfigurationRepository, PluginService,
    TracingEventPublisher, ValueResolverService,
};

pub struct App {
    pub config: Config,
    pub service: PluginService,
}

impl App {
    /// Build the service over the file repository named by the configuration.
    pub fn load(config: Config) -> anyhow::Result<Self> {
        let encryptor = encryptor(&config)?;
        let registry = builtin::registry().context("Failed to register built-in plugins")?;
        let store_path = config.store_path();
        tracing::debug!(path = %store_path.display(), "using configuration store");

        let store = ConfigurationStore::new(
            Arc::new(registry),
            Arc::new(FileConfigurationRepository::new(store_path)),
            Arc::new(encryptor),
        )
        .with_publisher(Arc::new(TracingEventPublisher));
        let service = PluginService::new(Arc::new(store), ValueResolverService::with_defaults());

        Ok(App { config, service })
    }

    /// Configured placeholders first, then the process environment
    pub fn placeholders(&self) -> ChainSource {
        ChainSource::new()
            .with(MapSource::from(&self.config.placeholders))
            .with(EnvSource)
    }
}

pub fn encryptor(config: &Config) -> anyhow::Result<Encryptor> {
    let secret = config.encryption_secret()?;
    Encryptor::new(secret.as_bytes()).context("Failed to set up property encryption")
}
