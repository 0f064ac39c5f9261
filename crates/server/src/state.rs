use std::sync::Arc;

use brakeweb_core::{Config, ConversionService, DownloadResolver, Engine, Environment, JobLayout};

/// Shared application state
pub struct AppState {
    config: Config,
    conversions: ConversionService,
    downloads: DownloadResolver,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<dyn Engine>) -> Self {
        let conversions = ConversionService::new(
            JobLayout::new(&config.storage.jobs_dir),
            engine,
            &config.engine,
            config.conversion.clone(),
        );
        let downloads = DownloadResolver::new(Arc::clone(conversions.layout()));

        Self {
            config,
            conversions,
            downloads,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn conversions(&self) -> &ConversionService {
        &self.conversions
    }

    pub fn downloads(&self) -> &DownloadResolver {
        &self.downloads
    }
}
