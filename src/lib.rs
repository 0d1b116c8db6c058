//! spacetraveling: a blog generator backed by the Prismic headless CMS
//!
//! Posts are fetched from a content API, rendered with built-in Tera
//! templates into static HTML, and served by a preview server that
//! regenerates pages on a fixed interval and builds unknown posts on demand.

pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod detail;
pub mod generator;
pub mod helpers;
pub mod listing;
pub mod richtext;
pub mod server;
pub mod source;
pub mod templates;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use source::{ContentSource, MemorySource, PrismicClient};

/// The main application
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Static assets copied verbatim into the public directory
    pub static_dir: PathBuf,
}

impl Blog {
    /// Create a new instance from a directory, reading `_config.yml` when
    /// present and applying environment overrides
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate().context("Invalid configuration")?;

        Ok(Self::with_config(base_dir, config))
    }

    /// Create an instance from an already loaded configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let public_dir = base_dir.join(&config.public_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            public_dir,
            static_dir,
        }
    }

    /// The content source: a fixtures file when given, the Prismic API
    /// otherwise
    pub fn source(&self, fixtures: Option<&Path>) -> Result<Arc<dyn ContentSource>> {
        match fixtures {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.base_dir.join(path)
                };
                let source = MemorySource::from_json_file(&path)
                    .with_context(|| format!("Failed to load fixtures from {:?}", path))?;
                tracing::info!(
                    "Loaded {} fixture documents from {:?}",
                    source.documents().len(),
                    path
                );
                Ok(Arc::new(source))
            }
            None => {
                let client = PrismicClient::from_config(&self.config.prismic)?;
                tracing::info!("Using content API at {}", client.endpoint());
                Ok(Arc::new(client))
            }
        }
    }

    /// Generate the static site
    pub fn generate(&self, source: &dyn ContentSource) -> Result<()> {
        commands::generate::run(self, source)
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
