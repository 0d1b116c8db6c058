//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::content::DEFAULT_WORDS_PER_MINUTE;
use crate::source::{Direction, Ordering, QueryOptions, MAX_PAGE_SIZE};

/// Invalid configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("listing.page_size must be between 1 and {max}, got {got}")]
    PageSize { got: u32, max: u32 },

    #[error("post.words_per_minute must be greater than zero")]
    WordsPerMinute,

    #[error("unknown timezone `{0}`")]
    Timezone(String),

    #[error("unknown locale `{0}`")]
    Locale(String),
}

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub language: String,

    // Directory
    pub public_dir: String,
    pub static_dir: String,

    // Content API
    pub prismic: PrismicConfig,

    // Home page
    pub listing: ListingConfig,

    // Post pages
    pub post: PostConfig,

    // Date display
    pub date: DateConfig,

    // Rich text
    pub render: RenderConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling.".to_string(),
            language: "pt-BR".to_string(),

            public_dir: "public".to_string(),
            static_dir: "static".to_string(),

            prismic: PrismicConfig::default(),
            listing: ListingConfig::default(),
            post: PostConfig::default(),
            date: DateConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: SiteConfig =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Override API settings from the environment
    /// (`PRISMIC_ENDPOINT`, `PRISMIC_ACCESS_TOKEN`)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("PRISMIC_ENDPOINT").filter(|v| !v.is_empty()) {
            tracing::debug!("Using PRISMIC_ENDPOINT from environment");
            self.prismic.endpoint = endpoint;
        }
        if let Some(token) = lookup("PRISMIC_ACCESS_TOKEN").filter(|v| !v.is_empty()) {
            tracing::debug!("Using PRISMIC_ACCESS_TOKEN from environment");
            self.prismic.access_token = Some(token);
        }
    }

    /// Reject values the generator cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listing.page_size == 0 || self.listing.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::PageSize {
                got: self.listing.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if self.post.words_per_minute == 0 {
            return Err(ConfigError::WordsPerMinute);
        }
        crate::helpers::parse_locale(&self.date.locale)?;
        crate::helpers::parse_timezone(&self.date.timezone)?;
        Ok(())
    }
}

/// Content API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrismicConfig {
    /// API endpoint, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Custom type holding blog posts
    pub document_type: String,
    /// HTTP timeout in seconds
    pub timeout: u64,
}

impl Default for PrismicConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
            timeout: 30,
        }
    }
}

/// When listing dates are turned into display strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateStage {
    /// Keep timestamps in the model, format in templates
    #[default]
    Render,
    /// Stamp a display string on each post as it is fetched
    Fetch,
}

/// Index page listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Posts per page, both at build time and for "load more"
    pub page_size: u32,
    pub fetch: Vec<String>,
    pub order_by: String,
    pub direction: Direction,
    pub date_stage: DateStage,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: 1,
            fetch: vec![
                "posts.title".to_string(),
                "posts.subtitle".to_string(),
                "posts.author".to_string(),
                "posts.banner".to_string(),
                "posts.content".to_string(),
            ],
            order_by: "document.last_publication_date".to_string(),
            direction: Direction::Desc,
            date_stage: DateStage::Render,
        }
    }
}

impl ListingConfig {
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            fetch: self.fetch.clone(),
            page_size: self.page_size,
            orderings: if self.order_by.is_empty() {
                None
            } else {
                Some(Ordering {
                    field: self.order_by.clone(),
                    direction: self.direction,
                })
            },
        }
    }
}

/// Post page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    pub words_per_minute: u32,
    /// Seconds after which a generated page is regenerated on request
    pub revalidate: u64,
    /// Generate unknown slugs on demand instead of answering 404
    pub fallback: bool,
    /// Refresh interval of the loading page, in seconds
    pub loading_refresh: u64,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            revalidate: 60 * 30,
            fallback: true,
            loading_refresh: 2,
        }
    }
}

/// Date display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    /// date-fns style pattern
    pub format: String,
    pub locale: String,
    pub timezone: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            format: "dd MMM yyyy".to_string(),
            locale: "pt_BR".to_string(),
            timezone: "America/Sao_Paulo".to_string(),
        }
    }
}

/// Rich-text rendering configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Emit provider HTML for embeds instead of a plain link
    pub trust_embeds: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.title, "spacetraveling.");
        assert_eq!(config.listing.page_size, 1);
        assert_eq!(config.post.words_per_minute, 200);
        assert_eq!(config.post.revalidate, 1800);
        assert!(config.post.fallback);
        assert_eq!(config.date.format, "dd MMM yyyy");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Blog
prismic:
  endpoint: https://my-blog.cdn.prismic.io/api/v2
listing:
  page_size: 5
  direction: asc
  date_stage: fetch
post:
  revalidate: 60
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Blog");
        assert_eq!(config.prismic.endpoint, "https://my-blog.cdn.prismic.io/api/v2");
        assert_eq!(config.prismic.document_type, "posts");
        assert_eq!(config.listing.page_size, 5);
        assert_eq!(config.listing.direction, Direction::Asc);
        assert_eq!(config.listing.date_stage, DateStage::Fetch);
        assert_eq!(config.post.revalidate, 60);
        assert_eq!(config.post.words_per_minute, 200);
    }

    #[test]
    fn test_query_options() {
        let options = ListingConfig::default().query_options();
        assert_eq!(options.page_size, 1);
        assert_eq!(options.fetch.len(), 5);
        assert_eq!(
            options.orderings,
            Some(Ordering {
                field: "document.last_publication_date".to_string(),
                direction: Direction::Desc,
            })
        );
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = SiteConfig::default();
        config.apply_env(|key| match key {
            "PRISMIC_ENDPOINT" => Some("https://env.cdn.prismic.io/api/v2".to_string()),
            "PRISMIC_ACCESS_TOKEN" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.prismic.endpoint, "https://env.cdn.prismic.io/api/v2");
        assert_eq!(config.prismic.access_token, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SiteConfig::default();
        config.listing.page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::PageSize { .. })));

        let mut config = SiteConfig::default();
        config.post.words_per_minute = 0;
        assert!(matches!(config.validate(), Err(ConfigError::WordsPerMinute)));

        let mut config = SiteConfig::default();
        config.date.timezone = "Nowhere/Land".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Timezone(_))));
    }
}
