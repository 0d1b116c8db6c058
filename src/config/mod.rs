//! Configuration module

mod site;

pub use site::ConfigError;
pub use site::DateConfig;
pub use site::DateStage;
pub use site::ListingConfig;
pub use site::PostConfig;
pub use site::PrismicConfig;
pub use site::RenderConfig;
pub use site::SiteConfig;
