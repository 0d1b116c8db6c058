//! Route cache for time-based regeneration
//!
//! Records when each route was last generated and a hash of what was written,
//! so the server can tell stale pages from fresh ones and the generator can
//! report which pages actually changed.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Cache directory, relative to the site base directory
pub const CACHE_DIR: &str = ".spacetraveling-cache";

/// Cache file name
const CACHE_FILE: &str = ".spacetraveling-cache/routes.json";

/// Generation record of a single route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Unix timestamp of the last generation
    pub generated_at: u64,
    /// Hash of the generated HTML
    pub content_hash: u64,
    /// Output path relative to public dir
    pub output_path: String,
}

/// Generation records keyed by route path (`/`, `/post/<uid>`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouteCache {
    /// Version of the cache format
    pub version: u32,
    pub routes: HashMap<String, RouteEntry>,
}

impl RouteCache {
    /// Current cache format version
    const VERSION: u32 = 1;

    /// Load cache from disk, or create a new empty cache
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = base_dir.join(CACHE_FILE);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            if let Ok(cache) = serde_json::from_str::<RouteCache>(&content) {
                if cache.version == Self::VERSION {
                    return cache;
                }
                tracing::info!("Route cache version mismatch, starting fresh");
            }
        }
        Self::new()
    }

    /// Save cache to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir.join(CACHE_DIR))?;

        let cache_path = base_dir.join(CACHE_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(cache_path, content)?;
        Ok(())
    }

    /// Create a new cache with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    /// Record a generation; returns whether the content differs from the
    /// previous one
    pub fn record(&mut self, route: &str, content_hash: u64, output_path: &str, now: u64) -> bool {
        let changed = self
            .routes
            .get(route)
            .map_or(true, |entry| entry.content_hash != content_hash);

        self.routes.insert(
            route.to_string(),
            RouteEntry {
                generated_at: now,
                content_hash,
                output_path: output_path.to_string(),
            },
        );
        changed
    }

    pub fn get(&self, route: &str) -> Option<&RouteEntry> {
        self.routes.get(route)
    }

    /// A route is stale when it was never generated or was generated more
    /// than `revalidate` seconds ago
    pub fn is_stale(&self, route: &str, now: u64, revalidate: u64) -> bool {
        match self.routes.get(route) {
            Some(entry) => now.saturating_sub(entry.generated_at) >= revalidate,
            None => true,
        }
    }

    /// Drop routes that were not produced by the latest full generation
    pub fn retain_routes(&mut self, routes: &[String]) -> Vec<String> {
        let removed: Vec<String> = self
            .routes
            .keys()
            .filter(|r| !routes.contains(r))
            .cloned()
            .collect();
        for route in &removed {
            tracing::debug!("Dropping route {} from cache", route);
            self.routes.remove(route);
        }
        removed
    }
}

/// Calculate a hash for generated content
pub fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Current time as unix timestamp
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
