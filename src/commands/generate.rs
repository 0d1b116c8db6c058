//! Generate static files

use anyhow::Result;

use crate::cache::{unix_now, RouteCache};
use crate::generator::Generator;
use crate::source::ContentSource;
use crate::Blog;

/// Generate the whole site and record every route in the route cache
pub fn run(blog: &Blog, source: &dyn ContentSource) -> Result<()> {
    let start = std::time::Instant::now();

    let generator = Generator::new(blog)?;
    let outputs = generator.generate(source)?;

    let mut cache = RouteCache::load(&blog.base_dir);
    let now = unix_now();
    let mut changed = 0;
    for output in &outputs {
        let output_path = output.output_path.to_string_lossy();
        if cache.record(&output.route.path(), output.hash, &output_path, now) {
            tracing::debug!("Changed: {}", output.route.path());
            changed += 1;
        }
    }

    let routes: Vec<String> = outputs.iter().map(|o| o.route.path()).collect();
    let removed = cache.retain_routes(&routes);
    for route in &removed {
        tracing::info!("Route no longer exists: {}", route);
    }
    cache.save(&blog.base_dir)?;

    tracing::info!(
        "Generated {} pages ({} changed) in {:.2}s",
        outputs.len(),
        changed,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::{PostData, RawDocument, TextField};
    use crate::source::MemorySource;
    use tempfile::TempDir;

    fn doc(uid: &str) -> RawDocument {
        RawDocument {
            id: format!("id-{}", uid),
            uid: Some(uid.to_string()),
            doc_type: "posts".to_string(),
            data: PostData {
                title: TextField::Plain(uid.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_records_routes() {
        let dir = TempDir::new().unwrap();
        let blog = Blog::with_config(dir.path(), SiteConfig::default());

        run(&blog, &MemorySource::new(vec![doc("a"), doc("b")])).unwrap();
        let cache = RouteCache::load(&blog.base_dir);
        assert!(cache.get("/").is_some());
        assert!(cache.get("/post/a").is_some());
        assert!(cache.get("/post/b").is_some());

        // A post removed from the source leaves the cache
        run(&blog, &MemorySource::new(vec![doc("a")])).unwrap();
        let cache = RouteCache::load(&blog.base_dir);
        assert!(cache.get("/post/b").is_none());
    }
}
