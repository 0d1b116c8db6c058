//! Generator module - renders the home page and post pages to static HTML
//! using built-in Tera templates and content fetched from a [`ContentSource`]

use anyhow::{Context as _, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use walkdir::WalkDir;

use crate::config::DateStage;
use crate::content::{Post, ReadingTime};
use crate::detail::{known_slugs, load_post, DetailRenderer};
use crate::helpers::DateFormatter;
use crate::listing::Listing;
use crate::richtext::HtmlSerializer;
use crate::source::{validate_uid, ContentSource, SourceError};
use crate::templates::{PostSummary, SiteData, TemplateRenderer, STYLESHEET};
use crate::Blog;

/// A generated page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// The home page listing
    Index,
    /// A post page, by uid
    Post(String),
}

impl Route {
    /// URL path of the route
    pub fn path(&self) -> String {
        match self {
            Route::Index => "/".to_string(),
            Route::Post(uid) => format!("/post/{}", uid),
        }
    }

    /// Output file relative to the public directory
    pub fn output_file(&self) -> PathBuf {
        match self {
            Route::Index => PathBuf::from("index.html"),
            Route::Post(uid) => Path::new("post").join(uid).join("index.html"),
        }
    }
}

/// What generating a route wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutput {
    pub route: Route,
    /// Output path relative to the public directory
    pub output_path: PathBuf,
    pub hash: u64,
}

/// Whether a generation error means the requested post does not exist
pub fn is_missing(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<SourceError>()
            .is_some_and(SourceError::is_missing)
    })
}

/// Static site generator using Tera templates
pub struct Generator {
    blog: Blog,
    renderer: TemplateRenderer,
    detail: DetailRenderer,
    dates: DateFormatter,
    site: SiteData,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        let config = &blog.config;
        let renderer = TemplateRenderer::new()?;
        let serializer = HtmlSerializer::new().trust_embeds(config.render.trust_embeds);
        let detail = DetailRenderer::new(
            Box::new(serializer),
            ReadingTime::new(config.post.words_per_minute),
        );
        let dates = DateFormatter::from_config(&config.date)?;

        Ok(Self {
            blog: blog.clone(),
            renderer,
            detail,
            dates,
            site: SiteData::from_config(config),
        })
    }

    fn doc_type(&self) -> &str {
        &self.blog.config.prismic.document_type
    }

    /// Generate the entire site: home page, every post, 404 page and assets.
    ///
    /// Any fetch error aborts generation.
    pub fn generate(&self, source: &dyn ContentSource) -> Result<Vec<RouteOutput>> {
        fs::create_dir_all(&self.blog.public_dir)?;

        self.copy_static_assets()?;

        let mut outputs = vec![self.generate_index(source)?];

        let slugs = known_slugs(source, self.doc_type())
            .with_context(|| format!("Failed to enumerate `{}` documents", self.doc_type()))?;
        tracing::info!("Found {} posts", slugs.len());

        for slug in &slugs {
            outputs.push(self.generate_post(source, slug)?);
        }

        self.generate_not_found()?;

        Ok(outputs)
    }

    /// Generate a single route
    pub fn generate_route(&self, source: &dyn ContentSource, route: &Route) -> Result<RouteOutput> {
        match route {
            Route::Index => self.generate_index(source),
            Route::Post(slug) => self.generate_post(source, slug),
        }
    }

    /// Generate the home page from the first listing page
    pub fn generate_index(&self, source: &dyn ContentSource) -> Result<RouteOutput> {
        let listing_config = &self.blog.config.listing;
        let listing = Listing::seed(source, self.doc_type(), &listing_config.query_options())
            .context("Failed to fetch the first page of posts")?;
        let listing = self.with_date_stage(listing);

        let html = self.renderer.render_index(
            &self.site,
            &self.summaries(listing.posts()),
            listing.next_page(),
            listing.current_page(),
        )?;

        self.write_route(Route::Index, &html)
    }

    /// Generate the page of one post
    pub fn generate_post(&self, source: &dyn ContentSource, slug: &str) -> Result<RouteOutput> {
        validate_uid(slug)?;
        let detail = load_post(source, self.doc_type(), slug)
            .with_context(|| format!("Failed to load post `{}`", slug))?;

        let page = self.detail.present(&detail, &self.dates);
        let html = self.renderer.render_post(&self.site, &page)?;

        self.write_route(Route::Post(slug.to_string()), &html)
    }

    /// Generate `404.html`
    pub fn generate_not_found(&self) -> Result<()> {
        let html = self.render_not_found()?;
        let output_path = self.blog.public_dir.join("404.html");
        fs::write(&output_path, html)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        Ok(())
    }

    pub fn render_not_found(&self) -> Result<String> {
        self.renderer.render_not_found(&self.site)
    }

    /// Page served while a post is generated on demand
    pub fn render_loading(&self) -> Result<String> {
        self.renderer
            .render_loading(&self.site, self.blog.config.post.loading_refresh)
    }

    /// Listing entries for appending to the home page
    pub fn render_post_items(&self, posts: &[Post]) -> Result<String> {
        self.renderer.render_post_list(&self.summaries(posts))
    }

    /// A listing positioned at `cursor`, formatting dates per configuration
    pub fn resume_listing(&self, cursor: &str, page: u32) -> Listing {
        self.with_date_stage(Listing::resume(cursor, page))
    }

    fn with_date_stage(&self, listing: Listing) -> Listing {
        match self.blog.config.listing.date_stage {
            DateStage::Fetch => listing.format_dates_with(self.dates.clone()),
            DateStage::Render => listing,
        }
    }

    fn summaries(&self, posts: &[Post]) -> Vec<PostSummary> {
        posts
            .iter()
            .map(|post| PostSummary::new(post, &self.dates))
            .collect()
    }

    fn write_route(&self, route: Route, html: &str) -> Result<RouteOutput> {
        let output_path = route.output_file();
        let full_path = self.blog.public_dir.join(&output_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        write_atomic(&full_path, html)
            .with_context(|| format!("Failed to write {:?}", full_path))?;
        tracing::debug!("Generated {}: {:?}", route.path(), full_path);

        Ok(RouteOutput {
            route,
            output_path,
            hash: crate::cache::hash_content(html),
        })
    }

    /// Write the built-in stylesheet, then copy the static directory over it
    fn copy_static_assets(&self) -> Result<()> {
        let public_dir = &self.blog.public_dir;
        let css_dir = public_dir.join("css");
        fs::create_dir_all(&css_dir)?;
        fs::write(css_dir.join("style.css"), STYLESHEET)?;

        let static_dir = &self.blog.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        let mut copied = 0;
        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            let dest = public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
            copied += 1;
        }

        tracing::debug!("Copied {} static files", copied);
        Ok(())
    }
}

/// Write through a sibling temporary file and rename it into place, so
/// readers see either the old page or the new one
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(
        ".{}.{}-{}.tmp",
        file_name,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp_path, contents)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
