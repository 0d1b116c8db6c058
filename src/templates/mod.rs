//! Built-in site templates using the Tera template engine
//!
//! Templates are embedded in the binary. HTML autoescaping stays on: every
//! value coming from the CMS is escaped unless a template marks it `safe`,
//! which only the pre-rendered rich-text blocks are.

use anyhow::Result;
use serde::Serialize;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::Post;
use crate::detail::PostPage;
use crate::helpers::{date_xml, DateFormatter};

/// Stylesheet shipped with the built-in templates
pub const STYLESHEET: &str = include_str!("site/style.css");

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("index.html", include_str!("site/index.html")),
            ("post.html", include_str!("site/post.html")),
            ("loading.html", include_str!("site/loading.html")),
            ("not_found.html", include_str!("site/not_found.html")),
            // Partials
            (
                "partials/post_item.html",
                include_str!("site/partials/post_item.html"),
            ),
            (
                "partials/post_list.html",
                include_str!("site/partials/post_list.html"),
            ),
        ])?;

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    /// Home page with the first listing page and, when more posts exist,
    /// the "load more" button
    pub fn render_index(
        &self,
        site: &SiteData,
        posts: &[PostSummary],
        next_page: Option<&str>,
        current_page: u32,
    ) -> Result<String> {
        let mut context = Context::new();
        context.insert("site", site);
        context.insert("posts", posts);
        context.insert("next_page", &next_page);
        context.insert("current_page", &current_page);
        self.render("index.html", &context)
    }

    /// Just the post entries, for appending to an existing listing
    pub fn render_post_list(&self, posts: &[PostSummary]) -> Result<String> {
        let mut context = Context::new();
        context.insert("posts", posts);
        self.render("partials/post_list.html", &context)
    }

    pub fn render_post(&self, site: &SiteData, post: &PostPage) -> Result<String> {
        let mut context = Context::new();
        context.insert("site", site);
        context.insert("post", post);
        self.render("post.html", &context)
    }

    /// Placeholder served while a post is generated on demand
    pub fn render_loading(&self, site: &SiteData, refresh_secs: u64) -> Result<String> {
        let mut context = Context::new();
        context.insert("site", site);
        context.insert("refresh", &refresh_secs);
        self.render("loading.html", &context)
    }

    pub fn render_not_found(&self, site: &SiteData) -> Result<String> {
        let mut context = Context::new();
        context.insert("site", site);
        self.render("not_found.html", &context)
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub language: String,
}

impl SiteData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            language: config.language.clone(),
        }
    }
}

/// A listing entry
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    pub datetime: String,
    pub href: String,
}

impl PostSummary {
    pub fn new(post: &Post, dates: &DateFormatter) -> Self {
        Self {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: dates.display(post),
            datetime: post
                .first_publication_date
                .as_ref()
                .map(date_xml)
                .unwrap_or_default(),
            href: format!("/post/{}", post.uid),
        }
    }
}
