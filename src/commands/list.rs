//! List posts from the content source

use anyhow::{Context, Result};

use crate::helpers::DateFormatter;
use crate::listing::Listing;
use crate::source::ContentSource;
use crate::Blog;

/// List posts in listing order, following the pagination cursor until the
/// source runs out or `max_pages` further pages were loaded
pub fn run(blog: &Blog, source: &dyn ContentSource, max_pages: Option<usize>) -> Result<()> {
    for line in lines(blog, source, max_pages)? {
        println!("{}", line);
    }
    Ok(())
}

fn lines(
    blog: &Blog,
    source: &dyn ContentSource,
    max_pages: Option<usize>,
) -> Result<Vec<String>> {
    let config = &blog.config;
    let dates = DateFormatter::from_config(&config.date)?;

    let mut listing = Listing::seed(
        source,
        &config.prismic.document_type,
        &config.listing.query_options(),
    )
    .context("Failed to fetch posts")?;
    listing
        .drain(source, max_pages)
        .context("Failed to fetch more posts")?;

    let has_more = listing.has_more();
    let posts = listing.into_posts();
    let mut lines = vec![format!("Posts ({}):", posts.len())];
    lines.extend(posts.iter().map(|post| {
        format!(
            "  {} - {} by {} [{}]",
            dates.display(post),
            post.title,
            post.author,
            post.uid
        )
    }));
    if has_more {
        lines.push("  ...".to_string());
    }
    Ok(lines)
}
