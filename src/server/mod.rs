//! Preview server with on-demand generation
//!
//! Serves the generated site, regenerates pages older than the revalidate
//! interval in the background, generates unknown posts on first request
//! while showing a loading page, and answers the home page's "load more"
//! requests.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::{unix_now, RouteCache};
use crate::generator::{is_missing, Generator, Route, RouteOutput};
use crate::listing::LoadOutcome;
use crate::source::{validate_uid, ContentSource, SourceError};
use crate::Blog;

/// Most slugs remembered as missing at once
const MAX_MISSING: usize = 1024;

/// State of an on-demand generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    Running,
    /// The source has no such post; remembered until the revalidate
    /// interval has passed
    Missing { since: u64 },
}

/// Server state
pub struct ServerState {
    blog: Blog,
    source: Arc<dyn ContentSource>,
    generator: Arc<Generator>,
    cache: Mutex<RouteCache>,
    pending: Mutex<HashMap<Route, Generation>>,
    /// Signalled whenever a generation finishes
    generated: Notify,
}

impl ServerState {
    pub fn new(blog: &Blog, source: Arc<dyn ContentSource>) -> Result<Self> {
        Ok(Self {
            blog: blog.clone(),
            source,
            generator: Arc::new(Generator::new(blog)?),
            cache: Mutex::new(RouteCache::load(&blog.base_dir)),
            pending: Mutex::new(HashMap::new()),
            generated: Notify::new(),
        })
    }

    /// Number of generations still running
    pub async fn running(&self) -> usize {
        self.pending
            .lock()
            .await
            .values()
            .filter(|g| **g == Generation::Running)
            .count()
    }
}

/// Build the router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/post/:slug", get(post_handler))
        .route("/post/:slug/", get(post_handler))
        .route("/api/posts", get(load_more_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the preview server
pub async fn start(
    blog: &Blog,
    source: Arc<dyn ContentSource>,
    ip: &str,
    port: u16,
    open: bool,
) -> Result<()> {
    let state = Arc::new(ServerState::new(blog, source)?);
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    println!(
        "Pages are regenerated after {} seconds.",
        blog.config.post.revalidate
    );
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler(State(state): State<Arc<ServerState>>) -> Response {
    serve_route(state, Route::Index).await
}

async fn post_handler(
    State(state): State<Arc<ServerState>>,
    Path(slug): Path<String>,
) -> Response {
    if validate_uid(&slug).is_err() {
        return not_found(&state);
    }
    serve_route(state, Route::Post(slug)).await
}

/// Serve a generated route, generating or revalidating it as needed
async fn serve_route(state: Arc<ServerState>, route: Route) -> Response {
    let file = state.blog.public_dir.join(route.output_file());

    if let Ok(html) = tokio::fs::read_to_string(&file).await {
        let stale = state.cache.lock().await.is_stale(
            &route.path(),
            unix_now(),
            state.blog.config.post.revalidate,
        );
        if stale {
            spawn_generation(state.clone(), route).await;
        }
        return Html(html).into_response();
    }

    match route {
        // The home page is always generated before answering
        Route::Index => {
            let generated = loop {
                let finished = state.generated.notified();
                if claim(&state, &route).await {
                    break generate_claimed(state.clone(), route.clone()).await;
                }
                // Another request is generating it
                finished.await;
                if let Ok(html) = tokio::fs::read_to_string(&file).await {
                    return Html(html).into_response();
                }
            };
            match generated {
                Ok(_) => match tokio::fs::read_to_string(&file).await {
                    Ok(html) => Html(html).into_response(),
                    Err(e) => server_error(e),
                },
                Err(e) => {
                    tracing::error!("Failed to generate home page: {:#}", e);
                    (StatusCode::BAD_GATEWAY, "Failed to load posts").into_response()
                }
            }
        }
        Route::Post(_) => {
            if !state.blog.config.post.fallback {
                return not_found(&state);
            }

            let known_missing = {
                let mut pending = state.pending.lock().await;
                match pending.get(&route).copied() {
                    Some(Generation::Missing { since })
                        if unix_now().saturating_sub(since) < state.blog.config.post.revalidate =>
                    {
                        true
                    }
                    Some(Generation::Missing { .. }) => {
                        pending.remove(&route);
                        false
                    }
                    _ => false,
                }
            };
            if known_missing {
                return not_found(&state);
            }

            spawn_generation(state.clone(), route).await;
            match state.generator.render_loading() {
                Ok(html) => Html(html).into_response(),
                Err(e) => server_error(e),
            }
        }
    }
}

/// Mark the route as being generated; false when a generation is already
/// running for it
async fn claim(state: &ServerState, route: &Route) -> bool {
    let mut pending = state.pending.lock().await;
    if pending.get(route) == Some(&Generation::Running) {
        return false;
    }
    pending.insert(route.clone(), Generation::Running);
    true
}

/// Start a background generation unless one is already running for the route
async fn spawn_generation(state: Arc<ServerState>, route: Route) {
    if !claim(&state, &route).await {
        return;
    }

    tracing::debug!("Regenerating {}", route.path());
    tokio::spawn(async move {
        let path = route.path();
        match generate_claimed(state, route).await {
            Err(e) if !is_missing(&e) => {
                tracing::error!("Failed to generate {}: {:#}", path, e);
            }
            _ => {}
        }
    });
}

/// Generate a claimed route, release the claim and wake anyone waiting on it
async fn generate_claimed(state: Arc<ServerState>, route: Route) -> Result<RouteOutput> {
    let result = generate(state.clone(), route.clone()).await;
    {
        let mut pending = state.pending.lock().await;
        match &result {
            Err(e) if is_missing(e) => {
                tracing::info!("{} does not exist: {}", route.path(), e);
                // A post removed from the source must stop being served
                let file = state.blog.public_dir.join(route.output_file());
                if tokio::fs::remove_file(&file).await.is_ok() {
                    tracing::info!("Removed {:?}", file);
                }
                remember_missing(
                    &mut pending,
                    route,
                    unix_now(),
                    state.blog.config.post.revalidate,
                );
            }
            _ => {
                pending.remove(&route);
            }
        }
    }
    state.generated.notify_waiters();
    result
}

/// Record a missing route, dropping expired records and, past
/// [`MAX_MISSING`], the oldest ones
fn remember_missing(
    pending: &mut HashMap<Route, Generation>,
    route: Route,
    now: u64,
    revalidate: u64,
) {
    pending.retain(|_, g| match g {
        Generation::Missing { since } => now.saturating_sub(*since) < revalidate,
        Generation::Running => true,
    });

    let mut missing: Vec<(u64, Route)> = pending
        .iter()
        .filter_map(|(r, g)| match g {
            Generation::Missing { since } => Some((*since, r.clone())),
            Generation::Running => None,
        })
        .collect();
    if missing.len() >= MAX_MISSING {
        let excess = missing.len() + 1 - MAX_MISSING;
        missing.sort_by_key(|(since, _)| *since);
        for (_, old) in missing.drain(..excess) {
            pending.remove(&old);
        }
    }

    pending.insert(route, Generation::Missing { since: now });
}

/// Generate a route on the blocking pool and record it in the route cache
async fn generate(state: Arc<ServerState>, route: Route) -> Result<RouteOutput> {
    let generator = state.generator.clone();
    let source = state.source.clone();
    let target = route.clone();
    let output =
        tokio::task::spawn_blocking(move || generator.generate_route(source.as_ref(), &target))
            .await??;

    let mut cache = state.cache.lock().await;
    let output_path = output.output_path.to_string_lossy();
    if cache.record(&route.path(), output.hash, &output_path, unix_now()) {
        tracing::info!("Updated {}", route.path());
    }
    if let Err(e) = cache.save(&state.blog.base_dir) {
        tracing::warn!("Failed to save route cache: {}", e);
    }
    Ok(output)
}

#[derive(Debug, Deserialize)]
struct LoadMoreQuery {
    cursor: String,
    page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoadMoreResponse {
    /// Rendered listing entries
    html: String,
    next_page: Option<String>,
    page: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// One "load more" step for the home page
async fn load_more_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LoadMoreQuery>,
) -> Response {
    let generator = state.generator.clone();
    let source = state.source.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut listing = generator.resume_listing(&query.cursor, query.page.unwrap_or(1));
        let outcome = listing.load_next_page(source.as_ref())?;
        Ok::<_, SourceError>((outcome, listing))
    })
    .await;

    let (outcome, listing) = match result {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(e)) => {
            let status = match e {
                SourceError::ForeignCursor(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            return (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
        Err(e) => return server_error(e),
    };

    if let LoadOutcome::Appended { count } = outcome {
        tracing::debug!("Loaded {} more posts", count);
    }

    match state.generator.render_post_items(listing.posts()) {
        Ok(html) => Json(LoadMoreResponse {
            html,
            next_page: listing.next_page().map(str::to_string),
            page: listing.current_page(),
        })
        .into_response(),
        Err(e) => server_error(e),
    }
}

/// Static files from the public directory
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let mut service = ServeDir::new(&state.blog.public_dir).append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => not_found(&state),
        Ok(response) => response.into_response(),
        Err(e) => server_error(e),
    }
}

fn not_found(state: &ServerState) -> Response {
    match state.generator.render_not_found() {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(e) => server_error(e),
    }
}

fn server_error(e: impl std::fmt::Display) -> Response {
    tracing::error!("Server error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
