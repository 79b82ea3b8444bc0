//! Sample image API for testing image retrieval without the real backend.
//!
//! Serves the same three-step protocol the daemon consumes:
//!
//! 1. `GET /playlist` → `{"playlist": [".../random_image", ...]}` with a
//!    random number of items;
//! 2. `GET /random_image` → `{"url": ".../img/<name>"}` for a random sample
//!    file;
//! 3. `GET /img/{name}` → the raw image bytes.
//!
//! Used by the integration tests on an ephemeral port and exposed as the
//! `slidekiosk-imageserver` binary for manual runs.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use tracing::info;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Shared server state.
#[derive(Clone)]
pub struct MockImagesState {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    sample_dir: PathBuf,
    min_images: usize,
    max_images: usize,
}

impl MockImagesState {
    pub fn new(
        base_url: impl Into<String>,
        sample_dir: impl Into<PathBuf>,
        min_images: usize,
        max_images: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url: base_url.into(),
                sample_dir: sample_dir.into(),
                min_images: min_images.max(1),
                max_images: max_images.max(min_images.max(1)),
            }),
        }
    }

    fn sample_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.inner.sample_dir) else {
            return Vec::new();
        };

        entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                std::path::Path::new(name)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        IMAGE_EXTENSIONS
                            .iter()
                            .any(|known| known.eq_ignore_ascii_case(ext))
                    })
            })
            .collect()
    }
}

/// Router serving the playlist/resolver/binary endpoints.
pub fn router(state: MockImagesState) -> Router {
    Router::new()
        .route("/playlist", get(playlist))
        .route("/random_image", get(random_image))
        .route("/img/:name", get(image))
        .with_state(state)
}

/// Binds the listener's own address into the served URLs and runs forever.
pub async fn serve(
    listener: tokio::net::TcpListener,
    sample_dir: PathBuf,
    min_images: usize,
    max_images: usize,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    let state = MockImagesState::new(format!("http://{addr}"), sample_dir, min_images, max_images);

    info!("serving sample images on http://{addr}/playlist");
    axum::serve(listener, router(state)).await
}

async fn playlist(State(state): State<MockImagesState>) -> Json<serde_json::Value> {
    let count = rand::thread_rng().gen_range(state.inner.min_images..=state.inner.max_images);
    let resolver = format!("{}/random_image", state.inner.base_url);
    Json(json!({ "playlist": vec![resolver; count] }))
}

async fn random_image(State(state): State<MockImagesState>) -> Response {
    let names = state.sample_names();
    match names.choose(&mut rand::thread_rng()) {
        Some(name) => {
            let url = format!("{}/img/{name}", state.inner.base_url);
            Json(json!({ "url": url })).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no sample images").into_response(),
    }
}

async fn image(State(state): State<MockImagesState>, UrlPath(name): UrlPath<String>) -> Response {
    // No path escapes out of the sample folder.
    if name.contains('/') || name.contains("..") {
        return (StatusCode::BAD_REQUEST, "bad image name").into_response();
    }

    match std::fs::read(state.inner.sample_dir.join(&name)) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "no such image").into_response(),
    }
}
