//! HTTP front for the map: serves the dataset, the static UI, and re-runs the scraper.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::dataset::load_dataset;

/// How to launch a scrape run in a child process.
#[derive(Debug, Clone)]
pub struct ScrapeCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ScrapeCommand {
    /// The `sheriff-sale-map` binary installed next to the running executable.
    pub fn sibling_binary(name: &str) -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self {
            program: exe.with_file_name(name),
            args: Vec::new(),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub scrape: ScrapeCommand,
    running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(data_path: impl Into<PathBuf>, scrape: ScrapeCommand) -> Self {
        Self {
            data_path: data_path.into(),
            scrape,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_scraping(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

pub struct AppError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

pub fn router(state: AppState, public_dir: impl Into<PathBuf>) -> Router {
    Router::new()
        .route("/api/listings", get(listings_handler))
        .route("/api/scrape", post(scrape_handler))
        .fallback_service(ServeDir::new(public_dir.into()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn listings_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let path = state.data_path.clone();
    let dataset = tokio::task::spawn_blocking(move || load_dataset(&path)).await??;

    Ok(Json(match dataset {
        Some(dataset) => serde_json::to_value(dataset)?,
        None => json!({ "listings": [], "count": 0 }),
    }))
}

/// Acknowledges at once; the run itself continues in the background.
async fn scrape_handler(State(state): State<AppState>) -> Json<Value> {
    if state.running.swap(true, Ordering::SeqCst) {
        tracing::info!("Scrape requested while one is running");
        return Json(json!({ "status": "running" }));
    }

    tokio::spawn(async move {
        if let Err(e) = run_scrape(&state.scrape).await {
            tracing::error!("Scrape run failed: {:#}", e);
        }
        state.running.store(false, Ordering::SeqCst);
    });

    Json(json!({ "status": "started" }))
}

async fn run_scrape(command: &ScrapeCommand) -> anyhow::Result<()> {
    tracing::info!("Launching scraper: {}", command.program.display());
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take().map(|out| tokio::spawn(forward_lines(out, false)));
    let stderr = child.stderr.take().map(|err| tokio::spawn(forward_lines(err, true)));

    let status = child.wait().await?;
    for task in [stdout, stderr].into_iter().flatten() {
        let _ = task.await;
    }

    if status.success() {
        tracing::info!("Scraper finished");
        Ok(())
    } else {
        anyhow::bail!("scraper exited with {}", status)
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, is_stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            tracing::warn!(target: "scraper", "{}", line);
        } else {
            tracing::info!(target: "scraper", "{}", line);
        }
    }
}
