// demos/stub_service.rs

//! `stackguard-stub`: a tiny HTTP service to supervise.
//!
//! It stands in for either half of a stack: `/docs` answers like an API's
//! documentation page, `/` like a UI, and `/items` is a small stateful API
//! for validation cases. Logs go to stdout so the supervisor captures them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "stackguard-stub", about = "Minimal HTTP service for stackguard demos and tests")]
struct Args {
    #[arg(long, default_value_t = 8000)]
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Answer `POST /items` with 500 and log the failure.
    #[arg(long)]
    fail_items: bool,

    /// Log an error line right after startup.
    #[arg(long)]
    log_error_on_start: bool,

    /// Wait this long before binding the port.
    #[arg(long, default_value_t = 0)]
    startup_delay_ms: u64,

    /// Exit on its own this long after binding.
    #[arg(long)]
    exit_after_ms: Option<u64>,

    #[arg(long, default_value_t = 0)]
    exit_code: i32,
}

#[derive(Debug, Clone, Serialize)]
struct Item {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NewItem {
    name: String,
}

#[derive(Debug)]
struct AppState {
    next_id: AtomicU64,
    items: Mutex<Vec<Item>>,
    fail_items: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(false)
        .with_writer(std::io::stdout)
        .init();

    let args = Args::parse();

    if args.startup_delay_ms > 0 {
        info!(delay_ms = args.startup_delay_ms, "delaying startup");
        tokio::time::sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    let state = Arc::new(AppState {
        next_id: AtomicU64::new(1),
        items: Mutex::new(Vec::new()),
        fail_items: args.fail_items,
    });

    let app = Router::new()
        .route("/", get(index))
        .route("/docs", get(docs))
        .route("/health", get(health))
        .route("/items", get(list_items).post(create_item))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("invalid --host/--port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, pid = std::process::id(), "stub service listening");

    if args.log_error_on_start {
        error!("simulated startup failure: configuration incomplete");
    }

    if let Some(ms) = args.exit_after_ms {
        let code = args.exit_code;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            info!(code, "exiting on request");
            std::process::exit(code);
        });
    }

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html("<!doctype html><html><head><title>stub frontend</title></head><body>ok</body></html>")
}

async fn docs() -> Html<&'static str> {
    Html("<!doctype html><html><head><title>Swagger UI</title></head><body>docs</body></html>")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_items(State(state): State<Arc<AppState>>) -> Json<Vec<Item>> {
    Json(state.items.lock().await.clone())
}

async fn create_item(State(state): State<Arc<AppState>>, Json(new): Json<NewItem>) -> Response {
    if state.fail_items {
        error!(name = %new.name, "failed to create item: storage unavailable");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": "storage unavailable" })),
        )
            .into_response();
    }

    let item = Item {
        id: state.next_id.fetch_add(1, Ordering::SeqCst),
        name: new.name,
    };
    info!(id = item.id, name = %item.name, "created item");
    state.items.lock().await.push(item.clone());
    (StatusCode::CREATED, Json(item)).into_response()
}
