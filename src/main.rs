//! Project Atlas · Engineering Project Planner Backend
//!
//! - Axum HTTP + WebSocket API driving the four-screen planning wizard
//! - Gemini integration for project suggestions and roadmaps (via environment variables)
//! - Roadmap snapshot persisted to disk so progress survives restarts
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   GEMINI_API_KEY       : enables Gemini integration if present (API_KEY also accepted)
//!   GEMINI_BASE_URL      : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_SUGGEST_MODEL : default "gemini-3-flash-preview"
//!   GEMINI_ROADMAP_MODEL : default "gemini-3-pro-preview"
//!   ATLAS_STATE_DIR      : directory for the roadmap snapshot (default "./data")
//!   AGENT_CONFIG_PATH    : path to TOML config (prompts + suggestion count)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod catalog;
mod config;
mod error;
mod wizard;
mod persistence;
mod gemini;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: recovered wizard, generator, snapshot store.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "atlas_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
