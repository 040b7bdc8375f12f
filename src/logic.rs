//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Running a wizard action and rendering the resulting view
//!   - Exporting the current roadmap (Markdown or JSON) with its download file name

use std::fmt;

use tracing::{info, instrument};

use crate::domain::Roadmap;
use crate::error::{AtlasError, AtlasResult};
use crate::protocol::{to_view, WizardView};
use crate::state::AppState;
use crate::util::export_filename;
use crate::wizard::Action;

#[instrument(level = "info", skip(state, action), fields(action = action.name()))]
pub async fn perform(state: &AppState, action: Action) -> AtlasResult<WizardView> {
  let s = state.dispatch(action).await?;
  info!(target: "wizard", screen = ?s.screen, busy = s.is_busy(), has_error = s.error.is_some(), "Action applied");
  Ok(to_view(&s))
}

pub async fn current_view(state: &AppState) -> WizardView {
  to_view(&state.current().await)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
  Markdown,
  Json,
}

impl ExportFormat {
  /// Anything other than "json" exports Markdown.
  pub fn parse(s: Option<&str>) -> Self {
    match s.map(|f| f.to_ascii_lowercase()) {
      Some(f) if f == "json" => ExportFormat::Json,
      _ => ExportFormat::Markdown,
    }
  }

  fn extension(&self) -> &'static str {
    match self {
      ExportFormat::Markdown => "md",
      ExportFormat::Json => "json",
    }
  }

  pub fn content_type(&self) -> &'static str {
    match self {
      ExportFormat::Markdown => "text/markdown; charset=utf-8",
      ExportFormat::Json => "application/json",
    }
  }
}

/// Downloadable roadmap document.
#[derive(Debug)]
pub struct Export {
  pub filename: String,
  pub format: ExportFormat,
  pub body: String,
}

#[instrument(level = "info", skip(state))]
pub async fn export_roadmap(state: &AppState, format: ExportFormat) -> AtlasResult<Export> {
  let roadmap = state.current().await.roadmap.ok_or(AtlasError::NothingToExport)?;
  let body = match format {
    ExportFormat::Markdown => render_markdown(&roadmap),
    ExportFormat::Json => serde_json::to_string_pretty(&roadmap)?,
  };
  let filename = export_filename(&roadmap.title, format.extension());
  info!(target: "atlas_backend", %filename, bytes = body.len(), "Roadmap exported");
  Ok(Export { filename, format, body })
}

/// Printable roadmap: phases in order, checkbox tasks, resources, closing advice.
pub fn render_markdown(r: &Roadmap) -> String {
  let mut out = String::new();
  // Writing into a String never fails.
  let _ = write_markdown(&mut out, r);
  out
}

fn write_markdown(out: &mut impl fmt::Write, r: &Roadmap) -> fmt::Result {
  writeln!(out, "# {}\n", r.title)?;
  writeln!(out, "Progress: {}% ({}/{} tasks)\n", r.progress(), r.completed_tasks(), r.total_tasks())?;

  for (i, m) in r.milestones.iter().enumerate() {
    let status = if m.is_done() { "Verified" } else { "In Progress" };
    writeln!(out, "## Phase {}: {} ({}, {})\n", i + 1, m.title, m.duration, status)?;
    if !m.description.is_empty() {
      writeln!(out, "{}\n", m.description)?;
    }
    for t in &m.tasks {
      let mark = if t.completed { "x" } else { " " };
      writeln!(out, "- [{}] {}", mark, t.text)?;
    }
    if !m.resources.is_empty() {
      writeln!(out, "\nResources:")?;
      for res in &m.resources {
        writeln!(out, "- {}", res)?;
      }
    }
    writeln!(out)?;
  }

  writeln!(out, "> {}", r.final_advice)
}
