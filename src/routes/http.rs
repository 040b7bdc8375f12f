//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; rejected actions map to 4xx through `AtlasError`.

use std::sync::Arc;
use axum::{
  extract::{Query, State},
  http::header,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::catalog::{catalog, Catalog};
use crate::domain::Profile;
use crate::error::AtlasResult;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;
use crate::wizard::Action;

type ViewResult = AtlasResult<Json<WizardView>>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_get_catalog() -> Json<Catalog> { Json(catalog()) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_state(State(state): State<Arc<AppState>>) -> Json<WizardView> {
  Json(current_view(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_start(State(state): State<Arc<AppState>>) -> ViewResult {
  Ok(Json(perform(&state, Action::Start).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_back(State(state): State<Arc<AppState>>) -> ViewResult {
  Ok(Json(perform(&state, Action::Back).await?))
}

#[instrument(level = "info", skip(state, body), fields(branch = %body.branch, year = %body.year, interests_len = body.interests.len()))]
pub async fn http_post_profile(
  State(state): State<Arc<AppState>>,
  Json(body): Json<Profile>,
) -> ViewResult {
  let view = perform(&state, Action::Submit(body)).await?;
  info!(target: "wizard", screen = ?view.screen, suggestions = view.suggestions.len(), "HTTP profile submitted");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, body), fields(%body.suggestion_id))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SelectIn>,
) -> ViewResult {
  Ok(Json(perform(&state, Action::Select { suggestion_id: body.suggestion_id }).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.milestone_id, %body.task_id))]
pub async fn http_post_toggle(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ToggleIn>,
) -> ViewResult {
  let action = Action::ToggleTask { milestone_id: body.milestone_id, task_id: body.task_id };
  Ok(Json(perform(&state, action).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset_request(State(state): State<Arc<AppState>>) -> ViewResult {
  Ok(Json(perform(&state, Action::RequestReset).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset_confirm(State(state): State<Arc<AppState>>) -> ViewResult {
  Ok(Json(perform(&state, Action::ConfirmReset).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset_cancel(State(state): State<Arc<AppState>>) -> ViewResult {
  Ok(Json(perform(&state, Action::CancelReset).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_dismiss_error(State(state): State<Arc<AppState>>) -> ViewResult {
  Ok(Json(perform(&state, Action::DismissError).await?))
}

#[instrument(level = "info", skip(state), fields(format = ?q.format))]
pub async fn http_get_export(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ExportQuery>,
) -> AtlasResult<impl IntoResponse> {
  let export = export_roadmap(&state, ExportFormat::parse(q.format.as_deref())).await?;
  let disposition = format!("attachment; filename=\"{}\"", export.filename);
  Ok((
    [
      (header::CONTENT_TYPE, export.format.content_type().to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    export.body,
  ))
}
