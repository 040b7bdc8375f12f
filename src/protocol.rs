//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Profile, Roadmap, Suggestion};
use crate::util::source_host;
use crate::wizard::{Action, Screen, WizardState};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    Start,
    Back,
    SubmitProfile {
        profile: Profile,
    },
    SelectSuggestion {
        #[serde(rename = "suggestionId")]
        suggestion_id: String,
    },
    ToggleTask {
        #[serde(rename = "milestoneId")]
        milestone_id: String,
        #[serde(rename = "taskId")]
        task_id: String,
    },
    RequestReset,
    ConfirmReset,
    CancelReset,
    DismissError,
}

impl ClientWsMessage {
    /// Wizard action carried by this message, if any.
    pub fn into_action(self) -> Option<Action> {
        match self {
            ClientWsMessage::Ping | ClientWsMessage::GetState => None,
            ClientWsMessage::Start => Some(Action::Start),
            ClientWsMessage::Back => Some(Action::Back),
            ClientWsMessage::SubmitProfile { profile } => Some(Action::Submit(profile)),
            ClientWsMessage::SelectSuggestion { suggestion_id } => Some(Action::Select { suggestion_id }),
            ClientWsMessage::ToggleTask { milestone_id, task_id } => Some(Action::ToggleTask {
                milestone_id,
                task_id,
            }),
            ClientWsMessage::RequestReset => Some(Action::RequestReset),
            ClientWsMessage::ConfirmReset => Some(Action::ConfirmReset),
            ClientWsMessage::CancelReset => Some(Action::CancelReset),
            ClientWsMessage::DismissError => Some(Action::DismissError),
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State { state: WizardView },
    Error { message: String },
}

/// Everything the frontend needs to render the current screen.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub screen: Screen,
    pub step: u8,
    pub busy: bool,
    pub busy_message: Option<&'static str>,
    pub error: Option<String>,
    pub reset_pending: bool,
    pub profile: Option<Profile>,
    pub suggestions: Vec<SuggestionOut>,
    pub roadmap: Option<RoadmapOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionOut {
    #[serde(flatten)]
    pub suggestion: Suggestion,
    /// Display labels for `sourceUrls`, same order.
    pub source_hosts: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapOut {
    #[serde(flatten)]
    pub roadmap: Roadmap,
    pub progress: u8,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub milestone_status: Vec<MilestoneStatus>,
}

#[derive(Debug, Serialize)]
pub struct MilestoneStatus {
    pub id: String,
    pub done: bool,
}

pub fn to_view(s: &WizardState) -> WizardView {
    WizardView {
        screen: s.screen,
        step: s.screen.step(),
        busy: s.is_busy(),
        busy_message: s.busy.map(|g| g.message()),
        error: s.error.clone(),
        reset_pending: s.reset_pending,
        profile: s.profile.clone(),
        suggestions: s.suggestions.iter().map(suggestion_out).collect(),
        roadmap: s.roadmap.as_ref().map(roadmap_out),
    }
}

fn suggestion_out(s: &Suggestion) -> SuggestionOut {
    let source_hosts = s
        .source_urls
        .iter()
        .flatten()
        .filter_map(|u| source_host(u))
        .collect();
    SuggestionOut {
        suggestion: s.clone(),
        source_hosts,
    }
}

fn roadmap_out(r: &Roadmap) -> RoadmapOut {
    RoadmapOut {
        progress: r.progress(),
        completed_tasks: r.completed_tasks(),
        total_tasks: r.total_tasks(),
        milestone_status: r
            .milestones
            .iter()
            .map(|m| MilestoneStatus {
                id: m.id.clone(),
                done: m.is_done(),
            })
            .collect(),
        roadmap: r.clone(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct SelectIn {
    #[serde(rename = "suggestionId")]
    pub suggestion_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleIn {
    #[serde(rename = "milestoneId")]
    pub milestone_id: String,
    #[serde(rename = "taskId")]
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
