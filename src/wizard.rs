//! The wizard state machine: Home -> Setup -> Suggestions -> Roadmap.
//!
//! `reduce` is pure: it takes the current state and an action and returns the next
//! state plus the side effects an outer driver must run (generation calls, snapshot
//! writes). Generation outcomes come back in as actions.
//!
//! Persistence policy lives here too: every transition that ends on the Roadmap
//! screen emits `SaveSnapshot`, every transition that ends on Home emits
//! `ClearSnapshot`, and Setup/Suggestions never write.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::validate_profile;
use crate::domain::{Profile, Roadmap, Suggestion};
use crate::error::{AtlasError, AtlasResult};
use crate::persistence::Snapshot;

pub const SUGGESTIONS_FAILED: &str = "AI core busy. Please check your API key and try again.";
pub const ROADMAP_FAILED: &str = "Strategic synthesis failed. Please re-select the project.";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Home,
    Setup,
    Suggestions,
    Roadmap,
}

impl Screen {
    /// Position in the four-step progress header.
    pub fn step(&self) -> u8 {
        match self {
            Screen::Home => 0,
            Screen::Setup => 1,
            Screen::Suggestions => 2,
            Screen::Roadmap => 3,
        }
    }
}

/// Which network-bound transition is outstanding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generation {
    Suggestions,
    Roadmap,
}

impl Generation {
    /// Screen the request was issued from; the outcome only commits there.
    pub fn origin(&self) -> Screen {
        match self {
            Generation::Suggestions => Screen::Setup,
            Generation::Roadmap => Screen::Suggestions,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Generation::Suggestions => "Analyzing engineering landscape...",
            Generation::Roadmap => "Synthesizing actionable roadmap...",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WizardState {
    pub screen: Screen,
    /// Set while a generation call is outstanding.
    pub busy: Option<Generation>,
    pub error: Option<String>,
    pub profile: Option<Profile>,
    pub suggestions: Vec<Suggestion>,
    pub roadmap: Option<Roadmap>,
    pub reset_pending: bool,
}

impl WizardState {
    /// Resume straight into the Roadmap screen from a persisted session.
    pub fn restored(roadmap: Roadmap, profile: Option<Profile>) -> Self {
        Self {
            screen: Screen::Roadmap,
            roadmap: Some(roadmap),
            profile,
            ..Self::default()
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            screen: self.screen,
            roadmap: self.roadmap.clone(),
            prefs: self.profile.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Start,
    Back,
    Submit(Profile),
    SuggestionsReady {
        profile: Profile,
        result: Result<Vec<Suggestion>, String>,
    },
    Select {
        suggestion_id: String,
    },
    RoadmapReady {
        result: Result<Roadmap, String>,
    },
    ToggleTask {
        milestone_id: String,
        task_id: String,
    },
    RequestReset,
    ConfirmReset,
    CancelReset,
    DismissError,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Back => "back",
            Action::Submit(_) => "submit",
            Action::SuggestionsReady { .. } => "suggestions_ready",
            Action::Select { .. } => "select",
            Action::RoadmapReady { .. } => "roadmap_ready",
            Action::ToggleTask { .. } => "toggle_task",
            Action::RequestReset => "request_reset",
            Action::ConfirmReset => "confirm_reset",
            Action::CancelReset => "cancel_reset",
            Action::DismissError => "dismiss_error",
        }
    }

    /// Actions still accepted while a generation call is outstanding.
    fn allowed_while_busy(&self) -> bool {
        matches!(
            self,
            Action::SuggestionsReady { .. }
                | Action::RoadmapReady { .. }
                | Action::DismissError
                | Action::CancelReset
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    GenerateSuggestions(Profile),
    GenerateRoadmap {
        suggestion: Suggestion,
        profile: Profile,
    },
    SaveSnapshot(Snapshot),
    ClearSnapshot,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: WizardState,
    pub effects: Vec<Effect>,
}

/// Compute the next state. Rejected actions return an error and leave `state` as is.
pub fn reduce(state: &WizardState, action: Action) -> AtlasResult<Transition> {
    if state.is_busy() && !action.allowed_while_busy() {
        return Err(AtlasError::Busy);
    }

    let from = state.screen;
    let name = action.name();
    let mut next = state.clone();
    let mut effects = Vec::new();
    let reject = move || AtlasError::NotAllowed { action: name, screen: from };

    // A reset request only stands until the next unrelated action.
    if !matches!(
        action,
        Action::RequestReset | Action::ConfirmReset | Action::CancelReset
    ) {
        next.reset_pending = false;
    }

    match action {
        Action::Start => {
            if from != Screen::Home {
                return Err(reject());
            }
            next.screen = Screen::Setup;
        }

        Action::Back => match from {
            Screen::Setup => next.screen = Screen::Home,
            Screen::Suggestions => next.screen = Screen::Setup,
            _ => return Err(reject()),
        },

        Action::Submit(profile) => {
            if from != Screen::Setup {
                return Err(reject());
            }
            validate_profile(&profile)?;
            next.busy = Some(Generation::Suggestions);
            next.error = None;
            next.suggestions.clear();
            effects.push(Effect::GenerateSuggestions(profile));
        }

        Action::SuggestionsReady { profile, result } => {
            if !settle(&mut next, Generation::Suggestions) {
                return Ok(Transition { state: next, effects });
            }
            match result {
                Ok(batch) => {
                    debug!(target: "wizard", count = batch.len(), "Suggestion batch committed");
                    next.profile = Some(profile);
                    next.suggestions = batch;
                    next.error = None;
                    next.screen = Screen::Suggestions;
                }
                Err(e) => {
                    warn!(target: "wizard", error = %e, "Suggestion generation failed");
                    next.error = Some(SUGGESTIONS_FAILED.into());
                }
            }
        }

        Action::Select { suggestion_id } => {
            if from != Screen::Suggestions {
                return Err(reject());
            }
            let Some(profile) = state.profile.clone() else {
                return Err(reject());
            };
            let suggestion = state
                .suggestions
                .iter()
                .find(|s| s.id == suggestion_id)
                .cloned()
                .ok_or(AtlasError::UnknownSuggestion(suggestion_id))?;
            next.busy = Some(Generation::Roadmap);
            next.error = None;
            effects.push(Effect::GenerateRoadmap { suggestion, profile });
        }

        Action::RoadmapReady { result } => {
            if !settle(&mut next, Generation::Roadmap) {
                return Ok(Transition { state: next, effects });
            }
            match result {
                Ok(roadmap) => {
                    debug!(target: "wizard", project_id = %roadmap.project_id, milestones = roadmap.milestones.len(), "Roadmap committed");
                    next.roadmap = Some(fresh(roadmap));
                    next.error = None;
                    next.screen = Screen::Roadmap;
                }
                Err(e) => {
                    warn!(target: "wizard", error = %e, "Roadmap generation failed");
                    next.error = Some(ROADMAP_FAILED.into());
                }
            }
        }

        Action::ToggleTask {
            milestone_id,
            task_id,
        } => {
            let Some(roadmap) = next.roadmap.as_mut().filter(|_| from == Screen::Roadmap) else {
                return Err(reject());
            };
            if !roadmap.toggle_task(&milestone_id, &task_id) {
                let e = AtlasError::InvariantViolation {
                    milestone_id,
                    task_id,
                };
                warn!(target: "wizard", error = %e, "Ignoring toggle");
            }
        }

        Action::RequestReset => next.reset_pending = true,

        Action::ConfirmReset => {
            if !state.reset_pending {
                return Err(reject());
            }
            next = WizardState::default();
        }

        Action::CancelReset => next.reset_pending = false,

        Action::DismissError => next.error = None,
    }

    match next.screen {
        Screen::Roadmap if next.roadmap.is_some() => effects.push(Effect::SaveSnapshot(next.snapshot())),
        Screen::Home => effects.push(Effect::ClearSnapshot),
        _ => {}
    }

    debug!(target: "wizard", action = name, ?from, to = ?next.screen, busy = next.is_busy(), effects = effects.len(), "Transition");
    Ok(Transition { state: next, effects })
}

/// Clear the busy flag for a finished generation. Returns whether the outcome
/// should be committed, i.e. it was expected and the user is still on its origin screen.
fn settle(next: &mut WizardState, finished: Generation) -> bool {
    if next.busy != Some(finished) {
        debug!(target: "wizard", ?finished, "Dropping unexpected generation outcome");
        return false;
    }
    next.busy = None;
    if next.screen != finished.origin() {
        debug!(target: "wizard", ?finished, screen = ?next.screen, "Dropping outcome for a screen the user left");
        return false;
    }
    true
}

/// Progress is never trusted from upstream: every task starts incomplete.
fn fresh(mut roadmap: Roadmap) -> Roadmap {
    for task in roadmap.milestones.iter_mut().flat_map(|m| m.tasks.iter_mut()) {
        task.completed = false;
    }
    roadmap.overall_progress = 0;
    roadmap
}
