//! Application state: the single wizard session, its snapshot store, and the generation client.
//!
//! This module owns:
//!   - the wizard state (one logical writer, behind a mutex held only while reducing)
//!   - the snapshot store, written in the same critical section as the transition
//!   - the generation client (Gemini, or a failing stand-in without an API key)
//!
//! `dispatch` is the outer driver of the pure reducer in `wizard.rs`: it commits the
//! transition, runs persistence effects, awaits generation effects outside the lock,
//! and feeds their outcomes back in as actions.
//!
//! Generation runs on a detached task. The caller only waits for it, so a dropped
//! request (client disconnect, timeout) still lets the outcome commit and clear `busy`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::config::load_agent_config_from_env;
use crate::error::AtlasResult;
use crate::gemini::{Gemini, ProjectGenerator, Unconfigured};
use crate::persistence::{recover, FileSnapshotStore, SnapshotStore};
use crate::wizard::{reduce, Action, Effect, WizardState};

#[derive(Clone)]
pub struct AppState {
    wizard: Arc<Mutex<WizardState>>,
    pub generator: Arc<dyn ProjectGenerator>,
    pub store: Arc<dyn SnapshotStore>,
}

impl AppState {
    /// Build state from env: load config, init the Gemini client, resume any saved roadmap.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let generator: Arc<dyn ProjectGenerator> =
            match Gemini::from_env(cfg.prompts.clone(), cfg.suggestion_count) {
                Some(g) => {
                    info!(target: "atlas_backend", base_url = %g.base_url, suggest_model = %g.suggest_model, roadmap_model = %g.roadmap_model, "Gemini enabled.");
                    Arc::new(g)
                }
                None => {
                    error!(target: "atlas_backend", "GEMINI_API_KEY not set; every generation request will fail.");
                    Arc::new(Unconfigured)
                }
            };

        let store = FileSnapshotStore::from_env();
        info!(target: "atlas_backend", path = %store.path().display(), "Snapshot store ready");

        Self::with_parts(generator, Arc::new(store))
    }

    /// Assemble from explicit collaborators, resuming whatever the store holds.
    pub fn with_parts(generator: Arc<dyn ProjectGenerator>, store: Arc<dyn SnapshotStore>) -> Self {
        let wizard = recover(store.as_ref());
        info!(target: "wizard", screen = ?wizard.screen, "Wizard initialized");
        Self {
            wizard: Arc::new(Mutex::new(wizard)),
            generator,
            store,
        }
    }

    /// Current wizard state (cloned).
    pub async fn current(&self) -> WizardState {
        self.wizard.lock().await.clone()
    }

    /// Apply a user action and everything it triggers. Returns the settled state.
    ///
    /// Only the user action itself can be rejected; generation failures are recorded
    /// in the state's error slot instead.
    #[instrument(level = "info", skip(self, action), fields(action = action.name()))]
    pub async fn dispatch(&self, action: Action) -> AtlasResult<WizardState> {
        let pending = self.commit(action).await?;

        if !pending.is_empty() {
            let driver = self.clone();
            let handle = tokio::spawn(async move { driver.run_effects(pending).await });
            if let Err(e) = handle.await {
                error!(target: "wizard", error = %e, "Effect driver task failed");
            }
        }

        Ok(self.current().await)
    }

    /// Await generation effects one by one and commit each outcome.
    async fn run_effects(&self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);

        while let Some(effect) = queue.pop_front() {
            let outcome = match effect {
                Effect::GenerateSuggestions(profile) => {
                    let generator = self.generator.clone();
                    let request = profile.clone();
                    let result = isolated(async move { generator.generate_suggestions(&request).await }).await;
                    Action::SuggestionsReady { profile, result }
                }
                Effect::GenerateRoadmap { suggestion, profile } => {
                    let generator = self.generator.clone();
                    let result =
                        isolated(async move { generator.generate_roadmap(&suggestion, &profile).await }).await;
                    Action::RoadmapReady { result }
                }
                Effect::SaveSnapshot(_) | Effect::ClearSnapshot => continue,
            };

            match self.commit(outcome).await {
                Ok(more) => queue.extend(more),
                Err(e) => error!(target: "wizard", error = %e, "Generation outcome rejected"),
            }
        }
    }

    /// Reduce under the lock and run persistence effects in the same critical section,
    /// so snapshot writes land in transition order. Returns effects that need awaiting.
    async fn commit(&self, action: Action) -> AtlasResult<Vec<Effect>> {
        let mut wizard = self.wizard.lock().await;
        let transition = reduce(&wizard, action)?;
        *wizard = transition.state;

        let mut pending = Vec::new();
        for effect in transition.effects {
            match effect {
                Effect::SaveSnapshot(snapshot) => {
                    if let Err(e) = self.store.save(&snapshot) {
                        error!(target: "persistence", error = %e, "Failed to save snapshot");
                    }
                }
                Effect::ClearSnapshot => {
                    if let Err(e) = self.store.clear() {
                        error!(target: "persistence", error = %e, "Failed to clear snapshot");
                    }
                }
                other => pending.push(other),
            }
        }
        Ok(pending)
    }
}

/// Run one generation call on its own task; a panic there becomes a failed outcome.
async fn isolated<T, F>(call: F) -> Result<T, String>
where
    T: Send + 'static,
    F: Future<Output = AtlasResult<T>> + Send + 'static,
{
    match tokio::spawn(call).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("generation task aborted: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::fixtures::{profile, roadmap, suggestion};
    use crate::domain::{Profile, Roadmap, Suggestion};
    use crate::error::AtlasError;
    use crate::gemini::mock::MockGenerator;
    use crate::persistence::MemorySnapshotStore;
    use crate::wizard::{Generation, Screen, SUGGESTIONS_FAILED};

    struct PanickingGenerator;

    #[async_trait]
    impl ProjectGenerator for PanickingGenerator {
        async fn generate_suggestions(&self, _profile: &Profile) -> AtlasResult<Vec<Suggestion>> {
            panic!("generator blew up");
        }

        async fn generate_roadmap(&self, _suggestion: &Suggestion, _profile: &Profile) -> AtlasResult<Roadmap> {
            panic!("generator blew up");
        }
    }

    fn build_app(generator: MockGenerator, store: Arc<MemorySnapshotStore>) -> (AppState, Arc<MockGenerator>) {
        let generator = Arc::new(generator);
        (AppState::with_parts(generator.clone(), store), generator)
    }

    fn happy() -> MockGenerator {
        MockGenerator::new(Ok(vec![suggestion("p1"), suggestion("p2")]), Ok(roadmap("p1")))
    }

    #[tokio::test]
    async fn end_to_end_profile_to_roadmap() {
        let store = Arc::new(MemorySnapshotStore::default());
        let (app, generator) = build_app(happy(), store.clone());

        app.dispatch(Action::Start).await.unwrap();
        let s = app.dispatch(Action::Submit(profile())).await.unwrap();
        assert_eq!(s.screen, Screen::Suggestions);
        assert!(s.error.is_none());
        assert!(!s.is_busy());
        for sug in &s.suggestions {
            assert!(sug.source_urls.as_ref().map_or(0, |u| u.len()) <= 3);
        }
        assert!(store.load().is_none());

        let s = app.dispatch(Action::Select { suggestion_id: "p1".into() }).await.unwrap();
        assert_eq!(s.screen, Screen::Roadmap);
        let r = s.roadmap.unwrap();
        assert_eq!(r.project_id, "p1");
        assert_eq!(r.progress(), 0);
        assert!(r.milestones.iter().flat_map(|m| &m.tasks).all(|t| !t.completed));

        assert_eq!(generator.suggestion_calls.load(Ordering::SeqCst), 1);
        assert_eq!(generator.roadmap_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.load().unwrap().screen, Screen::Roadmap);
    }

    #[tokio::test]
    async fn failed_generation_stays_put_and_is_dismissible() {
        let store = Arc::new(MemorySnapshotStore::default());
        let (app, _) = build_app(MockGenerator::new(Err("HTTP 500".into()), Err("x".into())), store);

        app.dispatch(Action::Start).await.unwrap();
        let s = app.dispatch(Action::Submit(profile())).await.unwrap();
        assert_eq!(s.screen, Screen::Setup);
        assert_eq!(s.error.as_deref(), Some(SUGGESTIONS_FAILED));
        assert!(!s.is_busy());

        let s = app.dispatch(Action::DismissError).await.unwrap();
        assert!(s.error.is_none());
    }

    #[tokio::test]
    async fn rejected_action_leaves_state_untouched() {
        let (app, generator) = build_app(happy(), Arc::new(MemorySnapshotStore::default()));
        let err = app.dispatch(Action::Submit(profile())).await.unwrap_err();
        assert!(matches!(err, AtlasError::NotAllowed { .. }));
        assert_eq!(app.current().await, WizardState::default());
        assert_eq!(generator.suggestion_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn toggles_are_persisted_and_survive_restart() {
        let store = Arc::new(MemorySnapshotStore::default());
        let (app, _) = build_app(happy(), store.clone());
        app.dispatch(Action::Start).await.unwrap();
        app.dispatch(Action::Submit(profile())).await.unwrap();
        app.dispatch(Action::Select { suggestion_id: "p1".into() }).await.unwrap();
        app.dispatch(Action::ToggleTask { milestone_id: "m1".into(), task_id: "a".into() })
            .await
            .unwrap();
        app.dispatch(Action::ToggleTask { milestone_id: "m2".into(), task_id: "c".into() })
            .await
            .unwrap();

        let (restarted, _) = build_app(happy(), store);
        let s = restarted.current().await;
        assert_eq!(s.screen, Screen::Roadmap);
        assert_eq!(s.profile, Some(profile()));
        assert_eq!(s.roadmap.unwrap().progress(), 67);
    }

    #[tokio::test]
    async fn reset_clears_session_and_snapshot() {
        let store = Arc::new(MemorySnapshotStore::default());
        let (app, _) = build_app(happy(), store.clone());
        app.dispatch(Action::Start).await.unwrap();
        app.dispatch(Action::Submit(profile())).await.unwrap();
        app.dispatch(Action::Select { suggestion_id: "p1".into() }).await.unwrap();
        assert!(store.load().is_some());

        app.dispatch(Action::RequestReset).await.unwrap();
        let s = app.dispatch(Action::ConfirmReset).await.unwrap();
        assert_eq!(s, WizardState::default());
        assert!(store.load().is_none());

        let (restarted, _) = build_app(happy(), store);
        assert_eq!(restarted.current().await.screen, Screen::Home);
    }

    #[tokio::test]
    async fn dropped_request_still_settles_generation() {
        let slow = happy().with_delay(Duration::from_millis(200));
        let (app, _) = build_app(slow, Arc::new(MemorySnapshotStore::default()));
        app.dispatch(Action::Start).await.unwrap();

        let cut_short = tokio::time::timeout(Duration::from_millis(20), app.dispatch(Action::Submit(profile()))).await;
        assert!(cut_short.is_err());
        assert_eq!(app.current().await.busy, Some(Generation::Suggestions));

        tokio::time::sleep(Duration::from_millis(500)).await;
        let s = app.current().await;
        assert!(!s.is_busy());
        assert_eq!(s.screen, Screen::Suggestions);
        assert_eq!(s.suggestions.len(), 2);

        let s = app.dispatch(Action::Back).await.unwrap();
        assert_eq!(s.screen, Screen::Setup);
    }

    #[tokio::test]
    async fn panicking_generator_becomes_a_failed_outcome() {
        let app = AppState::with_parts(Arc::new(PanickingGenerator), Arc::new(MemorySnapshotStore::default()));
        app.dispatch(Action::Start).await.unwrap();
        let s = app.dispatch(Action::Submit(profile())).await.unwrap();
        assert!(!s.is_busy());
        assert_eq!(s.screen, Screen::Setup);
        assert_eq!(s.error.as_deref(), Some(SUGGESTIONS_FAILED));
    }
}
