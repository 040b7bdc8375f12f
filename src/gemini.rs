//! Minimal Gemini client for the two generation calls.
//!
//! We only call `models/{model}:generateContent` with a JSON mime type and a declared
//! response schema. The reply is treated as untrusted: it is validated here and any
//! transport error, HTTP failure, empty body or schema violation becomes
//! `AtlasError::GenerationFailed`. There is no retry.
//!
//! NOTE: We never log the API key and we log sizes/latencies rather than payloads.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Milestone, Profile, Roadmap, SkillLevel, Suggestion, Task};
use crate::error::{AtlasError, AtlasResult};
use crate::util::{dedupe_source_urls, fill_template, trunc_for_log};

/// The two operations the wizard needs from the hosted model.
#[async_trait]
pub trait ProjectGenerator: Send + Sync {
  /// Ranked project ideas for a profile. An empty batch is a valid answer.
  async fn generate_suggestions(&self, profile: &Profile) -> AtlasResult<Vec<Suggestion>>;

  /// Phased roadmap for the chosen idea. Every task comes back incomplete.
  async fn generate_roadmap(&self, suggestion: &Suggestion, profile: &Profile) -> AtlasResult<Roadmap>;
}

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub suggest_model: String,
  pub roadmap_model: String,
  pub prompts: Prompts,
  pub suggestion_count: u32,
}

/// Text of the first candidate plus the web sources it was grounded on.
#[derive(Debug, Default, PartialEq)]
struct Reply {
  text: String,
  source_urls: Vec<String>,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY (or API_KEY); otherwise return None.
  pub fn from_env(prompts: Prompts, suggestion_count: u32) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let suggest_model =
      std::env::var("GEMINI_SUGGEST_MODEL").unwrap_or_else(|_| "gemini-3-flash-preview".into());
    let roadmap_model =
      std::env::var("GEMINI_ROADMAP_MODEL").unwrap_or_else(|_| "gemini-3-pro-preview".into());

    // No application timeout: the call runs until the transport gives up.
    let client = reqwest::Client::builder().build().ok()?;

    Some(Self { client, api_key, base_url, suggest_model, roadmap_model, prompts, suggestion_count })
  }

  /// JSON-mode generateContent call. `grounded` enables the Google Search tool.
  #[instrument(level = "info", skip(self, system, user, schema), fields(model = %model))]
  async fn generate_json(
    &self,
    model: &str,
    system: &str,
    user: &str,
    schema: Value,
    grounded: bool,
    temperature: f32,
  ) -> AtlasResult<Reply> {
    let url = format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), model);
    let req = GenerateContentRequest {
      system_instruction: Some(Content { role: None, parts: vec![Part { text: system.into() }] }),
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: user.into() }] }],
      tools: if grounded { vec![json!({ "google_search": {} })] } else { vec![] },
      generation_config: GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: schema,
        temperature,
      },
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "atlas-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await.map_err(failed)?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "generation", %status, elapsed = ?start.elapsed(), "Gemini call rejected");
      return Err(AtlasError::GenerationFailed(format!("Gemini HTTP {}: {}", status, msg)));
    }

    let body: GenerateContentResponse = res.json().await.map_err(failed)?;
    if let Some(usage) = &body.usage_metadata {
      info!(target: "generation", prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let reply = into_reply(body)?;
    info!(target: "generation", elapsed = ?start.elapsed(), text_len = reply.text.len(), sources = reply.source_urls.len(), "Gemini response received");
    Ok(reply)
  }
}

#[async_trait]
impl ProjectGenerator for Gemini {
  #[instrument(level = "info", skip(self, profile), fields(model = %self.suggest_model, branch = %profile.branch, skill = profile.skill_level.as_str()))]
  async fn generate_suggestions(&self, profile: &Profile) -> AtlasResult<Vec<Suggestion>> {
    let count = self.suggestion_count.to_string();
    let user = fill_template(
      &self.prompts.suggestions_user_template,
      &[
        ("count", count.as_str()),
        ("branch", profile.branch.as_str()),
        ("year", profile.year.as_str()),
        ("interests", profile.interests.as_str()),
        ("skill_level", profile.skill_level.as_str()),
        ("duration", profile.duration.as_str()),
      ],
    );
    let reply = self
      .generate_json(&self.suggest_model, &self.prompts.suggestions_system, &user, suggestions_schema(), true, 0.7)
      .await?;
    let batch = parse_suggestions(&reply.text, &reply.source_urls)?;
    info!(target: "generation", count = batch.len(), "Suggestion batch generated");
    Ok(batch)
  }

  #[instrument(level = "info", skip(self, suggestion, profile), fields(model = %self.roadmap_model, suggestion_id = %suggestion.id))]
  async fn generate_roadmap(&self, suggestion: &Suggestion, profile: &Profile) -> AtlasResult<Roadmap> {
    let user = fill_template(
      &self.prompts.roadmap_user_template,
      &[
        ("title", suggestion.title.as_str()),
        ("branch", profile.branch.as_str()),
        ("year", profile.year.as_str()),
        ("interests", profile.interests.as_str()),
        ("skill_level", profile.skill_level.as_str()),
        ("duration", profile.duration.as_str()),
      ],
    );
    let reply = self
      .generate_json(&self.roadmap_model, &self.prompts.roadmap_system, &user, roadmap_schema(), false, 0.4)
      .await?;
    let roadmap = parse_roadmap(&reply.text, &suggestion.id)?;
    info!(target: "generation", milestones = roadmap.milestones.len(), tasks = roadmap.total_tasks(), "Roadmap generated");
    Ok(roadmap)
  }
}

/// Stand-in when no API key is configured: every call fails.
pub struct Unconfigured;

#[async_trait]
impl ProjectGenerator for Unconfigured {
  async fn generate_suggestions(&self, _profile: &Profile) -> AtlasResult<Vec<Suggestion>> {
    Err(AtlasError::GenerationFailed("GEMINI_API_KEY not set".into()))
  }

  async fn generate_roadmap(&self, _suggestion: &Suggestion, _profile: &Profile) -> AtlasResult<Roadmap> {
    Err(AtlasError::GenerationFailed("GEMINI_API_KEY not set".into()))
  }
}

fn failed(e: impl std::fmt::Display) -> AtlasError {
  AtlasError::GenerationFailed(e.to_string())
}

fn schema_violation(what: impl std::fmt::Display) -> AtlasError {
  AtlasError::GenerationFailed(format!("response did not match schema: {}", what))
}

// --- Response validation ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
  id: String,
  title: String,
  description: String,
  difficulty: SkillLevel,
  estimated_time: String,
  tech_stack: Vec<String>,
  learning_outcomes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoadmap {
  project_id: String,
  title: String,
  milestones: Vec<RawMilestone>,
  final_advice: String,
}

#[derive(Deserialize)]
struct RawMilestone {
  id: String,
  title: String,
  description: String,
  duration: String,
  tasks: Vec<RawTask>,
  resources: Vec<String>,
}

#[derive(Deserialize)]
struct RawTask {
  id: String,
  text: String,
}

fn ensure_unique<'a>(ids: impl IntoIterator<Item = &'a str>, scope: &str) -> AtlasResult<()> {
  let mut seen = HashSet::new();
  for id in ids {
    if !seen.insert(id) {
      return Err(schema_violation(format!("duplicate {} id {:?}", scope, id)));
    }
  }
  Ok(())
}

/// Validate a suggestion batch and attach the shared grounding sources to every item.
fn parse_suggestions(text: &str, grounding: &[String]) -> AtlasResult<Vec<Suggestion>> {
  let raw: Vec<RawSuggestion> = serde_json::from_str(text).map_err(schema_violation)?;
  ensure_unique(raw.iter().map(|s| s.id.as_str()), "suggestion")?;

  let sources = dedupe_source_urls(grounding);
  Ok(raw
    .into_iter()
    .map(|s| Suggestion {
      id: s.id,
      title: s.title,
      description: s.description,
      difficulty: s.difficulty,
      estimated_time: s.estimated_time,
      tech_stack: s.tech_stack,
      learning_outcomes: s.learning_outcomes,
      source_urls: Some(sources.clone()),
    })
    .collect())
}

/// Validate a roadmap. Completion state and progress from upstream are discarded.
fn parse_roadmap(text: &str, suggestion_id: &str) -> AtlasResult<Roadmap> {
  let raw: RawRoadmap = serde_json::from_str(text).map_err(schema_violation)?;
  ensure_unique(raw.milestones.iter().map(|m| m.id.as_str()), "milestone")?;
  for m in &raw.milestones {
    ensure_unique(m.tasks.iter().map(|t| t.id.as_str()), "task")?;
  }

  if raw.project_id != suggestion_id {
    info!(target: "generation", upstream = %raw.project_id, %suggestion_id, "Rewriting roadmap projectId to the chosen suggestion");
  }

  Ok(Roadmap {
    project_id: suggestion_id.to_string(),
    title: raw.title,
    milestones: raw
      .milestones
      .into_iter()
      .map(|m| Milestone {
        id: m.id,
        title: m.title,
        description: m.description,
        duration: m.duration,
        tasks: m.tasks.into_iter().map(|t| Task { id: t.id, text: t.text, completed: false }).collect(),
        resources: m.resources,
      })
      .collect(),
    final_advice: raw.final_advice,
    overall_progress: 0,
  })
}

fn into_reply(body: GenerateContentResponse) -> AtlasResult<Reply> {
  let candidate = body.candidates.into_iter().next()
    .ok_or_else(|| failed("no candidates in response"))?;

  let text = candidate.content
    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
    .unwrap_or_default()
    .trim()
    .to_string();
  if text.is_empty() {
    return Err(failed("empty response body"));
  }

  let source_urls = candidate.grounding_metadata
    .map(|g| g.grounding_chunks.into_iter().filter_map(|c| c.web.and_then(|w| w.uri)).collect())
    .unwrap_or_default();

  Ok(Reply { text, source_urls })
}

// --- Declared output schemas ---

fn suggestions_schema() -> Value {
  json!({
    "type": "ARRAY",
    "items": {
      "type": "OBJECT",
      "properties": {
        "id": { "type": "STRING" },
        "title": { "type": "STRING" },
        "description": { "type": "STRING" },
        "difficulty": { "type": "STRING", "enum": SkillLevel::ALL.iter().map(|l| l.as_str()).collect::<Vec<_>>() },
        "estimatedTime": { "type": "STRING" },
        "techStack": { "type": "ARRAY", "items": { "type": "STRING" } },
        "learningOutcomes": { "type": "ARRAY", "items": { "type": "STRING" } }
      },
      "required": ["id", "title", "description", "difficulty", "estimatedTime", "techStack", "learningOutcomes"]
    }
  })
}

fn roadmap_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "projectId": { "type": "STRING" },
      "title": { "type": "STRING" },
      "milestones": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "id": { "type": "STRING" },
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "duration": { "type": "STRING" },
            "tasks": {
              "type": "ARRAY",
              "items": {
                "type": "OBJECT",
                "properties": { "id": { "type": "STRING" }, "text": { "type": "STRING" } },
                "required": ["id", "text"]
              }
            },
            "resources": { "type": "ARRAY", "items": { "type": "STRING" } }
          },
          "required": ["id", "title", "description", "duration", "tasks", "resources"]
        }
      },
      "finalAdvice": { "type": "STRING" }
    },
    "required": ["projectId", "title", "milestones", "finalAdvice"]
  })
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tools: Vec<Value>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<Part>,
}
#[derive(Serialize)]
struct Part { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  response_mime_type: String,
  response_schema: Value,
  temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
  #[serde(default)] grounding_metadata: Option<GroundingMetadata>,
}
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<PartResp> }
#[derive(Deserialize)]
struct PartResp { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata { #[serde(default)] grounding_chunks: Vec<GroundingChunk> }
#[derive(Deserialize)]
struct GroundingChunk { #[serde(default)] web: Option<WebChunk> }
#[derive(Deserialize)]
struct WebChunk { #[serde(default)] uri: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
pub mod mock {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use super::*;

  /// Canned generator for driver and route tests.
  pub struct MockGenerator {
    pub suggestions: Result<Vec<Suggestion>, String>,
    pub roadmap: Result<Roadmap, String>,
    pub suggestion_calls: AtomicUsize,
    pub roadmap_calls: AtomicUsize,
    /// Simulated network latency per call.
    pub delay: Duration,
  }

  impl MockGenerator {
    pub fn new(suggestions: Result<Vec<Suggestion>, String>, roadmap: Result<Roadmap, String>) -> Self {
      Self {
        suggestions,
        roadmap,
        suggestion_calls: AtomicUsize::new(0),
        roadmap_calls: AtomicUsize::new(0),
        delay: Duration::ZERO,
      }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
      self.delay = delay;
      self
    }
  }

  #[async_trait]
  impl ProjectGenerator for MockGenerator {
    async fn generate_suggestions(&self, _profile: &Profile) -> AtlasResult<Vec<Suggestion>> {
      self.suggestion_calls.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(self.delay).await;
      self.suggestions.clone().map_err(AtlasError::GenerationFailed)
    }

    async fn generate_roadmap(&self, _suggestion: &Suggestion, _profile: &Profile) -> AtlasResult<Roadmap> {
      self.roadmap_calls.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(self.delay).await;
      self.roadmap.clone().map_err(AtlasError::GenerationFailed)
    }
  }
}
