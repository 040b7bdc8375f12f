//! Loading agent configuration (prompt templates) from TOML.
//!
//! See `AgentConfig` and `Prompts` for expected schema.

use serde::Deserialize;
use tracing::{info, error};

#[derive(Clone, Debug, Deserialize)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// How many ideas the suggestion prompt asks for.
  #[serde(default = "default_suggestion_count")]
  pub suggestion_count: u32,
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self { prompts: Prompts::default(), suggestion_count: default_suggestion_count() }
  }
}

fn default_suggestion_count() -> u32 { 4 }

/// Prompts used by the Gemini client.
/// Placeholders: {branch} {year} {interests} {skill_level} {duration} {count} {title}.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub suggestions_system: String,
  pub suggestions_user_template: String,
  pub roadmap_system: String,
  pub roadmap_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      suggestions_system: "You are a senior academic advisor for engineering students. Respond ONLY with JSON matching the declared schema.".into(),
      suggestions_user_template: "Research and suggest {count} high-impact, innovative engineering project ideas for the current academic year.\nStudent: {year} in {branch}.\nFocus areas: {interests}.\nSkill level: {skill_level}.\nTimeline: {duration}.\n\nRequirements:\n1. Projects must be academically rigorous and portfolio-worthy.\n2. Ground ideas in current industry trends (use search).\n3. List concrete learning outcomes such as \"Real-time Data Processing\" or \"Systems Integration\".".into(),
      roadmap_system: "You are a project lead who writes actionable execution plans. Respond ONLY with JSON matching the declared schema.".into(),
      roadmap_user_template: "Create an actionable 4-phase execution roadmap for the project \"{title}\".\nStudent: {year}, {branch}, skill level {skill_level}, timeline {duration}.\n\nPhases:\n1. Research & Architecture\n2. Core Prototyping\n3. Feature Integration\n4. Testing & Documentation\n\nGive 4 tasks per phase and 2-3 specific learning resources (docs or repositories) per phase.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "atlas_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "atlas_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "atlas_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
