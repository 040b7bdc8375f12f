//! Domain models: the student profile, project suggestions, and the phased roadmap.
//!
//! Wire names are camelCase so snapshots and API payloads stay readable by the frontend.

use serde::{Deserialize, Serialize};

/// Self-declared proficiency. Serialized exactly as shown to the student.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SkillLevel {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
}

impl SkillLevel {
  pub const ALL: [SkillLevel; 3] = [SkillLevel::Beginner, SkillLevel::Intermediate, SkillLevel::Advanced];

  pub fn as_str(&self) -> &'static str {
    match self {
      SkillLevel::Beginner => "Beginner",
      SkillLevel::Intermediate => "Intermediate",
      SkillLevel::Advanced => "Advanced",
    }
  }
}

/// The student's academic profile. A new submission replaces it wholesale.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub branch: String,
  pub year: String,
  pub interests: String,
  pub skill_level: SkillLevel,
  pub duration: String,
}

/// One AI-proposed project idea.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
  pub id: String,
  pub title: String,
  pub description: String,
  pub difficulty: SkillLevel,
  pub estimated_time: String,
  pub tech_stack: Vec<String>,
  pub learning_outcomes: Vec<String>,
  /// Grounding sources shared by the whole batch (0-3, unique, first-seen order).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_urls: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: String,
  pub text: String,
  #[serde(default)] pub completed: bool,
}

/// One phase of a roadmap. Task order is the order of execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
  pub id: String,
  pub title: String,
  pub description: String,
  pub duration: String,
  pub tasks: Vec<Task>,
  pub resources: Vec<String>,
}

impl Milestone {
  /// A phase counts as done once every task in it is completed.
  pub fn is_done(&self) -> bool {
    self.tasks.iter().all(|t| t.completed)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
  /// Id of the suggestion this roadmap was generated from. Not validated against the batch.
  pub project_id: String,
  pub title: String,
  pub milestones: Vec<Milestone>,
  pub final_advice: String,
  /// Kept for payload compatibility only; always 0 at creation. Use [`Roadmap::progress`].
  #[serde(default)] pub overall_progress: u8,
}

impl Roadmap {
  pub fn total_tasks(&self) -> usize {
    self.milestones.iter().map(|m| m.tasks.len()).sum()
  }

  pub fn completed_tasks(&self) -> usize {
    self.milestones
      .iter()
      .map(|m| m.tasks.iter().filter(|t| t.completed).count())
      .sum()
  }

  /// Completion in whole percent, derived from task state. 0 for a roadmap without tasks.
  pub fn progress(&self) -> u8 {
    let total = self.total_tasks();
    if total == 0 { return 0; }
    let pct = (self.completed_tasks() as f64 / total as f64) * 100.0;
    pct.round() as u8
  }

  /// Flip one task's `completed` flag. Returns false (and changes nothing) when
  /// either id is unknown.
  pub fn toggle_task(&mut self, milestone_id: &str, task_id: &str) -> bool {
    let task = self.milestones
      .iter_mut()
      .find(|m| m.id == milestone_id)
      .and_then(|m| m.tasks.iter_mut().find(|t| t.id == task_id));
    match task {
      Some(t) => {
        t.completed = !t.completed;
        true
      }
      None => false,
    }
  }
}


#[cfg(test)]
mod tests {
  use super::fixtures::roadmap;
  use super::*;

  #[test]
  fn progress_is_recomputed_from_task_state() {
    let mut r = roadmap("p1");
    assert_eq!(r.progress(), 0);
    assert!(r.toggle_task("m1", "a"));
    assert_eq!(r.progress(), 33);
    assert!(r.toggle_task("m2", "c"));
    assert_eq!(r.progress(), 67);
  }

  #[test]
  fn progress_of_roadmap_without_tasks_is_zero() {
    let mut r = roadmap("p1");
    for m in &mut r.milestones { m.tasks.clear(); }
    assert_eq!(r.total_tasks(), 0);
    assert_eq!(r.progress(), 0);

    r.milestones.clear();
    assert_eq!(r.progress(), 0);
  }

  #[test]
  fn toggling_twice_restores_the_task() {
    let original = roadmap("p1");
    let mut r = original.clone();
    r.toggle_task("m1", "b");
    assert_ne!(r, original);
    r.toggle_task("m1", "b");
    assert_eq!(r, original);
  }

  #[test]
  fn toggling_unknown_ids_changes_nothing() {
    let original = roadmap("p1");
    let mut r = original.clone();
    assert!(!r.toggle_task("m9", "a"));
    assert!(!r.toggle_task("m1", "c")); // task exists, but in another phase
    assert_eq!(r, original);
  }

  #[test]
  fn progress_never_decreases_while_completing() {
    let mut r = roadmap("p1");
    let mut last = r.progress();
    for (m, t) in [("m1", "a"), ("m1", "b"), ("m2", "c")] {
      r.toggle_task(m, t);
      assert!(r.progress() >= last);
      last = r.progress();
    }
    assert_eq!(last, 100);
  }

  #[test]
  fn milestone_done_when_all_tasks_completed() {
    let mut r = roadmap("p1");
    assert!(!r.milestones[0].is_done());
    r.toggle_task("m1", "a");
    r.toggle_task("m1", "b");
    assert!(r.milestones[0].is_done());
    assert!(!r.milestones[1].is_done());
  }

  #[test]
  fn wire_format_uses_camel_case() {
    let json = serde_json::to_value(roadmap("p1")).unwrap();
    assert_eq!(json["projectId"], "p1");
    assert_eq!(json["finalAdvice"], "Ship early.");
    assert_eq!(json["overallProgress"], 0);
    assert_eq!(json["milestones"][0]["tasks"][0]["completed"], false);

    let skill = serde_json::to_value(SkillLevel::Intermediate).unwrap();
    assert_eq!(skill, "Intermediate");
  }

  #[test]
  fn skill_level_defaults_to_beginner() {
    assert_eq!(SkillLevel::default(), SkillLevel::Beginner);
    assert_eq!(SkillLevel::ALL[0], SkillLevel::default());
  }
}
