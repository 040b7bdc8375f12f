//! Fixed choice lists offered by the profile form, and profile validation against them.

use serde::Serialize;

use crate::domain::{Profile, SkillLevel};
use crate::error::{AtlasError, AtlasResult};

pub const BRANCHES: [&str; 7] = [
  "Computer Science & Engineering",
  "Mechanical Engineering",
  "Electrical & Electronics Engineering",
  "Civil Engineering",
  "Chemical Engineering",
  "Aerospace Engineering",
  "Biomedical Engineering",
];

pub const YEARS: [&str; 5] = ["1st Year", "2nd Year", "3rd Year", "4th Year", "Masters"];

pub const DURATIONS: [&str; 4] = ["2 Weeks", "1 Month", "3 Months", "6 Months"];

/// Everything the form needs to render its selects, plus the preselected profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
  pub branches: Vec<&'static str>,
  pub years: Vec<&'static str>,
  pub durations: Vec<&'static str>,
  pub skill_levels: Vec<SkillLevel>,
  pub defaults: Profile,
}

pub fn catalog() -> Catalog {
  Catalog {
    branches: BRANCHES.to_vec(),
    years: YEARS.to_vec(),
    durations: DURATIONS.to_vec(),
    skill_levels: SkillLevel::ALL.to_vec(),
    defaults: default_profile(),
  }
}

/// Form state before the student touches anything. Interests start empty.
pub fn default_profile() -> Profile {
  Profile {
    branch: BRANCHES[0].into(),
    year: YEARS[0].into(),
    interests: String::new(),
    skill_level: SkillLevel::Beginner,
    duration: DURATIONS[1].into(),
  }
}

/// Reject profiles with empty interests or values outside the catalogs.
pub fn validate_profile(p: &Profile) -> AtlasResult<()> {
  if p.interests.trim().is_empty() {
    return Err(AtlasError::Validation("interests are required".into()));
  }
  let checks = [
    ("branch", p.branch.as_str(), &BRANCHES[..]),
    ("year", p.year.as_str(), &YEARS[..]),
    ("duration", p.duration.as_str(), &DURATIONS[..]),
  ];
  for (field, value, allowed) in checks {
    if !allowed.contains(&value) {
      return Err(AtlasError::Validation(format!("unknown {field}: {value}")));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::fixtures::profile;

  #[test]
  fn defaults_preselect_one_month() {
    let d = default_profile();
    assert_eq!(d.branch, "Computer Science & Engineering");
    assert_eq!(d.year, "1st Year");
    assert_eq!(d.duration, "1 Month");
    assert_eq!(d.skill_level, SkillLevel::Beginner);
  }

  #[test]
  fn valid_profile_passes() {
    assert!(validate_profile(&profile()).is_ok());
  }

  #[test]
  fn blank_interests_are_rejected() {
    let mut p = profile();
    p.interests = "   ".into();
    assert!(matches!(validate_profile(&p), Err(AtlasError::Validation(_))));
  }

  #[test]
  fn values_outside_catalog_are_rejected() {
    let mut p = profile();
    p.year = "5th Year".into();
    let err = validate_profile(&p).unwrap_err();
    assert!(err.to_string().contains("year"));
  }

  #[test]
  fn catalog_serializes_for_the_form() {
    let json = serde_json::to_value(catalog()).unwrap();
    assert_eq!(json["branches"].as_array().unwrap().len(), 7);
    assert_eq!(json["skillLevels"][2], "Advanced");
    assert_eq!(json["defaults"]["duration"], "1 Month");
  }
}
