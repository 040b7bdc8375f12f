//! Small utility helpers used across modules.

use reqwest::Url;

/// Upper bound on grounding links attached to a suggestion batch.
pub const MAX_SOURCE_URLS: usize = 3;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max { return s.to_string(); }
  let mut end = max;
  while !s.is_char_boundary(end) { end -= 1; }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// Keep the first `MAX_SOURCE_URLS` distinct, parseable http(s) URLs in first-seen order.
pub fn dedupe_source_urls<I, S>(urls: I) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut out: Vec<String> = Vec::new();
  for raw in urls {
    let u = raw.as_ref().trim();
    if u.is_empty() || out.iter().any(|seen| seen == u) { continue; }
    match Url::parse(u) {
      Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() => {
        out.push(u.to_string());
      }
      _ => continue,
    }
    if out.len() == MAX_SOURCE_URLS { break; }
  }
  out
}

/// Display label for a source link: its hostname without a leading "www.".
pub fn source_host(url: &str) -> Option<String> {
  let parsed = Url::parse(url).ok()?;
  let host = parsed.host_str()?;
  Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// `Project_Atlas_<title>.<ext>` with every whitespace run collapsed to one underscore.
pub fn export_filename(title: &str, ext: &str) -> String {
  let slug = title.split_whitespace().collect::<Vec<_>>().join("_");
  format!("Project_Atlas_{}.{}", slug, ext)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_occurrences() {
    let out = fill_template("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x then y");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let t = trunc_for_log("ééééé", 3);
    assert!(t.starts_with("é…"));
  }

  #[test]
  fn source_urls_are_deduped_capped_and_ordered() {
    let urls = dedupe_source_urls([
      "https://a.example/1",
      "",
      "https://a.example/1",
      "not a url",
      "https://b.example/2",
      "ftp://c.example/3",
      "https://c.example/3",
      "https://d.example/4",
    ]);
    assert_eq!(urls, vec!["https://a.example/1", "https://b.example/2", "https://c.example/3"]);
  }

  #[test]
  fn source_host_strips_www() {
    assert_eq!(source_host("https://www.nature.com/articles/x").as_deref(), Some("nature.com"));
    assert_eq!(source_host("https://arxiv.org/abs/1").as_deref(), Some("arxiv.org"));
    assert_eq!(source_host("nope"), None);
  }

  #[test]
  fn export_filename_replaces_whitespace_runs() {
    assert_eq!(export_filename("Smart  Traffic\tLights", "md"), "Project_Atlas_Smart_Traffic_Lights.md");
  }
}
