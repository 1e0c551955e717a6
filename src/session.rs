use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Per-user state kept between actions: the last prompt typed and any
/// endpoint overrides entered in the page.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Session {
  pub prompt: String,
  pub assistant_url: Option<String>,
  pub dedup_query_url: Option<String>,
  pub match_image_url: Option<String>,
  pub output_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SessionUpdate {
  pub prompt: Option<String>,
  pub assistant_url: Option<String>,
  pub dedup_query_url: Option<String>,
  pub match_image_url: Option<String>,
  pub output_dir: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Endpoints {
  pub dedup_query_url: String,
  pub match_image_url: String,
  pub assistant_url: String,
  pub output_dir: PathBuf,
}

impl Session {
  /// Fields present in `update` replace the current value; a blank string
  /// removes the override.
  pub fn apply(&mut self, update: SessionUpdate) {
    if let Some(prompt) = update.prompt {
      self.prompt = prompt;
    }
    if let Some(url) = update.assistant_url {
      self.assistant_url = non_blank(url);
    }
    if let Some(url) = update.dedup_query_url {
      self.dedup_query_url = non_blank(url);
    }
    if let Some(url) = update.match_image_url {
      self.match_image_url = non_blank(url);
    }
    if let Some(dir) = update.output_dir {
      self.output_dir = non_blank(dir).map(PathBuf::from);
    }
  }

  pub fn clear(&mut self) {
    self.prompt.clear();
  }

  pub fn endpoints(&self, config: &AppConfig) -> Endpoints {
    Endpoints {
      dedup_query_url: resolve_url(self.dedup_query_url.as_deref(), &config.dedup_query_url),
      match_image_url: resolve_url(self.match_image_url.as_deref(), &config.match_image_url),
      assistant_url: resolve_url(self.assistant_url.as_deref(), &config.assistant_url),
      output_dir: self
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.clone()),
    }
  }
}

fn non_blank(value: String) -> Option<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

fn resolve_url(override_url: Option<&str>, default: &str) -> String {
  let candidate = override_url.unwrap_or(default).trim();
  if candidate.is_empty() {
    return default.to_string();
  }

  if candidate.starts_with("http://") || candidate.starts_with("https://") {
    candidate.to_string()
  } else {
    format!("http://{}", candidate)
  }
}
