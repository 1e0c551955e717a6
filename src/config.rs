use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::highlight::DEFAULT_KEYWORDS;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
  pub bind_addr: String,
  pub dedup_query_url: String,
  pub match_image_url: String,
  pub assistant_url: String,
  pub output_dir: PathBuf,
  pub keywords: Vec<String>,
  pub log_file: String,
  pub log_to_stderr: bool,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      bind_addr: "127.0.0.1:8501".to_string(),
      dedup_query_url: "https://u494575-8903-e70e978c.westx.seetacloud.com:8443/query-image/"
        .to_string(),
      match_image_url: "https://u494575-8903-e70e978c.westx.seetacloud.com:8443/match-images/"
        .to_string(),
      assistant_url: "http://127.0.0.1:8000/generate".to_string(),
      output_dir: PathBuf::from("responses"),
      keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
      log_file: "casedesk.log".to_string(),
      log_to_stderr: true,
    }
  }
}

/// Reads the config at `path`, writing the defaults there first when the
/// file does not exist yet.
pub fn load_or_init(path: &Path) -> anyhow::Result<AppConfig> {
  if !path.exists() {
    let config = AppConfig::default();
    save_config(path, &config)?;
    return Ok(config);
  }

  let data = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read config {}", path.display()))?;
  serde_json::from_str(&data).with_context(|| format!("invalid config {}", path.display()))
}

pub fn save_config(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(config)?;
  std::fs::write(path, json).with_context(|| format!("failed to write config {}", path.display()))
}
