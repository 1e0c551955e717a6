use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

use crate::assistant;
use crate::error::ClientError;
use crate::highlight::{self, Span};
use crate::logger::Logger;
use crate::models::{PromptBatch, ResponseRecord};

pub const OUTPUT_FILE: &str = "all_responses.json";

#[derive(Serialize, Clone, Debug)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
  Started {
    run_id: String,
    total: usize,
    started_at: DateTime<Utc>,
  },
  Item {
    index: usize,
    record: ResponseRecord,
    spans: Vec<Span>,
    html: String,
  },
  Warning {
    index: usize,
    prompt: String,
    message: String,
  },
  Progress {
    done: usize,
    total: usize,
  },
  Finished {
    path: String,
    succeeded: usize,
    failed: usize,
  },
  SaveFailed {
    message: String,
  },
}

impl BatchEvent {
  pub fn name(&self) -> &'static str {
    match self {
      BatchEvent::Started { .. } => "started",
      BatchEvent::Item { .. } => "item",
      BatchEvent::Warning { .. } => "warning",
      BatchEvent::Progress { .. } => "progress",
      BatchEvent::Finished { .. } => "finished",
      BatchEvent::SaveFailed { .. } => "save_failed",
    }
  }
}

#[derive(Debug)]
pub struct BatchReport {
  pub run_id: String,
  pub records: Vec<ResponseRecord>,
  pub failed: usize,
  pub path: PathBuf,
}

/// Runs every prompt of `batch` against the assistant, one after another,
/// then writes the collected records to `<output_dir>/all_responses.json`.
/// A failing item is reported through `emit` and skipped; only a failed
/// write ends the run with an error.
pub async fn run_batch<S, F>(
  client: &Client,
  url: &str,
  batch: &PromptBatch,
  keywords: &[S],
  output_dir: &Path,
  logger: &Logger,
  mut emit: F,
) -> Result<BatchReport, ClientError>
where
  S: AsRef<str>,
  F: FnMut(BatchEvent),
{
  let run_id = uuid::Uuid::new_v4().to_string();
  let total = batch.len();
  logger.info(&format!("batch {run_id}: {total} prompts against {url}"));
  emit(BatchEvent::Started {
    run_id: run_id.clone(),
    total,
    started_at: Utc::now(),
  });

  let mut records = Vec::new();
  let mut failed = 0;

  for (index, prompt) in batch.prompts().iter().enumerate() {
    match assistant::ask(client, url, prompt).await {
      Ok(response) => {
        let spans = highlight::highlight(&response, keywords);
        let html = highlight::to_html(&spans);
        let record = ResponseRecord {
          prompt: prompt.clone(),
          response,
        };
        records.push(record.clone());
        emit(BatchEvent::Item {
          index,
          record,
          spans,
          html,
        });
      }
      Err(err) => {
        failed += 1;
        logger.warn(&format!("batch {run_id}: item {} failed: {err}", index + 1));
        emit(BatchEvent::Warning {
          index,
          prompt: prompt.clone(),
          message: err.to_string(),
        });
      }
    }

    emit(BatchEvent::Progress {
      done: index + 1,
      total,
    });
  }

  let path = match save_responses(output_dir, &records) {
    Ok(p) => p,
    Err(err) => {
      logger.error(&format!("batch {run_id}: {err}"));
      emit(BatchEvent::SaveFailed {
        message: err.to_string(),
      });
      return Err(err);
    }
  };

  emit(BatchEvent::Finished {
    path: path.display().to_string(),
    succeeded: records.len(),
    failed,
  });

  Ok(BatchReport {
    run_id,
    records,
    failed,
    path,
  })
}

pub fn save_responses(output_dir: &Path, records: &[ResponseRecord]) -> Result<PathBuf, ClientError> {
  std::fs::create_dir_all(output_dir)?;
  let path = output_dir.join(OUTPUT_FILE);
  let json = serde_json::to_string_pretty(records).map_err(std::io::Error::from)?;
  std::fs::write(&path, json)?;
  Ok(path)
}

pub fn load_responses(output_dir: &Path) -> Result<Vec<ResponseRecord>, ClientError> {
  let data = std::fs::read(output_dir.join(OUTPUT_FILE))?;
  let records = serde_json::from_slice(&data).map_err(|err| ClientError::Decode(err.to_string()))?;
  Ok(records)
}
