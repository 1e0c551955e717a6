use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::highlight::Span;

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Clone, Debug)]
pub struct UploadedFile {
  pub filename: String,
  pub mime: String,
  pub bytes: Vec<u8>,
}

impl UploadedFile {
  pub fn new(filename: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self {
      filename: filename.into(),
      mime: mime.into(),
      bytes,
    }
  }

  pub fn check_image_extension(&self) -> Result<(), ClientError> {
    let ext = self
      .filename
      .rsplit_once('.')
      .map(|(_, ext)| ext.to_ascii_lowercase())
      .unwrap_or_default();
    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
      Ok(())
    } else {
      Err(ClientError::InputFormat(format!(
        "{} is not a jpg, jpeg or png image",
        self.filename
      )))
    }
  }
}

/// Result of the dedup-query endpoint, decoded once at the boundary.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult {
  Success {
    result: serde_json::Map<String, serde_json::Value>,
  },
  Failure {
    error: String,
  },
}

impl QueryResult {
  pub fn failure(error: impl Into<String>) -> Self {
    QueryResult::Failure { error: error.into() }
  }

  pub fn from_body(body: &[u8]) -> Self {
    let value = match serde_json::from_slice::<serde_json::Value>(body) {
      Ok(v) => v,
      Err(err) => return Self::failure(ClientError::Decode(err.to_string()).to_string()),
    };

    match value {
      serde_json::Value::Object(map) => {
        if let Some(error) = map.get("error") {
          let text = match error.as_str() {
            Some(s) => s.to_string(),
            None => error.to_string(),
          };
          return Self::failure(text);
        }
        if map.is_empty() {
          return Self::failure("unknown error");
        }
        QueryResult::Success { result: map }
      }
      other => Self::failure(format!("expected a JSON object, got {other}")),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MatchedImage {
  Image { mime: String, bytes: Vec<u8> },
  Failure { error: String },
}

impl MatchedImage {
  pub fn failure(error: impl Into<String>) -> Self {
    MatchedImage::Failure { error: error.into() }
  }

  pub fn to_view(&self) -> MatchedImageView {
    match self {
      MatchedImage::Image { mime, bytes } => MatchedImageView::Image {
        mime: mime.clone(),
        base64: base64::engine::general_purpose::STANDARD.encode(bytes),
      },
      MatchedImage::Failure { error } => MatchedImageView::Failure { error: error.clone() },
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchedImageView {
  Image { mime: String, base64: String },
  Failure { error: String },
}

/// Ordered prompts of one batch run.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptBatch(Vec<String>);

impl PromptBatch {
  pub fn from_json(data: &[u8]) -> Result<Self, ClientError> {
    let value: serde_json::Value = serde_json::from_slice(data)
      .map_err(|err| ClientError::InputFormat(format!("not valid JSON: {err}")))?;
    let items = value
      .as_array()
      .ok_or_else(|| ClientError::InputFormat("expected a JSON array of prompts".to_string()))?;

    let mut prompts = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
      let prompt = item.as_str().ok_or_else(|| {
        ClientError::InputFormat(format!("item {} is not a string", idx + 1))
      })?;
      prompts.push(prompt.to_string());
    }
    Ok(Self(prompts))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn prompts(&self) -> &[String] {
    &self.0
  }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResponseRecord {
  pub prompt: String,
  pub response: String,
}

#[derive(Serialize, Deserialize)]
pub struct PromptRequest {
  pub prompt: String,
}

#[derive(Serialize, Deserialize)]
pub struct PromptResponse {
  pub prompt: String,
  pub response: String,
  pub spans: Vec<Span>,
  pub html: String,
}

#[derive(Serialize, Deserialize)]
pub struct DedupResponse {
  pub filename: String,
  pub query: QueryResult,
  pub matched_image: MatchedImageView,
}
