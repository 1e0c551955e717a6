use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Transport(String),
  #[error("request failed, status code: {0}")]
  Http(u16),
  #[error("response has no `{0}` field")]
  MissingField(&'static str),
  #[error("response body is not valid JSON: {0}")]
  Decode(String),
  #[error("invalid batch file: {0}")]
  InputFormat(String),
  #[error("could not access responses file: {0}")]
  Io(#[from] std::io::Error),
}

impl ClientError {
  pub fn code(&self) -> &'static str {
    match self {
      ClientError::Transport(_) => "transport_error",
      ClientError::Http(_) => "http_error",
      ClientError::MissingField(_) => "missing_field",
      ClientError::Decode(_) => "decode_error",
      ClientError::InputFormat(_) => "input_format",
      ClientError::Io(_) => "io_error",
    }
  }
}

impl From<reqwest::Error> for ClientError {
  fn from(err: reqwest::Error) -> Self {
    ClientError::Transport(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn http_error_mentions_status() {
    let err = ClientError::Http(404);
    assert!(err.to_string().contains("404"));
    assert_eq!(err.code(), "http_error");
  }

  #[test]
  fn missing_field_names_the_field() {
    let err = ClientError::MissingField("response");
    assert_eq!(err.to_string(), "response has no `response` field");
  }
}
