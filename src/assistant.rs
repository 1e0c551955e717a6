use reqwest::{Client, StatusCode};

use crate::error::ClientError;
use crate::highlight::{self, Span};

pub const PROMPT_PARAM: &str = "prompt";
pub const RESPONSE_FIELD: &str = "response";

pub struct Answer {
  pub prompt: String,
  pub response: String,
  pub spans: Vec<Span>,
  pub html: String,
}

/// Sends one prompt to the assistant endpoint and returns its non-empty
/// `response` text.
pub async fn ask(client: &Client, url: &str, prompt: &str) -> Result<String, ClientError> {
  let resp = client
    .post(url)
    .query(&[(PROMPT_PARAM, prompt)])
    .send()
    .await?;

  let status = resp.status();
  if status != StatusCode::OK {
    return Err(ClientError::Http(status.as_u16()));
  }

  let body = resp.bytes().await?;
  let value: serde_json::Value =
    serde_json::from_slice(&body).map_err(|err| ClientError::Decode(err.to_string()))?;

  match value.get(RESPONSE_FIELD).and_then(|v| v.as_str()) {
    Some(text) if !text.is_empty() => Ok(text.to_string()),
    _ => Err(ClientError::MissingField(RESPONSE_FIELD)),
  }
}

pub async fn answer<S: AsRef<str>>(
  client: &Client,
  url: &str,
  prompt: &str,
  keywords: &[S],
) -> Result<Answer, ClientError> {
  let response = ask(client, url, prompt).await?;
  let spans = highlight::highlight(&response, keywords);
  let html = highlight::to_html(&spans);
  Ok(Answer {
    prompt: prompt.to_string(),
    response,
    spans,
    html,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::highlight::DEFAULT_KEYWORDS;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn assistant_returning(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/generate"))
      .respond_with(template)
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn ask_sends_prompt_as_query_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/generate"))
      .and(query_param("prompt", "患者咳嗽一周"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "response": "结论：感冒" })))
      .expect(1)
      .mount(&server)
      .await;

    let client = Client::new();
    let text = ask(&client, &format!("{}/generate", server.uri()), "患者咳嗽一周")
      .await
      .expect("assistant should answer");
    assert_eq!(text, "结论：感冒");
  }

  #[tokio::test]
  async fn answer_renders_highlighted_text() {
    let server =
      assistant_returning(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "response": "x" }))).await;

    let client = Client::new();
    let answer = answer(&client, &format!("{}/generate", server.uri()), "q", &DEFAULT_KEYWORDS)
      .await
      .expect("assistant should answer");
    assert_eq!(answer.response, "x");
    assert_eq!(answer.spans, vec![Span::Plain("x".to_string())]);
    assert_eq!(answer.html, "x");
  }

  #[tokio::test]
  async fn non_200_is_http_error() {
    let server = assistant_returning(ResponseTemplate::new(503)).await;
    let client = Client::new();
    let err = ask(&client, &format!("{}/generate", server.uri()), "q")
      .await
      .expect_err("503 should fail");
    assert!(matches!(err, ClientError::Http(503)));
  }

  #[tokio::test]
  async fn missing_or_empty_response_field() {
    for body in [serde_json::json!({ "detail": "ok" }), serde_json::json!({ "response": "" })] {
      let server = assistant_returning(ResponseTemplate::new(200).set_body_json(body)).await;
      let client = Client::new();
      let err = ask(&client, &format!("{}/generate", server.uri()), "q")
        .await
        .expect_err("missing response should fail");
      assert!(matches!(err, ClientError::MissingField(RESPONSE_FIELD)));
    }
  }

  #[tokio::test]
  async fn non_json_body_is_decode_error() {
    let server = assistant_returning(ResponseTemplate::new(200).set_body_string("internal")).await;
    let client = Client::new();
    let err = ask(&client, &format!("{}/generate", server.uri()), "q")
      .await
      .expect_err("plain text should fail");
    assert!(matches!(err, ClientError::Decode(_)));
  }

  #[tokio::test]
  async fn unreachable_endpoint_is_transport_error() {
    let client = Client::new();
    let err = ask(&client, "http://127.0.0.1:1/generate", "q")
      .await
      .expect_err("connection should fail");
    assert!(matches!(err, ClientError::Transport(_)));
  }
}
