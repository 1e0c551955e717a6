use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

use crate::error::ClientError;
use crate::models::{MatchedImage, QueryResult, UploadedFile};
use crate::session::Endpoints;

pub const FILE_FIELD: &str = "file";
pub const UPLOAD_MIME: &str = "image/jpeg";

pub struct DedupOutcome {
  pub query: QueryResult,
  pub matched: MatchedImage,
}

fn file_form(file: &UploadedFile) -> Result<Form, reqwest::Error> {
  let part = Part::bytes(file.bytes.clone())
    .file_name(file.filename.clone())
    .mime_str(UPLOAD_MIME)?;
  Ok(Form::new().part(FILE_FIELD, part))
}

/// Posts the image to the dedup-query endpoint and decodes its JSON verdict.
/// The body is decoded whatever the status code.
pub async fn query_image(client: &Client, url: &str, file: &UploadedFile) -> QueryResult {
  let form = match file_form(file) {
    Ok(f) => f,
    Err(err) => return QueryResult::failure(err.to_string()),
  };

  let resp = match client
    .post(url)
    .header(ACCEPT, "application/json")
    .multipart(form)
    .send()
    .await
  {
    Ok(r) => r,
    Err(err) => return QueryResult::failure(err.to_string()),
  };

  match resp.bytes().await {
    Ok(body) => QueryResult::from_body(&body),
    Err(err) => QueryResult::failure(err.to_string()),
  }
}

/// Posts the image to the match-image endpoint; only a 200 carries image bytes.
pub async fn match_image(client: &Client, url: &str, file: &UploadedFile) -> MatchedImage {
  let form = match file_form(file) {
    Ok(f) => f,
    Err(err) => return MatchedImage::failure(err.to_string()),
  };

  let resp = match client.post(url).multipart(form).send().await {
    Ok(r) => r,
    Err(err) => return MatchedImage::failure(err.to_string()),
  };

  if resp.status() != StatusCode::OK {
    return MatchedImage::failure(ClientError::Http(resp.status().as_u16()).to_string());
  }

  let mime = resp
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .filter(|v| v.starts_with("image/"))
    .unwrap_or(UPLOAD_MIME)
    .to_string();

  match resp.bytes().await {
    Ok(bytes) => MatchedImage::Image {
      mime,
      bytes: bytes.to_vec(),
    },
    Err(err) => MatchedImage::failure(err.to_string()),
  }
}

pub async fn check_image(client: &Client, endpoints: &Endpoints, file: &UploadedFile) -> DedupOutcome {
  let query = query_image(client, &endpoints.dedup_query_url, file).await;
  let matched = match_image(client, &endpoints.match_image_url, file).await;
  DedupOutcome { query, matched }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn sample_file() -> UploadedFile {
    UploadedFile::new("scan.png", "image/png", vec![1, 2, 3, 4])
  }

  fn endpoints_for(server: &MockServer) -> Endpoints {
    Endpoints {
      dedup_query_url: format!("{}/query-image/", server.uri()),
      match_image_url: format!("{}/match-images/", server.uri()),
      assistant_url: format!("{}/generate", server.uri()),
      output_dir: PathBuf::from("responses"),
    }
  }

  #[tokio::test]
  async fn query_image_sends_multipart_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/query-image/"))
      .and(header("accept", "application/json"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "duplicate": true,
        "matches": [{ "name": "old.jpg", "similarity": 0.97 }]
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = Client::new();
    let result = query_image(&client, &format!("{}/query-image/", server.uri()), &sample_file()).await;
    assert!(matches!(result, QueryResult::Success { .. }), "{result:?}");

    let requests = server.received_requests().await.expect("recorded requests");
    let body = String::from_utf8_lossy(&requests[0].body).to_string();
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"scan.png\""));
    assert!(body.contains("image/jpeg"));
  }

  #[tokio::test]
  async fn query_image_transport_failure_is_reported() {
    let client = Client::new();
    let result = query_image(&client, "http://127.0.0.1:1/query-image/", &sample_file()).await;
    match result {
      QueryResult::Failure { error } => assert!(!error.is_empty()),
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[tokio::test]
  async fn match_image_returns_bytes_on_200() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/match-images/"))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("content-type", "image/png")
          .set_body_bytes(vec![9, 8, 7]),
      )
      .mount(&server)
      .await;

    let client = Client::new();
    let matched = match_image(&client, &format!("{}/match-images/", server.uri()), &sample_file()).await;
    assert_eq!(
      matched,
      MatchedImage::Image {
        mime: "image/png".to_string(),
        bytes: vec![9, 8, 7],
      }
    );
  }

  #[tokio::test]
  async fn match_image_404_is_error_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/match-images/"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let client = Client::new();
    let matched = match_image(&client, &format!("{}/match-images/", server.uri()), &sample_file()).await;
    match matched {
      MatchedImage::Failure { error } => assert!(error.contains("404"), "{error}"),
      MatchedImage::Image { .. } => panic!("no image expected on 404"),
    }
  }

  #[tokio::test]
  async fn check_image_calls_both_endpoints_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/query-image/"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": "no index" })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/match-images/"))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1]))
      .expect(1)
      .mount(&server)
      .await;

    let client = Client::new();
    let outcome = check_image(&client, &endpoints_for(&server), &sample_file()).await;
    assert_eq!(outcome.query, QueryResult::failure("no index"));
    assert!(matches!(outcome.matched, MatchedImage::Image { ref mime, .. } if mime == "image/jpeg"));

    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests[0].url.path(), "/query-image/");
    assert_eq!(requests[1].url.path(), "/match-images/");
  }
}
