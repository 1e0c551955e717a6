use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::assistant;
use crate::batch::{self, BatchEvent};
use crate::config::{save_config, AppConfig};
use crate::dedup::{self, FILE_FIELD};
use crate::error::ClientError;
use crate::logger::Logger;
use crate::models::{
  DedupResponse, MatchedImage, PromptBatch, PromptRequest, PromptResponse, QueryResult, UploadedFile,
};
use crate::session::{Endpoints, Session, SessionUpdate};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub struct RouterState {
  pub started_at: Instant,
  pub config_path: PathBuf,
  pub config: Arc<RwLock<AppConfig>>,
  pub session: Arc<RwLock<Session>>,
  pub logger: Arc<Logger>,
  pub client: reqwest::Client,
}

pub fn app(state: RouterState) -> Router {
  Router::new()
    .route("/", get(index))
    .route("/health", get(health))
    .route("/api/config", get(get_config).put(set_config))
    .route("/api/session", get(get_session).put(put_session))
    .route("/api/session/prompt", delete(clear_prompt))
    .route("/api/dedup", post(dedup_check))
    .route("/api/prompt", post(prompt))
    .route("/api/batch", post(batch_run))
    .route("/api/responses", get(responses))
    .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .with_state(Arc::new(state))
}

pub async fn run_router(listener: TcpListener, state: RouterState) -> anyhow::Result<()> {
  let listener = tokio::net::TcpListener::from_std(listener)?;
  axum::serve(listener, app(state)).await?;
  Ok(())
}

async fn index() -> Html<&'static str> {
  Html(include_str!("ui.html"))
}

async fn health(State(state): State<Arc<RouterState>>) -> Json<serde_json::Value> {
  let uptime = state.started_at.elapsed().as_millis();
  Json(serde_json::json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
    "uptime_ms": uptime
  }))
}

async fn get_config(State(state): State<Arc<RouterState>>) -> Json<AppConfig> {
  Json(state.config.read().await.clone())
}

async fn set_config(State(state): State<Arc<RouterState>>, Json(config): Json<AppConfig>) -> Response {
  if let Err(err) = save_config(&state.config_path, &config) {
    state.logger.error(&format!("saving config failed: {err}"));
    return error_response(StatusCode::INTERNAL_SERVER_ERROR, "config_save_failed", &err.to_string());
  }
  *state.config.write().await = config.clone();
  state.logger.info("config updated");
  Json(config).into_response()
}

async fn get_session(State(state): State<Arc<RouterState>>) -> Json<Session> {
  Json(state.session.read().await.clone())
}

async fn put_session(
  State(state): State<Arc<RouterState>>,
  Json(update): Json<SessionUpdate>,
) -> Json<Session> {
  let mut session = state.session.write().await;
  session.apply(update);
  Json(session.clone())
}

async fn clear_prompt(State(state): State<Arc<RouterState>>) -> Json<Session> {
  let mut session = state.session.write().await;
  session.clear();
  state.logger.info("session prompt cleared");
  Json(session.clone())
}

async fn endpoints(state: &RouterState) -> (AppConfig, Endpoints) {
  let config = state.config.read().await.clone();
  let endpoints = state.session.read().await.endpoints(&config);
  (config, endpoints)
}

async fn dedup_check(State(state): State<Arc<RouterState>>, multipart: Multipart) -> Response {
  let file = match read_file_field(multipart).await {
    Ok(Some(f)) => f,
    Ok(None) => return error_response(StatusCode::BAD_REQUEST, "file_missing", "Choose an image to check."),
    Err(err) => return error_response(StatusCode::BAD_REQUEST, "upload_failed", &err.to_string()),
  };
  if let Err(err) = file.check_image_extension() {
    return client_error_response(&err);
  }

  let (_, endpoints) = endpoints(&state).await;
  state.logger.info(&format!(
    "dedup check for {} ({}, {} bytes)",
    file.filename,
    file.mime,
    file.bytes.len()
  ));

  let outcome = dedup::check_image(&state.client, &endpoints, &file).await;
  if let QueryResult::Failure { error } = &outcome.query {
    state.logger.warn(&format!("dedup query failed: {error}"));
  }
  if let MatchedImage::Failure { error } = &outcome.matched {
    state.logger.warn(&format!("match image failed: {error}"));
  }

  Json(DedupResponse {
    filename: file.filename,
    query: outcome.query,
    matched_image: outcome.matched.to_view(),
  })
  .into_response()
}

async fn prompt(State(state): State<Arc<RouterState>>, Json(req): Json<PromptRequest>) -> Response {
  if req.prompt.trim().is_empty() {
    return error_response(StatusCode::BAD_REQUEST, "prompt_missing", "Enter a prompt first.");
  }

  state.session.write().await.prompt = req.prompt.clone();
  let (config, endpoints) = endpoints(&state).await;

  match assistant::answer(&state.client, &endpoints.assistant_url, &req.prompt, &config.keywords).await {
    Ok(answer) => Json(PromptResponse {
      prompt: answer.prompt,
      response: answer.response,
      spans: answer.spans,
      html: answer.html,
    })
    .into_response(),
    Err(err) => {
      state.logger.warn(&format!("prompt failed: {err}"));
      client_error_response(&err)
    }
  }
}

async fn batch_run(State(state): State<Arc<RouterState>>, multipart: Multipart) -> Response {
  let file = match read_file_field(multipart).await {
    Ok(Some(f)) => f,
    Ok(None) => return error_response(StatusCode::BAD_REQUEST, "file_missing", "Choose a JSON file of prompts."),
    Err(err) => return error_response(StatusCode::BAD_REQUEST, "upload_failed", &err.to_string()),
  };

  let prompts = match PromptBatch::from_json(&file.bytes) {
    Ok(b) => b,
    Err(err) => {
      state.logger.warn(&format!("rejected batch file {}: {err}", file.filename));
      return client_error_response(&err);
    }
  };

  let (config, endpoints) = endpoints(&state).await;
  let client = state.client.clone();
  let logger = state.logger.clone();
  let (tx, rx) = mpsc::unbounded_channel();

  tokio::spawn(async move {
    let emit = move |event: BatchEvent| {
      let _ = tx.send(event);
    };
    match batch::run_batch(
      &client,
      &endpoints.assistant_url,
      &prompts,
      &config.keywords,
      &endpoints.output_dir,
      &logger,
      emit,
    )
    .await
    {
      Ok(report) => logger.info(&format!(
        "batch {}: saved {} responses to {} ({} failed)",
        report.run_id,
        report.records.len(),
        report.path.display(),
        report.failed
      )),
      Err(err) => logger.error(&format!("batch run failed: {err}")),
    }
  });

  Sse::new(batch_events(rx))
    .keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(15)))
    .into_response()
}

fn batch_events(
  mut rx: mpsc::UnboundedReceiver<BatchEvent>,
) -> impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>> {
  stream! {
    while let Some(event) = rx.recv().await {
      let data = match serde_json::to_string(&event) {
        Ok(d) => d,
        Err(_) => continue,
      };
      yield Ok(Event::default().event(event.name()).data(data));
    }
  }
}

async fn responses(State(state): State<Arc<RouterState>>) -> Response {
  let (_, endpoints) = endpoints(&state).await;
  match batch::load_responses(&endpoints.output_dir) {
    Ok(records) => Json(records).into_response(),
    Err(ClientError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => error_response(
      StatusCode::NOT_FOUND,
      "responses_missing",
      "No batch has been saved yet.",
    ),
    Err(err) => client_error_response(&err),
  }
}

async fn read_file_field(mut multipart: Multipart) -> Result<Option<UploadedFile>, axum::extract::multipart::MultipartError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(FILE_FIELD) {
      continue;
    }

    let filename = field.file_name().unwrap_or("upload").to_string();
    let mime = field
      .content_type()
      .unwrap_or("application/octet-stream")
      .to_string();
    let data = field.bytes().await?;
    return Ok(Some(UploadedFile::new(filename, mime, data.to_vec())));
  }
  Ok(None)
}

fn client_error_response(err: &ClientError) -> Response {
  let status = match err {
    ClientError::InputFormat(_) => StatusCode::BAD_REQUEST,
    ClientError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    ClientError::Transport(_)
    | ClientError::Http(_)
    | ClientError::MissingField(_)
    | ClientError::Decode(_) => StatusCode::BAD_GATEWAY,
  };
  error_response(status, err.code(), &err.to_string())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
  let body = Json(serde_json::json!({ "error": message, "code": code }));
  (status, body).into_response()
}
