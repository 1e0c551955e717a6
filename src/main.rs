mod assistant;
mod batch;
mod config;
mod dedup;
mod error;
mod highlight;
mod logger;
mod models;
mod router;
mod session;

use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use tokio::sync::RwLock;

use config::load_or_init;
use router::{run_router, RouterState};
use session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let data_dir = std::env::var_os("CASEDESK_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."));
  std::fs::create_dir_all(&data_dir)
    .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

  let config_path = data_dir.join("config.json");
  let config = load_or_init(&config_path)
    .with_context(|| format!("failed to load config {}", config_path.display()))?;

  let log_path = data_dir.join(&config.log_file);
  let logger = Arc::new(logger::Logger::new(&log_path, config.log_to_stderr)?);
  logger.info("CaseDesk starting up");

  let listener = std::net::TcpListener::bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?;
  listener.set_nonblocking(true)?;
  let addr = listener.local_addr()?;
  logger.info(&format!("serving on http://{addr}"));

  let state = RouterState {
    started_at: Instant::now(),
    config_path,
    config: Arc::new(RwLock::new(config)),
    session: Arc::new(RwLock::new(Session::default())),
    logger: logger.clone(),
    client: reqwest::Client::new(),
  };

  if let Err(err) = run_router(listener, state).await {
    logger.error(&format!("router error: {err}"));
    return Err(err);
  }
  Ok(())
}
