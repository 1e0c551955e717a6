use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use chrono::Utc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
  Info,
  Warn,
  Error,
}

impl Level {
  fn as_str(self) -> &'static str {
    match self {
      Level::Info => "INFO",
      Level::Warn => "WARN",
      Level::Error => "ERROR",
    }
  }
}

pub struct Logger {
  file: Mutex<std::fs::File>,
  echo: bool,
}

impl Logger {
  /// Opens `path` for appending. With `echo` every line is copied to stderr.
  pub fn new(path: &Path, echo: bool) -> anyhow::Result<Self> {
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok(Self {
      file: Mutex::new(file),
      echo,
    })
  }

  pub fn log(&self, level: Level, message: &str) {
    let ts = Utc::now().to_rfc3339();
    let line = format!("[{ts}] {}: {message}\n", level.as_str());
    if self.echo {
      eprint!("{line}");
    }
    if let Err(err) = self.write_line(&line) {
      if !self.echo {
        eprint!("{line}");
      }
      eprintln!("log write failed: {err}");
    }
  }

  fn write_line(&self, line: &str) -> std::io::Result<()> {
    let mut file = self
      .file
      .lock()
      .map_err(|_| std::io::Error::other("log file lock poisoned"))?;
    file.write_all(line.as_bytes())
  }

  pub fn info(&self, message: &str) {
    self.log(Level::Info, message);
  }

  pub fn warn(&self, message: &str) {
    self.log(Level::Warn, message);
  }

  pub fn error(&self, message: &str) {
    self.log(Level::Error, message);
  }
}
