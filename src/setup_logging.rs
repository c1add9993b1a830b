use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Log to stderr, or append to `log_file` when one is configured. `RUST_LOG`
/// overrides the default `info` level.
pub fn setup_logging(log_file: Option<&Path>) -> Result<()> {
  let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

  if let Some(path) = log_file {
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .with_context(|| format!("could not open log file {}", path.display()))?;
    builder.target(Target::Pipe(Box::new(file)));
  }

  builder.try_init().context("logger already set up")
}
