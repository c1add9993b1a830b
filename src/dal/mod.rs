//! Database abstraction layer

use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

pub mod advisory;
pub mod capture;
pub mod flag;
pub mod round;
pub mod round_result;
pub mod service;
pub mod status;
pub mod team;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Db {
  pool: SqlitePool,
  /// Serializes "read previous cumulative result, then insert"
  round_result_lock: Arc<Mutex<()>>,
}

impl Deref for Db {
  type Target = SqlitePool;

  fn deref(&self) -> &Self::Target {
    &self.pool
  }
}

impl Db {
  pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
    let options = SqliteConnectOptions::from_str(url)
      .with_context(|| format!("bad database url {:?}", url))?
      .create_if_missing(true)
      .journal_mode(SqliteJournalMode::Wal)
      .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
      .max_connections(max_connections)
      .connect_with(options)
      .await
      .context("could not connect to the db")?;

    Ok(Db::wrap(pool))
  }

  /// A private, already migrated database living in memory.
  ///
  /// Every connection to `sqlite::memory:` opens a distinct database, so the
  /// pool is capped at a single connection.
  pub async fn in_memory() -> Result<Self> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .context("could not open in-memory db")?;

    let db = Db::wrap(pool);
    db.migrate().await?;
    Ok(db)
  }

  fn wrap(pool: SqlitePool) -> Self {
    Db {
      pool,
      round_result_lock: Arc::new(Mutex::new(())),
    }
  }

  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .context("failed to migrate")
  }

  /// Wipe every contest table, including teams and services
  pub async fn clean(&self) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    for table in &[
      "advisory",
      "round_result",
      "captured_flag",
      "flag",
      "status",
      "round",
      "service",
      "team",
    ] {
      sqlx::query(&format!("DELETE FROM {}", table))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("could not clean table {}", table))?;
    }

    // restart the id sequences so the first round is round 1 again
    sqlx::query("DELETE FROM sqlite_sequence")
      .execute(&mut *tx)
      .await
      .context("could not reset sequences")?;

    tx.commit().await?;
    Ok(())
  }

  pub(crate) fn round_result_lock(&self) -> &Mutex<()> {
    &self.round_result_lock
  }
}
