use anyhow::{Context, Result};
use chrono::Utc;

use super::Db;
use crate::models::{Capture, Flag};

/// Record that `team_id` captured `flag_id`. Returns `false` when that team
/// already holds this flag, in which case nothing is written.
pub async fn insert(db: &Db, flag_id: i64, team_id: i64) -> Result<bool> {
  let result = sqlx::query(
    "
    INSERT OR IGNORE INTO captured_flag (flag_id, team_id, timestamp)
    VALUES (?, ?, ?)
    ",
  )
  .bind(flag_id)
  .bind(team_id)
  .bind(Utc::now())
  .execute(&db.pool)
  .await
  .context("could not insert captured flag")?;

  Ok(result.rows_affected() == 1)
}

pub async fn is_captured(db: &Db, flag_id: i64, team_id: i64) -> Result<bool> {
  sqlx::query_scalar::<_, bool>(
    "
    SELECT EXISTS(
      SELECT 1 FROM captured_flag WHERE flag_id = ? AND team_id = ?
    )
    ",
  )
  .bind(flag_id)
  .bind(team_id)
  .fetch_one(&db.pool)
  .await
  .context("could not check capture")
}

#[derive(sqlx::FromRow)]
struct CaptureRow {
  #[sqlx(flatten)]
  flag: Flag,
  captured_by: i64,
}

/// Every capture of a flag planted in `round`, one entry per capturing team
pub async fn all_in_round(db: &Db, round: i64) -> Result<Vec<Capture>> {
  let rows = sqlx::query_as::<_, CaptureRow>(
    "
    SELECT flag.*, captured_flag.team_id AS captured_by
    FROM captured_flag
    JOIN flag ON flag.id = captured_flag.flag_id
    WHERE flag.round = ?
    ORDER BY captured_flag.id
    ",
  )
  .bind(round)
  .fetch_all(&db.pool)
  .await
  .context("could not list captured flags")?;

  Ok(
    rows
      .into_iter()
      .map(|row| Capture {
        flag: row.flag,
        team_id: row.captured_by,
      })
      .collect(),
  )
}
