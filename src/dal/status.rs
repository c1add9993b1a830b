use anyhow::{Context, Result};
use chrono::Utc;

use super::Db;
use crate::models::{ServiceState, Status};

pub async fn insert(
  db: &Db,
  round: i64,
  team_id: i64,
  service_id: i64,
  state: ServiceState,
) -> Result<()> {
  sqlx::query(
    "
    INSERT INTO status (round, team_id, service_id, state, timestamp)
    VALUES (?, ?, ?, ?, ?)
    ",
  )
  .bind(round)
  .bind(team_id)
  .bind(service_id)
  .bind(state)
  .bind(Utc::now())
  .execute(&db.pool)
  .await
  .context("could not insert status")?;
  Ok(())
}

/// The authoritative (most recently inserted) state of one pair in a round
pub async fn latest(
  db: &Db,
  round: i64,
  team_id: i64,
  service_id: i64,
) -> Result<Option<ServiceState>> {
  sqlx::query_scalar::<_, ServiceState>(
    "
    SELECT state FROM status
    WHERE round = ? AND team_id = ? AND service_id = ?
    ORDER BY id DESC LIMIT 1
    ",
  )
  .bind(round)
  .bind(team_id)
  .bind(service_id)
  .fetch_optional(&db.pool)
  .await
  .context("could not get latest status")
}

/// Every observation recorded during `round`, oldest first
pub async fn all_in_round(db: &Db, round: i64) -> Result<Vec<Status>> {
  sqlx::query_as::<_, Status>("SELECT * FROM status WHERE round = ? ORDER BY id")
    .bind(round)
    .fetch_all(&db.pool)
    .await
    .context("could not list statuses")
}
