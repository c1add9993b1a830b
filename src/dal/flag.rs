use anyhow::{Context, Result};

use super::Db;
use crate::models::{Flag, NewFlag};

pub async fn insert(db: &Db, flag: &NewFlag) -> Result<Flag> {
  let id = sqlx::query(
    "
    INSERT INTO flag (flag, round, team_id, service_id, cred)
    VALUES (?, ?, ?, ?, ?)
    ",
  )
  .bind(&flag.flag)
  .bind(flag.round)
  .bind(flag.team_id)
  .bind(flag.service_id)
  .bind(&flag.cred)
  .execute(&db.pool)
  .await
  .context("could not insert flag")?
  .last_insert_rowid();

  Ok(Flag {
    id,
    flag: flag.flag.clone(),
    round: flag.round,
    team_id: flag.team_id,
    service_id: flag.service_id,
    cred: flag.cred.clone(),
  })
}

pub async fn exists(db: &Db, token: &str) -> Result<bool> {
  sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM flag WHERE flag = ?)")
    .bind(token)
    .fetch_one(&db.pool)
    .await
    .context("could not check flag existence")
}

pub async fn by_token(db: &Db, token: &str) -> Result<Option<Flag>> {
  sqlx::query_as::<_, Flag>("SELECT * FROM flag WHERE flag = ?")
    .bind(token)
    .fetch_optional(&db.pool)
    .await
    .context("could not look up flag")
}

/// The flag planted into one (round, team, service) triple
pub async fn planted(
  db: &Db,
  round: i64,
  team_id: i64,
  service_id: i64,
) -> Result<Option<Flag>> {
  sqlx::query_as::<_, Flag>(
    "
    SELECT * FROM flag
    WHERE round = ? AND team_id = ? AND service_id = ?
    ORDER BY id DESC LIMIT 1
    ",
  )
  .bind(round)
  .bind(team_id)
  .bind(service_id)
  .fetch_optional(&db.pool)
  .await
  .context("could not get planted flag")
}
