use std::net::IpAddr;

use anyhow::{Context, Result};

use super::Db;
use crate::models::{NewTeam, Team};

pub async fn create(db: &Db, team: &NewTeam) -> Result<Team> {
  let id = sqlx::query(
    "
    INSERT INTO team (name, subnet, vulnbox)
    VALUES (?, ?, ?)
    ",
  )
  .bind(&team.name)
  .bind(team.subnet.to_string())
  .bind(&team.vulnbox)
  .execute(&db.pool)
  .await
  .with_context(|| format!("could not insert team {}", team.name))?
  .last_insert_rowid();

  Ok(Team {
    id,
    name: team.name.clone(),
    subnet: team.subnet.to_string(),
    vulnbox: team.vulnbox.clone(),
  })
}

pub async fn get_all(db: &Db) -> Result<Vec<Team>> {
  sqlx::query_as::<_, Team>("SELECT * FROM team ORDER BY id")
    .fetch_all(&db.pool)
    .await
    .context("could not list teams")
}

/// Find the team whose subnet contains `addr`
pub async fn by_addr(db: &Db, addr: IpAddr) -> Result<Option<Team>> {
  for team in get_all(db).await? {
    if team.owns(addr)? {
      return Ok(Some(team));
    }
  }
  Ok(None)
}
