use anyhow::{Context, Result};
use chrono::Utc;

use super::Db;

/// File an unreviewed advisory for `team_id`
pub async fn insert(db: &Db, team_id: i64, text: &str) -> Result<i64> {
  let id = sqlx::query(
    "INSERT INTO advisory (team_id, text, timestamp) VALUES (?, ?, ?)",
  )
  .bind(team_id)
  .bind(text)
  .bind(Utc::now())
  .execute(&db.pool)
  .await
  .context("could not insert advisory")?
  .last_insert_rowid();
  Ok(id)
}

pub async fn review(db: &Db, id: i64, score: i64) -> Result<()> {
  sqlx::query("UPDATE advisory SET score = ?, reviewed = TRUE WHERE id = ?")
    .bind(score)
    .bind(id)
    .execute(&db.pool)
    .await
    .with_context(|| format!("could not review advisory {}", id))?;
  Ok(())
}

/// Sum of the scores of a team's reviewed advisories
pub async fn score(db: &Db, team_id: i64) -> Result<i64> {
  sqlx::query_scalar::<_, i64>(
    "
    SELECT COALESCE(SUM(score), 0) FROM advisory
    WHERE team_id = ? AND reviewed = TRUE
    ",
  )
  .bind(team_id)
  .fetch_one(&db.pool)
  .await
  .context("could not sum advisory score")
}
