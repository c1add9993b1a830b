use anyhow::{Context, Result};
use chrono::Utc;

use super::Db;
use crate::models::Round;

/// Open a new round starting now. Its id is one past the previous round's.
pub async fn create(db: &Db, len_seconds: i64) -> Result<Round> {
  let start_time = Utc::now();
  let id = sqlx::query("INSERT INTO round (len_seconds, start_time) VALUES (?, ?)")
    .bind(len_seconds)
    .bind(start_time)
    .execute(&db.pool)
    .await
    .context("could not create round")?
    .last_insert_rowid();

  Ok(Round {
    id,
    len_seconds,
    start_time,
  })
}

/// The round with the highest id, if any round was ever opened
pub async fn current(db: &Db) -> Result<Option<Round>> {
  sqlx::query_as::<_, Round>("SELECT * FROM round ORDER BY id DESC LIMIT 1")
    .fetch_optional(&db.pool)
    .await
    .context("could not get current round")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn rounds_are_gapless_and_latest_is_current() {
    let db = Db::in_memory().await.unwrap();
    assert!(current(&db).await.unwrap().is_none());

    for expected in 1..=3 {
      let round = create(&db, 60).await.unwrap();
      assert_eq!(round.id, expected);
    }

    let round = current(&db).await.unwrap().unwrap();
    assert_eq!(round.id, 3);
    assert_eq!(round.len_seconds, 60);
    assert!(!round.is_over(round.start_time));
    assert!(round.is_over(round.end_time() + chrono::Duration::seconds(1)));
  }
}
