use anyhow::{Context, Result};

use super::Db;
use crate::models::RoundResult;

/// Store this round's delta for one team, chained onto its previous
/// cumulative result. Returns the cumulative row that was written.
///
/// Round 1 has no predecessor, so its delta is stored as is. Concurrent
/// callers are serialized so that no two of them read the same predecessor.
pub async fn add(db: &Db, delta: &RoundResult) -> Result<RoundResult> {
  let _guard = db.round_result_lock().lock().await;

  let mut result = delta.clone();
  if delta.round > 1 {
    if let Some(previous) = previous(db, delta.team_id, delta.round).await? {
      if previous.round != delta.round - 1 {
        warn!(
          "round {} of team {} chains onto round {}, skipped rounds are lost",
          delta.round, delta.team_id, previous.round
        );
      }
      result.attack_score += previous.attack_score;
      result.defence_score += previous.defence_score;
    } else {
      warn!(
        "no result before round {} for team {}, starting from zero",
        delta.round, delta.team_id
      );
    }
  }

  sqlx::query(
    "
    INSERT INTO round_result (team_id, round, attack_score, defence_score)
    VALUES (?, ?, ?, ?)
    ",
  )
  .bind(result.team_id)
  .bind(result.round)
  .bind(result.attack_score)
  .bind(result.defence_score)
  .execute(&db.pool)
  .await
  .with_context(|| {
    format!(
      "could not insert result of round {} for team {}",
      result.round, result.team_id
    )
  })?;

  Ok(result)
}

/// The team's latest cumulative result strictly before `round`
pub async fn previous(
  db: &Db,
  team_id: i64,
  round: i64,
) -> Result<Option<RoundResult>> {
  sqlx::query_as::<_, RoundResult>(
    "
    SELECT team_id, round, attack_score, defence_score FROM round_result
    WHERE team_id = ? AND round < ?
    ORDER BY round DESC LIMIT 1
    ",
  )
  .bind(team_id)
  .bind(round)
  .fetch_optional(&db.pool)
  .await
  .context("could not get previous round result")
}

/// The team's most recent cumulative result
pub async fn last(db: &Db, team_id: i64) -> Result<Option<RoundResult>> {
  previous(db, team_id, i64::MAX).await
}

#[cfg(test)]
mod tests {
  use super::*;

  fn delta(round: i64, attack: f64, defence: f64) -> RoundResult {
    RoundResult {
      team_id: 1,
      round,
      attack_score: attack,
      defence_score: defence,
    }
  }

  #[tokio::test]
  async fn results_accumulate_across_rounds() {
    let db = Db::in_memory().await.unwrap();

    let first = add(&db, &delta(1, 0.5, 2.0)).await.unwrap();
    assert_eq!(first, delta(1, 0.5, 2.0));

    let second = add(&db, &delta(2, 0.25, 1.5)).await.unwrap();
    assert_eq!(second, delta(2, 0.75, 3.5));

    assert_eq!(last(&db, 1).await.unwrap(), Some(second));
    assert_eq!(previous(&db, 1, 2).await.unwrap(), Some(first));
    assert_eq!(last(&db, 2).await.unwrap(), None);

    // a round is scored once per team
    assert!(add(&db, &delta(2, 1.0, 1.0)).await.is_err());
  }

  #[tokio::test]
  async fn late_round_chains_onto_the_latest_earlier_one() {
    let db = Db::in_memory().await.unwrap();
    add(&db, &delta(1, 1.0, 2.0)).await.unwrap();

    // round 2 is still being scored when round 3 arrives
    let third = add(&db, &delta(3, 0.5, 1.0)).await.unwrap();
    assert_eq!(third, delta(3, 1.5, 3.0));
    assert_eq!(previous(&db, 1, 3).await.unwrap().unwrap().round, 1);
  }

  #[tokio::test]
  async fn concurrent_writers_each_chain_onto_their_own_team() {
    let db = Db::in_memory().await.unwrap();
    for team_id in 1..=8 {
      let first = RoundResult {
        team_id,
        ..delta(1, 1.0, 0.5)
      };
      add(&db, &first).await.unwrap();
    }

    let tasks: Vec<_> = (1..=8)
      .map(|team_id| {
        let db = db.clone();
        let second = RoundResult {
          team_id,
          ..delta(2, 1.0, 0.5)
        };
        tokio::spawn(async move { add(&db, &second).await })
      })
      .collect();
    for task in tasks {
      let result = task.await.unwrap().unwrap();
      assert_eq!(result.attack_score, 2.0);
      assert_eq!(result.defence_score, 1.0);
    }
  }
}
