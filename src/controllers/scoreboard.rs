//! Scoreboard table built from the stored round results.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time;

use crate::config::ScoreboardConfig;
use crate::dal::{self, Db};
use crate::models::{Service, ServiceState, Team};
use crate::pulse::{Phase, Timeline};

/// Which columns a team leads
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Best {
  pub score: bool,
  pub attack: bool,
  pub defence: bool,
  pub advisory: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TeamResult {
  pub rank: usize,
  pub id: i64,
  pub name: String,
  pub score: f64,
  pub score_percent: f64,
  pub attack: f64,
  pub attack_percent: f64,
  pub defence: f64,
  pub defence_percent: f64,
  pub advisory: i64,
  pub advisory_percent: f64,
  /// Current state of every service, in service order
  pub status: Vec<ServiceState>,
  pub best: Best,
}

#[derive(Clone, Debug, Serialize)]
pub struct Scoreboard {
  pub round: Option<i64>,
  pub phase: Phase,
  pub updated: DateTime<Utc>,
  pub services: Vec<String>,
  pub teams: Vec<TeamResult>,
}

/// Where the scoreboard task publishes; empty until the first update
pub type ScoreboardCell = watch::Receiver<Option<Arc<Scoreboard>>>;

async fn service_state(
  db: &Db,
  round: i64,
  team: &Team,
  service: &Service,
) -> Result<ServiceState> {
  // early in a round nothing may have been checked yet
  for round in &[round, round - 1] {
    if let Some(state) =
      dal::status::latest(db, *round, team.id, service.id).await?
    {
      return Ok(state);
    }
  }
  Ok(ServiceState::Down)
}

pub async fn collect_team_result(
  db: &Db,
  team: &Team,
  services: &[Service],
  round: Option<i64>,
) -> Result<TeamResult> {
  let last = dal::round_result::last(db, team.id)
    .await?
    .unwrap_or_default();

  let mut status = Vec::with_capacity(services.len());
  for service in services {
    status.push(match round {
      Some(round) => service_state(db, round, team, service).await?,
      None => ServiceState::Unknown,
    });
  }

  Ok(TeamResult {
    id: team.id,
    name: team.name.clone(),
    attack: last.attack_score,
    defence: last.defence_score,
    advisory: dal::advisory::score(db, team.id).await?,
    status,
    ..TeamResult::default()
  })
}

/// Unranked results of every team as of now
pub async fn collect_last_result(
  db: &Db,
  timeline: &Timeline,
) -> Result<Scoreboard> {
  let teams = dal::team::get_all(db).await?;
  let services = dal::service::get_all(db).await?;
  let round = dal::round::current(db).await?.map(|round| round.id);

  let mut results = Vec::with_capacity(teams.len());
  for team in &teams {
    results.push(collect_team_result(db, team, &services, round).await?);
  }

  let now = Utc::now();
  Ok(Scoreboard {
    round,
    phase: timeline.phase_at(now),
    updated: now,
    services: services.into_iter().map(|service| service.name).collect(),
    teams: results,
  })
}

fn column_max(teams: &[TeamResult], column: impl Fn(&TeamResult) -> f64) -> f64 {
  let max = teams.iter().map(column).fold(0.0, f64::max);
  if max == 0.0 {
    1.0
  } else {
    max
  }
}

/// Normalize every column against its leader, compute the overall score and
/// rank by it. Ties keep their previous order.
pub fn count_score_and_sort(teams: &mut [TeamResult], advisory_enabled: bool) {
  let max_attack = column_max(teams, |t| t.attack);
  let max_defence = column_max(teams, |t| t.defence);
  let max_advisory = column_max(teams, |t| t.advisory as f64);

  for team in teams.iter_mut() {
    team.attack_percent = team.attack / max_attack * 100.0;
    team.defence_percent = team.defence / max_defence * 100.0;
    team.advisory_percent = team.advisory as f64 / max_advisory * 100.0;

    team.score = if advisory_enabled {
      (team.attack_percent + team.defence_percent + team.advisory_percent) / 3.0
    } else {
      (team.attack_percent + team.defence_percent) / 2.0
    };
  }

  let max_score = column_max(teams, |t| t.score);
  for team in teams.iter_mut() {
    team.score_percent = team.score / max_score * 100.0;
    team.best = Best {
      score: team.score_percent == 100.0,
      attack: team.attack_percent == 100.0,
      defence: team.defence_percent == 100.0,
      advisory: team.advisory_percent == 100.0,
    };
  }

  teams.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
  for (i, team) in teams.iter_mut().enumerate() {
    team.rank = i + 1;
  }
}

/// Recompute the scoreboard every `update_interval` and publish it.
pub async fn updater(
  db: Db,
  config: ScoreboardConfig,
  timeline: Timeline,
  cell: watch::Sender<Option<Arc<Scoreboard>>>,
) {
  let period = (*config.update_interval).max(Duration::from_secs(1));
  let mut interval = time::interval(period);
  loop {
    interval.tick().await;

    let mut board = match collect_last_result(&db, &timeline).await {
      Ok(board) => board,
      Err(err) => {
        error!("couldn't collect scoreboard: {:#}", err);
        continue;
      }
    };
    count_score_and_sort(&mut board.teams, config.advisory_enabled);
    trace!("scoreboard updated for round {:?}", board.round);

    if cell.send(Some(Arc::new(board))).is_err() {
      debug!("nobody reads the scoreboard any more");
      return;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{NewService, NewTeam, RoundResult};

  fn team(id: i64, attack: f64, defence: f64, advisory: i64) -> TeamResult {
    TeamResult {
      id,
      name: format!("team{}", id),
      attack,
      defence,
      advisory,
      ..TeamResult::default()
    }
  }

  #[test]
  fn advisory_breaks_ties_in_the_average() {
    let mut teams = vec![team(1, 2.0, 10.0, 0), team(2, 2.0, 10.0, 4)];
    count_score_and_sort(&mut teams, true);

    assert_eq!(teams[0].id, 2);
    assert_eq!(teams[0].rank, 1);
    assert_eq!(teams[0].score, 100.0);
    assert_eq!(teams[0].score_percent, 100.0);
    assert_eq!(
      teams[0].best,
      Best {
        score: true,
        attack: true,
        defence: true,
        advisory: true,
      }
    );

    assert_eq!(teams[1].id, 1);
    assert_eq!(teams[1].rank, 2);
    assert_eq!(teams[1].advisory_percent, 0.0);
    assert!(teams[1].best.attack && teams[1].best.defence);
    assert!(!teams[1].best.score && !teams[1].best.advisory);
  }

  #[test]
  fn disabled_advisory_leaves_a_tie_in_order() {
    let mut teams = vec![team(1, 2.0, 10.0, 0), team(2, 2.0, 10.0, 4)];
    count_score_and_sort(&mut teams, false);

    let ranked: Vec<_> = teams.iter().map(|t| (t.id, t.rank)).collect();
    assert_eq!(ranked, vec![(1, 1), (2, 2)]);
    assert!(teams.iter().all(|t| t.score_percent == 100.0));
  }

  #[test]
  fn all_zero_columns_do_not_divide_by_zero() {
    let mut teams = vec![team(1, 0.0, 0.0, 0), team(2, 0.0, 0.0, 0)];
    count_score_and_sort(&mut teams, true);
    assert!(teams.iter().all(|t| t.score == 0.0 && t.score_percent == 0.0));
    assert!(teams.iter().all(|t| !t.best.attack));
  }

  #[tokio::test]
  async fn collects_results_and_service_states() {
    let db = Db::in_memory().await.unwrap();
    let alpha = dal::team::create(
      &db,
      &NewTeam {
        name: "alpha".to_owned(),
        subnet: "10.0.1.0/24".parse().unwrap(),
        vulnbox: "10.0.1.3".to_owned(),
      },
    )
    .await
    .unwrap();
    let mut services = Vec::new();
    for name in &["notes", "blog"] {
      services.push(
        dal::service::create(
          &db,
          &NewService {
            name: name.to_string(),
            port: 4000,
            checker_path: "/bin/true".to_owned(),
            udp: false,
          },
        )
        .await
        .unwrap(),
      );
    }

    let fresh = collect_team_result(&db, &alpha, &services, None)
      .await
      .unwrap();
    assert_eq!(fresh.attack, 0.0);
    assert_eq!(fresh.status, vec![ServiceState::Unknown; 2]);

    dal::round::create(&db, 60).await.unwrap();
    dal::round::create(&db, 60).await.unwrap();
    // notes checked in round 2, blog only in round 1
    dal::status::insert(&db, 2, alpha.id, services[0].id, ServiceState::Mumble)
      .await
      .unwrap();
    dal::status::insert(&db, 1, alpha.id, services[1].id, ServiceState::Up)
      .await
      .unwrap();
    dal::round_result::add(
      &db,
      &RoundResult {
        team_id: alpha.id,
        round: 1,
        attack_score: 0.5,
        defence_score: 2.0,
      },
    )
    .await
    .unwrap();
    let advisory = dal::advisory::insert(&db, alpha.id, "xss").await.unwrap();
    dal::advisory::review(&db, advisory, 2).await.unwrap();

    let result = collect_team_result(&db, &alpha, &services, Some(2))
      .await
      .unwrap();
    assert_eq!(result.attack, 0.5);
    assert_eq!(result.defence, 2.0);
    assert_eq!(result.advisory, 2);
    assert_eq!(result.status, vec![ServiceState::Mumble, ServiceState::Up]);

    let result = collect_team_result(&db, &alpha, &services, Some(4))
      .await
      .unwrap();
    assert_eq!(result.status, vec![ServiceState::Down; 2]);
  }
}
