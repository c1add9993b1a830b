//! Turning a finished round into attack and defence scores.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::dal::{self, Db};
use crate::models::{
  Capture, RoundResult, Service, ServiceState, Status, Team,
};

/// Share of observations that saw the service up, zero without any
pub fn states_score(states: &[ServiceState]) -> f64 {
  if states.is_empty() {
    return 0.0;
  }
  let up = states.iter().filter(|&&s| s == ServiceState::Up).count();
  up as f64 / states.len() as f64
}

/// Services weigh equally; no services means no defence.
pub fn defence_score(per_service: &[f64]) -> f64 {
  if per_service.is_empty() {
    return 0.0;
  }
  let weight = 1.0 / per_service.len() as f64;
  per_service.iter().map(|score| score * weight).sum()
}

/// This round's deltas, one per team in `teams` order.
pub fn tally(
  round: i64,
  teams: &[Team],
  services: &[Service],
  statuses: &[Status],
  captures: &[Capture],
) -> Vec<RoundResult> {
  let mut observed: HashMap<(i64, i64), Vec<ServiceState>> = HashMap::new();
  for status in statuses.iter().filter(|s| s.round == round) {
    observed
      .entry((status.team_id, status.service_id))
      .or_default()
      .push(status.state);
  }

  let mut results: Vec<RoundResult> = teams
    .iter()
    .map(|team| {
      let per_service: Vec<f64> = services
        .iter()
        .map(|service| {
          observed
            .get(&(team.id, service.id))
            .map_or(0.0, |states| states_score(states))
        })
        .collect();

      RoundResult {
        team_id: team.id,
        round,
        attack_score: 0.0,
        defence_score: defence_score(&per_service) * 2.0,
      }
    })
    .collect();

  if services.is_empty() {
    return results;
  }
  let per_service = 1.0 / services.len() as f64;
  let index: HashMap<i64, usize> =
    teams.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

  let mut lost = HashSet::new();
  for capture in captures.iter().filter(|c| c.flag.round == round) {
    if let Some(&attacker) = index.get(&capture.team_id) {
      results[attacker].attack_score += per_service;
    }

    // several teams taking the same flag cost the victim once
    if !lost.insert(capture.flag.id) {
      continue;
    }
    if let Some(&victim) = index.get(&capture.flag.team_id) {
      let defence = &mut results[victim].defence_score;
      *defence = (*defence - per_service).max(0.0);
    }
  }

  results
}

/// Score `round` and store every team's new cumulative result.
pub async fn count_round(
  db: &Db,
  round: i64,
  teams: &[Team],
  services: &[Service],
) -> Result<()> {
  let statuses = dal::status::all_in_round(db, round).await?;
  let captures = dal::capture::all_in_round(db, round).await?;

  for delta in tally(round, teams, services, &statuses, &captures) {
    let total = dal::round_result::add(db, &delta).await?;
    debug!(
      "round {} team {}: attack {:.3} (+{:.3}) defence {:.3} (+{:.3})",
      round,
      delta.team_id,
      total.attack_score,
      delta.attack_score,
      total.defence_score,
      delta.defence_score
    );
  }
  Ok(())
}
