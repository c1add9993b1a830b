//! Checking services during a round.

use anyhow::Result;

use crate::dal;
use crate::game::{log_verdict, GameServer, PairOutcome};
use crate::models::{Service, ServiceState, Team};

impl GameServer {
  /// Check every (team, service) pair of `round` once and record one status
  /// per pair.
  ///
  /// A pair is first checked for sane behaviour; only if that passes is the
  /// round's flag fetched back, so a service that merely lost its flag shows
  /// up as corrupt rather than broken.
  pub async fn check_round(
    &self,
    round: i64,
    teams: &[Team],
    services: &[Service],
  ) -> Vec<PairOutcome> {
    self
      .fan_out(teams, services, move |gs, team, service| async move {
        gs.check_pair(round, &team, &service).await
      })
      .await
  }

  async fn check_pair(
    &self,
    round: i64,
    team: &Team,
    service: &Service,
  ) -> Result<ServiceState> {
    let verdict = self.checker.check(service, team).await;
    log_verdict("chk", round, team, service, &verdict);

    let state = match verdict.state {
      ServiceState::Up => self.retrieve_flag(round, team, service).await?,
      state => state,
    };

    dal::status::insert(&self.db, round, team.id, service.id, state).await?;
    Ok(state)
  }

  async fn retrieve_flag(
    &self,
    round: i64,
    team: &Team,
    service: &Service,
  ) -> Result<ServiceState> {
    let planted =
      match dal::flag::planted(&self.db, round, team.id, service.id).await? {
        Some(planted) => planted,
        None => {
          warn!(
            "get round={} team={} service={}: nothing was planted",
            round, team.name, service.name
          );
          return Ok(ServiceState::Corrupt);
        }
      };

    let verdict = self.checker.get(service, team, &planted.cred).await;
    log_verdict("get", round, team, service, &verdict);

    if verdict.output != planted.flag {
      return Ok(ServiceState::Corrupt);
    }
    Ok(verdict.state)
  }
}
