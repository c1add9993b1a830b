//! Planting a round's flags.

use anyhow::Result;

use crate::game::{log_verdict, GameServer, PairOutcome};
use crate::models::{NewFlag, Service, ServiceState, Team};
use crate::{dal, key};

impl GameServer {
  /// Plant one fresh flag into every (team, service) pair of `round`.
  ///
  /// Every pair gets exactly one status and, when a flag could be signed,
  /// one flag row. There are no retries: a pair that fails here stays failed
  /// for the round.
  pub async fn plant_round(
    &self,
    round: i64,
    teams: &[Team],
    services: &[Service],
  ) -> Vec<PairOutcome> {
    self
      .fan_out(teams, services, move |gs, team, service| async move {
        gs.plant_flag(round, &team, &service).await
      })
      .await
  }

  async fn plant_flag(
    &self,
    round: i64,
    team: &Team,
    service: &Service,
  ) -> Result<ServiceState> {
    let flag = match key::generate_flag(&self.key) {
      Ok(flag) => flag,
      Err(err) => {
        warn!(
          "put round={} team={} service={}: {}",
          round, team.name, service.name, err
        );
        let state = ServiceState::Error;
        dal::status::insert(&self.db, round, team.id, service.id, state).await?;
        return Ok(state);
      }
    };

    // connection refused is down, no need to bother the checker
    let port_open = service.udp || self.checker.port_open(service, team).await;

    let (state, cred) = if port_open {
      let verdict = self.checker.put(service, team, &flag).await;
      log_verdict("put", round, team, service, &verdict);
      match verdict.state {
        ServiceState::Up => (verdict.state, verdict.output),
        state => (state, String::new()),
      }
    } else {
      debug!(
        "put round={} team={} service={}: port closed",
        round, team.name, service.name
      );
      (ServiceState::Down, String::new())
    };

    // a status row implies the pair's flag row exists
    dal::flag::insert(
      &self.db,
      &NewFlag {
        flag,
        round,
        team_id: team.id,
        service_id: service.id,
        cred,
      },
    )
    .await?;
    dal::status::insert(&self.db, round, team.id, service.id, state).await?;

    Ok(state)
  }
}
