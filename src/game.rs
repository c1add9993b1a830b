use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future;
use rsa::RsaPrivateKey;

use crate::dal::{self, Db};
use crate::models::{Service, ServiceState, Team};
use crate::service::{Checker, Verdict};
use crate::Config;

/// Everything a round needs, cheap to clone into per-pair tasks.
#[derive(Clone)]
pub struct GameServer {
  pub(crate) db: Db,
  pub(crate) key: Arc<RsaPrivateKey>,
  pub(crate) checker: Arc<Checker>,
  pub(crate) config: Arc<Config>,
  teams: Arc<Vec<Team>>,
  services: Arc<Vec<Service>>,
}

/// Result slot of one (team, service) task of a fan-out.
#[derive(Debug)]
pub struct PairOutcome {
  pub team_id: i64,
  pub service_id: i64,
  pub state: Result<ServiceState>,
}

impl GameServer {
  /// Load teams and services from the database; they don't change while the
  /// game runs.
  pub async fn new(db: Db, config: Config, key: RsaPrivateKey) -> Result<Self> {
    let teams = dal::team::get_all(&db).await?;
    let services = dal::service::get_all(&db).await?;
    info!(
      "game loaded with {} teams and {} services",
      teams.len(),
      services.len()
    );

    Ok(GameServer {
      checker: Arc::new(Checker::new(&config.checker)),
      db,
      key: Arc::new(key),
      config: Arc::new(config),
      teams: Arc::new(teams),
      services: Arc::new(services),
    })
  }

  pub fn teams(&self) -> &[Team] {
    &self.teams
  }

  pub fn services(&self) -> &[Service] {
    &self.services
  }

  /// Run `task` once for every (team, service) pair, all at the same time,
  /// and wait for every one of them.
  ///
  /// Each task gets its own result slot; a failing or panicking task doesn't
  /// affect its siblings.
  pub(crate) async fn fan_out<F, Fut>(
    &self,
    teams: &[Team],
    services: &[Service],
    task: F,
  ) -> Vec<PairOutcome>
  where
    F: Fn(GameServer, Team, Service) -> Fut,
    Fut: Future<Output = Result<ServiceState>> + Send + 'static,
  {
    let mut pairs = Vec::with_capacity(teams.len() * services.len());
    let mut handles = Vec::with_capacity(pairs.capacity());
    for team in teams {
      for service in services {
        pairs.push((team.id, service.id));
        handles.push(tokio::spawn(task(
          self.clone(),
          team.clone(),
          service.clone(),
        )));
      }
    }

    future::join_all(handles)
      .await
      .into_iter()
      .zip(pairs)
      .map(|(joined, (team_id, service_id))| PairOutcome {
        team_id,
        service_id,
        state: joined.context("pair task panicked").and_then(|state| state),
      })
      .collect()
  }
}

/// Note anything unusual about a checker run.
pub(crate) fn log_verdict(
  action: &str,
  round: i64,
  team: &Team,
  service: &Service,
  verdict: &Verdict,
) {
  if verdict.state != ServiceState::Up {
    warn!(
      "{} round={} team={} service={}: {} {}",
      action,
      round,
      team.name,
      service.name,
      verdict.state,
      verdict.logs.trim()
    );
  }

  if let Some(err) = &verdict.error {
    warn!(
      "{} round={} team={} service={} failed: {:#}",
      action, round, team.name, service.name, err
    );
  }
}
