use std::net::IpAddr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rsa::RsaPublicKey;

use crate::dal::{self, Db};
use crate::key;
use crate::models::ServiceState;

/// Every defined outcome of a flag submission. The display form is the line
/// sent back to the submitting team.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum Submission {
  #[display(fmt = "Captured!")]
  Captured,
  #[display(fmt = "Invalid flag")]
  Invalid,
  #[display(fmt = "Flag does not exist")]
  NotFound,
  #[display(fmt = "Flag already captured")]
  AlreadyCaptured,
  #[display(fmt = "Team does not exist")]
  UnknownTeam,
  #[display(fmt = "Flag belongs to the attacking team")]
  OwnFlag,
  #[display(fmt = "The attacking team service is not up")]
  ServiceNotUp,
  #[display(fmt = "Flag expired")]
  Expired,
}

/// Validate `token` sent from `source` and record the capture if every rule
/// holds. Rules are checked in a fixed order and the first one broken
/// decides the outcome.
///
/// `Err` is reserved for database failures.
pub async fn submit(
  db: &Db,
  key: &RsaPublicKey,
  source: IpAddr,
  token: &str,
  now: DateTime<Utc>,
) -> Result<Submission> {
  if let Err(err) = key::validate_flag(token, key) {
    debug!("flag {:?} from {}: {}", token, source, err);
    return Ok(Submission::Invalid);
  }

  let flag = match dal::flag::by_token(db, token).await? {
    Some(flag) => flag,
    None => return Ok(Submission::NotFound),
  };

  let team = dal::team::by_addr(db, source).await?;
  if let Some(team) = &team {
    if dal::capture::is_captured(db, flag.id, team.id).await? {
      return Ok(Submission::AlreadyCaptured);
    }
  }

  let team = match team {
    Some(team) => team,
    None => return Ok(Submission::UnknownTeam),
  };

  if flag.team_id == team.id {
    info!("team {} sent its own flag", team.name);
    return Ok(Submission::OwnFlag);
  }

  let state =
    dal::status::latest(db, flag.round, team.id, flag.service_id).await?;
  if state != Some(ServiceState::Up) {
    info!(
      "team {} can't capture while its service {} is {}",
      team.name,
      flag.service_id,
      state.map_or("unknown".to_owned(), |s| s.to_string())
    );
    return Ok(Submission::ServiceNotUp);
  }

  match dal::round::current(db).await? {
    Some(round) if round.id == flag.round && !round.is_over(now) => {}
    _ => {
      info!("team {} sent a flag of round {}", team.name, flag.round);
      return Ok(Submission::Expired);
    }
  }

  // a concurrent submission of the same flag may have won the race
  if !dal::capture::insert(db, flag.id, team.id).await? {
    return Ok(Submission::AlreadyCaptured);
  }

  info!(
    "team {} captured flag {} of team {} service {} round {}",
    team.name, flag.id, flag.team_id, flag.service_id, flag.round
  );
  Ok(Submission::Captured)
}
