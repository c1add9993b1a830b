use std::net::IpAddr;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, sqlx::FromRow, Serialize)]
pub struct Team {
  pub id: i64,
  pub name: String,
  /// Network the team's hosts live in, in CIDR notation
  pub subnet: String,
  /// Address of the team's vulnbox, handed to checkers
  pub vulnbox: String,
}

impl Team {
  pub fn network(&self) -> Result<IpNet> {
    self
      .subnet
      .parse()
      .with_context(|| format!("bad subnet for team {}", self.name))
  }

  /// Whether a connection from `addr` originates inside this team's subnet
  pub fn owns(&self, addr: IpAddr) -> Result<bool> {
    let addr = match addr {
      IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
      v4 => v4,
    };
    Ok(self.network()?.contains(&addr))
  }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewTeam {
  pub name: String,
  pub subnet: IpNet,
  pub vulnbox: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, sqlx::FromRow, Serialize)]
pub struct Service {
  pub id: i64,
  pub name: String,
  pub port: u16,
  pub checker_path: String,
  pub udp: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewService {
  pub name: String,
  pub port: u16,
  #[serde(rename = "checker")]
  pub checker_path: String,
  #[serde(default)]
  pub udp: bool,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Round {
  pub id: i64,
  pub len_seconds: i64,
  pub start_time: DateTime<Utc>,
}

impl Round {
  pub fn len(&self) -> Duration {
    Duration::seconds(self.len_seconds)
  }

  pub fn end_time(&self) -> DateTime<Utc> {
    self.start_time + self.len()
  }

  /// Whether the round's wall-clock window has fully elapsed at `now`
  pub fn is_over(&self, now: DateTime<Utc>) -> bool {
    now > self.end_time()
  }
}

/// Classification of a single observation of a service.
#[derive(
  Copy, Clone, Debug, PartialEq, Eq, Hash, Display, sqlx::Type, Serialize,
)]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
  /// Serves requests, stores and returns flags
  #[display(fmt = "up")]
  Up = 0,
  /// Reachable, but behaves not as expected
  #[display(fmt = "mumble")]
  Mumble = 1,
  /// Reachable and sane, but planted flags can't be retrieved
  #[display(fmt = "corrupt")]
  Corrupt = 2,
  #[display(fmt = "down")]
  Down = 3,
  /// The checker itself failed
  #[display(fmt = "error")]
  Error = 4,
  #[display(fmt = "unknown")]
  Unknown = 5,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Status {
  pub id: i64,
  pub round: i64,
  pub team_id: i64,
  pub service_id: i64,
  pub state: ServiceState,
  pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow, Serialize)]
pub struct Flag {
  pub id: i64,
  pub flag: String,
  pub round: i64,
  pub team_id: i64,
  pub service_id: i64,
  /// Opaque value the checker printed when planting
  pub cred: String,
}

pub struct NewFlag {
  pub flag: String,
  pub round: i64,
  pub team_id: i64,
  pub service_id: i64,
  pub cred: String,
}

/// A flag together with one team that captured it.
#[derive(Clone, Debug)]
pub struct Capture {
  pub flag: Flag,
  pub team_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow, Serialize)]
pub struct RoundResult {
  pub team_id: i64,
  pub round: i64,
  pub attack_score: f64,
  pub defence_score: f64,
}
