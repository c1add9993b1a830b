//! Talking to checker programs.
//!
//! A checker knows one service's protocol and is invoked as one of
//!
//! ```text
//! <checker> put <ip> <port> <flag>        # prints the credential
//! <checker> get <ip> <port> <credential>  # prints the flag
//! <checker> chk <ip> <port>
//! ```
//!
//! always under a wall-clock wrapper. Its exit code says how the service
//! behaved, see [`ExitCodes`].

use std::collections::HashSet;
use std::error::Error as StdError;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use anyhow::Error;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time;

use crate::config::CheckerConfig;
use crate::models::{self, ServiceState, Team};
use crate::utils::child_output_helper;

/// Exit codes by which a checker reports a service's state.
///
/// Success is always [`ServiceState::Up`]; a code not listed here is
/// [`ServiceState::Unknown`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExitCodes {
  /// Returned by the wrapper when the budget ran out
  pub timeout: i32,
  /// Target address couldn't be resolved
  pub unresolvable: i32,
  pub mumble: i32,
  pub corrupt: i32,
  pub down: i32,
}

impl Default for ExitCodes {
  fn default() -> Self {
    ExitCodes {
      timeout: 124,
      unresolvable: 255,
      mumble: 2,
      corrupt: 3,
      down: 4,
    }
  }
}

#[derive(Debug, Display)]
pub enum ExitCodesError {
  #[display(fmt = "exit code of '{}' must not be 0", _0)]
  Zero(&'static str),
  #[display(fmt = "exit code {} is used for more than one state", _0)]
  Duplicate(i32),
}

impl StdError for ExitCodesError {}

impl ExitCodes {
  fn table(&self) -> [(&'static str, i32, ServiceState); 5] {
    [
      ("timeout", self.timeout, ServiceState::Down),
      ("unresolvable", self.unresolvable, ServiceState::Error),
      ("mumble", self.mumble, ServiceState::Mumble),
      ("corrupt", self.corrupt, ServiceState::Corrupt),
      ("down", self.down, ServiceState::Down),
    ]
  }

  pub fn validate(&self) -> Result<(), ExitCodesError> {
    let mut seen = HashSet::new();
    for &(name, code, _) in self.table().iter() {
      if code == 0 {
        return Err(ExitCodesError::Zero(name));
      }
      if !seen.insert(code) {
        return Err(ExitCodesError::Duplicate(code));
      }
    }
    Ok(())
  }

  /// Map an exit code to a state. `None` means the checker was killed by a
  /// signal.
  pub fn classify(&self, code: Option<i32>) -> ServiceState {
    match code {
      Some(0) => ServiceState::Up,
      Some(code) => self
        .table()
        .iter()
        .find(|(_, c, _)| *c == code)
        .map(|(_, _, state)| *state)
        .unwrap_or(ServiceState::Unknown),
      None => ServiceState::Unknown,
    }
  }
}

/// What one checker run told us.
#[derive(Debug)]
pub struct Verdict {
  pub state: ServiceState,
  /// Trimmed standard output: the credential for `put`, the flag for `get`
  pub output: String,
  /// Standard error of the checker
  pub logs: String,
  /// Why the run ended in [`ServiceState::Unknown`], for the logs
  pub error: Option<Error>,
}

impl Verdict {
  fn failed(error: Error) -> Self {
    Verdict {
      state: ServiceState::Unknown,
      output: String::new(),
      logs: String::new(),
      error: Some(error),
    }
  }
}

/// Runs checkers for the whole contest with one budget and exit-code table.
pub struct Checker {
  wrapper: PathBuf,
  timeout: Duration,
  exit_codes: ExitCodes,
}

impl Checker {
  pub fn new(config: &CheckerConfig) -> Self {
    Checker {
      wrapper: config.wrapper.clone(),
      timeout: *config.timeout,
      exit_codes: config.exit_codes,
    }
  }

  /// Plant `flag`; on success the verdict's output is the credential
  pub async fn put(
    &self,
    service: &models::Service,
    team: &Team,
    flag: &str,
  ) -> Verdict {
    self.run(service, team, "put", Some(flag)).await
  }

  /// Fetch the flag stored under `cred`; on success the verdict's output is
  /// the flag
  pub async fn get(
    &self,
    service: &models::Service,
    team: &Team,
    cred: &str,
  ) -> Verdict {
    self.run(service, team, "get", Some(cred)).await
  }

  /// Check the service's logic without touching flags
  pub async fn check(&self, service: &models::Service, team: &Team) -> Verdict {
    self.run(service, team, "chk", None).await
  }

  /// Cheap liveness probe: can we open a TCP connection to the service?
  pub async fn port_open(&self, service: &models::Service, team: &Team) -> bool {
    let addr = (team.vulnbox.as_str(), service.port);
    matches!(
      time::timeout(self.timeout, TcpStream::connect(addr)).await,
      Ok(Ok(_))
    )
  }

  async fn run(
    &self,
    service: &models::Service,
    team: &Team,
    verb: &str,
    extra: Option<&str>,
  ) -> Verdict {
    let port = service.port.to_string();
    let mut args = vec![verb, team.vulnbox.as_str(), port.as_str()];
    args.extend(extra);

    let output = match child_output_helper(
      &self.wrapper,
      &service.checker_path,
      args,
      self.timeout,
    )
    .await
    {
      Ok(output) => output,
      Err(err) => return Verdict::failed(err),
    };

    self.judge(output)
  }

  fn judge(&self, output: Output) -> Verdict {
    let state = self.exit_codes.classify(output.status.code());
    let error = match state {
      ServiceState::Unknown => {
        Some(anyhow!("checker exited with {}", output.status))
      }
      _ => None,
    };

    Verdict {
      state,
      output: String::from_utf8_lossy(&output.stdout)
        .trim_matches(|c: char| c == ' ' || c == '\n')
        .to_owned(),
      logs: String::from_utf8_lossy(&output.stderr).into_owned(),
      error,
    }
  }
}
