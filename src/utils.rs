use std::ops::Deref;
use std::{
  ffi::OsStr,
  path::Path,
  process::{Output, Stdio},
  time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use tokio::process::Command;

/// Run `executable` under the `wrapper` program (coreutils `timeout`), which
/// kills it once `timeout` elapses.
///
/// Both output pipes are drained before the child is waited on.
pub async fn child_output_helper<Args, Arg>(
  wrapper: impl AsRef<Path>,
  executable: impl AsRef<OsStr>,
  args: Args,
  timeout: Duration,
) -> Result<Output>
where
  Args: IntoIterator<Item = Arg>,
  Arg: AsRef<OsStr>,
{
  let wrapper = wrapper.as_ref();
  let mut command = Command::new(wrapper);
  command
    .arg(format!("{}s", timeout.as_secs().max(1)))
    .arg(executable)
    .args(args)
    .stdin(Stdio::null())
    .stderr(Stdio::piped())
    .stdout(Stdio::piped())
    .kill_on_drop(true);
  debug!("{:?}", command);

  command
    .output()
    .await
    .with_context(|| format!("could not spawn {}", wrapper.display()))
}

/// Integer number of seconds that can be decoded from serde
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Seconds(pub Duration);

impl Deref for Seconds {
  type Target = Duration;

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl From<Seconds> for Duration {
  fn from(seconds: Seconds) -> Duration {
    seconds.0
  }
}

impl Serialize for Seconds {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let seconds = self.0.as_secs();
    seconds.serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Seconds {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let seconds = u64::deserialize(deserializer)?;
    let duration = Duration::from_secs(seconds);
    Ok(Seconds(duration))
  }
}
