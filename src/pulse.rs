//! The contest timeline and the rounds inside it.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::PulseConfig;
use crate::controllers::score;
use crate::dal;
use crate::game::{GameServer, PairOutcome};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  #[display(fmt = "waiting for start")]
  WaitingForStart,
  #[display(fmt = "first half")]
  FirstHalf,
  #[display(fmt = "lunch")]
  Lunch,
  #[display(fmt = "second half")]
  SecondHalf,
  #[display(fmt = "completed")]
  Completed,
}

/// The four instants that divide a contest into phases.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Timeline {
  pub start: DateTime<Utc>,
  pub lunch_start: DateTime<Utc>,
  pub lunch_end: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl Timeline {
  pub fn new(config: &PulseConfig) -> Result<Self> {
    let half = chrono::Duration::from_std(*config.half)
      .context("half is out of range")?;
    let lunch = chrono::Duration::from_std(*config.lunch)
      .context("lunch is out of range")?;

    let start = config.start;
    let lunch_start = start + half;
    let lunch_end = lunch_start + lunch;
    Ok(Timeline {
      start,
      lunch_start,
      lunch_end,
      end: lunch_end + half,
    })
  }

  pub fn phase_at(&self, now: DateTime<Utc>) -> Phase {
    if now < self.start {
      Phase::WaitingForStart
    } else if now < self.lunch_start {
      Phase::FirstHalf
    } else if now < self.lunch_end {
      Phase::Lunch
    } else if now < self.end {
      Phase::SecondHalf
    } else {
      Phase::Completed
    }
  }
}

/// Perturb `base` uniformly by up to a third in either direction, in whole
/// seconds and never below one second.
pub fn randomize_interval(base: Duration, rng: &mut impl Rng) -> Duration {
  let secs = base.as_secs();
  if secs <= 1 {
    return Duration::from_secs(1);
  }

  let deviation = secs / 3;
  let secs = rng.gen_range(secs - deviation..=secs + deviation);
  Duration::from_secs(secs.max(1))
}

/// Sleep until `at`. Returns whether there was anything to wait for.
async fn sleep_until(at: DateTime<Utc>) -> bool {
  match (at - Utc::now()).to_std() {
    Ok(left) if !left.is_zero() => {
      time::sleep(left).await;
      true
    }
    _ => false,
  }
}

fn report(action: &str, round: i64, outcomes: &[PairOutcome]) {
  for outcome in outcomes {
    if let Err(err) = &outcome.state {
      error!(
        "{} round={} team={} service={}: {:#}",
        action, round, outcome.team_id, outcome.service_id, err
      );
    }
  }
}

impl GameServer {
  /// Drive the whole contest: wait for the start, play both halves with a
  /// lunch break between them, and return once every round has been scored.
  pub async fn pulse(&self) -> Result<()> {
    let timeline = Timeline::new(&self.config.pulse)?;
    info!(
      "contest starts {}, lunch {} to {}, ends {}",
      timeline.start, timeline.lunch_start, timeline.lunch_end, timeline.end
    );
    let mut scoring = JoinSet::new();

    if sleep_until(timeline.start).await {
      info!("contest started");
    }
    if Utc::now() < timeline.lunch_start {
      self.run_half(timeline.lunch_start, &mut scoring).await?;
    }

    sleep_until(timeline.lunch_start).await;
    info!("lunch until {}", timeline.lunch_end);
    sleep_until(timeline.lunch_end).await;

    if Utc::now() < timeline.end {
      self.run_half(timeline.end, &mut scoring).await?;
    }
    sleep_until(timeline.end).await;

    info!("contest over, waiting for {} scoring tasks", scoring.len());
    while let Some(joined) = scoring.join_next().await {
      if let Err(err) = joined {
        error!("scoring task panicked: {}", err);
      }
    }
    info!("all rounds scored");
    Ok(())
  }

  /// Play rounds back to back as long as a full one fits before `until`.
  async fn run_half(
    &self,
    until: DateTime<Utc>,
    scoring: &mut JoinSet<()>,
  ) -> Result<()> {
    let round_len = chrono::Duration::from_std(*self.config.pulse.round_len)
      .context("round length is out of range")?;

    while Utc::now() + round_len < until {
      if let Err(err) = self.round(scoring).await {
        error!("round failed: {:#}", err);
        time::sleep(*self.config.pulse.check_interval).await;
      }
    }
    Ok(())
  }

  /// Open a round, plant, check until its end and hand it to scoring.
  pub async fn round(&self, scoring: &mut JoinSet<()>) -> Result<()> {
    let len_seconds = self.config.pulse.round_len.as_secs() as i64;
    let round = dal::round::create(&self.db, len_seconds).await?;
    let end = round.end_time();
    info!("round {} started, ends {}", round.id, end);

    let planted =
      self.plant_round(round.id, self.teams(), self.services()).await;
    report("put", round.id, &planted);

    loop {
      debug!("round {} check start", round.id);
      let checked =
        self.check_round(round.id, self.teams(), self.services()).await;
      report("chk", round.id, &checked);

      let base = *self.config.pulse.check_interval;
      let pause = randomize_interval(base, &mut rand::thread_rng());
      let next = Utc::now()
        + chrono::Duration::from_std(pause)
          .context("check interval is out of range")?;
      if next > end {
        break;
      }
      debug!("round {} next check in {:?}", round.id, pause);
      time::sleep(pause).await;
    }

    sleep_until(end).await;

    let (db, teams, services) =
      (self.db.clone(), self.teams().to_vec(), self.services().to_vec());
    let id = round.id;
    scoring.spawn(async move {
      debug!("scoring round {}", id);
      match score::count_round(&db, id, &teams, &services).await {
        Ok(()) => info!("round {} scored", id),
        Err(err) => error!("scoring round {} failed: {:#}", id, err),
      }
    });

    Ok(())
  }
}
