//! Line-based TCP service where teams hand in captured flags.
//!
//! ```text
//! <- CTF Flag Receiver
//! <- Input flag:
//! -> <flag>
//! <- Captured!
//! ```

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rsa::RsaPublicKey;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Instant};

use crate::config::ReceiverConfig;
use crate::controllers::flag;
use crate::dal::Db;

pub const GREETING: &str = "CTF Flag Receiver\nInput flag: ";
pub const RATE_LIMITED: &str = "Attack attempts limit exceeded\n";
pub const INTERNAL_ERROR: &str = "Internal error\n";

/// Longer lines can't be flags; stop reading there
const MAX_LINE: u64 = 256;

/// Last accepted connection per source address. Entries older than the
/// limit no longer matter and are dropped as connections come in.
struct RateLimit {
  period: Duration,
  last_seen: HashMap<IpAddr, Instant>,
}

impl RateLimit {
  fn new(period: Duration) -> Self {
    RateLimit {
      period,
      last_seen: HashMap::new(),
    }
  }

  /// Whether `ip` may connect at `now`; an admitted connection restarts its
  /// cool-down.
  fn admit(&mut self, ip: IpAddr, now: Instant) -> bool {
    let period = self.period;
    self
      .last_seen
      .retain(|_, last| now.saturating_duration_since(*last) < period);

    if self.last_seen.contains_key(&ip) {
      return false;
    }
    self.last_seen.insert(ip, now);
    true
  }
}

#[derive(Clone)]
pub struct Receiver {
  db: Db,
  key: Arc<RsaPublicKey>,
  rate_limit: Duration,
  socket_timeout: Duration,
}

impl Receiver {
  pub fn new(db: Db, key: RsaPublicKey, config: &ReceiverConfig) -> Self {
    Receiver {
      db,
      key: Arc::new(key),
      rate_limit: *config.rate_limit,
      socket_timeout: *config.socket_timeout,
    }
  }

  /// Serve connections from `listener` until the task is dropped.
  pub async fn run(self, listener: TcpListener) -> Result<()> {
    info!(
      "flag receiver listening on {}",
      listener.local_addr().context("listener has no address")?
    );

    let mut rate_limit = RateLimit::new(self.rate_limit);

    loop {
      let (stream, peer) = match listener.accept().await {
        Ok(accepted) => accepted,
        Err(err) => {
          warn!("accept failed: {}", err);
          time::sleep(Duration::from_millis(100)).await;
          continue;
        }
      };

      let receiver = self.clone();
      if !rate_limit.admit(peer.ip(), Instant::now()) {
        debug!("{} connects too fast", peer);
        tokio::spawn(async move { receiver.refuse(stream).await });
        continue;
      }

      tokio::spawn(async move {
        match time::timeout(receiver.socket_timeout, receiver.handle(stream, peer))
          .await
        {
          Ok(Ok(())) => {}
          Ok(Err(err)) => debug!("connection from {} failed: {:#}", peer, err),
          Err(_) => debug!("connection from {} timed out", peer),
        }
      });
    }
  }

  async fn refuse(&self, mut stream: TcpStream) {
    let refusal = async {
      stream.write_all(RATE_LIMITED.as_bytes()).await?;
      stream.shutdown().await
    };
    match time::timeout(self.socket_timeout, refusal).await {
      Ok(Ok(())) => {}
      Ok(Err(err)) => debug!("rate limit notice not delivered: {}", err),
      Err(_) => debug!("rate limit notice timed out"),
    }
  }

  async fn handle(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
    let (reader, mut writer) = stream.split();
    writer.write_all(GREETING.as_bytes()).await?;

    let mut line = String::new();
    BufReader::new(reader.take(MAX_LINE))
      .read_line(&mut line)
      .await
      .context("could not read flag")?;
    if !line.ends_with('\n') {
      bail!("incomplete line {:?}", line);
    }
    let token = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    debug!("flag {:?} from {}", token, peer);

    let response =
      match flag::submit(&self.db, &self.key, peer.ip(), token, Utc::now()).await
      {
        Ok(submission) => format!("{}\n", submission),
        Err(err) => {
          error!("submission from {} failed: {:#}", peer, err);
          INTERNAL_ERROR.to_owned()
        }
      };

    writer.write_all(response.as_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
  }
}
