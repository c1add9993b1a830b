mod scoreboard;
mod utils;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use warp::Filter;

use crate::controllers::scoreboard::ScoreboardCell;

pub use self::scoreboard::routes;

/// Bind the scoreboard API to `addr`. The returned future serves it.
pub fn serve(
  addr: SocketAddr,
  cell: ScoreboardCell,
) -> Result<impl Future<Output = ()>> {
  let routes = routes(cell).with(warp::log("ctf_gameserver::web"));
  let (addr, server) = warp::serve(routes)
    .try_bind_ephemeral(addr)
    .with_context(|| format!("could not bind scoreboard to {}", addr))?;
  info!("scoreboard listening on {}", addr);
  Ok(server)
}
