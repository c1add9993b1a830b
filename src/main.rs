use std::path::PathBuf;

use anyhow::{Context, Result};
use ctf_gameserver::controllers::scoreboard;
use ctf_gameserver::pulse::Timeline;
use ctf_gameserver::receiver::Receiver;
use ctf_gameserver::setup_logging::setup_logging;
use ctf_gameserver::{dal, key, web};
use ctf_gameserver::{Config, Db, GameServer};
use log::{error, info};
use structopt::StructOpt;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(StructOpt)]
struct Opt {
  #[structopt(subcommand)]
  cmd: Command,

  #[structopt(long = "config", parse(from_os_str))]
  config: PathBuf,
}

#[derive(StructOpt)]
enum Command {
  /// Play the contest from the configured start time
  #[structopt(name = "run")]
  Run,

  #[structopt(name = "migrate")]
  Migrate,

  /// Wipe the database and load teams and services from the config
  #[structopt(name = "reinit")]
  Reinit,
}

#[tokio::main]
async fn main() -> Result<()> {
  let opt = Opt::from_args();
  let config = Config::from_file(&opt.config)?;
  setup_logging(config.log_file.as_deref())?;

  let db = Db::connect(&config.database.url, config.database.max_connections)
    .await?;

  match opt.cmd {
    Command::Run => run(db, config).await,
    Command::Migrate => db.migrate().await,
    Command::Reinit => reinit(&db, &config).await,
  }
}

async fn reinit(db: &Db, config: &Config) -> Result<()> {
  db.migrate().await?;
  db.clean().await?;

  for team in &config.teams {
    dal::team::create(db, team).await?;
  }
  for service in &config.services {
    dal::service::create(db, service).await?;
  }

  info!(
    "database reset with {} teams and {} services",
    config.teams.len(),
    config.services.len()
  );
  Ok(())
}

async fn run(db: Db, config: Config) -> Result<()> {
  db.migrate().await?;

  let key = key::generate_key().context("couldn't generate flag key")?;
  let timeline = Timeline::new(&config.pulse)?;

  let listener = TcpListener::bind(config.receiver.addr)
    .await
    .with_context(|| {
      format!("could not bind receiver to {}", config.receiver.addr)
    })?;
  let receiver = Receiver::new(db.clone(), key.to_public_key(), &config.receiver);

  let (cell, latest) = watch::channel(None);
  let api = web::serve(config.scoreboard.addr, latest)?;

  tokio::spawn(async move {
    if let Err(err) = receiver.run(listener).await {
      error!("flag receiver stopped: {:#}", err);
    }
  });
  tokio::spawn(scoreboard::updater(
    db.clone(),
    config.scoreboard.clone(),
    timeline,
    cell,
  ));
  tokio::spawn(api);

  let game = GameServer::new(db, config, key).await?;
  game.pulse().await
}
