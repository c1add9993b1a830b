#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate log;

pub mod check_up;
pub mod flag_io;
pub mod pulse;
pub mod receiver;
pub mod setup_logging;

mod config;
pub mod controllers;
pub mod dal;
mod game;
pub mod key;
pub mod models;
pub mod service;
pub mod utils;
pub mod web;

pub use crate::config::{
  CheckerConfig, Config, DatabaseConfig, PulseConfig, ReceiverConfig,
  ScoreboardConfig,
};
pub use crate::dal::Db;
pub use crate::game::{GameServer, PairOutcome};
