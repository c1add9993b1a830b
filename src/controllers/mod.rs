pub mod flag;
pub mod score;
pub mod scoreboard;
