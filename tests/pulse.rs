use chrono::{Duration, Utc};
use ctf_gameserver::models::NewTeam;
use ctf_gameserver::pulse::{Phase, Timeline};
use ctf_gameserver::{dal, key, Config, Db, GameServer};

fn config(start: &str) -> Config {
  Config::parse(&format!(
    r#"
    [database]
    url = "sqlite::memory:"

    [checker]
    timeout = 1

    [pulse]
    start = "{}"
    half = 3
    lunch = 1
    round_len = 1
    check_interval = 1

    [receiver]
    addr = "127.0.0.1:0"
    rate_limit = 0
    socket_timeout = 1

    [scoreboard]
    addr = "127.0.0.1:0"
    update_interval = 1
    "#,
    start
  ))
  .unwrap()
}

#[tokio::test]
async fn whole_contest_is_played_and_scored() {
  let db = Db::in_memory().await.unwrap();
  let team = dal::team::create(
    &db,
    &NewTeam {
      name: "alpha".to_owned(),
      subnet: "10.0.1.0/24".parse().unwrap(),
      vulnbox: "10.0.1.3".to_owned(),
    },
  )
  .await
  .unwrap();

  let start = Utc::now() + Duration::seconds(1);
  let config = config(&start.to_rfc3339());
  let timeline = Timeline::new(&config.pulse).unwrap();
  assert_eq!(timeline.phase_at(Utc::now()), Phase::WaitingForStart);

  let game = GameServer::new(db.clone(), config, key::generate_key().unwrap())
    .await
    .unwrap();
  game.pulse().await.unwrap();
  assert_eq!(timeline.phase_at(Utc::now()), Phase::Completed);

  let rounds = dal::round::current(&db).await.unwrap().unwrap();
  assert!(rounds.id >= 2, "only {} rounds played", rounds.id);

  // every round was scored before the contest returned
  let last = dal::round_result::last(&db, team.id).await.unwrap().unwrap();
  assert_eq!(last.round, rounds.id);
  assert_eq!(last.defence_score, 0.0);
}
