use std::net::SocketAddr;
use std::time::Duration;

use ctf_gameserver::models::{Flag, NewFlag, NewService, NewTeam, ServiceState};
use ctf_gameserver::receiver::{Receiver, GREETING, RATE_LIMITED};
use ctf_gameserver::utils::Seconds;
use ctf_gameserver::{dal, key, Db, ReceiverConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

struct Setup {
  addr: SocketAddr,
  /// Planted into alpha's service in the current round
  flag: Flag,
}

/// alpha owns 127.0.1.0/24 and beta 127.0.2.0/24; anything else is nobody.
async fn setup(rate_limit: u64, socket_timeout: u64) -> Setup {
  let db = Db::in_memory().await.unwrap();
  for (name, net) in &[("alpha", 1), ("beta", 2)] {
    dal::team::create(
      &db,
      &NewTeam {
        name: name.to_string(),
        subnet: format!("127.0.{}.0/24", net).parse().unwrap(),
        vulnbox: format!("127.0.{}.1", net),
      },
    )
    .await
    .unwrap();
  }
  let service = dal::service::create(
    &db,
    &NewService {
      name: "notes".to_owned(),
      port: 4000,
      checker_path: "/bin/true".to_owned(),
      udp: false,
    },
  )
  .await
  .unwrap();

  let signing_key = key::generate_key().unwrap();
  let round = dal::round::create(&db, 600).await.unwrap();
  let flag = dal::flag::insert(
    &db,
    &NewFlag {
      flag: key::generate_flag(&signing_key).unwrap(),
      round: round.id,
      team_id: 1,
      service_id: service.id,
      cred: "cred".to_owned(),
    },
  )
  .await
  .unwrap();
  dal::status::insert(&db, round.id, 2, service.id, ServiceState::Up)
    .await
    .unwrap();

  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let config = ReceiverConfig {
    addr,
    rate_limit: Seconds(Duration::from_secs(rate_limit)),
    socket_timeout: Seconds(Duration::from_secs(socket_timeout)),
  };
  let receiver = Receiver::new(db, signing_key.to_public_key(), &config);
  tokio::spawn(receiver.run(listener));

  Setup { addr, flag }
}

async fn connect_from(source: &str, server: SocketAddr) -> TcpStream {
  let socket = TcpSocket::new_v4().unwrap();
  socket
    .bind(format!("{}:0", source).parse().unwrap())
    .unwrap();
  socket.connect(server).await.unwrap()
}

async fn read_all(stream: &mut TcpStream) -> String {
  let mut response = String::new();
  stream.read_to_string(&mut response).await.unwrap();
  response
}

/// Run one full exchange and return the server's verdict line
async fn send_flag(source: &str, server: SocketAddr, flag: &str) -> String {
  let mut stream = connect_from(source, server).await;

  let mut greeting = vec![0; GREETING.len()];
  stream.read_exact(&mut greeting).await.unwrap();
  assert_eq!(greeting, GREETING.as_bytes());

  stream
    .write_all(format!("{}\n", flag).as_bytes())
    .await
    .unwrap();
  read_all(&mut stream).await
}

#[tokio::test]
async fn verdicts_are_sent_over_the_wire() {
  let s = setup(0, 5).await;
  let flag = s.flag.flag.as_str();

  assert_eq!(send_flag("127.0.2.1", s.addr, "bogus").await, "Invalid flag\n");
  assert_eq!(
    send_flag("127.0.9.1", s.addr, flag).await,
    "Team does not exist\n"
  );
  assert_eq!(
    send_flag("127.0.1.1", s.addr, flag).await,
    "Flag belongs to the attacking team\n"
  );
  assert_eq!(send_flag("127.0.2.1", s.addr, flag).await, "Captured!\n");
  assert_eq!(
    send_flag("127.0.2.7", s.addr, flag).await,
    "Flag already captured\n"
  );
}

#[tokio::test]
async fn fast_reconnects_are_refused() {
  let s = setup(60, 5).await;

  assert_eq!(send_flag("127.0.2.1", s.addr, "bogus").await, "Invalid flag\n");

  let mut again = connect_from("127.0.2.1", s.addr).await;
  assert_eq!(read_all(&mut again).await, RATE_LIMITED);

  // other addresses have their own budget
  assert_eq!(send_flag("127.0.2.2", s.addr, "bogus").await, "Invalid flag\n");
}

#[tokio::test]
async fn silent_clients_are_dropped() {
  let s = setup(0, 1).await;

  let mut stream = connect_from("127.0.2.1", s.addr).await;
  let mut greeting = vec![0; GREETING.len()];
  stream.read_exact(&mut greeting).await.unwrap();

  // no flag and no newline: the server gives up without a verdict
  stream.write_all(b"abc").await.unwrap();
  let response = tokio::time::timeout(Duration::from_secs(5), read_all(&mut stream))
    .await
    .unwrap();
  assert_eq!(response, "");
}
