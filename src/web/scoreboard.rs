use warp::http::StatusCode;
use warp::{reply, Filter, Rejection, Reply};

use super::utils::with;
use crate::controllers::scoreboard::ScoreboardCell;

/// `GET /scoreboard`: the latest ranked table as JSON
pub fn routes(
  cell: ScoreboardCell,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
  warp::path("scoreboard")
    .and(warp::path::end())
    .and(warp::get())
    .and(with(cell))
    .map(scoreboard)
}

fn scoreboard(cell: ScoreboardCell) -> reply::Response {
  let latest = cell.borrow().clone();
  match latest {
    Some(board) => reply::json(&*board).into_response(),
    None => reply::with_status(
      "scoreboard not ready yet\n",
      StatusCode::SERVICE_UNAVAILABLE,
    )
    .into_response(),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::Utc;
  use tokio::sync::watch;

  use super::*;
  use crate::controllers::scoreboard::{Scoreboard, TeamResult};
  use crate::models::ServiceState;
  use crate::pulse::Phase;

  #[tokio::test]
  async fn serves_the_latest_board() {
    let (tx, rx) = watch::channel(None);
    let api = routes(rx);

    let resp = warp::test::request().path("/scoreboard").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    tx.send(Some(Arc::new(Scoreboard {
      round: Some(3),
      phase: Phase::FirstHalf,
      updated: Utc::now(),
      services: vec!["notes".to_owned()],
      teams: vec![TeamResult {
        rank: 1,
        id: 1,
        name: "alpha".to_owned(),
        status: vec![ServiceState::Corrupt],
        ..TeamResult::default()
      }],
    })))
    .unwrap();

    let resp = warp::test::request().path("/scoreboard").reply(&api).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(resp.body().to_vec()).unwrap();
    assert!(body.contains(r#""round":3"#), "{}", body);
    assert!(body.contains(r#""phase":"first_half""#), "{}", body);
    assert!(body.contains(r#""status":["corrupt"]"#), "{}", body);

    let resp = warp::test::request()
      .method("POST")
      .path("/scoreboard")
      .reply(&api)
      .await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
  }
}
