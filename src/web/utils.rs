use std::convert::Infallible;

use warp::Filter;

/// Hand a clone of `t` to every request
pub fn with<T: Clone + Send>(
  t: T,
) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
  warp::any().map(move || t.clone())
}
