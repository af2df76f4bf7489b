use warp::{reject::Rejection, reply::Reply, Filter};

use crate::state::SharedState;

/// Serves uploaded files from the media root under `/media/`.
pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.config.media_root.to_owned()))
}
