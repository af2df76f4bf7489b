use warp::{reject::Rejection, reply::Reply, Filter};

use crate::{
    actions::{get_tag, list_tags},
    error::HtmlError,
    middleware::with_state,
    schema::Id,
    state::SharedState,
};

async fn tag_list(state: SharedState) -> Result<impl Reply, Rejection> {
    let tags = list_tags(&state.pool).await?;
    Ok(warp::reply::json(&tags))
}

async fn tag_detail(id: Id, state: SharedState) -> Result<impl Reply, Rejection> {
    let tag = get_tag(id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(warp::reply::json(&tag))
}

pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(tag_list);

    let detail = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(tag_detail);

    list.or(detail)
}
