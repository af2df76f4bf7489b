use serde::de::DeserializeOwned;
use warp::{
    http::StatusCode,
    path::FullPath,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use crate::{
    constants::REQUEST_BODY_LIMIT,
    form::{FormData, QueryForm},
    pagination::PageLocation,
    state::SharedState,
};

pub mod auth;
pub mod ingredients;
pub mod media;
pub mod recipes;
pub mod rejection;
pub mod tags;
pub mod users;

/// The whole HTTP surface: the JSON api under `/api/` and uploaded files under `/media/`.
pub fn routes(
    state: SharedState,
) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
    let api = auth::routes(state.clone())
        .or(users::routes(state.clone()))
        .or(tags::routes(state.clone()))
        .or(ingredients::routes(state.clone()))
        .or(recipes::routes(state.clone()));

    api.or(media::routes(state))
        .recover(rejection::handle_rejection)
        .with(warp::log("foodgram::http"))
}

/// Decoded query string, repeated keys included.
pub fn with_query() -> impl Filter<Extract = (QueryForm,), Error = Rejection> + Clone {
    warp::query::<FormData>().map(QueryForm::from_data)
}

/// Absolute location of the current request, used for pagination links.
pub fn with_page_location() -> impl Filter<Extract = (PageLocation,), Error = Rejection> + Clone
{
    warp::header::optional::<String>("host")
        .and(warp::header::optional::<String>("x-forwarded-proto"))
        .and(warp::path::full())
        .and(
            warp::query::raw()
                .or(warp::any().map(String::new))
                .unify(),
        )
        .map(
            |host: Option<String>, proto: Option<String>, path: FullPath, query: String| {
                PageLocation {
                    scheme: proto.unwrap_or_else(|| String::from("http")),
                    host,
                    path: path.as_str().to_string(),
                    query,
                }
            },
        )
}

pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(REQUEST_BODY_LIMIT).and(warp::body::json())
}

pub fn created<T: serde::Serialize>(value: &T) -> reply::WithStatus<reply::Json> {
    reply::with_status(reply::json(value), StatusCode::CREATED)
}

pub fn no_content() -> impl Reply {
    reply::with_status(reply::reply(), StatusCode::NO_CONTENT)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{config::Config, state::State};

    pub fn state() -> SharedState {
        let mut config = Config::defaults();
        config.jwt_secret = Some(String::from("test-secret"));
        config.media_root = std::env::temp_dir().join("foodgram-route-tests");
        State::lazy(config).unwrap()
    }

    pub fn body_json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let api = routes(state());
        let response = warp::test::request()
            .path("/api/nothing/")
            .reply(&api)
            .await;

        assert_eq!(response.status(), 404);
        assert_eq!(body_json(response.body())["detail"], "Not found.");
    }

    #[tokio::test]
    async fn wrong_method_is_not_allowed() {
        let api = routes(state());
        let response = warp::test::request()
            .method("PUT")
            .path("/api/tags/")
            .reply(&api)
            .await;

        assert_eq!(response.status(), 405);
    }

    #[tokio::test]
    async fn page_location_reads_the_request() {
        let location = warp::test::request()
            .path("/api/recipes/?page=2&tags=lunch")
            .header("host", "foodgram.test")
            .header("x-forwarded-proto", "https")
            .filter(&with_page_location())
            .await
            .unwrap();

        assert_eq!(location.scheme, "https");
        assert_eq!(location.host.as_deref(), Some("foodgram.test"));
        assert_eq!(location.path, "/api/recipes/");
        assert_eq!(location.query, "page=2&tags=lunch");
        assert_eq!(
            location.page_url(3),
            "https://foodgram.test/api/recipes/?tags=lunch&page=3"
        );
    }

    #[tokio::test]
    async fn repeated_query_keys_are_kept() {
        let form = warp::test::request()
            .path("/api/recipes/?tags=lunch&tags=dinner&author=3")
            .filter(&with_query())
            .await
            .unwrap();

        assert_eq!(form.get_all("tags"), vec!["lunch", "dinner"]);
        assert_eq!(form.get_number::<i32>("author").unwrap(), Some(3));
    }
}
