use warp::{reject::Rejection, reply::Reply, Filter};

use crate::{
    actions::{
        build_subscriptions, fetch_subscriptions, fetch_users, get_subscription, get_user_by_id,
        get_user_view, register_user, set_password, subscribe, unsubscribe,
    },
    error::HtmlError,
    form::QueryForm,
    jwt::SessionData,
    middleware::{with_possible_session, with_session, with_state},
    pagination::{PageContext, PageLocation, Pagination},
    permissions::ActionType,
    schema::{CreatedUser, Id, PasswordForm, UserForm},
    state::SharedState,
    validation::{validate_password, validate_user_form},
};

use super::{created, json_body, no_content, with_page_location, with_query};

/// `recipes_limit` of the subscription views; negative values are ignored.
fn recipes_limit(form: &QueryForm) -> Result<Option<i64>, Rejection> {
    Ok(form
        .get_number::<i64>("recipes_limit")?
        .filter(|limit| *limit >= 0))
}

async fn list_users(
    session: Option<SessionData>,
    form: QueryForm,
    location: PageLocation,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    let pagination = Pagination::from_form(&form, state.config.page_size)?;
    let viewer = session.map(|session| session.user_id);

    let (users, total) = fetch_users(viewer, pagination, &state.pool).await?;
    let page = PageContext::from_rows(users, total, pagination, &location)?;

    Ok(warp::reply::json(&page))
}

async fn register(form: UserForm, state: SharedState) -> Result<impl Reply, Rejection> {
    validate_user_form(&form)?;

    let user = register_user(&form, &state.pool).await?;
    Ok(created(&CreatedUser::from(user)))
}

async fn me(session: SessionData, state: SharedState) -> Result<impl Reply, Rejection> {
    let user = get_user_view(session.user_id, Some(session.user_id), &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(warp::reply::json(&user))
}

async fn user_detail(
    id: Id,
    session: Option<SessionData>,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let user = get_user_view(id, viewer, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(warp::reply::json(&user))
}

async fn change_password(
    session: SessionData,
    form: PasswordForm,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    validate_password(&form.new_password)?;

    set_password(
        session.user_id,
        &form.current_password,
        &form.new_password,
        &state.pool,
    )
    .await?;
    log::info!("User {} changed their password", session.username);

    Ok(no_content())
}

async fn list_subscriptions(
    session: SessionData,
    form: QueryForm,
    location: PageLocation,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let pagination = Pagination::from_form(&form, state.config.page_size)?;
    let limit = recipes_limit(&form)?;

    let (authors, total) = fetch_subscriptions(session.user_id, pagination, &state.pool).await?;
    let subscriptions =
        build_subscriptions(authors, limit, &state.config.media_url, &state.pool).await?;
    let page = PageContext::from_rows(subscriptions, total, pagination, &location)?;

    Ok(warp::reply::json(&page))
}

async fn subscribe_to(
    id: Id,
    session: SessionData,
    form: QueryForm,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let limit = recipes_limit(&form)?;

    if get_user_by_id(&state.pool, id).await?.is_none() {
        return Err(HtmlError::NotFound.default().into());
    }

    subscribe(session.user_id, id, &state.pool).await?;
    log::info!("User {} subscribed to {id}", session.user_id);

    let subscription = get_subscription(
        session.user_id,
        id,
        limit,
        &state.config.media_url,
        &state.pool,
    )
    .await?;

    Ok(created(&subscription))
}

async fn unsubscribe_from(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if get_user_by_id(&state.pool, id).await?.is_none() {
        return Err(HtmlError::NotFound.default().into());
    }

    unsubscribe(session.user_id, id, &state.pool).await?;
    log::info!("User {} unsubscribed from {id}", session.user_id);

    Ok(no_content())
}

pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_query())
        .and(with_page_location())
        .and(with_state(state.clone()))
        .and_then(list_users);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body::<UserForm>())
        .and(with_state(state.clone()))
        .and_then(register);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(me);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<PasswordForm>())
        .and(with_state(state.clone()))
        .and_then(change_password);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_query())
        .and(with_page_location())
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let detail = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(user_detail);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(subscribe_to);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(unsubscribe_from);

    list.or(register)
        .or(me)
        .or(set_password)
        .or(subscriptions)
        .or(detail)
        .or(subscribe)
        .or(unsubscribe)
}

#[cfg(test)]
mod tests {
    use crate::routes::{
        routes,
        tests::{body_json, state},
    };

    #[tokio::test]
    async fn registration_validates_before_saving() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/users/")
            .json(&serde_json::json!({
                "email": "not-an-email",
                "username": "cook",
                "first_name": "Julia",
                "last_name": "Child",
                "password": "bouillabaisse",
            }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 400);
        assert_eq!(
            body_json(response.body())["errors"],
            "Enter a valid email address"
        );
    }

    #[tokio::test]
    async fn registration_rejects_short_passwords() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/users/")
            .json(&serde_json::json!({
                "email": "cook@example.com",
                "username": "cook",
                "first_name": "Julia",
                "last_name": "Child",
                "password": "short",
            }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn me_requires_a_token() {
        let response = warp::test::request()
            .path("/api/users/me/")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn subscriptions_require_a_token() {
        for (method, path) in [
            ("GET", "/api/users/subscriptions/"),
            ("POST", "/api/users/3/subscribe/"),
            ("DELETE", "/api/users/3/subscribe/"),
            ("POST", "/api/users/set_password/"),
        ] {
            let response = warp::test::request()
                .method(method)
                .path(path)
                .reply(&routes(state()))
                .await;

            assert_eq!(response.status(), 401, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn page_numbers_must_be_positive() {
        let response = warp::test::request()
            .path("/api/users/?page=0")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 404);
        assert_eq!(body_json(response.body())["detail"], "Invalid page.");
    }
}
