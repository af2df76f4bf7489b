use warp::{reject::Rejection, reply::Reply, Filter};

use crate::{
    actions::login_user,
    jwt::SessionData,
    middleware::{with_session, with_state},
    schema::{AuthToken, LoginForm},
    state::SharedState,
};

use super::{json_body, no_content};

async fn login(form: LoginForm, state: SharedState) -> Result<impl Reply, Rejection> {
    let (token, claims) = login_user(
        form.email.trim(),
        &form.password,
        &state.jwt_secret,
        state.token_lifetime(),
        &state.pool,
    )
    .await?;

    state.sessions.register(&claims).await?;
    log::info!("User {} logged in", claims.username);

    Ok(warp::reply::json(&AuthToken { auth_token: token }))
}

async fn logout(session: SessionData, state: SharedState) -> Result<impl Reply, Rejection> {
    state.sessions.revoke(&session.jti).await?;
    log::info!("User {} logged out", session.username);

    Ok(no_content())
}

pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginForm>())
        .and(with_state(state.clone()))
        .and_then(login);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(logout);

    login.or(logout)
}

#[cfg(test)]
mod tests {
    use crate::{
        jwt::{generate_jwt_session, JwtSessionData},
        routes::{
            routes,
            tests::{body_json, state},
        },
        schema::{User, UserRole},
    };

    #[tokio::test]
    async fn login_requires_both_fields() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/token/login/")
            .json(&serde_json::json!({ "email": "cook@example.com" }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 400);
        assert!(body_json(response.body())["errors"].is_string());
    }

    #[tokio::test]
    async fn logout_requires_a_token() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/token/logout/")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 401);
        assert_eq!(
            body_json(response.body())["detail"],
            "Authentication credentials were not provided."
        );
    }

    // Needs a reachable REDIS_URL
    #[tokio::test]
    async fn logout_revokes_the_token() {
        let state = state();
        let user = User {
            id: 1,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ann"),
            last_name: String::from("Cook"),
            password: String::new(),
            role: UserRole::User,
        };
        let claims = JwtSessionData::new(&user, chrono::Duration::hours(1));
        let token = generate_jwt_session(&claims, &state.jwt_secret).unwrap();
        state.sessions.register(&claims).await.unwrap();

        let api = routes(state);
        let logout = || {
            warp::test::request()
                .method("POST")
                .path("/api/auth/token/logout/")
                .header("authorization", format!("Token {token}"))
        };

        assert_eq!(logout().reply(&api).await.status(), 204);

        let response = logout().reply(&api).await;
        assert_eq!(response.status(), 401);
        assert_eq!(body_json(response.body())["detail"], "Invalid token.");
    }
}
