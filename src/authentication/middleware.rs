use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use crate::{
    error::{Error, HtmlError},
    state::SharedState,
};

use super::jwt::{verify_jwt_session, SessionData};

pub fn with_state(
    state: SharedState,
) -> impl Filter<Extract = (SharedState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Token part of an `Authorization: Token <token>` or `Bearer <token>` header.
pub fn parse_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }

    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token)
    } else {
        None
    }
}

async fn resolve_session(header: &str, state: &SharedState) -> Result<SessionData, Error> {
    let token =
        parse_token(header).ok_or_else(|| HtmlError::InvalidSession.new("Invalid token header."))?;

    // Signature and expiry first, the registry is only asked about well formed tokens
    let claims = verify_jwt_session(token, &state.jwt_secret)?;

    match state.sessions.find(&claims.jti).await? {
        Some(record) if record.user_id == claims.user_id => Ok(claims.into()),
        _ => Err(HtmlError::InvalidSession.new("Invalid token.")),
    }
}

async fn required_session(
    header: Option<String>,
    state: SharedState,
) -> Result<SessionData, Rejection> {
    let header = header.ok_or_else(|| HtmlError::Unauthorized.default())?;
    Ok(resolve_session(&header, &state).await?)
}

async fn optional_session(
    header: Option<String>,
    state: SharedState,
) -> Result<Option<SessionData>, Rejection> {
    match header {
        Some(header) => Ok(Some(resolve_session(&header, &state).await?)),
        None => Ok(None),
    }
}

/// Requires a valid, still registered token.
pub fn with_session(
    state: SharedState,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(required_session)
}

/// Anonymous requests pass as `None`, a presented but invalid token is still rejected.
pub fn with_possible_session(
    state: SharedState,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(optional_session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, state::State};

    fn state() -> SharedState {
        let mut config = Config::defaults();
        config.jwt_secret = Some(String::from("test-secret"));
        State::lazy(config).unwrap()
    }

    fn rejection_error(rejection: Rejection) -> Error {
        rejection.find::<Error>().cloned().unwrap()
    }

    #[test]
    fn token_schemes() {
        assert_eq!(parse_token("Token abc"), Some("abc"));
        assert_eq!(parse_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_token("token  abc "), Some("abc"));
        assert_eq!(parse_token("Basic abc"), None);
        assert_eq!(parse_token("Token"), None);
        assert_eq!(parse_token("Token "), None);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let rejection = warp::test::request()
            .filter(&with_session(state()))
            .await
            .unwrap_err();

        assert_eq!(rejection_error(rejection).code, 401);
    }

    #[tokio::test]
    async fn forged_token_is_rejected_before_the_registry() {
        let rejection = warp::test::request()
            .header("authorization", "Token not.a.jwt")
            .filter(&with_session(state()))
            .await
            .unwrap_err();

        let error = rejection_error(rejection);
        assert_eq!(error.code, 401);
        assert_eq!(error.info(), "Invalid token.");
    }

    #[tokio::test]
    async fn anonymous_requests_pass_as_none() {
        let session = warp::test::request()
            .filter(&with_possible_session(state()))
            .await
            .unwrap();

        assert!(session.is_none());
    }

    #[tokio::test]
    async fn invalid_optional_token_is_still_rejected() {
        let rejection = warp::test::request()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .filter(&with_possible_session(state()))
            .await
            .unwrap_err();

        assert_eq!(rejection_error(rejection).code, 401);
    }
}
