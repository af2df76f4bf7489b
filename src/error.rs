use std::fmt::{self, Display};

use serde::Serialize;
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::{self, Reply, Response},
};

/// Kind of failure reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    UnsupportedMediaType,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::InvalidSession => 401,
            HtmlError::Unauthorized => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::MethodNotAllowed => 405,
            HtmlError::PayloadTooLarge => 413,
            HtmlError::UnsupportedMediaType => 415,
            HtmlError::InternalServerError => 500,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            HtmlError::InvalidRequest => "Invalid request.",
            HtmlError::InvalidSession => "Invalid token.",
            HtmlError::Unauthorized => "Authentication credentials were not provided.",
            HtmlError::Forbidden => "You do not have permission to perform this action.",
            HtmlError::NotFound => "Not found.",
            HtmlError::MethodNotAllowed => "Method not allowed.",
            HtmlError::PayloadTooLarge => "Request body is too large.",
            HtmlError::UnsupportedMediaType => "Unsupported media type in request.",
            HtmlError::InternalServerError => "Internal server error.",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
        }
    }

    pub fn default(self) -> Error {
        Error {
            code: self.code(),
            info: Some(self.message().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ErrorBody<'a> {
    Errors { errors: &'a str },
    Detail { detail: &'a str },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn info(&self) -> &str {
        self.info.as_deref().unwrap_or("")
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.info(), self.code)
    }
}

impl std::error::Error for Error {}

impl Reject for Error {}

impl Reply for Error {
    fn into_response(self) -> Response {
        let body = match self.code {
            400 => ErrorBody::Errors {
                errors: self.info(),
            },
            _ => ErrorBody::Detail {
                detail: self.info(),
            },
        };

        reply::with_status(reply::json(&body), self.status()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_messages_follow_kind() {
        let error = HtmlError::NotFound.default();
        assert_eq!(error.code, 404);
        assert_eq!(error.info(), "Not found.");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_requests_render_errors_key() {
        let response = HtmlError::InvalidRequest.new("Broken").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["errors"], "Broken");
    }

    #[tokio::test]
    async fn other_failures_render_detail_key() {
        let response = HtmlError::Forbidden.default().into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["detail"],
            "You do not have permission to perform this action."
        );
    }

    #[test]
    fn errors_travel_inside_rejections() {
        let rejection: warp::Rejection = HtmlError::Forbidden.default().into();

        assert_eq!(rejection.find::<Error>().map(|e| e.code), Some(403));
    }
}
