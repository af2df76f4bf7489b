use std::convert::Infallible;

use warp::{
    body::BodyDeserializeError,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, Rejection, UnsupportedMediaType,
    },
    reply::Reply,
};

use crate::error::{Error, HtmlError};

fn rejection_error(rejection: &Rejection) -> Error {
    if let Some(error) = rejection.find::<Error>() {
        return error.to_owned();
    }

    if rejection.is_not_found() {
        return HtmlError::NotFound.default();
    }

    if let Some(e) = rejection.find::<BodyDeserializeError>() {
        return HtmlError::InvalidRequest.new(&format!("Invalid request body: {e}"));
    }
    if let Some(e) = rejection.find::<InvalidQuery>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if let Some(e) = rejection.find::<InvalidHeader>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if let Some(e) = rejection.find::<MissingHeader>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if rejection.find::<LengthRequired>().is_some() {
        return HtmlError::InvalidRequest.new("A request body is required");
    }
    if rejection.find::<PayloadTooLarge>().is_some() {
        return HtmlError::PayloadTooLarge.default();
    }
    if rejection.find::<UnsupportedMediaType>().is_some() {
        return HtmlError::UnsupportedMediaType.default();
    }
    if rejection.find::<MethodNotAllowed>().is_some() {
        return HtmlError::MethodNotAllowed.default();
    }

    log::error!("Unhandled rejection: {rejection:?}");
    HtmlError::InternalServerError.default()
}

/// Turns every rejection into a JSON error body.
pub async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let error = rejection_error(&rejection);

    if error.code >= 500 {
        log::warn!("Request failed: {error}");
    } else {
        log::debug!("Request rejected: {error}");
    }

    Ok(error.into_response())
}
