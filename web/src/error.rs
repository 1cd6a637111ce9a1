use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{DomainErrorKind, Error as DomainError, ExternalErrorKind};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

// Every failure reachable from a request is a 500: startup errors never get this far,
// and a failed publish is the backend's fault, not the caller's. The body describes
// the cause; domain errors never carry credential material.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            DomainErrorKind::External(ExternalErrorKind::Publish) => {
                error!("Failed to publish: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to publish: {}", self.0),
                )
                    .into_response()
            }
            _ => {
                error!("Request failed: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
