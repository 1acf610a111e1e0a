//! Error and Result module

use actix_web::ResponseError;
use derive_more::{Display, Error, From};

/// Errors which occur when applying a rewrite decision to a request
#[derive(Debug, Display, From, Error)]
#[non_exhaustive]
pub enum Error {
    #[display("Rewrite returned invalid status code")]
    InvalidStatus(actix_http::error::InvalidStatusCode),

    #[display("Rewrite generated an invalid uri")]
    InvalidUri(actix_http::uri::InvalidUri),

    #[display("Failed to assemble rewritten uri")]
    InvalidUriParts(actix_http::uri::InvalidUriParts),

    #[display("Rewrite generated an invalid location header")]
    InvalidHeader(actix_http::header::InvalidHeaderValue),
}

impl ResponseError for Error {
    /// Returns `500 Internal Server Error`.
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
    }
}
