use log::error;
use miette::Diagnostic;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::{Json, json};
use rocket::Request;
use thiserror::Error;

/// Crate-wide error type. Each variant is one of the failure kinds from the
/// propagation policy: per-variant errors surface immediately to the client,
/// per-record errors are recovered locally by the caller and never construct
/// this type, per-batch errors are logged and turned into a retry.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("invalid variant input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Db(#[from] diesel::result::Error),

    #[error(transparent)]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("upstream annotation call failed: {0}")]
    Upstream(String),
}

impl Error {
    fn status(&self) -> Status {
        match self {
            Error::InvalidInput(_) => Status::BadRequest,
            Error::Db(_) | Error::Pool(_) | Error::Upstream(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'o> {
        error!("{self:#?}");
        let status = self.status();
        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });
        Json(body).respond_to(request).map(|mut response| {
            response.set_status(status);
            response
        })
    }
}

