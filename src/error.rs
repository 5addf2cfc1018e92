use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a [`crate::store::Store`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("stored attributes could not be decoded: {0}")]
    Attributes(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("user {0} is already registered")]
    AlreadyExists(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not authorized")]
    Forbidden,

    #[error("item not found")]
    NotFound,

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] StoreError),

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::AlreadyExists(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::Forbidden => StatusCode::FORBIDDEN,
            // callers cannot tell a missing todo from a backend failure
            Error::NotFound | Error::BackendUnavailable(_) | Error::MalformedRequest(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        status.into_response()
    }
}
