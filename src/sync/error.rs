use crate::gateway::{ErrorKind, GatewayError};
use chrono::NaiveDate;
use thiserror::Error;

/// A collection fetch (`/sources/meta`, `/digest`) did not produce a usable result.
///
/// The cached state is left untouched when this is returned.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// The backend answered with a digest for another day.
    #[error("Asked for the digest of {requested}, received {received}")]
    WrongDate {
        requested: NaiveDate,
        received: NaiveDate,
    },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Gateway(e) => e.kind(),
            FetchError::WrongDate { .. } => ErrorKind::Parse,
        }
    }
}

/// Creating a subscription failed.
#[derive(Debug, Error)]
pub enum CreateError {
    /// The backend rejected the draft (duplicate or malformed URL, ...).
    #[error("Subscription rejected: {0}")]
    Validation(#[source] GatewayError),
    /// The request never produced a verdict.
    #[error(transparent)]
    Request(GatewayError),
}

impl From<GatewayError> for CreateError {
    fn from(err: GatewayError) -> Self {
        match err.kind() {
            ErrorKind::Status => CreateError::Validation(err),
            ErrorKind::Transport | ErrorKind::Parse => CreateError::Request(err),
        }
    }
}
