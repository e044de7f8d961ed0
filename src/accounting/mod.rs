//! Third-party accounting platform integration: OAuth2 connect flow, stored
//! tokens per tenant, contact sync and invoice push.

pub mod client;
pub mod connection;
pub mod sync;

use thiserror::Error;

use crate::database::manager::DatabaseError;

pub use client::{AccountingProvider, HttpAccountingClient};
pub use sync::SyncSummary;

#[derive(Debug, Error)]
pub enum AccountingError {
    #[error("accounting integration is not configured")]
    NotConfigured,

    #[error("accounting platform is not connected")]
    NotConnected,

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("accounting platform returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AccountingError {
    fn from(err: sqlx::Error) -> Self {
        AccountingError::Database(err.into())
    }
}
