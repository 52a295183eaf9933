//! Connector error taxonomy.
//!
//! `NoDataFound` is a normal outcome (the entry is marked unmatched);
//! `Auth` and `Quota` end further use of the source; everything else is
//! transient and surfaced in the run manifest.

use thiserror::Error;

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("No data found for {collection} in {window} over bbox {bbox}")]
    NoDataFound {
        collection: String,
        window: String,
        bbox: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Provider quota exceeded: {0}")]
    Quota(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Unknown data connector: {0}")]
    UnknownConnector(String),

    #[error("Unknown collection {collection} for connector {connector}")]
    UnknownCollection {
        connector: String,
        collection: String,
    },

    #[error("Band {band} not available in collection {collection} (available: {available})")]
    BandNotAvailable {
        collection: String,
        band: String,
        available: String,
    },

    #[error("Invalid connector configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Geo(#[from] curation_common::CurationError),
}

impl ConnectorError {
    /// Missing data is an expected outcome, not a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, ConnectorError::NoDataFound { .. })
    }

    /// Auth and quota failures end further use of the source for this run.
    pub fn is_fatal_for_source(&self) -> bool {
        matches!(self, ConnectorError::Auth(_) | ConnectorError::Quota(_))
    }

    pub(crate) fn no_data(
        collection: &str,
        window: &curation_common::QueryWindow,
        bbox: &curation_common::BoundingBox,
    ) -> Self {
        ConnectorError::NoDataFound {
            collection: collection.to_string(),
            window: format!("{}..{}", window.date_start, window.date_end),
            bbox: format!("{:?}", bbox.to_array()),
        }
    }
}
