use catsync_validate::ValidationError;
use thiserror::Error;

/// Errors returned by the Zuora REST client.
#[derive(Debug, Error)]
pub enum ZuoraError {
    /// Network or TLS failure, or a non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Zuora answered with `"Success": false` or an unusable payload.
    #[error("Zuora API error: {0}")]
    ApiError(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("environment '{0}' has no Zuora url configured")]
    MissingUrl(String),
}

/// Errors that stop [`crate::SyncExecutor::apply`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Precondition(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ZuoraError),

    #[error("expected exactly one {entity} '{key}' in Zuora, found {found}")]
    RemoteLookup {
        entity: &'static str,
        key: String,
        found: usize,
    },

    #[error("failed to {action} {entity} '{key}': {errors}")]
    MutationFailed {
        action: &'static str,
        entity: &'static str,
        key: String,
        errors: String,
    },

    #[error("Zuora {entity} '{key}' has an unusable {field}: {value}")]
    InvalidRemote {
        entity: &'static str,
        key: String,
        field: &'static str,
        value: String,
    },
}
