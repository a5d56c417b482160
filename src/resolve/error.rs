//! Resolution failures

use thiserror::Error;

use crate::domain::{Doi, DoiError};

/// Why a DOI could not be resolved.
///
/// `Clone` so a single outcome can be handed to every caller waiting on a
/// coalesced fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("DOI {0} is not registered")]
    NotFound(Doi),

    #[error("Network error resolving {doi}: {message}")]
    Network { doi: Doi, message: String },

    #[error("Unexpected response for {doi}: {message}")]
    UnexpectedResponse { doi: Doi, message: String },
}

impl ResolveError {
    /// Only transient network failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Network { .. })
    }

    pub fn network(doi: &Doi, message: impl Into<String>) -> Self {
        ResolveError::Network {
            doi: doi.clone(),
            message: message.into(),
        }
    }

    pub fn unexpected(doi: &Doi, message: impl Into<String>) -> Self {
        ResolveError::UnexpectedResponse {
            doi: doi.clone(),
            message: message.into(),
        }
    }
}

impl From<DoiError> for ResolveError {
    fn from(err: DoiError) -> Self {
        ResolveError::InvalidDoi(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        let doi: Doi = "10.1000/xyz123".parse().unwrap();

        assert!(ResolveError::network(&doi, "timed out").is_retryable());
        assert!(!ResolveError::NotFound(doi.clone()).is_retryable());
        assert!(!ResolveError::unexpected(&doi, "not json").is_retryable());
        assert!(!ResolveError::InvalidDoi("nope".into()).is_retryable());
    }

    #[test]
    fn doi_errors_become_invalid_doi() {
        let err: ResolveError = "not-a-doi".parse::<Doi>().unwrap_err().into();
        assert!(matches!(err, ResolveError::InvalidDoi(_)));
    }
}
