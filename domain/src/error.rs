//! Error types for the `domain` layer.
use google_cloud_pubsub::error::PublishError;
use service::config::ConfigError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors are modeled as a tree with `domain::error::Error` as the root holding an
/// `error_kind` that says which layer failed and how. The `source` field keeps the
/// original error for logs. `web` inspects `error_kind` to choose an HTTP status, and
/// the bootstrap code treats every kind other than `Publish` as fatal at startup.
///
/// Neither `Display` nor `Debug` output may ever contain credential material, so
/// sources built here must only carry messages, never key payloads.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Errors raised before the messaging backend is contacted.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    /// Required configuration missing or malformed.
    Config,
    /// Credential payload missing, malformed, or could not be staged on disk.
    Credential,
    Other(String),
}

/// Errors reported by, or while talking to, the messaging backend.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The backend client could not be constructed or authenticated.
    Connection,
    /// The topic existence check could not be completed.
    BackendUnavailable,
    /// The named topic does not exist or is not visible to the credentials.
    TopicNotFound,
    /// A single publish call failed.
    Publish,
    Other(String),
}

impl Error {
    pub fn internal(kind: InternalErrorKind, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(kind),
        }
    }

    pub fn external(kind: ExternalErrorKind, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::External(kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let summary = match &self.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Config) => "invalid configuration",
            DomainErrorKind::Internal(InternalErrorKind::Credential) => "invalid credentials",
            DomainErrorKind::Internal(InternalErrorKind::Other(msg)) => msg.as_str(),
            DomainErrorKind::External(ExternalErrorKind::Connection) => {
                "failed to create Pub/Sub client"
            }
            DomainErrorKind::External(ExternalErrorKind::BackendUnavailable) => {
                "Pub/Sub backend unavailable"
            }
            DomainErrorKind::External(ExternalErrorKind::TopicNotFound) => "topic not found",
            DomainErrorKind::External(ExternalErrorKind::Publish) => "publish failed",
            DomainErrorKind::External(ExternalErrorKind::Other(msg)) => msg.as_str(),
        };
        match &self.source {
            Some(source) => write!(f, "{summary}: {source}"),
            None => write!(f, "{summary}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }
}

impl From<PublishError> for Error {
    fn from(err: PublishError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Publish),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Credential),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_summary_and_source() {
        let err = Error::external(ExternalErrorKind::Publish, "HTTP 403 Forbidden");
        assert_eq!(err.to_string(), "publish failed: HTTP 403 Forbidden");
    }

    #[test]
    fn test_display_without_source() {
        let err = Error {
            source: None,
            error_kind: DomainErrorKind::External(ExternalErrorKind::TopicNotFound),
        };
        assert_eq!(err.to_string(), "topic not found");
    }

    #[test]
    fn test_config_error_maps_to_internal_config() {
        let err: Error = ConfigError::MissingSetting("topic id").into();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
        assert!(err.to_string().contains("Couldn't find topic id"));
    }

    #[test]
    fn test_publish_error_maps_to_external_publish() {
        let err: Error = PublishError::Shutdown.into();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::Publish)
        );
        assert_eq!(err.to_string(), "publish failed: the publisher has shut down");
    }
}
