//! Error taxonomy shared by every storage family.
//!
//! Backends translate their own failures into [`GatewayError`]. Anything that
//! is not recognised becomes [`GatewayError::Transient`] with the original
//! cause attached, so callers can always decide between "retry", "reload and
//! retry" and "give up".

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use thiserror::Error;

/// Result alias used across the crate
pub type GatewayResult<T> = Result<T, GatewayError>;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of resource a [`GatewayError::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Table,
    Record,
    Container,
    Blob,
    Queue,
    Message,
    Share,
    Directory,
    File,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Table => "table",
            ResourceKind::Record => "record",
            ResourceKind::Container => "container",
            ResourceKind::Blob => "blob",
            ResourceKind::Queue => "queue",
            ResourceKind::Message => "message",
            ResourceKind::Share => "share",
            ResourceKind::Directory => "directory",
            ResourceKind::File => "file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("record {partition_key}/{row_key} already exists in table {table}")]
    Conflict {
        table: String,
        partition_key: String,
        row_key: String,
    },

    #[error("record {partition_key}/{row_key} in table {table} was modified by another writer; reload and retry")]
    VersionConflict {
        table: String,
        partition_key: String,
        row_key: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transient store error: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("storage initialization failed for {resource}: {source}")]
    InitializationFailure {
        resource: String,
        #[source]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        GatewayError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        GatewayError::InvalidInput(message.into())
    }

    /// Wrap an arbitrary failure as a transient store error
    pub fn transient<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        GatewayError::Transient {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn transient_msg(message: impl Into<String>) -> Self {
        GatewayError::Transient {
            message: message.into(),
            source: None,
        }
    }

    pub fn initialization(resource: impl Into<String>, cause: GatewayError) -> Self {
        GatewayError::InitializationFailure {
            resource: resource.into(),
            source: Box::new(cause),
        }
    }

    /// True for failures a caller may retry: version conflicts (after a reload)
    /// and transient store errors.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::VersionConflict { .. } | GatewayError::Transient { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, GatewayError::VersionConflict { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GatewayError::Conflict { .. })
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(e: rusqlite::Error) -> Self {
        GatewayError::transient("sqlite operation failed", e)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::transient("filesystem operation failed", e)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::transient("record (de)serialization failed", e)
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(e: tokio::task::JoinError) -> Self {
        GatewayError::transient("blocking storage task did not complete", e)
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Conflict { .. } => StatusCode::CONFLICT,
            GatewayError::VersionConflict { .. } => StatusCode::PRECONDITION_FAILED,
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InitializationFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        let not_found = GatewayError::not_found(ResourceKind::Record, "Customers/c1");
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let conflict = GatewayError::Conflict {
            table: "Customers".into(),
            partition_key: "Customers".into(),
            row_key: "c1".into(),
        };
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let stale = GatewayError::VersionConflict {
            table: "Customers".into(),
            partition_key: "Customers".into(),
            row_key: "c1".into(),
        };
        assert_eq!(stale.status_code(), StatusCode::PRECONDITION_FAILED);

        assert_eq!(GatewayError::invalid("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::transient_msg("io").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let init = GatewayError::initialization("table Customers", GatewayError::transient_msg("io"));
        assert_eq!(init.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_retryable_classification() {
        let stale = GatewayError::VersionConflict {
            table: "Orders".into(),
            partition_key: "Orders".into(),
            row_key: "o1".into(),
        };
        assert!(stale.is_retryable());
        assert!(stale.is_version_conflict());
        assert!(GatewayError::transient_msg("timeout").is_retryable());
        assert!(!GatewayError::not_found(ResourceKind::Queue, "q").is_retryable());
        assert!(!GatewayError::invalid("empty key").is_retryable());
    }

    #[test]
    fn test_transient_keeps_cause() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = GatewayError::from(io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("filesystem"));
    }

    #[test]
    fn test_initialization_message_names_resource() {
        let err = GatewayError::initialization(
            "queue stock-updates",
            GatewayError::invalid("bad name"),
        );
        assert!(err.to_string().contains("queue stock-updates"));
    }
}
