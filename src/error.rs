//! Library error type.

use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReclimitError>;

/// Coarse classification a front end maps to exit or status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller, reported before any row is processed.
    Validation,
    /// Reading, writing or locating a file failed.
    Io,
}

#[derive(Debug, Error)]
pub enum ReclimitError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("could not read {format} data: {message}")]
    Format { format: String, message: String },
    #[error("unsupported file format: {0} (expected .csv or .xlsx)")]
    UnsupportedFormat(String),
    #[error("no stored upload named {0:?}")]
    UploadNotFound(String),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ReclimitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReclimitError::Validation(_)
            | ReclimitError::UnsupportedFormat(_)
            | ReclimitError::Request(_)
            | ReclimitError::Config(_) => ErrorKind::Validation,
            ReclimitError::Io(_)
            | ReclimitError::Format { .. }
            | ReclimitError::UploadNotFound(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn format(format: &str, message: impl Into<String>) -> Self {
        ReclimitError::Format {
            format: format.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ReclimitError {
    fn from(err: serde_json::Error) -> Self {
        ReclimitError::Request(err.to_string())
    }
}

impl From<PolarsError> for ReclimitError {
    fn from(err: PolarsError) -> Self {
        match err {
            PolarsError::IO { error, .. } => match std::sync::Arc::try_unwrap(error) {
                Ok(io_err) => ReclimitError::Io(io_err),
                Err(shared) => ReclimitError::Io(io::Error::new(shared.kind(), shared.to_string())),
            },
            other => ReclimitError::format("csv", crate::error_display::user_message_from_polars(&other)),
        }
    }
}

impl From<calamine::Error> for ReclimitError {
    fn from(err: calamine::Error) -> Self {
        match err {
            calamine::Error::Io(io_err) => ReclimitError::Io(io_err),
            other => ReclimitError::format("xlsx", other.to_string()),
        }
    }
}

impl From<calamine::XlsxError> for ReclimitError {
    fn from(err: calamine::XlsxError) -> Self {
        match err {
            calamine::XlsxError::Io(io_err) => ReclimitError::Io(io_err),
            other => ReclimitError::format("xlsx", other.to_string()),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReclimitError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        match err {
            rust_xlsxwriter::XlsxError::IoError(io_err) => ReclimitError::Io(io_err),
            other => ReclimitError::format("xlsx", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ReclimitError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ReclimitError::UnsupportedFormat("parquet".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ReclimitError::UploadNotFound("a.csv".into()).kind(),
            ErrorKind::Io
        );
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(ReclimitError::from(io_err).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_json_error_is_request_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ReclimitError::from(err);
        assert!(matches!(err, ReclimitError::Request(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_format_message() {
        let err = ReclimitError::format("csv", "bad quoting");
        assert_eq!(err.to_string(), "could not read csv data: bad quoting");
    }
}
