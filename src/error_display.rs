//! User-facing error message formatting.
//!
//! Uses typed error matching (ReclimitError and PolarsError variants, io::ErrorKind) rather than
//! string parsing to produce short, actionable messages.

use crate::error::ReclimitError;
use polars::prelude::PolarsError;
use std::io;
use std::path::Path;

/// Format a PolarsError raised while reading or writing delimited data.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::Duplicate(msg) => format!(
            "Duplicate column name: {}. Column names must be unique.",
            msg
        ),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::AlreadyExists => "File already exists.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("No space left") {
                return "No space left on device. Free up disk space and try again.".to_string();
            }
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            return if context.is_some() {
                format!("I/O error: {}", msg)
            } else {
                msg
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a library error for the terminal, optionally naming the file involved.
pub fn user_message(err: &ReclimitError, path: Option<&Path>) -> String {
    let msg = match err {
        ReclimitError::Io(io_err) => user_message_from_io(io_err, None),
        ReclimitError::Format { format, message } => {
            format!("The file is not valid {}: {}", format.to_uppercase(), message)
        }
        ReclimitError::UploadNotFound(name) => format!(
            "No stored upload named {:?}. Store it first with `reclimit upload <PATH>`.",
            name
        ),
        other => other.to_string(),
    };
    match path {
        Some(p) => format!("Failed to process {}: {}", p.display(), msg),
        None => msg,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find ReclimitError, PolarsError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    for cause in report.chain() {
        if let Some(err) = cause.downcast_ref::<ReclimitError>() {
            return user_message(err, path);
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            let msg = user_message_from_polars(pe);
            return match path {
                Some(p) => format!("Failed to process {}: {}", p.display(), msg),
                None => msg,
            };
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            let msg = user_message_from_io(io_err, None);
            return match path {
                Some(p) => format!("Failed to process {}: {}", p.display(), msg),
                None => msg,
            };
        }
    }

    // First line only; the full report is long
    let display = report.to_string();
    let trimmed = display.lines().next().unwrap_or("An error occurred").trim();
    match path {
        Some(p) => format!("Failed to process {}: {}", p.display(), trimmed),
        None => trimmed.to_string(),
    }
}

/// Strip polars-internal hints that make no sense to someone editing a CSV file.
fn simplify_compute_message(msg: &str) -> String {
    let first = msg.lines().next().unwrap_or(msg).trim();
    match first.find("You might want to try") {
        Some(idx) => first[..idx].trim_end().to_string(),
        None => first.to_string(),
    }
}
