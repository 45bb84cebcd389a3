//! Filter, update and cap rows of CSV and Excel tables.
//!
//! A [`Table`] is loaded through [`io`], passed with a list of conditions or update rules to the
//! [`pipeline`], and written back in its source format. The engine is pure; front ends (the
//! `reclimit` binary and the interactive [`form`]) build explicit requests and hand them over.

pub mod condition;
pub mod config;
pub mod error;
pub mod error_display;
pub mod form;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod request;
pub mod store;
pub mod table;

pub use condition::{evaluate, CoercionPolicy, Condition, Operator, UpdateRule};
pub use config::{AppConfig, ConfigManager};
pub use error::{ErrorKind, ReclimitError, Result};
pub use io::FileOptions;
pub use pipeline::{count, filter, update, Engine, RowCap};
pub use request::{FilterRequest, UpdateRequest};
pub use store::{OutputKind, UploadReceipt, UploadStore};
pub use table::{Cell, Table};

/// Re-export CLI definitions from the shared cli crate
pub use reclimit_cli::{Args, CoercionMode, Command, FileFormat, LimitArgs, SourceArgs};

/// Application name used for config, cache and log directories
pub const APP_NAME: &str = "reclimit";
