//! Shared CLI definitions for reclimit.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// File format for source and output files (used to bypass extension-based detection).
/// When `--format` is not specified, format is auto-detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated values (or another single-byte delimiter, see --delimiter)
    Csv,
    /// Excel workbook (.xlsx); the first worksheet unless --sheet is given
    Xlsx,
}

impl FileFormat {
    /// Detect file format from path extension. Returns None when extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "csv", "XLSX").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Canonical file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// How a failed numeric coercion affects a comparison condition.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CoercionMode {
    /// A non-numeric cell fails the condition for that row only
    Row,
    /// A non-numeric cell anywhere in the column disables the whole condition
    Column,
}

/// Where the source table comes from: a path on disk or a previously stored upload.
#[derive(Clone, Debug, clap::Args)]
pub struct SourceArgs {
    /// Path to the CSV or Excel file to read
    #[arg(value_name = "PATH", required_unless_present = "upload")]
    pub path: Option<PathBuf>,

    /// Name of a file previously stored with `reclimit upload`
    #[arg(long = "upload", value_name = "NAME", conflicts_with = "path")]
    pub upload: Option<String>,
}

/// Options shared by the commands that produce or count rows.
#[derive(Clone, Debug, clap::Args)]
pub struct LimitArgs {
    /// Maximum number of rows to keep (positive integer). Omit for all rows.
    #[arg(long = "max-rows", value_name = "N")]
    pub max_rows: Option<String>,

    /// Read conditions or rules (and optionally the cap) from a JSON request file
    #[arg(long = "request", value_name = "FILE")]
    pub request: Option<PathBuf>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Print the column names of a file
    Headers {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the header list as a JSON array
        #[arg(long = "json", action)]
        json: bool,
    },

    /// Store a file in the upload directory so later commands can refer to it by name
    Upload {
        /// Path to the CSV or Excel file to store
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Keep the rows that match every condition
    Filter {
        #[command(flatten)]
        source: SourceArgs,

        /// Condition as three values: column, operator (==, >, <, >=, <=, contains, "not contains") and literal. Repeatable; all must match.
        #[arg(long = "where", num_args = 3, value_names = ["COLUMN", "OP", "VALUE"], allow_hyphen_values = true)]
        conditions: Vec<String>,

        #[command(flatten)]
        limit: LimitArgs,

        /// Output file (default: filtered_<name> next to the source)
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Overwrite cells in rows matching per-column rules, applied in order
    Update {
        #[command(flatten)]
        source: SourceArgs,

        /// Rule as four values: column, operator, literal and replacement. Repeatable; later rules see earlier writes.
        #[arg(long = "set", num_args = 4, value_names = ["COLUMN", "OP", "VALUE", "REPLACEMENT"], allow_hyphen_values = true)]
        rules: Vec<String>,

        #[command(flatten)]
        limit: LimitArgs,

        /// Output file (default: updated_<name> next to the source)
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Print how many rows a filter would keep
    Count {
        #[command(flatten)]
        source: SourceArgs,

        /// Condition as three values: column, operator and literal. Repeatable.
        #[arg(long = "where", num_args = 3, value_names = ["COLUMN", "OP", "VALUE"], allow_hyphen_values = true)]
        conditions: Vec<String>,

        #[command(flatten)]
        limit: LimitArgs,
    },

    /// Build conditions interactively in the terminal and save the result
    Form {
        #[command(flatten)]
        source: SourceArgs,

        /// Start in update mode (conditions carry a replacement value)
        #[arg(long = "update", action)]
        update: bool,

        /// Output file (default: filtered_<name> or updated_<name> next to the source)
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Command-line arguments for reclimit
#[derive(Clone, Parser, Debug)]
#[command(
    name = "reclimit",
    version,
    about = "Filter, update and cap rows of CSV and Excel files",
    long_about = "Load a CSV or Excel file, declare per-column conditions and either keep the \
matching rows or overwrite cells in them. Every result can be capped to a maximum row count."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Force file format (csv, xlsx). By default format is detected from the file extension.
    #[arg(long = "format", value_enum, global = true)]
    pub format: Option<FileFormat>,

    /// Excel sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Sales")
    #[arg(long = "sheet", value_name = "SHEET", global = true)]
    pub excel_sheet: Option<String>,

    /// Delimiter for CSV files, a single ASCII character (use "tab" for tab-separated files)
    #[arg(long = "delimiter", value_name = "CHAR", value_parser = parse_delimiter, global = true)]
    pub delimiter: Option<u8>,

    /// How a non-numeric cell affects >, <, >= and <= conditions (default: row)
    #[arg(long = "coercion-policy", value_enum, global = true)]
    pub coercion_policy: Option<CoercionMode>,

    /// Log filter directive (e.g. info, debug, reclimit=trace). Overrides config and RUST_LOG.
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Also write logs to the log directory
    #[arg(long = "log-file", action, global = true)]
    pub log_file: bool,

    /// Generate default configuration file at ~/.config/reclimit/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,

    /// Remove all stored uploads and exit
    #[arg(long = "clear-uploads", action)]
    pub clear_uploads: bool,
}

/// Parse a delimiter given as a single ASCII character or the word "tab".
fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Ok(c as u8),
                _ => Err(format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    s
                )),
            }
        }
    }
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn render_arg_rows(cmd: &clap::Command, out: &mut String) {
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; one table for the global options and one per command.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Global Options\n\n");
    render_arg_rows(&cmd, &mut out);

    for sub in cmd.get_subcommands() {
        if sub.get_name() == "help" {
            continue;
        }
        out.push_str(&format!("\n## `{}`\n\n", sub.get_name()));
        if let Some(about) = sub.get_about() {
            out.push_str(&format!("{}\n\n", about));
        }
        render_arg_rows(sub, &mut out);
    }

    out
}
