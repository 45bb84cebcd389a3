use crate::condition::CoercionPolicy;
use crate::error::{ReclimitError, Result};
use crate::io::FileOptions;
use crate::store::{UploadStore, DEFAULT_MAX_UPLOAD_MB};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_VERSION: &str = "0.1";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ReclimitError::Config("could not determine config directory".into()))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate the default configuration as TOML text.
    /// Every field is commented out so defaults apply until the user uncomments one.
    pub fn generate_default_config(&self) -> Result<String> {
        let defaults = toml::Value::try_from(AppConfig::default())
            .map_err(|e| ReclimitError::Config(format!("could not serialize defaults: {}", e)))?;

        let mut out = String::new();
        out.push_str("# reclimit configuration file\n");
        out.push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n\n");
        for (field, comment) in APP_COMMENTS {
            push_field(&mut out, field, comment, defaults.get(*field), None);
        }

        for (section, header, fields) in SECTIONS {
            out.push('\n');
            out.push_str(header);
            out.push('\n');
            out.push_str(&format!("# [{}]\n", section));
            let values = defaults.get(*section);
            for (field, comment, example) in *fields {
                let value = values.and_then(|v| v.get(*field));
                push_field(&mut out, field, comment, value, Some(example));
            }
        }
        Ok(out)
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(ReclimitError::Config(format!(
                "config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            )));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config()?)?;

        Ok(config_path)
    }
}

fn push_field(
    out: &mut String,
    field: &str,
    comment: &str,
    value: Option<&toml::Value>,
    example: Option<&str>,
) {
    for line in comment.lines() {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
    let rendered = match (value, example) {
        (Some(v), _) => v.to_string(),
        (None, Some(e)) => e.to_string(),
        (None, None) => return,
    };
    out.push_str(&format!("# {} = {}\n", field, rendered));
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub engine: EngineConfig,
    pub limits: LimitsConfig,
    pub file_loading: FileLoadingConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub coercion_policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub default_max_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub excel_sheet: Option<String>,
    pub max_upload_mb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_to_file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            engine: EngineConfig::default(),
            limits: LimitsConfig::default(),
            file_loading: FileLoadingConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coercion_policy: "row".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_max_rows: Some(100),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from(&config_manager)
    }

    /// Load using a specific config directory
    pub fn load_from(config_manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        let config_path = config_manager.config_path("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                ReclimitError::Config(format!(
                    "failed to read config file at {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
            let user_config: AppConfig = toml::from_str(&content).map_err(|e| {
                ReclimitError::Config(format!(
                    "failed to parse config file at {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
            config.merge(user_config);
        }

        config.validate().map_err(|e| match e {
            ReclimitError::Config(msg) if config_path.exists() => {
                ReclimitError::Config(format!("{} (in {})", msg, config_path.display()))
            }
            other => other,
        })?;

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.engine.merge(other.engine);
        self.limits.merge(other.limits);
        self.file_loading.merge(other.file_loading);
        self.storage.merge(other.storage);
        self.logging.merge(other.logging);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(ReclimitError::Config(format!(
                "unsupported config version: {}. Expected 0.1.x",
                self.version
            )));
        }

        self.coercion_policy()?;

        if self.limits.default_max_rows == Some(0) {
            return Err(ReclimitError::Config(
                "default_max_rows must be greater than 0".into(),
            ));
        }

        if let Some(d) = self.file_loading.delimiter {
            if !d.is_ascii() || d == b'\n' || d == b'\r' || d == b'"' {
                return Err(ReclimitError::Config(format!(
                    "delimiter must be a printable ASCII byte other than a quote, got {}",
                    d
                )));
            }
        }

        if self.file_loading.max_upload_mb == Some(0) {
            return Err(ReclimitError::Config(
                "max_upload_mb must be greater than 0".into(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ReclimitError::Config("logging.level must not be empty".into()));
        }

        Ok(())
    }

    pub fn coercion_policy(&self) -> Result<CoercionPolicy> {
        self.engine
            .coercion_policy
            .parse()
            .map_err(|e: ReclimitError| ReclimitError::Config(e.to_string()))
    }

    /// CSV/XLSX options from the file loading section.
    pub fn file_options(&self) -> FileOptions {
        let defaults = FileOptions::default();
        FileOptions {
            delimiter: self.file_loading.delimiter.unwrap_or(defaults.delimiter),
            excel_sheet: self.file_loading.excel_sheet.clone(),
        }
    }

    /// Upload store in the configured directory, or the default cache location.
    pub fn upload_store(&self, app_name: &str) -> Result<UploadStore> {
        let store = match &self.storage.upload_dir {
            Some(dir) => UploadStore::with_dir(dir.clone()),
            None => UploadStore::new(app_name)?,
        };
        Ok(store.with_max_upload_mb(
            self.file_loading
                .max_upload_mb
                .unwrap_or(DEFAULT_MAX_UPLOAD_MB),
        ))
    }
}

// Merge implementations for each config section
impl EngineConfig {
    pub fn merge(&mut self, other: Self) {
        let default = EngineConfig::default();
        if other.coercion_policy != default.coercion_policy {
            self.coercion_policy = other.coercion_policy;
        }
    }
}

impl LimitsConfig {
    pub fn merge(&mut self, other: Self) {
        let default = LimitsConfig::default();
        if other.default_max_rows != default.default_max_rows {
            self.default_max_rows = other.default_max_rows;
        }
    }
}

impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.excel_sheet.is_some() {
            self.excel_sheet = other.excel_sheet;
        }
        if other.max_upload_mb.is_some() {
            self.max_upload_mb = other.max_upload_mb;
        }
    }
}

impl StorageConfig {
    pub fn merge(&mut self, other: Self) {
        if other.upload_dir.is_some() {
            self.upload_dir = other.upload_dir;
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = LoggingConfig::default();
        if other.level != default.level {
            self.level = other.level;
        }
        if other.log_to_file != default.log_to_file {
            self.log_to_file = other.log_to_file;
        }
    }
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

type FieldDoc = (&'static str, &'static str, &'static str);

/// (section, header, [(field, comment, example used when the default is unset)])
const SECTIONS: &[(&str, &str, &[FieldDoc])] = &[
    (
        "engine",
        "# ============================================================================\n# Engine\n# ============================================================================",
        &[(
            "coercion_policy",
            "How a non-numeric cell affects >, <, >= and <= conditions\n\"row\": the condition is false for that row only\n\"column\": any non-numeric cell in the column disables the whole condition",
            "\"row\"",
        )],
    ),
    (
        "limits",
        "# ============================================================================\n# Limits\n# ============================================================================",
        &[(
            "default_max_rows",
            "Value pre-filled in the form's \"Max rows\" field (positive integer)",
            "100",
        )],
    ),
    (
        "file_loading",
        "# ============================================================================\n# File Loading\n# ============================================================================",
        &[
            (
                "delimiter",
                "Delimiter for CSV files (as ASCII value, e.g., 44 for comma, 59 for semicolon)",
                "44",
            ),
            (
                "excel_sheet",
                "Excel sheet to read: 0-based index or sheet name (default: first sheet)",
                "\"0\"",
            ),
            (
                "max_upload_mb",
                "Largest file accepted by `reclimit upload`, in megabytes",
                "16",
            ),
        ],
    ),
    (
        "storage",
        "# ============================================================================\n# Storage\n# ============================================================================",
        &[(
            "upload_dir",
            "Directory for stored uploads and their outputs (default: <cache dir>/reclimit/uploads)",
            "\"/var/tmp/reclimit\"",
        )],
    ),
    (
        "logging",
        "# ============================================================================\n# Logging\n# ============================================================================",
        &[
            (
                "level",
                "Log filter directive, e.g. \"info\", \"debug\" or \"reclimit=trace\"\nRUST_LOG and --log-level take precedence",
                "\"info\"",
            ),
            (
                "log_to_file",
                "Write command-line logs to the log directory as well as stderr\nThe interactive form always logs to a file",
                "false",
            ),
        ],
    ),
];
