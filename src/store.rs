//! Directory of uploaded source files, addressed by sanitized file name.

use crate::error::{ReclimitError, Result};
use crate::io::{header_of, FileOptions};
use crate::FileFormat;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default upload size limit in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 16;

/// Which pipeline produced an output file; decides its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Filtered,
    Updated,
}

impl OutputKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            OutputKind::Filtered => "filtered_",
            OutputKind::Updated => "updated_",
        }
    }

    /// `filtered_<name>` or `updated_<name>`.
    pub fn output_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Output path next to `source`, keeping its file name.
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        source.with_file_name(self.output_name(&name))
    }
}

/// What the caller learns about a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub success: bool,
    pub headers: Vec<String>,
    pub filename: String,
}

/// Manages the upload directory
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadStore {
    /// Create a store with a custom directory (primarily for testing)
    pub fn with_dir(dir: PathBuf) -> Self {
        Self {
            dir,
            max_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }

    /// Create a store under the user cache directory for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| ReclimitError::Config("could not determine cache directory".into()))?
            .join(app_name)
            .join("uploads");
        Ok(Self::with_dir(dir))
    }

    pub fn with_max_upload_mb(mut self, mb: u64) -> Self {
        self.max_bytes = mb.saturating_mul(1024 * 1024);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    /// Store `bytes` under a sanitized version of `name` and report its header.
    pub fn put(&self, name: &str, bytes: &[u8], options: &FileOptions) -> Result<UploadReceipt> {
        let filename = sanitize_filename(name);
        if filename.is_empty() {
            return Err(ReclimitError::Validation("no file name given".into()));
        }
        let format = FileFormat::from_path(Path::new(&filename))
            .ok_or_else(|| ReclimitError::UnsupportedFormat(filename.clone()))?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(ReclimitError::Validation(format!(
                "{} is {} bytes, larger than the upload limit of {} bytes",
                filename,
                bytes.len(),
                self.max_bytes
            )));
        }
        let headers = header_of(bytes, format, options)?;

        self.ensure_dir()?;
        fs::write(self.dir.join(&filename), bytes)?;
        info!(filename = %filename, bytes = bytes.len(), "stored upload");

        Ok(UploadReceipt {
            success: true,
            headers,
            filename,
        })
    }

    /// Path of a stored upload; fails when nothing is stored under that name.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        let filename = sanitize_filename(name);
        let path = self.dir.join(&filename);
        if filename.is_empty() || !path.is_file() {
            return Err(ReclimitError::UploadNotFound(name.to_string()));
        }
        Ok(path)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        Ok(fs::read(path)?)
    }

    /// Where the result of running `kind` against upload `name` is written.
    pub fn output_path(&self, kind: OutputKind, name: &str) -> PathBuf {
        self.dir.join(kind.output_name(&sanitize_filename(name)))
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        fs::remove_file(path)?;
        Ok(())
    }

    /// Stored file names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove every stored file (uploads and outputs).
    pub fn clear_all(&self) -> Result<()> {
        for name in self.list()? {
            let path = self.dir.join(&name);
            if let Err(e) = fs::remove_file(&path) {
                warn!(file = %name, error = %e, "could not remove stored file");
            }
        }
        Ok(())
    }
}

/// Reduce a client-supplied name to a safe, flat file name.
///
/// Path components are dropped, whitespace becomes `_`, and anything outside
/// `[A-Za-z0-9._-]` is removed. Leading and trailing dots and underscores are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("people.csv"), "people.csv");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\data\\my file.xlsx"), "my_file.xlsx");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename("résumé.csv"), "rsum.csv");
    }

    #[test]
    fn test_output_names() {
        assert_eq!(OutputKind::Filtered.output_name("a.csv"), "filtered_a.csv");
        assert_eq!(
            OutputKind::Updated.output_path_for(Path::new("/tmp/data/a.xlsx")),
            PathBuf::from("/tmp/data/updated_a.xlsx")
        );
    }

    #[test]
    fn test_put_and_read() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::with_dir(temp.path().join("uploads"));
        let receipt = store
            .put("my data.csv", b"a,b\n1,2\n", &FileOptions::default())
            .unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.filename, "my_data.csv");
        assert_eq!(receipt.headers, vec!["a", "b"]);
        assert_eq!(store.read("my_data.csv").unwrap(), b"a,b\n1,2\n");
        assert_eq!(store.list().unwrap(), vec!["my_data.csv"]);
    }

    #[test]
    fn test_put_rejects_other_extensions() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::with_dir(temp.path().to_path_buf());
        let err = store
            .put("notes.txt", b"hello", &FileOptions::default())
            .unwrap_err();
        assert!(matches!(err, ReclimitError::UnsupportedFormat(_)));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_put_enforces_size_limit() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::with_dir(temp.path().to_path_buf()).with_max_upload_mb(0);
        let err = store
            .put("a.csv", b"a\n1\n", &FileOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("upload limit"));
    }

    #[test]
    fn test_missing_upload() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::with_dir(temp.path().to_path_buf());
        assert!(matches!(
            store.read("nope.csv"),
            Err(ReclimitError::UploadNotFound(_))
        ));
    }
}
