//! Reference discovery
//!
//! Reads every `*.json` file directly inside the input directory. A file is
//! either a list of reference strings or a single object with a `url`
//! field. References are flattened in file-name order, then in-file order;
//! empty strings are dropped, duplicates are kept.
//!
//! A malformed file is recorded in the error log and skipped; the other
//! files still contribute.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::services::error_sink::ErrorSink;
use crate::types::MediaReference;

/// Discovery errors (always recovered per file)
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Input directory missing or unreadable
    #[error("Input directory {path} is not readable: {message}")]
    Directory { path: PathBuf, message: String },

    /// File could not be read
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON of a supported shape
    #[error("{0}")]
    Parse(#[from] serde_json::Error),
}

/// Supported reference file shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReferenceFile {
    List(Vec<serde_json::Value>),
    Single { url: serde_json::Value },
}

/// Load and flatten all references under `input_dir`
///
/// Never fails: unreadable directories and files are recorded in `sink`.
pub fn load_references(input_dir: &Path, sink: &ErrorSink) -> Vec<MediaReference> {
    let files = match discover_reference_files(input_dir) {
        Ok(files) => files,
        Err(e) => {
            sink.record(format!("Failed to read input directory {}: {}", input_dir.display(), e));
            return Vec::new();
        }
    };

    let mut references = Vec::new();
    for path in files {
        match read_reference_file(&path) {
            Ok(found) => {
                tracing::debug!(file = %path.display(), count = found.len(), "Loaded references");
                references.extend(found);
            }
            Err(e) => {
                sink.record(format!("Failed to read JSON file {}: {}", path.display(), e));
            }
        }
    }

    tracing::info!(
        input_dir = %input_dir.display(),
        references = references.len(),
        "Reference discovery complete"
    );

    references
}

/// List `*.json` files directly inside `input_dir`, sorted by file name
pub fn discover_reference_files(input_dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !input_dir.is_dir() {
        return Err(DiscoveryError::Directory {
            path: input_dir.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_json_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing entry: {}", e);
            }
        }
    }

    Ok(files)
}

/// Parse one reference file
pub fn read_reference_file(path: &Path) -> Result<Vec<MediaReference>, DiscoveryError> {
    let content = std::fs::read_to_string(path)?;
    let parsed: ReferenceFile = serde_json::from_str(&content)?;

    let values = match parsed {
        ReferenceFile::List(items) => items,
        ReferenceFile::Single { url } => vec![url],
    };

    let mut references = Vec::with_capacity(values.len());
    for value in values {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => {
                references.push(MediaReference::new(s.trim()));
            }
            serde_json::Value::String(_) | serde_json::Value::Null => {}
            other => {
                tracing::warn!(file = %path.display(), value = %other, "Ignoring non-string reference");
            }
        }
    }

    Ok(references)
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_and_object_shapes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), r#"["urlA", "", "urlB"]"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"url": "urlC", "title": "x"}"#).unwrap();

        let files = discover_reference_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let mut all = Vec::new();
        for file in files {
            all.extend(read_reference_file(&file).unwrap());
        }
        let refs: Vec<&str> = all.iter().map(|r| r.as_str()).collect();
        assert_eq!(refs, vec!["urlA", "urlB", "urlC"]);
    }

    #[test]
    fn test_non_json_and_nested_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "urlX").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.json"), r#"["urlY"]"#).unwrap();
        fs::write(dir.path().join("UPPER.JSON"), r#"["urlZ"]"#).unwrap();

        let files = discover_reference_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("UPPER.JSON")]);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_reference_file(&path), Err(DiscoveryError::Parse(_))));

        let wrong_shape = dir.path().join("shape.json");
        fs::write(&wrong_shape, r#"{"link": "urlA"}"#).unwrap();
        assert!(read_reference_file(&wrong_shape).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let result = discover_reference_files(Path::new("/nonexistent/tfx/input"));
        assert!(matches!(result, Err(DiscoveryError::Directory { .. })));
    }

    #[tokio::test]
    async fn test_load_skips_bad_files_and_logs() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("1.json"), r#"["urlA"]"#).unwrap();
        fs::write(input.join("2.json"), "garbage").unwrap();
        fs::write(input.join("3.json"), r#"{"url": "urlB"}"#).unwrap();

        let log = dir.path().join("error_log.txt");
        let sink = ErrorSink::open(&log);
        let refs = load_references(&input, &sink);
        sink.flush().await;

        assert_eq!(refs, vec![MediaReference::new("urlA"), MediaReference::new("urlB")]);
        let content = fs::read_to_string(&log).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("Failed to read JSON file"));
        assert!(content.contains("2.json"));
    }
}
