//! Reading models from disk and writing results back
//!
//! Models are stored as JSON. YAML (`.yaml`/`.yml`) is accepted too, with
//! the same field names.

use std::fs;
use std::io;
use std::path::Path;

use fincast_core::model::ModelData;
use serde::Serialize;

/// Error types for model file operations
#[derive(Debug)]
pub enum LoadError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(msg) => write!(f, "IO error: {msg}"),
            LoadError::Parse(msg) => write!(f, "Parse error: {msg}"),
            LoadError::Serialize(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Format {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Format::Yaml,
        _ => Format::Json,
    }
}

/// Parse a model from text in the given file's format
pub fn parse_model(text: &str, path: &Path) -> Result<ModelData, LoadError> {
    match format_of(path) {
        Format::Json => serde_json::from_str(text).map_err(|e| LoadError::Parse(e.to_string())),
        Format::Yaml => serde_saphyr::from_str(text).map_err(|e| LoadError::Parse(e.to_string())),
    }
}

/// Load a model file
pub fn load_model(path: &Path) -> Result<ModelData, LoadError> {
    let text = fs::read_to_string(path)
        .map_err(|e| LoadError::Io(format!("{}: {e}", path.display())))?;
    let model = parse_model(&text, path)?;
    tracing::debug!(
        path = %path.display(),
        assets = model.assets.len(),
        incomes = model.incomes.len(),
        expenses = model.expenses.len(),
        transactions = model.transactions.len(),
        "model loaded"
    );
    Ok(model)
}

/// Write `value` as pretty JSON, atomically via a temporary file
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), LoadError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| LoadError::Serialize(e.to_string()))?;
    atomic_write(path, &json).map_err(|e| LoadError::Io(format!("{}: {e}", path.display())))
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)
}
