//! Tick configuration files.
//!
//! The format is picked from the file extension: `.ron`, `.toml` or `.json`.
//! Missing fields take their defaults and the result is validated before it
//! is returned.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use wirebench_core::sim::{TickConfig, TickConfigError};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The file parsed but holds values the driver cannot run with.
    #[error("invalid config in {file}: {source}")]
    Invalid {
        file: PathBuf,
        #[source]
        source: TickConfigError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Deserialize `content` in the given format. `file` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    file: &Path,
) -> Result<T, ConfigError> {
    let parse = |detail: String| ConfigError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse(e.to_string())),
    }
}

/// Parse and validate a tick configuration from text.
pub fn parse_config(content: &str, format: Format, file: &Path) -> Result<TickConfig, ConfigError> {
    let config: TickConfig = deserialize_str(content, format, file)?;
    config.validate().map_err(|source| ConfigError::Invalid {
        file: file.to_path_buf(),
        source,
    })?;
    Ok(config)
}

/// Read, parse and validate a tick configuration file.
pub fn load_config(path: &Path) -> Result<TickConfig, ConfigError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content, format, path)?;
    tracing::debug!(
        file = %path.display(),
        ticks_per_second = config.ticks_per_second,
        burst = config.burst,
        "tick config loaded"
    );
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wirebench_config_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("tick.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("tick.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("tick.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        let err = detect_format(Path::new("tick.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
        assert!(detect_format(Path::new("tick")).is_err());
    }

    // -----------------------------------------------------------------------
    // load_config
    // -----------------------------------------------------------------------

    #[test]
    fn load_each_format() {
        let dir = make_test_dir("formats");
        fs::write(dir.join("a.ron"), "(ticks_per_second: 30, burst: 2)").unwrap();
        fs::write(dir.join("b.toml"), "ticks_per_second = 120\nburst = 4\n").unwrap();
        fs::write(dir.join("c.json"), r#"{ "ticks_per_second": 20 }"#).unwrap();

        let a = load_config(&dir.join("a.ron")).unwrap();
        assert_eq!((a.ticks_per_second, a.burst), (30, 2));
        let b = load_config(&dir.join("b.toml")).unwrap();
        assert_eq!((b.ticks_per_second, b.burst), (120, 4));
        let c = load_config(&dir.join("c.json")).unwrap();
        assert_eq!((c.ticks_per_second, c.burst), (20, 1));

        cleanup(&dir);
    }

    #[test]
    fn empty_documents_take_defaults() {
        let file = Path::new("empty.toml");
        assert_eq!(parse_config("", Format::Toml, file).unwrap(), TickConfig::default());
        assert_eq!(parse_config("()", Format::Ron, file).unwrap(), TickConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = parse_config("burst = 0", Format::Toml, Path::new("x.toml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                source: TickConfigError::ZeroBurst,
                ..
            }
        ));
        assert!(err.to_string().contains("x.toml"));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = parse_config("{ not json", Format::Json, Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("parse error in bad.json"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/wirebench/tick.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
