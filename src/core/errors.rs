//! JFRH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Top-level error type for the JFR harvester.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("[JFRH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[JFRH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[JFRH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[JFRH-2001] record decode failure: {details}")]
    Decode { details: String },

    #[error("[JFRH-2002] recording session unavailable: {details}")]
    SourceClosed { details: String },

    #[error("[JFRH-2101] mapper failure for {type_id}: {details}")]
    Mapper { type_id: String, details: String },

    #[error("[JFRH-2102] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[JFRH-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[JFRH-3002] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[JFRH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HarvestError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "JFRH-1001",
            Self::MissingConfig { .. } => "JFRH-1002",
            Self::ConfigParse { .. } => "JFRH-1003",
            Self::Decode { .. } => "JFRH-2001",
            Self::SourceClosed { .. } => "JFRH-2002",
            Self::Mapper { .. } => "JFRH-2101",
            Self::Serialization { .. } => "JFRH-2102",
            Self::Io { .. } => "JFRH-3001",
            Self::ChannelClosed { .. } => "JFRH-3002",
            Self::Runtime { .. } => "JFRH-3900",
        }
    }

    /// Whether this error means the recording session itself is gone.
    ///
    /// Fatal-for-source errors stop the harvest scheduler; everything else
    /// is isolated to the record, cycle, or batch it occurred in.
    #[must_use]
    pub const fn is_fatal_for_source(&self) -> bool {
        matches!(self, Self::SourceClosed { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HarvestError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<HarvestError> {
        vec![
            HarvestError::InvalidConfig {
                details: String::new(),
            },
            HarvestError::MissingConfig {
                path: PathBuf::new(),
            },
            HarvestError::ConfigParse {
                context: "",
                details: String::new(),
            },
            HarvestError::Decode {
                details: String::new(),
            },
            HarvestError::SourceClosed {
                details: String::new(),
            },
            HarvestError::Mapper {
                type_id: String::new(),
                details: String::new(),
            },
            HarvestError::Serialization {
                context: "",
                details: String::new(),
            },
            HarvestError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            HarvestError::ChannelClosed { component: "" },
            HarvestError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let codes: Vec<&str> = all_errors().iter().map(HarvestError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_jfrh_prefix() {
        for err in &all_errors() {
            assert!(
                err.code().starts_with("JFRH-"),
                "code {} must start with JFRH-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = HarvestError::InvalidConfig {
            details: "bad value".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("JFRH-1001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("bad value"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn only_source_loss_is_fatal() {
        for err in &all_errors() {
            let expected = matches!(err, HarvestError::SourceClosed { .. });
            assert_eq!(
                err.is_fatal_for_source(),
                expected,
                "fatality misclassified for {}",
                err.code()
            );
        }
    }

    #[test]
    fn io_convenience_constructor() {
        let err = HarvestError::io(
            "/var/run/jfrh/spool",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "JFRH-3001");
        assert!(err.to_string().contains("/var/run/jfrh/spool"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: HarvestError = json_err.into();
        assert_eq!(err.code(), "JFRH-2102");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: HarvestError = toml_err.into();
        assert_eq!(err.code(), "JFRH-1003");
    }
}
