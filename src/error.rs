//! Error types for podmo

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Engine command `{command}` failed: {message}")]
    Engine { command: String, message: String },

    #[error("Failed to invoke `{program}` - is it installed and on PATH?")]
    EngineSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the container engine itself rejected or failed a call
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Error::Engine { .. } | Error::EngineSpawn { .. })
    }

    /// Build an engine failure from the argument list that was run
    pub fn engine(args: &[String], message: impl Into<String>) -> Self {
        Error::Engine {
            command: args.join(" "),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_message() {
        let args = vec!["pull".to_string(), "ubuntu:20.04".to_string()];
        let err = Error::engine(&args, "exit code 125");
        assert!(err.is_engine_failure());
        assert_eq!(
            err.to_string(),
            "Engine command `pull ubuntu:20.04` failed: exit code 125"
        );
    }

    #[test]
    fn test_staging_is_not_engine_failure() {
        let err = Error::Staging {
            path: PathBuf::from("missing.sh"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(!err.is_engine_failure());
        assert!(err.to_string().contains("missing.sh"));
    }
}
