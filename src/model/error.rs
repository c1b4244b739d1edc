use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found at: {0}")]
    ModelNotFound(PathBuf),

    #[error("Feature manifest not found at: {0}. Export it alongside the model artifact")]
    ManifestNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid scoring artifact: {0}")]
    InvalidArtifact(String),

    #[error("Invalid feature manifest: {0}")]
    InvalidManifest(String),

    #[error("Artifact expects {expected} features but manifest lists {found}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("Input has {found} columns, model expects {expected}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Model produced a non-finite probability for row {0}")]
    NonFiniteOutput(usize),
}

