use std::path::PathBuf;
use thiserror::Error;

use crate::core::producers::DeclarationKind;

/// Central error type for the artifact repository.
/// Every module returns `Result<T, RepoError>`.
#[derive(Debug, Error)]
pub enum RepoError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {target}: {reason}")]
    DownloadFailed { target: String, reason: String },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Cache entry for {coordinate} is corrupt: {reason}")]
    CacheCorruption { coordinate: String, reason: String },

    // ── Coordinates / declarations ──────────────────────
    #[error("Invalid artifact coordinate: {0}")]
    InvalidCoordinateFormat(String),

    #[error("No producer claims dependency {declaration}")]
    UnresolvedDependency { declaration: String },

    #[error("Only one {kind} dependency is allowed, found {first} and {second}")]
    DuplicateDeclaration {
        kind: DeclarationKind,
        first: String,
        second: String,
    },

    #[error("Missing primary game dependency declaration")]
    MissingPrimaryDeclaration,

    #[error("{coordinate} would be synthesized by both {first} and {second}")]
    OverlappingClaims {
        coordinate: String,
        first: String,
        second: String,
    },

    #[error("Invalid access transformer {path:?} line {line}: {reason}")]
    InvalidAccessTransformer {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // ── Pipeline steps ──────────────────────────────────
    #[error("Extraction failed for {coordinate}: {reason}")]
    ExtractionFailed { coordinate: String, reason: String },

    #[error("Remapping failed for {coordinate}: {reason}")]
    RemapFailed { coordinate: String, reason: String },

    #[error("Access transformation failed for {coordinate}: {reason}")]
    AccessTransformFailed { coordinate: String, reason: String },

    #[error("Repackaging failed for {coordinate}: {reason}")]
    RepackageFailed { coordinate: String, reason: String },

    #[error("Mappings unavailable for version {version}: {reason}")]
    MappingUnavailable { version: String, reason: String },

    #[error("Required build fact {0} has not been discovered")]
    MissingFact(&'static str),

    // ── Session ─────────────────────────────────────────
    #[error("Build property {key} already set to {existing}, refusing {attempted}")]
    PropertyConflict {
        key: String,
        existing: String,
        attempted: String,
    },

    #[error("Invalid session state: {0}")]
    SessionState(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type RepoResult<T> = Result<T, RepoError>;

impl RepoError {
    /// Name of the pipeline step that failed, if this is a step failure.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            RepoError::DownloadFailed { .. } | RepoError::Sha1Mismatch { .. } => Some("download"),
            RepoError::ExtractionFailed { .. } => Some("extract"),
            RepoError::RemapFailed { .. } | RepoError::MappingUnavailable { .. } => Some("remap"),
            RepoError::AccessTransformFailed { .. } => Some("transform"),
            RepoError::RepackageFailed { .. } => Some("repackage"),
            _ => None,
        }
    }

    /// Coordinate (or download target) the failure originated from.
    pub fn coordinate(&self) -> Option<&str> {
        match self {
            RepoError::DownloadFailed { target, .. } => Some(target),
            RepoError::ExtractionFailed { coordinate, .. }
            | RepoError::RemapFailed { coordinate, .. }
            | RepoError::AccessTransformFailed { coordinate, .. }
            | RepoError::OverlappingClaims { coordinate, .. }
            | RepoError::RepackageFailed { coordinate, .. }
            | RepoError::CacheCorruption { coordinate, .. } => Some(coordinate),
            RepoError::UnresolvedDependency { declaration } => Some(declaration),
            _ => None,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, RepoError::CacheCorruption { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RepoError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for RepoError {
    fn from(source: std::io::Error) -> Self {
        RepoError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
