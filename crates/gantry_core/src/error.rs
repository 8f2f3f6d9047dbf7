//! Error types for the update engine.

use std::io;
use thiserror::Error;

use crate::digest::ManifestError;

/// Failures surfaced by the update engine.
///
/// Structural descriptor problems each get their own variant so a caller can
/// show a specific, localizable message instead of a generic one; use
/// [`AppError::key`] to look up the message key.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("descriptor has no 'appbase' entry")]
    MissingAppBase,

    #[error("invalid application base '{value}': {source}")]
    InvalidAppBase {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid version '{value}': {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("descriptor has no 'class' entry")]
    MissingClass,

    #[error("descriptor declares no 'code' resources")]
    MissingCode,

    #[error("failed to load digest manifest: {0}")]
    ManifestLoad(#[from] ManifestError),

    #[error("descriptor does not match the digest manifest after recovery")]
    ManifestValidation,

    #[error("failed to refresh control file '{path}': {source}")]
    ControlFileDownload {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to spawn application process: {0}")]
    ProcessSpawn(#[source] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable message key for caller-side localization.
    pub fn key(&self) -> &'static str {
        match self {
            AppError::MissingAppBase => "missing_appbase",
            AppError::InvalidAppBase { .. } => "invalid_appbase",
            AppError::InvalidVersion { .. } => "invalid_version",
            AppError::MissingClass => "missing_class",
            AppError::MissingCode => "missing_code",
            AppError::ManifestLoad(_) => "manifest_load_failure",
            AppError::ManifestValidation => "manifest_validation_failure",
            AppError::ControlFileDownload { .. } => "control_file_download_failure",
            AppError::Io(_) => "io_error",
            AppError::ProcessSpawn(_) => "process_spawn_failure",
            AppError::Internal(_) => "internal_error",
        }
    }
}
