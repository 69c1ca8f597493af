use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Coarse classification of a [`VwError`], so callers can branch on the
/// kind of failure without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Transport,
    Verification,
    MetadataBuild,
    Config,
    Filesystem,
}

#[derive(Debug, Error, Diagnostic)]
pub enum VwError {
    #[error("Virtual Watershed rejected credentials (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Virtual Watershed request failed: {0}")]
    Http(String),

    #[error("Virtual Watershed returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode Virtual Watershed response: {0}")]
    Decode(String),

    #[error("no records found for model run {0}")]
    RecordsNotFound(String),

    #[error("download of {url} returned status {status}")]
    DownloadRejected { url: String, status: u16 },

    #[error("downloaded file does not exist: {0}")]
    DownloadMissing(PathBuf),

    #[error("invalid model run uuid: {0}")]
    InvalidUuid(String),

    #[error("unrecognized model set: {0} (expected \"inputs\" or \"outputs\")")]
    UnrecognizedModelSet(String),

    #[error("missing template field {section}.{key} in config")]
    MissingTemplateField { section: String, key: String },

    #[error("failed to render template: {0}")]
    TemplateRender(String),

    #[error("invalid date for {key}: {value}")]
    InvalidDate { key: String, value: String },

    #[error("invalid watershed metadata JSON: {0}")]
    InvalidMetadata(String),

    #[error("no config file found (looked for vw-adaptor.json)")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid Virtual Watershed base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("missing Virtual Watershed credentials: {0}")]
    MissingCredentials(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl VwError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VwError::Authentication { .. } => ErrorKind::Authentication,
            VwError::Http(_) | VwError::Status { .. } | VwError::Decode(_) => ErrorKind::Transport,
            VwError::RecordsNotFound(_)
            | VwError::DownloadRejected { .. }
            | VwError::DownloadMissing(_)
            | VwError::InvalidUuid(_) => ErrorKind::Verification,
            VwError::UnrecognizedModelSet(_)
            | VwError::MissingTemplateField { .. }
            | VwError::TemplateRender(_)
            | VwError::InvalidDate { .. }
            | VwError::InvalidMetadata(_) => ErrorKind::MetadataBuild,
            VwError::MissingConfig
            | VwError::ConfigRead(_)
            | VwError::ConfigParse(_)
            | VwError::InvalidBaseUrl { .. }
            | VwError::MissingCredentials(_) => ErrorKind::Config,
            VwError::Filesystem(_) => ErrorKind::Filesystem,
        }
    }

    /// True for failures raised by the HTTP layer: rejected credentials and
    /// transport errors. Verification failures happen after a successful
    /// round trip and are not HTTP errors.
    pub fn is_http(&self) -> bool {
        matches!(self.kind(), ErrorKind::Authentication | ErrorKind::Transport)
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        VwError::MissingTemplateField {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}
