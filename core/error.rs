use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("Invalid Root: '{path}' {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("Glob Pattern Error: {0}")]
    Glob(String),

    #[error("Tokenizer Error: {0}")]
    Tokenizer(String),

    #[error("Template Error: {0}")]
    Template(String),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ignore Error: {0}")]
    Ignore(#[from] ignore::Error),

    #[error("{format} Formatting Error in section '{section}': {message}")]
    Format {
        format: &'static str,
        section: String,
        message: String,
    },

    #[error("TikToken Error: {0}")]
    TikToken(String),
}

impl AppError {
    /// Errors that are reported before any traversal starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::TomlParse(_)
                | AppError::InvalidRoot { .. }
                | AppError::Glob(_)
                | AppError::Tokenizer(_)
                | AppError::Template(_)
        )
    }
}

impl From<globset::Error> for AppError {
    fn from(err: globset::Error) -> Self {
        AppError::Glob(format!("Globset error: {}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    AccessDenied,
    BrokenSymlink,
    SymlinkCycle,
    ReadFailed,
    Walk,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::AccessDenied => "access denied",
            WarningKind::BrokenSymlink => "broken symlink",
            WarningKind::SymlinkCycle => "symlink cycle",
            WarningKind::ReadFailed => "read failed",
            WarningKind::Walk => "walk error",
        };
        f.write_str(name)
    }
}

/// A per-entry problem that never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWarning {
    pub path: PathBuf,
    pub kind: WarningKind,
    pub message: String,
}

impl EntryWarning {
    pub fn new(path: impl Into<PathBuf>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => WarningKind::AccessDenied,
            std::io::ErrorKind::NotFound => WarningKind::BrokenSymlink,
            _ => WarningKind::ReadFailed,
        };
        Self::new(path, kind, err.to_string())
    }
}

impl fmt::Display for EntryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path.display(), self.kind, self.message)
    }
}
