use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Locate,
    Extract,
    Normalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Locate => "locate",
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
        };
        f.write_str(name)
    }
}

/// Coarse failure category, used for skip accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    InvalidRoot,
    PathLayout,
    Walk,
    NotAnArchive,
    MissingCreationMetadata,
    InvalidDocument,
    NoLanguageStats,
    Io,
}

impl FailureKind {
    /// Per-record kinds, in summary order.
    pub const RECOVERABLE: [FailureKind; 6] = [
        FailureKind::Walk,
        FailureKind::NotAnArchive,
        FailureKind::MissingCreationMetadata,
        FailureKind::InvalidDocument,
        FailureKind::NoLanguageStats,
        FailureKind::Io,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FailureKind::InvalidRoot => "invalid root",
            FailureKind::PathLayout => "path layout",
            FailureKind::Walk => "directory walk",
            FailureKind::NotAnArchive => "not an archive",
            FailureKind::MissingCreationMetadata => "missing creation metadata",
            FailureKind::InvalidDocument => "invalid document",
            FailureKind::NoLanguageStats => "no language stats",
            FailureKind::Io => "i/o",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("root path '{}' does not exist or is not a directory", .path.display())]
    InvalidRoot { path: PathBuf },

    #[error(
        "path '{}' has {segments} segments below the root, layout needs at least {required}",
        .path.display()
    )]
    PathLayout {
        path: PathBuf,
        segments: usize,
        required: usize,
    },

    #[error("failed to walk '{}': {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("not a zip archive: '{}' ({reason})", .path.display())]
    NotAnArchive { path: PathBuf, reason: String },

    #[error("no creation metadata document in '{}'", .path.display())]
    MissingCreationMetadata { path: PathBuf },

    #[error("invalid {document} in '{}': {reason}", .path.display())]
    InvalidDocument {
        path: PathBuf,
        document: &'static str,
        reason: String,
    },

    #[error("missing 'languages' in baseline info of '{}'", .path.display())]
    NoLanguageStats { path: PathBuf },

    #[error("i/o error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::InvalidRoot { .. } => FailureKind::InvalidRoot,
            Error::PathLayout { .. } => FailureKind::PathLayout,
            Error::Walk { .. } => FailureKind::Walk,
            Error::NotAnArchive { .. } => FailureKind::NotAnArchive,
            Error::MissingCreationMetadata { .. } => FailureKind::MissingCreationMetadata,
            Error::InvalidDocument { .. } => FailureKind::InvalidDocument,
            Error::NoLanguageStats { .. } => FailureKind::NoLanguageStats,
            Error::Io { .. } => FailureKind::Io,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Error::InvalidRoot { .. } | Error::PathLayout { .. } | Error::Walk { .. } => {
                Stage::Locate
            }
            Error::NoLanguageStats { .. } => Stage::Normalize,
            Error::NotAnArchive { .. }
            | Error::MissingCreationMetadata { .. }
            | Error::InvalidDocument { .. }
            | Error::Io { .. } => Stage::Extract,
        }
    }

    /// Fatal errors abort the run; everything else skips a single record.
    /// A walk error is fatal only when the root itself cannot be read.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Walk { source, .. } => source.depth() == 0,
            _ => self.stage() == Stage::Locate,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Error::InvalidRoot { path }
            | Error::PathLayout { path, .. }
            | Error::Walk { path, .. }
            | Error::NotAnArchive { path, .. }
            | Error::MissingCreationMetadata { path }
            | Error::InvalidDocument { path, .. }
            | Error::NoLanguageStats { path }
            | Error::Io { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
