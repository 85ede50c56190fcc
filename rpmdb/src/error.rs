use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::BackendKind;

/// Broad classes of failure, stable across releases
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is not a database of the format being tried
    NotThisFormat,
    /// Structural damage in the container
    CorruptContainer,
    /// A container variant that is recognized but not read
    UnsupportedLayout,
    /// A record that does not decode as a header
    CorruptHeader,
    /// A decoded header lacking the fields of a package
    IncompleteMetadata,
    Io,
}

#[derive(thiserror::Error)]
pub enum Error {
    #[error("{context}{}", display_path(.path))]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
        context: &'static str,
    },
    #[error("Not a {backend} database: {reason}")]
    NotThisFormat {
        backend: BackendKind,
        reason: &'static str,
    },
    #[error("Corrupt {backend} database: {reason}")]
    Corrupt { backend: BackendKind, reason: String },
    #[error("Unsupported {backend} database: {reason}")]
    Unsupported { backend: BackendKind, reason: String },
    #[error("Record {key}")]
    Record {
        key: u64,
        #[source]
        source: rpmdb_core::Error,
    },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(": {}", path.display()),
        None => String::new(),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::NotThisFormat { .. } => ErrorKind::NotThisFormat,
            Error::Corrupt { .. } => ErrorKind::CorruptContainer,
            Error::Unsupported { .. } => ErrorKind::UnsupportedLayout,
            Error::Record { source, .. } if source.is_metadata() => ErrorKind::IncompleteMetadata,
            Error::Record { .. } => ErrorKind::CorruptHeader,
        }
    }

    pub(crate) fn corrupt(backend: BackendKind, reason: impl Into<String>) -> Error {
        Error::Corrupt {
            backend,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(backend: BackendKind, reason: impl Into<String>) -> Error {
        Error::Unsupported {
            backend,
            reason: reason.into(),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")?;

        let mut source = self.source();
        while let Some(err) = source {
            writeln!(f, "\tCaused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}

/// Shorthand for turning an [`io::Error`] into an [`Error::Io`] inside `map_err`
#[macro_export]
macro_rules! wrap_io_err {
    ($context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: None,
            context: $context,
        }
    };
    ($path:expr, $context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: Some($path.to_path_buf()),
            context: $context,
        }
    };
}
