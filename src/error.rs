//! Error taxonomy.
//!
//! Preview failures are always soft: whatever the variant, the entry keeps its
//! placeholder and the failure is logged. Listing failures are fatal to the
//! navigation that triggered them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    /// Corrupt or unsupported bitstream.
    #[error("cannot decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// Open/read failure on the source file (or a helper process).
    #[error("cannot read {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The classifier found no match, or the file carries nothing to preview.
    #[error("{}: no preview available", path.display())]
    UnsupportedType { path: PathBuf },
}

impl PreviewError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PreviewError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PreviewError::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported(path: impl Into<PathBuf>) -> Self {
        PreviewError::UnsupportedType { path: path.into() }
    }

    /// Unsupported types are expected and logged quietly.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, PreviewError::UnsupportedType { .. })
    }
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("could not open directory {}: {source}", dir.display())]
    Open {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read directory {}: {source}", dir.display())]
    Read {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Failure to bring up a browser on a directory.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("could not start the preview loader: {0}")]
    Spawn(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let e = PreviewError::decode("/a/b.png", "bad header");
        assert_eq!(e.to_string(), "cannot decode /a/b.png: bad header");

        let e = PreviewError::unsupported("/a/notes.txt");
        assert!(e.to_string().contains("notes.txt"));
        assert!(e.is_unsupported());
    }

    #[test]
    fn unavailable_keeps_io_source() {
        use std::error::Error as _;
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e = PreviewError::unavailable("/x.mp4", io);
        assert!(!e.is_unsupported());
        assert_eq!(e.source().map(|s| s.to_string()), Some("gone".into()));
    }
}
