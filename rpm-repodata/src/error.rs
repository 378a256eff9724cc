// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {std::path::PathBuf, thiserror::Error};

/// Error type for this crate.
#[derive(Debug, Error)]
pub enum RepodataError {
    #[error("I/O error on path {0}: {1:?}")]
    IoPath(PathBuf, std::io::Error),

    #[error("input directory does not exist or is not a directory: {0}")]
    InputDirectory(PathBuf),

    #[error(
        "staging directory {0} already exists (another indexer running?)"
    )]
    StagingConflict(PathBuf),

    #[error("cannot parse package {path}: {source}")]
    PackageParse {
        path: PathBuf,
        #[source]
        source: rpm::Error,
    },

    #[error("XML parse error: {0:?}")]
    XmlParse(#[from] serde_xml_rs::Error),

    #[error("XML write error: {0:?}")]
    XmlWrite(#[from] xml::writer::Error),

    #[error("SQLite error: {0:?}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid exclude pattern: {0:?}")]
    Pattern(#[from] glob::PatternError),

    #[error("unknown checksum type: {0}")]
    UnknownChecksumType(String),

    #[error("unknown compression format: {0}")]
    UnknownCompressionFormat(String),

    #[error("repository metadata entry not found: {0}")]
    MetadataFileNotFound(&'static str),

    #[error("output stream error on {0}: {1:?}")]
    SinkWrite(&'static str, std::io::Error),

    #[error("cannot install signal handler: {0}")]
    SignalHandler(String),
}

impl RepodataError {
    /// Attach a path to a bare I/O error.
    pub fn io(path: impl Into<PathBuf>, e: std::io::Error) -> Self {
        Self::IoPath(path.into(), e)
    }
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, RepodataError>;
