// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! In-memory model of one package's repository metadata. */

use crate::checksum::ChecksumType;

/// Everything the three metadata documents record about a single package.
///
/// Instances are produced either by parsing a package header
/// ([crate::parse::package_from_file]) or by reading existing repository XML
/// back ([crate::xml::reader]). Serialization into the three documents is
/// handled by the [crate::xml] module and must be insensitive to which of
/// the two sources produced the record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Package {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,

    /// Hex content digest of the package file; its identity in metadata.
    pub pkg_id: String,
    pub checksum_type: ChecksumType,

    pub summary: String,
    pub description: String,
    pub packager: Option<String>,
    pub url: Option<String>,

    /// Package file mtime in seconds since the epoch.
    pub time_file: u64,
    pub time_build: u64,

    /// Size in bytes of the package file.
    pub size_package: u64,
    /// Total size in bytes when installed.
    pub size_installed: u64,
    /// Size in bytes of the embedded payload archive.
    pub size_archive: u64,

    /// Path of the package relative to the repository root.
    pub location_href: String,
    /// Optional absolute base URL the href is resolved against.
    pub location_base: Option<String>,

    pub license: Option<String>,
    pub vendor: Option<String>,
    pub group: Option<String>,
    pub build_host: Option<String>,
    pub source_rpm: Option<String>,

    /// Byte range of the header section within the package file.
    pub header_start: u64,
    pub header_end: u64,

    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub suggests: Vec<Dependency>,
    pub enhances: Vec<Dependency>,
    pub recommends: Vec<Dependency>,
    pub supplements: Vec<Dependency>,

    pub files: Vec<FileEntry>,
    pub changelogs: Vec<ChangelogEntry>,
}

impl Package {
    /// Basename of the package file, derived from its location.
    pub fn filename(&self) -> &str {
        self.location_href
            .rsplit('/')
            .next()
            .unwrap_or(&self.location_href)
    }
}

/// One edge in a package relationship list (provides, requires, ...).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dependency {
    pub name: String,
    /// Version comparison: one of `EQ`, `LT`, `LE`, `GT`, `GE`.
    pub flags: Option<String>,
    pub epoch: Option<u64>,
    pub version: Option<String>,
    pub release: Option<String>,
    /// Whether the relation must hold before installation scripts run.
    pub pre: bool,
}

/// Classification of a path shipped by a package.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileKind {
    File,
    Dir,
    Ghost,
}

impl FileKind {
    /// The `type` attribute value in XML, absent for regular files.
    pub fn xml_type(&self) -> Option<&'static str> {
        match self {
            Self::File => None,
            Self::Dir => Some("dir"),
            Self::Ghost => Some("ghost"),
        }
    }

    /// Single character code used in the filelists database.
    pub fn db_code(&self) -> char {
        match self {
            Self::File => 'f',
            Self::Dir => 'd',
            Self::Ghost => 'g',
        }
    }

    pub fn from_xml_type(s: Option<&str>) -> Self {
        match s {
            Some("dir") => Self::Dir,
            Some("ghost") => Self::Ghost,
            _ => Self::File,
        }
    }
}

/// A path shipped by a package.
#[derive(Clone, Debug, PartialEq)]
pub struct FileEntry {
    pub path: String,
    pub kind: FileKind,
}

impl FileEntry {
    /// Whether this path belongs in the abbreviated file list of
    /// `primary.xml`.
    ///
    /// Consumers resolve most file dependencies against `primary.xml` alone,
    /// so it carries only the paths dependency resolution commonly needs;
    /// the full manifest lives in `filelists.xml`.
    pub fn is_primary(&self) -> bool {
        self.path.contains("bin/")
            || self.path.starts_with("/etc/")
            || self.path == "/usr/lib/sendmail"
    }
}

/// One changelog entry of a package.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangelogEntry {
    pub author: String,
    /// Entry timestamp in seconds since the epoch.
    pub date: u64,
    pub text: String,
}

/// Split a composite `[epoch:]version[-release]` string into its parts.
///
/// Dependency versions arrive from package headers in this composite form.
/// A bare version gets an implicit epoch of 0; absent parts stay absent.
pub fn split_evr(evr: &str) -> (Option<u64>, Option<String>, Option<String>) {
    if evr.is_empty() {
        return (None, None, None);
    }

    let (epoch, rest) = match evr.split_once(':') {
        Some((e, rest)) => (e.parse::<u64>().ok(), rest),
        None => (None, evr),
    };

    let (version, release) = match rest.split_once('-') {
        Some((v, r)) => (v.to_string(), Some(r.to_string())),
        None => (rest.to_string(), None),
    };

    (epoch.or(Some(0)), Some(version), release)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_evr_variants() {
        assert_eq!(split_evr(""), (None, None, None));
        assert_eq!(
            split_evr("1.2.3"),
            (Some(0), Some("1.2.3".to_string()), None)
        );
        assert_eq!(
            split_evr("1.2.3-4.el9"),
            (
                Some(0),
                Some("1.2.3".to_string()),
                Some("4.el9".to_string())
            )
        );
        assert_eq!(
            split_evr("2:1.0-1"),
            (Some(2), Some("1.0".to_string()), Some("1".to_string()))
        );
    }

    #[test]
    fn primary_file_selection() {
        let f = |path: &str| FileEntry {
            path: path.to_string(),
            kind: FileKind::File,
        };

        assert!(f("/usr/bin/bash").is_primary());
        assert!(f("/usr/sbin/useradd").is_primary());
        assert!(f("/etc/passwd").is_primary());
        assert!(f("/usr/lib/sendmail").is_primary());
        assert!(!f("/usr/share/doc/README").is_primary());
    }

    #[test]
    fn filename_from_location() {
        let pkg = Package {
            location_href: "x86_64/bash-5.1-1.x86_64.rpm".to_string(),
            ..Default::default()
        };
        assert_eq!(pkg.filename(), "bash-5.1-1.x86_64.rpm");

        let flat = Package {
            location_href: "bash-5.1-1.x86_64.rpm".to_string(),
            ..Default::default()
        };
        assert_eq!(flat.filename(), "bash-5.1-1.x86_64.rpm");
    }
}
