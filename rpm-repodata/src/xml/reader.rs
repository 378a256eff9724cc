// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parsing existing repository XML back into package records.

Only the update cache needs this direction: a previous run's
primary/filelists/other documents are read into [Package] records so
unchanged packages skip header parsing. The mirror structs below follow the
document schemas; conversion into the crate model happens in one direction
only.
*/

use {
    crate::{
        checksum::ChecksumType,
        error::Result,
        package::{ChangelogEntry, Dependency, FileEntry, FileKind, Package},
    },
    serde::Deserialize,
    std::{collections::HashMap, io::Read},
};

/// Parse a `primary.xml` document into package records.
///
/// The records carry everything primary knows; file lists are the
/// abbreviated subset and changelogs are absent until merged from the other
/// two documents.
pub fn parse_primary(reader: impl Read) -> Result<Vec<Package>> {
    let doc: PrimaryDoc = serde_xml_rs::from_reader(reader)?;

    Ok(doc.packages.into_iter().map(Package::from).collect())
}

/// Parse a `filelists.xml` document into per-package file manifests, keyed
/// by `pkgid`.
pub fn parse_filelists(reader: impl Read) -> Result<HashMap<String, Vec<FileEntry>>> {
    let doc: FilelistsDoc = serde_xml_rs::from_reader(reader)?;

    Ok(doc
        .packages
        .into_iter()
        .map(|pkg| {
            let files = pkg
                .files
                .into_iter()
                .map(|f| FileEntry {
                    kind: FileKind::from_xml_type(f.kind.as_deref()),
                    path: f.path,
                })
                .collect();

            (pkg.pkgid, files)
        })
        .collect())
}

/// Parse an `other.xml` document into per-package changelogs, keyed by
/// `pkgid`.
pub fn parse_other(reader: impl Read) -> Result<HashMap<String, Vec<ChangelogEntry>>> {
    let doc: OtherDoc = serde_xml_rs::from_reader(reader)?;

    Ok(doc
        .packages
        .into_iter()
        .map(|pkg| {
            let changelogs = pkg
                .changelogs
                .into_iter()
                .map(|c| ChangelogEntry {
                    author: c.author,
                    date: c.date,
                    text: c.text.unwrap_or_default(),
                })
                .collect();

            (pkg.pkgid, changelogs)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct PrimaryDoc {
    #[serde(rename = "package", default)]
    packages: Vec<PrimaryPackage>,
}

#[derive(Debug, Deserialize)]
struct PrimaryPackage {
    name: String,
    arch: String,
    version: EvrElement,
    checksum: ChecksumElement,
    summary: Option<String>,
    description: Option<String>,
    packager: Option<String>,
    url: Option<String>,
    time: TimeElement,
    size: SizeElement,
    location: LocationElement,
    format: Option<FormatElement>,
}

#[derive(Debug, Deserialize)]
struct EvrElement {
    epoch: u64,
    ver: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct ChecksumElement {
    #[serde(rename = "type")]
    checksum_type: String,
    #[serde(rename = "$value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct TimeElement {
    file: u64,
    build: u64,
}

#[derive(Debug, Deserialize)]
struct SizeElement {
    package: u64,
    installed: u64,
    archive: u64,
}

#[derive(Debug, Deserialize)]
struct LocationElement {
    href: String,
    base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FormatElement {
    license: Option<String>,
    vendor: Option<String>,
    group: Option<String>,
    buildhost: Option<String>,
    sourcerpm: Option<String>,
    #[serde(rename = "header-range")]
    header_range: Option<HeaderRangeElement>,
    provides: Option<EntriesElement>,
    requires: Option<EntriesElement>,
    conflicts: Option<EntriesElement>,
    obsoletes: Option<EntriesElement>,
    suggests: Option<EntriesElement>,
    enhances: Option<EntriesElement>,
    recommends: Option<EntriesElement>,
    supplements: Option<EntriesElement>,
    #[serde(rename = "file", default)]
    files: Vec<FileElement>,
}

#[derive(Debug, Deserialize)]
struct HeaderRangeElement {
    start: u64,
    end: u64,
}

#[derive(Debug, Default, Deserialize)]
struct EntriesElement {
    #[serde(rename = "entry", default)]
    entries: Vec<EntryElement>,
}

#[derive(Debug, Deserialize)]
struct EntryElement {
    name: String,
    flags: Option<String>,
    epoch: Option<u64>,
    ver: Option<String>,
    rel: Option<String>,
    pre: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileElement {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "$value")]
    path: String,
}

#[derive(Debug, Deserialize)]
struct FilelistsDoc {
    #[serde(rename = "package", default)]
    packages: Vec<FilelistsPackage>,
}

#[derive(Debug, Deserialize)]
struct FilelistsPackage {
    pkgid: String,
    #[serde(rename = "file", default)]
    files: Vec<FileElement>,
}

#[derive(Debug, Deserialize)]
struct OtherDoc {
    #[serde(rename = "package", default)]
    packages: Vec<OtherPackage>,
}

#[derive(Debug, Deserialize)]
struct OtherPackage {
    pkgid: String,
    #[serde(rename = "changelog", default)]
    changelogs: Vec<ChangelogElement>,
}

#[derive(Debug, Deserialize)]
struct ChangelogElement {
    author: String,
    date: u64,
    #[serde(rename = "$value")]
    text: Option<String>,
}

impl From<EntriesElement> for Vec<Dependency> {
    fn from(entries: EntriesElement) -> Self {
        entries
            .entries
            .into_iter()
            .map(|e| Dependency {
                name: e.name,
                flags: e.flags,
                epoch: e.epoch,
                version: e.ver,
                release: e.rel,
                pre: matches!(e.pre.as_deref(), Some("1") | Some("true")),
            })
            .collect()
    }
}

impl From<PrimaryPackage> for Package {
    fn from(pkg: PrimaryPackage) -> Self {
        let format = pkg.format.unwrap_or_default();

        let (header_start, header_end) = format
            .header_range
            .map(|r| (r.start, r.end))
            .unwrap_or((0, 0));

        let deps = |entries: Option<EntriesElement>| -> Vec<Dependency> {
            entries.unwrap_or_default().into()
        };

        Package {
            name: pkg.name,
            epoch: pkg.version.epoch,
            version: pkg.version.ver,
            release: pkg.version.rel,
            arch: pkg.arch,
            pkg_id: pkg.checksum.value,
            checksum_type: ChecksumType::from_name(&pkg.checksum.checksum_type)
                .unwrap_or_default(),
            summary: pkg.summary.unwrap_or_default(),
            description: pkg.description.unwrap_or_default(),
            packager: pkg.packager.filter(|s| !s.is_empty()),
            url: pkg.url.filter(|s| !s.is_empty()),
            time_file: pkg.time.file,
            time_build: pkg.time.build,
            size_package: pkg.size.package,
            size_installed: pkg.size.installed,
            size_archive: pkg.size.archive,
            location_href: pkg.location.href,
            location_base: pkg.location.base,
            license: format.license.filter(|s| !s.is_empty()),
            vendor: format.vendor.filter(|s| !s.is_empty()),
            group: format.group.filter(|s| !s.is_empty()),
            build_host: format.buildhost.filter(|s| !s.is_empty()),
            source_rpm: format.sourcerpm.filter(|s| !s.is_empty()),
            header_start,
            header_end,
            provides: deps(format.provides),
            requires: deps(format.requires),
            conflicts: deps(format.conflicts),
            obsoletes: deps(format.obsoletes),
            suggests: deps(format.suggests),
            enhances: deps(format.enhances),
            recommends: deps(format.recommends),
            supplements: deps(format.supplements),
            files: format
                .files
                .into_iter()
                .map(|f| FileEntry {
                    kind: FileKind::from_xml_type(f.kind.as_deref()),
                    path: f.path,
                })
                .collect(),
            changelogs: vec![],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primary_round_trip() {
        let original = crate::xml::testutil::sample_package();

        let mut doc = crate::xml::primary::header(1).into_bytes();
        doc.extend(crate::xml::primary::fragment(&original).unwrap());
        doc.extend(crate::xml::primary::FOOTER.as_bytes());

        let packages = parse_primary(&doc[..]).unwrap();
        assert_eq!(packages.len(), 1);

        let parsed = &packages[0];
        assert_eq!(parsed.name, original.name);
        assert_eq!(parsed.pkg_id, original.pkg_id);
        assert_eq!(parsed.version, original.version);
        assert_eq!(parsed.time_file, original.time_file);
        assert_eq!(parsed.location_href, original.location_href);
        assert_eq!(parsed.provides, original.provides);
        assert_eq!(parsed.requires, original.requires);
        // Only the abbreviated file list survives primary.
        assert_eq!(
            parsed.files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            vec!["/usr/bin/bash", "/etc/skel/.bashrc"]
        );
    }

    #[test]
    fn filelists_round_trip() {
        let original = crate::xml::testutil::sample_package();

        let mut doc = crate::xml::filelists::header(1).into_bytes();
        doc.extend(crate::xml::filelists::fragment(&original).unwrap());
        doc.extend(crate::xml::filelists::FOOTER.as_bytes());

        let files = parse_filelists(&doc[..]).unwrap();
        assert_eq!(files["a3f5"], original.files);
    }

    #[test]
    fn other_round_trip() {
        let original = crate::xml::testutil::sample_package();

        let mut doc = crate::xml::other::header(1).into_bytes();
        doc.extend(crate::xml::other::fragment(&original).unwrap());
        doc.extend(crate::xml::other::FOOTER.as_bytes());

        let changelogs = parse_other(&doc[..]).unwrap();
        assert_eq!(changelogs["a3f5"], original.changelogs);
    }

    #[test]
    fn empty_document_parses() {
        let doc = crate::xml::primary::header(0) + crate::xml::primary::FOOTER;
        assert!(parse_primary(doc.as_bytes()).unwrap().is_empty());
    }
}
