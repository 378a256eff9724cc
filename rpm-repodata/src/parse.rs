// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Turning a package file into a metadata record.

The heavy lifting is delegated to the `rpm` crate, which parses the lead,
signature, and header sections. This module maps header tags into the crate
model, computes the package checksum, and applies the changelog limit.
*/

use {
    crate::{
        checksum::{digest_file, ChecksumType},
        error::{RepodataError, Result},
        package::{split_evr, ChangelogEntry, Dependency, FileEntry, FileKind, Package},
    },
    std::{
        path::Path,
        time::UNIX_EPOCH,
    },
};

/// Build a [Package] record from a package file on disk.
///
/// `location_href` and `location_base` are stored verbatim. The changelog
/// keeps only the newest `changelog_limit` entries, emitted oldest first.
pub fn package_from_file(
    path: &Path,
    checksum_type: ChecksumType,
    location_href: &str,
    location_base: Option<&str>,
    changelog_limit: usize,
) -> Result<Package> {
    let stat = std::fs::metadata(path).map_err(|e| RepodataError::io(path, e))?;
    let time_file = stat
        .modified()
        .map_err(|e| RepodataError::io(path, e))?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let pkg_id = digest_file(path, checksum_type)?;

    let package = rpm::Package::open(path).map_err(|source| RepodataError::PackageParse {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = &package.metadata;

    let offsets = metadata.get_package_segment_offsets();

    // The uncompressed payload size lives in the signature header.
    let size_archive = metadata
        .signature
        .get_entry_data_as_u32(rpm::IndexSignatureTag::RPMSIGTAG_PAYLOADSIZE)
        .map(u64::from)
        .unwrap_or(0);

    let mut changelogs = metadata
        .get_changelog_entries()
        .unwrap_or_default()
        .into_iter()
        .map(|entry| ChangelogEntry {
            author: entry.name,
            date: entry.timestamp,
            text: entry.description,
        })
        .collect::<Vec<_>>();

    // The header stores entries newest first; keep the newest N and emit
    // them in chronological order.
    changelogs.truncate(changelog_limit);
    changelogs.reverse();

    let files = metadata
        .get_file_entries()
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let kind = if entry.flags.contains(rpm::FileFlags::GHOST) {
                FileKind::Ghost
            } else if matches!(entry.mode, rpm::FileMode::Dir { .. }) {
                FileKind::Dir
            } else {
                FileKind::File
            };

            FileEntry {
                path: entry.path.to_string_lossy().into_owned(),
                kind,
            }
        })
        .collect();

    Ok(Package {
        name: opt_str(metadata.get_name()).unwrap_or_default(),
        epoch: metadata.get_epoch().map(u64::from).unwrap_or(0),
        version: opt_str(metadata.get_version()).unwrap_or_default(),
        release: opt_str(metadata.get_release()).unwrap_or_default(),
        arch: opt_str(metadata.get_arch()).unwrap_or_default(),
        pkg_id,
        checksum_type,
        summary: opt_str(metadata.get_summary()).unwrap_or_default(),
        description: opt_str(metadata.get_description()).unwrap_or_default(),
        packager: opt_str(metadata.get_packager()),
        url: opt_str(metadata.get_url()),
        time_file,
        time_build: metadata.get_build_time().unwrap_or(0),
        size_package: stat.len(),
        size_installed: metadata.get_installed_size().unwrap_or(0),
        size_archive,
        location_href: location_href.to_string(),
        location_base: location_base.map(|s| s.to_string()),
        license: opt_str(metadata.get_license()),
        vendor: opt_str(metadata.get_vendor()),
        group: opt_str(metadata.get_group()),
        build_host: opt_str(metadata.get_build_host()),
        source_rpm: opt_str(metadata.get_source_rpm()),
        header_start: offsets.header,
        header_end: offsets.payload,
        provides: dependencies(metadata.get_provides()),
        requires: dependencies(metadata.get_requires()),
        conflicts: dependencies(metadata.get_conflicts()),
        obsoletes: dependencies(metadata.get_obsoletes()),
        suggests: dependencies(metadata.get_suggests()),
        enhances: dependencies(metadata.get_enhances()),
        recommends: dependencies(metadata.get_recommends()),
        supplements: dependencies(metadata.get_supplements()),
        files,
        changelogs,
    })
}

fn opt_str<S: Into<String>>(value: std::result::Result<S, rpm::Error>) -> Option<String> {
    value.ok().map(Into::into).filter(|s: &String| !s.is_empty())
}

fn dependencies(deps: std::result::Result<Vec<rpm::Dependency>, rpm::Error>) -> Vec<Dependency> {
    deps.unwrap_or_default()
        .into_iter()
        // Internal rpmlib() capabilities are not expressed in repository
        // metadata.
        .filter(|dep| !dep.name.starts_with("rpmlib("))
        .map(|dep| {
            let (epoch, version, release) = split_evr(&dep.version);

            Dependency {
                pre: dep.flags.intersects(
                    rpm::DependencyFlags::PREREQ
                        | rpm::DependencyFlags::SCRIPT_PRE
                        | rpm::DependencyFlags::SCRIPT_POST,
                ),
                flags: comparison_flags(dep.flags),
                name: dep.name,
                epoch,
                version,
                release,
            }
        })
        .collect()
}

fn comparison_flags(flags: rpm::DependencyFlags) -> Option<String> {
    let less = flags.contains(rpm::DependencyFlags::LESS);
    let greater = flags.contains(rpm::DependencyFlags::GREATER);
    let equal = flags.contains(rpm::DependencyFlags::EQUAL);

    match (less, greater, equal) {
        (true, false, false) => Some("LT".to_string()),
        (true, false, true) => Some("LE".to_string()),
        (false, true, false) => Some("GT".to_string()),
        (false, true, true) => Some("GE".to_string()),
        (false, false, true) => Some("EQ".to_string()),
        _ => None,
    }
}
