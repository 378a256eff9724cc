// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    rpm_repodata::{
        builder::RepodataBuilder,
        checksum::ChecksumType,
        compression::{open_decompressed, Compression},
        package::{ChangelogEntry, Dependency, FileEntry, FileKind, Package},
        xml::{self, repomd::RepoMd, repomd::RepomdRecord},
        RepodataError, REPODATA_DIR, STAGING_DIR,
    },
    std::{
        collections::BTreeSet,
        fs::File,
        io::{Read, Write},
        path::Path,
    },
};

fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn read_decompressed(path: &Path) -> String {
    let mut out = String::new();
    open_decompressed(path)
        .unwrap()
        .read_to_string(&mut out)
        .unwrap();
    out
}

fn sample_package() -> Package {
    Package {
        name: "bash".to_string(),
        epoch: 0,
        version: "5.1.8".to_string(),
        release: "2.el9".to_string(),
        arch: "x86_64".to_string(),
        pkg_id: "deadbeef".to_string(),
        checksum_type: ChecksumType::Sha256,
        summary: "The GNU Bourne Again shell".to_string(),
        description: "Bash is the shell".to_string(),
        time_file: 1_650_000_000,
        time_build: 1_640_000_000,
        size_package: 17,
        size_installed: 4567,
        size_archive: 2345,
        location_href: "bash-5.1.8-2.el9.x86_64.rpm".to_string(),
        provides: vec![Dependency {
            name: "bash".to_string(),
            flags: Some("EQ".to_string()),
            epoch: Some(0),
            version: Some("5.1.8".to_string()),
            release: Some("2.el9".to_string()),
            pre: false,
        }],
        files: vec![FileEntry {
            path: "/usr/bin/bash".to_string(),
            kind: FileKind::File,
        }],
        changelogs: vec![ChangelogEntry {
            author: "A Maintainer <am@example.com>".to_string(),
            date: 1_639_000_000,
            text: "- rebuild".to_string(),
        }],
        ..Default::default()
    }
}

/// Lay down a repository as a previous run would have left it, good enough
/// for the update cache to load.
fn write_existing_repodata(dir: &Path, pkg: &Package) {
    let repodata = dir.join(REPODATA_DIR);
    std::fs::create_dir_all(&repodata).unwrap();

    let write_gz = |name: &str, header: String, fragment: Vec<u8>, footer: &str| {
        let mut doc = header.into_bytes();
        doc.extend(fragment);
        doc.extend(footer.as_bytes());

        let file = File::create(repodata.join(name)).unwrap();
        let mut writer = Compression::Gzip.writer(file);
        writer.write_all(&doc).unwrap();
        writer.finish().unwrap();
    };

    write_gz(
        "primary.xml.gz",
        xml::primary::header(1),
        xml::primary::fragment(pkg).unwrap(),
        xml::primary::FOOTER,
    );
    write_gz(
        "filelists.xml.gz",
        xml::filelists::header(1),
        xml::filelists::fragment(pkg).unwrap(),
        xml::filelists::FOOTER,
    );
    write_gz(
        "other.xml.gz",
        xml::other::header(1),
        xml::other::fragment(pkg).unwrap(),
        xml::other::FOOTER,
    );

    let record = |data_type: &str, name: &str| RepomdRecord {
        data_type: data_type.to_string(),
        location_href: format!("{}/{}", REPODATA_DIR, name),
        checksum_type: ChecksumType::Sha256,
        checksum: "00".to_string(),
        open_checksum: None,
        timestamp: 0,
        size: 0,
        open_size: None,
        database_version: None,
    };

    let repomd = File::create(repodata.join("repomd.xml")).unwrap();
    xml::repomd::write_repomd(
        repomd,
        0,
        &[
            record("primary", "primary.xml.gz"),
            record("filelists", "filelists.xml.gz"),
            record("other", "other.xml.gz"),
        ],
    )
    .unwrap();
}

#[test]
fn empty_tree_produces_complete_repository() {
    let dir = tempfile::tempdir().unwrap();

    let summary = RepodataBuilder::new(dir.path())
        .workers(2)
        .run(&discard_logger())
        .unwrap();

    assert_eq!(summary.package_count, 0);
    assert_eq!(summary.dropped, 0);

    let repodata = dir.path().join(REPODATA_DIR);
    assert!(repodata.join("repomd.xml").exists());
    assert!(!dir.path().join(STAGING_DIR).exists());

    for name in ["primary.xml.gz", "filelists.xml.gz", "other.xml.gz"] {
        let doc = read_decompressed(&repodata.join(name));
        assert!(doc.contains("packages=\"0\""), "{} lacks count", name);
    }

    // The databases default to bzip2 and the uncompressed copies are gone.
    assert!(repodata.join("primary.sqlite.bz2").exists());
    assert!(!repodata.join("primary.sqlite").exists());

    // repomd.xml references exactly the artifacts present next to it.
    let repomd = RepoMd::from_reader(File::open(repodata.join("repomd.xml")).unwrap()).unwrap();
    assert_eq!(repomd.data.len(), 6);

    let referenced: BTreeSet<String> = repomd
        .data
        .iter()
        .map(|d| d.location.href.trim_start_matches("repodata/").to_string())
        .collect();
    let mut present: BTreeSet<String> = std::fs::read_dir(&repodata)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    present.remove("repomd.xml");
    assert_eq!(referenced, present);
}

#[test]
fn staging_conflict_refuses_to_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(STAGING_DIR)).unwrap();
    std::fs::write(dir.path().join(STAGING_DIR).join("marker"), b"x").unwrap();

    let err = RepodataBuilder::new(dir.path())
        .run(&discard_logger())
        .unwrap_err();

    assert!(matches!(err, RepodataError::StagingConflict(_)));
    // Neither the marker nor the directory layout was touched.
    assert!(dir.path().join(STAGING_DIR).join("marker").exists());
    assert!(!dir.path().join(REPODATA_DIR).exists());
}

#[test]
fn missing_input_directory_fails() {
    let err = RepodataBuilder::new(Path::new("/nonexistent/repository"))
        .run(&discard_logger())
        .unwrap_err();

    assert!(matches!(err, RepodataError::InputDirectory(_)));
}

#[test]
fn update_with_skip_stat_reuses_cache_without_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let pkg = sample_package();
    write_existing_repodata(dir.path(), &pkg);

    // The file content is not a valid package; a cache miss would be forced
    // to parse it and drop the task, so a hit is observable.
    std::fs::write(dir.path().join("bash-5.1.8-2.el9.x86_64.rpm"), b"not an rpm").unwrap();

    let summary = RepodataBuilder::new(dir.path())
        .update(true)
        .skip_stat(true)
        .database(false)
        .run(&discard_logger())
        .unwrap();

    assert_eq!(summary.package_count, 1);
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.dropped, 0);

    let primary = read_decompressed(&dir.path().join(REPODATA_DIR).join("primary.xml.gz"));
    let records = xml::reader::parse_primary(primary.as_bytes()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pkg_id, pkg.pkg_id);
    assert_eq!(records[0].summary, pkg.summary);
    assert_eq!(records[0].location_href, "bash-5.1.8-2.el9.x86_64.rpm");
}

#[test]
fn update_without_skip_stat_detects_changed_files() {
    let dir = tempfile::tempdir().unwrap();
    let pkg = sample_package();
    write_existing_repodata(dir.path(), &pkg);

    // Same basename, but size and mtime cannot both match the cached
    // fingerprint, so the record is re-parsed and, being garbage, dropped.
    std::fs::write(
        dir.path().join("bash-5.1.8-2.el9.x86_64.rpm"),
        b"definitely not an rpm package",
    )
    .unwrap();

    let summary = RepodataBuilder::new(dir.path())
        .update(true)
        .database(false)
        .run(&discard_logger())
        .unwrap();

    assert_eq!(summary.package_count, 1);
    assert_eq!(summary.cache_hits, 0);
    assert_eq!(summary.dropped, 1);

    // The preamble was written before workers ran, so the declared count
    // keeps counting the dropped package.
    let primary = read_decompressed(&dir.path().join(REPODATA_DIR).join("primary.xml.gz"));
    assert!(primary.contains("packages=\"1\""));
    assert!(xml::reader::parse_primary(primary.as_bytes())
        .unwrap()
        .is_empty());
}

#[test]
fn unparsable_packages_are_dropped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("junk-1.rpm"), b"junk").unwrap();
    std::fs::write(dir.path().join("trash-2.rpm"), b"trash").unwrap();

    let summary = RepodataBuilder::new(dir.path())
        .database(false)
        .run(&discard_logger())
        .unwrap();

    assert_eq!(summary.package_count, 2);
    assert_eq!(summary.dropped, 2);
    assert!(dir.path().join(REPODATA_DIR).join("repomd.xml").exists());
}

#[test]
fn groupfile_and_unique_filenames() {
    let dir = tempfile::tempdir().unwrap();
    let groupfile = dir.path().join("comps.xml");
    std::fs::write(&groupfile, b"<comps/>").unwrap();

    let input = dir.path().join("repo");
    std::fs::create_dir(&input).unwrap();

    RepodataBuilder::new(&input)
        .groupfile(&groupfile)
        .unique_md_filenames(true)
        .run(&discard_logger())
        .unwrap();

    let repodata = input.join(REPODATA_DIR);
    let repomd = RepoMd::from_reader(File::open(repodata.join("repomd.xml")).unwrap()).unwrap();

    // 3 xml + 3 db + group + compressed group.
    assert_eq!(repomd.data.len(), 8);

    let group = repomd.data_entry("group").unwrap();
    assert!(group.location.href.ends_with("-comps.xml"));
    let group_gz = repomd.data_entry("group_gz").unwrap();
    assert!(group_gz.location.href.ends_with("-comps.xml.gz"));

    for entry in &repomd.data {
        let path = input.join(&entry.location.href);
        assert!(path.exists(), "missing {}", entry.location.href);

        // Checksum-prefixed basenames start with the recorded digest.
        let basename = path.file_name().unwrap().to_string_lossy().into_owned();
        let checksum = &entry.checksum.as_ref().unwrap().value;
        assert!(basename.starts_with(checksum.as_str()));
    }
}

#[test]
fn separate_output_directory_leaves_input_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("packages");
    let output = dir.path().join("published");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(&output).unwrap();

    RepodataBuilder::new(&input)
        .output_dir(&output)
        .database(false)
        .run(&discard_logger())
        .unwrap();

    assert!(output.join(REPODATA_DIR).join("repomd.xml").exists());
    assert!(!input.join(REPODATA_DIR).exists());
}
