// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Publication of the staged metadata.

Runs once, after the pool has drained and the sinks are closed. The staging
directory is renamed over `repodata/` in a single atomic step, and only
then are artifact checksums computed, so every digest in `repomd.xml`
describes the bytes consumers will actually fetch. The SQLite databases get
the matching XML checksum written into their `db_info` row before they are
compressed, coupling the two views of the same data.
*/

use {
    crate::{
        checksum::ChecksumType,
        compression::{compress_file, open_decompressed, Compression},
        error::{RepodataError, Result},
        guard, sqlite,
        xml::repomd::{write_repomd, RepomdRecord, DATABASE_VERSION},
        REPODATA_DIR,
    },
    slog::{debug, Logger},
    std::{
        fs::File,
        io::{BufReader, Read},
        path::Path,
        time::UNIX_EPOCH,
    },
};

/// Everything the finalizer needs to publish a run.
pub struct FinalizeContext<'a> {
    /// Repository root the metadata belongs to.
    pub out_dir: &'a Path,
    /// `out_dir/.repodata`, holding the staged artifacts.
    pub staging: &'a Path,
    pub checksum_type: ChecksumType,
    pub unique_md_filenames: bool,
    /// Whether SQLite databases were produced.
    pub database: bool,
    pub sqlite_compression: Compression,
    /// Basename of the group file copied into staging, if any.
    pub groupfile: Option<&'a str>,
    pub groupfile_compression: Compression,
}

/// Publish the staging directory and write `repomd.xml`.
pub fn finalize(ctx: &FinalizeContext<'_>, logger: &Logger) -> Result<()> {
    let out_repo = ctx.out_dir.join(REPODATA_DIR);

    // Step 1: preserve user files from the previous repodata, dropping the
    // metadata this tool manages.
    if out_repo.exists() {
        debug!(logger, "moving data aside";
               "dir" => out_repo.display().to_string());
        remove_old_metadata(&out_repo, logger)?;
        move_contents(&out_repo, ctx.staging)?;
        std::fs::remove_dir(&out_repo).map_err(|e| RepodataError::io(&out_repo, e))?;
    }

    // Step 2: the publish commit point.
    std::fs::rename(ctx.staging, &out_repo).map_err(|e| RepodataError::io(ctx.staging, e))?;
    guard::disarm();
    debug!(logger, "staging directory published";
           "dir" => out_repo.display().to_string());

    // Step 3: describe the published XML documents.
    let mut records = vec![
        artifact_record(ctx, "primary", "primary.xml.gz")?,
        artifact_record(ctx, "filelists", "filelists.xml.gz")?,
        artifact_record(ctx, "other", "other.xml.gz")?,
    ];

    // Step 4: group file and its compressed copy.
    if let Some(groupfile) = ctx.groupfile {
        records.push(artifact_record(ctx, "group", groupfile)?);

        let compressed =
            compress_file(&out_repo.join(groupfile), ctx.groupfile_compression)?;
        let compressed_name = file_name(&compressed);
        let data_type = format!(
            "group{}",
            ctx.groupfile_compression.extension().replace('.', "_")
        );
        records.push(artifact_record(ctx, &data_type, &compressed_name)?);
    }

    // Step 5: couple each database to its XML document, then compress it.
    if ctx.database {
        for (xml_type, db_type, db_name) in [
            ("primary", "primary_db", "primary.sqlite"),
            ("filelists", "filelists_db", "filelists.sqlite"),
            ("other", "other_db", "other.sqlite"),
        ] {
            let xml_checksum = records
                .iter()
                .find(|r| r.data_type == xml_type)
                .map(|r| r.checksum.clone())
                .ok_or(RepodataError::MetadataFileNotFound("primary"))?;

            let db_path = out_repo.join(db_name);
            sqlite::set_checksum(&db_path, &xml_checksum)?;

            let compressed = compress_file(&db_path, ctx.sqlite_compression)?;
            std::fs::remove_file(&db_path).map_err(|e| RepodataError::io(&db_path, e))?;

            let mut record = artifact_record(ctx, db_type, &file_name(&compressed))?;
            record.database_version = Some(DATABASE_VERSION);
            records.push(record);
        }
    }

    // Step 6: optionally bake checksums into filenames.
    if ctx.unique_md_filenames {
        for record in &mut records {
            rename_unique(ctx.out_dir, record)?;
        }
    }

    // Step 7: the manifest itself.
    let revision = std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let repomd_path = out_repo.join("repomd.xml");
    let repomd_file =
        File::create(&repomd_path).map_err(|e| RepodataError::io(&repomd_path, e))?;
    write_repomd(repomd_file, revision, &records)?;
    debug!(logger, "wrote repomd.xml"; "records" => records.len());

    Ok(())
}

/// Delete metadata artifacts a previous run left in `repo_dir`.
///
/// Recognizes both plain and checksum-prefixed names; anything else is left
/// for the move-aside step to preserve.
pub fn remove_old_metadata(repo_dir: &Path, logger: &Logger) -> Result<()> {
    let entries = std::fs::read_dir(repo_dir).map_err(|e| RepodataError::io(repo_dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| RepodataError::io(repo_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if is_managed_metadata(&name) {
            debug!(logger, "removing old metadata"; "file" => name.clone());
            let path = entry.path();
            std::fs::remove_file(&path).map_err(|e| RepodataError::io(&path, e))?;
        }
    }

    Ok(())
}

fn is_managed_metadata(name: &str) -> bool {
    if name == "repomd.xml" {
        return true;
    }

    const STEMS: &[&str] = &["primary", "filelists", "other"];
    const SUFFIXES: &[&str] = &[
        ".xml",
        ".xml.gz",
        ".sqlite",
        ".sqlite.gz",
        ".sqlite.bz2",
        ".sqlite.xz",
    ];

    STEMS.iter().any(|stem| {
        SUFFIXES.iter().any(|suffix| {
            let artifact = format!("{}{}", stem, suffix);
            name == artifact || name.ends_with(&format!("-{}", artifact))
        })
    })
}

fn move_contents(from: &Path, to: &Path) -> Result<()> {
    let entries = std::fs::read_dir(from).map_err(|e| RepodataError::io(from, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| RepodataError::io(from, e))?;
        let source = entry.path();
        let dest = to.join(entry.file_name());

        std::fs::rename(&source, &dest).map_err(|e| RepodataError::io(&source, e))?;
    }

    Ok(())
}

/// Compute the repomd record for a published artifact.
fn artifact_record(
    ctx: &FinalizeContext<'_>,
    data_type: &str,
    basename: &str,
) -> Result<RepomdRecord> {
    let path = ctx.out_dir.join(REPODATA_DIR).join(basename);

    let metadata = std::fs::metadata(&path).map_err(|e| RepodataError::io(&path, e))?;
    let timestamp = metadata
        .modified()
        .map_err(|e| RepodataError::io(&path, e))?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let file = File::open(&path).map_err(|e| RepodataError::io(&path, e))?;
    let (checksum, _) = digest_and_length(BufReader::new(file), ctx.checksum_type)
        .map_err(|e| RepodataError::io(&path, e))?;

    let (open_checksum, open_size) = if Compression::from_path(&path).is_some() {
        let reader = open_decompressed(&path)?;
        let (digest, length) = digest_and_length(reader, ctx.checksum_type)
            .map_err(|e| RepodataError::io(&path, e))?;
        (Some(digest), Some(length))
    } else {
        (None, None)
    };

    Ok(RepomdRecord {
        data_type: data_type.to_string(),
        location_href: format!("{}/{}", REPODATA_DIR, basename),
        checksum_type: ctx.checksum_type,
        checksum,
        open_checksum,
        timestamp,
        size: metadata.len(),
        open_size,
        database_version: None,
    })
}

/// Rename an artifact to `<checksum>-<basename>` and update its record.
fn rename_unique(out_dir: &Path, record: &mut RepomdRecord) -> Result<()> {
    let old_path = out_dir.join(&record.location_href);
    let basename = file_name(&old_path);
    let unique_name = format!("{}-{}", record.checksum, basename);

    let new_path = old_path.with_file_name(&unique_name);
    std::fs::rename(&old_path, &new_path).map_err(|e| RepodataError::io(&old_path, e))?;

    record.location_href = format!("{}/{}", REPODATA_DIR, unique_name);

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn digest_and_length(
    mut reader: impl Read,
    checksum: ChecksumType,
) -> std::io::Result<(String, u64)> {
    let mut hasher = checksum.new_hasher();
    let mut length = 0u64;
    let mut buf = [0u8; 32 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        length += n as u64;
    }

    Ok((hex::encode(hasher.finalize()), length))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn managed_metadata_names() {
        assert!(is_managed_metadata("repomd.xml"));
        assert!(is_managed_metadata("primary.xml.gz"));
        assert!(is_managed_metadata("filelists.sqlite.bz2"));
        assert!(is_managed_metadata("other.sqlite"));
        assert!(is_managed_metadata(
            "0feda3a1c4e85b1b3bc880f13b4e8c8b-primary.xml.gz"
        ));

        assert!(!is_managed_metadata("comps.xml"));
        assert!(!is_managed_metadata("updateinfo.xml.gz"));
        assert!(!is_managed_metadata("primary.xml.gz.backup"));
    }

    #[test]
    fn remove_old_metadata_keeps_user_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("primary.xml.gz"), b"x").unwrap();
        std::fs::write(dir.path().join("repomd.xml"), b"x").unwrap();
        std::fs::write(dir.path().join("comps.xml"), b"x").unwrap();

        let logger = Logger::root(slog::Discard, slog::o!());
        remove_old_metadata(dir.path(), &logger).unwrap();

        assert!(!dir.path().join("primary.xml.gz").exists());
        assert!(!dir.path().join("repomd.xml").exists());
        assert!(dir.path().join("comps.xml").exists());
    }

    #[test]
    fn unique_rename_updates_record() {
        let dir = tempfile::tempdir().unwrap();
        let repodata = dir.path().join(REPODATA_DIR);
        std::fs::create_dir(&repodata).unwrap();
        std::fs::write(repodata.join("primary.xml.gz"), b"payload").unwrap();

        let mut record = RepomdRecord {
            data_type: "primary".to_string(),
            location_href: "repodata/primary.xml.gz".to_string(),
            checksum_type: ChecksumType::Sha256,
            checksum: "cafe".to_string(),
            open_checksum: None,
            timestamp: 0,
            size: 7,
            open_size: None,
            database_version: None,
        };

        rename_unique(dir.path(), &mut record).unwrap();

        assert_eq!(record.location_href, "repodata/cafe-primary.xml.gz");
        assert!(repodata.join("cafe-primary.xml.gz").exists());
        assert!(!repodata.join("primary.xml.gz").exists());
    }
}
