// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reuse of metadata from previous runs.

With `--update`, records from existing repositories are loaded up front and
served to workers so unchanged packages skip header parsing. The cache is
populated on the main thread before the pool starts and is immutable from
then on, so workers read it without locking.

Entries are keyed by package basename. Loading is best-effort: a repository
that fails to parse is logged and skipped.
*/

use {
    crate::{
        compression::open_decompressed,
        error::{RepodataError, Result},
        package::Package,
        xml::{reader, repomd::RepoMd},
        REPODATA_DIR,
    },
    slog::{debug, warn, Logger},
    std::{collections::HashMap, fs::File, path::Path},
};

/// Previously computed package records, keyed by archive basename.
#[derive(Debug, Default)]
pub struct MetadataCache {
    packages: HashMap<String, Package>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Look up the record for a package basename.
    pub fn get(&self, filename: &str) -> Option<&Package> {
        self.packages.get(filename)
    }

    /// Merge the metadata found under `dir/repodata/`, if any.
    ///
    /// Later loads overwrite earlier ones, so source precedence is the call
    /// order. Failures are logged and leave the cache unchanged for that
    /// source.
    pub fn load_repodata(&mut self, dir: &Path, logger: &Logger) {
        match self.load_repodata_inner(dir) {
            Ok(count) => {
                debug!(logger, "loaded old metadata";
                       "dir" => dir.display().to_string(), "packages" => count);
            }
            Err(e) => {
                warn!(logger, "cannot load old metadata";
                      "dir" => dir.display().to_string(),
                      "error" => format!("{}", e));
            }
        }
    }

    fn load_repodata_inner(&mut self, dir: &Path) -> Result<usize> {
        let repomd_path = dir.join(REPODATA_DIR).join("repomd.xml");
        let repomd_file =
            File::open(&repomd_path).map_err(|e| RepodataError::io(&repomd_path, e))?;
        let repomd = RepoMd::from_reader(repomd_file)?;

        let open_entry = |data_type: &'static str| -> Result<Box<dyn std::io::Read>> {
            let entry = repomd
                .data_entry(data_type)
                .ok_or(RepodataError::MetadataFileNotFound(data_type))?;

            open_decompressed(&dir.join(&entry.location.href))
        };

        let mut packages = reader::parse_primary(open_entry("primary")?)?;

        // filelists and other attach by pkgid; their absence only loses
        // detail, so tolerate repositories without them.
        let mut filelists = repomd
            .data_entry("filelists")
            .map(|_| reader::parse_filelists(open_entry("filelists")?))
            .transpose()?
            .unwrap_or_default();
        let mut changelogs = repomd
            .data_entry("other")
            .map(|_| reader::parse_other(open_entry("other")?))
            .transpose()?
            .unwrap_or_default();

        let count = packages.len();

        for mut pkg in packages.drain(..) {
            if let Some(files) = filelists.remove(&pkg.pkg_id) {
                pkg.files = files;
            }
            if let Some(entries) = changelogs.remove(&pkg.pkg_id) {
                pkg.changelogs = entries;
            }

            // Last writer wins, both within one repository and across
            // sources; two packages sharing a basename collapse to one
            // entry.
            self.packages.insert(pkg.filename().to_string(), pkg);
        }

        Ok(count)
    }
}
