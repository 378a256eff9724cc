// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Run orchestration.

[RepodataBuilder] owns the lifecycle of one metadata build: staging
directory creation (which doubles as the cross-process lock), the optional
update cache, sink setup, the walk, the worker pool, and finalization.
*/

use {
    crate::{
        cache::MetadataCache,
        checksum::ChecksumType,
        compression::Compression,
        error::{RepodataError, Result},
        finalize::{self, FinalizeContext},
        guard,
        pool::{self, WorkerContext},
        sink::{SinkDatabasePaths, SinkPaths, SinkTrio},
        walker::{self, WalkOptions},
        STAGING_DIR,
    },
    slog::{debug, info, Logger},
    std::path::{Path, PathBuf},
};

const DEFAULT_WORKERS: usize = 5;
const DEFAULT_CHANGELOG_LIMIT: usize = 10;

/// What a completed run did.
#[derive(Debug)]
pub struct RunSummary {
    /// Number of tasks handed to the pool, and the count declared in the
    /// document preambles.
    pub package_count: usize,
    pub cache_hits: u64,
    /// Tasks that failed to parse or stat and are absent from the output.
    pub dropped: u64,
}

/// Configures and executes one repository metadata build.
pub struct RepodataBuilder {
    input_dir: PathBuf,
    output_dir: Option<PathBuf>,
    workers: usize,
    changelog_limit: usize,
    checksum_type: ChecksumType,
    unique_md_filenames: bool,
    database: bool,
    groupfile: Option<PathBuf>,
    compression: Option<Compression>,
    force_xz: bool,
    update: bool,
    update_md_paths: Vec<PathBuf>,
    skip_stat: bool,
    skip_symlinks: bool,
    pkglist: Option<PathBuf>,
    excludes: Vec<String>,
    location_base: Option<String>,
}

impl RepodataBuilder {
    /// Create a builder for the given input directory.
    pub fn new(input_dir: &Path) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
            output_dir: None,
            workers: DEFAULT_WORKERS,
            changelog_limit: DEFAULT_CHANGELOG_LIMIT,
            checksum_type: ChecksumType::default(),
            unique_md_filenames: false,
            database: true,
            groupfile: None,
            compression: None,
            force_xz: false,
            update: false,
            update_md_paths: vec![],
            skip_stat: false,
            skip_symlinks: false,
            pkglist: None,
            excludes: vec![],
            location_base: None,
        }
    }

    /// Write metadata under a directory other than the input directory.
    pub fn output_dir(mut self, dir: &Path) -> Self {
        self.output_dir = Some(dir.to_path_buf());
        self
    }

    /// Number of worker threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Maximum changelog entries retained per package.
    pub fn changelog_limit(mut self, limit: usize) -> Self {
        self.changelog_limit = limit;
        self
    }

    pub fn checksum_type(mut self, checksum_type: ChecksumType) -> Self {
        self.checksum_type = checksum_type;
        self
    }

    /// Prefix published filenames with their checksum.
    pub fn unique_md_filenames(mut self, enabled: bool) -> Self {
        self.unique_md_filenames = enabled;
        self
    }

    /// Whether to produce the SQLite databases.
    pub fn database(mut self, enabled: bool) -> Self {
        self.database = enabled;
        self
    }

    /// Ship a package-group file alongside the metadata.
    pub fn groupfile(mut self, path: &Path) -> Self {
        self.groupfile = Some(path.to_path_buf());
        self
    }

    /// Compression for the databases and the group file copy.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Force xz compression, overriding [Self::compression].
    pub fn force_xz(mut self, enabled: bool) -> Self {
        self.force_xz = enabled;
        self
    }

    /// Reuse metadata from previous runs where packages are unchanged.
    pub fn update(mut self, enabled: bool) -> Self {
        self.update = enabled;
        self
    }

    /// Additional repository to load cached metadata from.
    pub fn update_md_path(mut self, path: &Path) -> Self {
        self.update_md_paths.push(path.to_path_buf());
        self
    }

    /// Trust cached records without stat-validating the file on disk.
    pub fn skip_stat(mut self, enabled: bool) -> Self {
        self.skip_stat = enabled;
        self
    }

    pub fn skip_symlinks(mut self, enabled: bool) -> Self {
        self.skip_symlinks = enabled;
        self
    }

    /// Index only the packages listed in this file, one relative path per
    /// line.
    pub fn pkglist(mut self, path: &Path) -> Self {
        self.pkglist = Some(path.to_path_buf());
        self
    }

    /// Exclude packages whose repository-relative path matches this glob.
    pub fn exclude(mut self, pattern: &str) -> Self {
        self.excludes.push(pattern.to_string());
        self
    }

    /// Base URL recorded in package locations.
    pub fn location_base(mut self, base: &str) -> Self {
        self.location_base = Some(base.to_string());
        self
    }

    /// Execute the build.
    pub fn run(&self, logger: &Logger) -> Result<RunSummary> {
        if !self.input_dir.is_dir() {
            return Err(RepodataError::InputDirectory(self.input_dir.clone()));
        }

        let out_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.clone());
        let staging = out_dir.join(STAGING_DIR);

        // Creating the staging directory is the cross-process lock: if it
        // already exists another indexer owns this repository.
        if let Err(e) = std::fs::create_dir(&staging) {
            return Err(if e.kind() == std::io::ErrorKind::AlreadyExists {
                RepodataError::StagingConflict(staging)
            } else {
                RepodataError::io(&staging, e)
            });
        }
        info!(logger, "temporary output repo path";
              "dir" => staging.display().to_string());

        guard::install(logger)?;
        guard::arm(&staging);

        let result = self.run_staged(&out_dir, &staging, logger);

        if result.is_err() {
            // Keep the staging directory for postmortem, but drop the guard
            // so a later interrupt of this process cannot remove evidence.
            guard::disarm();
        }

        result
    }

    fn run_staged(
        &self,
        out_dir: &Path,
        staging: &Path,
        logger: &Logger,
    ) -> Result<RunSummary> {
        let groupfile_name = match &self.groupfile {
            Some(source) => {
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| RepodataError::InputDirectory(source.clone()))?;

                let dest = staging.join(&name);
                debug!(logger, "copying group file";
                       "from" => source.display().to_string(),
                       "to" => dest.display().to_string());
                std::fs::copy(source, &dest).map_err(|e| RepodataError::io(source, e))?;

                Some(name)
            }
            None => None,
        };

        let cache = if self.update {
            let mut cache = MetadataCache::new();

            // The output repository is read only when one is explicitly
            // configured; the input repository is read second and takes
            // precedence on basename collisions.
            if self.output_dir.is_some() {
                cache.load_repodata(out_dir, logger);
            }
            cache.load_repodata(&self.input_dir, logger);
            for path in &self.update_md_paths {
                info!(logger, "loading metadata";
                      "dir" => path.display().to_string());
                cache.load_repodata(path, logger);
            }

            info!(logger, "loaded old metadata"; "packages" => cache.len());
            Some(cache)
        } else {
            None
        };

        let (sqlite_compression, groupfile_compression) = self.compression_plan();

        let db_paths = (
            staging.join("primary.sqlite"),
            staging.join("filelists.sqlite"),
            staging.join("other.sqlite"),
        );
        let xml_paths = (
            staging.join("primary.xml.gz"),
            staging.join("filelists.xml.gz"),
            staging.join("other.xml.gz"),
        );

        let sinks = SinkTrio::open(
            &SinkPaths {
                primary_xml: &xml_paths.0,
                filelists_xml: &xml_paths.1,
                other_xml: &xml_paths.2,
                databases: self.database.then_some(SinkDatabasePaths {
                    primary: &db_paths.0,
                    filelists: &db_paths.1,
                    other: &db_paths.2,
                }),
            },
            logger,
        )?;

        let walk_options = WalkOptions {
            skip_symlinks: self.skip_symlinks,
            excludes: self
                .excludes
                .iter()
                .map(|p| glob::Pattern::new(p))
                .collect::<std::result::Result<_, _>>()?,
        };

        info!(logger, "directory walk started");
        let tasks = match &self.pkglist {
            Some(pkglist) => {
                let content = std::fs::read_to_string(pkglist)
                    .map_err(|e| RepodataError::io(pkglist, e))?;
                let paths = content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>();

                walker::tasks_from_list(&self.input_dir, paths, &walk_options, logger)
            }
            None => walker::walk_tree(&self.input_dir, &walk_options, logger)?,
        };
        let package_count = tasks.len();
        info!(logger, "directory walk done"; "packages" => package_count);

        sinks.write_preambles(package_count)?;

        info!(logger, "pool started"; "workers" => self.workers);
        let stats = pool::run(
            tasks,
            self.workers,
            &sinks,
            &WorkerContext {
                checksum_type: self.checksum_type,
                changelog_limit: self.changelog_limit,
                location_base: self.location_base.as_deref(),
                skip_stat: self.skip_stat,
                cache: cache.as_ref(),
            },
            logger,
        );
        info!(logger, "pool finished";
              "cache_hits" => stats.cache_hits, "dropped" => stats.dropped);

        sinks.close()?;

        if stats.dropped > 0 {
            // The preambles were written before workers ran, so the
            // declared package count now over-counts by the dropped tasks.
            info!(logger, "package count over-counts dropped packages";
                  "declared" => package_count, "dropped" => stats.dropped);
        }

        finalize::finalize(
            &FinalizeContext {
                out_dir,
                staging,
                checksum_type: self.checksum_type,
                unique_md_filenames: self.unique_md_filenames,
                database: self.database,
                sqlite_compression,
                groupfile: groupfile_name.as_deref(),
                groupfile_compression,
            },
            logger,
        )?;

        Ok(RunSummary {
            package_count,
            cache_hits: stats.cache_hits,
            dropped: stats.dropped,
        })
    }

    fn compression_plan(&self) -> (Compression, Compression) {
        if self.force_xz {
            return (Compression::Xz, Compression::Xz);
        }

        match self.compression {
            Some(compression) => (compression, compression),
            None => (Compression::Bzip2, Compression::Gzip),
        }
    }
}
