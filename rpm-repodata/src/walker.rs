// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Enumeration of candidate package files.

Either walks the input tree breadth-first with an explicit directory queue,
or takes the operator's package list verbatim. Both modes apply the exclude
globs; only the walk applies the suffix and symlink rules. The walk
completes before any worker runs because the document preambles need the
total count.
*/

use {
    crate::error::Result,
    slog::{debug, warn, Logger},
    std::{
        collections::VecDeque,
        path::{Path, PathBuf},
    },
};

const PACKAGE_SUFFIX: &str = ".rpm";

/// One package file to be processed by a worker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageTask {
    /// Absolute path of the package file.
    pub full_path: PathBuf,
    /// Basename, the cache key.
    pub filename: String,
    /// Path relative to the input root; becomes `location_href`.
    pub rel_path: String,
}

/// Filtering options for task discovery.
#[derive(Debug, Default)]
pub struct WalkOptions {
    pub skip_symlinks: bool,
    pub excludes: Vec<glob::Pattern>,
}

impl WalkOptions {
    fn allowed(&self, rel_path: &str, logger: &Logger) -> bool {
        for pattern in &self.excludes {
            if pattern.matches(rel_path) {
                debug!(logger, "exclude pattern hit"; "path" => rel_path.to_string());
                return false;
            }
        }
        true
    }
}

/// Discover package files by walking `input_dir` breadth-first.
pub fn walk_tree(
    input_dir: &Path,
    options: &WalkOptions,
    logger: &Logger,
) -> Result<Vec<PackageTask>> {
    let mut tasks = Vec::new();
    let mut dirs = VecDeque::new();
    dirs.push_back(input_dir.to_path_buf());

    while let Some(dir) = dirs.pop_front() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(logger, "cannot open directory";
                      "dir" => dir.display().to_string(), "error" => format!("{}", e));
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(logger, "cannot read directory entry";
                          "dir" => dir.display().to_string(), "error" => format!("{}", e));
                    continue;
                }
            };

            let full_path = entry.path();
            let filename = entry.file_name().to_string_lossy().into_owned();

            if !filename.ends_with(PACKAGE_SUFFIX) {
                if full_path.is_dir() && !full_path.is_symlink() {
                    dirs.push_back(full_path);
                }
                continue;
            }

            if options.skip_symlinks && full_path.is_symlink() {
                debug!(logger, "skipped symlink"; "path" => full_path.display().to_string());
                continue;
            }

            let rel_path = relative_path(&full_path, input_dir);
            if !options.allowed(&rel_path, logger) {
                continue;
            }

            debug!(logger, "adding package"; "path" => full_path.display().to_string());
            tasks.push(PackageTask {
                full_path,
                filename,
                rel_path,
            });
        }
    }

    Ok(tasks)
}

/// Build tasks from an explicit list of repository-relative paths.
///
/// No filesystem traversal happens here; the paths must exist by the time a
/// worker opens them. Exclude patterns are matched against the basename, as
/// the walk-free mode always has.
pub fn tasks_from_list(
    input_dir: &Path,
    relative_paths: impl IntoIterator<Item = String>,
    options: &WalkOptions,
    logger: &Logger,
) -> Vec<PackageTask> {
    relative_paths
        .into_iter()
        .filter_map(|rel_path| {
            let filename = rel_path
                .rsplit('/')
                .next()
                .unwrap_or(rel_path.as_str())
                .to_string();

            if !options.allowed(&filename, logger) {
                return None;
            }

            debug!(logger, "adding package"; "path" => rel_path.clone());
            Some(PackageTask {
                full_path: input_dir.join(&rel_path),
                filename,
                rel_path,
            })
        })
        .collect()
}

fn relative_path(full_path: &Path, root: &Path) -> String {
    full_path
        .strip_prefix(root)
        .unwrap_or(full_path)
        .to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}

#[cfg(test)]
mod test {
    use super::*;

    fn discard_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn walk_finds_packages_breadth_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a-1.rpm"));
        std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        touch(&dir.path().join("sub/b-1.rpm"));
        touch(&dir.path().join("sub/deeper/c-1.rpm"));
        touch(&dir.path().join("sub/notes.txt"));

        let tasks = walk_tree(dir.path(), &WalkOptions::default(), &discard_logger()).unwrap();

        let mut rel: Vec<_> = tasks.iter().map(|t| t.rel_path.as_str()).collect();
        rel.sort_unstable();
        assert_eq!(rel, vec!["a-1.rpm", "sub/b-1.rpm", "sub/deeper/c-1.rpm"]);

        let a = tasks.iter().find(|t| t.filename == "a-1.rpm").unwrap();
        assert_eq!(a.full_path, dir.path().join("a-1.rpm"));
    }

    #[test]
    fn exclude_patterns_match_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("app-1.rpm"));
        touch(&dir.path().join("app-debug-1.rpm"));

        let options = WalkOptions {
            excludes: vec![glob::Pattern::new("*-debug-*.rpm").unwrap()],
            ..Default::default()
        };

        let tasks = walk_tree(dir.path(), &options, &discard_logger()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].filename, "app-1.rpm");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_skipped_on_request() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("real-1.rpm"));
        std::os::unix::fs::symlink(
            dir.path().join("real-1.rpm"),
            dir.path().join("link-1.rpm"),
        )
        .unwrap();

        let all = walk_tree(dir.path(), &WalkOptions::default(), &discard_logger()).unwrap();
        assert_eq!(all.len(), 2);

        let options = WalkOptions {
            skip_symlinks: true,
            ..Default::default()
        };
        let real_only = walk_tree(dir.path(), &options, &discard_logger()).unwrap();
        assert_eq!(real_only.len(), 1);
        assert_eq!(real_only[0].filename, "real-1.rpm");
    }

    #[test]
    fn list_mode_trusts_the_list() {
        let dir = tempfile::tempdir().unwrap();

        let tasks = tasks_from_list(
            dir.path(),
            ["packages/x86_64/a-1.rpm".to_string(), "b-1.rpm".to_string()],
            &WalkOptions::default(),
            &discard_logger(),
        );

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].filename, "a-1.rpm");
        assert_eq!(tasks[0].rel_path, "packages/x86_64/a-1.rpm");
        assert_eq!(tasks[0].full_path, dir.path().join("packages/x86_64/a-1.rpm"));
    }

    #[test]
    fn list_mode_applies_excludes_to_basenames() {
        let dir = tempfile::tempdir().unwrap();

        let options = WalkOptions {
            excludes: vec![glob::Pattern::new("b-*.rpm").unwrap()],
            ..Default::default()
        };

        let tasks = tasks_from_list(
            dir.path(),
            ["sub/a-1.rpm".to_string(), "sub/b-1.rpm".to_string()],
            &options,
            &discard_logger(),
        );

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].filename, "a-1.rpm");
    }
}
