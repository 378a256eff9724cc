// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The parallel worker phase.

Workers pull tasks from a bounded queue and drive each one to completion:
resolve the record from the cache or a fresh parse, then fan it into the
sinks. A task that cannot be processed is logged and dropped; it never
aborts the run or other workers.

Workers only start after the document preambles are written, and the pool
returns once the queue is drained and every worker has exited.
*/

use {
    crate::{
        cache::MetadataCache,
        checksum::ChecksumType,
        parse,
        sink::SinkTrio,
        walker::PackageTask,
    },
    slog::{crit, debug, warn, Logger},
    std::{
        sync::atomic::{AtomicU64, Ordering},
        time::UNIX_EPOCH,
    },
};

/// Shared, read-only context for workers.
pub struct WorkerContext<'a> {
    pub checksum_type: ChecksumType,
    pub changelog_limit: usize,
    pub location_base: Option<&'a str>,
    /// Trust cached records without checking the file on disk.
    pub skip_stat: bool,
    pub cache: Option<&'a MetadataCache>,
}

/// Counters accumulated over the worker phase.
#[derive(Debug, Default)]
pub struct PoolStats {
    pub cache_hits: u64,
    /// Tasks that produced no output (parse or stat failure).
    pub dropped: u64,
}

/// Process every task on `workers` threads.
pub fn run(
    tasks: Vec<PackageTask>,
    workers: usize,
    sinks: &SinkTrio,
    ctx: &WorkerContext<'_>,
    logger: &Logger,
) -> PoolStats {
    let workers = workers.max(1);
    let (tx, rx) = crossbeam_channel::bounded::<PackageTask>(workers * 2);

    let cache_hits = AtomicU64::new(0);
    let dropped = AtomicU64::new(0);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let logger = logger.clone();
            let cache_hits = &cache_hits;
            let dropped = &dropped;

            scope.spawn(move || {
                for task in rx.iter() {
                    process_task(task, sinks, ctx, cache_hits, dropped, &logger);
                }
            });
        }
        drop(rx);

        for task in tasks {
            if tx.send(task).is_err() {
                break;
            }
        }
        drop(tx);
    });

    PoolStats {
        cache_hits: cache_hits.load(Ordering::Relaxed),
        dropped: dropped.load(Ordering::Relaxed),
    }
}

fn process_task(
    task: PackageTask,
    sinks: &SinkTrio,
    ctx: &WorkerContext<'_>,
    cache_hits: &AtomicU64,
    dropped: &AtomicU64,
    logger: &Logger,
) {
    // Validation needs the stat result either way, so take it before the
    // cache lookup; an unreadable file is dropped outright.
    let mut stat = None;
    if ctx.cache.is_some() && !ctx.skip_stat {
        match std::fs::metadata(&task.full_path) {
            Ok(metadata) => stat = Some(metadata),
            Err(e) => {
                crit!(logger, "stat failed";
                      "path" => task.full_path.display().to_string(),
                      "error" => format!("{}", e));
                dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }

    if let Some(record) = ctx.cache.and_then(|cache| cache.get(&task.filename)) {
        let usable = match (&stat, ctx.skip_stat) {
            (_, true) => true,
            (Some(metadata), false) => {
                mtime_seconds(metadata) == record.time_file
                    && metadata.len() == record.size_package
                    && ctx.checksum_type == record.checksum_type
            }
            (None, false) => false,
        };

        if usable {
            debug!(logger, "cache hit"; "package" => task.filename.clone());

            // Everything but the location fields is reused verbatim.
            let mut pkg = record.clone();
            pkg.location_href = task.rel_path;
            pkg.location_base = ctx.location_base.map(|s| s.to_string());

            sinks.write(&pkg);
            cache_hits.fetch_add(1, Ordering::Relaxed);
            return;
        }

        debug!(logger, "cached metadata obsolete, regenerating";
               "package" => task.filename.clone());
    }

    match parse::package_from_file(
        &task.full_path,
        ctx.checksum_type,
        &task.rel_path,
        ctx.location_base,
        ctx.changelog_limit,
    ) {
        Ok(pkg) => sinks.write(&pkg),
        Err(e) => {
            warn!(logger, "cannot read package";
                  "path" => task.full_path.display().to_string(),
                  "error" => format!("{}", e));
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn mtime_seconds(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
