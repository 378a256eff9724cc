// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::{Context, Result},
    clap::{Arg, ArgMatches, Command},
    rpm_repodata::{
        builder::RepodataBuilder, checksum::ChecksumType, compression::Compression,
    },
    slog::{info, o, Drain},
    std::path::Path,
};

const ABOUT: &str = "\
Generate RPM repository metadata.

`mkrepodata` indexes a directory tree of .rpm packages and writes the
`repodata/` metadata set package managers consume: primary, filelists, and
other XML documents, matching SQLite databases, and the repomd.xml manifest
describing them all.

Metadata is built in a hidden `.repodata/` staging directory and published
atomically, so consumers never observe a half-written repository. A stale
`.repodata/` from a crashed run must be removed before a new run can start.
";

fn app() -> Command<'static> {
    Command::new("mkrepodata")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Generate RPM repository metadata")
        .long_about(ABOUT)
        .arg(
            Arg::new("directory")
                .required(true)
                .value_name("DIRECTORY")
                .help("Directory tree of packages to index"),
        )
        .arg(
            Arg::new("outputdir")
                .long("outputdir")
                .short('o')
                .takes_value(true)
                .value_name("DIR")
                .help("Write metadata under this directory instead of the input directory"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .takes_value(true)
                .value_name("N")
                .help("Number of worker threads [default: number of CPUs]"),
        )
        .arg(
            Arg::new("changelog_limit")
                .long("changelog-limit")
                .takes_value(true)
                .value_name("K")
                .help("Keep only the newest K changelog entries per package"),
        )
        .arg(
            Arg::new("checksum")
                .long("checksum")
                .short('s')
                .takes_value(true)
                .possible_values(["md5", "sha1", "sha256", "sha512"])
                .default_value("sha256")
                .help("Checksum algorithm for packages and artifacts"),
        )
        .arg(
            Arg::new("unique_md_filenames")
                .long("unique-md-filenames")
                .help("Prefix metadata filenames with their checksum"),
        )
        .arg(
            Arg::new("no_database")
                .long("no-database")
                .help("Do not generate SQLite databases"),
        )
        .arg(
            Arg::new("groupfile")
                .long("groupfile")
                .short('g')
                .takes_value(true)
                .value_name("PATH")
                .help("Package group file to ship with the metadata"),
        )
        .arg(
            Arg::new("compression")
                .long("compression")
                .takes_value(true)
                .possible_values(["gz", "bz2", "xz"])
                .help("Compression for databases and the group file copy"),
        )
        .arg(
            Arg::new("xz")
                .long("xz")
                .help("Use xz compression (alias for --compression xz)"),
        )
        .arg(
            Arg::new("update")
                .long("update")
                .help("Reuse metadata from a previous run for unchanged packages"),
        )
        .arg(
            Arg::new("update_md_path")
                .long("update-md-path")
                .takes_value(true)
                .multiple_occurrences(true)
                .value_name("DIR")
                .help("Additional repository to load cached metadata from"),
        )
        .arg(
            Arg::new("skip_stat")
                .long("skip-stat")
                .help("Trust cached metadata without checking files on disk"),
        )
        .arg(
            Arg::new("skip_symlinks")
                .long("skip-symlinks")
                .help("Ignore symlinked packages"),
        )
        .arg(
            Arg::new("pkglist")
                .long("pkglist")
                .takes_value(true)
                .value_name("FILE")
                .help("Index only the packages listed in FILE, one relative path per line"),
        )
        .arg(
            Arg::new("excludes")
                .long("excludes")
                .short('x')
                .takes_value(true)
                .multiple_occurrences(true)
                .value_name("GLOB")
                .help("Exclude packages matching this glob (repeatable)"),
        )
        .arg(
            Arg::new("location_base")
                .long("location-base")
                .takes_value(true)
                .value_name("URL")
                .help("Base URL recorded in package locations"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .conflicts_with("quiet")
                .help("Log debug detail"),
        )
}

fn get_logger(quiet: bool, verbose: bool) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();

    let level = if quiet {
        slog::Level::Error
    } else if verbose {
        slog::Level::Debug
    } else {
        slog::Level::Info
    };
    let drain = slog::LevelFilter::new(drain, level).fuse();

    slog::Logger::root(drain, o!())
}

fn builder_from_matches(matches: &ArgMatches) -> Result<RepodataBuilder> {
    let input_dir = Path::new(matches.value_of("directory").expect("required argument"));
    let mut builder = RepodataBuilder::new(input_dir);

    if let Some(dir) = matches.value_of("outputdir") {
        builder = builder.output_dir(Path::new(dir));
    }

    let workers = match matches.value_of("workers") {
        Some(value) => value
            .parse::<usize>()
            .with_context(|| format!("invalid worker count: {}", value))?,
        None => num_cpus::get(),
    };
    builder = builder.workers(workers);

    if let Some(value) = matches.value_of("changelog_limit") {
        let limit = value
            .parse::<usize>()
            .with_context(|| format!("invalid changelog limit: {}", value))?;
        builder = builder.changelog_limit(limit);
    }

    let checksum = matches.value_of("checksum").expect("has default value");
    builder = builder.checksum_type(ChecksumType::from_name(checksum)?);

    builder = builder.unique_md_filenames(matches.is_present("unique_md_filenames"));
    builder = builder.database(!matches.is_present("no_database"));

    if let Some(path) = matches.value_of("groupfile") {
        builder = builder.groupfile(Path::new(path));
    }

    if let Some(name) = matches.value_of("compression") {
        builder = builder.compression(Compression::from_name(name)?);
    }
    builder = builder.force_xz(matches.is_present("xz"));

    builder = builder.update(matches.is_present("update"));
    if let Some(paths) = matches.values_of("update_md_path") {
        for path in paths {
            builder = builder.update_md_path(Path::new(path));
        }
    }

    builder = builder.skip_stat(matches.is_present("skip_stat"));
    builder = builder.skip_symlinks(matches.is_present("skip_symlinks"));

    if let Some(path) = matches.value_of("pkglist") {
        builder = builder.pkglist(Path::new(path));
    }

    if let Some(patterns) = matches.values_of("excludes") {
        for pattern in patterns {
            builder = builder.exclude(pattern);
        }
    }

    if let Some(base) = matches.value_of("location_base") {
        builder = builder.location_base(base);
    }

    Ok(builder)
}

pub fn run() -> Result<()> {
    let matches = app().get_matches();

    let logger = get_logger(
        matches.is_present("quiet"),
        matches.is_present("verbose"),
    );

    let builder = builder_from_matches(&matches)?;
    let summary = builder.run(&logger)?;

    info!(logger, "repository metadata written";
          "packages" => summary.package_count,
          "cache_hits" => summary.cache_hits,
          "dropped" => summary.dropped);

    Ok(())
}
