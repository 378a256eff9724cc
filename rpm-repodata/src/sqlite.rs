// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! SQLite renditions of the three metadata documents.

The databases mirror the XML content in the schema package managers expect:
`primary.sqlite` carries identity and dependency data, `filelists.sqlite`
the per-directory file manifest, `other.sqlite` the changelogs. Each also
carries a `db_info` row whose checksum couples the database to its XML
counterpart; the finalizer writes it once the XML checksum is known.
*/

use {
    crate::{
        error::Result,
        package::{FileKind, Package},
        xml::repomd::DATABASE_VERSION,
    },
    indoc::indoc,
    rusqlite::{params, Connection},
    std::{collections::BTreeMap, path::Path},
};

const PRIMARY_SCHEMA: &[&str] = &[
    "CREATE TABLE db_info (dbversion INTEGER, checksum TEXT)",
    indoc! {"
        CREATE TABLE packages (
            pkgKey INTEGER PRIMARY KEY,
            pkgId TEXT,
            name TEXT,
            arch TEXT,
            version TEXT,
            epoch TEXT,
            release TEXT,
            summary TEXT,
            description TEXT,
            url TEXT,
            time_file INTEGER,
            time_build INTEGER,
            rpm_license TEXT,
            rpm_vendor TEXT,
            rpm_group TEXT,
            rpm_buildhost TEXT,
            rpm_sourcerpm TEXT,
            rpm_header_start INTEGER,
            rpm_header_end INTEGER,
            rpm_packager TEXT,
            size_package INTEGER,
            size_installed INTEGER,
            size_archive INTEGER,
            location_href TEXT,
            location_base TEXT,
            checksum_type TEXT
        )"},
    "CREATE TABLE files (name TEXT, type TEXT, pkgKey INTEGER)",
    indoc! {"
        CREATE TABLE provides (
            name TEXT, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER
        )"},
    indoc! {"
        CREATE TABLE requires (
            name TEXT, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER, pre BOOLEAN DEFAULT FALSE
        )"},
    indoc! {"
        CREATE TABLE conflicts (
            name TEXT, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER
        )"},
    indoc! {"
        CREATE TABLE obsoletes (
            name TEXT, flags TEXT, epoch TEXT, version TEXT, release TEXT,
            pkgKey INTEGER
        )"},
];

const PRIMARY_INDEXES: &[&str] = &[
    "CREATE INDEX packagename ON packages (name)",
    "CREATE INDEX packageId ON packages (pkgId)",
    "CREATE INDEX filenames ON files (name)",
    "CREATE INDEX pkgfiles ON files (pkgKey)",
    "CREATE INDEX pkgprovides ON provides (pkgKey)",
    "CREATE INDEX providesname ON provides (name)",
    "CREATE INDEX pkgrequires ON requires (pkgKey)",
    "CREATE INDEX requiresname ON requires (name)",
    "CREATE INDEX pkgconflicts ON conflicts (pkgKey)",
    "CREATE INDEX pkgobsoletes ON obsoletes (pkgKey)",
];

const FILELISTS_SCHEMA: &[&str] = &[
    "CREATE TABLE db_info (dbversion INTEGER, checksum TEXT)",
    "CREATE TABLE packages (pkgKey INTEGER PRIMARY KEY, pkgId TEXT)",
    indoc! {"
        CREATE TABLE filelist (
            pkgKey INTEGER, dirname TEXT, filenames TEXT, filetypes TEXT
        )"},
];

const FILELISTS_INDEXES: &[&str] = &[
    "CREATE INDEX keyfile ON filelist (pkgKey)",
    "CREATE INDEX pkgId ON packages (pkgId)",
    "CREATE INDEX dirnames ON filelist (dirname)",
];

const OTHER_SCHEMA: &[&str] = &[
    "CREATE TABLE db_info (dbversion INTEGER, checksum TEXT)",
    "CREATE TABLE packages (pkgKey INTEGER PRIMARY KEY, pkgId TEXT)",
    indoc! {"
        CREATE TABLE changelog (
            pkgKey INTEGER, author TEXT, date INTEGER, changelog TEXT
        )"},
];

const OTHER_INDEXES: &[&str] = &[
    "CREATE INDEX keychange ON changelog (pkgKey)",
    "CREATE INDEX pkgId ON packages (pkgId)",
];

fn create_database(path: &Path, schema: &[&str]) -> Result<Connection> {
    let conn = Connection::open(path)?;

    // The databases live in the staging directory and are discarded
    // wholesale on failure, so durability pragmas buy nothing here.
    conn.pragma_update(None, "synchronous", "OFF")?;
    conn.pragma_update(None, "journal_mode", "MEMORY")?;

    for statement in schema {
        conn.execute(statement, [])?;
    }

    Ok(conn)
}

fn finish_database(conn: Connection, indexes: &[&str]) -> Result<()> {
    for statement in indexes {
        conn.execute(statement, [])?;
    }

    conn.execute(
        "INSERT INTO db_info (dbversion, checksum) VALUES (?1, ?2)",
        params![DATABASE_VERSION, ""],
    )?;

    Ok(())
}

/// Record the checksum of the matching XML document in `db_info`.
///
/// Runs against the published database file, after the staging swap and
/// before compression, so consumers can verify the SQL and XML views agree.
pub fn set_checksum(path: &Path, checksum: &str) -> Result<()> {
    let conn = Connection::open(path)?;

    conn.execute("DELETE FROM db_info", [])?;
    conn.execute(
        "INSERT INTO db_info (dbversion, checksum) VALUES (?1, ?2)",
        params![DATABASE_VERSION, checksum],
    )?;

    Ok(())
}

/// The `primary.sqlite` database under construction.
pub struct PrimaryDatabase {
    conn: Connection,
}

impl PrimaryDatabase {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: create_database(path, PRIMARY_SCHEMA)?,
        })
    }

    pub fn add_package(&self, pkg: &Package) -> Result<()> {
        let mut statement = self.conn.prepare_cached(indoc! {"
            INSERT INTO packages (
                pkgId, name, arch, version, epoch, release, summary,
                description, url, time_file, time_build, rpm_license,
                rpm_vendor, rpm_group, rpm_buildhost, rpm_sourcerpm,
                rpm_header_start, rpm_header_end, rpm_packager, size_package,
                size_installed, size_archive, location_href, location_base,
                checksum_type
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )"})?;

        statement.execute(params![
            pkg.pkg_id,
            pkg.name,
            pkg.arch,
            pkg.version,
            pkg.epoch.to_string(),
            pkg.release,
            pkg.summary,
            pkg.description,
            pkg.url,
            pkg.time_file,
            pkg.time_build,
            pkg.license,
            pkg.vendor,
            pkg.group,
            pkg.build_host,
            pkg.source_rpm,
            pkg.header_start,
            pkg.header_end,
            pkg.packager,
            pkg.size_package,
            pkg.size_installed,
            pkg.size_archive,
            pkg.location_href,
            pkg.location_base,
            pkg.checksum_type.name(),
        ])?;

        let pkg_key = self.conn.last_insert_rowid();

        for (table, deps) in [
            ("provides", &pkg.provides),
            ("conflicts", &pkg.conflicts),
            ("obsoletes", &pkg.obsoletes),
        ] {
            let mut statement = self.conn.prepare_cached(&format!(
                "INSERT INTO {} (name, flags, epoch, version, release, pkgKey) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                table
            ))?;

            for dep in deps {
                statement.execute(params![
                    dep.name,
                    dep.flags,
                    dep.epoch.map(|e| e.to_string()),
                    dep.version,
                    dep.release,
                    pkg_key,
                ])?;
            }
        }

        let mut statement = self.conn.prepare_cached(indoc! {"
            INSERT INTO requires (name, flags, epoch, version, release, pkgKey, pre)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"})?;
        for dep in &pkg.requires {
            statement.execute(params![
                dep.name,
                dep.flags,
                dep.epoch.map(|e| e.to_string()),
                dep.version,
                dep.release,
                pkg_key,
                dep.pre,
            ])?;
        }

        let mut statement = self
            .conn
            .prepare_cached("INSERT INTO files (name, type, pkgKey) VALUES (?1, ?2, ?3)")?;
        for file in pkg.files.iter().filter(|f| f.is_primary()) {
            statement.execute(params![
                file.path,
                file.kind.db_code().to_string(),
                pkg_key
            ])?;
        }

        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        finish_database(self.conn, PRIMARY_INDEXES)
    }
}

/// The `filelists.sqlite` database under construction.
pub struct FilelistsDatabase {
    conn: Connection,
}

impl FilelistsDatabase {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: create_database(path, FILELISTS_SCHEMA)?,
        })
    }

    pub fn add_package(&self, pkg: &Package) -> Result<()> {
        self.conn
            .prepare_cached("INSERT INTO packages (pkgId) VALUES (?1)")?
            .execute(params![pkg.pkg_id])?;
        let pkg_key = self.conn.last_insert_rowid();

        let mut statement = self.conn.prepare_cached(indoc! {"
            INSERT INTO filelist (pkgKey, dirname, filenames, filetypes)
            VALUES (?1, ?2, ?3, ?4)"})?;

        for (dirname, (filenames, filetypes)) in encode_filelist(pkg) {
            statement.execute(params![pkg_key, dirname, filenames, filetypes])?;
        }

        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        finish_database(self.conn, FILELISTS_INDEXES)
    }
}

/// The `other.sqlite` database under construction.
pub struct OtherDatabase {
    conn: Connection,
}

impl OtherDatabase {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: create_database(path, OTHER_SCHEMA)?,
        })
    }

    pub fn add_package(&self, pkg: &Package) -> Result<()> {
        self.conn
            .prepare_cached("INSERT INTO packages (pkgId) VALUES (?1)")?
            .execute(params![pkg.pkg_id])?;
        let pkg_key = self.conn.last_insert_rowid();

        let mut statement = self.conn.prepare_cached(indoc! {"
            INSERT INTO changelog (pkgKey, author, date, changelog)
            VALUES (?1, ?2, ?3, ?4)"})?;

        for entry in &pkg.changelogs {
            statement.execute(params![pkg_key, entry.author, entry.date, entry.text])?;
        }

        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        finish_database(self.conn, OTHER_INDEXES)
    }
}

/// Group a package's files by directory.
///
/// Each directory becomes one row: the filenames joined by `/` and a string
/// of single-character type codes in the same order.
fn encode_filelist(pkg: &Package) -> BTreeMap<String, (String, String)> {
    let mut dirs: BTreeMap<String, (String, String)> = BTreeMap::new();

    for file in &pkg.files {
        let (dirname, basename) = match file.path.rsplit_once('/') {
            Some((dir, base)) => (dir.to_string(), base),
            None => (String::new(), file.path.as_str()),
        };

        let entry = dirs.entry(dirname).or_default();
        if !entry.0.is_empty() {
            entry.0.push('/');
        }
        entry.0.push_str(basename);
        entry.1.push(file.kind.db_code());
    }

    dirs
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::package::{FileEntry, FileKind},
    };

    fn row_count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn primary_database_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("primary.sqlite");

        let db = PrimaryDatabase::create(&path).unwrap();
        db.add_package(&crate::xml::testutil::sample_package())
            .unwrap();
        db.finish().unwrap();

        let conn = Connection::open(&path).unwrap();
        assert_eq!(row_count(&conn, "packages"), 1);
        assert_eq!(row_count(&conn, "provides"), 1);
        assert_eq!(row_count(&conn, "requires"), 1);
        // Two of the three files qualify for the abbreviated list.
        assert_eq!(row_count(&conn, "files"), 2);

        let (name, epoch): (String, String) = conn
            .query_row("SELECT name, epoch FROM packages", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "bash");
        assert_eq!(epoch, "0");
    }

    #[test]
    fn checksum_coupling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.sqlite");

        let db = OtherDatabase::create(&path).unwrap();
        db.add_package(&crate::xml::testutil::sample_package())
            .unwrap();
        db.finish().unwrap();

        set_checksum(&path, "feed1234").unwrap();

        let conn = Connection::open(&path).unwrap();
        let (version, checksum): (u32, String) = conn
            .query_row("SELECT dbversion, checksum FROM db_info", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(version, DATABASE_VERSION);
        assert_eq!(checksum, "feed1234");
    }

    #[test]
    fn filelist_encoding_groups_by_directory() {
        let mut pkg = crate::xml::testutil::sample_package();
        pkg.files = vec![
            FileEntry {
                path: "/usr/bin/a".to_string(),
                kind: FileKind::File,
            },
            FileEntry {
                path: "/usr/bin/b".to_string(),
                kind: FileKind::Ghost,
            },
            FileEntry {
                path: "/usr/bin".to_string(),
                kind: FileKind::Dir,
            },
        ];

        let encoded = encode_filelist(&pkg);
        assert_eq!(
            encoded.get("/usr/bin"),
            Some(&("a/b".to_string(), "fg".to_string()))
        );
        assert_eq!(
            encoded.get("/usr"),
            Some(&("bin".to_string(), "d".to_string()))
        );
    }
}
