// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The three synchronized output streams.

Every package record fans out into `primary.xml.gz`, `filelists.xml.gz`,
and `other.xml.gz` plus the matching SQLite databases. Each document class
is guarded by its own mutex so a worker appending to filelists never blocks
one appending to primary; the locks are taken in a fixed order within a
single write, and never held together.

Write failures do not abort the worker phase. The first error is recorded
and surfaced when the trio is closed, which suppresses publication.
*/

use {
    crate::{
        compression::{Compression, CompressedWriter},
        error::{RepodataError, Result},
        package::Package,
        sqlite::{FilelistsDatabase, OtherDatabase, PrimaryDatabase},
        xml,
    },
    slog::{debug, Logger},
    std::{
        fs::File,
        io::{BufWriter, Write},
        path::Path,
        sync::Mutex,
    },
};

struct Sink<D> {
    writer: Option<CompressedWriter<BufWriter<File>>>,
    db: Option<D>,
}

impl<D> Sink<D> {
    fn create(path: &Path, db: Option<D>) -> Result<Self> {
        let file = File::create(path).map_err(|e| RepodataError::io(path, e))?;

        Ok(Self {
            writer: Some(Compression::Gzip.writer(BufWriter::new(file))),
            db,
        })
    }

    fn append(&mut self, fragment: &[u8]) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_all(fragment),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "stream already closed",
            )),
        }
    }

    fn close(&mut self, footer: &str) -> std::io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.write_all(footer.as_bytes())?;
                writer.finish()?.flush()
            }
            None => Ok(()),
        }
    }
}

/// The coordinated trio of metadata outputs.
pub struct SinkTrio {
    primary: Mutex<Sink<PrimaryDatabase>>,
    filelists: Mutex<Sink<FilelistsDatabase>>,
    other: Mutex<Sink<OtherDatabase>>,
    first_error: Mutex<Option<RepodataError>>,
    logger: Logger,
}

/// Paths of the three XML streams and, optionally, the three databases.
pub struct SinkPaths<'a> {
    pub primary_xml: &'a Path,
    pub filelists_xml: &'a Path,
    pub other_xml: &'a Path,
    pub databases: Option<SinkDatabasePaths<'a>>,
}

pub struct SinkDatabasePaths<'a> {
    pub primary: &'a Path,
    pub filelists: &'a Path,
    pub other: &'a Path,
}

impl SinkTrio {
    /// Create the compressed streams and databases.
    ///
    /// Nothing is written until [Self::write_preambles]; the package count
    /// in the document headers is only known once the walk completes.
    pub fn open(paths: &SinkPaths<'_>, logger: &Logger) -> Result<Self> {
        let (primary_db, filelists_db, other_db) = match &paths.databases {
            Some(db) => (
                Some(PrimaryDatabase::create(db.primary)?),
                Some(FilelistsDatabase::create(db.filelists)?),
                Some(OtherDatabase::create(db.other)?),
            ),
            None => (None, None, None),
        };

        Ok(Self {
            primary: Mutex::new(Sink::create(paths.primary_xml, primary_db)?),
            filelists: Mutex::new(Sink::create(paths.filelists_xml, filelists_db)?),
            other: Mutex::new(Sink::create(paths.other_xml, other_db)?),
            first_error: Mutex::new(None),
            logger: logger.clone(),
        })
    }

    /// Write the XML prolog and opening root tag of each document.
    pub fn write_preambles(&self, packages: usize) -> Result<()> {
        self.primary
            .lock()
            .expect("primary sink poisoned")
            .append(xml::primary::header(packages).as_bytes())
            .map_err(|e| RepodataError::SinkWrite("primary", e))?;
        self.filelists
            .lock()
            .expect("filelists sink poisoned")
            .append(xml::filelists::header(packages).as_bytes())
            .map_err(|e| RepodataError::SinkWrite("filelists", e))?;
        self.other
            .lock()
            .expect("other sink poisoned")
            .append(xml::other::header(packages).as_bytes())
            .map_err(|e| RepodataError::SinkWrite("other", e))?;

        Ok(())
    }

    /// Fan one record into all three documents.
    ///
    /// The fragments are serialized before any lock is taken; the three
    /// appends are then independent critical sections so concurrent workers
    /// can make progress on different documents.
    pub fn write(&self, pkg: &Package) {
        let fragments = (|| -> Result<_> {
            Ok((
                xml::primary::fragment(pkg)?,
                xml::filelists::fragment(pkg)?,
                xml::other::fragment(pkg)?,
            ))
        })();

        let (pri, fil, oth) = match fragments {
            Ok(f) => f,
            Err(e) => {
                self.record_error(pkg, e);
                return;
            }
        };

        {
            let mut sink = self.primary.lock().expect("primary sink poisoned");
            if let Err(e) = sink.append(&pri) {
                self.record_error(pkg, RepodataError::SinkWrite("primary", e));
            } else if let Some(db) = &sink.db {
                if let Err(e) = db.add_package(pkg) {
                    self.record_error(pkg, e);
                }
            }
        }

        {
            let mut sink = self.filelists.lock().expect("filelists sink poisoned");
            if let Err(e) = sink.append(&fil) {
                self.record_error(pkg, RepodataError::SinkWrite("filelists", e));
            } else if let Some(db) = &sink.db {
                if let Err(e) = db.add_package(pkg) {
                    self.record_error(pkg, e);
                }
            }
        }

        {
            let mut sink = self.other.lock().expect("other sink poisoned");
            if let Err(e) = sink.append(&oth) {
                self.record_error(pkg, RepodataError::SinkWrite("other", e));
            } else if let Some(db) = &sink.db {
                if let Err(e) = db.add_package(pkg) {
                    self.record_error(pkg, e);
                }
            }
        }
    }

    /// Close the documents and databases.
    ///
    /// Returns the first error recorded during the worker phase, if any; the
    /// caller must not publish the staging directory in that case.
    pub fn close(self) -> Result<()> {
        let mut primary = self.primary.into_inner().expect("primary sink poisoned");
        let mut filelists = self
            .filelists
            .into_inner()
            .expect("filelists sink poisoned");
        let mut other = self.other.into_inner().expect("other sink poisoned");

        primary
            .close(xml::primary::FOOTER)
            .map_err(|e| RepodataError::SinkWrite("primary", e))?;
        filelists
            .close(xml::filelists::FOOTER)
            .map_err(|e| RepodataError::SinkWrite("filelists", e))?;
        other
            .close(xml::other::FOOTER)
            .map_err(|e| RepodataError::SinkWrite("other", e))?;

        if let Some(db) = primary.db.take() {
            db.finish()?;
        }
        if let Some(db) = filelists.db.take() {
            db.finish()?;
        }
        if let Some(db) = other.db.take() {
            db.finish()?;
        }

        match self
            .first_error
            .into_inner()
            .expect("error slot poisoned")
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn record_error(&self, pkg: &Package, e: RepodataError) {
        debug!(self.logger, "sink write failed";
               "package" => pkg.filename(), "error" => format!("{:?}", e));

        let mut slot = self.first_error.lock().expect("error slot poisoned");
        if slot.is_none() {
            *slot = Some(e);
        }
    }
}
