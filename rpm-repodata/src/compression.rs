// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Compressed stream primitives.

The three XML documents always use gzip; the SQLite databases and the
compressed group file use whichever format the operator selected. Encoders
must be finished explicitly so truncated output cannot pass silently, hence
the concrete [CompressedWriter] with a `finish` method rather than a boxed
`Write`.
*/

use {
    crate::error::{RepodataError, Result},
    bzip2::{read::BzDecoder, write::BzEncoder},
    flate2::{read::GzDecoder, write::GzEncoder},
    std::{
        fs::File,
        io::{BufReader, Read, Write},
        path::{Path, PathBuf},
    },
    xz2::{read::XzDecoder, write::XzEncoder},
};

const XZ_LEVEL: u32 = 6;

/// Compression format of an output artifact.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Filename extension for files compressed in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
            Self::Xz => ".xz",
        }
    }

    /// Parse a format name as accepted on the command line.
    pub fn from_name(s: &str) -> Result<Self> {
        match s {
            "gz" => Ok(Self::Gzip),
            "bz2" => Ok(Self::Bzip2),
            "xz" => Ok(Self::Xz),
            _ => Err(RepodataError::UnknownCompressionFormat(s.to_string())),
        }
    }

    /// Infer the format from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Some(Self::Gzip),
            Some("bz2") => Some(Self::Bzip2),
            Some("xz") => Some(Self::Xz),
            _ => None,
        }
    }

    /// Wrap a writer with a compressing encoder.
    pub fn writer<W: Write>(&self, dest: W) -> CompressedWriter<W> {
        match self {
            Self::Gzip => {
                CompressedWriter::Gzip(GzEncoder::new(dest, flate2::Compression::default()))
            }
            Self::Bzip2 => {
                CompressedWriter::Bzip2(BzEncoder::new(dest, bzip2::Compression::default()))
            }
            Self::Xz => CompressedWriter::Xz(XzEncoder::new(dest, XZ_LEVEL)),
        }
    }

    /// Wrap a reader with the matching decompressor.
    pub fn reader<'a, R: Read + 'a>(&self, source: R) -> Box<dyn Read + 'a> {
        match self {
            Self::Gzip => Box::new(GzDecoder::new(source)),
            Self::Bzip2 => Box::new(BzDecoder::new(source)),
            Self::Xz => Box::new(XzDecoder::new(source)),
        }
    }
}

/// A compressing [Write] wrapper with explicit stream finalization.
pub enum CompressedWriter<W: Write> {
    Gzip(GzEncoder<W>),
    Bzip2(BzEncoder<W>),
    Xz(XzEncoder<W>),
}

impl<W: Write> CompressedWriter<W> {
    /// Flush the compressed stream trailer and return the inner writer.
    pub fn finish(self) -> std::io::Result<W> {
        match self {
            Self::Gzip(enc) => enc.finish(),
            Self::Bzip2(enc) => enc.finish(),
            Self::Xz(enc) => enc.finish(),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Gzip(enc) => enc.write(buf),
            Self::Bzip2(enc) => enc.write(buf),
            Self::Xz(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Gzip(enc) => enc.flush(),
            Self::Bzip2(enc) => enc.flush(),
            Self::Xz(enc) => enc.flush(),
        }
    }
}

/// Compress `path` into a sibling file with the format's extension appended.
///
/// Returns the path of the compressed file. The source file is left in
/// place; the caller decides whether to delete it.
pub fn compress_file(path: &Path, compression: Compression) -> Result<PathBuf> {
    let mut dest_path = path.as_os_str().to_owned();
    dest_path.push(compression.extension());
    let dest_path = PathBuf::from(dest_path);

    let mut source =
        BufReader::new(File::open(path).map_err(|e| RepodataError::io(path, e))?);
    let dest = File::create(&dest_path).map_err(|e| RepodataError::io(&dest_path, e))?;

    let mut writer = compression.writer(dest);
    std::io::copy(&mut source, &mut writer).map_err(|e| RepodataError::io(&dest_path, e))?;
    writer
        .finish()
        .map_err(|e| RepodataError::io(&dest_path, e))?;

    Ok(dest_path)
}

/// Open a file, transparently decompressing by its extension.
pub fn open_decompressed(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| RepodataError::io(path, e))?;
    let reader = BufReader::new(file);

    Ok(match Compression::from_path(path) {
        Some(compression) => compression.reader(reader),
        None => Box::new(reader),
    })
}
