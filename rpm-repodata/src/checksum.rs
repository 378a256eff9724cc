// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Content digest primitives.

Package identity (`pkgId`) and every `repomd.xml` entry are expressed as hex
digests. [ChecksumType] selects the algorithm; digests are computed either
from a reader ([digest_reader]) or transparently while writing through a
[DigestingWriter].
*/

use {
    crate::error::{RepodataError, Result},
    std::{
        fs::File,
        io::{BufReader, Read, Write},
        path::Path,
    },
};

/// Digest algorithm used for package and artifact checksums.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChecksumType {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Default for ChecksumType {
    fn default() -> Self {
        Self::Sha256
    }
}

impl ChecksumType {
    /// Name as it appears in `type` attributes of metadata documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Parse a name as accepted on the command line and in metadata.
    pub fn from_name(s: &str) -> Result<Self> {
        match s {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(RepodataError::UnknownChecksumType(s.to_string())),
        }
    }

    /// Create a new hasher for this algorithm.
    pub fn new_hasher(&self) -> Box<dyn digest::DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(md5::Md5::default()),
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Sha512 => Box::new(sha2::Sha512::default()),
        }
    }
}

/// Compute the hex digest of everything a reader yields.
pub fn digest_reader(mut reader: impl Read, checksum: ChecksumType) -> std::io::Result<String> {
    let mut hasher = checksum.new_hasher();
    let mut buf = [0u8; 32 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the hex digest of a file's content.
pub fn digest_file(path: &Path, checksum: ChecksumType) -> Result<String> {
    let file = File::open(path).map_err(|e| RepodataError::io(path, e))?;

    digest_reader(BufReader::new(file), checksum).map_err(|e| RepodataError::io(path, e))
}

/// A [Write] adapter that digests data as it passes through.
pub struct DigestingWriter<W> {
    hasher: Box<dyn digest::DynDigest + Send>,
    dest: W,
}

impl<W: Write> DigestingWriter<W> {
    pub fn new(dest: W, checksum: ChecksumType) -> Self {
        Self {
            hasher: checksum.new_hasher(),
            dest,
        }
    }

    /// Finish the stream, returning the destination and the hex digest.
    pub fn finish(self) -> (W, String) {
        (self.dest, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for DigestingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.dest.write(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.dest.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_digests() {
        let digest = digest_reader(&b"abc"[..], ChecksumType::Sha256).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let digest = digest_reader(&b"abc"[..], ChecksumType::Md5).unwrap();
        assert_eq!(digest, "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn digesting_writer_matches_reader() {
        let mut writer = DigestingWriter::new(Vec::new(), ChecksumType::Sha1);
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        let (data, digest) = writer.finish();

        assert_eq!(data, b"hello world");
        assert_eq!(
            digest,
            digest_reader(&b"hello world"[..], ChecksumType::Sha1).unwrap()
        );
    }

    #[test]
    fn name_round_trip() {
        for name in ["md5", "sha1", "sha256", "sha512"] {
            assert_eq!(ChecksumType::from_name(name).unwrap().name(), name);
        }
        assert!(ChecksumType::from_name("crc32").is_err());
    }
}
