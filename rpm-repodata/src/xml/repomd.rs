// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `repomd.xml` manifest, in both directions.

Writing happens once per run at the end of finalization; parsing is needed
when loading the update cache from an existing repository, where the
manifest locates the three metadata documents.
*/

use {
    crate::{
        checksum::ChecksumType,
        error::Result,
        XML_NS_REPO, XML_NS_RPM,
    },
    serde::Deserialize,
    std::io::Write,
    xml::{writer::XmlEvent, EmitterConfig},
};

/// Schema version recorded for the SQLite database artifacts.
pub const DATABASE_VERSION: u32 = 10;

/// File-level metadata for one published artifact.
#[derive(Clone, Debug)]
pub struct RepomdRecord {
    /// Value of the `type` attribute, e.g. `primary` or `primary_db`.
    pub data_type: String,
    /// Path relative to the repository root, e.g. `repodata/primary.xml.gz`.
    pub location_href: String,
    pub checksum_type: ChecksumType,
    /// Hex digest of the published bytes.
    pub checksum: String,
    /// Hex digest of the decompressed stream, when the artifact is
    /// compressed.
    pub open_checksum: Option<String>,
    pub timestamp: u64,
    pub size: u64,
    pub open_size: Option<u64>,
    /// Schema version, present on the database entries.
    pub database_version: Option<u32>,
}

/// Serialize a `repomd.xml` document describing the given artifacts.
pub fn write_repomd(
    out: impl Write,
    revision: u64,
    records: &[RepomdRecord],
) -> Result<()> {
    let mut writer = EmitterConfig::new()
        .perform_indent(true)
        .create_writer(out);

    writer.write(
        XmlEvent::start_element("repomd")
            .default_ns(XML_NS_REPO)
            .ns("rpm", XML_NS_RPM),
    )?;

    let revision = revision.to_string();
    writer.write(XmlEvent::start_element("revision"))?;
    writer.write(XmlEvent::characters(&revision))?;
    writer.write(XmlEvent::end_element())?;

    for record in records {
        writer.write(XmlEvent::start_element("data").attr("type", &record.data_type))?;

        writer.write(
            XmlEvent::start_element("checksum").attr("type", record.checksum_type.name()),
        )?;
        writer.write(XmlEvent::characters(&record.checksum))?;
        writer.write(XmlEvent::end_element())?;

        if let Some(open_checksum) = &record.open_checksum {
            writer.write(
                XmlEvent::start_element("open-checksum")
                    .attr("type", record.checksum_type.name()),
            )?;
            writer.write(XmlEvent::characters(open_checksum))?;
            writer.write(XmlEvent::end_element())?;
        }

        writer.write(XmlEvent::start_element("location").attr("href", &record.location_href))?;
        writer.write(XmlEvent::end_element())?;

        let timestamp = record.timestamp.to_string();
        writer.write(XmlEvent::start_element("timestamp"))?;
        writer.write(XmlEvent::characters(&timestamp))?;
        writer.write(XmlEvent::end_element())?;

        let size = record.size.to_string();
        writer.write(XmlEvent::start_element("size"))?;
        writer.write(XmlEvent::characters(&size))?;
        writer.write(XmlEvent::end_element())?;

        if let Some(open_size) = record.open_size {
            let open_size = open_size.to_string();
            writer.write(XmlEvent::start_element("open-size"))?;
            writer.write(XmlEvent::characters(&open_size))?;
            writer.write(XmlEvent::end_element())?;
        }

        if let Some(version) = record.database_version {
            let version = version.to_string();
            writer.write(XmlEvent::start_element("database_version"))?;
            writer.write(XmlEvent::characters(&version))?;
            writer.write(XmlEvent::end_element())?;
        }

        writer.write(XmlEvent::end_element())?;
    }

    writer.write(XmlEvent::end_element())?;

    Ok(())
}

/// A parsed `repomd.xml` document.
#[derive(Debug, Deserialize)]
pub struct RepoMd {
    pub revision: Option<String>,
    /// The `<data>` entries describing metadata files.
    #[serde(rename = "data", default)]
    pub data: Vec<RepoMdData>,
}

impl RepoMd {
    /// Construct an instance by parsing XML from a reader.
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        Ok(serde_xml_rs::from_reader(reader)?)
    }

    /// Find the entry for a given data type, e.g. `primary`.
    pub fn data_entry(&self, data_type: &str) -> Option<&RepoMdData> {
        self.data.iter().find(|d| d.data_type == data_type)
    }
}

/// A `<data>` element in a `repomd.xml` file.
#[derive(Debug, Deserialize)]
pub struct RepoMdData {
    #[serde(rename = "type")]
    pub data_type: String,
    pub location: RepoMdLocation,
    pub checksum: Option<RepoMdChecksum>,
    pub timestamp: Option<u64>,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RepoMdLocation {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct RepoMdChecksum {
    #[serde(rename = "type")]
    pub checksum_type: String,
    #[serde(rename = "$value")]
    pub value: String,
}
