// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading and writing the repository XML documents.

Each document class has a writer module producing one `<package>` fragment
per record ([primary], [filelists], [other]) plus the document header and
footer the sinks emit around them. [reader] parses existing documents back
into [crate::package::Package] records for the update cache, and [repomd]
models the `repomd.xml` manifest in both directions.

The namespace declarations live on the document root, so fragments use bare
`rpm:` prefixes and are only meaningful inside their parent document.
*/

pub mod filelists;
pub mod other;
pub mod primary;
pub mod reader;
pub mod repomd;

use {
    crate::error::Result,
    xml::{writer::XmlEvent, EmitterConfig, EventWriter},
};

/// XML declaration emitted at the top of each of the three documents.
pub const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

pub(crate) fn fragment_writer(buf: &mut Vec<u8>) -> EventWriter<&mut Vec<u8>> {
    EmitterConfig::new()
        .write_document_declaration(false)
        .create_writer(buf)
}

/// Write `<name>text</name>`, or a self-closed element when text is empty.
pub(crate) fn text_element<W: std::io::Write>(
    writer: &mut EventWriter<W>,
    name: &str,
    text: &str,
) -> Result<()> {
    writer.write(XmlEvent::start_element(name))?;
    if !text.is_empty() {
        writer.write(XmlEvent::characters(text))?;
    }
    writer.write(XmlEvent::end_element())?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::package::{ChangelogEntry, Dependency, FileEntry, FileKind, Package};

    pub(crate) fn sample_package() -> Package {
        Package {
            name: "bash".to_string(),
            epoch: 0,
            version: "5.1.8".to_string(),
            release: "2.el9".to_string(),
            arch: "x86_64".to_string(),
            pkg_id: "a3f5".to_string(),
            summary: "The GNU Bourne Again shell".to_string(),
            description: "Bash is the shell".to_string(),
            url: Some("https://www.gnu.org/software/bash".to_string()),
            time_file: 1_650_000_000,
            time_build: 1_640_000_000,
            size_package: 1234,
            size_installed: 4567,
            size_archive: 2345,
            location_href: "x86_64/bash-5.1.8-2.el9.x86_64.rpm".to_string(),
            license: Some("GPLv3+".to_string()),
            provides: vec![Dependency {
                name: "bash".to_string(),
                flags: Some("EQ".to_string()),
                epoch: Some(0),
                version: Some("5.1.8".to_string()),
                release: Some("2.el9".to_string()),
                pre: false,
            }],
            requires: vec![Dependency {
                name: "filesystem".to_string(),
                flags: Some("GE".to_string()),
                epoch: Some(0),
                version: Some("3".to_string()),
                release: None,
                pre: true,
            }],
            files: vec![
                FileEntry {
                    path: "/usr/bin/bash".to_string(),
                    kind: FileKind::File,
                },
                FileEntry {
                    path: "/usr/share/doc/bash/README".to_string(),
                    kind: FileKind::File,
                },
                FileEntry {
                    path: "/etc/skel/.bashrc".to_string(),
                    kind: FileKind::Ghost,
                },
            ],
            changelogs: vec![ChangelogEntry {
                author: "A Maintainer <am@example.com> - 5.1.8-2".to_string(),
                date: 1_639_000_000,
                text: "- rebuild".to_string(),
            }],
            ..Default::default()
        }
    }
}
