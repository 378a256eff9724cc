// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `other.xml` fragment serialization. */

use {
    crate::{error::Result, package::Package, xml::fragment_writer, XML_NS_OTHER},
    xml::writer::XmlEvent,
};

/// Document header, terminated by the opening `<otherdata>` tag.
pub fn header(packages: usize) -> String {
    format!(
        "{}<otherdata xmlns=\"{}\" packages=\"{}\">\n",
        super::XML_PROLOG,
        XML_NS_OTHER,
        packages
    )
}

/// Document footer closing the root element.
pub const FOOTER: &str = "</otherdata>";

/// Serialize one `<package>` fragment carrying changelog entries.
pub fn fragment(pkg: &Package) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = fragment_writer(&mut buf);

    writer.write(
        XmlEvent::start_element("package")
            .attr("pkgid", &pkg.pkg_id)
            .attr("name", &pkg.name)
            .attr("arch", &pkg.arch),
    )?;

    let epoch = pkg.epoch.to_string();
    writer.write(
        XmlEvent::start_element("version")
            .attr("epoch", &epoch)
            .attr("ver", &pkg.version)
            .attr("rel", &pkg.release),
    )?;
    writer.write(XmlEvent::end_element())?;

    for entry in &pkg.changelogs {
        let date = entry.date.to_string();
        writer.write(
            XmlEvent::start_element("changelog")
                .attr("author", &entry.author)
                .attr("date", &date),
        )?;
        writer.write(XmlEvent::characters(&entry.text))?;
        writer.write(XmlEvent::end_element())?;
    }

    writer.write(XmlEvent::end_element())?;

    buf.push(b'\n');

    Ok(buf)
}
