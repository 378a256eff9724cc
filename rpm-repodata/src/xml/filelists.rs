// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `filelists.xml` fragment serialization. */

use {
    crate::{error::Result, package::Package, xml::fragment_writer, XML_NS_FILELISTS},
    xml::writer::XmlEvent,
};

/// Document header, terminated by the opening `<filelists>` tag.
pub fn header(packages: usize) -> String {
    format!(
        "{}<filelists xmlns=\"{}\" packages=\"{}\">\n",
        super::XML_PROLOG,
        XML_NS_FILELISTS,
        packages
    )
}

/// Document footer closing the root element.
pub const FOOTER: &str = "</filelists>";

/// Serialize one `<package>` fragment carrying the full file manifest.
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

    for file in &pkg.files {
        let mut element = XmlEvent::start_element("file");
        if let Some(kind) = file.kind.xml_type() {
            element = element.attr("type", kind);
        }
        writer.write(element)?;
        writer.write(XmlEvent::characters(&file.path))?;
        writer.write(XmlEvent::end_element())?;
    }

    writer.write(XmlEvent::end_element())?;

    buf.push(b'\n');

    Ok(buf)
}
