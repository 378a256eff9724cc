// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `primary.xml` fragment serialization. */

use {
    crate::{
        error::Result,
        package::{Dependency, Package},
        xml::{fragment_writer, text_element},
        XML_NS_COMMON, XML_NS_RPM,
    },
    xml::{writer::XmlEvent, EventWriter},
};

/// Document header, terminated by the opening `<metadata>` tag.
pub fn header(packages: usize) -> String {
    format!(
        "{}<metadata xmlns=\"{}\" xmlns:rpm=\"{}\" packages=\"{}\">\n",
        super::XML_PROLOG,
        XML_NS_COMMON,
        XML_NS_RPM,
        packages
    )
}

/// Document footer closing the root element.
pub const FOOTER: &str = "</metadata>";

/// Serialize one `<package>` fragment.
pub fn fragment(pkg: &Package) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = fragment_writer(&mut buf);

    writer.write(XmlEvent::start_element("package").attr("type", "rpm"))?;

    text_element(&mut writer, "name", &pkg.name)?;
    text_element(&mut writer, "arch", &pkg.arch)?;

    let epoch = pkg.epoch.to_string();
    writer.write(
        XmlEvent::start_element("version")
            .attr("epoch", &epoch)
            .attr("ver", &pkg.version)
            .attr("rel", &pkg.release),
    )?;
    writer.write(XmlEvent::end_element())?;

    writer.write(
        XmlEvent::start_element("checksum")
            .attr("type", pkg.checksum_type.name())
            .attr("pkgid", "YES"),
    )?;
    writer.write(XmlEvent::characters(&pkg.pkg_id))?;
    writer.write(XmlEvent::end_element())?;

    text_element(&mut writer, "summary", &pkg.summary)?;
    text_element(&mut writer, "description", &pkg.description)?;
    text_element(&mut writer, "packager", pkg.packager.as_deref().unwrap_or(""))?;
    text_element(&mut writer, "url", pkg.url.as_deref().unwrap_or(""))?;

    let time_file = pkg.time_file.to_string();
    let time_build = pkg.time_build.to_string();
    writer.write(
        XmlEvent::start_element("time")
            .attr("file", &time_file)
            .attr("build", &time_build),
    )?;
    writer.write(XmlEvent::end_element())?;

    let size_package = pkg.size_package.to_string();
    let size_installed = pkg.size_installed.to_string();
    let size_archive = pkg.size_archive.to_string();
    writer.write(
        XmlEvent::start_element("size")
            .attr("package", &size_package)
            .attr("installed", &size_installed)
            .attr("archive", &size_archive),
    )?;
    writer.write(XmlEvent::end_element())?;

    {
        let mut location = XmlEvent::start_element("location").attr("href", &pkg.location_href);
        if let Some(base) = &pkg.location_base {
            location = location.attr("xml:base", base);
        }
        writer.write(location)?;
        writer.write(XmlEvent::end_element())?;
    }

    writer.write(XmlEvent::start_element("format"))?;

    text_element(&mut writer, "rpm:license", pkg.license.as_deref().unwrap_or(""))?;
    text_element(&mut writer, "rpm:vendor", pkg.vendor.as_deref().unwrap_or(""))?;
    text_element(&mut writer, "rpm:group", pkg.group.as_deref().unwrap_or(""))?;
    text_element(
        &mut writer,
        "rpm:buildhost",
        pkg.build_host.as_deref().unwrap_or(""),
    )?;
    text_element(
        &mut writer,
        "rpm:sourcerpm",
        pkg.source_rpm.as_deref().unwrap_or(""),
    )?;

    let header_start = pkg.header_start.to_string();
    let header_end = pkg.header_end.to_string();
    writer.write(
        XmlEvent::start_element("rpm:header-range")
            .attr("start", &header_start)
            .attr("end", &header_end),
    )?;
    writer.write(XmlEvent::end_element())?;

    dependency_list(&mut writer, "rpm:provides", &pkg.provides)?;
    dependency_list(&mut writer, "rpm:requires", &pkg.requires)?;
    dependency_list(&mut writer, "rpm:conflicts", &pkg.conflicts)?;
    dependency_list(&mut writer, "rpm:obsoletes", &pkg.obsoletes)?;
    dependency_list(&mut writer, "rpm:suggests", &pkg.suggests)?;
    dependency_list(&mut writer, "rpm:enhances", &pkg.enhances)?;
    dependency_list(&mut writer, "rpm:recommends", &pkg.recommends)?;
    dependency_list(&mut writer, "rpm:supplements", &pkg.supplements)?;

    // primary.xml carries only the abbreviated file list; the full manifest
    // lives in filelists.xml.
    for file in pkg.files.iter().filter(|f| f.is_primary()) {
        let mut element = XmlEvent::start_element("file");
        if let Some(kind) = file.kind.xml_type() {
            element = element.attr("type", kind);
        }
        writer.write(element)?;
        writer.write(XmlEvent::characters(&file.path))?;
        writer.write(XmlEvent::end_element())?;
    }

    // </format>
    writer.write(XmlEvent::end_element())?;
    // </package>
    writer.write(XmlEvent::end_element())?;

    buf.push(b'\n');

    Ok(buf)
}

fn dependency_list<W: std::io::Write>(
    writer: &mut EventWriter<W>,
    tag: &str,
    deps: &[Dependency],
) -> Result<()> {
    if deps.is_empty() {
        return Ok(());
    }

    writer.write(XmlEvent::start_element(tag))?;

    for dep in deps {
        let epoch;
        let mut entry = XmlEvent::start_element("rpm:entry").attr("name", &dep.name);

        if let Some(flags) = &dep.flags {
            entry = entry.attr("flags", flags);

            epoch = dep.epoch.unwrap_or(0).to_string();
            entry = entry.attr("epoch", &epoch);

            if let Some(version) = &dep.version {
                entry = entry.attr("ver", version);
            }
            if let Some(release) = &dep.release {
                entry = entry.attr("rel", release);
            }
        }

        if dep.pre {
            entry = entry.attr("pre", "1");
        }

        writer.write(entry)?;
        writer.write(XmlEvent::end_element())?;
    }

    writer.write(XmlEvent::end_element())?;

    Ok(())
}

#[cfg(test)]
mod test {
    use {super::*, crate::xml::testutil::sample_package};

    #[test]
    fn header_declares_count_and_namespaces() {
        let header = header(42);
        assert!(header.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(header.contains("packages=\"42\""));
        assert!(header.contains("xmlns:rpm=\"http://linux.duke.edu/metadata/rpm\""));
    }

    #[test]
    fn fragment_shape() {
        let xml = String::from_utf8(fragment(&sample_package()).unwrap()).unwrap();

        assert!(xml.starts_with("<package type=\"rpm\">"));
        assert!(xml.ends_with("</package>\n"));
        assert!(xml.contains("<name>bash</name>"));
        assert!(xml.contains("epoch=\"0\""));
        assert!(xml.contains("ver=\"5.1.8\""));
        assert!(xml.contains("pkgid=\"YES\">a3f5</checksum>"));
        assert!(xml.contains("<rpm:provides>"));
        assert!(xml.contains("pre=\"1\""));
        // Only the abbreviated file list appears in primary.
        assert!(xml.contains("<file>/usr/bin/bash</file>"));
        assert!(xml.contains("type=\"ghost\">/etc/skel/.bashrc</file>"));
        assert!(!xml.contains("README"));
        // Changelogs belong to other.xml only.
        assert!(!xml.contains("rebuild"));
    }

    #[test]
    fn dependency_without_flags_has_no_version_attrs() {
        let mut pkg = sample_package();
        pkg.requires = vec![Dependency {
            name: "/bin/sh".to_string(),
            ..Default::default()
        }];

        let xml = String::from_utf8(fragment(&pkg).unwrap()).unwrap();
        assert!(xml.contains("<rpm:entry name=\"/bin/sh\" />"));
    }
}
