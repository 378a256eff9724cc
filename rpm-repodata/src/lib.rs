// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM repository metadata generation.

This crate builds the `repodata/` metadata set consumed by RPM package
managers. Given a directory tree of `.rpm` files it produces three XML
documents (`primary.xml.gz`, `filelists.xml.gz`, `other.xml.gz`), three
matching SQLite databases, and a `repomd.xml` manifest describing them.

The work happens in a pipeline:

1. [walker] enumerates candidate packages, either by walking the tree
   breadth-first or from an explicit package list.
2. [pool] runs parallel workers that turn each package into a
   [package::Package] record, either by parsing its header ([parse]) or by
   reusing a record from a previous run ([cache]).
3. [sink] streams each record into the three compressed XML documents and
   the three databases, each guarded by its own lock.
4. [finalize] publishes everything atomically by renaming the staging
   directory into place and then writing `repomd.xml`.

[builder::RepodataBuilder] wires the pipeline together and is the main entry
point:

```no_run
use {rpm_repodata::builder::RepodataBuilder, std::path::Path};

let logger = slog::Logger::root(slog::Discard, slog::o!());
let summary = RepodataBuilder::new(Path::new("/srv/repo"))
    .workers(4)
    .run(&logger)?;
# Ok::<(), rpm_repodata::RepodataError>(())
```

All artifacts are built inside a hidden `.repodata/` staging directory whose
creation doubles as a cross-process lock; an interrupted run removes it via
the [guard] module so no partial metadata is ever published.
*/

pub mod builder;
pub mod cache;
pub mod checksum;
pub mod compression;
pub mod error;
pub mod finalize;
pub mod guard;
pub mod package;
pub mod parse;
pub mod pool;
pub mod sink;
pub mod sqlite;
pub mod walker;
pub mod xml;

pub use crate::error::{RepodataError, Result};

/// Name of the directory holding published repository metadata.
pub const REPODATA_DIR: &str = "repodata";

/// Name of the hidden staging directory metadata is built in.
pub const STAGING_DIR: &str = ".repodata";

/// XML namespace of `primary.xml` documents.
pub const XML_NS_COMMON: &str = "http://linux.duke.edu/metadata/common";

/// XML namespace of `rpm:`-prefixed elements in `primary.xml`.
pub const XML_NS_RPM: &str = "http://linux.duke.edu/metadata/rpm";

/// XML namespace of `filelists.xml` documents.
pub const XML_NS_FILELISTS: &str = "http://linux.duke.edu/metadata/filelists";

/// XML namespace of `other.xml` documents.
pub const XML_NS_OTHER: &str = "http://linux.duke.edu/metadata/other";

/// XML namespace of `repomd.xml` documents.
pub const XML_NS_REPO: &str = "http://linux.duke.edu/metadata/repo";
