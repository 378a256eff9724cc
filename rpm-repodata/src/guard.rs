// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Staging cleanup on interruption.

A single process-wide cell holds the staging directory path between its
creation and the publish rename. The interrupt handler removes whatever the
cell points at and exits non-zero, so an aborted run never leaves a stale
`.repodata/` blocking the next one.
*/

use {
    crate::error::{RepodataError, Result},
    slog::{info, Logger},
    std::{
        path::{Path, PathBuf},
        sync::{Mutex, Once},
    },
};

static STAGING_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);
static INSTALL: Once = Once::new();

/// Point the guard at a freshly created staging directory.
pub fn arm(path: &Path) {
    *STAGING_PATH.lock().expect("guard cell poisoned") = Some(path.to_path_buf());
}

/// Clear the guard once the staging directory has been published.
pub fn disarm() {
    *STAGING_PATH.lock().expect("guard cell poisoned") = None;
}

/// Install the interrupt handler. Safe to call once per run; installation
/// only happens the first time.
pub fn install(logger: &Logger) -> Result<()> {
    let mut result = Ok(());

    INSTALL.call_once(|| {
        let logger = logger.clone();

        result = ctrlc::set_handler(move || {
            info!(logger, "interrupt received, terminating");

            if let Some(path) = STAGING_PATH.lock().expect("guard cell poisoned").take() {
                let _ = std::fs::remove_dir_all(&path);
            }

            std::process::exit(1);
        })
        .map_err(|e| RepodataError::SignalHandler(e.to_string()));
    });

    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arm_and_disarm_cycle() {
        arm(Path::new("/tmp/some/.repodata"));
        assert!(STAGING_PATH.lock().unwrap().is_some());

        disarm();
        assert!(STAGING_PATH.lock().unwrap().is_none());
    }
}
