//! Per-run scratch directories.
//!
//! Every run extracts into its own uniquely named directory under a configured
//! root, so overlapping runs never share files. The directory is removed when
//! the [`ScratchDir`] is dropped, whichever way the run ends. Directories left
//! behind by a killed process are swept on the next run once they are stale.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tracing::{debug, info, warn};

pub const SCRATCH_PREFIX: &str = "gtfs_processing";

/// Leftovers older than this are assumed abandoned. Comfortably longer than a run.
pub const STALE_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Sweeps stale leftovers under `root`, then creates a fresh directory there.
    pub fn create(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        sweep_stale(root, STALE_AFTER);

        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the directory, reporting any failure instead of ignoring it as drop does.
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "Removed scratch directory");
        Ok(())
    }
}

/// Removes scratch directories under `root` not modified within `max_age`.
/// Returns how many were removed. Failures are logged and skipped.
pub fn sweep_stale(root: &Path, max_age: Duration) -> usize {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "Could not scan scratch root");
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(SCRATCH_PREFIX) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove stale scratch directory"),
        }
    }

    if removed > 0 {
        info!(removed, "Swept stale scratch directories");
    }
    removed
}
