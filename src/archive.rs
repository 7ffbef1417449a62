//! Unpacks the nested GTFS archive.
//!
//! The statewide download holds one zip per transport mode. We pull the bus
//! zip out to disk, then expand its tables into a flat directory.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::ArchiveError;

/// Subdirectory of the scratch directory holding the extracted tables.
pub const TABLES_DIR: &str = "bus_data";

/// Extracts `member` from the outer archive into `scratch`, then expands the
/// nested archive into `scratch/bus_data`. Returns the tables directory.
#[tracing::instrument(skip(archive, scratch), fields(archive_bytes = archive.len()))]
pub fn extract_nested(archive: &[u8], member: &str, scratch: &Path) -> Result<PathBuf, ArchiveError> {
    let mut outer = ZipArchive::new(Cursor::new(archive)).map_err(ArchiveError::Corrupt)?;
    debug!(entries = outer.len(), "Opened feed archive");

    let member_path = scratch.join(member);
    {
        let mut entry = match outer.by_name(member) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(ArchiveError::MissingMember(member.to_string()));
            }
            Err(e) => return Err(ArchiveError::Corrupt(e)),
        };

        if let Some(parent) = member_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&member_path)?;
        io::copy(&mut entry, &mut out)?;
    }

    let tables_dir = scratch.join(TABLES_DIR);
    let nested = File::open(&member_path)?;
    let nested_corrupt = |source: ZipError| ArchiveError::NestedCorrupt {
        member: member.to_string(),
        source,
    };
    let mut inner = ZipArchive::new(nested).map_err(nested_corrupt)?;
    let table_count = inner.len();
    inner.extract(&tables_dir).map_err(nested_corrupt)?;

    info!(files = table_count, dir = %tables_dir.display(), "Extracted nested archive");
    Ok(tables_dir)
}
