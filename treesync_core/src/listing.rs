use std::cmp::Ordering;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use treesync_common::{Result, TreeSyncError};

/// A direct child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Child {
    pub path: PathBuf,
    pub name: OsString,
}

/// Ordinal ordering on final path segments. Sorting and the merge-walk must
/// both go through this function.
pub(crate) fn compare_names(a: &OsStr, b: &OsStr) -> Ordering {
    a.cmp(b)
}

/// Lists the direct children of `dir`, sorted by name.
///
/// A child whose path is in `exclusions` is skipped and removed from the set,
/// so each exclusion suppresses one listing entry at most. A directory that no
/// longer exists lists as empty.
pub(crate) fn list_children(dir: &Path, exclusions: &mut HashSet<PathBuf>) -> Result<Vec<Child>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Directory {:?} vanished before listing, treating as empty", dir);
            return Ok(Vec::new());
        }
        Err(e) => return Err(TreeSyncError::io(dir, e)),
    };

    let mut children = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| TreeSyncError::io(dir, e))?;
        let path = entry.path();

        if exclusions.remove(&path) {
            debug!("Excluded {:?}", path);
            continue;
        }

        children.push(Child {
            name: entry.file_name(),
            path,
        });
    }

    children.sort_by(|a, b| compare_names(&a.name, &b.name));
    Ok(children)
}
