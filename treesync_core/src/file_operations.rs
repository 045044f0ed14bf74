use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use treesync_common::{Result, TreeSyncError};

/// File operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Copy,
    Delete,
}

/// Result of a file operation
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub operation: FileOperation,
    /// Number of regular files written or removed
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub dry_run: bool,
}

/// Copy and delete engine used when resolving differences.
///
/// Both operations work on whole subtrees. Copies replace whatever is at the
/// destination and keep modification times, so a later comparison at
/// `LAST_MODIFIED` level sees the pair as equal.
pub struct FileOperations {
    dry_run: bool,
    use_trash: bool,
}

impl FileOperations {
    pub fn new(dry_run: bool, use_trash: bool) -> Self {
        Self { dry_run, use_trash }
    }

    /// Copy a file or directory tree from source to destination
    pub fn copy_path(&self, source: &Path, dest: &Path) -> Result<OperationResult> {
        if self.dry_run {
            info!(
                "DRY RUN: Would copy {} to {}",
                source.display(),
                dest.display()
            );
            return Ok(OperationResult {
                source: source.to_path_buf(),
                destination: Some(dest.to_path_buf()),
                operation: FileOperation::Copy,
                files_processed: 0,
                bytes_processed: 0,
                dry_run: true,
            });
        }

        if fs::symlink_metadata(dest).is_ok() {
            debug!("Replacing existing {}", dest.display());
            remove_tree(dest)?;
        }

        let mut totals = Totals::default();
        copy_tree(source, dest, &mut totals)?;

        info!(
            "Copied {} files ({} bytes) from {} to {}",
            totals.files,
            totals.bytes,
            source.display(),
            dest.display()
        );

        Ok(OperationResult {
            source: source.to_path_buf(),
            destination: Some(dest.to_path_buf()),
            operation: FileOperation::Copy,
            files_processed: totals.files,
            bytes_processed: totals.bytes,
            dry_run: false,
        })
    }

    /// Delete a file or directory tree (with optional trash support)
    pub fn delete_path(&self, path: &Path) -> Result<OperationResult> {
        if self.dry_run {
            info!("DRY RUN: Would delete {}", path.display());
            return Ok(OperationResult {
                source: path.to_path_buf(),
                destination: None,
                operation: FileOperation::Delete,
                files_processed: 0,
                bytes_processed: 0,
                dry_run: true,
            });
        }

        let totals = measure_tree(path)?;

        if self.use_trash {
            debug!("Moving {} to trash", path.display());
            trash::delete(path)
                .map_err(|e| TreeSyncError::io(path, io::Error::other(e.to_string())))?;
            info!("Moved {} to trash", path.display());
        } else {
            debug!("Permanently deleting {}", path.display());
            remove_tree(path)?;
            info!("Deleted {}", path.display());
        }

        Ok(OperationResult {
            source: path.to_path_buf(),
            destination: None,
            operation: FileOperation::Delete,
            files_processed: totals.files,
            bytes_processed: totals.bytes,
            dry_run: false,
        })
    }
}

#[derive(Debug, Default)]
struct Totals {
    files: u64,
    bytes: u64,
}

fn copy_tree(source: &Path, dest: &Path, totals: &mut Totals) -> Result<()> {
    if source.is_dir() {
        fs::create_dir_all(dest).map_err(|e| TreeSyncError::io(dest, e))?;
        for entry in fs::read_dir(source).map_err(|e| TreeSyncError::io(source, e))? {
            let entry = entry.map_err(|e| TreeSyncError::io(source, e))?;
            copy_tree(&entry.path(), &dest.join(entry.file_name()), totals)?;
        }
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| TreeSyncError::io(parent, e))?;
        }
        totals.bytes += fs::copy(source, dest).map_err(|e| TreeSyncError::io(source, e))?;
        totals.files += 1;
    }

    // Preserve timestamps
    if let Ok(metadata) = fs::metadata(source) {
        let modified = filetime::FileTime::from_last_modification_time(&metadata);
        if let Err(e) = filetime::set_file_mtime(dest, modified) {
            debug!("Could not preserve modification time on {}: {}", dest.display(), e);
        }
    }
    Ok(())
}

fn remove_tree(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| TreeSyncError::io(path, e))?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| TreeSyncError::io(path, e))
}

fn measure_tree(path: &Path) -> Result<Totals> {
    let metadata = fs::symlink_metadata(path).map_err(|e| TreeSyncError::io(path, e))?;
    let mut totals = Totals::default();
    if metadata.is_dir() {
        for entry in fs::read_dir(path).map_err(|e| TreeSyncError::io(path, e))? {
            let entry = entry.map_err(|e| TreeSyncError::io(path, e))?;
            let child = measure_tree(&entry.path())?;
            totals.files += child.files;
            totals.bytes += child.bytes;
        }
    } else {
        totals.files = 1;
        totals.bytes = metadata.len();
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    #[test]
    fn test_copy_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.txt");
        let dest = temp.path().join("dest.txt");

        fs::write(&source, b"test content").unwrap();

        let ops = FileOperations::new(false, false);
        let result = ops.copy_path(&source, &dest).unwrap();

        assert_eq!(result.files_processed, 1);
        assert_eq!(result.bytes_processed, 12);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "test content");
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.txt");
        let dest = temp.path().join("dest.txt");
        fs::write(&source, b"x").unwrap();
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_mtime(&source, mtime).unwrap();

        FileOperations::new(false, false).copy_path(&source, &dest).unwrap();

        let copied = FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
        assert_eq!(copied, mtime);
    }

    #[test]
    fn test_copy_directory_tree() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(source.join("a/b")).unwrap();
        fs::write(source.join("top.txt"), b"top").unwrap();
        fs::write(source.join("a/b/deep.txt"), b"deep!").unwrap();
        let dest = temp.path().join("out/copy");

        let result = FileOperations::new(false, false).copy_path(&source, &dest).unwrap();

        assert_eq!(result.files_processed, 2);
        assert_eq!(result.bytes_processed, 8);
        assert_eq!(fs::read_to_string(dest.join("a/b/deep.txt")).unwrap(), "deep!");
    }

    #[test]
    fn test_copy_replaces_directory_with_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("name");
        fs::write(&source, b"file now").unwrap();
        let dest = temp.path().join("other");
        fs::create_dir_all(dest.join("inner")).unwrap();

        FileOperations::new(false, false).copy_path(&source, &dest).unwrap();

        assert!(dest.is_file());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "file now");
    }

    #[test]
    fn test_dry_run() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.txt");
        let dest = temp.path().join("dest.txt");

        fs::write(&source, b"test").unwrap();

        let ops = FileOperations::new(true, false);
        let result = ops.copy_path(&source, &dest).unwrap();
        assert!(result.dry_run);
        assert!(!dest.exists()); // Dry run shouldn't actually copy

        ops.delete_path(&source).unwrap();
        assert!(source.exists());
    }

    #[test]
    fn test_delete_directory_tree() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("gone");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/f1"), b"12").unwrap();
        fs::write(dir.join("f2"), b"345").unwrap();

        let result = FileOperations::new(false, false).delete_path(&dir).unwrap();

        assert_eq!(result.files_processed, 2);
        assert_eq!(result.bytes_processed, 5);
        assert!(!dir.exists());
    }

    #[test]
    fn test_delete_missing_is_error() {
        let temp = TempDir::new().unwrap();
        let err = FileOperations::new(false, false)
            .delete_path(&temp.path().join("nothing"))
            .unwrap_err();
        assert!(matches!(err, TreeSyncError::Io { .. }));
    }
}
