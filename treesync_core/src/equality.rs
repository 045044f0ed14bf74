//! File equality checks, cheapest first: size, then modification time, then
//! a streamed byte-for-byte comparison.

use crate::cancel::CancelFlag;
use crate::reporter::ChangeReporter;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};
use treesync_common::{EqualityLevel, Result, TreeSyncError};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentOutcome {
    Equal,
    Different,
    Cancelled,
}

/// Options that shape a single equality check
#[derive(Debug, Clone, Copy)]
pub(crate) struct EqualityOptions<'a> {
    pub level: EqualityLevel,
    pub fix_last_modified: bool,
    pub cancel: &'a CancelFlag,
}

/// Opening and retiming files during an equality check
pub(crate) trait FileAccess {
    type Reader: Read;

    fn open(&self, path: &Path) -> io::Result<Self::Reader>;

    fn set_modified(&self, path: &Path, time: FileTime) -> io::Result<()>;
}

/// The local filesystem
pub(crate) struct LocalFiles;

impl FileAccess for LocalFiles {
    type Reader = File;

    fn open(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    fn set_modified(&self, path: &Path, time: FileTime) -> io::Result<()> {
        filetime::set_file_mtime(path, time)
    }
}

/// Decides whether two regular files are equal under `options.level`.
///
/// Recoverable I/O faults go to the reporter and the pair counts as equal.
/// Only cancellation is returned as an error.
pub(crate) fn files_are_equal<R: ChangeReporter + ?Sized>(
    path1: &Path,
    path2: &Path,
    options: EqualityOptions<'_>,
    reporter: &mut R,
) -> Result<bool> {
    check_files(&LocalFiles, path1, path2, options, reporter)
}

fn check_files<F: FileAccess, R: ChangeReporter + ?Sized>(
    files: &F,
    path1: &Path,
    path2: &Path,
    options: EqualityOptions<'_>,
    reporter: &mut R,
) -> Result<bool> {
    let (meta1, meta2) = match (fs::metadata(path1), fs::metadata(path2)) {
        (Ok(meta1), Ok(meta2)) => (meta1, meta2),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to read metadata of {:?} / {:?}: {}", path1, path2, e);
            reporter.error_comparing_files(path1, path2, &e);
            return Ok(true);
        }
    };

    if meta1.len() != meta2.len() {
        return Ok(false);
    }
    if options.level == EqualityLevel::Size {
        return Ok(true);
    }

    let modified1 = FileTime::from_last_modification_time(&meta1);
    let modified2 = FileTime::from_last_modification_time(&meta2);
    let same_modified = to_millis(modified1) == to_millis(modified2);
    if same_modified && options.level == EqualityLevel::LastModified {
        return Ok(true);
    }

    match content_is_equal(files, path1, path2, options.cancel) {
        Ok(ContentOutcome::Equal) => {
            if !same_modified && options.fix_last_modified {
                match files.set_modified(path2, modified1) {
                    Ok(()) => debug!("Aligned modification time of {:?} with {:?}", path2, path1),
                    Err(e) => {
                        warn!("Failed to fix modification time of {:?}: {}", path2, e);
                        reporter.error_fixing_last_modified(path2, &e);
                    }
                }
            }
            Ok(true)
        }
        Ok(ContentOutcome::Different) => Ok(false),
        Ok(ContentOutcome::Cancelled) => Err(TreeSyncError::Cancelled),
        Err(e) => {
            warn!("Failed to compare {:?} with {:?}: {}", path1, path2, e);
            reporter.error_comparing_files(path1, path2, &e);
            Ok(true)
        }
    }
}

/// Streams both files in lockstep and stops at the first mismatching chunk.
/// The cancellation flag is polled before every chunk read.
pub(crate) fn content_is_equal<F: FileAccess>(
    files: &F,
    path1: &Path,
    path2: &Path,
    cancel: &CancelFlag,
) -> io::Result<ContentOutcome> {
    let mut file1 = files.open(path1)?;
    let mut file2 = files.open(path2)?;
    let mut buffer1 = vec![0u8; CHUNK_SIZE];
    let mut buffer2 = vec![0u8; CHUNK_SIZE];

    loop {
        if cancel.is_cancelled() {
            return Ok(ContentOutcome::Cancelled);
        }

        let len1 = read_chunk(&mut file1, &mut buffer1)?;
        let len2 = read_chunk(&mut file2, &mut buffer2)?;
        if len1 != len2 || buffer1[..len1] != buffer2[..len2] {
            return Ok(ContentOutcome::Different);
        }
        if len1 == 0 {
            return Ok(ContentOutcome::Equal);
        }
    }
}

/// Fills `buffer` unless end of file comes first; returns the bytes read.
fn read_chunk(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn to_millis(time: FileTime) -> i64 {
    time.unix_seconds() * 1000 + i64::from(time.nanoseconds() / 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{ChangeEvent, EventLog};
    use filetime::set_file_mtime;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn options(level: EqualityLevel, fix: bool, cancel: &CancelFlag) -> EqualityOptions<'_> {
        EqualityOptions {
            level,
            fix_last_modified: fix,
            cancel,
        }
    }

    fn pair(temp: &TempDir, a: &[u8], b: &[u8]) -> (PathBuf, PathBuf) {
        let p1 = temp.path().join("one");
        let p2 = temp.path().join("two");
        fs::write(&p1, a).unwrap();
        fs::write(&p2, b).unwrap();
        (p1, p2)
    }

    /// Reader that hands out at most three bytes per call
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(3);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_chunk_fills_buffer_across_short_reads() {
        let mut reader = Trickle(b"abcdefghij");
        let mut buffer = [0u8; 8];
        assert_eq!(read_chunk(&mut reader, &mut buffer).unwrap(), 8);
        assert_eq!(&buffer, b"abcdefgh");
        assert_eq!(read_chunk(&mut reader, &mut buffer).unwrap(), 2);
        assert_eq!(read_chunk(&mut reader, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_to_millis_truncates_sub_millisecond() {
        assert_eq!(to_millis(FileTime::from_unix_time(1, 999_999)), 1000);
        assert_eq!(to_millis(FileTime::from_unix_time(1, 1_000_000)), 1001);
    }

    #[test]
    fn test_size_mismatch_is_different_at_every_level() {
        let temp = TempDir::new().unwrap();
        let (p1, p2) = pair(&temp, b"DOS", b"DOS\nDOS");
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        for level in EqualityLevel::ALL {
            assert!(!files_are_equal(&p1, &p2, options(level, false, &cancel), &mut log).unwrap());
        }
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_same_size_different_content() {
        let temp = TempDir::new().unwrap();
        let (p1, p2) = pair(&temp, b"a b c", b"a\tb c");
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        assert!(files_are_equal(&p1, &p2, options(EqualityLevel::Size, false, &cancel), &mut log).unwrap());
        assert!(!files_are_equal(&p1, &p2, options(EqualityLevel::Content, false, &cancel), &mut log).unwrap());
    }

    #[test]
    fn test_last_modified_match_skips_content() {
        let temp = TempDir::new().unwrap();
        let (p1, p2) = pair(&temp, b"AAAA", b"BBBB");
        let mtime = FileTime::from_unix_time(1_700_000_000, 0);
        set_file_mtime(&p1, mtime).unwrap();
        set_file_mtime(&p2, mtime).unwrap();
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        assert!(files_are_equal(&p1, &p2, options(EqualityLevel::LastModified, false, &cancel), &mut log).unwrap());
        assert!(!files_are_equal(&p1, &p2, options(EqualityLevel::Content, false, &cancel), &mut log).unwrap());
    }

    #[test]
    fn test_last_modified_mismatch_falls_back_to_content() {
        let temp = TempDir::new().unwrap();
        let (p1, p2) = pair(&temp, b"AAAA", b"BBBB");
        set_file_mtime(&p1, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
        set_file_mtime(&p2, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        assert!(!files_are_equal(&p1, &p2, options(EqualityLevel::LastModified, false, &cancel), &mut log).unwrap());
    }

    #[test]
    fn test_fix_last_modified_after_content_match() {
        let temp = TempDir::new().unwrap();
        let (p1, p2) = pair(&temp, b"CONTENT", b"CONTENT");
        let mtime1 = FileTime::from_unix_time(1_700_000_000, 0);
        set_file_mtime(&p1, mtime1).unwrap();
        set_file_mtime(&p2, FileTime::from_unix_time(1_699_999_999, 0)).unwrap();
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        assert!(files_are_equal(&p1, &p2, options(EqualityLevel::LastModified, true, &cancel), &mut log).unwrap());

        let after = FileTime::from_last_modification_time(&fs::metadata(&p2).unwrap());
        assert_eq!(after, mtime1);
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_no_fix_without_flag() {
        let temp = TempDir::new().unwrap();
        let (p1, p2) = pair(&temp, b"CONTENT", b"CONTENT");
        let mtime2 = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_mtime(&p1, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
        set_file_mtime(&p2, mtime2).unwrap();
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        assert!(files_are_equal(&p1, &p2, options(EqualityLevel::Content, false, &cancel), &mut log).unwrap());
        let after = FileTime::from_last_modification_time(&fs::metadata(&p2).unwrap());
        assert_eq!(after, mtime2);
    }

    #[test]
    fn test_multi_chunk_files() {
        let temp = TempDir::new().unwrap();
        let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let mut tweaked = data.clone();
        *tweaked.last_mut().unwrap() ^= 0xFF;

        let (p1, p2) = pair(&temp, &data, &data);
        let cancel = CancelFlag::new();
        assert_eq!(content_is_equal(&LocalFiles, &p1, &p2, &cancel).unwrap(), ContentOutcome::Equal);

        fs::write(&p2, &tweaked).unwrap();
        assert_eq!(content_is_equal(&LocalFiles, &p1, &p2, &cancel).unwrap(), ContentOutcome::Different);
    }

    #[test]
    fn test_cancelled_content_comparison() {
        let temp = TempDir::new().unwrap();
        let (p1, p2) = pair(&temp, b"same", b"same");
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut log = EventLog::new();

        assert_eq!(content_is_equal(&LocalFiles, &p1, &p2, &cancel).unwrap(), ContentOutcome::Cancelled);
        let err = files_are_equal(&p1, &p2, options(EqualityLevel::Content, false, &cancel), &mut log)
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_metadata_failure_is_reported_and_equal() {
        let temp = TempDir::new().unwrap();
        let p1 = temp.path().join("present");
        fs::write(&p1, b"x").unwrap();
        let p2 = temp.path().join("absent");
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        assert!(files_are_equal(&p1, &p2, options(EqualityLevel::Content, false, &cancel), &mut log).unwrap());
        assert_eq!(log.error_count(), 1);
    }

    /// Local files with injected faults
    struct FaultyFiles<'a> {
        unreadable: Option<&'a Path>,
        retime_fails: bool,
    }

    impl FileAccess for FaultyFiles<'_> {
        type Reader = File;

        fn open(&self, path: &Path) -> io::Result<File> {
            if self.unreadable == Some(path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
            }
            File::open(path)
        }

        fn set_modified(&self, path: &Path, time: FileTime) -> io::Result<()> {
            if self.retime_fails {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"));
            }
            set_file_mtime(path, time)
        }
    }

    fn stale_pair(temp: &TempDir) -> (PathBuf, PathBuf, FileTime) {
        let (p1, p2) = pair(temp, b"CONTENT", b"CONTENT");
        let mtime2 = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_mtime(&p1, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
        set_file_mtime(&p2, mtime2).unwrap();
        (p1, p2, mtime2)
    }

    #[test]
    fn test_retime_failure_is_reported_and_equal() {
        let temp = TempDir::new().unwrap();
        let (p1, p2, mtime2) = stale_pair(&temp);
        let files = FaultyFiles {
            unreadable: None,
            retime_fails: true,
        };
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        let equal = check_files(&files, &p1, &p2, options(EqualityLevel::Content, true, &cancel), &mut log)
            .unwrap();

        assert!(equal);
        assert_eq!(
            log.events(),
            &[ChangeEvent::ErrorFixingLastModified {
                path: p2.clone(),
                cause: "read-only file system".to_string(),
            }]
        );
        let after = FileTime::from_last_modification_time(&fs::metadata(&p2).unwrap());
        assert_eq!(after, mtime2);
    }

    #[test]
    fn test_unreadable_file_is_reported_and_equal() {
        let temp = TempDir::new().unwrap();
        let (p1, p2, mtime2) = stale_pair(&temp);
        let files = FaultyFiles {
            unreadable: Some(p2.as_path()),
            retime_fails: false,
        };
        let cancel = CancelFlag::new();
        let mut log = EventLog::new();

        let equal = check_files(&files, &p1, &p2, options(EqualityLevel::Content, true, &cancel), &mut log)
            .unwrap();

        assert!(equal);
        assert_eq!(
            log.events(),
            &[ChangeEvent::ErrorComparingFiles {
                path1: p1.clone(),
                path2: p2.clone(),
                cause: "permission denied".to_string(),
            }]
        );
        // no timestamp repair after a failed read
        let after = FileTime::from_last_modification_time(&fs::metadata(&p2).unwrap());
        assert_eq!(after, mtime2);
    }
}
