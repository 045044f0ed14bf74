use serde::{Serialize, Serializer};
use std::io;
use std::path::{Path, PathBuf};

/// Receives the outcome of every node pair visited by a
/// [`TreeComparator`](crate::TreeComparator).
///
/// Each matched or unmatched entry produces exactly one call, in the order the
/// walk visits it. Implementations decide what to do with an event (print it,
/// prompt, copy files, stop the walk through a [`CancelFlag`](crate::CancelFlag)).
pub trait ChangeReporter {
    /// A name exists on both sides; called before the pair is classified.
    fn comparing(&mut self, path1: &Path, path2: &Path);

    /// `existing` has no counterpart; `missing_at` is where it would live in the
    /// other tree.
    fn missing_path(&mut self, existing: &Path, missing_at: &Path);

    /// A matched pair is not equal, including directory-vs-file pairs.
    fn different_files(&mut self, path1: &Path, path2: &Path);

    /// The timestamp repair on `path` failed. The files still count as equal.
    fn error_fixing_last_modified(&mut self, path: &Path, cause: &io::Error);

    /// Reading the pair failed. The files are treated as equal and the walk goes on.
    fn error_comparing_files(&mut self, path1: &Path, path2: &Path, cause: &io::Error);
}

impl<R: ChangeReporter + ?Sized> ChangeReporter for &mut R {
    fn comparing(&mut self, path1: &Path, path2: &Path) {
        (**self).comparing(path1, path2)
    }

    fn missing_path(&mut self, existing: &Path, missing_at: &Path) {
        (**self).missing_path(existing, missing_at)
    }

    fn different_files(&mut self, path1: &Path, path2: &Path) {
        (**self).different_files(path1, path2)
    }

    fn error_fixing_last_modified(&mut self, path: &Path, cause: &io::Error) {
        (**self).error_fixing_last_modified(path, cause)
    }

    fn error_comparing_files(&mut self, path1: &Path, path2: &Path, cause: &io::Error) {
        (**self).error_comparing_files(path1, path2, cause)
    }
}

impl<R: ChangeReporter + ?Sized> ChangeReporter for Box<R> {
    fn comparing(&mut self, path1: &Path, path2: &Path) {
        (**self).comparing(path1, path2)
    }

    fn missing_path(&mut self, existing: &Path, missing_at: &Path) {
        (**self).missing_path(existing, missing_at)
    }

    fn different_files(&mut self, path1: &Path, path2: &Path) {
        (**self).different_files(path1, path2)
    }

    fn error_fixing_last_modified(&mut self, path: &Path, cause: &io::Error) {
        (**self).error_fixing_last_modified(path, cause)
    }

    fn error_comparing_files(&mut self, path1: &Path, path2: &Path, cause: &io::Error) {
        (**self).error_comparing_files(path1, path2, cause)
    }
}

/// One reported event, as recorded by [`EventLog`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    Comparing {
        #[serde(serialize_with = "lossy_path")]
        path1: PathBuf,
        #[serde(serialize_with = "lossy_path")]
        path2: PathBuf,
    },
    Missing {
        #[serde(serialize_with = "lossy_path")]
        existing: PathBuf,
        #[serde(serialize_with = "lossy_path")]
        missing_at: PathBuf,
    },
    Different {
        #[serde(serialize_with = "lossy_path")]
        path1: PathBuf,
        #[serde(serialize_with = "lossy_path")]
        path2: PathBuf,
    },
    ErrorFixingLastModified {
        #[serde(serialize_with = "lossy_path")]
        path: PathBuf,
        cause: String,
    },
    ErrorComparingFiles {
        #[serde(serialize_with = "lossy_path")]
        path1: PathBuf,
        #[serde(serialize_with = "lossy_path")]
        path2: PathBuf,
        cause: String,
    },
}

/// Paths that are not valid UTF-8 are written with replacement characters
fn lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// Reporter that keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ChangeEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ChangeEvent> {
        self.events
    }

    pub fn comparing_count(&self) -> usize {
        self.count(|e| matches!(e, ChangeEvent::Comparing { .. }))
    }

    pub fn missing_count(&self) -> usize {
        self.count(|e| matches!(e, ChangeEvent::Missing { .. }))
    }

    pub fn different_count(&self) -> usize {
        self.count(|e| matches!(e, ChangeEvent::Different { .. }))
    }

    /// Both kinds of recoverable error
    pub fn error_count(&self) -> usize {
        self.count(|e| {
            matches!(
                e,
                ChangeEvent::ErrorFixingLastModified { .. } | ChangeEvent::ErrorComparingFiles { .. }
            )
        })
    }

    fn count(&self, pred: impl Fn(&ChangeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl ChangeReporter for EventLog {
    fn comparing(&mut self, path1: &Path, path2: &Path) {
        self.events.push(ChangeEvent::Comparing {
            path1: path1.to_path_buf(),
            path2: path2.to_path_buf(),
        });
    }

    fn missing_path(&mut self, existing: &Path, missing_at: &Path) {
        self.events.push(ChangeEvent::Missing {
            existing: existing.to_path_buf(),
            missing_at: missing_at.to_path_buf(),
        });
    }

    fn different_files(&mut self, path1: &Path, path2: &Path) {
        self.events.push(ChangeEvent::Different {
            path1: path1.to_path_buf(),
            path2: path2.to_path_buf(),
        });
    }

    fn error_fixing_last_modified(&mut self, path: &Path, cause: &io::Error) {
        self.events.push(ChangeEvent::ErrorFixingLastModified {
            path: path.to_path_buf(),
            cause: cause.to_string(),
        });
    }

    fn error_comparing_files(&mut self, path1: &Path, path2: &Path, cause: &io::Error) {
        self.events.push(ChangeEvent::ErrorComparingFiles {
            path1: path1.to_path_buf(),
            path2: path2.to_path_buf(),
            cause: cause.to_string(),
        });
    }
}
