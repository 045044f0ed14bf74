use crate::cancel::CancelFlag;
use crate::equality::{files_are_equal, EqualityOptions};
use crate::listing::{compare_names, list_children, Child};
use crate::reporter::ChangeReporter;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use treesync_common::{EqualityLevel, Result, TreeSyncError};

/// Walks two directory trees in lockstep and reports every difference to a
/// [`ChangeReporter`].
///
/// Siblings are visited in ascending name order; a matched subdirectory is
/// descended into before the walk moves on to the next sibling.
pub struct TreeComparator<R> {
    reporter: R,
    root1: PathBuf,
    root2: PathBuf,
    exclusions1: HashSet<PathBuf>,
    exclusions2: HashSet<PathBuf>,
    level: EqualityLevel,
    fix_last_modified: bool,
    cancel: CancelFlag,
}

impl<R: ChangeReporter> TreeComparator<R> {
    /// Binds a reporter to two roots.
    ///
    /// Both roots must be existing directories. When one root lies inside the
    /// other, the relative path between them must start with one of
    /// `exclusions`, otherwise the walk would descend into the nested tree.
    pub fn new<P: AsRef<Path>>(
        reporter: R,
        root1: impl Into<PathBuf>,
        root2: impl Into<PathBuf>,
        exclusions: impl IntoIterator<Item = P>,
    ) -> Result<Self> {
        let root1 = root1.into();
        let root2 = root2.into();
        let exclusions: Vec<PathBuf> = exclusions
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();

        validate_exclusions(&exclusions)?;
        validate_dir(&root1)?;
        validate_dir(&root2)?;
        validate_nesting(&root1, &root2, &exclusions)?;

        let exclusions1 = resolve_exclusions(&root1, &exclusions);
        let exclusions2 = resolve_exclusions(&root2, &exclusions);

        Ok(Self {
            reporter,
            root1,
            root2,
            exclusions1,
            exclusions2,
            level: EqualityLevel::default(),
            fix_last_modified: false,
            cancel: CancelFlag::new(),
        })
    }

    /// Replaces the comparator's cancellation flag with a shared one.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn level(&self) -> EqualityLevel {
        self.level
    }

    pub fn set_level(&mut self, level: EqualityLevel) {
        self.level = level;
    }

    pub fn fix_last_modified(&self) -> bool {
        self.fix_last_modified
    }

    /// When enabled, two files found equal by content but with different
    /// modification times get the first file's time copied onto the second.
    pub fn set_fix_last_modified(&mut self, fix_last_modified: bool) {
        self.fix_last_modified = fix_last_modified;
    }

    pub fn set_cancelled(&self, cancelled: bool) {
        self.cancel.set(cancelled);
    }

    /// Handle to the flag polled by [`search`](Self::search). Clones may be
    /// moved to other threads or into the reporter.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn root1(&self) -> &Path {
        &self.root1
    }

    pub fn root2(&self) -> &Path {
        &self.root2
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Runs one comparison session over both trees.
    ///
    /// Returns [`TreeSyncError::Cancelled`] when the cancellation flag is seen,
    /// and [`TreeSyncError::Io`] when a directory cannot be listed.
    pub fn search(&mut self) -> Result<()> {
        info!(
            "Comparing {} with {} (level {})",
            self.root1.display(),
            self.root2.display(),
            self.level
        );

        let mut session = Session {
            reporter: &mut self.reporter,
            exclusions1: self.exclusions1.clone(),
            exclusions2: self.exclusions2.clone(),
            options: EqualityOptions {
                level: self.level,
                fix_last_modified: self.fix_last_modified,
                cancel: &self.cancel,
            },
        };

        let result = session.compare_dirs(&self.root1, &self.root2);
        match &result {
            Ok(()) => info!("Comparison finished"),
            Err(TreeSyncError::Cancelled) => info!("Comparison cancelled"),
            Err(_) => {}
        }
        result
    }
}

/// State owned by a single `search` call
struct Session<'a, R: ?Sized> {
    reporter: &'a mut R,
    exclusions1: HashSet<PathBuf>,
    exclusions2: HashSet<PathBuf>,
    options: EqualityOptions<'a>,
}

impl<R: ChangeReporter + ?Sized> Session<'_, R> {
    fn compare_dirs(&mut self, dir1: &Path, dir2: &Path) -> Result<()> {
        debug!("Comparing directory {:?} with {:?}", dir1, dir2);

        let mut children1 = list_children(dir1, &mut self.exclusions1)?.into_iter().peekable();
        let mut children2 = list_children(dir2, &mut self.exclusions2)?.into_iter().peekable();

        loop {
            self.check_cancelled()?;

            let order = match (children1.peek(), children2.peek()) {
                (Some(a), Some(b)) => compare_names(&a.name, &b.name),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };

            match order {
                Ordering::Equal => {
                    if let (Some(a), Some(b)) = (children1.next(), children2.next()) {
                        self.compare_pair(&a.path, &b.path)?;
                    }
                }
                Ordering::Less => {
                    if let Some(a) = children1.next() {
                        self.report_missing(&a, dir2);
                    }
                }
                Ordering::Greater => {
                    if let Some(b) = children2.next() {
                        self.report_missing(&b, dir1);
                    }
                }
            }
        }

        self.check_cancelled()
    }

    fn compare_pair(&mut self, path1: &Path, path2: &Path) -> Result<()> {
        self.reporter.comparing(path1, path2);

        match (path1.is_dir(), path2.is_dir()) {
            (true, true) => self.compare_dirs(path1, path2)?,
            (true, false) | (false, true) => self.reporter.different_files(path1, path2),
            (false, false) => {
                if !files_are_equal(path1, path2, self.options, &mut *self.reporter)? {
                    self.reporter.different_files(path1, path2);
                }
            }
        }
        Ok(())
    }

    fn report_missing(&mut self, existing: &Child, other_dir: &Path) {
        let missing_at = other_dir.join(&existing.name);
        self.reporter.missing_path(&existing.path, &missing_at);
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.options.cancel.is_cancelled() {
            return Err(TreeSyncError::Cancelled);
        }
        Ok(())
    }
}

fn validate_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(TreeSyncError::InvalidArgument(format!(
            "{} is not an existing directory",
            dir.display()
        )));
    }
    Ok(())
}

fn validate_exclusions(exclusions: &[PathBuf]) -> Result<()> {
    if exclusions.iter().any(|exclusion| exclusion.as_os_str().is_empty()) {
        return Err(TreeSyncError::InvalidArgument(
            "exclusion paths must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_nesting(root1: &Path, root2: &Path, exclusions: &[PathBuf]) -> Result<()> {
    let canonical1 = canonical(root1)?;
    let canonical2 = canonical(root2)?;
    validate_contained_is_excluded(&canonical1, &canonical2, exclusions)?;
    validate_contained_is_excluded(&canonical2, &canonical1, exclusions)
}

fn validate_contained_is_excluded(
    ancestor: &Path,
    descendant: &Path,
    exclusions: &[PathBuf],
) -> Result<()> {
    let Ok(relative) = descendant.strip_prefix(ancestor) else {
        return Ok(());
    };
    if exclusions.iter().any(|exclusion| relative.starts_with(exclusion)) {
        debug!("Nested root {:?} is covered by an exclusion", descendant);
        return Ok(());
    }
    Err(TreeSyncError::InvalidArgument(format!(
        "{} contains {} and {} is not excluded",
        ancestor.display(),
        descendant.display(),
        relative.display()
    )))
}

fn canonical(dir: &Path) -> Result<PathBuf> {
    dir.canonicalize().map_err(|e| {
        TreeSyncError::InvalidArgument(format!("cannot resolve {}: {}", dir.display(), e))
    })
}

fn resolve_exclusions(root: &Path, exclusions: &[PathBuf]) -> HashSet<PathBuf> {
    exclusions.iter().map(|exclusion| root.join(exclusion)).collect()
}
