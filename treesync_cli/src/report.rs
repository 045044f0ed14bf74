use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use treesync_common::FileInfo;
use treesync_core::ChangeReporter;

/// Counts of what a reporter has seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub compared: usize,
    pub missing: usize,
    pub different: usize,
    pub errors: usize,
}

impl Summary {
    pub fn has_differences(&self) -> bool {
        self.missing > 0 || self.different > 0
    }
}

/// Text rendering shared by the info and sync reporters
pub struct ReportFormatter {
    root1: PathBuf,
    root2: PathBuf,
}

impl ReportFormatter {
    pub fn new(root1: impl Into<PathBuf>, root2: impl Into<PathBuf>) -> Self {
        Self {
            root1: root1.into(),
            root2: root2.into(),
        }
    }

    /// Splits `path` into the root it belongs to and the rest. When the roots
    /// are nested and both contain `path`, the deeper root wins.
    pub fn split_root<'a>(&'a self, path: &'a Path) -> (&'a Path, &'a Path) {
        let in1 = path.starts_with(&self.root1);
        let in2 = path.starts_with(&self.root2);
        let root = match (in1, in2) {
            (true, true) if self.root1.starts_with(&self.root2) => &self.root1,
            (true, true) => &self.root2,
            (true, false) => &self.root1,
            (false, _) => &self.root2,
        };
        match path.strip_prefix(root) {
            Ok(relative) => (root.as_path(), relative),
            Err(_) => (Path::new(""), path),
        }
    }

    pub fn relative<'a>(&'a self, path: &'a Path) -> &'a Path {
        self.split_root(path).1
    }

    pub fn comparing(&self, path1: &Path) -> String {
        format!("COMPARING:     {}\n", self.relative(path1).display())
    }

    pub fn missing(&self, existing: &Path, missing_at: &Path, verbose: bool) -> String {
        let (missing_from, relative) = self.split_root(missing_at);
        let mut text = format!(
            "MISSING FILE:  {}    (missing in {})\n",
            relative.display(),
            missing_from.display()
        );
        if verbose {
            text.push_str("\n    Existing:\n");
            text.push_str(&file_info(existing));
            text.push('\n');
        }
        text
    }

    pub fn different(&self, path1: &Path, path2: &Path, verbose: bool) -> String {
        let mut text = format!("SYNC REQUIRED: {}\n", self.relative(path1).display());
        if verbose {
            text.push_str("\n    FILE 1:\n");
            text.push_str(&file_info(path1));
            text.push_str("\n    FILE 2:\n");
            text.push_str(&file_info(path2));
            text.push('\n');
        }
        text
    }

    pub fn error_fixing_last_modified(&self, cause: &io::Error) -> String {
        format!("ERROR fixing last modified time: {}\n", cause)
    }

    pub fn error_comparing_files(&self, cause: &io::Error) -> String {
        format!("error: {}\n", cause)
    }
}

/// Detail block for one path: location, last modified time and size
pub fn file_info(path: &Path) -> String {
    let info = FileInfo::read(path);
    let modified = info
        .modified
        .map(|time| {
            DateTime::<Local>::from(time)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "N/A".to_string());
    let size = info
        .size
        .map(|size| format!("{} b", size))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "    File:          {}\n    Last modified: {}\n    Size:          {}\n",
        path.display(),
        modified,
        size
    )
}

/// Writes `text`, logging instead of failing when the output is gone
pub(crate) fn emit(out: &mut impl Write, text: &str) {
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        warn!("Failed to write report output: {}", e);
    }
}

/// Report-only reporter: prints every difference and never touches the trees
pub struct InfoReporter<W: Write> {
    formatter: ReportFormatter,
    verbose: bool,
    out: W,
    summary: Summary,
}

impl<W: Write> InfoReporter<W> {
    pub fn new(formatter: ReportFormatter, verbose: bool, out: W) -> Self {
        Self {
            formatter,
            verbose,
            out,
            summary: Summary::default(),
        }
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ChangeReporter for InfoReporter<W> {
    fn comparing(&mut self, path1: &Path, _path2: &Path) {
        self.summary.compared += 1;
        if self.verbose {
            emit(&mut self.out, &self.formatter.comparing(path1));
        }
    }

    fn missing_path(&mut self, existing: &Path, missing_at: &Path) {
        self.summary.missing += 1;
        let text = self.formatter.missing(existing, missing_at, self.verbose);
        emit(&mut self.out, &text);
    }

    fn different_files(&mut self, path1: &Path, path2: &Path) {
        self.summary.different += 1;
        let text = self.formatter.different(path1, path2, self.verbose);
        emit(&mut self.out, &text);
    }

    fn error_fixing_last_modified(&mut self, _path: &Path, cause: &io::Error) {
        self.summary.errors += 1;
        emit(&mut self.out, &self.formatter.error_fixing_last_modified(cause));
    }

    fn error_comparing_files(&mut self, _path1: &Path, _path2: &Path, cause: &io::Error) {
        self.summary.errors += 1;
        emit(&mut self.out, &self.formatter.error_comparing_files(cause));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_root_plain() {
        let formatter = ReportFormatter::new("/data/a", "/data/b");
        assert_eq!(
            formatter.split_root(Path::new("/data/a/x/y")),
            (Path::new("/data/a"), Path::new("x/y"))
        );
        assert_eq!(
            formatter.split_root(Path::new("/data/b/z")),
            (Path::new("/data/b"), Path::new("z"))
        );
    }

    #[test]
    fn test_split_root_nested_prefers_deeper_root() {
        let formatter = ReportFormatter::new("/data/a", "/data/a/mirror");
        assert_eq!(formatter.relative(Path::new("/data/a/mirror/f")), Path::new("f"));
        assert_eq!(formatter.relative(Path::new("/data/a/f")), Path::new("f"));

        let reversed = ReportFormatter::new("/data/a/mirror", "/data/a");
        assert_eq!(reversed.relative(Path::new("/data/a/mirror/f")), Path::new("f"));
    }

    #[test]
    fn test_missing_line() {
        let formatter = ReportFormatter::new("/l", "/r");
        let text = formatter.missing(Path::new("/l/sub/f"), Path::new("/r/sub/f"), false);
        assert_eq!(text, "MISSING FILE:  sub/f    (missing in /r)\n");
    }

    #[test]
    fn test_different_line_verbose_has_details() {
        let temp = TempDir::new().unwrap();
        let root1 = temp.path().join("one");
        let root2 = temp.path().join("two");
        fs::create_dir_all(&root1).unwrap();
        fs::create_dir_all(&root2).unwrap();
        fs::write(root1.join("f"), b"12345").unwrap();

        let formatter = ReportFormatter::new(&root1, &root2);
        let text = formatter.different(&root1.join("f"), &root2.join("f"), true);

        assert!(text.starts_with("SYNC REQUIRED: f\n"));
        assert!(text.contains("FILE 1:"));
        assert!(text.contains("Size:          5 b"));
        // second file does not exist
        assert!(text.contains("Last modified: N/A"));
    }

    #[test]
    fn test_info_reporter_counts_and_quiet_comparing() {
        let formatter = ReportFormatter::new("/l", "/r");
        let mut reporter = InfoReporter::new(formatter, false, Vec::new());

        reporter.comparing(Path::new("/l/a"), Path::new("/r/a"));
        reporter.different_files(Path::new("/l/a"), Path::new("/r/a"));
        reporter.missing_path(Path::new("/r/b"), Path::new("/l/b"));
        reporter.error_comparing_files(
            Path::new("/l/c"),
            Path::new("/r/c"),
            &io::Error::new(io::ErrorKind::Other, "disk on fire"),
        );

        let summary = reporter.summary();
        assert_eq!(
            summary,
            Summary {
                compared: 1,
                missing: 1,
                different: 1,
                errors: 1
            }
        );
        assert!(summary.has_differences());

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            out,
            "SYNC REQUIRED: a\nMISSING FILE:  b    (missing in /l)\nerror: disk on fire\n"
        );
    }

    #[test]
    fn test_info_reporter_verbose_prints_comparing() {
        let formatter = ReportFormatter::new("/l", "/r");
        let mut reporter = InfoReporter::new(formatter, true, Vec::new());
        reporter.comparing(Path::new("/l/a/b"), Path::new("/r/a/b"));
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(out, "COMPARING:     a/b\n");
    }
}
