use crate::report::{emit, ReportFormatter, Summary};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{debug, warn};
use treesync_core::{CancelFlag, ChangeReporter, FileOperations, OperationResult};

const MISSING_PROMPT: &str = "Possible options:\n    \
    [C/c] copy to missing path,\n    \
    [R/r] delete existing file,\n    \
    [I/i] ignore,\n    \
    [A/a] abort\n    --> ";

const ERROR_PROMPT: &str = "[I/i] ignore, [A/a] abort --> ";

/// Interactive reporter: asks how to resolve each difference and applies the
/// answer to the trees before the walk moves on.
///
/// Choosing abort (or closing the input) raises the shared [`CancelFlag`],
/// which stops the comparator at its next check.
pub struct SyncReporter<I: BufRead, W: Write> {
    formatter: ReportFormatter,
    verbose: bool,
    input: I,
    out: W,
    operations: FileOperations,
    cancel: CancelFlag,
    summary: Summary,
}

impl<I: BufRead, W: Write> SyncReporter<I, W> {
    pub fn new(
        formatter: ReportFormatter,
        verbose: bool,
        input: I,
        out: W,
        operations: FileOperations,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            formatter,
            verbose,
            input,
            out,
            operations,
            cancel,
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

    fn aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn abort(&mut self) {
        debug!("User chose to abort");
        self.cancel.cancel();
    }

    /// Prompts until one of `options` is typed (case-insensitive).
    /// Returns `None` when the input is exhausted or unreadable.
    fn read_option(&mut self, prompt: &str, options: &[char]) -> Option<char> {
        loop {
            emit(&mut self.out, prompt);

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read answer: {}", e);
                    return None;
                }
            }

            let answer = line.trim();
            let mut chars = answer.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                let c = c.to_ascii_lowercase();
                if options.contains(&c) {
                    return Some(c);
                }
            }
            emit(
                &mut self.out,
                &format!("\nUnknown option: '{}' please try again\n\n", answer),
            );
        }
    }

    fn report_outcome(&mut self, outcome: treesync_common::Result<OperationResult>) {
        let text = match outcome {
            Ok(result) => describe(&result),
            Err(e) => format!("ERROR: {}\n", e),
        };
        emit(&mut self.out, &text);
    }

    fn ignore_or_abort(&mut self) {
        match self.read_option(ERROR_PROMPT, &['i', 'a']) {
            Some('i') => emit(&mut self.out, "IGNORED\n"),
            _ => self.abort(),
        }
    }
}

fn describe(result: &OperationResult) -> String {
    let verb = match result.operation {
        treesync_core::FileOperation::Copy => "COPIED",
        treesync_core::FileOperation::Delete => "DELETED",
    };
    let prefix = if result.dry_run { "DRY RUN: " } else { "" };
    match &result.destination {
        Some(destination) => format!(
            "{}{} {} to {}\n",
            prefix,
            verb,
            result.source.display(),
            destination.display()
        ),
        None => format!("{}{} {}\n", prefix, verb, result.source.display()),
    }
}

impl<I: BufRead, W: Write> ChangeReporter for SyncReporter<I, W> {
    fn comparing(&mut self, path1: &Path, _path2: &Path) {
        self.summary.compared += 1;
        if self.verbose {
            emit(&mut self.out, &self.formatter.comparing(path1));
        }
    }

    fn missing_path(&mut self, existing: &Path, missing_at: &Path) {
        if self.aborted() {
            return;
        }
        self.summary.missing += 1;
        let text = self.formatter.missing(existing, missing_at, true);
        emit(&mut self.out, &text);

        match self.read_option(MISSING_PROMPT, &['c', 'r', 'i', 'a']) {
            Some('c') => {
                let outcome = self.operations.copy_path(existing, missing_at);
                self.report_outcome(outcome);
            }
            Some('r') => {
                let outcome = self.operations.delete_path(existing);
                self.report_outcome(outcome);
            }
            Some('i') => {
                let text = format!("IGNORED {}\n", self.formatter.relative(existing).display());
                emit(&mut self.out, &text);
            }
            _ => self.abort(),
        }
    }

    fn different_files(&mut self, path1: &Path, path2: &Path) {
        if self.aborted() {
            return;
        }
        self.summary.different += 1;
        let text = self.formatter.different(path1, path2, true);
        emit(&mut self.out, &text);

        let prompt = format!(
            "Possible options:\n    \
             [1] preserve file in path1 ({}),\n    \
             [2] preserve file in path2 ({}),\n    \
             [I/i] ignore, [A/a] abort\n    --> ",
            path1.display(),
            path2.display()
        );
        match self.read_option(&prompt, &['1', '2', 'i', 'a']) {
            Some('1') => {
                let outcome = self.operations.copy_path(path1, path2);
                self.report_outcome(outcome);
            }
            Some('2') => {
                let outcome = self.operations.copy_path(path2, path1);
                self.report_outcome(outcome);
            }
            Some('i') => {
                let text = format!("IGNORED {}\n", self.formatter.relative(path1).display());
                emit(&mut self.out, &text);
            }
            _ => self.abort(),
        }
    }

    fn error_fixing_last_modified(&mut self, _path: &Path, cause: &io::Error) {
        if self.aborted() {
            return;
        }
        self.summary.errors += 1;
        emit(&mut self.out, &self.formatter.error_fixing_last_modified(cause));
        self.ignore_or_abort();
    }

    fn error_comparing_files(&mut self, _path1: &Path, _path2: &Path, cause: &io::Error) {
        if self.aborted() {
            return;
        }
        self.summary.errors += 1;
        emit(&mut self.out, &self.formatter.error_comparing_files(cause));
        self.ignore_or_abort();
    }
}
