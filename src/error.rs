use std::fmt;
use thiserror::Error;

/// Inclusive range of valid indices, rendered for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidRange {
    pub len: usize,
}

impl ValidRange {
    pub fn of_len(len: usize) -> Self {
        Self { len }
    }
}

impl fmt::Display for ValidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            write!(f, "none")
        } else {
            write!(f, "0..={}", self.len - 1)
        }
    }
}

/// Failures a command can report without ending the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("no file lists available (run a search or find first)")]
    NoListsAvailable,

    #[error("invalid list index {given} (valid: {valid})")]
    InvalidListIndex { given: String, valid: ValidRange },

    #[error("list {0} does not exist")]
    ListDoesNotExist(usize),

    #[error("invalid file index {given} (valid: {valid})")]
    InvalidFileIndex { given: usize, valid: ValidRange },

    #[error("missing arguments: need {required}, got {got}")]
    MissingArguments { required: usize, got: usize },

    #[error("'{0}' does not resolve to a file in the primary list")]
    UnresolvedNumericReference(String),

    #[error("unbalanced delimiter {delimiter}: found {count} occurrences")]
    DelimiterImbalance { delimiter: char, count: usize },

    #[error("'{0}' is not a file index")]
    NotAnIndex(String),
}
