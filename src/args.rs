//! Command-line tokenising: delimiter grouping, list indices and file refs.

use crate::error::{ShellError, ValidRange};
use crate::store::{parse_index, FileListStore, FileRef};

pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Join delimiter-wrapped runs of tokens into single arguments, so
/// `"fn main"` becomes one argument. An odd number of delimiter characters
/// across all tokens is rejected before any grouping happens.
pub fn group(tokens: &[String], delimiter: char) -> Result<Vec<String>, ShellError> {
    let count: usize = tokens
        .iter()
        .map(|t| t.chars().filter(|c| *c == delimiter).count())
        .sum();
    if count % 2 != 0 {
        return Err(ShellError::DelimiterImbalance { delimiter, count });
    }

    let mut grouped = Vec::with_capacity(tokens.len());
    let mut open: Option<Vec<&str>> = None;

    for token in tokens {
        match open.as_mut() {
            Some(parts) => {
                parts.push(token.as_str());
                if token.ends_with(delimiter) {
                    let joined = parts.join(" ");
                    grouped.push(strip_delimiters(&joined, delimiter));
                    open = None;
                }
            }
            None => {
                let wrapped = token.len() > delimiter.len_utf8()
                    && token.starts_with(delimiter)
                    && token.ends_with(delimiter);
                if wrapped {
                    grouped.push(strip_delimiters(token, delimiter));
                } else if token.starts_with(delimiter) {
                    open = Some(vec![token.as_str()]);
                } else {
                    grouped.push(token.clone());
                }
            }
        }
    }

    // Balanced counts can still leave a run open, e.g. `a"b "c`.
    if let Some(parts) = open {
        grouped.extend(parts.into_iter().map(str::to_string));
    }
    Ok(grouped)
}

fn strip_delimiters(s: &str, delimiter: char) -> String {
    let s = s.strip_prefix(delimiter).unwrap_or(s);
    s.strip_suffix(delimiter).unwrap_or(s).to_string()
}

pub fn require(args: &[String], required: usize) -> Result<(), ShellError> {
    if args.len() < required {
        return Err(ShellError::MissingArguments {
            required,
            got: args.len(),
        });
    }
    Ok(())
}

/// Parse a list index argument; negative or non-numeric input is reported
/// against the store's current range.
pub fn list_index(arg: &str, store: &FileListStore) -> Result<usize, ShellError> {
    parse_index(arg).ok_or_else(|| {
        if store.summaries().is_err() {
            ShellError::NoListsAvailable
        } else {
            ShellError::InvalidListIndex {
                given: arg.to_string(),
                valid: ValidRange::of_len(store.iter().map(|(idx, _)| idx + 1).max().unwrap_or(0)),
            }
        }
    })
}

pub fn file_refs(args: &[String]) -> Vec<FileRef> {
    args.iter().map(|a| FileRef::parse(a)).collect()
}
