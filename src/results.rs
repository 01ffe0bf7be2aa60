//! Annotated search output, keyed by file index in the primary list.
//!
//! Correlation with list 0 is by position only. Edits to list 0 after a
//! search (add, remove, swap) leave these entries untouched, so they can go
//! stale; only a new search, find or primary rebuild replaces them.

use std::collections::BTreeMap;

/// One line of search output with highlight markup already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLine {
    pub line_number: u64,
    /// Context line (`path-N-text`) rather than a match (`path:N:text`).
    pub context: bool,
    pub rendered: String,
}

impl AnnotatedLine {
    pub fn separator(&self) -> char {
        if self.context {
            '-'
        } else {
            ':'
        }
    }
}

/// All annotated lines stored for one file; the tally is the length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileResults {
    lines: Vec<AnnotatedLine>,
}

impl FileResults {
    pub fn tally(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[AnnotatedLine] {
        &self.lines
    }

    pub fn first_match(&self) -> Option<&AnnotatedLine> {
        self.lines
            .iter()
            .find(|l| !l.context)
            .or_else(|| self.lines.first())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchResultSet {
    files: BTreeMap<usize, FileResults>,
}

impl SearchResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Append a line to `file`, returning the new tally.
    pub fn push(&mut self, file: usize, line: AnnotatedLine) -> usize {
        let entry = self.files.entry(file).or_default();
        entry.lines.push(line);
        entry.tally()
    }

    pub fn get(&self, file: usize) -> Option<&FileResults> {
        self.files.get(&file)
    }

    pub fn tally(&self, file: usize) -> usize {
        self.files.get(&file).map_or(0, FileResults::tally)
    }

    /// Place a previously stored group at a (possibly different) index.
    pub fn insert(&mut self, file: usize, results: FileResults) {
        if results.tally() > 0 {
            self.files.insert(file, results);
        }
    }

    /// Drain every group, leaving the set empty.
    pub fn take(&mut self) -> SearchResultSet {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u64, text: &str) -> AnnotatedLine {
        AnnotatedLine {
            line_number: n,
            context: false,
            rendered: text.to_string(),
        }
    }

    #[test]
    fn push_returns_running_tally() {
        let mut set = SearchResultSet::new();
        assert_eq!(set.push(0, line(3, "a")), 1);
        assert_eq!(set.push(0, line(9, "b")), 2);
        assert_eq!(set.push(1, line(1, "c")), 1);
        assert_eq!(set.tally(0), 2);
        assert_eq!(set.tally(1), 1);
        assert_eq!(set.tally(7), 0);
    }

    #[test]
    fn tally_always_matches_stored_lines() {
        let mut set = SearchResultSet::new();
        for n in 0..5 {
            set.push(2, line(n, "x"));
        }
        let group = set.get(2).unwrap();
        assert_eq!(group.tally(), group.lines().len());
    }

    #[test]
    fn take_leaves_set_empty() {
        let mut set = SearchResultSet::new();
        set.push(0, line(1, "a"));
        let old = set.take();
        assert!(set.is_empty());
        assert_eq!(old.tally(0), 1);
    }

    #[test]
    fn insert_ignores_empty_groups() {
        let mut set = SearchResultSet::new();
        set.insert(4, FileResults::default());
        assert!(set.get(4).is_none());
    }

    #[test]
    fn first_match_skips_context_lines() {
        let mut set = SearchResultSet::new();
        set.push(
            0,
            AnnotatedLine {
                line_number: 4,
                context: true,
                rendered: "ctx".into(),
            },
        );
        set.push(0, line(5, "hit"));
        assert_eq!(set.get(0).unwrap().first_match().unwrap().line_number, 5);
    }
}
