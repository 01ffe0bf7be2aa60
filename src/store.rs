//! Indexed file lists. List 0 is the primary list: search and find rebuild it,
//! and numeric file references always resolve against it.

use crate::error::{ShellError, ValidRange};
use crate::results::SearchResultSet;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

pub const PRIMARY: usize = 0;

/// Highest list slot count a store will grow to.
pub const MAX_LISTS: usize = 1024;

/// Digits only; `+3` and `-1` are paths, not indices.
pub fn parse_index(arg: &str) -> Option<usize> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    arg.parse().ok()
}

/// A command argument naming a file: a position in a list, or a raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
    Index(usize),
    Path(String),
}

impl FileRef {
    /// Numeric arguments are list references; anything else is a literal path.
    pub fn parse(arg: &str) -> Self {
        match parse_index(arg) {
            Some(idx) => FileRef::Index(idx),
            None => FileRef::Path(arg.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileList {
    entries: Vec<String>,
}

impl FileList {
    pub fn from_paths(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Append and return the new entry's index.
    pub fn push(&mut self, path: String) -> usize {
        self.entries.push(path);
        self.entries.len() - 1
    }

    fn lookup(&self, idx: usize) -> Result<&str, ShellError> {
        self.get(idx).ok_or(ShellError::InvalidFileIndex {
            given: idx,
            valid: ValidRange::of_len(self.len()),
        })
    }
}

/// Outcome of a bulk removal: bad indices are reported, good ones still apply.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RemoveReport {
    pub removed: Vec<usize>,
    pub failures: Vec<ShellError>,
}

#[derive(Debug, Default)]
pub struct FileListStore {
    lists: Vec<Option<FileList>>,
}

impl FileListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_exists(&self, list: usize) -> bool {
        matches!(self.lists.get(list), Some(Some(_)))
    }

    /// True when `list` exists and every numeric ref is in range.
    /// Literal paths are trusted without touching the filesystem.
    pub fn file_exists(&self, list: usize, refs: &[FileRef]) -> bool {
        let Some(Some(files)) = self.lists.get(list) else {
            return false;
        };
        refs.iter().all(|r| match r {
            FileRef::Index(idx) => *idx < files.len(),
            FileRef::Path(_) => true,
        })
    }

    pub fn list(&self, list: usize) -> Result<&FileList, ShellError> {
        self.check_list(list)?;
        match self.lists.get(list) {
            Some(Some(files)) => Ok(files),
            _ => Err(ShellError::ListDoesNotExist(list)),
        }
    }

    fn list_mut(&mut self, list: usize) -> Result<&mut FileList, ShellError> {
        self.check_list(list)?;
        match self.lists.get_mut(list) {
            Some(Some(files)) => Ok(files),
            _ => Err(ShellError::ListDoesNotExist(list)),
        }
    }

    fn check_list(&self, list: usize) -> Result<(), ShellError> {
        if self.lists.iter().all(Option::is_none) {
            return Err(ShellError::NoListsAvailable);
        }
        if list >= self.lists.len() {
            return Err(ShellError::InvalidListIndex {
                given: list.to_string(),
                valid: ValidRange::of_len(self.lists.len()),
            });
        }
        Ok(())
    }

    /// Install `files` at `list`, creating the slot (and any gap before it).
    pub fn insert_list(&mut self, list: usize, files: FileList) -> Result<(), ShellError> {
        let slots = list
            .checked_add(1)
            .filter(|n| *n <= MAX_LISTS)
            .ok_or_else(|| ShellError::InvalidListIndex {
                given: list.to_string(),
                valid: ValidRange::of_len(MAX_LISTS),
            })?;
        if self.lists.len() < slots {
            self.lists.resize_with(slots, || None);
        }
        self.lists[list] = Some(files);
        Ok(())
    }

    /// Clear list 0, creating it if it was never created.
    pub fn reset_primary(&mut self) {
        if self.lists.is_empty() {
            self.lists.push(None);
        }
        self.lists[PRIMARY] = Some(FileList::default());
    }

    /// Clear list 0 and the search results, then rebuild list 0 from `refs`.
    /// Numeric refs copy from the pre-clear list 0 and carry their annotated
    /// lines to the new position. A bad ref aborts with list 0 and the
    /// results both left cleared.
    pub fn create_primary(
        &mut self,
        results: &mut SearchResultSet,
        refs: &[FileRef],
        cwd: &Path,
    ) -> Result<(), ShellError> {
        let snapshot = self
            .lists
            .get_mut(PRIMARY)
            .and_then(Option::take)
            .unwrap_or_default();
        let previous = results.take();
        self.reset_primary();

        let mut rebuilt = FileList::default();
        let mut carried = SearchResultSet::new();
        for r in refs {
            match r {
                FileRef::Index(idx) => {
                    let path = snapshot.lookup(*idx)?;
                    let pos = rebuilt.push(path.to_string());
                    if let Some(group) = previous.get(*idx) {
                        carried.insert(pos, group.clone());
                    }
                }
                FileRef::Path(raw) => {
                    rebuilt.push(absolutize(raw, cwd));
                }
            }
        }
        self.lists[PRIMARY] = Some(rebuilt);
        *results = carried;
        Ok(())
    }

    /// Clear (or create) auxiliary list `list` and fill it from `refs`,
    /// resolving numeric refs against the current list 0.
    pub fn create_at(&mut self, list: usize, refs: &[FileRef], cwd: &Path) -> Result<(), ShellError> {
        debug_assert_ne!(list, PRIMARY, "list 0 is rebuilt through create_primary");
        self.insert_list(list, FileList::default())?;
        let resolved = self.resolve_against_primary(refs, cwd)?;
        self.insert_list(list, FileList::from_paths(resolved))
    }

    /// Append to an existing list. Numeric refs always resolve against list 0,
    /// whichever list is being extended. Nothing is appended if any ref fails.
    pub fn add_to(&mut self, list: usize, refs: &[FileRef], cwd: &Path) -> Result<usize, ShellError> {
        self.list(list)?;
        let resolved = self.resolve_against_primary(refs, cwd)?;
        let added = resolved.len();
        let files = self.list_mut(list)?;
        for path in resolved {
            files.push(path);
        }
        Ok(added)
    }

    fn resolve_against_primary(&self, refs: &[FileRef], cwd: &Path) -> Result<Vec<String>, ShellError> {
        let empty = FileList::default();
        let primary = match self.lists.get(PRIMARY) {
            Some(Some(files)) => files,
            _ => &empty,
        };
        refs.iter()
            .map(|r| match r {
                FileRef::Index(idx) => primary.lookup(*idx).map(str::to_string),
                FileRef::Path(raw) => Ok(absolutize(raw, cwd)),
            })
            .collect()
    }

    /// Remove positions from `list`, compacting survivors in order.
    /// Each bad or repeated index is reported without cancelling the rest.
    pub fn remove_from(&mut self, list: usize, indices: &[String]) -> Result<RemoveReport, ShellError> {
        let files = self.list_mut(list)?;
        let len = files.len();
        let mut keep = vec![true; len];
        let mut report = RemoveReport::default();

        for arg in indices {
            match parse_index(arg) {
                Some(idx) if idx < len && keep[idx] => {
                    keep[idx] = false;
                    report.removed.push(idx);
                }
                Some(idx) => report.failures.push(ShellError::InvalidFileIndex {
                    given: idx,
                    valid: ValidRange::of_len(len),
                }),
                None => report.failures.push(ShellError::NotAnIndex(arg.clone())),
            }
        }

        let mut pos = 0;
        files.entries.retain(|_| {
            let kept = keep[pos];
            pos += 1;
            kept
        });
        Ok(report)
    }

    /// Exchange the full contents of `list` and list 0.
    pub fn swap_primary(&mut self, list: usize) -> Result<(), ShellError> {
        self.list(list)?;
        self.list(PRIMARY)?;
        self.lists.swap(PRIMARY, list);
        Ok(())
    }

    /// Write one slot. `file == len` appends, which is how list 0 grows while
    /// search output is being grouped.
    pub fn set_entry(&mut self, list: usize, file: usize, value: String) -> Result<(), ShellError> {
        let files = self.list_mut(list)?;
        if file == files.len() {
            files.push(value);
            return Ok(());
        }
        match files.entries.get_mut(file) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ShellError::InvalidFileIndex {
                given: file,
                valid: ValidRange::of_len(files.len()),
            }),
        }
    }

    pub fn clear_trailing_whitespace(&mut self, list: usize, file: usize) -> Result<(), ShellError> {
        let files = self.list_mut(list)?;
        let len = files.len();
        let slot = files
            .entries
            .get_mut(file)
            .ok_or(ShellError::InvalidFileIndex {
                given: file,
                valid: ValidRange::of_len(len),
            })?;
        let trimmed_len = slot.trim_end().len();
        slot.truncate(trimmed_len);
        Ok(())
    }

    /// Entries of `list` whose path matches `pattern` (regex, or substring
    /// when the pattern does not compile).
    pub fn matching_paths(&self, list: usize, pattern: &str) -> Result<Vec<(usize, &str)>, ShellError> {
        let files = self.list(list)?;
        let re = Regex::new(pattern).ok();
        Ok(files
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, path)| match &re {
                Some(re) => re.is_match(path),
                None => path.contains(pattern),
            })
            .map(|(idx, path)| (idx, path.as_str()))
            .collect())
    }

    pub fn contains_path(&self, list: usize, pattern: &str) -> Result<bool, ShellError> {
        Ok(!self.matching_paths(list, pattern)?.is_empty())
    }

    /// `(index, length)` of every created list.
    pub fn summaries(&self) -> Result<Vec<(usize, usize)>, ShellError> {
        let summaries: Vec<_> = self
            .lists
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|files| (idx, files.len())))
            .collect();
        if summaries.is_empty() {
            return Err(ShellError::NoListsAvailable);
        }
        Ok(summaries)
    }

    /// `(index, list)` of every created list, for persistence.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &FileList)> {
        self.lists
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|files| (idx, files)))
    }
}

/// Absolute form of a raw path argument, resolved lexically against `cwd`.
/// The filesystem is never consulted.
pub fn absolutize(raw: &str, cwd: &Path) -> String {
    let raw = raw.trim_end_matches(['\n', '\r']);
    let expanded = expand_tilde(raw);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    let mut clean = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other.as_os_str()),
        }
    }
    clean.to_string_lossy().into_owned()
}

fn expand_tilde(raw: &str) -> PathBuf {
    if raw == "~" || raw.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(raw.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(raw)
}
