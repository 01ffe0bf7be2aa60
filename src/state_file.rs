//! Line-oriented state file used by single-invocation mode.
//!
//! ```text
//! KGPLIST: 0
//! KGPFILE: 0:/src/a.rs:0
//! KGPRESULT: 12:let needle = 1;
//! KGPLIST: 2
//! KGPFILE2: 0:/src/b.rs:0
//! ```
//!
//! `KGPRESULT` lines belong to the primary-list file just above them.
//! Malformed lines are skipped; a missing file means no prior state.

use crate::annotate::parse_tail;
use crate::results::{AnnotatedLine, SearchResultSet};
use crate::store::{parse_index, FileList, FileListStore, PRIMARY};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const FILE_TAG: &str = "KGPFILE";
const RESULT_TAG: &str = "KGPRESULT: ";
const LIST_TAG: &str = "KGPLIST: ";

#[derive(Debug, Default)]
pub struct SavedState {
    pub store: FileListStore,
    pub results: SearchResultSet,
}

pub fn load(path: &Path) -> Result<SavedState> {
    if !path.exists() {
        return Ok(SavedState::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse(&content))
}

pub fn parse(content: &str) -> SavedState {
    let mut state = SavedState::default();
    // Index of the primary-list file that KGPRESULT lines attach to.
    let mut owner: Option<usize> = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix(RESULT_TAG) {
            if let (Some(file), Some((line_number, context, text))) = (owner, parse_tail(rest)) {
                state.results.push(
                    file,
                    AnnotatedLine {
                        line_number,
                        context,
                        rendered: text.to_string(),
                    },
                );
            }
            continue;
        }

        owner = None;

        if let Some(rest) = line.strip_prefix(LIST_TAG) {
            if let Some(list) = parse_index(rest.trim()) {
                if !state.store.list_exists(list) {
                    let _ = state.store.insert_list(list, FileList::default());
                }
            }
            continue;
        }

        let Some((list, path)) = parse_file_record(line) else {
            continue;
        };
        if !state.store.list_exists(list)
            && state.store.insert_list(list, FileList::default()).is_err()
        {
            continue;
        }
        let Ok(files) = state.store.list(list) else {
            continue;
        };
        let idx = files.len();
        if state.store.set_entry(list, idx, path.to_string()).is_ok() && list == PRIMARY {
            owner = Some(idx);
        }
    }
    state
}

/// `KGPFILE<L>: <idx>:<path>:<idx>` with matching indices.
fn parse_file_record(line: &str) -> Option<(usize, &str)> {
    let rest = line.strip_prefix(FILE_TAG)?;
    let (tag, record) = rest.split_once(": ")?;
    let list = if tag.is_empty() {
        PRIMARY
    } else {
        parse_index(tag)?
    };
    let (lead, rest) = record.split_once(':')?;
    let (path, trail) = rest.rsplit_once(':')?;
    let lead = parse_index(lead)?;
    let trail = parse_index(trail.trim_end())?;
    if lead != trail || path.is_empty() {
        return None;
    }
    Some((list, path))
}

pub fn render(store: &FileListStore, results: &SearchResultSet) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# kgp state saved {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    for (list, files) in store.iter() {
        let _ = writeln!(out, "{LIST_TAG}{list}");
        let tag = if list == PRIMARY {
            FILE_TAG.to_string()
        } else {
            format!("{FILE_TAG}{list}")
        };
        for (idx, path) in files.entries().iter().enumerate() {
            let _ = writeln!(out, "{tag}: {idx}:{path}:{idx}");
            if list != PRIMARY {
                continue;
            }
            if let Some(group) = results.get(idx) {
                for line in group.lines() {
                    let _ = writeln!(
                        out,
                        "{RESULT_TAG}{}{}{}",
                        line.line_number,
                        line.separator(),
                        line.rendered
                    );
                }
            }
        }
    }
    out
}

/// Write the state file atomically: temp file beside it, then rename.
pub fn save(path: &Path, store: &FileListStore, results: &SearchResultSet) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to open temp file in {}", dir.display()))?;
    tmp.write_all(render(store, results).as_bytes())
        .context("Failed to write state")?;
    tmp.as_file().sync_all().context("Failed to sync state")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to save state to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileRef;
    use std::path::PathBuf;

    fn sample() -> (FileListStore, SearchResultSet) {
        let cwd = PathBuf::from("/w");
        let mut store = FileListStore::new();
        let mut results = SearchResultSet::new();
        store
            .create_primary(
                &mut results,
                &[FileRef::Path("a.rs".into()), FileRef::Path("b:c.rs".into())],
                &cwd,
            )
            .unwrap();
        store
            .create_at(2, &[FileRef::Index(1), FileRef::Path("d.rs".into())], &cwd)
            .unwrap();
        results.push(
            0,
            AnnotatedLine {
                line_number: 3,
                context: false,
                rendered: "needle here".into(),
            },
        );
        results.push(
            0,
            AnnotatedLine {
                line_number: 4,
                context: true,
                rendered: "after".into(),
            },
        );
        (store, results)
    }

    #[test]
    fn render_then_parse_keeps_lists_and_results() {
        let (store, results) = sample();
        let state = parse(&render(&store, &results));

        assert_eq!(
            state.store.list(0).unwrap().entries(),
            store.list(0).unwrap().entries()
        );
        assert_eq!(
            state.store.list(2).unwrap().entries(),
            &["/w/b:c.rs", "/w/d.rs"]
        );
        assert!(!state.store.list_exists(1));
        assert_eq!(state.results.get(0), results.get(0));
        assert_eq!(state.results.tally(1), 0);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let content = "garbage\nKGPFILE: 0:/a:1\nKGPRESULT: 1:orphan\nKGPFILE: 0:/b:0\nKGPFILEx: 0:/c:0\n";
        let state = parse(content);
        assert_eq!(state.store.list(0).unwrap().entries(), &["/b"]);
        assert!(state.results.is_empty());
    }

    #[test]
    fn oversized_list_indices_are_skipped() {
        let content = "KGPLIST: 18446744073709551615\n\
                       KGPFILE: 0:/a:0\n\
                       KGPFILE99999999999999: 0:/big:0\n\
                       KGPLIST: 99999999999999999999\n\
                       KGPFILE2: 0:/b:0\n";
        let state = parse(content);
        assert_eq!(state.store.summaries().unwrap(), vec![(0, 1), (2, 1)]);
        assert_eq!(state.store.list(2).unwrap().entries(), &["/b"]);
    }

    #[test]
    fn empty_lists_survive_via_marker() {
        let mut store = FileListStore::new();
        store.insert_list(4, FileList::default()).unwrap();
        let state = parse(&render(&store, &SearchResultSet::new()));
        assert!(state.store.list_exists(4));
        assert!(state.store.list(4).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_empty_state() {
        let tmp = tempfile::tempdir().unwrap();
        let state = load(&tmp.path().join("absent")).unwrap();
        assert!(state.store.summaries().is_err());
    }

    #[test]
    fn save_writes_and_load_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state");
        let (store, results) = sample();
        save(&path, &store, &results).unwrap();
        let state = load(&path).unwrap();
        assert_eq!(state.store.summaries().unwrap(), vec![(0, 2), (2, 2)]);
        assert_eq!(state.results.tally(0), 2);
    }
}
