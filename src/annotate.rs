//! Groups raw grep output by file, numbering each file into list 0 and
//! keeping its highlighted lines for later redisplay.
//!
//! A single forward scan: state is the current file, its index, and the
//! running tally. A change of path always opens a new group.

use crate::display;
use crate::results::{AnnotatedLine, SearchResultSet};
use crate::store::{absolutize, FileListStore, PRIMARY};
use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

lazy_static! {
    static ref MATCH_RE: Regex = Regex::new(r"^(.+?):(\d+):(.*)$").unwrap();
    static ref CONTEXT_RE: Regex = Regex::new(r"^(.+?)-(\d+)-(.*)$").unwrap();
    static ref BINARY_RE: Regex =
        Regex::new(r"^(?:grep: )?(?:Binary file .+ matches|.+: binary file matches)$").unwrap();
}

/// Applies highlight terms in the order given; where matches overlap, the
/// later term wins.
#[derive(Debug)]
pub struct Highlighter {
    terms: Vec<Regex>,
}

impl Highlighter {
    /// Terms that are not valid regexes are matched literally.
    pub fn new(terms: &[String]) -> Self {
        let terms = terms
            .iter()
            .filter(|t| !t.is_empty())
            .filter_map(|t| Regex::new(t).or_else(|_| Regex::new(&regex::escape(t))).ok())
            .collect();
        Self { terms }
    }

    /// Split `text` into runs, each tagged with the term that owns it.
    pub fn segments<'t>(&self, text: &'t str) -> Vec<(&'t str, Option<usize>)> {
        let mut owner: Vec<Option<usize>> = vec![None; text.len()];
        for (term_idx, re) in self.terms.iter().enumerate() {
            for m in re.find_iter(text) {
                for slot in &mut owner[m.range()] {
                    *slot = Some(term_idx);
                }
            }
        }

        let mut segments = Vec::new();
        let mut start = 0;
        for pos in 1..=text.len() {
            if pos == text.len() || (owner[pos] != owner[start] && text.is_char_boundary(pos)) {
                if start < pos {
                    segments.push((&text[start..pos], owner[start]));
                }
                start = pos;
            }
        }
        segments
    }

    pub fn render(&self, text: &str) -> String {
        self.segments(text)
            .into_iter()
            .map(|(run, term)| match term {
                Some(idx) => display::term(run, idx).to_string(),
                None => run.to_string(),
            })
            .collect()
    }
}

/// One parsed line of grep output.
#[derive(Debug, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub path: &'a str,
    pub line_number: u64,
    pub context: bool,
    pub text: &'a str,
}

/// Parse `path:N:text`, `path-N-text`, or the `--null` form `path\0N:text`.
/// `current` is tried as a literal prefix first so paths containing
/// separators stay intact.
pub fn parse_line<'a>(line: &'a str, current: Option<&str>) -> Option<RawLine<'a>> {
    if let Some((path, rest)) = line.split_once('\0') {
        return parse_tail(rest).map(|(line_number, context, text)| RawLine {
            path,
            line_number,
            context,
            text,
        });
    }

    if let Some(cur) = current {
        if let Some(rest) = line.strip_prefix(cur) {
            let mut chars = rest.chars();
            if let Some(sep @ (':' | '-')) = chars.next() {
                if let Some((line_number, context, text)) = parse_tail(chars.as_str()) {
                    if context == (sep == '-') {
                        return Some(RawLine {
                            path: &line[..cur.len()],
                            line_number,
                            context,
                            text,
                        });
                    }
                }
            }
        }
    }

    let as_match = MATCH_RE.captures(line);
    let as_context = CONTEXT_RE.captures(line);
    let (caps, context) = match (as_match, as_context) {
        (Some(m), Some(c)) => {
            // The earlier separator is the real one.
            if c.get(1)?.end() < m.get(1)?.end() {
                (c, true)
            } else {
                (m, false)
            }
        }
        (Some(m), None) => (m, false),
        (None, Some(c)) => (c, true),
        (None, None) => return None,
    };
    Some(RawLine {
        path: caps.get(1)?.as_str(),
        line_number: caps.get(2)?.as_str().parse().ok()?,
        context,
        text: caps.get(3)?.as_str(),
    })
}

/// `N:text` (match) or `N-text` (context), as `(N, is_context, text)`.
pub fn parse_tail(rest: &str) -> Option<(u64, bool, &str)> {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let line_number = rest[..digits].parse().ok()?;
    let tail = &rest[digits..];
    if let Some(text) = tail.strip_prefix(':') {
        Some((line_number, false, text))
    } else {
        tail.strip_prefix('-').map(|text| (line_number, true, text))
    }
}

pub fn is_passover(line: &str) -> bool {
    line.trim().is_empty() || line == "--" || BINARY_RE.is_match(line)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AnnotateSummary {
    pub files: usize,
    pub lines: usize,
}

pub struct Annotator<'a> {
    highlighter: Highlighter,
    cwd: &'a Path,
    pace: Duration,
}

impl<'a> Annotator<'a> {
    pub fn new(terms: &[String], cwd: &'a Path) -> Self {
        Self {
            highlighter: Highlighter::new(terms),
            cwd,
            pace: Duration::ZERO,
        }
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Replace list 0 and `results` with the grouped contents of `raw`,
    /// echoing headers and lines to `out` as they are stored.
    pub fn annotate(
        &self,
        raw: &str,
        store: &mut FileListStore,
        results: &mut SearchResultSet,
        out: &mut dyn Write,
    ) -> Result<AnnotateSummary> {
        results.clear();
        store.reset_primary();

        let mut summary = AnnotateSummary::default();
        let mut current: Option<(&str, usize)> = None;

        for line in raw.lines() {
            if is_passover(line) {
                continue;
            }
            let Some(parsed) = parse_line(line, current.map(|(p, _)| p)) else {
                continue;
            };

            let file_idx = match current {
                Some((path, idx)) if path == parsed.path => idx,
                _ => {
                    let idx = store.list(PRIMARY)?.len();
                    store.set_entry(PRIMARY, idx, absolutize(parsed.path, self.cwd))?;
                    store.clear_trailing_whitespace(PRIMARY, idx)?;
                    let stored = store.list(PRIMARY)?.get(idx).unwrap_or_default();
                    writeln!(out, "{}", display::file_header(idx, stored))?;
                    current = Some((parsed.path, idx));
                    summary.files += 1;
                    idx
                }
            };

            let annotated = AnnotatedLine {
                line_number: parsed.line_number,
                context: parsed.context,
                rendered: self.highlighter.render(parsed.text),
            };
            writeln!(out, "{}", display::result_line(&annotated))?;
            results.push(file_idx, annotated);
            summary.lines += 1;

            if !self.pace.is_zero() {
                std::thread::sleep(self.pace);
            }
        }

        if summary.files == 0 {
            writeln!(out, "{}", display::notice("no files found"))?;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::strip_ansi;
    use std::path::PathBuf;

    fn terms(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_match_and_context_lines() {
        assert_eq!(
            parse_line("src/a.rs:12:let x = 1;", None),
            Some(RawLine {
                path: "src/a.rs",
                line_number: 12,
                context: false,
                text: "let x = 1;"
            })
        );
        let ctx = parse_line("src/a.rs-11-// note: 3:4", None).unwrap();
        assert_eq!(ctx.path, "src/a.rs");
        assert!(ctx.context);
        assert_eq!(ctx.text, "// note: 3:4");
    }

    #[test]
    fn parse_prefers_known_current_path() {
        let parsed = parse_line("my-1-file.rs:4:x", Some("my-1-file.rs")).unwrap();
        assert_eq!(parsed.path, "my-1-file.rs");
        assert_eq!(parsed.line_number, 4);
        assert!(!parsed.context);
    }

    #[test]
    fn parse_null_separated_output() {
        let parsed = parse_line("weird:1:name.rs\07-ctx", None).unwrap();
        assert_eq!(parsed.path, "weird:1:name.rs");
        assert_eq!(parsed.line_number, 7);
        assert!(parsed.context);
    }

    #[test]
    fn separators_and_binary_notices_are_passed_over() {
        assert!(is_passover("--"));
        assert!(is_passover("Binary file img.png matches"));
        assert!(is_passover("grep: img.png: binary file matches"));
        assert!(!is_passover("a.rs:1:--"));
    }

    #[test]
    fn later_terms_overwrite_earlier_overlaps() {
        let hl = Highlighter::new(&terms(&["foobar", "bar"]));
        assert_eq!(
            hl.segments("xfoobarx"),
            vec![("x", None), ("foo", Some(0)), ("bar", Some(1)), ("x", None)]
        );
    }

    #[test]
    fn invalid_regex_terms_match_literally() {
        let hl = Highlighter::new(&terms(&["a(b"]));
        assert_eq!(hl.segments("xa(b"), vec![("x", None), ("a(b", Some(0))]);
    }

    #[test]
    fn segments_respect_multibyte_text() {
        let hl = Highlighter::new(&terms(&["é"]));
        assert_eq!(
            hl.segments("café!"),
            vec![("caf", None), ("é", Some(0)), ("!", None)]
        );
    }

    #[test]
    fn groups_two_files_with_tallies() {
        colored::control::set_override(true);
        let raw = "a.rs:1:needle one\na.rs:5:needle two\n--\nb.rs:2:needle three\nb.rs:9:a needle\n";
        let cwd = PathBuf::from("/proj");
        let mut store = FileListStore::new();
        let mut results = SearchResultSet::new();
        let mut out = Vec::new();

        let summary = Annotator::new(&terms(&["needle"]), &cwd)
            .annotate(raw, &mut store, &mut results, &mut out)
            .unwrap();

        assert_eq!(summary, AnnotateSummary { files: 2, lines: 4 });
        assert_eq!(store.list(0).unwrap().entries(), &["/proj/a.rs", "/proj/b.rs"]);
        assert_eq!(results.tally(0), 2);
        assert_eq!(results.tally(1), 2);

        let marker = display::term("needle", 0).to_string();
        for idx in 0..2 {
            for line in results.get(idx).unwrap().lines() {
                assert!(line.rendered.contains(&marker));
            }
        }

        let echoed = strip_ansi(&String::from_utf8(out).unwrap());
        assert!(echoed.contains("   0 /proj/a.rs"));
        assert!(echoed.contains("   1 /proj/b.rs"));
    }

    #[test]
    fn empty_output_reports_no_files() {
        let cwd = PathBuf::from("/proj");
        let mut store = FileListStore::new();
        let mut results = SearchResultSet::new();
        let mut out = Vec::new();

        let summary = Annotator::new(&terms(&["xyzzy"]), &cwd)
            .annotate("", &mut store, &mut results, &mut out)
            .unwrap();

        assert_eq!(summary.files, 0);
        assert!(store.list(0).unwrap().is_empty());
        assert!(results.is_empty());
        assert!(String::from_utf8(out).unwrap().contains("no files found"));
    }

    #[test]
    fn reappearing_path_opens_new_group() {
        let cwd = PathBuf::from("/p");
        let mut store = FileListStore::new();
        let mut results = SearchResultSet::new();
        let raw = "a:1:x\nb:1:x\na:2:x\n";
        Annotator::new(&terms(&["x"]), &cwd)
            .annotate(raw, &mut store, &mut results, &mut Vec::new())
            .unwrap();
        assert_eq!(store.list(0).unwrap().len(), 3);
    }
}
