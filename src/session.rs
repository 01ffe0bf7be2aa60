//! Session context and command dispatch.
//!
//! A session owns the file lists, the annotated search results and the
//! constants table. Each command runs to completion before the next is read.

use crate::annotate::Annotator;
use crate::args::{self, file_refs, list_index, require};
use crate::config::{self, Config};
use crate::constants::Constants;
use crate::display;
use crate::error::{ShellError, ValidRange};
use crate::results::SearchResultSet;
use crate::store::{absolutize, parse_index, FileListStore, FileRef, PRIMARY};
use crate::tools::{self, FindFilter, SearchOutcome, SearchRequest};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Search,
    SearchList,
    Find,
    FileType,
    FileList,
    FileListAdd,
    FileListRemove,
    FileListCreate,
    FileListMatch,
    FileSpecific,
    UseNonPrimary,
    Edit,
    Ls,
    Cd,
    Pwd,
    Constants,
    Config,
    Help,
    Quit,
}

/// Aliases, verb, usage.
const VERBS: &[(&[&str], Verb, &str)] = &[
    (&["s", "search"], Verb::Search, "<terms...>       grep under the cwd; matching files become list 0"),
    (&["sl", "searchlist"], Verb::SearchList, "<L> <terms...>   grep only the files of list L"),
    (&["f", "find"], Verb::Find, "<names...>       files whose name contains any fragment become list 0"),
    (&["ft", "filetype"], Verb::FileType, "<ext...>         files with one of the extensions become list 0"),
    (&["fl", "filelist"], Verb::FileList, "[L]              show all lists, or the files of list L"),
    (&["fa", "filelistadd"], Verb::FileListAdd, "<L> <files...>   append paths or list-0 indices to list L"),
    (&["fr", "filelistremove"], Verb::FileListRemove, "<L> <idx...>     remove positions from list L"),
    (&["fc", "filelistcreate"], Verb::FileListCreate, "<L> [files...]   (re)create list L from paths or list-0 indices"),
    (&["fm", "filelistmatch"], Verb::FileListMatch, "<L> <pattern>    files of list L whose path matches"),
    (&["fs", "filespecific"], Verb::FileSpecific, "<idx...>         redisplay stored search lines for list-0 files"),
    (&["us", "usenonprimary"], Verb::UseNonPrimary, "<L>              swap list L with list 0"),
    (&["v", "vim", "e", "edit"], Verb::Edit, "<files...>       open files (list-0 indices jump to the first hit)"),
    (&["ls"], Verb::Ls, "[args...]        ls; list-0 indices expand to paths"),
    (&["cd"], Verb::Cd, "[dir|idx]        change directory; an index enters that file's directory"),
    (&["pwd"], Verb::Pwd, "                 print the working directory"),
    (&["constants"], Verb::Constants, "[key [value]]    show or set session constants"),
    (&["config"], Verb::Config, "[init]           show or write the config file"),
    (&["h", "help"], Verb::Help, "                 this table"),
    (&["q", "quit", "exit"], Verb::Quit, "                 leave the shell"),
];

pub fn lookup(word: &str) -> Option<Verb> {
    VERBS
        .iter()
        .find(|(aliases, _, _)| aliases.contains(&word))
        .map(|(_, verb, _)| *verb)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session<W: Write> {
    pub store: FileListStore,
    pub results: SearchResultSet,
    pub constants: Constants,
    config: Config,
    verbose: u8,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(config: Config, verbose: u8, out: W) -> Self {
        Self {
            store: FileListStore::new(),
            results: SearchResultSet::new(),
            constants: Constants::from_config(&config),
            config,
            verbose,
            out,
        }
    }

    pub fn with_state(mut self, store: FileListStore, results: SearchResultSet) -> Self {
        self.store = store;
        self.results = results;
        self
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run one line, reporting any failure and carrying on.
    pub fn run_line(&mut self, line: &str) -> Flow {
        let result = self.execute(line);
        self.report(result)
    }

    pub fn run_words(&mut self, words: &[String]) -> Flow {
        let result = self.execute_words(words);
        self.report(result)
    }

    fn report(&mut self, result: Result<Flow>) -> Flow {
        match result {
            Ok(flow) => flow,
            Err(e) => {
                let _ = writeln!(self.out, "{}", display::error(format!("{:#}", e)));
                Flow::Continue
            }
        }
    }

    pub fn execute(&mut self, line: &str) -> Result<Flow> {
        let tokens = args::tokenize(line);
        let Some(first) = tokens.first() else {
            return Ok(Flow::Continue);
        };
        match lookup(first) {
            Some(verb) => {
                let grouped = args::group(&tokens[1..], self.constants.delimiter)?;
                self.dispatch(verb, &grouped)
            }
            None => {
                tools::run_shell(line.trim(), self.verbose)?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Single-invocation entry: words arrive already split by the caller's shell.
    pub fn execute_words(&mut self, words: &[String]) -> Result<Flow> {
        let Some(first) = words.first() else {
            return Ok(Flow::Continue);
        };
        match lookup(first) {
            Some(verb) => {
                let grouped = args::group(&words[1..], self.constants.delimiter)?;
                self.dispatch(verb, &grouped)
            }
            None => {
                let quoted: Vec<String> = words.iter().map(|w| tools::shell_quote(w)).collect();
                tools::run_shell(&quoted.join(" "), self.verbose)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch(&mut self, verb: Verb, args: &[String]) -> Result<Flow> {
        if self.verbose > 1 {
            eprintln!("{:?} {:?}", verb, args);
        }
        match verb {
            Verb::Search => self.search(args)?,
            Verb::SearchList => self.search_list(args)?,
            Verb::Find => self.find(FindFilter::Name(args.to_vec()), args)?,
            Verb::FileType => self.find(FindFilter::Extension(args.to_vec()), args)?,
            Verb::FileList => self.file_list(args)?,
            Verb::FileListAdd => self.file_list_add(args)?,
            Verb::FileListRemove => self.file_list_remove(args)?,
            Verb::FileListCreate => self.file_list_create(args)?,
            Verb::FileListMatch => self.file_list_match(args)?,
            Verb::FileSpecific => self.file_specific(args)?,
            Verb::UseNonPrimary => self.use_non_primary(args)?,
            Verb::Edit => self.edit(args)?,
            Verb::Ls => self.ls(args)?,
            Verb::Cd => self.cd(args)?,
            Verb::Pwd => writeln!(self.out, "{}", cwd()?.display())?,
            Verb::Constants => self.constants(args)?,
            Verb::Config => self.config(args)?,
            Verb::Help => self.help()?,
            Verb::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    // ── Search ──────────────────────────────────────────────

    fn search(&mut self, args: &[String]) -> Result<()> {
        require(args, 1)?;
        self.run_search(args, Vec::new())
    }

    fn search_list(&mut self, args: &[String]) -> Result<()> {
        require(args, 2)?;
        let list = list_index(&args[0], &self.store)?;
        let paths = self.store.list(list)?.entries().to_vec();
        let terms = &args[1..];
        if paths.is_empty() {
            // Nothing to grep; still replaces list 0 like any search.
            return self.annotate("", terms);
        }
        self.run_search(terms, paths)
    }

    fn run_search(&mut self, terms: &[String], paths: Vec<String>) -> Result<()> {
        let req = SearchRequest {
            tool: self.config.search.tool.clone(),
            terms: terms.to_vec(),
            paths,
            context: self.constants.context,
        };
        let rx = tools::spawn_search(req, self.verbose);
        match tools::wait_for(rx, self.constants.progress, &mut self.out)? {
            SearchOutcome::Failed(msg) => {
                writeln!(self.out, "{}", display::error(msg))?;
                Ok(())
            }
            SearchOutcome::Output(raw) => self.annotate(&raw, terms),
        }
    }

    fn annotate(&mut self, raw: &str, terms: &[String]) -> Result<()> {
        let cwd = cwd()?;
        let summary = Annotator::new(terms, &cwd)
            .with_pace(self.constants.pace())
            .annotate(raw, &mut self.store, &mut self.results, &mut self.out)?;
        if summary.files > 0 {
            writeln!(
                self.out,
                "{} lines in {} files",
                display::count(summary.lines),
                display::count(summary.files)
            )?;
        }
        Ok(())
    }

    fn find(&mut self, filter: FindFilter, args: &[String]) -> Result<()> {
        require(args, 1)?;
        let found = tools::run_find(&filter, self.verbose)?;
        let cwd = cwd()?;

        self.results.clear();
        self.store.reset_primary();
        for (idx, raw) in found.iter().enumerate() {
            self.store.set_entry(PRIMARY, idx, absolutize(raw, &cwd))?;
            let path = self.store.list(PRIMARY)?.get(idx).unwrap_or_default();
            writeln!(self.out, "{}", display::file_header(idx, path))?;
        }
        if found.is_empty() {
            writeln!(self.out, "{}", display::notice("no files found"))?;
        }
        Ok(())
    }

    // ── File lists ──────────────────────────────────────────

    fn file_list(&mut self, args: &[String]) -> Result<()> {
        let Some(arg) = args.first() else {
            let cells: Vec<String> = self
                .store
                .summaries()?
                .into_iter()
                .map(|(list, len)| format!("{}: {}", display::list_label(list), display::count(len)))
                .collect();
            write!(self.out, "{}", display::columns(&cells, self.constants.columns))?;
            return Ok(());
        };

        let list = list_index(arg, &self.store)?;
        let files = self.store.list(list)?;
        writeln!(
            self.out,
            "{} ({} files)",
            display::list_label(list),
            display::count(files.len())
        )?;
        for (idx, path) in files.entries().iter().enumerate() {
            let tally = if list == PRIMARY && !self.results.is_empty() {
                self.results.tally(idx)
            } else {
                0
            };
            if tally > 0 {
                writeln!(
                    self.out,
                    "{} ({} lines)",
                    display::file_header(idx, path),
                    display::count(tally)
                )?;
            } else {
                writeln!(self.out, "{}", display::file_header(idx, path))?;
            }
        }
        Ok(())
    }

    fn file_list_add(&mut self, args: &[String]) -> Result<()> {
        require(args, 2)?;
        let list = list_index(&args[0], &self.store)?;
        let added = self.store.add_to(list, &file_refs(&args[1..]), &cwd()?)?;
        writeln!(
            self.out,
            "added {} to {}",
            display::count(added),
            display::list_label(list)
        )?;
        Ok(())
    }

    fn file_list_remove(&mut self, args: &[String]) -> Result<()> {
        require(args, 2)?;
        let list = list_index(&args[0], &self.store)?;
        let report = self.store.remove_from(list, &args[1..])?;
        for failure in &report.failures {
            writeln!(self.out, "{}", display::error(failure))?;
        }
        writeln!(
            self.out,
            "removed {} from {}",
            display::count(report.removed.len()),
            display::list_label(list)
        )?;
        Ok(())
    }

    fn file_list_create(&mut self, args: &[String]) -> Result<()> {
        require(args, 1)?;
        let list = list_index(&args[0], &self.store)?;
        let refs = file_refs(&args[1..]);
        let cwd = cwd()?;
        if list == PRIMARY {
            self.store.create_primary(&mut self.results, &refs, &cwd)?;
        } else {
            self.store.create_at(list, &refs, &cwd)?;
        }
        writeln!(
            self.out,
            "{} ({} files)",
            display::list_label(list),
            display::count(self.store.list(list)?.len())
        )?;
        Ok(())
    }

    fn file_list_match(&mut self, args: &[String]) -> Result<()> {
        require(args, 2)?;
        let list = list_index(&args[0], &self.store)?;
        if !self.store.contains_path(list, &args[1])? {
            writeln!(
                self.out,
                "{}",
                display::notice(&format!("no path in list {} matches '{}'", list, args[1]))
            )?;
            return Ok(());
        }
        for (idx, path) in self.store.matching_paths(list, &args[1])? {
            writeln!(self.out, "{}", display::file_header(idx, path))?;
        }
        Ok(())
    }

    fn file_specific(&mut self, args: &[String]) -> Result<()> {
        require(args, 1)?;
        let primary = self.store.list(PRIMARY)?;
        for arg in args {
            let idx = parse_index(arg).ok_or_else(|| ShellError::NotAnIndex(arg.clone()))?;
            if !self.store.file_exists(PRIMARY, &[FileRef::Index(idx)]) {
                return Err(ShellError::InvalidFileIndex {
                    given: idx,
                    valid: ValidRange::of_len(primary.len()),
                }
                .into());
            }
            let path = primary.get(idx).unwrap_or_default();
            writeln!(self.out, "{}", display::file_header(idx, path))?;
            match self.results.get(idx) {
                Some(group) => {
                    for line in group.lines() {
                        writeln!(self.out, "{}", display::result_line(line))?;
                    }
                }
                None => writeln!(self.out, "{}", display::notice("  (no stored lines)"))?,
            }
        }
        Ok(())
    }

    fn use_non_primary(&mut self, args: &[String]) -> Result<()> {
        require(args, 1)?;
        let list = list_index(&args[0], &self.store)?;
        self.store.swap_primary(list)?;
        writeln!(
            self.out,
            "swapped {} with {}",
            display::list_label(list),
            display::list_label(PRIMARY)
        )?;
        Ok(())
    }

    // ── Outer commands ──────────────────────────────────────

    /// Numeric args become list-0 paths; anything else passes through.
    fn expand_indices(&self, args: &[String]) -> Result<Vec<String>> {
        args.iter()
            .map(|arg| match FileRef::parse(arg) {
                FileRef::Index(idx) => self
                    .store
                    .list(PRIMARY)
                    .ok()
                    .and_then(|files| files.get(idx))
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::Error::from(ShellError::UnresolvedNumericReference(arg.clone()))),
                FileRef::Path(p) => Ok(p),
            })
            .collect()
    }

    fn edit(&mut self, args: &[String]) -> Result<()> {
        require(args, 1)?;
        let files = self.expand_indices(args)?;
        let jump = match FileRef::parse(&args[0]) {
            FileRef::Index(idx) => self
                .results
                .get(idx)
                .and_then(|group| group.first_match())
                .map(|line| line.line_number),
            FileRef::Path(_) => None,
        };
        tools::run_editor(&self.config.editor(), &files, jump, self.verbose)
    }

    fn ls(&mut self, args: &[String]) -> Result<()> {
        let expanded = self.expand_indices(args)?;
        tools::run_ls(&expanded, self.verbose)
    }

    fn cd(&mut self, args: &[String]) -> Result<()> {
        let target: PathBuf = match args.first() {
            None => dirs::home_dir().context("No home directory")?,
            Some(arg) => match FileRef::parse(arg) {
                FileRef::Index(_) => {
                    let file = self.expand_indices(std::slice::from_ref(arg))?.remove(0);
                    Path::new(&file)
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("/"))
                }
                FileRef::Path(p) => PathBuf::from(p),
            },
        };
        std::env::set_current_dir(&target)
            .with_context(|| format!("Failed to enter {}", target.display()))?;
        writeln!(self.out, "{}", cwd()?.display())?;
        Ok(())
    }

    fn constants(&mut self, args: &[String]) -> Result<()> {
        match args {
            [] => write!(self.out, "{}", self.constants)?,
            [key] => match self.constants.get(key) {
                Some(value) => writeln!(self.out, "{} {}", key, value)?,
                None => writeln!(self.out, "{}", display::error(format!("unknown constant '{}'", key)))?,
            },
            [key, value, ..] => match self.constants.set(key, value) {
                Ok(()) => writeln!(self.out, "{} {}", key, value)?,
                Err(reason) => writeln!(self.out, "{}", display::error(format!("rejected: {}", reason)))?,
            },
        }
        Ok(())
    }

    fn config(&mut self, args: &[String]) -> Result<()> {
        match args.first().map(String::as_str) {
            Some("init") => {
                let path = Config::create_default()?;
                writeln!(self.out, "wrote {}", path.display())?;
            }
            _ => config::show_config(&mut self.out)?,
        }
        Ok(())
    }

    fn help(&mut self) -> Result<()> {
        for (aliases, _, usage) in VERBS {
            writeln!(self.out, "{:<22} {}", aliases.join(", "), usage)?;
        }
        writeln!(self.out, "anything else runs in the host shell")?;
        Ok(())
    }
}

fn cwd() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to read working directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::strip_ansi;

    fn session() -> Session<Vec<u8>> {
        Session::new(Config::default(), 0, Vec::new())
    }

    fn output(s: Session<Vec<u8>>) -> String {
        strip_ansi(&String::from_utf8(s.into_output()).unwrap())
    }

    #[test]
    fn aliases_resolve_to_verbs() {
        assert_eq!(lookup("s"), Some(Verb::Search));
        assert_eq!(lookup("filelistremove"), Some(Verb::FileListRemove));
        assert_eq!(lookup("us"), Some(Verb::UseNonPrimary));
        assert_eq!(lookup("q"), Some(Verb::Quit));
        assert_eq!(lookup("grep"), None);
    }

    #[test]
    fn every_alias_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for (aliases, _, _) in VERBS {
            for alias in *aliases {
                assert!(seen.insert(*alias), "duplicate alias {}", alias);
            }
        }
    }

    #[test]
    fn quit_ends_the_session() {
        let mut s = session();
        assert_eq!(s.execute("quit").unwrap(), Flow::Quit);
        assert_eq!(s.execute("   ").unwrap(), Flow::Continue);
    }

    #[test]
    fn create_and_list_absolute_paths() {
        let mut s = session();
        s.execute("fc 1 /tmp/a.rs /tmp/b.rs").unwrap();
        s.execute("fl 1").unwrap();
        let out = output(s);
        assert!(out.contains("   0 /tmp/a.rs"));
        assert!(out.contains("   1 /tmp/b.rs"));
    }

    #[test]
    fn huge_list_index_is_reported_and_session_continues() {
        let mut s = session();
        assert_eq!(s.run_line("fc 18446744073709551615 /a"), Flow::Continue);
        assert_eq!(s.run_line("fc 99999999999999 x"), Flow::Continue);
        s.run_line("fc 1 /tmp/a.rs");
        s.run_line("fl 1");
        let out = output(s);
        assert!(out.contains("invalid list index 18446744073709551615"), "{}", out);
        assert!(out.contains("invalid list index 99999999999999"), "{}", out);
        assert!(out.contains("   0 /tmp/a.rs"), "{}", out);
    }

    #[test]
    fn filelist_without_lists_is_an_error() {
        let mut s = session();
        let err = s.execute("fl").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ShellError>(),
            Some(&ShellError::NoListsAvailable)
        );
    }

    #[test]
    fn run_line_reports_and_continues() {
        let mut s = session();
        assert_eq!(s.run_line("fa 3 /x"), Flow::Continue);
        assert!(output(s).contains("error:"));
    }

    #[test]
    fn missing_arguments_are_reported() {
        let mut s = session();
        let err = s.execute("fa 0").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ShellError>(),
            Some(&ShellError::MissingArguments {
                required: 2,
                got: 1
            })
        );
    }

    #[test]
    fn unbalanced_delimiter_rejects_command() {
        let mut s = session();
        let err = s.execute("fc 1 \"a b").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShellError>(),
            Some(ShellError::DelimiterImbalance { .. })
        ));
        assert!(!s.store.list_exists(1));
    }

    #[test]
    fn remove_reports_each_bad_index() {
        let mut s = session();
        s.execute("fc 0 /a /b /c").unwrap();
        s.execute("fr 0 9 0").unwrap();
        assert_eq!(s.store.list(0).unwrap().entries(), &["/b", "/c"]);
        let out = output(s);
        assert!(out.contains("invalid file index 9 (valid: 0..=2)"));
        assert!(out.contains("removed 1 from list 0"));
    }

    #[test]
    fn filespecific_replays_stored_lines() {
        let mut s = session();
        s.execute("fc 0 /a").unwrap();
        s.annotate("/a:3:needle\n", &["needle".to_string()]).unwrap();
        let before = output_len(&s);
        s.execute("fs 0").unwrap();
        let out = output(s);
        let replay = &out[before..];
        assert!(replay.contains("   0 /a"));
        assert!(replay.contains("3: needle"));
    }

    fn output_len(s: &Session<Vec<u8>>) -> usize {
        strip_ansi(&String::from_utf8_lossy(&s.out)).len()
    }

    #[test]
    fn constants_reject_bad_values_without_failing() {
        let mut s = session();
        s.execute("constants context lots").unwrap();
        s.execute("constants progress 1").unwrap();
        assert_eq!(s.constants.context, 0);
        assert!(output(s).contains("rejected: context takes a number"));
    }

    #[test]
    fn swap_keeps_stale_results_in_place() {
        let mut s = session();
        s.execute("fc 0 /a").unwrap();
        s.annotate("/a:1:hit\n", &["hit".to_string()]).unwrap();
        s.execute("fc 1 /other").unwrap();
        s.execute("us 1").unwrap();
        // Results are positional and are not invalidated by the swap.
        assert_eq!(s.store.list(0).unwrap().entries(), &["/other"]);
        assert_eq!(s.results.tally(0), 1);
    }

    #[test]
    fn add_to_primary_keeps_results() {
        let mut s = session();
        s.execute("fc 0 /a").unwrap();
        s.annotate("/a:1:hit\n", &["hit".to_string()]).unwrap();
        s.execute("fa 0 /b").unwrap();
        assert_eq!(s.results.tally(0), 1);
        assert_eq!(s.store.list(0).unwrap().len(), 2);
    }

    #[test]
    fn edit_with_unknown_index_is_unresolved() {
        let mut s = session();
        s.execute("fc 0 /a").unwrap();
        let err = s.execute("vim 4").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ShellError>(),
            Some(&ShellError::UnresolvedNumericReference("4".into()))
        );
    }

    #[test]
    fn filelistmatch_prints_matching_entries() {
        let mut s = session();
        s.execute("fc 2 /src/main.rs /src/lib.rs").unwrap();
        s.execute("fm 2 lib").unwrap();
        let out = output(s);
        assert!(out.contains("   1 /src/lib.rs"));
        assert!(!out.contains("   0 /src/main.rs"));
    }

    #[test]
    fn help_lists_every_verb() {
        let mut s = session();
        s.execute("help").unwrap();
        let out = output(s);
        for (aliases, _, _) in VERBS {
            assert!(out.contains(aliases[0]));
        }
    }
}
