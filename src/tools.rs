//! External processes: grep, find, ls, the editor and the host shell.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use walkdir::WalkDir;

const PROGRESS_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub tool: String,
    pub terms: Vec<String>,
    /// Files or directories to search; empty means the working directory.
    pub paths: Vec<String>,
    pub context: usize,
}

impl SearchRequest {
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-n".into(), "-H".into(), "-E".into(), "--null".into()];
        if self.paths.is_empty() {
            args.push("-r".into());
        }
        if self.context > 0 {
            args.push("-C".into());
            args.push(self.context.to_string());
        }
        for term in &self.terms {
            args.push("-e".into());
            args.push(term.clone());
        }
        args.push("--".into());
        if self.paths.is_empty() {
            args.push(".".into());
        } else {
            args.extend(self.paths.iter().cloned());
        }
        args
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Raw grep stdout; empty when nothing matched.
    Output(String),
    /// grep reported an error and produced no output.
    Failed(String),
}

pub fn run_search(req: &SearchRequest, verbose: u8) -> Result<SearchOutcome> {
    let args = req.args();
    if verbose > 0 {
        eprintln!("{} {}", req.tool, args.join(" "));
    }

    let output = Command::new(&req.tool)
        .args(&args)
        .output()
        .with_context(|| format!("Failed to run {}", req.tool))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);

    // Exit 1 is "no matches"; exit 2 with partial output (unreadable files) still counts.
    if output.status.code() == Some(2) {
        if stdout.trim().is_empty() {
            return Ok(SearchOutcome::Failed(stderr.trim().to_string()));
        }
        if verbose > 0 {
            eprintln!("{}: {}", req.tool, stderr.trim());
        }
    }
    Ok(SearchOutcome::Output(stdout))
}

/// Run the search on a worker thread. The worker only returns a value.
pub fn spawn_search(req: SearchRequest, verbose: u8) -> Receiver<Result<SearchOutcome>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(run_search(&req, verbose));
    });
    rx
}

/// Block until the worker reports, printing a dot per tick when `progress`.
pub fn wait_for<T>(rx: Receiver<Result<T>>, progress: bool, out: &mut dyn Write) -> Result<T> {
    let mut dots = false;
    loop {
        match rx.recv_timeout(PROGRESS_TICK) {
            Ok(result) => {
                if dots {
                    writeln!(out)?;
                }
                return result;
            }
            Err(RecvTimeoutError::Timeout) => {
                if progress {
                    write!(out, ".")?;
                    out.flush()?;
                    dots = true;
                }
            }
            Err(RecvTimeoutError::Disconnected) => bail!("search worker exited without a result"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindFilter {
    /// Case-insensitive name fragments.
    Name(Vec<String>),
    /// File extensions, without the dot.
    Extension(Vec<String>),
}

impl FindFilter {
    fn find_args(&self) -> Vec<String> {
        let (flag, patterns): (&str, Vec<String>) = match self {
            FindFilter::Name(names) => ("-iname", names.iter().map(|n| format!("*{}*", n)).collect()),
            FindFilter::Extension(exts) => (
                "-name",
                exts.iter()
                    .map(|e| format!("*.{}", e.trim_start_matches('.')))
                    .collect(),
            ),
        };

        let mut args: Vec<String> = vec![".".into(), "-type".into(), "f".into(), "(".into()];
        for (i, pattern) in patterns.into_iter().enumerate() {
            if i > 0 {
                args.push("-o".into());
            }
            args.push(flag.into());
            args.push(pattern);
        }
        args.push(")".into());
        args
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            FindFilter::Name(names) => {
                let lower = file_name.to_lowercase();
                names.iter().any(|n| lower.contains(&n.to_lowercase()))
            }
            FindFilter::Extension(exts) => exts.iter().any(|e| {
                let ext = e.trim_start_matches('.');
                Path::new(file_name)
                    .extension()
                    .is_some_and(|actual| actual == ext)
            }),
        }
    }
}

/// Files under the working directory matching `filter`, sorted. Falls back to
/// an in-process walk when `find` cannot be spawned.
pub fn run_find(filter: &FindFilter, verbose: u8) -> Result<Vec<String>> {
    let args = filter.find_args();
    if verbose > 0 {
        eprintln!("find {}", args.join(" "));
    }

    let mut files = match Command::new("find").args(&args).output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            if verbose > 0 {
                eprintln!("find unavailable ({}), walking directory", e);
            }
            walk(filter)
        }
    };
    files.sort();
    Ok(files)
}

fn walk(filter: &FindFilter) -> Vec<String> {
    WalkDir::new(".")
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| filter.matches(&e.file_name().to_string_lossy()))
        .map(|e| e.path().to_string_lossy().into_owned())
        .collect()
}

/// Open `files` in the editor, jumping to `line` in the first one.
pub fn run_editor(editor: &str, files: &[String], line: Option<u64>, verbose: u8) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("no editor configured");
    };
    let mut cmd = Command::new(program);
    cmd.args(parts);
    if let Some(n) = line {
        cmd.arg(format!("+{}", n));
    }
    cmd.args(files);

    if verbose > 0 {
        eprintln!("{:?}", cmd);
    }
    let status = cmd
        .status()
        .with_context(|| format!("Failed to run {}", program))?;
    if !status.success() && verbose > 0 {
        eprintln!("{} exited with {}", program, status);
    }
    Ok(())
}

pub fn run_ls(args: &[String], verbose: u8) -> Result<()> {
    if verbose > 0 {
        eprintln!("ls {}", args.join(" "));
    }
    Command::new("ls")
        .args(args)
        .status()
        .context("Failed to run ls")?;
    Ok(())
}

/// Hand an unrecognised line to the host shell.
/// Single-quote `word` for `sh` unless it is made only of safe characters.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,+@%".contains(&b));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

pub fn run_shell(line: &str, verbose: u8) -> Result<()> {
    if verbose > 0 {
        eprintln!("sh -c {:?}", line);
    }
    let status = Command::new("sh")
        .arg("-c")
        .arg(line)
        .status()
        .context("Failed to run sh")?;
    if !status.success() && verbose > 0 {
        eprintln!("exit status {}", status);
    }
    Ok(())
}
