//! Fixed colour scheme for lists, files, numbers and errors.

use crate::results::AnnotatedLine;
use colored::{ColoredString, Colorize};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ANSI_RE: Regex = Regex::new(r"\x1b\[[0-9;]*m").unwrap();
}

/// Colour per highlight term, cycled by the term's position.
const TERM_COLORS: [colored::Color; 6] = [
    colored::Color::Red,
    colored::Color::Green,
    colored::Color::Yellow,
    colored::Color::Blue,
    colored::Color::Magenta,
    colored::Color::Cyan,
];

pub fn init_colors(enabled: bool) {
    if !enabled {
        colored::control::set_override(false);
    }
}

pub fn list_label(list: usize) -> ColoredString {
    if list == 0 {
        "list 0 (primary)".bright_blue().bold()
    } else {
        format!("list {}", list).bright_blue().bold()
    }
}

pub fn index(idx: usize) -> ColoredString {
    format!("{:>4}", idx).yellow()
}

pub fn path(p: &str) -> ColoredString {
    p.cyan()
}

pub fn count(n: usize) -> ColoredString {
    n.to_string().bold()
}

pub fn term(text: &str, term_idx: usize) -> ColoredString {
    text.color(TERM_COLORS[term_idx % TERM_COLORS.len()]).bold()
}

pub fn error(msg: impl std::fmt::Display) -> String {
    format!("{} {}", "error:".red().bold(), msg)
}

pub fn notice(msg: &str) -> ColoredString {
    msg.dimmed()
}

/// Header opening a file group in search output.
pub fn file_header(idx: usize, p: &str) -> String {
    format!("{} {}", index(idx), path(p))
}

pub fn result_line(line: &AnnotatedLine) -> String {
    format!(
        "  {}{} {}",
        format!("{:>6}", line.line_number).green(),
        line.separator(),
        line.rendered
    )
}

/// Lay `cells` out in `columns` left-aligned columns.
pub fn columns(cells: &[String], columns: usize) -> String {
    let columns = columns.max(1);
    let width = cells
        .iter()
        .map(|c| strip_ansi(c).chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for row in cells.chunks(columns) {
        let last = row.len() - 1;
        for (i, cell) in row.iter().enumerate() {
            out.push_str(cell);
            if i < last {
                let pad = width - strip_ansi(cell).chars().count() + 2;
                out.push_str(&" ".repeat(pad));
            }
        }
        out.push('\n');
    }
    out
}

pub fn strip_ansi(s: &str) -> String {
    ANSI_RE.replace_all(s, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[1;31mfoo\x1b[0m bar"), "foo bar");
    }

    #[test]
    fn result_line_keeps_match_separator() {
        let line = AnnotatedLine {
            line_number: 12,
            context: false,
            rendered: "let x = 1;".into(),
        };
        assert_eq!(strip_ansi(&result_line(&line)), "      12: let x = 1;");
    }

    #[test]
    fn result_line_marks_context_with_dash() {
        let line = AnnotatedLine {
            line_number: 3,
            context: true,
            rendered: "ctx".into(),
        };
        assert!(strip_ansi(&result_line(&line)).contains("3- ctx"));
    }

    #[test]
    fn columns_wraps_rows() {
        let cells: Vec<String> = ["a", "bb", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(columns(&cells, 2), "a   bb\nc\n");
    }
}
