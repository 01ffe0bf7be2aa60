//! Session constants: a small key/value table the user can change at runtime.

use crate::config::Config;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("unknown constant '{0}'")]
    UnknownKey(String),
    #[error("{key} takes a number, got '{value}'")]
    NotNumeric { key: &'static str, value: String },
    #[error("{key} must be finite")]
    Infinite { key: &'static str },
    #[error("{key} must be a non-negative whole number, got '{value}'")]
    NotWhole { key: &'static str, value: String },
    #[error("{key} is a flag: use 0 or 1")]
    NotFlag { key: &'static str },
    #[error("delimiter must be a single non-space character")]
    BadDelimiter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constants {
    pub context: usize,
    pub pace_ms: u64,
    pub progress: bool,
    pub delimiter: char,
    pub history: usize,
    pub columns: usize,
}

impl Default for Constants {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub const KEYS: [&str; 6] = ["context", "pace", "progress", "delimiter", "history", "columns"];

impl Constants {
    pub fn from_config(config: &Config) -> Self {
        Self {
            context: config.search.context_lines,
            pace_ms: config.display.pace_ms,
            progress: config.display.progress,
            delimiter: config.search.delimiter,
            history: config.session.history_depth,
            columns: config.display.columns,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Rejected> {
        match key {
            "context" => self.context = whole("context", value)? as usize,
            "pace" => self.pace_ms = whole("pace", value)?,
            "history" => self.history = whole("history", value)? as usize,
            "columns" => self.columns = whole("columns", value)?.max(1) as usize,
            "progress" => {
                self.progress = match value {
                    "0" => false,
                    "1" => true,
                    _ => return Err(Rejected::NotFlag { key: "progress" }),
                }
            }
            "delimiter" => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_whitespace() => self.delimiter = c,
                    _ => return Err(Rejected::BadDelimiter),
                }
            }
            other => return Err(Rejected::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        Some(match key {
            "context" => self.context.to_string(),
            "pace" => self.pace_ms.to_string(),
            "progress" => u8::from(self.progress).to_string(),
            "delimiter" => self.delimiter.to_string(),
            "history" => self.history.to_string(),
            "columns" => self.columns.to_string(),
            _ => return None,
        })
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

impl fmt::Display for Constants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in KEYS {
            writeln!(f, "{:<10} {}", key, self.get(key).unwrap_or_default())?;
        }
        Ok(())
    }
}

fn whole(key: &'static str, value: &str) -> Result<u64, Rejected> {
    let n: f64 = value.trim().parse().map_err(|_| Rejected::NotNumeric {
        key,
        value: value.to_string(),
    })?;
    if !n.is_finite() {
        return Err(Rejected::Infinite { key });
    }
    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(Rejected::NotWhole {
            key,
            value: value.to_string(),
        });
    }
    Ok(n as u64)
}
