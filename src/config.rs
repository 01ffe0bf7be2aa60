use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Lines of context around each match (`grep -C`).
    pub context_lines: usize,
    /// Groups several words into one argument: `"fn main"`.
    pub delimiter: char,
    pub tool: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            context_lines: 0,
            delimiter: '"',
            tool: "grep".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub colors: bool,
    pub columns: usize,
    /// Delay between echoed search lines, in milliseconds.
    pub pace_ms: u64,
    /// Print a waiting indicator while a search runs.
    pub progress: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            columns: 4,
            pace_ms: 0,
            progress: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    pub history_depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: 500,
            editor: None,
            state_file: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = get_config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> Result<()> {
        let path = get_config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn create_default() -> Result<PathBuf> {
        let config = Config::default();
        config.save()?;
        get_config_path()
    }

    /// Editor command: config, then `$VISUAL`, `$EDITOR`, finally `vim`.
    pub fn editor(&self) -> String {
        self.session
            .editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "vim".into())
    }

    pub fn state_path(&self) -> PathBuf {
        self.session.state_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".kgp_state")
        })
    }
}

fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(config_dir.join("kgp").join("config.toml"))
}

pub fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kgp_history"))
}

pub fn show_config(out: &mut dyn std::io::Write) -> Result<()> {
    let path = get_config_path()?;
    writeln!(out, "Config: {}", path.display())?;
    writeln!(out)?;

    if path.exists() {
        let config = Config::load()?;
        writeln!(out, "{}", toml::to_string_pretty(&config)?)?;
    } else {
        writeln!(out, "(default config, file not created)")?;
        writeln!(out)?;
        let config = Config::default();
        writeln!(out, "{}", toml::to_string_pretty(&config)?)?;
    }

    Ok(())
}
