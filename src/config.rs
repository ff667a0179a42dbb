//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Grace delay after the agent answers before the mic is muted
pub const DEFAULT_AUTO_MUTE_DELAY: Duration = Duration::from_millis(4000);

/// Detection sensitivity handed to the keyword engine
pub const DEFAULT_SENSITIVITY: f32 = 0.5;

/// Wake word settings; absent when no keyword model is configured
#[derive(Debug, Clone, PartialEq)]
pub struct WakeWordConfig {
    /// Keyword model the client-side engine loads
    pub keyword_path: PathBuf,

    /// Detection sensitivity (0.0 - 1.0)
    pub sensitivity: f32,

    /// Whether wake word mode starts enabled
    pub default_enabled: bool,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Grace delay before auto-mute
    pub auto_mute_delay: Duration,

    /// Wake word subsystem; `None` disables it entirely
    pub wake_word: Option<WakeWordConfig>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("wakeword-bridge");

        let socket_path = lookup("WAKEWORD_SOCKET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("bridge.sock"));

        let auto_mute_delay = match lookup("WAKEWORD_AUTO_MUTE_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("invalid WAKEWORD_AUTO_MUTE_DELAY_MS: {raw}"))?,
            ),
            None => DEFAULT_AUTO_MUTE_DELAY,
        };

        let wake_word = match lookup("WAKEWORD_KEYWORD_PATH") {
            Some(path) if !path.trim().is_empty() => Some(WakeWordConfig {
                keyword_path: PathBuf::from(path.trim()),
                sensitivity: parse_sensitivity(lookup("WAKEWORD_SENSITIVITY"))?,
                default_enabled: parse_flag(lookup("WAKEWORD_DEFAULT_ENABLED"))?,
            }),
            _ => None,
        };

        Ok(Self {
            socket_path,
            data_dir,
            auto_mute_delay,
            wake_word,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

fn parse_sensitivity(raw: Option<String>) -> Result<f32> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_SENSITIVITY);
    };
    let value: f32 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid WAKEWORD_SENSITIVITY: {raw}"))?;
    if !(0.0..=1.0).contains(&value) {
        bail!("WAKEWORD_SENSITIVITY must be between 0.0 and 1.0, got {value}");
    }
    Ok(value)
}

fn parse_flag(raw: Option<String>) -> Result<bool> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => bail!("invalid WAKEWORD_DEFAULT_ENABLED: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[("HOME", "/home/cal")]).unwrap();
        assert_eq!(
            config.socket_path,
            PathBuf::from("/home/cal/.local/share/wakeword-bridge/bridge.sock")
        );
        assert_eq!(config.auto_mute_delay, DEFAULT_AUTO_MUTE_DELAY);
        assert!(config.wake_word.is_none());
    }

    #[test]
    fn test_wake_word_config() {
        let config = load(&[
            ("HOME", "/home/cal"),
            ("WAKEWORD_KEYWORD_PATH", "/models/hey_cal.ppn"),
            ("WAKEWORD_SENSITIVITY", "0.7"),
            ("WAKEWORD_DEFAULT_ENABLED", "true"),
            ("WAKEWORD_AUTO_MUTE_DELAY_MS", "2500"),
        ])
        .unwrap();

        let wake_word = config.wake_word.unwrap();
        assert_eq!(wake_word.keyword_path, PathBuf::from("/models/hey_cal.ppn"));
        assert_eq!(wake_word.sensitivity, 0.7);
        assert!(wake_word.default_enabled);
        assert_eq!(config.auto_mute_delay, Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("HOME", "/h"), ("WAKEWORD_AUTO_MUTE_DELAY_MS", "soon")]).is_err());
        assert!(load(&[
            ("HOME", "/h"),
            ("WAKEWORD_KEYWORD_PATH", "/m.ppn"),
            ("WAKEWORD_SENSITIVITY", "1.5"),
        ])
        .is_err());
        assert!(load(&[
            ("HOME", "/h"),
            ("WAKEWORD_KEYWORD_PATH", "/m.ppn"),
            ("WAKEWORD_DEFAULT_ENABLED", "maybe"),
        ])
        .is_err());
        assert!(load(&[]).is_err());
    }
}
