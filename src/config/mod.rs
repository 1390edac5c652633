// src/config/mod.rs
//! Runtime configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file
//! (`$SIGNAL_RELAY_CONFIG` or `config/relay.toml`), then environment
//! overrides, then the allow-list file. Values are sanitized last.
//!
//! The allow-list file is `$SIGNAL_ALLOW_LIST_PATH`, else
//! `monitor.allow_list_file`, else the first of `config/allow_list.toml` and
//! `config/allow_list.json` that exists. Its entries join the inline
//! `monitor.allow_list`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::DEFAULT_ACCEPTANCE_THRESHOLD;
use crate::history::{DEFAULT_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY};

pub const ENV_CONFIG_PATH: &str = "SIGNAL_RELAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/relay.toml";
pub const ENV_ALLOW_LIST_PATH: &str = "SIGNAL_ALLOW_LIST_PATH";
const DEFAULT_ALLOW_LIST_PATHS: [&str; 2] = ["config/allow_list.toml", "config/allow_list.json"];

pub const DEFAULT_INTERVAL_MS: u64 = 5_000;
pub const MIN_INTERVAL_MS: u64 = 100;
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 600;
pub const DEFAULT_FORWARD_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub server: ServerConfig,
    pub parser: ParserConfig,
    pub forward: ForwardConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    /// Case-insensitive substrings; a message must contain one to be forwarded.
    /// Empty forwards everything.
    pub allow_list: Vec<String>,
    /// Extra allow-list entries, `.toml` (`entries = [...]`) or `.json` (array).
    pub allow_list_file: Option<PathBuf>,
    pub dedup_window_secs: u64,
    pub sources: Vec<SourceConfig>,
    /// Attach the simulated demo source when no sources are configured.
    pub demo: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            allow_list: Vec::new(),
            allow_list_file: None,
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            sources: Vec::new(),
            demo: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Jsonl,
    Http,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub min_confidence: f32,
    pub max_history_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_ACCEPTANCE_THRESHOLD,
            max_history_size: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: DEFAULT_FORWARD_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub discord_webhook: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl AppConfig {
    /// Full resolution against the real process environment and CWD.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::from_file(&pb)?
            }
            Err(_) => {
                let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
                if pb.exists() {
                    Self::from_file(&pb)?
                } else {
                    Self::default()
                }
            }
        };

        cfg.apply_env_with(|k| std::env::var(k).ok());
        cfg.merge_allow_list_file(std::env::var(ENV_ALLOW_LIST_PATH).ok())?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Apply environment overrides through `lookup`, so tests need not touch
    /// the process environment. Unparseable numbers keep the previous value.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "ignoring unparseable config override");
                    None
                }
            }
        }
        fn non_empty(raw: Option<String>) -> Option<String> {
            raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        if let Some(v) = parsed("MONITOR_INTERVAL", lookup("MONITOR_INTERVAL")) {
            self.monitor.interval_ms = v;
        }
        if let Some(v) = parsed("DEDUP_WINDOW_SECS", lookup("DEDUP_WINDOW_SECS")) {
            self.monitor.dedup_window_secs = v;
        }
        if let Some(v) = non_empty(lookup("DEMO_MODE")) {
            self.monitor.demo = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = non_empty(lookup("LOCAL_SERVER_HOST")) {
            self.server.host = v;
        }
        if let Some(v) = parsed("LOCAL_SERVER_PORT", lookup("LOCAL_SERVER_PORT")) {
            self.server.port = v;
        }
        if let Some(v) = parsed("MIN_CONFIDENCE", lookup("MIN_CONFIDENCE")) {
            self.parser.min_confidence = v;
        }
        if let Some(v) = parsed("MAX_HISTORY_SIZE", lookup("MAX_HISTORY_SIZE")) {
            self.parser.max_history_size = v;
        }
        if let Some(v) = non_empty(lookup("FORWARD_URL")) {
            self.forward.url = Some(v);
        }
        if let Some(v) = non_empty(lookup("DISCORD_WEBHOOK_URL")) {
            self.notify.discord_webhook = Some(v);
        }
        if let Some(v) = non_empty(lookup("LOG_LEVEL")) {
            self.logging.level = v;
        }
        if let Some(v) = non_empty(lookup("LOG_FORMAT")) {
            self.logging.format = if v.eq_ignore_ascii_case("json") {
                LogFormat::Json
            } else {
                LogFormat::Compact
            };
        }
    }

    /// Append entries from the allow-list file, if one is named or present.
    /// A path that is named explicitly must exist.
    pub fn merge_allow_list_file(&mut self, env_path: Option<String>) -> Result<()> {
        let named = env_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.monitor.allow_list_file.clone());
        let path = match named {
            Some(p) if p.exists() => p,
            Some(p) => return Err(anyhow!("allow-list file {} does not exist", p.display())),
            None => match DEFAULT_ALLOW_LIST_PATHS.iter().map(PathBuf::from).find(|p| p.exists()) {
                Some(p) => p,
                None => return Ok(()),
            },
        };
        let entries = read_allow_list(&path)?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "allow-list file merged");
        self.monitor.allow_list.extend(entries);
        Ok(())
    }

    /// Clamp numeric ranges and tidy the allow-list.
    pub fn sanitize(&mut self) {
        let p = &mut self.parser;
        p.min_confidence = if p.min_confidence.is_finite() {
            p.min_confidence.clamp(0.0, 1.0)
        } else {
            DEFAULT_ACCEPTANCE_THRESHOLD
        };
        p.max_history_size = p.max_history_size.clamp(1, MAX_HISTORY_CAPACITY);

        self.monitor.interval_ms = self.monitor.interval_ms.max(MIN_INTERVAL_MS);
        let mut entries: Vec<String> = self
            .monitor
            .allow_list
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        entries.sort();
        entries.dedup();
        self.monitor.allow_list = entries;
        self.forward.timeout_ms = self.forward.timeout_ms.max(1);
    }
}

fn read_allow_list(path: &Path) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct AllowListFile {
        entries: Vec<String>,
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("reading allow-list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("toml") => toml::from_str::<AllowListFile>(&text)
            .map(|f| f.entries)
            .with_context(|| format!("parsing {}", path.display())),
        Some("json") => serde_json::from_str::<Vec<String>>(&text)
            .with_context(|| format!("parsing {}", path.display())),
        _ => Err(anyhow!(
            "allow-list file {} must end in .toml or .json",
            path.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let c = AppConfig::default();
        assert_eq!(c.monitor.interval_ms, 5_000);
        assert_eq!(c.server.port, 3000);
        assert!((c.parser.min_confidence - 0.3).abs() < 1e-6);
        assert_eq!(c.parser.max_history_size, 1000);
        assert_eq!(c.monitor.dedup_window_secs, 600);
        assert!(c.forward.url.is_none());
    }

    #[test]
    fn toml_sections_and_sources_parse() {
        let s = r#"
            [monitor]
            interval_ms = 3000
            allow_list = [" woods ", "eli", "eli", ""]

            [[monitor.sources]]
            id = "spot"
            kind = "jsonl"
            path = "data/spot.jsonl"

            [[monitor.sources]]
            id = "futures"
            kind = "http"
            url = "http://127.0.0.1:9000/messages"
            timeout_ms = 2000

            [parser]
            min_confidence = 7.5
        "#;
        let c = AppConfig::from_toml_str(s).unwrap();
        assert_eq!(c.monitor.interval_ms, 3000);
        assert_eq!(c.monitor.allow_list, vec!["eli".to_string(), "woods".to_string()]);
        assert_eq!(c.monitor.sources.len(), 2);
        assert_eq!(c.monitor.sources[1].kind, SourceKind::Http);
        assert_eq!(c.monitor.sources[1].timeout_ms, Some(2000));
        assert_eq!(c.parser.min_confidence, 1.0);
        // untouched sections keep defaults
        assert_eq!(c.server.port, 3000);
    }

    #[test]
    fn env_overrides_and_bad_numbers() {
        let env: HashMap<&str, &str> = [
            ("MONITOR_INTERVAL", "2500"),
            ("LOCAL_SERVER_PORT", "not-a-port"),
            ("MIN_CONFIDENCE", "0.45"),
            ("MAX_HISTORY_SIZE", "0"),
            ("FORWARD_URL", "  "),
            ("LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();

        let mut c = AppConfig::default();
        c.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        c.sanitize();

        assert_eq!(c.monitor.interval_ms, 2500);
        assert_eq!(c.server.port, 3000);
        assert!((c.parser.min_confidence - 0.45).abs() < 1e-6);
        assert_eq!(c.parser.max_history_size, 1);
        assert!(c.forward.url.is_none());
        assert_eq!(c.logging.format, LogFormat::Json);
    }

    #[test]
    fn interval_has_a_floor() {
        let c = AppConfig::from_toml_str("[monitor]\ninterval_ms = 0\n").unwrap();
        assert_eq!(c.monitor.interval_ms, MIN_INTERVAL_MS);
    }

    #[test]
    fn allow_list_file_format_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("traders.toml");
        fs::write(&toml_path, r#"entries = [" woods ", "", "eli"]"#).unwrap();
        let json_path = dir.path().join("traders.json");
        fs::write(&json_path, r#"["Lin", "eli"]"#).unwrap();

        let mut c = AppConfig::default();
        c.monitor.allow_list = vec!["eli".into()];
        c.monitor.allow_list_file = Some(toml_path);
        c.merge_allow_list_file(None).unwrap();
        c.sanitize();
        assert_eq!(c.monitor.allow_list, vec!["eli".to_string(), "woods".to_string()]);

        // the env path wins over the configured file
        c.merge_allow_list_file(Some(json_path.display().to_string())).unwrap();
        c.sanitize();
        assert_eq!(
            c.monitor.allow_list,
            vec!["Lin".to_string(), "eli".to_string(), "woods".to_string()]
        );

        // JSON text behind a .toml name is a TOML error, not a silent fallback
        let mislabeled = dir.path().join("mislabeled.toml");
        fs::write(&mislabeled, r#"["eli"]"#).unwrap();
        c.monitor.allow_list_file = Some(mislabeled);
        assert!(c.merge_allow_list_file(None).is_err());

        let txt = dir.path().join("traders.txt");
        fs::write(&txt, "eli").unwrap();
        assert!(c.merge_allow_list_file(Some(txt.display().to_string())).is_err());

        let missing = dir.path().join("gone.json");
        assert!(c.merge_allow_list_file(Some(missing.display().to_string())).is_err());
    }
}
