// src/config/listeners.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::ingest::providers::{cnbc, guardian, nyt};

pub const ENV_PATH: &str = "NEWS_LISTENER_CONFIG";
pub const DEFAULT_PATH: &str = "config/listeners.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Cnbc,
    Guardian,
    Nyt,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cnbc" | "c" => Ok(SourceKind::Cnbc),
            "guardian" | "g" => Ok(SourceKind::Guardian),
            "nyt" | "n" => Ok(SourceKind::Nyt),
            other => Err(anyhow!("unknown news source `{other}`")),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Cnbc => "cnbc",
            SourceKind::Guardian => "guardian",
            SourceKind::Nyt => "nyt",
        })
    }
}

/// Provider base URLs; overridable so tests can point at a local server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub cnbc: String,
    pub guardian: String,
    pub nyt_recent: String,
    pub nyt_archive: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            cnbc: cnbc::DEFAULT_BASE_URL.to_string(),
            guardian: guardian::DEFAULT_BASE_URL.to_string(),
            nyt_recent: nyt::DEFAULT_RECENT_URL.to_string(),
            nyt_archive: nyt::DEFAULT_ARCHIVE_URL.to_string(),
        }
    }
}

/// Process configuration, built once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub sources: Vec<SourceKind>,
    pub cnbc_query: String,
    /// "ENV" means: read from GUARDIAN_API_KEY.
    pub guardian_api_key: String,
    /// "ENV" means: read from NYT_API_KEY.
    pub nyt_api_key: String,
    pub nyt_subsections: Vec<String>,
    /// Overrides the 5s pause of self-paced sources (Guardian, NYT).
    pub poll_interval_secs: Option<u64>,
    pub webhook_url: Option<String>,
    pub metrics_addr: Option<SocketAddr>,
    pub endpoints: Endpoints,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            sources: vec![SourceKind::Cnbc],
            cnbc_query: cnbc::DEFAULT_QUERY.to_string(),
            guardian_api_key: String::new(),
            nyt_api_key: String::new(),
            nyt_subsections: nyt::DEFAULT_SUBSECTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            poll_interval_secs: None,
            webhook_url: None,
            metrics_addr: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl ListenerConfig {
    /// Load using env var + fallbacks, then apply env overrides and validate:
    /// 1) $NEWS_LISTENER_CONFIG
    /// 2) config/listeners.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    bail!("{ENV_PATH} points to non-existent path {}", pb.display());
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_PATH);
                if default.exists() {
                    Self::load_from(&default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading listener config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing listener config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ListenerConfig = toml::from_str(s)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Environment wins over file values when set and non-empty.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = env_non_empty("GUARDIAN_API_KEY") {
            self.guardian_api_key = key;
        }
        if let Some(key) = env_non_empty("NYT_API_KEY") {
            self.nyt_api_key = key;
        }
        if let Some(list) = env_non_empty("NEWS_SOURCES") {
            self.sources = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(SourceKind::from_str)
                .collect::<Result<_>>()?;
        }
        if let Some(list) = env_non_empty("NYT_SUBSECTIONS") {
            self.nyt_subsections = list.split(',').map(str::to_string).collect();
        }
        if let Some(url) = env_non_empty("WEBHOOK_URL") {
            self.webhook_url = Some(url);
        }
        if let Some(addr) = env_non_empty("METRICS_ADDR") {
            self.metrics_addr = Some(
                addr.parse()
                    .with_context(|| format!("parsing METRICS_ADDR `{addr}`"))?,
            );
        }
        self.normalize();
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no news sources configured");
        }
        for kind in &self.sources {
            match kind {
                SourceKind::Cnbc => {
                    if self.cnbc_query.is_empty() {
                        bail!("cnbc_query must not be empty");
                    }
                }
                SourceKind::Guardian => require_key(&self.guardian_api_key, "GUARDIAN_API_KEY")?,
                SourceKind::Nyt => {
                    require_key(&self.nyt_api_key, "NYT_API_KEY")?;
                    if self.nyt_subsections.is_empty() {
                        bail!("nyt_subsections must list at least one subsection");
                    }
                }
            }
        }
        Ok(())
    }

    fn normalize(&mut self) {
        let mut seen = Vec::with_capacity(self.sources.len());
        self.sources.retain(|k| {
            if seen.contains(k) {
                false
            } else {
                seen.push(*k);
                true
            }
        });
        self.cnbc_query = self.cnbc_query.trim().to_string();
        self.nyt_subsections = self
            .nyt_subsections
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self.webhook_url = self.webhook_url.take().filter(|u| !u.trim().is_empty());
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_key(key: &str, env_name: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() || key.eq_ignore_ascii_case("env") {
        bail!("missing {env_name} (set it in the environment or the config file)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_to_cnbc_only() {
        let cfg = ListenerConfig::default();
        assert_eq!(cfg.sources, vec![SourceKind::Cnbc]);
        assert_eq!(cfg.cnbc_query, "Politics");
        assert_eq!(cfg.nyt_subsections.len(), 8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_overrides_and_dedups_sources() {
        let cfg = ListenerConfig::from_toml_str(
            r#"
sources = ["nyt", "guardian", "nyt"]
nyt_api_key = "n-key"
guardian_api_key = "g-key"
nyt_subsections = [" Europe ", "", "Politics"]

[endpoints]
guardian = "http://localhost:9000/world"
"#,
        )
        .unwrap();

        assert_eq!(cfg.sources, vec![SourceKind::Nyt, SourceKind::Guardian]);
        assert_eq!(cfg.nyt_subsections, vec!["Europe", "Politics"]);
        assert_eq!(cfg.endpoints.guardian, "http://localhost:9000/world");
        assert_eq!(cfg.endpoints.cnbc, cnbc::DEFAULT_BASE_URL);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_placeholder_without_env_fails_validation() {
        let cfg = ListenerConfig {
            sources: vec![SourceKind::Guardian],
            guardian_api_key: "ENV".into(),
            ..ListenerConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("GUARDIAN_API_KEY"));
    }

    #[test]
    fn source_kind_parses_names_and_tags() {
        assert_eq!("CNBC".parse::<SourceKind>().unwrap(), SourceKind::Cnbc);
        assert_eq!(" g ".parse::<SourceKind>().unwrap(), SourceKind::Guardian);
        assert_eq!("nyt".parse::<SourceKind>().unwrap(), SourceKind::Nyt);
        assert!("reuters".parse::<SourceKind>().is_err());
    }
}
