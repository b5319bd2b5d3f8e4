use std::time::Duration;

use anyhow::Context;

use crate::fs::engine::DEFAULT_INDEX_TTL;
use crate::fs::remote::DEFAULT_PAGE_SIZE;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsConfig {
    pub token: Option<String>,
    pub api_base: String,
    pub index_ttl: Duration,
    pub page_size: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            index_ttl: DEFAULT_INDEX_TTL,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let token = lookup("GDRIVE_TOKEN").filter(|value| !value.trim().is_empty());
        let api_base = lookup("GDRIVE_API_BASE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.api_base);
        let index_ttl = read_u64(&lookup, "GDRIVEFS_INDEX_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.index_ttl);
        let page_size = read_u64(&lookup, "GDRIVEFS_PAGE_SIZE")
            .filter(|value| *value > 0)
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(defaults.page_size);

        Self {
            token,
            api_base,
            index_ttl,
            page_size,
        }
    }

    pub fn require_token(&self) -> anyhow::Result<&str> {
        self.token
            .as_deref()
            .context("GDRIVE_TOKEN is not set")
    }
}

fn read_u64<F>(lookup: &F, name: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> FsConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FsConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config, FsConfig::default());
        assert!(config.require_token().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("GDRIVE_TOKEN", "tok"),
            ("GDRIVE_API_BASE", "http://localhost:8080"),
            ("GDRIVEFS_INDEX_TTL_SECS", "0"),
            ("GDRIVEFS_PAGE_SIZE", "50"),
        ]);
        assert_eq!(config.require_token().unwrap(), "tok");
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.index_ttl, Duration::ZERO);
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn ignores_malformed_numbers() {
        let config = config_from(&[
            ("GDRIVEFS_INDEX_TTL_SECS", "soon"),
            ("GDRIVEFS_PAGE_SIZE", "0"),
            ("GDRIVE_TOKEN", "  "),
        ]);
        assert_eq!(config.index_ttl, DEFAULT_INDEX_TTL);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(config.token.is_none());
    }
}
