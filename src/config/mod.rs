use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub api: ApiConfig,
    pub ui: UiConfig,
    pub refresh: RefreshConfig,
    pub oauth: OAuthConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout_secs: 30,
            },
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            refresh: RefreshConfig {
                interval_ms: 300_000,
            },
            oauth: OAuthConfig::default(),
            config_path: None,
        }
    }
}

impl EffectiveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh.interval_ms.max(1_000))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    api: Option<RawApiConfig>,
    ui: Option<RawUiConfig>,
    refresh: Option<RawRefreshConfig>,
    oauth: Option<RawOAuthConfig>,
}

#[derive(Debug, Deserialize)]
struct RawApiConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawRefreshConfig {
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawOAuthConfig {
    redirect_uri: Option<String>,
}

pub fn config_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/saasboard")
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    config_dir(home_dir).join("config.toml")
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .context("HOME is not set")
}

/// Defaults, then the TOML file (explicit path, `SAASBOARD_CONFIG`, or the
/// default location), then `SAASBOARD_*` environment variables.
pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let explicit = config_path.map(ToOwned::to_owned).or_else(|| {
        std::env::var_os("SAASBOARD_CONFIG")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    });
    let path = explicit
        .clone()
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if explicit.is_some() {
        anyhow::bail!("config file not found: {}", path.display());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(api) = raw.api {
        if let Some(base_url) = api.base_url {
            cfg.api.base_url = base_url;
        }
        if let Some(timeout_secs) = api.timeout_secs {
            cfg.api.timeout_secs = timeout_secs;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(refresh) = raw.refresh {
        if let Some(interval_ms) = refresh.interval_ms {
            cfg.refresh.interval_ms = interval_ms;
        }
    }

    if let Some(oauth) = raw.oauth {
        if let Some(redirect_uri) = oauth.redirect_uri.filter(|u| !u.trim().is_empty()) {
            cfg.oauth.redirect_uri = Some(redirect_uri);
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("SAASBOARD_API_BASE_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.api.base_url = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("SAASBOARD_API_TIMEOUT_SECS") {
        cfg.api.timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SAASBOARD_API_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("SAASBOARD_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "SAASBOARD_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("SAASBOARD_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "SAASBOARD_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("SAASBOARD_REFRESH_INTERVAL_MS") {
        cfg.refresh.interval_ms = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SAASBOARD_REFRESH_INTERVAL_MS")?;
    }
    if let Ok(v) = std::env::var("SAASBOARD_OAUTH_REDIRECT_URI") {
        let v = v.trim();
        cfg.oauth.redirect_uri = (!v.is_empty()).then(|| v.to_string());
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for s in ["1", "true", "YES", " on "] {
            assert!(parse_bool(s).unwrap());
        }
        for s in ["0", "false", "no", "off"] {
            assert!(!parse_bool(s).unwrap());
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn raw_config_overrides_defaults_section_by_section() {
        let raw: RawConfig = toml::from_str(
            r#"
[api]
base_url = "https://admin.example.com/api"

[refresh]
interval_ms = 60000
"#,
        )
        .unwrap();
        let mut cfg = EffectiveConfig::default();
        apply_raw_config(&mut cfg, raw);
        assert_eq!(cfg.api.base_url, "https://admin.example.com/api");
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.refresh.interval_ms, 60_000);
        assert!(cfg.ui.color);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(toml::from_str::<RawConfig>("[scan]\ndefault_scope = \"dev\"\n").is_err());
    }
}
