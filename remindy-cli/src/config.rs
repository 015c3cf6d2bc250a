use anyhow::{Context, Result};
use chrono_tz::Tz;
use remindy_core::catalog::{find_country, is_supported_timezone, FALLBACK_TIMEZONE};
use remindy_core::dashboard::DEFAULT_PER_PAGE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_remindy_home;

pub const API_BASE_URL_ENV: &str = "REMINDY_API_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub dashboard: DashboardSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Prefix in front of `/reminders/`, e.g. `http://localhost:8000/api`
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub per_page: u32,
    /// ISO country whose dialing code pre-fills new reminders.
    pub default_country: String,
    /// Display zone when `TZ` is unset or unknown.
    pub fallback_timezone: String,
    /// How often the dashboard re-fetches to pick up status changes.
    pub refresh_secs: u64,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            default_country: "US".to_string(),
            fallback_timezone: FALLBACK_TIMEZONE.to_string(),
            refresh_secs: 30,
        }
    }
}

impl DashboardSection {
    pub fn fallback_tz(&self) -> Tz {
        self.fallback_timezone
            .parse()
            .unwrap_or(chrono_tz::Europe::London)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_remindy_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    let mut cfg = if p.exists() {
        let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        toml::from_str(&s).context("parse config.toml")?
    } else {
        Config::default()
    };

    if let Ok(url) = std::env::var(API_BASE_URL_ENV) {
        if !url.trim().is_empty() {
            cfg.api.base_url = url;
        }
    }
    cfg.api.base_url = cfg.api.base_url.trim_end_matches('/').to_string();
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let cfg = Config::default();
    save_config(&cfg)?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn config_check() -> Result<()> {
    let cfg = load_config()?;

    println!("Config ({}):\n", config_path()?.display());
    println!("- api.base_url: {}", cfg.api.base_url);
    println!("- api.timeout_secs: {}", cfg.api.timeout_secs);
    println!("- dashboard.per_page: {}", cfg.dashboard.per_page);
    println!("- dashboard.default_country: {}", cfg.dashboard.default_country);
    println!("- dashboard.fallback_timezone: {}", cfg.dashboard.fallback_timezone);
    println!("- dashboard.refresh_secs: {}", cfg.dashboard.refresh_secs);

    let mut problems = Vec::new();
    if find_country(&cfg.dashboard.default_country).is_none() {
        problems.push(format!(
            "default_country '{}' is not in the dialing-code catalog",
            cfg.dashboard.default_country
        ));
    }
    if !is_supported_timezone(&cfg.dashboard.fallback_timezone) {
        problems.push(format!(
            "fallback_timezone '{}' is not a selectable timezone (see: remindy timezones)",
            cfg.dashboard.fallback_timezone
        ));
    }
    if cfg.dashboard.per_page == 0 || cfg.dashboard.per_page > 100 {
        problems.push("per_page must be between 1 and 100".to_string());
    }

    if problems.is_empty() {
        println!("\nLooks good.");
    } else {
        println!("\nWhat to fix:");
        for p in problems {
            println!("- {p}");
        }
    }
    Ok(())
}
