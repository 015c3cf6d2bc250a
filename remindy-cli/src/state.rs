use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub fn remindy_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("REMINDY_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".remindy"))
}

pub fn ensure_remindy_home() -> Result<PathBuf> {
    let dir = remindy_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn log_path() -> Result<PathBuf> {
    Ok(ensure_remindy_home()?.join("remindy.log"))
}
