use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::client::{DEFAULT_API_BASE, DEFAULT_MODEL};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub inbox_path: PathBuf,
    pub prompts_path: PathBuf,
    pub static_dir: PathBuf,
    pub model: String,
    pub api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            inbox_path: PathBuf::from("data/mock_inbox.json"),
            prompts_path: PathBuf::from("data/prompts.json"),
            static_dir: PathBuf::from("static"),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("inbox_agent"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Load the config at `path`, or the per-user one when `None`.
///
/// A missing file is replaced by a template holding the defaults, which are
/// then used as-is.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        let sample = Config::default();
        let tom = toml::to_string_pretty(&sample)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, tom).with_context(|| format!("writing {}", path.display()))?;
        log::info!("created template config at {}", path.display());
        return Ok(sample);
    }
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            bind = "0.0.0.0:8080"
            inbox_path = "/srv/inbox.json"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert_eq!(cfg.inbox_path, PathBuf::from("/srv/inbox.json"));
        assert_eq!(cfg.prompts_path, PathBuf::from("data/prompts.json"));
        assert_eq!(cfg.model, DEFAULT_MODEL);
    }

    #[test]
    fn missing_file_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = load_config(Some(path.as_path())).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        // the template parses back to the same thing
        assert_eq!(load_config(Some(path.as_path())).unwrap(), Config::default());
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "bind = [").unwrap();
        assert!(load_config(Some(path.as_path())).is_err());
    }
}
