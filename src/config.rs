use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_TOP_RECIPIENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Category store location. Defaults to `<data_dir>/categories.json`.
    #[serde(default)]
    pub categories_path: Option<PathBuf>,

    /// How many recipients `summary` lists when `--top` is not given.
    #[serde(default = "default_top_recipients")]
    pub top_recipients: usize,
}

fn default_top_recipients() -> usize {
    DEFAULT_TOP_RECIPIENTS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            categories_path: None,
            top_recipients: DEFAULT_TOP_RECIPIENTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

pub fn app_paths(override_home: Option<PathBuf>) -> Result<AppPaths> {
    if let Some(home) = override_home {
        return Ok(AppPaths {
            config_dir: home.join("config"),
            data_dir: home.join("data"),
        });
    }

    let proj = ProjectDirs::from("com", "pesa", "pesa")
        .context("Failed to resolve platform directories")?;

    Ok(AppPaths {
        config_dir: proj.config_dir().to_path_buf(),
        data_dir: proj.data_dir().to_path_buf(),
    })
}

pub fn load_or_init_config(paths: &AppPaths) -> Result<(AppConfig, PathBuf)> {
    fs::create_dir_all(&paths.config_dir)
        .with_context(|| format!("Failed to create config dir {}", paths.config_dir.display()))?;

    let cfg_path = paths.config_dir.join("config.json");
    if !cfg_path.exists() {
        let cfg = AppConfig::default();
        write_config(&cfg_path, &cfg)?;
        info!(path = %cfg_path.display(), "created default config");
        return Ok((cfg, cfg_path));
    }

    let raw = fs::read_to_string(&cfg_path)
        .with_context(|| format!("Failed to read {}", cfg_path.display()))?;
    let cfg: AppConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", cfg_path.display()))?;

    Ok((cfg, cfg_path))
}

pub fn write_config(path: &Path, cfg: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Command line override first, then config, then the data dir default.
pub fn categories_path(
    cli_override: Option<PathBuf>,
    cfg: &AppConfig,
    paths: &AppPaths,
) -> PathBuf {
    cli_override
        .or_else(|| cfg.categories_path.clone())
        .unwrap_or_else(|| paths.data_dir.join("categories.json"))
}
