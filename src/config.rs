use crate::{
    package::{Loader, LookupConstraints},
    registry::{curseforge, modrinth},
    transport::{HttpOptions, DEFAULT_USER_AGENT},
};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const API_KEY_ENV: &str = "CURSEFORGE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub modrinth_base_url: String,
    pub curseforge_base_url: String,
    pub curseforge_api_key: Option<String>,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub game_version: String,
    pub loaders: Vec<Loader>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            modrinth_base_url: modrinth::DEFAULT_BASE_URL.to_string(),
            curseforge_base_url: curseforge::DEFAULT_BASE_URL.to_string(),
            curseforge_api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            game_version: String::new(),
            loaders: vec![Loader::Fabric, Loader::Forge, Loader::NeoForge, Loader::Quilt],
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        let mut config = Self::load_or_create_at(&base_dir.join("config.json"))?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save_to(path)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create app data dir")?;
        }
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(key) = env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.curseforge_api_key = Some(key.trim().to_string());
            }
        }
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            read_timeout: Duration::from_secs(self.read_timeout_secs.max(1)),
        }
    }

    pub fn constraints(&self) -> LookupConstraints {
        LookupConstraints::new(self.game_version.clone(), self.loaders.clone())
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(base_data_dir()?.join("config.json"))
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("modsentry"))
}
