use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::planner::{CompletionChecking, Preferences, ScheduleVariant};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Planner";
const APP_NAME: &str = "planner";

const DEFAULT_EVENING_HOUR: u8 = 18;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("PLANNER_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("PLANNER_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join("state"));

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            state_dir,
        })
    }

    /// Config, data and state all under `root`.
    pub fn rooted(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            config_file: root.join("config.toml"),
            data_dir: root.join("data"),
            state_dir: root.join("state"),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bullet: char,
    pub schedule: ScheduleVariant,
    pub completion_checking: CompletionChecking,
    pub evening_hour: u8,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bullet: '*',
            schedule: ScheduleVariant::Standard,
            completion_checking: CompletionChecking::Strict,
            evening_hour: DEFAULT_EVENING_HOUR,
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self) {
        if self.evening_hour > 23 {
            tracing::warn!(
                evening_hour = self.evening_hour,
                "evening hour out of range in config, falling back to {DEFAULT_EVENING_HOUR}"
            );
            self.evening_hour = DEFAULT_EVENING_HOUR;
        }
        if self.bullet.is_whitespace() {
            tracing::warn!(?self.bullet, "blank bullet in config, falling back to '*'");
            self.bullet = '*';
        }
        let extension = self.storage.extension.trim_start_matches('.').to_string();
        if extension.is_empty() {
            tracing::warn!("empty document extension in config, falling back to wiki");
            self.storage.extension = StorageOptions::default().extension;
        } else {
            self.storage.extension = extension;
        }
    }

    /// Run-independent preferences; per-run fields start at their defaults.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            bullet: self.bullet,
            schedule: self.schedule,
            completion_checking: self.completion_checking,
            evening_hour: self.evening_hour,
            ..Preferences::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    pub extension: String,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            extension: "wiki".to_string(),
        }
    }
}
