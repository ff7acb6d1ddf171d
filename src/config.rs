use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

/// Persisted client settings.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub agent: Option<String>,
    pub server: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("acp-chat"))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

/// Key-value access to the persisted agent selection.
///
/// The app only ever reads the value once at startup and rewrites it on each
/// selection change, so the interface is a plain get/set pair. Tests swap in
/// an in-memory store.
pub trait SelectionStore {
    fn get(&self) -> Option<String>;
    fn set(&mut self, agent: &str) -> Result<()>;
}

/// File-backed store that rewrites the `agent` field of the config file,
/// leaving the other fields alone.
pub struct ConfigStore;

impl SelectionStore for ConfigStore {
    fn get(&self) -> Option<String> {
        Config::load()
            .ok()
            .and_then(|c| c.agent)
            .filter(|a| !a.is_empty())
    }

    fn set(&mut self, agent: &str) -> Result<()> {
        let mut config = Config::load().unwrap_or_default();
        config.agent = Some(agent.to_string());
        config.save()
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemoryStore(std::sync::Arc<std::sync::Mutex<Option<String>>>);

#[cfg(test)]
impl MemoryStore {
    pub fn with_agent(agent: &str) -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(Some(
            agent.to_string(),
        ))))
    }

    pub fn value(&self) -> Option<String> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl SelectionStore for MemoryStore {
    fn get(&self) -> Option<String> {
        self.value().filter(|a| !a.is_empty())
    }

    fn set(&mut self, agent: &str) -> Result<()> {
        *self.0.lock().unwrap() = Some(agent.to_string());
        Ok(())
    }
}
