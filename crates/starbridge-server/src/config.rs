//! Configuration loading and persistence.
//!
//! One `config.json` per configuration directory. A missing file is
//! created from defaults and surfaced as [`ServerError::FirstRun`] so the
//! operator can edit it. Saving writes a temp file and renames it over
//! the old one.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// Proxy configuration, read-only at steady state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the proxy listens on for game clients.
    pub listen_port: u16,
    /// Host of the real game server.
    pub upstream_host: String,
    /// Port of the real game server.
    pub upstream_port: u16,
    /// Chat prefix that marks a command line.
    pub command_prefix: String,
    /// Seconds between parse-cache reaper passes.
    pub parse_cache_reap_secs: u64,
    /// Store filename, relative to the configuration directory.
    pub database_file: String,
    /// Per-plugin opaque sections, keyed by plugin name.
    pub plugins: serde_json::Map<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 21025,
            upstream_host: "127.0.0.1".to_owned(),
            upstream_port: 21024,
            command_prefix: "/".to_owned(),
            parse_cache_reap_secs: 60,
            database_file: "starbridge.db".to_owned(),
            plugins: serde_json::Map::new(),
        }
    }
}

impl Config {
    /// This plugin's config section, or JSON null when absent.
    pub fn plugin_section(&self, name: &str) -> serde_json::Value {
        self.plugins.get(name).cloned().unwrap_or(serde_json::Value::Null)
    }
}

/// Owns the config file path and the loaded configuration.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    dir: PathBuf,
    path: PathBuf,
    /// The loaded configuration.
    pub config: Config,
}

impl ConfigManager {
    /// Load `config.json` from `dir`, creating the directory and a
    /// default file on first run.
    ///
    /// # Errors
    ///
    /// [`ServerError::FirstRun`] after writing defaults;
    /// [`ServerError::Config`] on unreadable or invalid JSON.
    pub fn load(dir: &Path) -> Result<Self, ServerError> {
        let path = dir.join("config.json");
        if !path.exists() {
            fs::create_dir_all(dir)?;
            let manager =
                Self { dir: dir.to_path_buf(), path: path.clone(), config: Config::default() };
            manager.save()?;
            return Err(ServerError::FirstRun(path.display().to_string()));
        }

        let raw = fs::read_to_string(&path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| ServerError::Config(format!("{} is not valid JSON: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(Self { dir: dir.to_path_buf(), path, config })
    }

    /// Persist the configuration: write `config.json.tmp`, then rename.
    pub fn save(&self) -> Result<(), ServerError> {
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.config)
            .map_err(|e| ServerError::Config(format!("cannot serialize config: {e}")))?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "saved configuration");
        Ok(())
    }

    /// The configuration directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of the store file.
    pub fn database_path(&self) -> PathBuf {
        self.dir.join(&self.config.database_file)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn first_run_writes_defaults_and_asks_for_edit() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("conf");

        let err = ConfigManager::load(&target).unwrap_err();
        assert!(matches!(err, ServerError::FirstRun(_)));
        assert!(target.join("config.json").exists());

        // second load succeeds with the defaults
        let manager = ConfigManager::load(&target).unwrap();
        assert_eq!(manager.config.listen_port, 21025);
        assert_eq!(manager.config.command_prefix, "/");
    }

    #[test]
    fn save_round_trips_and_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("conf");
        let _ = ConfigManager::load(&target);

        let mut manager = ConfigManager::load(&target).unwrap();
        manager.config.listen_port = 4040;
        manager.config.plugins.insert(
            "motd".to_owned(),
            serde_json::json!({ "message": "welcome" }),
        );
        manager.save().unwrap();

        assert!(!target.join("config.json.tmp").exists());
        let reloaded = ConfigManager::load(&target).unwrap();
        assert_eq!(reloaded.config.listen_port, 4040);
        assert_eq!(
            reloaded.config.plugin_section("motd")["message"],
            serde_json::json!("welcome")
        );
        assert_eq!(reloaded.config.plugin_section("absent"), serde_json::Value::Null);
    }

    #[test]
    fn unknown_fields_keep_defaults() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("conf");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("config.json"), r#"{"listen_port": 9999}"#).unwrap();

        let manager = ConfigManager::load(&target).unwrap();
        assert_eq!(manager.config.listen_port, 9999);
        assert_eq!(manager.config.upstream_port, 21024);
    }
}
