//! Figment-based configuration loading.
//!
//! Later sources win: built-in defaults, `~/.config/leadflow/config.toml`,
//! `.leadflow/config.toml`, then `LEADFLOW_*` environment variables with `__`
//! separating sections.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{FlowError, Result};

/// Configuration loader
pub struct ConfigLoader;

const CONFIG_FILE: &str = "config.toml";

impl ConfigLoader {
    /// Merged configuration: defaults, global file, project file, environment
    pub fn load() -> Result<Config> {
        Self::load_with_project(&Self::project_config_path())
    }

    /// Same chain as [`ConfigLoader::load`] with an explicit project file
    pub fn load_with_project(project_path: &Path) -> Result<Config> {
        let mut figment = Self::defaults();

        let files = Self::global_config_path()
            .into_iter()
            .chain(std::iter::once(project_path.to_path_buf()));
        for path in files.filter(|p| p.exists()) {
            debug!("Merging config file {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // LEADFLOW_FOLLOWUP__GHOSTING_DAYS -> followup.ghosting_days
        Self::extract(figment.merge(Env::prefixed("LEADFLOW_").split("__").lowercase(true)))
    }

    /// Defaults overlaid with a single file; ignores global config and environment
    pub fn load_from_file(path: &Path) -> Result<Config> {
        Self::extract(Self::defaults().merge(Toml::file(path)))
    }

    fn defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| FlowError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Paths
    // =========================================================================

    /// `$XDG_CONFIG_HOME/leadflow`, falling back to `~/.config/leadflow`
    pub fn global_dir() -> Option<PathBuf> {
        let base = match env::var_os("XDG_CONFIG_HOME") {
            Some(xdg) => PathBuf::from(xdg),
            None => PathBuf::from(env::var_os("HOME")?).join(".config"),
        };
        Some(base.join("leadflow"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join(CONFIG_FILE)
    }

    /// Project data directory, relative to the working directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".leadflow")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    pub fn show_path() {
        let marker = |p: &Path| if p.exists() { "✓" } else { "✗" };

        println!("Configuration paths:\n");
        match Self::global_config_path() {
            Some(global) => println!("  Global:  {} {}", marker(&global), global.display()),
            None => println!("  Global:  (no HOME or XDG_CONFIG_HOME)"),
        }
        let project = Self::project_config_path();
        println!("  Project: {} {}", marker(&project), project.display());
    }

    /// Print the effective configuration as TOML, or JSON with `as_json`
    pub fn show_config(config: &Config, as_json: bool) -> Result<()> {
        let rendered = if as_json {
            serde_json::to_string_pretty(config)?
        } else {
            toml::to_string_pretty(config).map_err(|e| FlowError::Config(e.to_string()))?
        };
        println!("{}", rendered);
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write the global template unless one exists (or `force`)
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let dir = Self::global_dir().ok_or_else(|| {
            FlowError::Config("Cannot determine global config directory".to_string())
        })?;
        let path = dir.join(CONFIG_FILE);
        Self::write_template(&path, &Self::default_global_config(), force)?;
        Ok(path)
    }

    /// Create `.leadflow/` under `root` with a project template
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let dir = root.join(Self::project_dir());
        Self::write_template(&dir.join(CONFIG_FILE), &Self::default_project_config(), force)?;
        Ok(dir)
    }

    fn write_template(path: &Path, content: &str, force: bool) -> Result<()> {
        if path.exists() && !force {
            debug!("Keeping existing config {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Wrote config {}", path.display());
        Ok(())
    }

    // =========================================================================
    // Templates
    // =========================================================================

    fn default_global_config() -> String {
        r#"# leadflow user defaults; .leadflow/config.toml overrides these per project.

version = "1.0"

[ai]
provider = "none"
model = "gpt-4o-mini"
timeout_secs = 60
"#
        .to_string()
    }

    fn default_project_config() -> String {
        r#"# leadflow project settings

version = "1.0"

[planner]
default_vertical = "network_marketing"

[followup]
ghosting_days = 30
business_start_hour = 9
business_end_hour = 19
business_days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
default_timezone = "Europe/Berlin"
generate_content = false

[queue]
default_limit = 20
cold_after_days = 7

[storage]
database_path = ".leadflow/leadflow.db"

# Optional webhook relay per channel
# [channels.webhooks]
# whatsapp = "https://relay.example.com/whatsapp"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[followup]\nghosting_days = 14\ndefault_timezone = \"America/New_York\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.followup.ghosting_days, 14);
        assert_eq!(config.followup.default_timezone, "America/New_York");
        assert_eq!(config.queue.default_limit, 20);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[followup]\nghosting_days = 0\n").unwrap();

        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_init_project_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let dir = ConfigLoader::init_project(temp_dir.path(), false).unwrap();

        let path = dir.join("config.toml");
        assert!(path.exists());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.followup.business_days.len(), 5);
    }

    #[test]
    fn test_init_project_keeps_edits_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let dir = ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "[queue]\ndefault_limit = 5\n").unwrap();

        ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        assert_eq!(ConfigLoader::load_from_file(&path).unwrap().queue.default_limit, 5);

        ConfigLoader::init_project(temp_dir.path(), true).unwrap();
        assert_eq!(ConfigLoader::load_from_file(&path).unwrap().queue.default_limit, 20);
    }
}
