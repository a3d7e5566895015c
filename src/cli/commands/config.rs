//! Config Command
//!
//! Usage:
//!   leadflow config show [-g] [-f json]
//!   leadflow config path
//!   leadflow config init [-g] [--force]

use crate::cli::util::is_json;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged configuration, or the raw global file with `global`
pub fn show(global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(global_path) if global_path.exists() => {
                let content = std::fs::read_to_string(&global_path)?;
                println!("# Global Config: {}\n", global_path.display());
                println!("{}", content);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'leadflow config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
        return Ok(());
    }

    let config = ConfigLoader::load()?;
    ConfigLoader::show_config(&config, is_json(format))
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init_global(force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_global(force)?;
    println!("✓ Initialized global configuration");
    println!("  Config: {}", config_path.display());
    Ok(())
}

pub fn init_project(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let dir = ConfigLoader::init_project(&root, force)?;
    println!("✓ Initialized project configuration");
    println!("  Directory: {}", dir.display());
    println!(
        "  Config:    {}",
        ConfigLoader::project_config_path().display()
    );
    Ok(())
}
