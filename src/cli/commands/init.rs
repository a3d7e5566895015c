//! Init Command
//!
//! Initialize leadflow in the current directory.

use crate::config::ConfigLoader;
use crate::storage::Database;
use crate::types::{FlowError, Result};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let project_dir = root.join(ConfigLoader::project_dir());

    if project_dir.exists() && !force {
        return Err(FlowError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    ConfigLoader::init_project(&root, force)?;

    // Global config is optional; never overwrite it from here
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let config = ConfigLoader::load()?;
    Database::open(&config.storage.database_path)?;

    println!("✓ Initialized leadflow in .leadflow/");
    println!("  Database: {}", config.storage.database_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Run 'leadflow import <dataset.yaml>' to load leads and sequences");
    println!("  2. Run 'leadflow followups today' for today's follow-ups");

    Ok(())
}
