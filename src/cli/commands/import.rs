//! Import Command
//!
//! Load a JSON or YAML dataset into the project database.

use std::path::Path;

use crate::cli::util::CommandContext;
use crate::storage::Dataset;
use crate::types::{FlowError, Result};

pub fn run(path: &Path) -> Result<()> {
    let ctx = CommandContext::load()?;
    let dataset = Dataset::load(path)?;
    if dataset.is_empty() {
        return Err(FlowError::Config(format!(
            "{} contains no leads, sequences or cycle steps",
            path.display()
        )));
    }

    ctx.db.import(&dataset)?;

    let interactions: usize = dataset.interactions.values().map(Vec::len).sum();
    println!("✓ Imported {}", path.display());
    println!("  Leads:        {}", dataset.leads.len());
    println!("  Sequences:    {}", dataset.sequences.len());
    println!("  Bindings:     {}", dataset.bindings.len());
    println!("  Cycle steps:  {}", dataset.cycle_steps.len());
    println!("  Interactions: {}", interactions);
    Ok(())
}
