use clap::Parser;
use costlib::SqliteStore;
use tracing::instrument;

use super::{terminal::Colorize, Context};

#[derive(Debug, Parser)]
pub struct Command {
    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
}

impl Command {
    #[instrument(skip(context))]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let config_path = &context.config_path;
        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Configuration file {} already exists (use --force to overwrite)",
                config_path.display()
            );
        }

        context
            .config
            .save(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", config_path.display()))?;

        let database = &context.config.database;
        SqliteStore::open(database).map_err(|e| {
            anyhow::anyhow!("Failed to create database {}: {e}", database.display())
        })?;

        println!("{}", "✅ Initialized catalog".success());
        println!("  Config:   {}", config_path.display());
        println!("  Database: {}", database.display());
        println!();
        println!("Next steps:");
        println!("  costlib create division --name \"Concrete\"");

        Ok(())
    }
}
