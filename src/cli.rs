use std::path::PathBuf;

mod create;
mod delete;
mod generate;
mod init;
mod list;
mod reconcile;
mod serve;
mod status;
mod terminal;
mod validate;

use anyhow::Context as _;
use clap::ArgAction;
use costlib::{Config, Library, SqliteStore};

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the configuration file
    #[arg(long, default_value = "costlib.toml", global = true)]
    config: PathBuf,

    /// Path to the catalog database, overriding the configuration file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let command = self.command.unwrap_or_default();
        let mut config = if command.writes_config() {
            Config::default()
        } else {
            Config::load_or_default(&self.config)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("failed to load {}", self.config.display()))?
        };
        if let Some(database) = self.database {
            config.database = database;
        }
        let context = Context {
            config_path: self.config,
            config,
        };

        command.run(&context)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

/// Settings resolved from the configuration file and global flags.
#[derive(Debug)]
pub struct Context {
    config_path: PathBuf,
    config: Config,
}

impl Context {
    /// Opens the configured catalog database.
    fn open(&self) -> anyhow::Result<Library<SqliteStore>> {
        let store = SqliteStore::open(&self.config.database).with_context(|| {
            format!(
                "failed to open catalog database {}",
                self.config.database.display()
            )
        })?;
        Ok(Library::new(store, &self.config))
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show row counts per level (default)
    Status(status::Command),

    /// Write a default configuration file and create the database
    ///
    /// Any existing configuration file is ignored, so `--force` can replace a
    /// broken one.
    Init(init::Command),

    /// Print the next free code at a level
    ///
    /// Nothing is reserved: creating a row afterwards may still pick a
    /// different code if another writer got there first.
    Generate(generate::Command),

    /// Create a division, section, assembly or item
    Create(create::Command),

    /// Check a code's format, hierarchy and sort key
    Validate(validate::Command),

    /// List rows at a level
    List(list::Command),

    /// Soft-delete a row
    Delete(delete::Command),

    /// Find duplicate rows and merge them
    ///
    /// Rows at the same level with the same parent and name are duplicates.
    /// The earliest-created row survives and inherits the others' children.
    Reconcile(reconcile::Command),

    /// Serve the HTTP API
    Serve(serve::Command),
}

impl Default for Command {
    fn default() -> Self {
        Self::Status(status::Command::default())
    }
}

impl Command {
    /// Commands that write a fresh configuration file rather than read one.
    const fn writes_config(&self) -> bool {
        matches!(self, Self::Init(_))
    }

    fn run(self, context: &Context) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(context)?,
            Self::Init(command) => command.run(context)?,
            Self::Generate(command) => command.run(context)?,
            Self::Create(command) => command.run(context)?,
            Self::Validate(command) => command.run(),
            Self::List(command) => command.run(context)?,
            Self::Delete(command) => command.run(context)?,
            Self::Reconcile(command) => command.run(context)?,
            Self::Serve(command) => command.run(context)?,
        }
        Ok(())
    }
}

fn prompt_to_proceed() -> anyhow::Result<()> {
    let proceed = dialoguer::Confirm::new()
        .with_prompt("Proceed?")
        .default(false)
        .interact()?;
    if !proceed {
        println!("Cancelled");
        std::process::exit(130);
    }
    Ok(())
}
