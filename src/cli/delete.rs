use clap::Parser;
use costlib::Code;
use tracing::instrument;

use super::{prompt_to_proceed, terminal::Colorize, Context};

#[derive(Debug, Parser)]
pub struct Command {
    /// Code of the row to delete
    code: Code,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Command {
    #[instrument(skip(context))]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut library = context.open()?;
        let node = library.get(&self.code)?;

        if !self.yes {
            println!(
                "Will delete {} {} {}",
                node.level,
                node.code.to_string().info(),
                node.name
            );
            println!(
                "{}",
                "The row is kept as history and its code becomes free for reuse.".dim()
            );
            prompt_to_proceed()?;
        }

        let node = library.deactivate(&self.code)?;
        println!(
            "{}",
            format!("✅ Deleted {} {}", node.level, node.code).success()
        );
        Ok(())
    }
}
