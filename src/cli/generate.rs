use clap::Parser;
use costlib::Level;
use tracing::instrument;

use super::Context;

#[derive(Debug, Parser)]
pub struct Command {
    /// The level to allocate at (number or name, e.g. 2 or section)
    level: Level,

    /// Code of the parent row; required below division level
    #[arg(long, short)]
    parent: Option<String>,
}

impl Command {
    #[instrument(skip(context))]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let library = context.open()?;
        let code = library.generate_code(self.level, self.parent.as_deref())?;
        println!("{code}");
        Ok(())
    }
}
