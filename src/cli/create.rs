use clap::Parser;
use costlib::{CreateNode, Level};
use tracing::instrument;

use super::{terminal::Colorize, Context};

#[derive(Debug, Parser)]
pub struct Command {
    /// The level of the new row (number or name, e.g. 1 or division)
    level: Level,

    /// Human-readable name
    #[arg(long, short)]
    name: String,

    /// Code of the parent row; required below division level
    #[arg(long, short)]
    parent: Option<String>,

    /// Explicit code; the next free code is allocated when omitted
    #[arg(long, short)]
    code: Option<String>,

    /// Free-text description
    #[arg(long)]
    description: Option<String>,
}

impl Command {
    #[instrument(skip(context))]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut library = context.open()?;
        let node = library.create(
            self.level,
            CreateNode {
                name: self.name,
                description: self.description,
                code: self.code,
                parent_code: self.parent,
            },
        )?;

        println!(
            "{} {} {}",
            format!("✅ Created {}", node.level).success(),
            node.code.to_string().info(),
            node.name
        );
        Ok(())
    }
}
