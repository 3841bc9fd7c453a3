use clap::Parser;
use costlib::{Level, Node};
use tracing::instrument;

use super::{
    terminal::{is_narrow, Colorize},
    Context,
};

#[derive(Debug, Parser)]
#[command(about = "List rows at a level in code order")]
pub struct Command {
    /// The level to list (number or name); defaults to divisions
    level: Option<Level>,

    /// Only rows under this parent code
    #[arg(long, short)]
    parent: Option<String>,

    /// Include soft-deleted rows
    #[arg(long, short)]
    all: bool,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Command {
    #[instrument(level = "debug", skip(context))]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let level = self.level.unwrap_or(Level::Division);
        let library = context.open()?;
        let nodes = library.list(level, self.parent.as_deref(), self.all)?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&nodes)?),
            OutputFormat::Table if nodes.is_empty() => {
                println!("{}", format!("No {} found", level.plural()).dim());
            }
            OutputFormat::Table => Self::output_table(&nodes),
        }

        Ok(())
    }

    fn output_table(nodes: &[Node]) {
        let width = nodes
            .iter()
            .map(|n| n.code.to_string().len())
            .max()
            .unwrap_or(0)
            .max(4);

        if is_narrow() {
            for node in nodes {
                println!("{} {}{}", node.code.to_string().info(), node.name, Self::flag(node));
            }
            return;
        }

        println!("{:<width$}  {:<10}  Name", "Code", "Sort key");
        for node in nodes {
            println!(
                "{}  {:<10}  {}{}",
                format!("{:<width$}", node.code).info(),
                node.sort_order,
                node.name,
                Self::flag(node)
            );
        }
    }

    fn flag(node: &Node) -> String {
        if node.is_active {
            String::new()
        } else {
            format!(" {}", "(deleted)".dim())
        }
    }
}
