use clap::Parser;
use costlib::library::LevelCount;
use tracing::instrument;

use super::{
    terminal::{is_narrow, Colorize},
    Context,
};

#[derive(Debug, Parser, Default)]
#[command(about = "Show active and deleted row counts per level")]
pub struct Command {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Command {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let library = context.open()?;
        let counts = library.counts()?;

        match self.output {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            }
            OutputFormat::Table if self.quiet => Self::output_quiet(&counts),
            OutputFormat::Table => {
                let total: usize = counts.iter().map(|c| c.active).sum();
                if total == 0 {
                    println!(
                        "The catalog is empty. Create a division with \
                         'costlib create division --name <NAME>'."
                    );
                    return Ok(());
                }
                Self::output_table(&counts, total);
            }
        }

        Ok(())
    }

    fn output_quiet(counts: &[LevelCount]) {
        let fields: Vec<String> = counts
            .iter()
            .map(|c| format!("{}={}", c.level.plural(), c.active))
            .collect();
        println!("{}", fields.join(" "));
    }

    fn output_table(counts: &[LevelCount], total: usize) {
        println!("Catalog rows");
        println!("{}", "────────────".dim());

        if is_narrow() {
            for count in counts {
                println!(
                    "{}: {} ({} deleted)",
                    count.level.plural(),
                    count.active,
                    count.inactive
                );
            }
        } else {
            println!("{:<12} {:<8} Deleted", "Level", "Active");
            for count in counts {
                let deleted = if count.inactive == 0 {
                    "–".dim()
                } else {
                    count.inactive.to_string().warning()
                };
                println!("{:<12} {:<8} {deleted}", count.level.plural(), count.active);
            }
        }
        println!("Total        {}", total.to_string().success());
    }
}
