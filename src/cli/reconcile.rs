use clap::Parser;
use costlib::domain::reconcile::Plan;
use tracing::instrument;

use super::{prompt_to_proceed, terminal::Colorize, Context};

#[derive(Debug, Parser)]
pub struct Command {
    /// Merge the duplicates instead of only reporting them
    #[arg(long)]
    apply: bool,

    /// Skip the confirmation prompt when applying
    #[arg(long, short)]
    yes: bool,

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
    #[instrument(skip(context))]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut library = context.open()?;
        let report = library.reconcile(false)?;

        if report.plan.is_empty() {
            match self.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => println!("No duplicate rows found ✅"),
            }
            return Ok(());
        }

        if matches!(self.output, OutputFormat::Table) {
            Self::output_plan(&report.plan);
        }

        if !self.apply {
            match self.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => {
                    println!();
                    println!("{}", "Run with --apply to merge them.".dim());
                }
            }
            return Ok(());
        }

        if !self.yes {
            prompt_to_proceed()?;
        }

        let report = library.reconcile(true)?;
        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => println!(
                "{}",
                format!(
                    "✅ Merged {} duplicate group(s), deleted {} row(s)",
                    report.plan.groups.len(),
                    report.plan.delete.len()
                )
                .success()
            ),
        }
        Ok(())
    }

    fn output_plan(plan: &Plan) {
        println!(
            "{}",
            format!("Found {} duplicate group(s):", plan.groups.len()).warning()
        );
        for group in &plan.groups {
            let losers: Vec<String> = group
                .duplicates
                .iter()
                .map(|(_, code)| code.to_string())
                .collect();
            println!(
                "  • {} '{}': keep {}, remove {}",
                group.level,
                group.name,
                group.canonical.1.to_string().info(),
                losers.join(", ")
            );
        }

        if !plan.recode.is_empty() {
            println!();
            println!("Codes that will change:");
            for recode in &plan.recode {
                println!("  • {} → {}", recode.from, recode.to.to_string().info());
            }
        }

        if !plan.reparent.is_empty() {
            println!();
            println!(
                "{}",
                format!("{} row(s) will move to a new parent", plan.reparent.len()).dim()
            );
        }
    }
}
