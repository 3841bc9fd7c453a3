use std::process;

use clap::Parser;
use costlib::{domain::code, Code, Level};
use serde::Serialize;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Check a code's format, hierarchy and sort key")]
pub struct Command {
    /// The code to check
    code: String,

    /// Level to check against; inferred from the number of groups if omitted
    #[arg(long, short)]
    level: Option<Level>,

    /// Check that the code sits directly under this parent code
    #[arg(long, short)]
    parent: Option<String>,

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

#[derive(Debug, Serialize)]
struct Report {
    code: String,
    level: Option<Level>,
    valid: bool,
    format_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hierarchy_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_key: Option<u64>,
    parent_code: String,
}

impl Command {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) {
        let code = self.code.as_str();
        let level = self
            .level
            .or_else(|| code.parse::<Code>().ok().map(|c| c.level()));

        let format_ok = level.is_some_and(|level| code::validate_code(code, level));
        let hierarchy_ok = self
            .parent
            .as_deref()
            .map(|parent| code::validate_hierarchy(code, parent));
        let sort_key = if format_ok {
            code::sort_key(code).ok()
        } else {
            None
        };

        let report = Report {
            code: code.to_string(),
            level,
            valid: format_ok && hierarchy_ok.unwrap_or(true),
            format_ok,
            hierarchy_ok,
            sort_key,
            parent_code: code::parent_code(code),
        };

        match self.output {
            OutputFormat::Json => match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Failed to serialize report: {e}"),
            },
            OutputFormat::Table => Self::output_table(&report, self.parent.as_deref()),
        }

        if !report.valid {
            process::exit(1);
        }
    }

    fn output_table(report: &Report, parent: Option<&str>) {
        let mark = |ok: bool| if ok { "✅" } else { "❌" };

        match report.level {
            Some(level) => println!(
                "Format:    {} {} ({})",
                mark(report.format_ok),
                level,
                level.pattern().dim()
            ),
            None => println!(
                "Format:    {} {}",
                mark(false),
                "not one to four two-digit groups".warning()
            ),
        }
        if let (Some(ok), Some(parent)) = (report.hierarchy_ok, parent) {
            println!("Hierarchy: {} under {}", mark(ok), parent.info());
        }
        if let Some(sort_key) = report.sort_key {
            println!("Sort key:  {sort_key}");
        }
        if !report.parent_code.is_empty() {
            println!("Parent:    {}", report.parent_code.info());
        }
    }
}
