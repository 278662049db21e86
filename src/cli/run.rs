use std::io::IsTerminal;

use crate::error::SagepipeError;
use crate::runtime::{PipelineSummary, Runtime};

use super::output::{print_json, success_line, OutputMode};

pub fn summary_line(summary: &PipelineSummary) -> String {
    if summary.dry_run {
        format!(
            "Dry run: fetched {} contacts, {} rows would be loaded into {}",
            summary.fetched, summary.transformed, summary.table
        )
    } else if summary.row_errors > 0 {
        format!(
            "Fetched {} contacts, {} row errors loading into {}",
            summary.fetched, summary.row_errors, summary.table
        )
    } else {
        format!(
            "Fetched {} contacts, inserted {} rows into {}",
            summary.fetched, summary.inserted, summary.table
        )
    }
}

pub async fn run_pipeline(
    runtime: &Runtime,
    table: Option<&str>,
    dry_run: bool,
    mode: OutputMode,
) -> Result<(), SagepipeError> {
    let summary = runtime.run_pipeline(table, dry_run).await?;
    match mode {
        OutputMode::Json => print_json(&summary),
        OutputMode::Pretty => {
            let is_tty = std::io::stdout().is_terminal();
            println!("{}", success_line(&summary_line(&summary), is_tty));
        }
    }
    Ok(())
}
