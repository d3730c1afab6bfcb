//! `clusterlens logs` — combine and chronologically sort per-node log
//! copies without running the analysis pipeline.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use crate::commands::{reports_dir, validate_source};
use crate::domain::log_merge;

pub fn run(source: PathBuf, output: Option<PathBuf>) -> Result<()> {
    validate_source(&source)?;
    let reports = reports_dir(&source, output)?;

    let merged = log_merge::merge_all(&source, &reports);
    println!("{}", "clusterlens logs".bold());
    if merged.is_empty() {
        println!("  no known log files found in any node directory");
        return Ok(());
    }

    for log in &merged {
        println!("  {}", log.log_name.bold());
        println!("    combined: {}", log.combined_path.display());
        println!("    files:    {}", log.files);
        println!("    lines:    {}", log.lines);
        if log.empty_files > 0 {
            println!("    empty:    {}", log.empty_files.to_string().yellow());
        }
        if log.unsorted_files > 0 {
            println!(
                "    skipped:  {} (unknown time format)",
                log.unsorted_files.to_string().yellow()
            );
        }
        if log.parse_failures > 0 {
            println!(
                "    unparsed: {} line(s) placed last",
                log.parse_failures.to_string().yellow()
            );
        }
    }
    Ok(())
}
