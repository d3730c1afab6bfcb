pub mod analyze;
pub mod logs;
pub mod patterns;

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;

use crate::domain::patterns::AnalysisReport;
use crate::domain::FatalError;

/// Check that `source` looks like an extracted cluster report before any
/// pipeline stage touches it.
pub fn validate_source(source: &Path) -> Result<(), FatalError> {
    if !source.is_dir() {
        return Err(FatalError::InvalidSource {
            path: source.to_path_buf(),
            reason: "not a directory; extract the report archive first".to_string(),
        });
    }
    for required in ["description.txt", "analysis.txt"] {
        if !source.join(required).exists() {
            return Err(FatalError::InvalidSource {
                path: source.to_path_buf(),
                reason: format!(
                    "missing {required}; expected an extracted cluster report directory"
                ),
            });
        }
    }
    Ok(())
}

/// Resolve and create the reports directory for a run.
pub fn reports_dir(source: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match output {
        Some(dir) => dir,
        None => {
            let cfg = crate::config::load()?;
            cfg.output_dir
                .unwrap_or_else(|| source.join("reports"))
        }
    };
    std::fs::create_dir_all(&dir).map_err(|err| FatalError::ReportWrite {
        path: dir.clone(),
        source: anyhow::anyhow!("creating reports directory: {err}"),
    })?;
    Ok(dir)
}

pub fn print_findings(analysis: &AnalysisReport) {
    println!("{}", "findings".bold());
    println!(
        "  patterns evaluated: {}, applicable: {}",
        analysis.patterns_total, analysis.patterns_applied
    );
    if analysis.patterns_applied_keys.is_empty() {
        println!("  {}", "no known issues matched this cluster".green());
        return;
    }
    for key in &analysis.patterns_applied_keys {
        let Some(finding) = analysis.results.get(key) else {
            continue;
        };
        println!("  {}", finding.title.red().bold());
        println!("    {}", finding.description);
        for entry in &finding.kb_search_results {
            println!("    {}: {}", entry.id.cyan(), entry.title);
            println!("      {}", entry.url.dimmed());
        }
    }
}
