//! `clusterlens patterns` — re-evaluate the rule catalog against a stored
//! cluster model without re-reading the report tree.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::commands::print_findings;
use crate::config;
use crate::domain::analysis_store::{DocumentStore, StoredDocument};
use crate::domain::cluster_state::ClusterState;
use crate::domain::patterns::{KnowledgeBase, PatternEngine};
use crate::domain::FatalError;
use crate::kb::SuseKb;

pub fn run(reports: PathBuf, no_kb_search: bool) -> Result<()> {
    let report_store = DocumentStore::new(reports.join("report_data.json"));
    if !report_store.exists() {
        bail!(
            "no stored cluster model at {}; run `clusterlens analyze` first",
            report_store.path().display()
        );
    }
    let stored: StoredDocument<ClusterState> = report_store.read()?;

    let kb_enabled = !no_kb_search && config::load()?.kb_search.unwrap_or(true);
    let kb = kb_enabled.then(SuseKb::new);
    let engine = PatternEngine::new(kb.as_ref().map(|k| k as &dyn KnowledgeBase));
    let analysis = engine.analyze(&stored.data);

    let analysis_store = DocumentStore::new(reports.join("analysis_data.json"));
    analysis_store
        .write(&StoredDocument::new(analysis.clone()))
        .map_err(|err| FatalError::ReportWrite {
            path: analysis_store.path().clone(),
            source: err,
        })?;

    print_findings(&analysis);
    Ok(())
}
