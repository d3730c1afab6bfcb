//! `clusterlens analyze` — the full pipeline over an extracted report:
//! build the cluster model, persist it, merge logs, evaluate the pattern
//! catalog, and print a summary.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use crate::commands::{print_findings, reports_dir, validate_source};
use crate::config;
use crate::domain::aggregator;
use crate::domain::analysis_store::{DocumentStore, StoredDocument};
use crate::domain::cluster_state::ClusterState;
use crate::domain::log_merge;
use crate::domain::patterns::{KnowledgeBase, PatternEngine};
use crate::domain::FatalError;
use crate::kb::SuseKb;

pub fn run(source: PathBuf, output: Option<PathBuf>, no_kb_search: bool) -> Result<()> {
    validate_source(&source)?;
    let reports = reports_dir(&source, output)?;

    let state = aggregator::aggregate(&source, &reports);

    let report_store = DocumentStore::new(reports.join("report_data.json"));
    report_store
        .write(&StoredDocument::new(state.clone()))
        .map_err(|err| FatalError::ReportWrite {
            path: report_store.path().clone(),
            source: err,
        })?;

    let merged = log_merge::merge_all(&source, &reports);

    let kb_enabled = !no_kb_search && config::load()?.kb_search.unwrap_or(true);
    let kb = kb_enabled.then(SuseKb::new);
    let engine = PatternEngine::new(kb.as_ref().map(|k| k as &dyn KnowledgeBase));
    let analysis = engine.analyze(&state);

    let analysis_store = DocumentStore::new(reports.join("analysis_data.json"));
    analysis_store
        .write(&StoredDocument::new(analysis.clone()))
        .map_err(|err| FatalError::ReportWrite {
            path: analysis_store.path().clone(),
            source: err,
        })?;

    print_summary(&state);
    if !merged.is_empty() {
        println!("{}", "combined logs".bold());
        for log in &merged {
            println!(
                "  {}: {} file(s), {} lines -> {}",
                log.log_name,
                log.files,
                log.lines,
                log.combined_path.display()
            );
        }
    }
    print_findings(&analysis);
    println!(
        "  reports written to {}",
        reports.display().to_string().cyan()
    );
    Ok(())
}

fn tristate(value: i8) -> colored::ColoredString {
    match value {
        1 => "valid".green(),
        0 => "INVALID".red(),
        _ => "unknown".yellow(),
    }
}

fn print_summary(state: &ClusterState) {
    println!("{}", "cluster report".bold());
    if let Some(date) = &state.report_date {
        println!("  collected:   {date}");
    }
    if let Some(by) = &state.report_by {
        println!("  collected by: {by}");
    }
    if !state.data_complete {
        println!("  {}", "warning: cluster data incomplete".yellow());
    }

    println!(
        "  nodes:       {} included, {} configured",
        state.cnt_nodes_included,
        if state.cnt_nodes_configured < 0 {
            "?".to_string()
        } else {
            state.cnt_nodes_configured.to_string()
        }
    );
    for (name, facts) in &state.nodes {
        let mut flags: Vec<&str> = Vec::new();
        flags.push(if facts.is_running { "running" } else { "stopped" });
        if facts.is_dc_crm || facts.is_dc_local {
            flags.push("DC");
        }
        if facts.is_standby {
            flags.push("standby");
        }
        if facts.is_maintenance {
            flags.push("maintenance");
        }
        if facts.is_unclean {
            flags.push("UNCLEAN");
        }
        if facts.is_pending {
            flags.push("pending");
        }
        if !facts.is_included {
            flags.push("(not collected)");
        }
        println!("    {name}: {}", flags.join(" "));
    }

    println!(
        "  quorum:      {}",
        if state.has_quorum {
            "yes".green()
        } else {
            "NO".red()
        }
    );
    println!(
        "  stonith:     {}",
        if state.stonith.enabled {
            "enabled".green()
        } else {
            "DISABLED".red()
        }
    );
    if state.stonith.sbd.found {
        let slots = match state.stonith.sbd.all_clear {
            1 => "all slots clear".green(),
            0 => "DIRTY SLOTS".red(),
            _ => "slots unknown".yellow(),
        };
        println!("  sbd:         {slots}");
    }
    if state.cluster_maintenance {
        println!("  maintenance: {}", "CLUSTER-WIDE".yellow());
    }
    println!("  permissions: {}", tristate(state.permissions_valid_all_nodes));

    let sync = [
        ("members.txt", state.insync.members_txt),
        ("crm_mon.txt", state.insync.crm_mon_txt),
        ("corosync.conf", state.insync.corosync_conf),
        ("sysinfo.txt", state.insync.sysinfo_txt),
        ("cib.xml", state.insync.cib_xml),
    ];
    println!("  in sync:");
    for (name, in_sync) in sync {
        println!(
            "    {name}: {}",
            if in_sync { "OK".green() } else { "DIFFERS".red() }
        );
    }
}
