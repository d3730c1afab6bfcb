//! Builds the cluster model from a collected report tree.
//!
//! The tree holds cluster-wide files at its root (description.txt,
//! analysis.txt, optionally crm_mon.txt) and one subdirectory per collected
//! node. Node directories are walked in sorted name order so repeated runs
//! over the same tree produce identical models.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::domain::artifacts::{cib, crm_mon, members, permissions, sbd, sysinfo, sysstats};
use crate::domain::cluster_state::ClusterState;
use crate::domain::diff_sync;

const DESCRIPTION_FILENAME: &str = "description.txt";
const DC_SENTINEL: &str = "DC";
const RUNNING_SENTINEL: &str = "RUNNING";

/// Per-node subdirectories of the report tree, sorted by node name.
pub fn node_dirs(source_dir: &Path) -> Vec<(String, PathBuf)> {
    let mut dirs = Vec::new();
    if let Ok(entries) = fs::read_dir(source_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                dirs.push((name.to_string(), path));
            }
        }
    }
    dirs.sort();
    dirs
}

fn read_description(source_dir: &Path, state: &mut ClusterState) {
    let path = source_dir.join(DESCRIPTION_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "description file missing");
            return;
        }
    };
    for line in content.lines() {
        if let Some(date) = line.strip_prefix("Date: ") {
            debug!(date, "report date");
            state.report_date = Some(date.to_string());
        }
        if let Some(by) = line.strip_prefix("By: ") {
            debug!(by, "report author");
            state.report_by = Some(by.to_string());
        }
    }
}

fn gather_system_details(source_dir: &Path, state: &mut ClusterState) {
    info!("gathering per-node system details");
    let mut found_sysinfo = false;
    let mut found_permissions = false;

    for (node_name, dir) in node_dirs(source_dir) {
        debug!(node = %node_name, "processing system details");
        found_sysinfo |= sysinfo::parse(&dir, &node_name, state);
        sysstats::parse(&dir, &node_name, state);
        found_permissions |= permissions::parse(&dir, &node_name, state);
    }

    if !found_sysinfo {
        warn!("no system information file found in any node directory");
    }
    if !found_permissions {
        warn!("no permissions audit found in any node directory");
    }
}

fn gather_cluster_crm(source_dir: &Path, state: &mut ClusterState) {
    info!("gathering cluster CRM state");
    let mut found_crm_mon = false;

    for (node_name, dir) in node_dirs(source_dir) {
        debug!(node = %node_name, "processing cluster CRM info");
        state.cnt_nodes_included += 1;
        let facts = state.node(&node_name);
        facts.is_included = true;
        facts.is_dc_local = dir.join(DC_SENTINEL).exists();
        facts.is_running = dir.join(RUNNING_SENTINEL).exists();
        if facts.is_dc_local {
            debug!(node = %node_name, "DC sentinel present");
        }

        found_crm_mon |= crm_mon::parse(&dir, state);
        members::parse(&dir, state);
    }

    // Some collectors leave a single snapshot at the tree root instead.
    if !found_crm_mon && source_dir.join("crm_mon.txt").exists() {
        info!("falling back to monitor snapshot at tree root");
        found_crm_mon = crm_mon::parse(source_dir, state);
    }
    if !found_crm_mon {
        warn!("cluster data incomplete, no monitor snapshot found");
    }
    state.data_complete = state.data_complete && found_crm_mon;

    // Names seen only in status sets still get a node entry.
    let listed: Vec<String> = state
        .nodes_online
        .iter()
        .chain(&state.nodes_offline)
        .chain(&state.nodes_standby)
        .chain(&state.nodes_maintenance)
        .chain(&state.nodes_pending)
        .chain(&state.nodes_unclean)
        .cloned()
        .collect();
    for node_name in listed {
        if !state.nodes.contains_key(&node_name) {
            debug!(node = %node_name, "added node from status set");
            state.node(&node_name).is_included = false;
        }
    }
}

fn gather_cluster_cib(source_dir: &Path, state: &mut ClusterState) {
    info!("gathering cluster information base");
    for (node_name, dir) in node_dirs(source_dir) {
        debug!(node = %node_name, "processing cluster CIB info");
        cib::parse(&dir, &node_name, state);
    }
}

fn gather_stonith_sbd(source_dir: &Path, state: &mut ClusterState) {
    info!("gathering SBD state");
    let mut found_status = false;
    let mut found_config = false;
    for (node_name, dir) in node_dirs(source_dir) {
        debug!(node = %node_name, "processing SBD info");
        found_status |= sbd::parse_status(&dir, state);
        found_config |= sbd::parse_config(&dir, state);
    }
    if !found_status {
        warn!("no SBD slot dump found");
    }
    if !found_config {
        warn!("no SBD configuration file found");
    }
    sbd::compute_all_clear(state, found_status, found_config);
}

/// Resolve the per-node status flags from the cluster-wide sets. Sentinel
/// files already decided `is_running`/`is_dc_local` for included nodes; only
/// stub entries fall back to the online set here.
fn derive_node_states(state: &mut ClusterState) {
    debug!("deriving node states from status sets");
    let online = state.nodes_online.clone();
    let standby = state.nodes_standby.clone();
    let maintenance = state.nodes_maintenance.clone();
    let pending = state.nodes_pending.clone();
    let unclean = state.nodes_unclean.clone();
    let cluster_maintenance = state.cluster_maintenance;

    for (node_name, facts) in &mut state.nodes {
        facts.is_unclean = unclean.contains(node_name);
        facts.is_pending = pending.contains(node_name);
        facts.is_standby = standby.contains(node_name);
        facts.is_maintenance = maintenance.contains(node_name) || cluster_maintenance;
        if !facts.is_included {
            facts.is_running = online.contains(node_name);
        }
    }
}

/// Runs every gathering step over the report tree and returns the finished
/// model. Individual missing or malformed artifacts degrade the model rather
/// than abort the run.
pub fn aggregate(source_dir: &Path, reports_dir: &Path) -> ClusterState {
    let mut state = ClusterState::default();

    read_description(source_dir, &mut state);
    diff_sync::evaluate(source_dir, reports_dir, &mut state);
    gather_system_details(source_dir, &mut state);
    gather_cluster_crm(source_dir, &mut state);
    gather_cluster_cib(source_dir, &mut state);
    if state.stonith.sbd.found {
        gather_stonith_sbd(source_dir, &mut state);
    }
    derive_node_states(&mut state);

    // Without every configured node collected, a cluster-wide permissions
    // verdict cannot be trusted.
    if state.cnt_nodes_configured != i64::from(state.cnt_nodes_included) {
        state.permissions_valid_all_nodes = -1;
    }

    state
}
