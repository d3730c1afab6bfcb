//! crm_mon.txt — the cluster monitor snapshot.
//!
//! Source of the quorum/maintenance flags, configured counts, the six node
//! status sets, the DC name, and fencing resource detection.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::domain::cluster_state::ClusterState;

const FILENAME: &str = "crm_mon.txt";

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

pub fn parse(dir: &Path, state: &mut ClusterState) -> bool {
    let path = dir.join(FILENAME);
    let Some(lines) = super::read_lines(&path) else {
        return false;
    };
    debug!(path = %path.display(), "parsing monitor snapshot");

    let bracket_re = Regex::new(r"\[(.*?)\]").unwrap();
    let node_state_re = |word: &str| Regex::new(&format!(r"Node (.*?): {word}")).unwrap();
    let maintenance_re = node_state_re("maintenance");
    let unclean_re = node_state_re("UNCLEAN");
    let standby_re = node_state_re("standby");
    let pending_re = node_state_re("pending");
    let stonith_type_re = Regex::new(r"\(stonith:(.*)\):").unwrap();

    // Snapshots collected twice wrap a second copy after a "##" marker line;
    // only the first copy is read.
    let mut seen_marker = false;

    for raw in &lines {
        let mut line = raw.trim();
        if let Some(rest) = line.strip_prefix("* ") {
            line = rest;
        }

        if line.starts_with("##") {
            if seen_marker {
                break;
            }
            seen_marker = true;
            continue;
        }

        if line.contains("Resource management is DISABLED") {
            debug!("cluster maintenance mode detected");
            state.cluster_maintenance = true;
        }
        if line.contains("partition with quorum") {
            state.has_quorum = true;
        }
        if line.contains("Current DC") {
            if let Some(dc_name) = line.split_whitespace().nth(2) {
                if !state.nodes.contains_key(dc_name) {
                    debug!(node = dc_name, "added DC node from snapshot");
                    state.node(dc_name).is_included = false;
                }
                state.node(dc_name).is_dc_crm = true;
            }
        }
        if line.contains(" nodes configured") {
            if let Some(count) = leading_count(line) {
                state.cnt_nodes_configured = count;
            }
        }
        if line.contains(" resource instances configured") || line.contains(" resources configured")
        {
            if let Some(count) = leading_count(line) {
                state.cnt_resources_configured = count;
            }
        }
        if line.contains("Online: [") {
            if let Some(caps) = bracket_re.captures(line) {
                state.nodes_online = split_names(&caps[1]);
                debug!(nodes = ?state.nodes_online, "online nodes");
            }
        }
        if line.contains("OFFLINE: [") {
            if let Some(caps) = bracket_re.captures(line) {
                state.nodes_offline = split_names(&caps[1]);
                debug!(nodes = ?state.nodes_offline, "offline nodes");
            }
        }
        if line.contains("maintenance") {
            if let Some(caps) = maintenance_re.captures(line) {
                push_unique(&mut state.nodes_maintenance, &caps[1]);
            }
        }
        if line.contains("UNCLEAN") {
            if let Some(caps) = unclean_re.captures(line) {
                push_unique(&mut state.nodes_unclean, &caps[1]);
            }
        }
        if line.contains("standby") {
            if let Some(caps) = standby_re.captures(line) {
                push_unique(&mut state.nodes_standby, &caps[1]);
            }
        }
        if line.contains("pending") {
            if let Some(caps) = pending_re.captures(line) {
                push_unique(&mut state.nodes_pending, &caps[1]);
            }
        }
        if line.contains("stonith:") {
            state.stonith.enabled = true;
            if line.contains("stonith:external/sbd") {
                debug!("stonith:external/sbd found");
                state.stonith.sbd.found = true;
            } else if let Some(caps) = stonith_type_re.captures(line) {
                let fencing_type = caps[1].to_string();
                debug!(fencing = %fencing_type, "stonith agent found");
                state.stonith.other_types.entry(fencing_type).or_insert(true);
            }
        }
    }

    true
}

fn leading_count(line: &str) -> Option<i64> {
    line.split_whitespace().next()?.parse().ok()
}

fn split_names(inner: &str) -> Vec<String> {
    inner.split_whitespace().map(str::to_string).collect()
}
