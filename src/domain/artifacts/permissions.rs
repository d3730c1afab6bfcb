//! permissions.txt — per-node file permission audit results.

use std::path::Path;

use tracing::debug;

use crate::domain::cluster_state::ClusterState;

const FILENAME: &str = "permissions.txt";

/// Every audited entry must read "OK"; one bad line fails the node and
/// drops the cluster-wide tri-state to 0.
pub fn parse(dir: &Path, node_name: &str, state: &mut ClusterState) -> bool {
    let path = dir.join(FILENAME);
    let Some(lines) = super::read_lines(&path) else {
        state.node(node_name).permissions_valid = None;
        return false;
    };
    debug!(node = node_name, path = %path.display(), "parsing permissions audit");

    let mut valid = true;
    for line in &lines {
        if line.trim().is_empty() {
            continue;
        }
        if !line.contains("OK") {
            valid = false;
            state.permissions_valid_all_nodes = 0;
        }
    }
    state.node(node_name).permissions_valid = Some(valid);
    true
}
