//! members.txt — the cluster membership list.
//!
//! The last non-empty line holds the space-separated node names. Names seen
//! here but lacking their own directory become stub entries.

use std::path::Path;

use tracing::debug;

use crate::domain::cluster_state::ClusterState;

const FILENAME: &str = "members.txt";

pub fn parse(dir: &Path, state: &mut ClusterState) -> bool {
    let path = dir.join(FILENAME);
    let Some(lines) = super::read_lines(&path) else {
        return false;
    };

    let node_list: Vec<String> = lines
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    for node_name in node_list {
        if !state.nodes.contains_key(&node_name) {
            debug!(node = %node_name, "added node from membership list");
            state.node(&node_name).is_included = false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn creates_stub_entries_without_clobbering() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("members.txt"), "alpha beta gamma\n").unwrap();

        let mut state = ClusterState::default();
        state.node("alpha").is_included = true;

        assert!(parse(dir.path(), &mut state));
        assert!(state.nodes["alpha"].is_included);
        assert!(!state.nodes["beta"].is_included);
        assert!(!state.nodes["gamma"].is_included);
        assert_eq!(state.nodes.len(), 3);
    }
}
