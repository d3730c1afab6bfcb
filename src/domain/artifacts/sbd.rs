//! sbd.txt and sbd — storage-based-death slot dump and config file.

use std::path::Path;

use tracing::debug;

use crate::domain::cluster_state::ClusterState;

const STATUS_FILENAME: &str = "sbd.txt";
const CONFIG_FILENAME: &str = "sbd";

/// Slot dump: "0  alpha  clear" rows, one per watchdog slot.
pub fn parse_status(dir: &Path, state: &mut ClusterState) -> bool {
    let path = dir.join(STATUS_FILENAME);
    let Some(lines) = super::read_lines(&path) else {
        return false;
    };
    debug!(path = %path.display(), "parsing SBD slot dump");

    for line in &lines {
        if !line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if tokens.len() < 3 {
            continue;
        }
        let server = tokens[1].clone();
        state
            .stonith
            .sbd
            .nodes
            .entry(server)
            .or_default()
            .slots
            .push(tokens);
    }
    true
}

/// Config file: KEY=value lines, '#' comments skipped. SBD_DEVICE is a
/// ';'-separated device list.
pub fn parse_config(dir: &Path, state: &mut ClusterState) -> bool {
    let path = dir.join(CONFIG_FILENAME);
    let Some(lines) = super::read_lines(&path) else {
        return false;
    };
    debug!(path = %path.display(), "parsing SBD config");

    for raw in &lines {
        if raw.starts_with('#') {
            continue;
        }
        let line = raw.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if key.contains("SBD_DEVICE") {
            state.stonith.sbd.devices = value.split(';').map(str::to_string).collect();
        } else {
            state
                .stonith
                .sbd
                .config
                .insert(key.to_string(), value.to_string());
        }
    }
    true
}

/// Recompute per-node slot cleanliness and the cluster aggregate. The
/// aggregate stays -1 (unknown) until both the slot dump and the config file
/// have been observed at least once.
pub fn compute_all_clear(state: &mut ClusterState, found_status: bool, found_config: bool) {
    if !(found_status && found_config) {
        state.stonith.sbd.all_clear = -1;
        return;
    }

    debug!("computing SBD all_clear aggregate");
    state.stonith.sbd.all_clear = 1;
    for sbd_node in state.stonith.sbd.nodes.values_mut() {
        sbd_node.is_clear = true;
        for slot in &sbd_node.slots {
            if !slot.iter().any(|token| token == "clear") {
                sbd_node.is_clear = false;
                state.stonith.sbd.all_clear = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn dir_with(status: &str, config: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sbd.txt"), status).unwrap();
        fs::write(dir.path().join("sbd"), config).unwrap();
        dir
    }

    #[test]
    fn all_clear_when_every_slot_is_clear() {
        let dir = dir_with(
            "0\talpha\tclear\n1\tbeta\tclear\n",
            "SBD_DEVICE=\"/dev/sda1;/dev/sdb1\"\nSBD_WATCHDOG_TIMEOUT=5\n",
        );
        let mut state = ClusterState::default();
        let found_status = parse_status(dir.path(), &mut state);
        let found_config = parse_config(dir.path(), &mut state);
        compute_all_clear(&mut state, found_status, found_config);

        assert_eq!(state.stonith.sbd.all_clear, 1);
        assert!(state.stonith.sbd.nodes["alpha"].is_clear);
        assert_eq!(state.stonith.sbd.devices, vec!["/dev/sda1", "/dev/sdb1"]);
        assert_eq!(state.stonith.sbd.config["SBD_WATCHDOG_TIMEOUT"], "5");
    }

    #[test]
    fn one_dirty_slot_clears_the_aggregate() {
        let dir = dir_with("0\talpha\tclear\n1\tbeta\treset\talpha\n", "SBD_DEVICE=/dev/sda1\n");
        let mut state = ClusterState::default();
        let found_status = parse_status(dir.path(), &mut state);
        let found_config = parse_config(dir.path(), &mut state);
        compute_all_clear(&mut state, found_status, found_config);

        assert_eq!(state.stonith.sbd.all_clear, 0);
        assert!(state.stonith.sbd.nodes["alpha"].is_clear);
        assert!(!state.stonith.sbd.nodes["beta"].is_clear);
    }

    #[test]
    fn aggregate_unknown_until_both_files_seen() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sbd.txt"), "0\talpha\tclear\n").unwrap();

        let mut state = ClusterState::default();
        let found_status = parse_status(dir.path(), &mut state);
        let found_config = parse_config(dir.path(), &mut state);
        compute_all_clear(&mut state, found_status, found_config);

        assert!(found_status);
        assert!(!found_config);
        assert_eq!(state.stonith.sbd.all_clear, -1);
    }
}
