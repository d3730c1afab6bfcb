//! Artifact parsers — one module per known file in a collected node directory.
//!
//! Every parser takes a node directory and the cluster state, fills in what it
//! can, and reports whether the artifact was found. A missing or empty file is
//! a normal case: it logs at debug level and leaves fields at their defaults.

pub mod cib;
pub mod crm_mon;
pub mod members;
pub mod permissions;
pub mod sbd;
pub mod sysinfo;
pub mod sysstats;

use std::path::Path;

use tracing::debug;

/// Read an artifact into lines, or None when missing, unreadable or empty.
pub(crate) fn read_lines(path: &Path) -> Option<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
            if lines.is_empty() {
                debug!(path = %path.display(), "artifact is empty");
                None
            } else {
                Some(lines)
            }
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "artifact missing");
            None
        }
    }
}
