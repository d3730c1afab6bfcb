//! sysinfo.txt — package versions and OS summary for one node.

use std::path::Path;

use tracing::debug;

use crate::domain::cluster_state::{ClusterState, SysInfo};

const FILENAME: &str = "sysinfo.txt";

/// Reduce a raw package version to its dotted major.minor core.
///
/// The same rule applies to both textual layouts that produce versions:
/// "name version" and "name-version-release". Any release suffix after the
/// first '-' is dropped, then the version keeps at most two dot segments.
pub fn core_version(raw: &str) -> String {
    let version = raw.split('-').next().unwrap_or(raw);
    let segments: Vec<&str> = version.split('.').collect();
    if segments.len() > 2 {
        segments[..2].join(".")
    } else {
        version.to_string()
    }
}

/// Extract the version from a "name-version-release" line, where `skip`
/// dashes belong to the package name itself.
fn dashed_version(line: &str, skip: usize) -> Option<&str> {
    let mut rest = line;
    for _ in 0..=skip {
        rest = rest.split_once('-')?.1;
    }
    Some(rest)
}

fn starts_dashed(line: &str, name: &str) -> bool {
    line.strip_prefix(name)
        .and_then(|r| r.strip_prefix('-'))
        .map(|r| r.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(false)
}

pub fn parse(dir: &Path, node_name: &str, state: &mut ClusterState) -> bool {
    let path = dir.join(FILENAME);
    let Some(lines) = super::read_lines(&path) else {
        return false;
    };
    debug!(node = node_name, path = %path.display(), "parsing system info");

    let mut info = state
        .node(node_name)
        .sysinfo
        .take()
        .unwrap_or_else(SysInfo::default);
    // Distribution words captured from the "corosync <ver> ..." banner line,
    // used as a fallback when the Distribution line names a non-SUSE OS.
    let mut banner_dist: Vec<String> = Vec::new();

    for raw in &lines {
        let line = raw.trim_start();

        if let Some(rest) = line.strip_prefix("CRM Version: ") {
            if let Some(version) = rest.split_whitespace().next() {
                info.versions.insert("crm".into(), version.to_string());
            }
        }

        if let Some(rest) = line.strip_prefix("corosync ") {
            let mut words: Vec<&str> = rest.split_whitespace().collect();
            if let Some(version) = words.first() {
                info.versions.insert("corosync".into(), core_version(version));
            }
            // Banner layout: "corosync <ver> <distribution words ...> <arch>".
            if words.len() > 3 {
                words.pop();
                banner_dist = words[2..].iter().map(|w| w.to_string()).collect();
            }
        } else if starts_dashed(line, "corosync") {
            if let Some(version) = dashed_version(line, 0) {
                info.versions.insert("corosync".into(), core_version(version));
            }
        }

        if let Some(rest) = line.strip_prefix("pacemaker ") {
            if let Some(version) = rest.split_whitespace().next() {
                info.versions.insert("pacemaker".into(), core_version(version));
            }
        } else if starts_dashed(line, "pacemaker") {
            if let Some(version) = dashed_version(line, 0) {
                info.versions.insert("pacemaker".into(), core_version(version));
            }
        }

        if let Some(rest) = line.strip_prefix("resource-agents ") {
            if let Some(version) = rest.split_whitespace().next() {
                info.versions
                    .insert("resource-agents".into(), core_version(version));
            }
        } else if starts_dashed(line, "resource-agents") {
            if let Some(version) = dashed_version(line, 1) {
                info.versions
                    .insert("resource-agents".into(), core_version(version));
            }
        }

        if let Some(rest) = line.strip_prefix("sbd ") {
            if let Some(version) = rest.split_whitespace().next() {
                info.versions.insert("sbd".into(), core_version(version));
            }
        } else if starts_dashed(line, "sbd") {
            if let Some(version) = dashed_version(line, 0) {
                info.versions.insert("sbd".into(), core_version(version));
            }
        }

        if line.starts_with("Platform: ") {
            info.platform = line.split_whitespace().last().map(str::to_string);
        }
        if line.starts_with("Kernel release: ") {
            info.kernel = line.split_whitespace().last().map(str::to_string);
        }
        if line.starts_with("Architecture: ") {
            info.arch = line.split_whitespace().last().map(str::to_string);
        }

        if let Some(dist) = line.strip_prefix("Distribution: ") {
            apply_distribution(&mut info, dist, &banner_dist);
            debug!(node = node_name, distribution = ?info.distribution, "distribution found");
        }
    }

    state.node(node_name).sysinfo = Some(info);
    true
}

fn apply_distribution(info: &mut SysInfo, dist: &str, banner_dist: &[String]) {
    if dist.contains("SUSE Linux Enterprise") {
        let words: Vec<&str> = dist.split_whitespace().collect();
        let last = words.last().copied().unwrap_or_default();
        if last.contains("SP") {
            info.os_version_major = words.get(words.len().wrapping_sub(2)).map(|w| w.to_string());
            info.os_version_minor = Some(last.replace("SP", ""));
        } else {
            info.os_version_major = Some(last.to_string());
            info.os_version_minor = Some("0".into());
        }
        info.distribution = Some(dist.to_string());
    } else if !banner_dist.is_empty() {
        info.distribution = Some(banner_dist.join(" "));
        info.os_version_major = banner_dist.last().cloned();
        info.os_version_minor = Some(String::new());
    } else {
        info.distribution = Some(String::new());
        info.os_version_major = Some(String::new());
        info.os_version_minor = Some(String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn core_version_is_layout_independent() {
        assert_eq!(core_version("2.1.2"), "2.1");
        assert_eq!(core_version("2.1.2-150400.2.43"), "2.1");
        assert_eq!(core_version("2.1.2+20211124.ada5c3b36-150400.2.43"), "2.1");
        assert_eq!(core_version("3.5"), "3.5");
    }

    #[test]
    fn parses_both_package_layouts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node1")).unwrap();
        fs::write(
            dir.path().join("node1/sysinfo.txt"),
            "CRM Version: 2.1.2 (ada5c3b36)\n\
             pacemaker 2.1.2\n\
             corosync-2.4.5-12.7.1\n\
             resource-agents-4.10.0-150500.46.12.3\n\
             sbd-1.5.1-150400.3.5\n\
             Platform: Linux\n\
             Kernel release: 5.14.21-150400.24.100\n\
             Architecture: x86_64\n\
             Distribution: SUSE Linux Enterprise Server 15 SP4\n",
        )
        .unwrap();

        let mut state = ClusterState::default();
        let found = parse(&dir.path().join("node1"), "node1", &mut state);
        assert!(found);

        let info = state.nodes["node1"].sysinfo.as_ref().unwrap();
        assert_eq!(info.versions["crm"], "2.1.2");
        assert_eq!(info.versions["pacemaker"], "2.1");
        assert_eq!(info.versions["corosync"], "2.4");
        assert_eq!(info.versions["resource-agents"], "4.10");
        assert_eq!(info.versions["sbd"], "1.5");
        assert_eq!(info.platform.as_deref(), Some("Linux"));
        assert_eq!(info.arch.as_deref(), Some("x86_64"));
        assert_eq!(info.os_version_major.as_deref(), Some("15"));
        assert_eq!(info.os_version_minor.as_deref(), Some("4"));
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ClusterState::default();
        assert!(!parse(dir.path(), "node1", &mut state));
        assert!(state.nodes.is_empty());
    }
}
