//! analysis.txt — the cluster-wide comparison summary.
//!
//! The collector diffs five artifacts across nodes and writes one section per
//! category: a "Diff <name> ... OK" line when the copies match, or the raw
//! difference lines when they do not. Each out-of-sync section is extracted
//! into its own diff_<category>.txt artifact under the reports directory.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::cluster_state::{ClusterState, DiffArtifact, SyncFlags};

const FILENAME: &str = "analysis.txt";

struct Category {
    marker: &'static str,
    diff_file: &'static str,
    diff_key: &'static str,
    flag: fn(&mut SyncFlags) -> &mut bool,
}

const CATEGORIES: &[Category] = &[
    Category {
        marker: "Diff members.txt",
        diff_file: "diff_members.txt",
        diff_key: "diff_members_txt",
        flag: |f| &mut f.members_txt,
    },
    Category {
        marker: "Diff crm_mon.txt",
        diff_file: "diff_crm_mon.txt",
        diff_key: "diff_crm_mon_txt",
        flag: |f| &mut f.crm_mon_txt,
    },
    Category {
        marker: "Diff corosync.conf",
        diff_file: "diff_corosync_conf.txt",
        diff_key: "diff_corosync_conf",
        flag: |f| &mut f.corosync_conf,
    },
    Category {
        marker: "Diff sysinfo.txt",
        diff_file: "diff_sysinfo.txt",
        diff_key: "diff_sysinfo_txt",
        flag: |f| &mut f.sysinfo_txt,
    },
    Category {
        marker: "Diff cib.xml",
        diff_file: "diff_cib_xml.txt",
        diff_key: "diff_cib_xml",
        flag: |f| &mut f.cib_xml,
    },
];

/// A line that ends the current diff section.
fn is_section_start(line: &str) -> bool {
    line.starts_with("Diff") || line.starts_with("Checking problems with ")
}

fn write_diff_file(reports_dir: &Path, diff_file: &str, content: &[String]) -> std::path::PathBuf {
    let path = reports_dir.join(diff_file);
    info!(path = %path.display(), "writing differences data file");
    let mut body = content.join("\n");
    body.push('\n');
    if let Err(err) = std::fs::write(&path, body) {
        warn!(path = %path.display(), error = %err, "failed to write differences file");
    }
    path
}

/// Reads the comparison summary, sets the per-category in-sync flags, and
/// extracts each out-of-sync section to a diff artifact. A missing summary
/// marks the cluster data incomplete and leaves every flag at its false
/// default.
pub fn evaluate(source_dir: &Path, reports_dir: &Path, state: &mut ClusterState) -> bool {
    let path = source_dir.join(FILENAME);
    let lines = match std::fs::read_to_string(&path) {
        Ok(content) => content.lines().map(str::to_string).collect::<Vec<_>>(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "comparison summary missing, in-sync flags are unreliable");
            state.data_complete = false;
            return false;
        }
    };
    info!(path = %path.display(), "evaluating differences");

    let mut active: Option<&Category> = None;
    let mut diff_content: Vec<String> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let next_line = lines.get(i + 1).map(String::as_str).unwrap_or("");
        let at_end = i == lines.len() - 1;

        if let Some(category) = active {
            diff_content.push(line.clone());
            if is_section_start(next_line) || at_end {
                let diff_path = write_diff_file(reports_dir, category.diff_file, &diff_content);
                state.diffs.insert(
                    category.diff_key.to_string(),
                    DiffArtifact {
                        path: diff_path,
                        count: diff_content.len(),
                    },
                );
                active = None;
                diff_content = Vec::new();
            }
            continue;
        }

        for category in CATEGORIES {
            if line.contains(category.marker) {
                debug!(category = category.marker, "evaluating sync state");
                if line.contains("OK") {
                    *(category.flag)(&mut state.insync) = true;
                } else {
                    *(category.flag)(&mut state.insync) = false;
                    debug!(category = category.marker, "differences found");
                    if is_section_start(next_line) || at_end {
                        // Zero-line block: close it before the next marker.
                        let diff_path =
                            write_diff_file(reports_dir, category.diff_file, &diff_content);
                        state.diffs.insert(
                            category.diff_key.to_string(),
                            DiffArtifact {
                                path: diff_path,
                                count: 0,
                            },
                        );
                    } else {
                        active = Some(category);
                    }
                }
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SUMMARY: &str = "\
Diff members.txt... OK
Diff crm_mon.txt...
--- alpha/crm_mon.txt
+++ beta/crm_mon.txt
@@ -1,3 +1,3 @@
Diff corosync.conf... OK
Diff sysinfo.txt... OK
Diff cib.xml... OK
Checking problems with permissions/ownership at alpha... OK
";

    #[test]
    fn out_of_sync_section_yields_diff_artifact() {
        let source = tempfile::tempdir().unwrap();
        let reports = tempfile::tempdir().unwrap();
        fs::write(source.path().join("analysis.txt"), SUMMARY).unwrap();

        let mut state = ClusterState::default();
        assert!(evaluate(source.path(), reports.path(), &mut state));

        assert!(state.insync.members_txt);
        assert!(!state.insync.crm_mon_txt);
        assert!(state.insync.corosync_conf);
        assert!(state.insync.sysinfo_txt);
        assert!(state.insync.cib_xml);
        assert!(state.data_complete);

        let artifact = &state.diffs["diff_crm_mon_txt"];
        assert_eq!(artifact.count, 3);
        let written = fs::read_to_string(&artifact.path).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert!(written.starts_with("--- alpha/crm_mon.txt"));
    }

    #[test]
    fn trailing_section_is_flushed_at_end_of_file() {
        let source = tempfile::tempdir().unwrap();
        let reports = tempfile::tempdir().unwrap();
        fs::write(
            source.path().join("analysis.txt"),
            "Diff cib.xml...\n--- alpha/cib.xml\n+++ beta/cib.xml\n",
        )
        .unwrap();

        let mut state = ClusterState::default();
        assert!(evaluate(source.path(), reports.path(), &mut state));
        assert!(!state.insync.cib_xml);
        assert_eq!(state.diffs["diff_cib_xml"].count, 2);
    }

    #[test]
    fn empty_diff_block_leaves_the_next_marker_intact() {
        let source = tempfile::tempdir().unwrap();
        let reports = tempfile::tempdir().unwrap();
        fs::write(
            source.path().join("analysis.txt"),
            "Diff members.txt...\nDiff crm_mon.txt... OK\nDiff sysinfo.txt...\n",
        )
        .unwrap();

        let mut state = ClusterState::default();
        assert!(evaluate(source.path(), reports.path(), &mut state));

        assert!(!state.insync.members_txt);
        assert!(state.insync.crm_mon_txt);
        assert!(!state.insync.sysinfo_txt);
        assert_eq!(state.diffs["diff_members_txt"].count, 0);
        assert_eq!(state.diffs["diff_sysinfo_txt"].count, 0);
    }

    #[test]
    fn missing_summary_marks_data_incomplete() {
        let source = tempfile::tempdir().unwrap();
        let reports = tempfile::tempdir().unwrap();

        let mut state = ClusterState::default();
        assert!(!evaluate(source.path(), reports.path(), &mut state));
        assert!(!state.data_complete);
        assert!(!state.insync.members_txt);
        assert!(state.diffs.is_empty());
    }
}
