//! End-to-end runs of the binary against synthetic report trees.

use std::fs;
use std::path::Path;
use std::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_clusterlens");

const CRM_MON: &str = "\
Cluster Summary:
  * Current DC: alpha (version 2.1.2) - partition with quorum
  * 2 nodes configured
  * 3 resource instances configured

Node List:
  * Online: [ alpha beta ]

Active Resources:
  * stonith-sbd (stonith:external/sbd): Started alpha
";

const ANALYSIS: &str = "\
Diff members.txt... OK
Diff crm_mon.txt... OK
Diff corosync.conf... OK
Diff sysinfo.txt... OK
Diff cib.xml... OK
";

fn write_node(root: &Path, name: &str, pacemaker_version: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("crm_mon.txt"), CRM_MON).unwrap();
    fs::write(dir.join("members.txt"), "alpha beta\n").unwrap();
    fs::write(dir.join("permissions.txt"), "/etc/passwd OK\n").unwrap();
    fs::write(
        dir.join("sysinfo.txt"),
        format!("pacemaker {pacemaker_version}\nDistribution: SUSE Linux Enterprise Server 15 SP4\n"),
    )
    .unwrap();
    fs::write(dir.join("sbd.txt"), format!("0\t{name}\tclear\n")).unwrap();
    fs::write(dir.join("sbd"), "SBD_DEVICE=/dev/sda1\n").unwrap();
    fs::write(dir.join("RUNNING"), "").unwrap();
    fs::write(
        dir.join("journal_pacemaker.log"),
        "2024-03-01T10:00:01.000001 pacemakerd startup\n",
    )
    .unwrap();
}

fn report_tree() -> tempfile::TempDir {
    let source = tempfile::tempdir().unwrap();
    fs::write(
        source.path().join("description.txt"),
        "Date: 2024-03-01 10:22:01\nBy: hb_report 2.1\n",
    )
    .unwrap();
    fs::write(source.path().join("analysis.txt"), ANALYSIS).unwrap();
    write_node(source.path(), "alpha", "2.1.2");
    write_node(source.path(), "beta", "2.1.2");
    source
}

#[test]
fn analyze_writes_reports_and_exits_zero() {
    let source = report_tree();
    let output = Command::new(BIN)
        .args(["analyze", source.path().to_str().unwrap(), "--no-kb-search"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reports = source.path().join("reports");
    assert!(reports.join("report_data.json").exists());
    assert!(reports.join("analysis_data.json").exists());
    assert!(reports.join("combined.journal_pacemaker.log").exists());

    let analysis = fs::read_to_string(reports.join("analysis_data.json")).unwrap();
    assert!(analysis.contains("\"patterns_applied\": 0"));
}

#[test]
fn invalid_source_directory_exits_with_code_two() {
    let empty = tempfile::tempdir().unwrap();
    let output = Command::new(BIN)
        .args(["analyze", empty.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid source directory"));
}

#[test]
fn unwritable_reports_directory_exits_with_code_thirteen() {
    let source = report_tree();
    let blocker = source.path().join("blocker");
    fs::write(&blocker, "").unwrap();

    let output = Command::new(BIN)
        .args([
            "analyze",
            source.path().to_str().unwrap(),
            "--output",
            blocker.join("reports").to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(13));
    assert!(String::from_utf8_lossy(&output.stderr).contains("creating reports directory"));
}

#[test]
fn patterns_reuses_the_stored_model() {
    let source = report_tree();
    // Version drift on beta so a finding is applicable.
    fs::write(
        source.path().join("beta/sysinfo.txt"),
        "pacemaker 2.0.5\nDistribution: SUSE Linux Enterprise Server 15 SP4\n",
    )
    .unwrap();

    let status = Command::new(BIN)
        .args(["analyze", source.path().to_str().unwrap(), "--no-kb-search"])
        .status()
        .unwrap();
    assert!(status.success());

    let reports = source.path().join("reports");
    let output = Command::new(BIN)
        .args(["patterns", reports.to_str().unwrap(), "--no-kb-search"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Package Version Consistency"));
    assert!(stdout.contains("beta"));
}

#[test]
fn logs_merges_copies_chronologically() {
    let source = report_tree();
    fs::write(
        source.path().join("beta/journal_pacemaker.log"),
        "2024-03-01T09:59:59.000001 beta earlier entry\n",
    )
    .unwrap();

    let status = Command::new(BIN)
        .args(["logs", source.path().to_str().unwrap()])
        .status()
        .unwrap();
    assert!(status.success());

    let combined = source
        .path()
        .join("reports/combined.journal_pacemaker.log");
    let content = fs::read_to_string(combined).unwrap();
    let (_, body) = content.split_once("\n\n\n").unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert!(lines[0].contains("beta earlier entry"));
    assert!(lines[1].contains("pacemakerd startup"));
    assert_eq!(lines.len(), 2);
}
