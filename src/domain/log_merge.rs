//! Chronological merging of per-node log copies.
//!
//! Each known log-file name is collected from every node directory, parsed
//! with a per-name preference order of timestamp formats, and written to a
//! single combined.<name> file: a manifest header naming the adopted format
//! per source file, a blank separator, then all lines sorted by timestamp.
//! Lines whose timestamp cannot be parsed sort after every parsed line, in
//! input order.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::domain::aggregator::node_dirs;

const MAX_HEADER_LINES: usize = 100;

/// Timestamp layouts seen in collected cluster logs. The trim width is how
/// many leading bytes of a line hold the timestamp.
const DATE_FORMATS: &[(&str, usize)] = &[
    ("%Y-%m-%dT%H:%M:%S%.f", 26),
    ("%b %d %H:%M:%S%.f", 19),
    ("%b %d %H:%M:%S", 15),
];

/// Known log names and the order in which to try `DATE_FORMATS` for each.
const LOG_CATALOG: &[(&str, &[usize])] = &[
    ("pacemaker.log", &[1, 2, 0]),
    ("corosync.log", &[2, 1, 0]),
    ("journal_corosync.log", &[0, 1, 2]),
    ("journal_pacemaker.log", &[0, 1, 2]),
    ("journal_sbd.log", &[0, 1, 2]),
    ("ha-log.txt", &[0, 1, 2]),
];

/// Outcome of merging one log name across all node directories.
#[derive(Debug)]
pub struct MergedLog {
    pub log_name: String,
    pub combined_path: PathBuf,
    pub files: usize,
    pub empty_files: usize,
    pub unsorted_files: usize,
    pub lines: usize,
    pub parse_failures: usize,
}

enum Probe {
    Empty,
    Unsortable,
    Format(usize),
}

fn parse_timestamp(line: &str, format: &str, trim: usize) -> Option<NaiveDateTime> {
    let prefix = line.get(..trim).unwrap_or(line);
    let mut parsed = Parsed::new();
    parse(&mut parsed, prefix, StrftimeItems::new(format)).ok()?;
    // Syslog-style stamps carry no year; pin one so the value is comparable.
    if parsed.year().is_none() {
        parsed.set_year(1900).ok()?;
    }
    parsed.to_naive_datetime_with_offset(0).ok()
}

/// Probe the first lines of a file for the first format in `eval_order` that
/// parses any of them.
fn probe_format(path: &Path, eval_order: &[usize]) -> std::io::Result<Probe> {
    let content = fs::read_to_string(path)?;
    let header: Vec<&str> = content.lines().take(MAX_HEADER_LINES).collect();
    if header.is_empty() {
        return Ok(Probe::Empty);
    }
    for &idx in eval_order {
        let (format, trim) = DATE_FORMATS[idx];
        if header
            .iter()
            .any(|line| parse_timestamp(line.trim(), format, trim).is_some())
        {
            debug!(path = %path.display(), format, "adopted timestamp format");
            return Ok(Probe::Format(idx));
        }
    }
    Ok(Probe::Unsortable)
}

fn merge_one(
    log_name: &str,
    eval_order: &[usize],
    sources: &[PathBuf],
    reports_dir: &Path,
) -> Option<MergedLog> {
    let combined_path = reports_dir.join(format!("combined.{log_name}"));
    info!(files = sources.len(), path = %combined_path.display(), "combining log files");

    let mut manifest: Vec<String> = Vec::new();
    let mut entries: Vec<(NaiveDateTime, String)> = Vec::new();
    let mut empty_files = 0;
    let mut unsorted_files = 0;
    let mut parse_failures = 0;

    for path in sources {
        let probe = match probe_format(path, eval_order) {
            Ok(probe) => probe,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable log file");
                manifest.push(format!("unreadable: {}", path.display()));
                continue;
            }
        };
        let idx = match probe {
            Probe::Empty => {
                debug!(path = %path.display(), "empty log file");
                manifest.push(format!("empty: {}", path.display()));
                empty_files += 1;
                continue;
            }
            Probe::Unsortable => {
                debug!(path = %path.display(), "no known timestamp format");
                manifest.push(format!("unsorted, unknown time format: {}", path.display()));
                unsorted_files += 1;
                continue;
            }
            Probe::Format(idx) => idx,
        };
        let (format, trim) = DATE_FORMATS[idx];
        manifest.push(format!("{format}: {}", path.display()));

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable log file");
                continue;
            }
        };
        for raw in content.lines() {
            let line = raw.trim();
            match parse_timestamp(line, format, trim) {
                Some(timestamp) => entries.push((timestamp, line.to_string())),
                None => {
                    // Kept verbatim, ordered after all parsed lines.
                    parse_failures += 1;
                    entries.push((NaiveDateTime::MAX, line.to_string()));
                }
            }
        }
    }

    if empty_files == sources.len() {
        warn!(log = log_name, "all copies were empty");
    }
    if unsorted_files > 0 {
        warn!(
            log = log_name,
            skipped = unsorted_files,
            total = sources.len(),
            "copies skipped, unexpected time format"
        );
    }

    // Stable sort: ties and unparseable lines keep walk order.
    entries.sort_by_key(|(timestamp, _)| *timestamp);

    let mut output = manifest.join("\n");
    output.push_str("\n\n\n");
    for (_, line) in &entries {
        output.push_str(line);
        output.push('\n');
    }
    if let Err(err) = fs::write(&combined_path, output) {
        warn!(path = %combined_path.display(), error = %err, "failed to write combined log");
        return None;
    }

    Some(MergedLog {
        log_name: log_name.to_string(),
        combined_path,
        files: sources.len(),
        empty_files,
        unsorted_files,
        lines: entries.len(),
        parse_failures,
    })
}

/// Merge every cataloged log name found in the tree. Names with no copies in
/// any node directory are skipped.
pub fn merge_all(source_dir: &Path, reports_dir: &Path) -> Vec<MergedLog> {
    info!("combining and sorting log files");
    let dirs = node_dirs(source_dir);
    let mut merged = Vec::new();

    for (log_name, eval_order) in LOG_CATALOG {
        let sources: Vec<PathBuf> = dirs
            .iter()
            .map(|(_, dir)| dir.join(log_name))
            .filter(|path| path.exists())
            .collect();
        if sources.is_empty() {
            debug!(log = log_name, "no copies found");
            continue;
        }
        if let Some(result) = merge_one(log_name, eval_order, &sources, reports_dir) {
            merged.push(result);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree_with_logs(logs: &[(&str, &str, &str)]) -> (tempfile::TempDir, tempfile::TempDir) {
        let source = tempfile::tempdir().unwrap();
        let reports = tempfile::tempdir().unwrap();
        for (node, name, content) in logs {
            let dir = source.path().join(node);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), content).unwrap();
        }
        (source, reports)
    }

    fn body_lines(combined: &Path) -> Vec<String> {
        let content = fs::read_to_string(combined).unwrap();
        let (_, body) = content.split_once("\n\n\n").unwrap();
        body.lines().map(str::to_string).collect()
    }

    #[test]
    fn merges_iso_stamped_copies_chronologically() {
        let (source, reports) = tree_with_logs(&[
            (
                "beta",
                "journal_pacemaker.log",
                "2024-03-01T10:00:02.000001 beta second\n2024-03-01T10:00:04.000001 beta fourth\n",
            ),
            (
                "alpha",
                "journal_pacemaker.log",
                "2024-03-01T10:00:01.000001 alpha first\n2024-03-01T10:00:03.000001 alpha third\n",
            ),
        ]);

        let merged = merge_all(source.path(), reports.path());
        assert_eq!(merged.len(), 1);
        let result = &merged[0];
        assert_eq!(result.files, 2);
        assert_eq!(result.lines, 4);
        assert_eq!(result.parse_failures, 0);

        let body = body_lines(&result.combined_path);
        assert!(body[0].contains("alpha first"));
        assert!(body[1].contains("beta second"));
        assert!(body[2].contains("alpha third"));
        assert!(body[3].contains("beta fourth"));
    }

    #[test]
    fn unparseable_lines_sort_last_verbatim() {
        let (source, reports) = tree_with_logs(&[(
            "alpha",
            "corosync.log",
            "Mar 01 10:00:02 later entry\ncontinuation without timestamp\nMar 01 10:00:01 earlier entry\n",
        )]);

        let merged = merge_all(source.path(), reports.path());
        let result = &merged[0];
        assert_eq!(result.parse_failures, 1);

        let body = body_lines(&result.combined_path);
        assert!(body[0].contains("earlier entry"));
        assert!(body[1].contains("later entry"));
        assert_eq!(body[2], "continuation without timestamp");
    }

    #[test]
    fn merge_is_stable_across_runs() {
        let (source, reports) = tree_with_logs(&[
            ("alpha", "pacemaker.log", "Mar 01 10:00:01.000001 alpha tie\n"),
            ("beta", "pacemaker.log", "Mar 01 10:00:01.000001 beta tie\n"),
        ]);

        let first = body_lines(&merge_all(source.path(), reports.path())[0].combined_path);
        let second = body_lines(&merge_all(source.path(), reports.path())[0].combined_path);
        assert_eq!(first, second);
        // Sorted directory walk puts alpha's copy first on every run.
        assert!(first[0].contains("alpha tie"));
    }

    #[test]
    fn empty_and_unknown_format_copies_are_noted_in_manifest() {
        let (source, reports) = tree_with_logs(&[
            ("alpha", "ha-log.txt", ""),
            ("beta", "ha-log.txt", "no timestamps here at all\njust text\n"),
        ]);

        let merged = merge_all(source.path(), reports.path());
        let result = &merged[0];
        assert_eq!(result.empty_files, 1);
        assert_eq!(result.unsorted_files, 1);
        assert_eq!(result.lines, 0);

        let content = fs::read_to_string(&result.combined_path).unwrap();
        assert!(content.contains("empty:"));
        assert!(content.contains("unsorted, unknown time format:"));
    }
}
