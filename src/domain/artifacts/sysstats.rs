//! sysstats.txt — uptime, load, cpu, memory and task statistics for one node.
//!
//! The file is a concatenation of command outputs, each introduced by a
//! "##### <command>" header line.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::domain::cluster_state::{ClusterState, SysStats};

const FILENAME: &str = "sysstats.txt";

/// Collect the lines of the section whose header contains `marker`.
/// The section ends one line before the next "#####" header.
fn section<'a>(lines: &'a [String], marker: &str) -> (Vec<&'a str>, bool) {
    let mut content = Vec::new();
    let mut found = false;
    let mut in_section = false;

    for (i, line) in lines.iter().enumerate() {
        let next_line = lines.get(i + 1).map(String::as_str).unwrap_or("");
        if in_section {
            content.push(line.as_str());
            found = true;
            if next_line.starts_with("#####") {
                in_section = false;
            }
        } else if line.starts_with("#####") && line.contains(marker) {
            in_section = true;
        }
    }

    (content, found)
}

pub fn parse(dir: &Path, node_name: &str, state: &mut ClusterState) -> bool {
    let path = dir.join(FILENAME);
    let Some(lines) = super::read_lines(&path) else {
        return false;
    };
    debug!(node = node_name, path = %path.display(), "parsing system statistics");

    let mut stats = state
        .node(node_name)
        .sysstats
        .take()
        .unwrap_or_else(SysStats::default);

    let (uptime_info, found_uptime) = section(&lines, "\"uptime\"");
    if found_uptime {
        for entry in &uptime_info {
            if entry.contains("average") {
                parse_uptime_line(entry, &mut stats);
            }
        }
    }

    let (cpu_info, found_cpu) = section(&lines, "cat /proc/cpuinfo");
    if found_cpu {
        stats.cpu_count = cpu_info
            .iter()
            .filter(|l| l.starts_with("processor"))
            .count() as u32;
    }

    let (top_info, found_top) = section(&lines, "top -b -n");
    if found_top {
        for entry in &top_info {
            if entry.starts_with("Tasks:") {
                parse_tasks_line(entry, &mut stats);
            } else if entry.starts_with("%Cpu(s):") {
                parse_cpu_line(entry, &mut stats);
            } else if entry.starts_with("MiB Mem") {
                let fields = labeled_values(entry);
                for (value, label) in &fields {
                    match label.as_str() {
                        "total" => stats.mem.total = *value,
                        "used" => stats.mem.used = *value,
                        _ => {}
                    }
                }
            } else if entry.starts_with("MiB Swap") {
                let fields = labeled_values(entry);
                for (value, label) in &fields {
                    match label.as_str() {
                        "total" => stats.swap.total = *value,
                        "used" => stats.swap.used = *value,
                        // "avail Mem" on the swap line is available memory
                        "avail" => stats.mem.avail = *value,
                        _ => {}
                    }
                }
                if stats.mem.total > 0 && stats.mem.avail >= 0 {
                    stats.mem.avail_percent =
                        100 - (stats.mem.total - stats.mem.avail) * 100 / stats.mem.total;
                }
            }
        }
    }

    state.node(node_name).sysstats = Some(stats);
    true
}

/// "10:42:01 up 5 days 1:02, 3 users, load average: 0.11, 0.22, 0.33"
fn parse_uptime_line(entry: &str, stats: &mut SysStats) {
    if let Some(avg) = entry.split("load average:").nth(1) {
        stats.load_average = avg
            .split(',')
            .filter_map(|v| v.trim().parse::<f64>().ok())
            .collect();
    }

    // Uptime can read "up 5 days 1:02", "up 1 day, 2:03", "up 1:02" or
    // "up 55 min"; normalize everything to minutes.
    let up_re = Regex::new(r"up\s+(?:(\d+)\s+days?,?\s*)?(?:(\d+):(\d+)|(\d+)\s+min)?").unwrap();
    if let Some(caps) = up_re.captures(entry) {
        let days: i64 = caps.get(1).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let hours: i64 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let mins: i64 = caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let bare_mins: i64 = caps.get(4).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let total = days * 1440 + hours * 60 + mins + bare_mins;
        if total > 0 || caps.get(1).is_some() || caps.get(2).is_some() || caps.get(4).is_some() {
            stats.uptime_minutes = total;
        }
    }
}

/// "Tasks: 212 total, 1 running, 211 sleeping, 0 stopped, 0 zombie"
fn parse_tasks_line(entry: &str, stats: &mut SysStats) {
    let words: Vec<&str> = entry.split_whitespace().collect();
    let grab = |i: usize| -> i64 {
        words
            .get(i)
            .and_then(|w| w.parse::<i64>().ok())
            .unwrap_or(-1)
    };
    stats.tasks.total = grab(1);
    stats.tasks.running = grab(3);
    stats.tasks.sleeping = grab(5);
    stats.tasks.stopped = grab(7);
    stats.tasks.zombie = grab(9);
}

/// "%Cpu(s):  1.7 us,  0.8 sy,  0.0 ni, 97.2 id,  0.2 wa,  0.0 hi,  0.1 si,  0.0 st"
fn parse_cpu_line(entry: &str, stats: &mut SysStats) {
    let mut values = entry
        .split(',')
        .enumerate()
        .filter_map(|(i, field)| {
            let words: Vec<&str> = field.split_whitespace().collect();
            let idx = if i == 0 { 1 } else { 0 };
            words.get(idx).and_then(|w| w.parse::<f64>().ok())
        });
    let mut next = |slot: &mut f64| {
        if let Some(v) = values.next() {
            *slot = v;
        }
    };
    next(&mut stats.cpu.user);
    next(&mut stats.cpu.system);
    next(&mut stats.cpu.nice);
    next(&mut stats.cpu.idle);
    next(&mut stats.cpu.wait);
    next(&mut stats.cpu.hard_int);
    next(&mut stats.cpu.soft_int);
    next(&mut stats.cpu.steal_time);
}

/// Extract "<number> <label>" pairs from a top memory line, truncating the
/// number at its decimal point.
fn labeled_values(entry: &str) -> Vec<(i64, String)> {
    let re = Regex::new(r"(\d+)(?:[.+]\d+)?\s+([A-Za-z/]+)").unwrap();
    re.captures_iter(entry)
        .filter_map(|caps| {
            let value = caps.get(1)?.as_str().parse::<i64>().ok()?;
            Some((value, caps.get(2)?.as_str().to_string()))
        })
        .collect()
}
