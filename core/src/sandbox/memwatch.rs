//! Resident memory of a set of processes, read from procfs.

use std::fs;

/// Sum of `VmRSS` over `pids`; `None` when none of them is alive.
pub fn total_rss_bytes(pids: &[i32]) -> Option<u64> {
    let mut total = None;
    for pid in pids {
        let Ok(status) = fs::read_to_string(format!("/proc/{}/status", pid)) else {
            continue
        };
        if let Some(rss) = parse_vm_rss(&status) {
            *total.get_or_insert(0) += rss;
        }
    }
    total
}

/// State letter and process group id from a `/proc/<pid>/stat` line.
pub(super) fn parse_stat(stat: &str) -> Option<(char, i32)> {
    // comm may contain spaces and parens, so fields are counted from the last ')'
    let mut fields = stat[stat.rfind(')')? + 1..].split_whitespace();
    let state = fields.next()?.chars().next()?;
    let pgrp = fields.nth(1)?.parse().ok()?;
    Some((state, pgrp))
}

/// `VmRSS` in bytes from `/proc/<pid>/status`; zombies have none.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line["VmRSS:".len()..]
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kib * 1024)
}
