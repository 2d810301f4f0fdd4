// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reply rendering for control requests.

use warden_core::ServiceState;

pub const OK: &str = "ok\n";
pub const ERROR: &str = "error\n";

/// The wire-visible slice of one service slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRow<'a> {
    pub name: &'a str,
    pub state: ServiceState,
    /// Main process id, 0 when not running
    pub pid: i32,
    /// Raw wait status of the last exit; -1 after a failed exec
    pub wstatus: i32,
    /// Seconds since the last state-defining transition
    pub uptime_secs: i64,
}

/// `l`: one `name,state,pid,wstatus,uptime` line per service.
pub fn render_list<'a>(rows: impl IntoIterator<Item = ServiceRow<'a>>) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            row.name,
            row.state.code(),
            row.pid,
            row.wstatus,
            row.uptime_secs
        ));
    }
    out
}

/// `?name`: `<state-letter>pid,wstatus,uptime`.
pub fn render_query(row: &ServiceRow<'_>) -> String {
    format!("{}{},{},{}\n", row.state.letter(), row.pid, row.wstatus, row.uptime_secs)
}

/// `#`: engine counters.
pub fn render_stats(pid: u32, services: usize, total_reaps: u64, service_reaps: u64) -> String {
    format!("# {pid} {services} {total_reaps} {service_reaps}\n")
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
