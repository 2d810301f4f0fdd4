// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-restart backoff and operator-driven restarts.

use super::prelude::*;

#[test]
fn crashing_service_cycles_through_the_respawn_backoff() {
    let mut catalog = Catalog::new();
    catalog.service("crash").run("sleep 1; exit 1");
    catalog.start();

    catalog.request(b"ucrash");
    assert!(catalog.wait_state("crash", 'C'), "crash never started");
    // the run process dies while starting: the service falls into DELAY
    assert!(catalog.wait_state("crash", 'I'), "crash never hit the backoff");
    // and respawns after the backoff, indefinitely
    assert!(catalog.wait_state("crash", 'C'), "crash never respawned");
    assert!(catalog.wait_state("crash", 'I'), "crash never backed off again");
}

#[test]
fn restart_verb_replaces_the_main_process() {
    let mut catalog = Catalog::new();
    catalog.service("svc").run("exec sleep 100");
    catalog.start();

    catalog.request(b"usvc");
    assert!(catalog.wait_state("svc", 'D'));
    let first = catalog.query("svc");

    assert_eq!(catalog.request(b"rsvc"), "ok\n");
    assert!(catalog.wait_state("svc", 'D'), "svc never came back up");
    let second = catalog.query("svc");

    let pid = |reply: &str| -> String {
        reply[1..].split(',').next().unwrap_or_default().to_string()
    };
    assert_ne!(pid(&first), pid(&second), "restart kept the old pid");
}

#[test]
fn up_is_idempotent_on_a_running_service() {
    let mut catalog = Catalog::new();
    catalog.service("svc").run("exec sleep 100");
    catalog.start();

    catalog.request(b"usvc");
    assert!(catalog.wait_state("svc", 'D'));
    let before = catalog.query("svc");

    assert_eq!(catalog.request(b"usvc"), "ok\n");
    assert_eq!(catalog.request(b"usvc"), "ok\n");
    let after = catalog.query("svc");

    let pid = |reply: &str| -> String {
        reply[1..].split(',').next().unwrap_or_default().to_string()
    };
    assert_eq!(pid(&before), pid(&after), "repeated up replaced the process");
    assert!(after.starts_with('D'), "repeated up changed the state: {after}");
}
