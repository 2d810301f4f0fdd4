// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rescan keeps the table aligned with the directory.

use super::prelude::*;

#[test]
fn services_present_at_boot_are_started() {
    let mut catalog = Catalog::new();
    catalog.service("a").run("exec sleep 100");
    catalog.service("b").run("exec sleep 100");
    catalog.start();

    assert!(catalog.wait_state("a", 'D'), "a never came up");
    assert!(catalog.wait_state("b", 'D'), "b never came up");
}

#[test]
fn down_marker_holds_a_service_back() {
    let mut catalog = Catalog::new();
    let quiet = catalog.service("quiet");
    quiet.run("exec sleep 100");
    quiet.file("down", "");
    catalog.start();

    assert!(catalog.wait_state("quiet", 'A'), "quiet should stay down");
    // but it can be brought up explicitly
    catalog.request(b"uquiet");
    assert!(catalog.wait_state("quiet", 'D'));
}

#[test]
fn removed_directory_is_stopped_and_forgotten() {
    let mut catalog = Catalog::new();
    catalog.service("a").run("exec sleep 100");
    catalog.service("b").run("exec sleep 100");
    catalog.start();
    assert!(catalog.wait_state("a", 'D'));
    assert!(catalog.wait_state("b", 'D'));

    std::fs::remove_dir_all(catalog.dir().join("b")).expect("remove b");
    assert_eq!(catalog.request(b"s"), "ok\n");

    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || catalog.query("b").starts_with("error")),
        "b was never forgotten"
    );
    assert_eq!(catalog.state_letter("a"), 'D');
}

#[test]
fn new_directory_appears_after_rescan() {
    let mut catalog = Catalog::new();
    catalog.service("a").run("exec sleep 100");
    catalog.start();
    assert!(catalog.wait_state("a", 'D'));

    catalog.service("late").run("exec sleep 100");
    assert_eq!(catalog.request(b"s"), "ok\n");
    assert!(catalog.wait_state("late", 'D'), "late never appeared");
}
