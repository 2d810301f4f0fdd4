// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A service with only a `setup` script is a oneshot: permanently
//! "succeeded" once setup finishes.

use super::prelude::*;

#[test]
fn setup_only_service_settles_as_oneshot() {
    let mut catalog = Catalog::new();
    let once = catalog.service("once");
    once.setup("echo ok");
    catalog.start();

    assert_eq!(catalog.request(b"uonce"), "ok\n");
    // ONESHOT is state 5, letter 'E'
    assert!(catalog.wait_state("once", 'E'), "once never became a oneshot");

    let reply = catalog.query("once");
    assert!(reply.starts_with("E0,0,"), "unexpected query reply: {reply}");
}

#[test]
fn oneshot_want_down_returns_it_to_down() {
    let mut catalog = Catalog::new();
    catalog.service("once").setup("exit 0");
    catalog.start();

    catalog.request(b"uonce");
    assert!(catalog.wait_state("once", 'E'));

    assert_eq!(catalog.request(b"donce"), "ok\n");
    assert!(catalog.wait_state("once", 'A'), "oneshot never went down");
}

#[test]
fn failing_setup_backs_off_instead_of_settling() {
    let mut catalog = Catalog::new();
    catalog.service("flaky").setup("exit 1").run("exec sleep 100");
    catalog.start();

    catalog.request(b"uflaky");
    // setup exits 1 over and over: the service oscillates between DELAY
    // and SETUP but never reaches UP
    assert!(catalog.wait_state("flaky", 'I'), "flaky never entered the backoff");
    assert_ne!(catalog.state_letter("flaky"), 'D');
}
