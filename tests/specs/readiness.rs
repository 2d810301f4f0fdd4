// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Readiness pipes: with a `notification-fd` file the service stays
//! STARTING until it writes a newline on the named descriptor.

use super::prelude::*;

#[test]
fn newline_on_the_notification_fd_promotes_to_up() {
    let mut catalog = Catalog::new();
    let slow = catalog.service("slow");
    slow.file("notification-fd", "3");
    slow.run("sleep 1; echo ready >&3; exec sleep 100");
    catalog.start();

    assert_eq!(catalog.request(b"uslow"), "ok\n");
    // before the readiness byte arrives the service reports STARTING
    assert_eq!(catalog.state_letter("slow"), 'C');

    assert!(catalog.wait_state("slow", 'D'), "slow never became ready");
}

#[test]
fn without_readiness_the_service_waits_indefinitely() {
    let mut catalog = Catalog::new();
    let mute = catalog.service("mute");
    mute.file("notification-fd", "3");
    mute.run("exec sleep 100");
    catalog.start();

    catalog.request(b"umute");
    assert_eq!(catalog.state_letter("mute"), 'C');

    // well past DELAY_STARTING, still not promoted: the timer grace
    // period does not apply when a readiness fd was requested
    std::thread::sleep(std::time::Duration::from_millis(3000));
    assert_eq!(catalog.state_letter("mute"), 'C');
}
