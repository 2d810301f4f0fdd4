// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful stop: down-signal delivery, the finish script, and the
//! state-change notification to subscribers.

use super::prelude::*;

#[test]
fn graceful_stop_runs_finish_and_notifies_subscribers() {
    let mut catalog = Catalog::new();
    let svc = catalog.service("svc");
    svc.run("trap 'exit 0' TERM; sleep 100 & wait");
    svc.finish("echo \"$1 $2\" > finish-args");
    catalog.start();

    let subscriber = catalog.subscribe("svc,1");

    catalog.request(b"usvc");
    assert!(catalog.wait_state("svc", 'D'));

    assert_eq!(catalog.request(b"dsvc"), "ok\n");
    assert!(catalog.wait_state("svc", 'A'), "svc never reached DOWN");

    // the run script trapped TERM and exited 0
    let args_file = svc.path_of("finish-args");
    assert!(wait_for(SPEC_WAIT_MAX_MS, || args_file.exists()), "finish never ran");
    let args = std::fs::read_to_string(&args_file).expect("finish args");
    assert_eq!(args.trim(), "0 0");

    // subscribers see the DOWN transition (state 1 = letter 'A')
    let mut saw_down = false;
    let mut buf = [0u8; 128];
    while let Ok(n) = subscriber.recv(&mut buf) {
        if &buf[..n] == b"Asvc\n" {
            saw_down = true;
            break;
        }
    }
    assert!(saw_down, "subscriber never saw the DOWN notification");
}

#[test]
fn down_signal_file_selects_the_stop_signal() {
    let mut catalog = Catalog::new();
    let svc = catalog.service("svc");
    svc.run("trap 'touch got-hup; exit 0' HUP; sleep 100 & wait");
    svc.file("down-signal", "h");
    catalog.start();

    catalog.request(b"usvc");
    assert!(catalog.wait_state("svc", 'D'));

    catalog.request(b"dsvc");
    assert!(catalog.wait_state("svc", 'A'));
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || svc.path_of("got-hup").exists()),
        "stop did not use the configured signal"
    );
}

#[test]
fn signaled_exit_is_reported_to_finish() {
    let mut catalog = Catalog::new();
    let svc = catalog.service("svc");
    // no trap: the stop signal kills the shell
    svc.run("exec sleep 100");
    svc.finish("echo \"$1 $2\" > finish-args");
    catalog.start();

    catalog.request(b"usvc");
    assert!(catalog.wait_state("svc", 'D'));
    catalog.request(b"dsvc");
    assert!(catalog.wait_state("svc", 'A'));

    let args_file = svc.path_of("finish-args");
    assert!(wait_for(SPEC_WAIT_MAX_MS, || args_file.exists()), "finish never ran");
    let args = std::fs::read_to_string(&args_file).expect("finish args");
    // killed by the default down signal, SIGTERM (15)
    assert_eq!(args.trim(), "-1 15");
}
