// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-supervisor shutdown as a standalone process: services stop,
//! SYS/finish runs first, the loop exits cleanly, the socket is removed.

use serial_test::serial;

use super::prelude::*;

#[test]
#[serial]
fn shutdown_stops_everything_and_exits() {
    let mut catalog = Catalog::new();
    let a = catalog.service("a");
    a.run("trap 'exit 0' TERM; sleep 100 & wait");
    a.finish("touch finished");
    catalog.service("b").run("trap 'exit 0' TERM; sleep 100 & wait");
    catalog.start();
    assert!(catalog.wait_state("a", 'D'));
    assert!(catalog.wait_state("b", 'D'));

    assert_eq!(catalog.request(b"S"), "ok\n");
    assert_eq!(catalog.wait_exit(), Some(0));

    assert!(a.path_of("finished").exists(), "finish hook never ran");
    assert!(!catalog.socket_path().exists(), "control socket not removed");
}

#[test]
#[serial]
fn sys_finish_runs_before_the_services_stop() {
    let mut catalog = Catalog::new();
    let sys = catalog.service("SYS");
    sys.finish("echo \"$3\" > mode");
    catalog.service("a").run("trap 'exit 0' TERM; sleep 100 & wait");
    catalog.start();
    assert!(catalog.wait_state("a", 'D'));

    assert_eq!(catalog.request(b"S"), "ok\n");
    assert_eq!(catalog.wait_exit(), Some(0));

    let mode = std::fs::read_to_string(sys.path_of("mode")).expect("SYS/finish mode");
    assert_eq!(mode.trim(), "shutdown");
}

#[test]
#[serial]
fn shutdown_takes_loggers_down_too() {
    let mut catalog = Catalog::new();
    let producer = catalog.service("producer");
    producer.run("echo hello; exec sleep 100");
    producer.log_link("collector");
    let collector = catalog.service("collector");
    collector.run("cat > collected");
    catalog.start();

    assert!(catalog.wait_state("producer", 'D'));
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || {
            std::fs::read_to_string(collector.path_of("collected"))
                .map(|s| s.contains("hello"))
                .unwrap_or(false)
        }),
        "logger never received the client's output"
    );

    assert_eq!(catalog.request(b"S"), "ok\n");
    assert_eq!(catalog.wait_exit(), Some(0));
}
