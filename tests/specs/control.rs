// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control protocol over the live socket.

use super::prelude::*;

#[test]
fn list_shows_every_service_with_state_and_uptime() {
    let mut catalog = Catalog::new();
    catalog.service("a").run("exec sleep 100");
    catalog.service("b").setup("exit 0");
    catalog.start();
    assert!(catalog.wait_state("a", 'D'));
    assert!(catalog.wait_state("b", 'E'));

    let reply = catalog.request(b"l");
    let lines: Vec<&str> = reply.lines().collect();
    assert_eq!(lines.len(), 2, "unexpected list: {reply}");
    // name,state,pid,wstatus,uptime
    let a = lines.iter().find(|l| l.starts_with("a,")).expect("a listed");
    let fields: Vec<&str> = a.split(',').collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[1], "4");
    assert!(fields[2].parse::<i32>().unwrap() > 0);
}

#[test]
fn stats_names_the_supervisor_pid_and_counters() {
    let mut catalog = Catalog::new();
    catalog.service("a").setup("exit 0");
    catalog.start();
    assert!(catalog.wait_state("a", 'E'));

    let reply = catalog.request(b"#");
    let fields: Vec<&str> = reply.trim().split(' ').collect();
    assert_eq!(fields[0], "#");
    assert!(fields[1].parse::<u32>().unwrap() > 0);
    assert_eq!(fields[2], "1"); // one service
    assert!(fields[3].parse::<u64>().unwrap() >= 1); // at least the setup reap
}

#[test]
fn unknown_verbs_and_names_are_errors() {
    let mut catalog = Catalog::new();
    catalog.start();

    assert_eq!(catalog.request(b"zghost"), "error\n");
    assert_eq!(catalog.request(b"ughost"), "error\n");
    assert_eq!(catalog.request(b"u.hidden"), "error\n");
    assert!(catalog.query("ghost").starts_with("error"));
}

#[test]
fn signal_letters_forward_to_the_main_process() {
    let mut catalog = Catalog::new();
    let svc = catalog.service("svc");
    svc.run("trap 'touch got-usr1' USR1; sleep 100 & wait");
    catalog.start();

    catalog.request(b"usvc");
    assert!(catalog.wait_state("svc", 'D'));

    assert_eq!(catalog.request(b"1svc"), "ok\n");
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || svc.path_of("got-usr1").exists()),
        "signal never reached the service"
    );
}

#[test]
fn parameterised_instances_receive_their_tag() {
    let mut catalog = Catalog::new();
    catalog.service("worker@").run("echo \"$1\" > \"tag-$1\"; exec sleep 100");
    catalog.start();

    assert_eq!(catalog.request(b"uworker@blue"), "ok\n");
    assert!(catalog.wait_state("worker@blue", 'D'));

    let tag_file = catalog.dir().join("worker@").join("tag-blue");
    assert!(wait_for(SPEC_WAIT_MAX_MS, || tag_file.exists()), "instance tag not passed");
    let tag = std::fs::read_to_string(tag_file).expect("tag file");
    assert_eq!(tag.trim(), "blue");
}

#[test]
fn wire_encoded_requests_are_accepted() {
    let mut catalog = Catalog::new();
    catalog.service("svc").run("exec sleep 100");
    catalog.start();

    // a client linking warden-wire speaks the same bytes
    let up = warden_wire::Request::Up("svc").encode();
    assert_eq!(catalog.request(&up), "ok\n");
    assert!(catalog.wait_state("svc", 'D'));

    let query = warden_wire::Request::Query("svc").encode();
    let reply = catalog.request(&query);
    assert!(reply.starts_with('D'), "unexpected reply: {reply}");

    let down = warden_wire::Request::Down("svc").encode();
    assert_eq!(catalog.request(&down), "ok\n");
    assert!(catalog.wait_state("svc", 'A'));
}

#[test]
fn all_subscribers_see_every_transition() {
    let mut catalog = Catalog::new();
    catalog.service("svc").setup("exit 0");
    catalog.start();

    let subscriber = catalog.subscribe("ALL,99");
    catalog.request(b"usvc");
    assert!(catalog.wait_state("svc", 'E'));

    // at least one notification for svc arrived; the last settled one
    // is ONESHOT ('E')
    let mut lines = Vec::new();
    let mut buf = [0u8; 128];
    while let Ok(n) = subscriber.recv(&mut buf) {
        lines.push(String::from_utf8_lossy(&buf[..n]).to_string());
        if lines.iter().any(|l| l.as_str() == "Esvc\n") {
            break;
        }
    }
    assert!(lines.iter().any(|l| l.as_str() == "Esvc\n"), "missing ONESHOT notification");
}
