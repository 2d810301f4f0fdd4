// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log-pipe topology: dedicated loggers via the `log` symlink, and the
//! global `LOG` fallback for unwired services.

use super::prelude::*;

#[test]
fn client_output_reaches_its_logger() {
    let mut catalog = Catalog::new();
    let producer = catalog.service("producer");
    producer.run("echo one; echo two; exec sleep 100");
    producer.log_link("collector");
    catalog.service("collector").run("cat > collected");
    catalog.start();

    assert!(catalog.wait_state("producer", 'D'));
    let collected = catalog.dir().join("collector/collected");
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || {
            std::fs::read_to_string(&collected)
                .map(|s| s.contains("one") && s.contains("two"))
                .unwrap_or(false)
        }),
        "collector never received the client output"
    );
}

#[test]
fn unwired_services_fall_back_to_the_global_log() {
    let mut catalog = Catalog::new();
    catalog.service("LOG").run("cat > sink");
    catalog.service("chatty").run("echo hello-global; exec sleep 100");
    catalog.start();

    assert!(catalog.wait_state("chatty", 'D'));
    let sink = catalog.dir().join("LOG/sink");
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || {
            std::fs::read_to_string(&sink)
                .map(|s| s.contains("hello-global"))
                .unwrap_or(false)
        }),
        "the global log never received the output"
    );
}

#[test]
fn two_clients_can_share_one_logger() {
    let mut catalog = Catalog::new();
    for name in ["alpha", "beta"] {
        let svc = catalog.service(name);
        svc.run(&format!("echo from-{name}; exec sleep 100"));
        svc.log_link("shared");
    }
    catalog.service("shared").run("cat > collected");
    catalog.start();

    assert!(catalog.wait_state("alpha", 'D'));
    assert!(catalog.wait_state("beta", 'D'));
    let collected = catalog.dir().join("shared/collected");
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || {
            std::fs::read_to_string(&collected)
                .map(|s| s.contains("from-alpha") && s.contains("from-beta"))
                .unwrap_or(false)
        }),
        "shared logger missed a client"
    );
}
