// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out of state changes to subscriber sockets.

use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

use nix::errno::Errno;
use warden_core::{ServiceName, ServiceState};
use warden_wire::{render_state_change, subscriber_matches};

use crate::engine::Notifier;

/// Sends one-line datagrams to every matching socket in the `notify/`
/// directory. Subscribers that refuse the datagram are stale and their
/// sockets are unlinked.
pub struct SocketNotifier {
    sock: UnixDatagram,
    dir: PathBuf,
}

impl SocketNotifier {
    pub fn new(sock: UnixDatagram, dir: PathBuf) -> Self {
        Self { sock, dir }
    }
}

impl Notifier for SocketNotifier {
    fn state_changed(&mut self, name: &ServiceName, state: ServiceState) {
        let message = render_state_change(state, name.as_str());

        let Ok(entries) = std::fs::read_dir(&self.dir) else { return };
        for entry in entries.flatten() {
            let fname = entry.file_name();
            let Some(file) = fname.to_str() else { continue };
            if file.starts_with('.') {
                continue;
            }
            if !subscriber_matches(name.as_str(), file) {
                continue;
            }

            let target = self.dir.join(file);
            if let Err(e) = self.sock.send_to(message.as_bytes(), &target) {
                if e.raw_os_error() == Some(Errno::ECONNREFUSED as i32) {
                    let _ = std::fs::remove_file(&target);
                }
            }
        }
    }
}
