// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bound control socket and request dispatch.

use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::stat::Mode;
use tracing::debug;
use warden_core::{name, signal_for_letter, Clock, Event, ServiceName};
use warden_wire::{render_list, render_query, render_stats, Request, ERROR, OK};

use super::notify::SocketNotifier;
use super::ListenError;
use crate::engine::{scripts, signals, Notifier, Spawner, Supervisor};

pub struct ControlSocket {
    sock: UnixDatagram,
    path: PathBuf,
    notify_dir: PathBuf,
}

impl ControlSocket {
    /// Bind the control socket, creating its directory and the `notify/`
    /// subscriber directory beside it. A stale socket left by a dead
    /// supervisor is removed; a live one aborts the boot.
    pub fn open(path: &Path) -> Result<Self, ListenError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let _ = nix::unistd::mkdir(dir, Mode::from_bits_truncate(0o700));

        let notify_dir = dir.join("notify");
        let _ = nix::unistd::mkdir(&notify_dir, Mode::from_bits_truncate(0o700));
        if !notify_dir.is_dir() {
            return Err(ListenError::NotifyDir(
                notify_dir,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        // probe for another supervisor on the same path
        match UnixStream::connect(path) {
            Ok(_) => return Err(ListenError::InUse(path.to_path_buf())),
            Err(e) => match e.raw_os_error() {
                Some(code) if code == Errno::ECONNREFUSED as i32 => {
                    // stale socket, remove
                    let _ = std::fs::remove_file(path);
                }
                Some(code) if code == Errno::EPROTOTYPE as i32 => {
                    return Err(ListenError::InUse(path.to_path_buf()));
                }
                // ENOENT: no socket yet; anything else will fail the bind
                _ => {}
            },
        }

        let mask = nix::sys::stat::umask(Mode::from_bits_truncate(0o077));
        let bound = UnixDatagram::bind(path);
        nix::sys::stat::umask(mask);

        let sock = bound.map_err(|e| ListenError::Bind(path.to_path_buf(), e))?;
        sock.set_nonblocking(true)?;

        Ok(Self { sock, path: path.to_path_buf(), notify_dir })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }

    /// A notifier sending from a clone of this socket into `notify/`.
    pub fn notifier(&self) -> Result<SocketNotifier, ListenError> {
        Ok(SocketNotifier::new(self.sock.try_clone()?, self.notify_dir.clone()))
    }

    pub fn unlink(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Receive and answer one request. A peer that did not bind its socket
/// gets no reply.
pub fn handle_request<C: Clock, S: Spawner, N: Notifier>(
    control: &ControlSocket,
    sup: &mut Supervisor<C, S, N>,
) {
    let mut buf = [0u8; 256];
    let (len, peer) = match control.sock.recv_from(&mut buf) {
        Ok(r) => r,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::WouldBlock {
                debug!("control receive error: {e}");
            }
            return;
        }
    };
    if len == 0 {
        return;
    }

    let reply = dispatch(sup, &buf[..len]);
    if let Some(path) = peer.as_pathname() {
        if let Some(text) = reply {
            let _ = control.sock.send_to(text.as_bytes(), path);
        }
    }
}

fn dispatch<C: Clock, S: Spawner, N: Notifier>(
    sup: &mut Supervisor<C, S, N>,
    buf: &[u8],
) -> Option<String> {
    let request = match Request::parse(buf) {
        Ok(r) => r,
        Err(e) => {
            debug!("bad control request: {e}");
            return Some(ERROR.to_string());
        }
    };

    match request {
        Request::List => Some(render_list(sup.rows())),

        Request::Query(name) => match sup.find(name) {
            Some(i) => Some(render_query(&sup.row(i))),
            None => Some(ERROR.to_string()),
        },

        Request::Stats => {
            let (reaps, sv_reaps) = sup.counters();
            Some(render_stats(std::process::id(), sup.len(), reaps, sv_reaps))
        }

        Request::Up(name) => want(sup, name, Event::WantUp, true),
        Request::Down(name) => want(sup, name, Event::WantDown, false),
        Request::Restart(name) => want(sup, name, Event::WantRestart, true),

        Request::Rescan => {
            signals::request_rescan();
            Some(OK.to_string())
        }
        Request::Shutdown => {
            signals::request_shutdown();
            Some(OK.to_string())
        }
        Request::Reboot => {
            signals::request_reboot();
            Some(OK.to_string())
        }

        Request::Signal { letter, service } => {
            let Some(sig) = signal_for_letter(letter) else {
                return Some(ERROR.to_string());
            };
            match sup.find(service) {
                Some(i) if sup.kill_main(i, sig) => Some(OK.to_string()),
                _ => Some(ERROR.to_string()),
            }
        }
    }
}

/// Apply a want event, auto-creating the slot when the directory exists
/// (never for `d`: stopping something unknown stays an error).
fn want<C: Clock, S: Spawner, N: Notifier>(
    sup: &mut Supervisor<C, S, N>,
    name: &str,
    ev: Event,
    allow_create: bool,
) -> Option<String> {
    let i = match sup.find(name) {
        Some(i) => Some(i),
        None if allow_create && name::is_valid(name) => ServiceName::new(name)
            .ok()
            .filter(|n| scripts::dir_exists(sup.base(), n))
            .and_then(|n| sup.add_service(&n)),
        None => None,
    };
    let Some(i) = i else {
        return Some(ERROR.to_string());
    };

    sup.mark_seen(i);
    sup.apply(i, ev);
    if i < sup.len() {
        sup.notify(i);
    }
    Some(OK.to_string())
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
