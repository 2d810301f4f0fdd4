// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The main event loop: one poll over the self-pipe, the control socket,
//! and every live readiness pipe, with the shortest service deadline as
//! the timeout.
//!
//! Within one wakeup, work is handled in a fixed order: self-pipe, child
//! reaps, control requests, readiness pipes, rescan wish, shutdown wish,
//! then shutdown progress. Timers fire at the top, before the next poll.

use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use warden_core::{GlobalState, SystemClock};

use super::signals;
use super::spawner::UnixSpawner;
use super::supervisor::Supervisor;
use crate::listener::{self, ControlSocket, SocketNotifier};

/// The production supervisor type.
pub type DaemonSupervisor = Supervisor<SystemClock, UnixSpawner, SocketNotifier>;

#[derive(Clone, Copy)]
enum PollSlot {
    SelfPipe,
    Control,
    Ready(RawFd),
}

pub struct Engine {
    pub sup: DaemonSupervisor,
    control: ControlSocket,
    self_pipe_read: OwnedFd,
    // handed to the signal handler as a raw descriptor; owning it here
    // keeps it open for the lifetime of the process
    _self_pipe_write: OwnedFd,
}

impl Engine {
    pub fn new(
        sup: DaemonSupervisor,
        control: ControlSocket,
        self_pipe: (OwnedFd, OwnedFd),
    ) -> Self {
        Self { sup, control, self_pipe_read: self_pipe.0, _self_pipe_write: self_pipe.1 }
    }

    /// Run until FINAL (init path) or until a standalone shutdown has
    /// nothing left to wait for.
    pub fn run(&mut self) {
        loop {
            let now = self.sup.now_ms();
            self.sup.fire_due_timers(now);

            if self.sup.global() == GlobalState::Final {
                break;
            }

            let timeout = match self.sup.poll_wait_ms(now) {
                None => PollTimeout::NONE,
                Some(ms) => {
                    let clamped = ms.clamp(0, i32::MAX as i64) as i32;
                    PollTimeout::try_from(clamped).unwrap_or(PollTimeout::MAX)
                }
            };

            let mut slots = vec![PollSlot::SelfPipe, PollSlot::Control];
            for fd in self.sup.ready_fds() {
                slots.push(PollSlot::Ready(fd));
            }

            let revents: Vec<PollFlags> = {
                let mut pfds: Vec<PollFd> = slots
                    .iter()
                    .map(|slot| {
                        let raw = match slot {
                            PollSlot::SelfPipe => self.self_pipe_read.as_raw_fd(),
                            PollSlot::Control => self.control.as_raw_fd(),
                            PollSlot::Ready(fd) => *fd,
                        };
                        // lifetimes decoupled from `self` so the handlers
                        // below may mutate the supervisor
                        PollFd::new(unsafe { BorrowedFd::borrow_raw(raw) }, PollFlags::POLLIN)
                    })
                    .collect();
                loop {
                    match poll(&mut pfds, timeout) {
                        Err(Errno::EINTR) => continue,
                        _ => break,
                    }
                }
                pfds.iter().map(|p| p.revents().unwrap_or(PollFlags::empty())).collect()
            };

            for (slot, ev) in slots.iter().zip(&revents) {
                if matches!(slot, PollSlot::SelfPipe) && ev.contains(PollFlags::POLLIN) {
                    self.drain_self_pipe();
                }
            }

            self.sup.drain_children();

            for (slot, ev) in slots.iter().zip(&revents) {
                if matches!(slot, PollSlot::Control) && ev.contains(PollFlags::POLLIN) {
                    listener::handle_request(&self.control, &mut self.sup);
                }
            }

            for (slot, ev) in slots.iter().zip(&revents) {
                if let PollSlot::Ready(fd) = slot {
                    if !ev.is_empty() {
                        self.sup.handle_ready_event(*fd, ev.contains(PollFlags::POLLHUP));
                    }
                }
            }

            if signals::take_rescan() {
                self.sup.rescan();
            }

            if signals::shutdown_requested() || signals::reboot_requested() {
                self.sup.note_shutdown_request(signals::reboot_requested());
                self.sup.do_shutdown();
            }

            if self.sup.shutdown_progress() {
                break;
            }
        }
    }

    fn drain_self_pipe(&self) {
        let mut buf = [0u8; 64];
        loop {
            match nix::unistd::read(self.self_pipe_read.as_raw_fd(), &mut buf) {
                Ok(n) if n > 0 => continue,
                _ => break,
            }
        }
    }

    /// Surrender the parts the epilogue needs.
    pub fn into_parts(self) -> (DaemonSupervisor, ControlSocket, OwnedFd) {
        (self.sup, self.control, self.self_pipe_read)
    }
}
