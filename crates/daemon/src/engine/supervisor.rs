// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor: service table, global state, and the shared resources
//! every transition needs.
//!
//! All process-wide mutable state lives here and is threaded by mutable
//! borrow into the helpers; the only true globals are the signal flags and
//! the self-pipe write end (see `signals`), since handlers get no context.

use std::ffi::CString;
use std::os::fd::{OwnedFd, RawFd};
use std::path::PathBuf;
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use tracing::debug;
use warden_core::{Clock, Event, GlobalState, Millis, ServiceName, ServiceState};
use warden_wire::ServiceRow;

use super::service::{GlobalLog, Service, ServiceTable};
use super::spawner::Spawner;

/// Observer of per-service state changes; the real implementation fans
/// datagrams out to subscriber sockets.
pub trait Notifier {
    fn state_changed(&mut self, name: &ServiceName, state: ServiceState);
}

/// Everything a supervisor is born with.
pub struct SupervisorConfig {
    /// The service catalog directory
    pub base: PathBuf,
    /// Environment for children, prepared as C strings once
    pub child_env: Arc<[CString]>,
    /// Running as the system's init (possibly in a container)
    pub pid1: bool,
    /// Running as true init with reboot authority
    pub real_pid1: bool,
    /// Read descriptor of `/dev/null` (or equivalent) for child stdin
    pub null_fd: OwnedFd,
    pub global_log: GlobalLog,
}

pub struct Supervisor<C: Clock, S: Spawner, N: Notifier> {
    pub(crate) clock: C,
    pub(crate) spawner: S,
    pub(crate) notifier: N,
    pub(crate) table: ServiceTable,
    pub(crate) global: GlobalState,
    pub(crate) base: PathBuf,
    pub(crate) child_env: Arc<[CString]>,
    pub(crate) null_fd: OwnedFd,
    pub(crate) global_log: GlobalLog,
    pub(crate) reboot_requested: bool,
    pub(crate) pid1: bool,
    pub(crate) real_pid1: bool,
    pub(crate) total_reaps: u64,
    pub(crate) total_sv_reaps: u64,
}

impl<C: Clock, S: Spawner, N: Notifier> Supervisor<C, S, N> {
    pub fn new(clock: C, spawner: S, notifier: N, config: SupervisorConfig) -> Self {
        Self {
            clock,
            spawner,
            notifier,
            table: ServiceTable::default(),
            global: GlobalState::Up,
            base: config.base,
            child_env: config.child_env,
            null_fd: config.null_fd,
            global_log: config.global_log,
            reboot_requested: false,
            pid1: config.pid1,
            real_pid1: config.real_pid1,
            total_reaps: 0,
            total_sv_reaps: 0,
        }
    }

    pub fn global(&self) -> GlobalState {
        self.global
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn service(&self, i: usize) -> &Service {
        &self.table[i]
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.table.find(name)
    }

    pub fn base(&self) -> &std::path::Path {
        &self.base
    }

    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }

    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested
    }

    pub fn is_pid1(&self) -> bool {
        self.pid1
    }

    pub fn is_real_pid1(&self) -> bool {
        self.real_pid1
    }

    pub fn child_env(&self) -> Arc<[CString]> {
        Arc::clone(&self.child_env)
    }

    /// Latch the flavour of the pending shutdown. A reboot wish is sticky:
    /// it selects the finish-script argument and the final syscall.
    pub fn note_shutdown_request(&mut self, reboot: bool) {
        if reboot {
            self.reboot_requested = true;
        }
    }

    pub fn mark_seen(&mut self, i: usize) {
        self.table[i].seen = true;
    }

    /// (total reaps, reaps attributed to a service slot)
    pub fn counters(&self) -> (u64, u64) {
        (self.total_reaps, self.total_sv_reaps)
    }

    pub fn rows(&self) -> Vec<ServiceRow<'_>> {
        let now = self.clock.now_ms();
        self.table.iter().map(|s| row_of(s, now)).collect()
    }

    pub fn row(&self, i: usize) -> ServiceRow<'_> {
        row_of(&self.table[i], self.clock.now_ms())
    }

    /// Forward a signal to the main process, if one is running.
    pub fn kill_main(&mut self, i: usize, sig: Signal) -> bool {
        match self.table[i].pid {
            Some(pid) => {
                self.spawner.kill(pid, sig);
                true
            }
            None => false,
        }
    }

    pub(crate) fn notify(&mut self, i: usize) {
        let name = self.table[i].name.clone();
        let state = self.table[i].state;
        self.notifier.state_changed(&name, state);
    }

    /// Compact away an unseen slot.
    pub(crate) fn zap(&mut self, i: usize) {
        if self.table[i].seen {
            return;
        }
        debug!(service = %self.table[i].name, "garbage-collecting slot");
        self.table.remove(i);
    }

    /// Fire every expired per-service timer, materialising lazy deadlines
    /// on the way. A fired handler may arm the slot's next timer; the slot
    /// is re-examined until its deadline lies in the future.
    pub fn fire_due_timers(&mut self, now: Millis) {
        let mut i = 0;
        while i < self.table.len() {
            loop {
                let s = &mut self.table[i];
                if s.timeout <= 0 {
                    break;
                }
                if s.deadline == 0 {
                    s.deadline = now + s.timeout;
                }
                if s.deadline > now {
                    break;
                }
                self.apply(i, Event::Timeout);
            }
            i += 1;
        }
    }

    /// The shortest remaining wait, or `None` when no timer is live.
    pub fn poll_wait_ms(&self, now: Millis) -> Option<Millis> {
        let mut min: Option<Millis> = None;
        for s in self.table.iter() {
            if s.timeout <= 0 {
                continue;
            }
            let deadline = if s.deadline == 0 { now + s.timeout } else { s.deadline };
            let wait = (deadline - now).max(0);
            min = Some(min.map_or(wait, |m| m.min(wait)));
        }
        min
    }

    /// Read ends of every live readiness pipe.
    pub fn ready_fds(&self) -> Vec<RawFd> {
        self.table.iter().filter_map(Service::ready_fd).collect()
    }

    /// Input arrived on (or the peer closed) a readiness pipe. The slot is
    /// located by descriptor: slots may have been compacted since the
    /// descriptor was polled.
    pub fn handle_ready_event(&mut self, fd: RawFd, hup: bool) {
        let Some(i) = (0..self.table.len()).find(|&i| self.table[i].ready_fd() == Some(fd))
        else {
            return;
        };

        let mut eof = false;
        let mut buf = [0u8; 256];
        match nix::unistd::read(fd, &mut buf) {
            Ok(0) => eof = true,
            Ok(n) => {
                if buf[..n].contains(&b'\n') {
                    self.mark_ready(i);
                }
            }
            Err(Errno::EINTR) | Err(Errno::EAGAIN) => {}
            Err(e) => debug!("readiness pipe read error: {e}"),
        }
        if eof || hup {
            self.table[i].ready_pipe = None;
        }
    }

    /// One newline on the readiness pipe promotes STARTING to UP.
    pub(crate) fn mark_ready(&mut self, i: usize) {
        if self.table[i].state != ServiceState::Starting {
            return;
        }
        debug!(service = %self.table[i].name, "service is ready");
        self.table[i].clear_timeout();
        self.table[i].state = ServiceState::Up;
        self.notify(i);
    }
}

fn row_of<'a>(s: &'a Service, now: Millis) -> ServiceRow<'a> {
    ServiceRow {
        name: s.name.as_str(),
        state: s.state,
        pid: s.pid_raw(),
        wstatus: s.wstatus,
        uptime_secs: (now - s.started_at) / 1000,
    }
}
