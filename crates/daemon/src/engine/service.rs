// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The service record and the fixed-capacity service table.
//!
//! Slots are addressed by index and compacted by swap-with-last; the table
//! fixes up cross-slot log references on every removal so indices stay
//! packed and valid.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::unistd::Pid;
use warden_core::constants::MAX_SERVICES;
use warden_core::{Millis, ServiceName, ServiceState};

/// `wstatus` sentinel meaning "exec itself failed".
pub const STATUS_EXEC_FAILED: i32 = -1;

/// The pipe pair owned by a logger service. Clients write to `writer`;
/// the logger's stdin is a dup of `reader`.
#[derive(Debug)]
pub struct LogPipe {
    pub reader: OwnedFd,
    pub writer: OwnedFd,
}

impl LogPipe {
    pub fn new() -> nix::Result<Self> {
        // kept blocking: log back-pressure is the flow control
        let (reader, writer) = nix::unistd::pipe2(OFlag::O_CLOEXEC)?;
        Ok(Self { reader, writer })
    }
}

/// Where a service's stdout goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// No `log` symlink: fall back to the global log pipe or the console
    None,
    /// Link resolution in progress; guards against symlink cycles
    Pending,
    /// Index of the logger slot owning the pipe
    Logger(usize),
}

/// One slot of the service table.
#[derive(Debug)]
pub struct Service {
    pub name: ServiceName,
    pub state: ServiceState,
    pub pid: Option<Pid>,
    pub setup_pid: Option<Pid>,
    pub finish_pid: Option<Pid>,
    /// Raw wait status of the last main-process exit
    pub wstatus: i32,
    /// Timestamp of the last state-defining transition
    pub started_at: Millis,
    /// Milliseconds remaining; 0 disables the timer
    pub timeout: Millis,
    /// Absolute target, computed lazily from `timeout` on the next loop pass
    pub deadline: Millis,
    /// Present iff this service is a logger with its pipe pair allocated
    pub log_pipe: Option<LogPipe>,
    pub log_to: LogTarget,
    /// Sticky logger mark; survives pipe teardown during shutdown
    pub logger: bool,
    /// Read end of the readiness pipe while starting
    pub ready_pipe: Option<OwnedFd>,
    /// Mark-and-sweep flag used during rescan
    pub seen: bool,
}

impl Service {
    pub fn new(name: ServiceName, now: Millis) -> Self {
        let logger = name.is_log();
        Self {
            name,
            state: ServiceState::Delay,
            pid: None,
            setup_pid: None,
            finish_pid: None,
            wstatus: 0,
            started_at: now,
            timeout: 1,
            deadline: 0,
            log_pipe: None,
            log_to: LogTarget::None,
            logger,
            ready_pipe: None,
            seen: false,
        }
    }

    pub fn arm_timeout(&mut self, ms: Millis) {
        self.timeout = ms;
        self.deadline = 0;
    }

    pub fn clear_timeout(&mut self) {
        self.timeout = 0;
        self.deadline = 0;
    }

    pub fn is_logger(&self) -> bool {
        self.logger
    }

    pub fn pid_raw(&self) -> i32 {
        self.pid.map(Pid::as_raw).unwrap_or(0)
    }

    pub fn ready_fd(&self) -> Option<RawFd> {
        self.ready_pipe.as_ref().map(AsRawFd::as_raw_fd)
    }
}

/// Fixed-capacity table of service slots.
#[derive(Debug, Default)]
pub struct ServiceTable {
    slots: Vec<Service>,
}

impl ServiceTable {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.slots.iter()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// Add a slot, refusing beyond [`MAX_SERVICES`].
    pub fn push(&mut self, service: Service) -> Option<usize> {
        if self.slots.len() >= MAX_SERVICES {
            return None;
        }
        self.slots.push(service);
        Some(self.slots.len() - 1)
    }

    /// Remove slot `i` by swap-with-last, dropping its pipes and fixing up
    /// every log reference: references to `i` are cleared, references to
    /// the moved slot are re-pointed at `i`.
    pub fn remove(&mut self, i: usize) {
        let last = self.slots.len() - 1;
        for s in &mut self.slots {
            if s.log_to == LogTarget::Logger(i) {
                s.log_to = LogTarget::None;
            }
        }
        self.slots.swap_remove(i);
        if i < self.slots.len() {
            for s in &mut self.slots {
                if s.log_to == LogTarget::Logger(last) {
                    s.log_to = LogTarget::Logger(i);
                }
            }
        }
    }
}

impl std::ops::Index<usize> for ServiceTable {
    type Output = Service;

    fn index(&self, i: usize) -> &Service {
        &self.slots[i]
    }
}

impl std::ops::IndexMut<usize> for ServiceTable {
    fn index_mut(&mut self, i: usize) -> &mut Service {
        &mut self.slots[i]
    }
}

/// The fallback log pipe every unwired service writes to while the `LOG`
/// service is running.
#[derive(Debug)]
pub struct GlobalLog {
    pipe: LogPipe,
    active: bool,
}

impl GlobalLog {
    pub fn new() -> nix::Result<Self> {
        Ok(Self { pipe: LogPipe::new()?, active: false })
    }

    /// Read end; becomes the `LOG` service's stdin.
    pub fn read_fd(&self) -> RawFd {
        self.pipe.reader.as_raw_fd()
    }

    /// Write end, only while `LOG` is running.
    pub fn write_fd(&self) -> Option<RawFd> {
        self.active.then(|| self.pipe.writer.as_raw_fd())
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
