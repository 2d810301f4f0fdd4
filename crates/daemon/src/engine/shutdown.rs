// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot/shutdown orchestration over the whole table:
//! UP → WAIT_FINISH → SHUTDOWN → WAIT_TERM → WAIT_KILL → FINAL.

use nix::sys::signal::Signal;
use tracing::{debug, info};
use warden_core::constants::{TIMEOUT_SIGKILL, TIMEOUT_SIGTERM, TIMEOUT_SYS_FINISH};
use warden_core::{Clock, Event, GlobalState, Millis, ServiceName, ServiceState};

use super::spawner::Spawner;
use super::supervisor::{Notifier, Supervisor};

impl<C: Clock, S: Spawner, N: Notifier> Supervisor<C, S, N> {
    /// React to a pending shutdown or reboot wish. Runs on every wakeup
    /// while the wish stands: the first pass starts SYS/finish, the next
    /// one stops the services.
    pub fn do_shutdown(&mut self) {
        if self.global == GlobalState::Up {
            self.global = GlobalState::WaitFinish;

            if self.reboot_requested {
                info!("rebooting");
            } else {
                info!("shutting down");
            }

            if self.pid1 {
                crate::platform::own_console();
            }
            if self.real_pid1 {
                let _ = crate::platform::set_ctrl_alt_del(true);
            }

            if self.base.join("SYS").join("finish").exists() {
                match self.add_service(&ServiceName::sys()) {
                    None => self.stop_all_services(),
                    Some(b) => {
                        self.table[b].state = ServiceState::Oneshot;
                        self.apply(b, Event::WantDown);
                        // the hook may have finished (and been zapped) already
                        let waiting = b < self.table.len()
                            && self.table[b].name.is_sys()
                            && self.table[b].state != ServiceState::Down;
                        if waiting {
                            self.table[b].arm_timeout(TIMEOUT_SYS_FINISH);
                        } else {
                            self.stop_all_services();
                        }
                    }
                }
            } else {
                self.stop_all_services();
            }
        } else if self.global == GlobalState::WaitFinish {
            self.stop_all_services();
        }
    }

    /// WANT_DOWN for every non-logger service; loggers drain last.
    pub(crate) fn stop_all_services(&mut self) {
        self.global = GlobalState::Shutdown;

        let mut up = 0;
        let mut i = 0;
        while i < self.table.len() {
            if self.table[i].is_logger() {
                i += 1;
                continue;
            }
            let len_before = self.table.len();
            self.apply(i, Event::WantDown);
            if self.table.len() < len_before {
                // slot was compacted; the swapped-in one is unprocessed
                continue;
            }
            if !self.table[i].state.is_settled() {
                up += 1;
            }
            i += 1;
        }
        if up > 0 {
            info!("waiting for {up} services to finish");
        }
    }

    /// SIGTERM+SIGCONT to every process; the synthetic `.SHUTDOWN` slot
    /// carries the escalation deadline.
    pub(crate) fn kill_all_processes(&mut self) {
        info!("sending SIGTERM to all processes");
        self.spawner.kill_everyone(Signal::SIGTERM);
        self.spawner.kill_everyone(Signal::SIGCONT);
        self.global = GlobalState::WaitTerm;
        self.arm_shutdown_timer(TIMEOUT_SIGTERM);
    }

    pub(crate) fn slay_all(&mut self) {
        info!("sending SIGKILL to all processes");
        self.spawner.kill_everyone(Signal::SIGKILL);
        self.global = GlobalState::WaitKill;
        self.arm_shutdown_timer(TIMEOUT_SIGKILL);
    }

    fn arm_shutdown_timer(&mut self, ms: Millis) {
        if let Some(i) = self.add_service(&ServiceName::shutdown_timer()) {
            self.table[i].state = ServiceState::Delay;
            self.table[i].arm_timeout(ms);
        }
    }

    /// Shepherd the SHUTDOWN phase. Returns true when a standalone
    /// supervisor has nothing left to wait for and the loop should exit.
    pub fn shutdown_progress(&mut self) -> bool {
        if self.global != GlobalState::Shutdown {
            return false;
        }

        let mut up = 0;
        let mut up_loggers = 0;
        for s in self.table.iter() {
            if !s.state.is_settled() {
                up += 1;
                if s.is_logger() {
                    up_loggers += 1;
                }
            }
        }

        if up > 0 {
            if up == up_loggers {
                debug!("signalling {up_loggers} log processes");
                let mut i = 0;
                while i < self.table.len() {
                    if !self.table[i].is_logger() {
                        i += 1;
                        continue;
                    }
                    let len_before = self.table.len();
                    self.apply(i, Event::WantDown);
                    if self.table.len() < len_before {
                        continue;
                    }
                    i += 1;
                }
            }
            return false;
        }

        info!("all services stopped");
        if !self.pid1 {
            return true;
        }
        self.kill_all_processes();
        false
    }
}
