// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child reaping: drain terminated children and dispatch each to the
//! owning slot as the right state-machine event.

use nix::errno::Errno;
use nix::unistd::Pid;
use tracing::{debug, info, warn};
use warden_core::constants::DELAY_RESPAWN;
use warden_core::{Clock, Event, GlobalState, ServiceState};

use super::service::STATUS_EXEC_FAILED;
use super::spawner::Spawner;
use super::supervisor::{Notifier, Supervisor};

enum Role {
    Setup,
    Main,
    Finish,
}

impl<C: Clock, S: Spawner, N: Notifier> Supervisor<C, S, N> {
    /// Non-blocking waitpid loop. As the last child of a shutting-down
    /// supervisor disappears, ECHILD ends the run.
    pub fn drain_children(&mut self) {
        loop {
            let mut status: libc::c_int = 0;
            let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
            if pid == 0 {
                break;
            }
            if pid < 0 {
                let err = Errno::last();
                if err == Errno::EINTR {
                    continue;
                }
                if err != Errno::ECHILD {
                    warn!("waitpid failed: {err}");
                }
                if self.global >= GlobalState::Shutdown && err == Errno::ECHILD {
                    self.global = GlobalState::Final;
                }
                break;
            }
            self.handle_reaped(Pid::from_raw(pid), status);
        }
    }

    /// Route one reaped child to its slot.
    pub fn handle_reaped(&mut self, pid: Pid, wstatus: i32) {
        self.total_reaps += 1;

        let hit = (0..self.table.len()).find_map(|i| {
            let s = &self.table[i];
            if s.setup_pid == Some(pid) {
                Some((i, Role::Setup))
            } else if s.pid == Some(pid) {
                Some((i, Role::Main))
            } else if s.finish_pid == Some(pid) {
                Some((i, Role::Finish))
            } else {
                None
            }
        });
        let Some((i, role)) = hit else {
            debug!("reaped unknown child {pid}");
            return;
        };
        self.total_sv_reaps += 1;

        match role {
            Role::Setup => {
                debug!(service = %self.table[i].name, %pid, wstatus, "setup script died");
                self.table[i].setup_pid = None;

                if self.table[i].state == ServiceState::Setup {
                    if libc::WIFEXITED(wstatus) && libc::WEXITSTATUS(wstatus) == 0 {
                        self.apply(i, Event::SetupDone);
                    } else if libc::WIFEXITED(wstatus) && libc::WEXITSTATUS(wstatus) == 111 {
                        self.table[i].state = ServiceState::Fatal;
                        self.table[i].wstatus = STATUS_EXEC_FAILED;
                        self.notify(i);
                    } else {
                        self.table[i].state = ServiceState::Delay;
                        self.table[i].arm_timeout(DELAY_RESPAWN);
                    }
                }

                if self.table[i].name.is_sys() && self.global == GlobalState::Up {
                    self.table[i].seen = false;
                    self.cleanup(i);
                    self.zap(i);
                    info!("SYS setup finished with status {}", libc::WEXITSTATUS(wstatus));
                    // bring up the rest of the services
                    self.rescan();
                    return;
                }

                if matches!(
                    self.table[i].state,
                    ServiceState::Shutdown | ServiceState::Restart
                ) {
                    // stop or restart was requested during setup; the main
                    // process never ran, skip straight to finished
                    self.apply(i, Event::Finished);
                }
            }

            Role::Main => {
                debug!(service = %self.table[i].name, %pid, wstatus, "service died");
                self.table[i].pid = None;
                self.table[i].wstatus = wstatus;
                self.apply(i, Event::Exited);
            }

            Role::Finish => {
                debug!(service = %self.table[i].name, %pid, wstatus, "finish script died");
                self.table[i].finish_pid = None;
                if self.table[i].name.is_sys() {
                    info!("SYS finish finished");
                    self.apply(i, Event::Finished);
                    self.stop_all_services();
                } else {
                    self.apply(i, Event::Finished);
                }
            }
        }
    }
}
