// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-service state machine.
//!
//! Seven event kinds drive each slot through its lifecycle. Rows are
//! matched first-to-last; combinations outside the table indicate a
//! supervisor bug, not an operator error.

use tracing::debug;
use warden_core::constants::DELAY_RESPAWN;
use warden_core::{Clock, Event, GlobalState, ServiceState};

use super::spawner::Spawner;
use super::supervisor::{Notifier, Supervisor};

impl<C: Clock, S: Spawner, N: Notifier> Supervisor<C, S, N> {
    pub fn apply(&mut self, i: usize, ev: Event) {
        debug!(
            service = %self.table[i].name,
            pid = self.table[i].pid_raw(),
            state = %self.table[i].state,
            event = ?ev,
            "state machine event"
        );

        match ev {
            Event::WantUp => {
                if self.global != GlobalState::Up {
                    return;
                }
                match self.table[i].state {
                    // already up (or getting there)
                    ServiceState::Oneshot
                    | ServiceState::Setup
                    | ServiceState::Starting
                    | ServiceState::Up
                    | ServiceState::Restart => {}

                    ServiceState::Shutdown => {
                        self.table[i].state = ServiceState::Restart;
                    }

                    ServiceState::Down | ServiceState::Fatal | ServiceState::Delay => {
                        self.start_setup(i);
                    }
                }
            }

            Event::WantDown => match self.table[i].state {
                ServiceState::Setup
                | ServiceState::Starting
                | ServiceState::Up
                | ServiceState::Restart
                | ServiceState::Shutdown => self.stop(i),

                // oneshots hold their state until the finish script is done
                ServiceState::Oneshot => self.start_finish(i),

                ServiceState::Fatal | ServiceState::Delay | ServiceState::Down => {
                    self.table[i].state = ServiceState::Down;
                    self.table[i].clear_timeout();
                }
            },

            Event::WantRestart => {
                if self.global != GlobalState::Up {
                    return;
                }
                match self.table[i].state {
                    ServiceState::Setup
                    | ServiceState::Starting
                    | ServiceState::Up
                    | ServiceState::Restart
                    | ServiceState::Shutdown => {
                        self.stop(i);
                        self.table[i].state = ServiceState::Restart;
                    }

                    ServiceState::Oneshot => {
                        self.table[i].state = ServiceState::Restart;
                        self.start_finish(i);
                    }

                    ServiceState::Down | ServiceState::Fatal | ServiceState::Delay => {
                        self.start_setup(i);
                    }
                }
            }

            Event::SetupDone => match self.table[i].state {
                ServiceState::Setup => {
                    if self.global == GlobalState::Up {
                        self.start_run(i);
                    } else {
                        self.cleanup(i);
                    }
                }
                _ => unreachable!("setup completion in state {}", self.table[i].state),
            },

            Event::Exited => {
                self.table[i].clear_timeout();
                match self.table[i].state {
                    ServiceState::Up => {
                        self.table[i].state = ServiceState::Restart;
                        self.start_finish(i);
                    }

                    ServiceState::Starting
                    | ServiceState::Restart
                    | ServiceState::Shutdown
                    | ServiceState::Fatal => self.start_finish(i),

                    _ => unreachable!("main process exit in state {}", self.table[i].state),
                }
            }

            Event::Finished => {
                self.table[i].clear_timeout();
                match self.table[i].state {
                    // died while starting: back off before the respawn
                    ServiceState::Starting => {
                        self.cleanup(i);
                        if self.global != GlobalState::Up {
                            return;
                        }
                        self.table[i].state = ServiceState::Delay;
                        self.table[i].arm_timeout(DELAY_RESPAWN);
                    }

                    ServiceState::Up | ServiceState::Restart => {
                        self.cleanup(i);
                        if self.global != GlobalState::Up {
                            return;
                        }
                        self.start_setup(i);
                    }

                    ServiceState::Oneshot | ServiceState::Shutdown => {
                        self.cleanup(i);
                        self.zap(i);
                    }

                    ServiceState::Fatal => {
                        self.cleanup(i);
                        self.table[i].state = ServiceState::Fatal;
                        self.notify(i);
                    }

                    _ => unreachable!("finish completion in state {}", self.table[i].state),
                }
            }

            Event::Timeout => {
                self.table[i].clear_timeout();
                match self.table[i].state {
                    ServiceState::Delay => {
                        if self.global == GlobalState::WaitTerm {
                            self.slay_all();
                        } else if self.global == GlobalState::WaitKill {
                            self.global = GlobalState::Final;
                        } else {
                            self.start_setup(i);
                        }
                    }

                    ServiceState::Starting => {
                        self.table[i].state = ServiceState::Up;
                        self.notify(i);
                    }

                    ServiceState::Restart | ServiceState::Shutdown | ServiceState::Oneshot => {
                        self.kill_now(i);
                    }

                    _ => unreachable!("timeout in state {}", self.table[i].state),
                }
            }
        }
    }
}
