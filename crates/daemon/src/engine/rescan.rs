// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalog rescanning: keep the service table aligned with the service
//! directory, wiring `log` symlinks into logger pipes on the way.

use tracing::warn;
use warden_core::constants::MAX_SERVICES;
use warden_core::{name, Clock, Event, ServiceName, ServiceState};

use super::scripts;
use super::service::{LogPipe, LogTarget, Service};
use super::spawner::Spawner;
use super::supervisor::{Notifier, Supervisor};

impl<C: Clock, S: Spawner, N: Notifier> Supervisor<C, S, N> {
    /// Find or materialise the slot for `name`. For ordinary services the
    /// directory must hold at least `run` or `setup`; the special `SYS`
    /// and `.SHUTDOWN` slots are exempt. The `log` symlink is (re)resolved
    /// either way.
    pub fn add_service(&mut self, name: &ServiceName) -> Option<usize> {
        if let Some(i) = self.table.find(name.as_str()) {
            self.refresh_log(i);
            return Some(i);
        }

        let special = name.is_sys() || name.is_shutdown_timer();
        if !special
            && !scripts::script_exists(&self.base, name, "run")
            && !scripts::script_exists(&self.base, name, "setup")
        {
            warn!("no such service: {name}");
            return None;
        }

        let slot = Service::new(name.clone(), self.clock.now_ms());
        let i = match self.table.push(slot) {
            Some(i) => i,
            None => {
                warn!("too many services, limit={MAX_SERVICES}");
                return None;
            }
        };
        self.refresh_log(i);
        Some(i)
    }

    /// Resolve the `log` symlink: the basename of its target names the
    /// logger service, created on demand, and this slot's output is
    /// aliased to the logger's pipe.
    fn refresh_log(&mut self, i: usize) {
        // resolution already running higher up the stack (symlink cycle)
        if self.table[i].log_to == LogTarget::Pending {
            return;
        }

        let link = self.base.join(self.table[i].name.script_dir()).join("log");
        let target = match std::fs::read_link(&link) {
            Err(e) => {
                if e.kind() == std::io::ErrorKind::InvalidInput {
                    warn!("ignoring log of {}: not a symlink", self.table[i].name);
                }
                self.table[i].log_to = LogTarget::None;
                return;
            }
            Ok(t) => t,
        };

        // the last path segment names the logger service
        let Some(target_name) = target.file_name().and_then(|f| f.to_str()).map(String::from)
        else {
            self.table[i].log_to = LogTarget::None;
            return;
        };

        self.table[i].log_to = LogTarget::Pending;
        let logger_name = match ServiceName::new(&target_name) {
            Ok(n) => n,
            Err(_) => {
                warn!(
                    "ignoring log of {}: bad target {target_name:?}",
                    self.table[i].name
                );
                self.table[i].log_to = LogTarget::None;
                return;
            }
        };

        match self.add_service(&logger_name) {
            None => self.table[i].log_to = LogTarget::None,
            Some(j) => {
                // a logger in use counts as seen even if parameterised
                self.table[j].seen = true;
                self.table[j].logger = true;
                if self.table[j].log_pipe.is_none() && !self.table[j].name.is_log() {
                    match LogPipe::new() {
                        Ok(pipe) => self.table[j].log_pipe = Some(pipe),
                        Err(e) => warn!("can't create log pipe: {e}"),
                    }
                }
                self.table[i].log_to = LogTarget::Logger(j);
            }
        }
    }

    /// Walk the service directory, mark what exists, create what is new,
    /// and retire what is gone.
    pub fn rescan(&mut self) {
        for i in 0..self.table.len() {
            self.table[i].seen = false;
        }

        let entries = match std::fs::read_dir(&self.base) {
            Ok(e) => e,
            Err(e) => {
                warn!("can't read service directory {}: {e}", self.base.display());
                return;
            }
        };

        for entry in entries.flatten() {
            let fname = entry.file_name();
            let Some(name) = fname.to_str() else { continue };
            let Ok(meta) = std::fs::metadata(self.base.join(name)) else { continue };
            if !meta.is_dir() {
                continue;
            }

            if name.ends_with('@') {
                // templates are never slots; they mark their instances
                for i in 0..self.table.len() {
                    if self.table[i].name.as_str().starts_with(name)
                        && self.table[i].state != ServiceState::Down
                    {
                        self.table[i].seen = true;
                    }
                }
                continue;
            }

            if !name::is_valid(name) {
                continue;
            }

            match self.table.find(name) {
                Some(i) => self.table[i].seen = true,
                None => {
                    let Ok(service_name) = ServiceName::new(name) else { continue };
                    if let Some(i) = self.add_service(&service_name) {
                        if scripts::down_marker(&self.base, name) {
                            self.table[i].state = ServiceState::Down;
                            self.table[i].clear_timeout();
                        }
                        self.table[i].seen = true;
                    }
                }
            }
        }

        // sweep backwards so compaction only moves already-visited slots
        let mut i = self.table.len();
        while i > 0 {
            i -= 1;

            if self.table[i].is_logger()
                && self.table[i].state == ServiceState::Down
                && self.table[i].name.is_instance()
            {
                let referenced = (0..self.table.len())
                    .any(|j| j != i && self.table[j].log_to == LogTarget::Logger(i));
                self.table[i].seen = referenced;
            }

            if !self.table[i].seen {
                self.apply(i, Event::WantDown);
                if i < self.table.len() && self.table[i].state == ServiceState::Down {
                    self.zap(i);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "rescan_tests.rs"]
mod tests;
