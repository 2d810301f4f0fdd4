// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launch paths for the three per-service scripts, and the teardown
//! helpers the state machine drives them with.
//!
//! A missing script synthesises its outcome directly: no `setup` fires
//! SETUP immediately, no `run` makes the service a oneshot, no `finish`
//! fires FINISHED.

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::Arc;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::Signal;
use nix::unistd::pipe2;
use tracing::warn;
use warden_core::constants::{DELAY_SPAWN_ERROR, DELAY_STARTING, TIMEOUT_FINISH, TIMEOUT_SHUTDOWN};
use warden_core::{Clock, Event, GlobalState, ServiceName, ServiceState};

use super::scripts;
use super::service::{LogTarget, STATUS_EXEC_FAILED};
use super::spawner::{ChildSpec, SpawnOutcome, Spawner, StdioSpec};
use super::supervisor::{Notifier, Supervisor};

impl<C: Clock, S: Spawner, N: Notifier> Supervisor<C, S, N> {
    /// Launch the `setup` script, or fire SETUP directly when there is none.
    pub(crate) fn start_setup(&mut self, i: usize) {
        let name = self.table[i].name.clone();

        if !scripts::script_exists(&self.base, &name, "setup") {
            self.table[i].state = ServiceState::Setup;
            self.apply(i, Event::SetupDone);
            return;
        }

        let mut spec = self.child_spec(&name, "setup");
        spec.fail_exit = 111;
        spec.stdout = self.stdout_spec(i);
        if name.is_sys() {
            // keep the console on stdin and acquire the controlling tty
            spec.stdin = StdioSpec::Keep;
            spec.take_tty = true;
        }

        match self.spawner.spawn(spec) {
            SpawnOutcome::ForkFailed(e) | SpawnOutcome::ExecFailed(e) => {
                warn!("can't fork {name}/setup: {e}");
                self.table[i].state = ServiceState::Delay;
                self.table[i].arm_timeout(DELAY_SPAWN_ERROR);
            }
            SpawnOutcome::Started(pid) => {
                let now = self.clock.now_ms();
                let s = &mut self.table[i];
                s.setup_pid = Some(pid);
                s.started_at = now;
                s.state = ServiceState::Setup;
                s.clear_timeout();
                self.notify(i);
            }
        }
    }

    /// Launch the `run` process. No `run` script makes the service a
    /// oneshot; a vanished service directory makes it fatal.
    pub(crate) fn start_run(&mut self, i: usize) {
        self.table[i].setup_pid = None;
        let name = self.table[i].name.clone();

        if !scripts::script_exists(&self.base, &name, "run") {
            let now = self.clock.now_ms();
            let s = &mut self.table[i];
            s.pid = None;
            s.started_at = now;
            s.state = ServiceState::Oneshot;
            s.clear_timeout();
            if !scripts::dir_exists(&self.base, &name) {
                let s = &mut self.table[i];
                s.state = ServiceState::Fatal;
                s.wstatus = STATUS_EXEC_FAILED;
                self.apply(i, Event::Exited);
                return;
            }
            self.notify(i);
            return;
        }

        let notification_fd = scripts::notification_fd(&self.base, &name);
        let mut ready = None;
        if let Some(target) = notification_fd {
            match pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC) {
                Ok((r, w)) => {
                    self.table[i].ready_pipe = Some(r);
                    ready = Some((w, target));
                }
                Err(e) => {
                    warn!("can't create readiness pipe for {name}: {e}");
                    self.table[i].state = ServiceState::Delay;
                    self.table[i].arm_timeout(DELAY_SPAWN_ERROR);
                    return;
                }
            }
        } else {
            self.table[i].ready_pipe = None;
        }

        let stdin = if name.is_log() {
            StdioSpec::Fd(self.global_log.read_fd())
        } else if let Some(pipe) = &self.table[i].log_pipe {
            StdioSpec::Fd(pipe.reader.as_raw_fd())
        } else {
            StdioSpec::Fd(self.null_fd.as_raw_fd())
        };
        let stdout = if name.is_log() { StdioSpec::Keep } else { self.stdout_spec(i) };

        let mut spec = self.child_spec(&name, "run");
        spec.stdin = stdin;
        spec.stdout = stdout;
        spec.stderr_to_stdout = name.is_log();
        spec.ready_fd = ready;
        spec.exec_guard = true;

        match self.spawner.spawn(spec) {
            SpawnOutcome::ForkFailed(e) => {
                warn!("can't fork {name}/run: {e}");
                let s = &mut self.table[i];
                s.state = ServiceState::Delay;
                s.pid = None;
                s.wstatus = STATUS_EXEC_FAILED;
                s.arm_timeout(DELAY_SPAWN_ERROR);
            }
            SpawnOutcome::ExecFailed(e) => {
                warn!("can't exec {name}/run: {e}");
                match e {
                    // probably a temporary problem, retry after a delay
                    Errno::EAGAIN | Errno::EIO | Errno::EMFILE | Errno::ENOMEM
                    | Errno::ETXTBSY => {
                        let s = &mut self.table[i];
                        s.state = ServiceState::Delay;
                        s.pid = None;
                        s.wstatus = STATUS_EXEC_FAILED;
                        s.arm_timeout(DELAY_SPAWN_ERROR);
                    }
                    // unlikely to go away
                    _ => {
                        let now = self.clock.now_ms();
                        let s = &mut self.table[i];
                        s.state = ServiceState::Fatal;
                        s.pid = None;
                        s.wstatus = STATUS_EXEC_FAILED;
                        s.started_at = now;
                        s.clear_timeout();
                        self.apply(i, Event::Exited);
                    }
                }
            }
            SpawnOutcome::Started(pid) => {
                if name.is_log() {
                    self.global_log.set_active(true);
                }
                let now = self.clock.now_ms();
                let s = &mut self.table[i];
                s.pid = Some(pid);
                s.started_at = now;
                s.state = ServiceState::Starting;
                if notification_fd.is_none() {
                    s.arm_timeout(DELAY_STARTING);
                } else {
                    // wait for readiness, however long it takes
                    s.clear_timeout();
                }
                self.notify(i);
            }
        }
    }

    /// Launch the `finish` script with the main process's outcome, or fire
    /// FINISHED when there is none. Idempotent while one is running.
    pub(crate) fn start_finish(&mut self, i: usize) {
        if self.table[i].finish_pid.is_some() {
            return;
        }
        let name = self.table[i].name.clone();

        if !scripts::script_exists(&self.base, &name, "finish") {
            self.apply(i, Event::Finished);
            return;
        }

        let (status, signal) = finish_status(self.table[i].wstatus);
        let mut spec = self.child_spec(&name, "finish");
        spec.args =
            vec![cstr("finish"), cstr(&status.to_string()), cstr(&signal.to_string())];
        if name.is_sys() {
            spec.args.push(cstr(if self.reboot_requested { "reboot" } else { "shutdown" }));
        } else if let Some(tag) = name.instance() {
            spec.args.push(cstr(tag));
        }
        spec.stdout = self.stdout_spec(i);

        match self.spawner.spawn(spec) {
            SpawnOutcome::ForkFailed(e) | SpawnOutcome::ExecFailed(e) => {
                warn!("can't fork {name}/finish: {e}");
                self.apply(i, Event::Finished);
            }
            SpawnOutcome::Started(pid) => {
                self.table[i].finish_pid = Some(pid);
                self.table[i].arm_timeout(TIMEOUT_FINISH);
                self.notify(i);
            }
        }
    }

    /// Begin termination: signal the helpers and the main process, move to
    /// SHUTDOWN unless a RESTART is already recorded.
    pub(crate) fn stop(&mut self, i: usize) {
        if let Some(pid) = self.table[i].setup_pid {
            self.spawner.kill(pid, Signal::SIGTERM);
            self.spawner.kill(pid, Signal::SIGCONT);
        }
        if let Some(pid) = self.table[i].pid {
            let sig = scripts::down_signal(&self.base, &self.table[i].name);
            self.spawner.kill(pid, sig);
            self.spawner.kill(pid, Signal::SIGCONT);
        }
        if self.table[i].name.is_log() {
            self.global_log.set_active(false);
        }
        if !matches!(self.table[i].state, ServiceState::Shutdown | ServiceState::Restart) {
            self.table[i].state = ServiceState::Shutdown;
            self.table[i].arm_timeout(TIMEOUT_SHUTDOWN);
        }
    }

    /// Escalate an overdue termination to SIGKILL.
    pub(crate) fn kill_now(&mut self, i: usize) {
        debug_assert!(matches!(
            self.table[i].state,
            ServiceState::Shutdown | ServiceState::Restart | ServiceState::Oneshot
        ));
        let pids =
            [self.table[i].setup_pid, self.table[i].pid, self.table[i].finish_pid];
        for pid in pids.into_iter().flatten() {
            self.spawner.kill(pid, Signal::SIGKILL);
        }
    }

    /// Reset a slot to DOWN after its last child is gone. During shutdown
    /// this also releases log pipes so loggers can drain to EOF.
    pub(crate) fn cleanup(&mut self, i: usize) {
        let now = self.clock.now_ms();
        let s = &mut self.table[i];
        s.pid = None;
        s.setup_pid = None;
        s.finish_pid = None;
        s.clear_timeout();
        s.state = ServiceState::Down;
        s.started_at = now;
        s.ready_pipe = None;

        if self.global != GlobalState::Up {
            self.release_log_pipes(i);
        }
        self.notify(i);
    }

    fn release_log_pipes(&mut self, i: usize) {
        self.table[i].log_pipe = None;
        if let LogTarget::Logger(j) = self.table[i].log_to {
            self.table[j].log_pipe = None;
        }
    }

    /// Where this service's stdout goes: its logger's pipe, the global log
    /// pipe while `LOG` runs, or the inherited console.
    pub(crate) fn stdout_spec(&self, i: usize) -> StdioSpec {
        if let Some(fd) = self.log_writer(i) {
            StdioSpec::Fd(fd)
        } else if let Some(fd) = self.global_log.write_fd() {
            StdioSpec::Fd(fd)
        } else {
            StdioSpec::Keep
        }
    }

    fn log_writer(&self, i: usize) -> Option<std::os::fd::RawFd> {
        match self.table[i].log_to {
            LogTarget::Logger(j) => {
                self.table[j].log_pipe.as_ref().map(|p| p.writer.as_raw_fd())
            }
            _ => None,
        }
    }

    fn child_spec(&self, name: &ServiceName, program: &str) -> ChildSpec {
        let mut args = vec![cstr(program)];
        if let Some(tag) = name.instance() {
            args.push(cstr(tag));
        }
        ChildSpec {
            dir: cstring_path(&self.base.join(name.script_dir())),
            program: cstr(program),
            args,
            env: Arc::clone(&self.child_env),
            stdin: StdioSpec::Fd(self.null_fd.as_raw_fd()),
            stdout: StdioSpec::Keep,
            stderr_to_stdout: false,
            ready_fd: None,
            take_tty: false,
            exec_guard: false,
            fail_exit: 127,
        }
    }
}

/// The `(status, signal)` pair handed to a finish script: `(111, 0)` when
/// exec itself failed, `(-1, signo)` for a signaled exit, `(code, 0)`
/// otherwise.
pub(crate) fn finish_status(wstatus: i32) -> (i32, i32) {
    if wstatus == STATUS_EXEC_FAILED {
        (111, 0)
    } else if libc::WIFSIGNALED(wstatus) {
        (-1, libc::WTERMSIG(wstatus))
    } else {
        (libc::WEXITSTATUS(wstatus), 0)
    }
}

fn cstr(s: &str) -> CString {
    CString::new(s).unwrap_or_default()
}

fn cstring_path(path: &Path) -> CString {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).unwrap_or_default()
}

#[cfg(test)]
#[path = "launch_tests.rs"]
mod tests;
