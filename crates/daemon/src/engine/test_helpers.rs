// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests: a supervisor over a temp catalog,
//! driven by a fake clock and a recording spawner.

use std::collections::VecDeque;
use std::fs::File;
use std::os::fd::OwnedFd;

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use warden_core::{Clock, FakeClock, ServiceName, ServiceState};

use super::service::GlobalLog;
use super::spawner::{ChildSpec, SpawnOutcome, Spawner};
use super::supervisor::{Notifier, Supervisor, SupervisorConfig};

/// A recorded launch request, spec and all. Holding the spec keeps the
/// readiness write end open so tests can feed the pipe.
pub(crate) struct Launch {
    pub spec: ChildSpec,
    pub pid: Option<i32>,
}

impl Launch {
    pub fn program(&self) -> &str {
        self.spec.program.to_str().unwrap_or("")
    }

    pub fn arg(&self, n: usize) -> Option<&str> {
        self.spec.args.get(n).and_then(|a| a.to_str().ok())
    }
}

#[derive(Default)]
pub(crate) struct FakeSpawner {
    pub launches: Vec<Launch>,
    pub kills: Vec<(i32, Signal)>,
    pub broadcast: Vec<Signal>,
    outcomes: VecDeque<SpawnOutcome>,
    next_pid: i32,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self { next_pid: 100, ..Self::default() }
    }

    /// Script the outcome of the next spawn instead of a fresh pid.
    pub fn fail_next(&mut self, outcome: SpawnOutcome) {
        self.outcomes.push_back(outcome);
    }

    pub fn last(&self) -> &Launch {
        self.launches.last().expect("no launches recorded")
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&mut self, spec: ChildSpec) -> SpawnOutcome {
        let outcome = self.outcomes.pop_front().unwrap_or_else(|| {
            self.next_pid += 1;
            SpawnOutcome::Started(Pid::from_raw(self.next_pid))
        });
        let pid = match outcome {
            SpawnOutcome::Started(p) => Some(p.as_raw()),
            _ => None,
        };
        self.launches.push(Launch { spec, pid });
        outcome
    }

    fn kill(&mut self, pid: Pid, sig: Signal) {
        self.kills.push((pid.as_raw(), sig));
    }

    fn kill_everyone(&mut self, sig: Signal) {
        self.broadcast.push(sig);
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub events: Vec<(String, ServiceState)>,
}

impl Notifier for RecordingNotifier {
    fn state_changed(&mut self, name: &ServiceName, state: ServiceState) {
        self.events.push((name.as_str().to_string(), state));
    }
}

pub(crate) type TestSupervisor = Supervisor<FakeClock, FakeSpawner, RecordingNotifier>;

pub(crate) struct Harness {
    pub dir: tempfile::TempDir,
    pub clock: FakeClock,
    pub sup: TestSupervisor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_pid1(false)
    }

    pub fn pid1() -> Self {
        Self::with_pid1(true)
    }

    fn with_pid1(pid1: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = FakeClock::new();
        let null_fd = OwnedFd::from(File::open("/dev/null").expect("/dev/null"));
        let sup = Supervisor::new(
            clock.clone(),
            FakeSpawner::new(),
            RecordingNotifier::default(),
            SupervisorConfig {
                base: dir.path().to_path_buf(),
                child_env: std::sync::Arc::from(Vec::<std::ffi::CString>::new()),
                pid1,
                real_pid1: false,
                null_fd,
                global_log: GlobalLog::new().expect("global log pipe"),
            },
        );
        Self { dir, clock, sup }
    }

    /// Create a service directory.
    pub fn svc(&self, name: &str) {
        std::fs::create_dir_all(self.dir.path().join(name)).expect("service dir");
    }

    /// Drop a (never executed) script file into a service directory.
    pub fn script(&self, svc: &str, file: &str) {
        std::fs::write(self.dir.path().join(svc).join(file), "#!/bin/sh\n").expect("script");
    }

    pub fn add(&mut self, name: &str) -> usize {
        self.sup
            .add_service(&ServiceName::new(name).expect("valid name"))
            .expect("slot available")
    }

    /// Materialise and fire due timers, like the top of the event loop.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        self.sup.fire_due_timers(now);
    }

    /// One full timer cycle: materialise deadlines, advance, fire.
    pub fn elapse(&mut self, ms: i64) {
        self.tick();
        self.clock.advance(ms);
        self.tick();
    }

    /// Bring a freshly added service with a `run` script to STARTING.
    pub fn start(&mut self, i: usize) -> i32 {
        self.sup.apply(i, warden_core::Event::WantUp);
        assert_eq!(self.sup.service(i).state, ServiceState::Starting);
        self.sup.service(i).pid_raw()
    }

    /// Promote a STARTING service (without readiness pipe) to UP.
    pub fn promote(&mut self, i: usize) {
        self.elapse(warden_core::constants::DELAY_STARTING);
        assert_eq!(self.sup.service(i).state, ServiceState::Up);
    }
}

/// Raw wait status of a clean numeric exit.
pub(crate) fn wexit(code: i32) -> i32 {
    (code & 0xff) << 8
}

/// Raw wait status of a signaled death.
pub(crate) fn wsignaled(sig: i32) -> i32 {
    sig & 0x7f
}
