// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot: acquire init duties where applicable, claim stdio, open the
//! catalog and the control socket, and seed the first services.

use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{dup2, fork, pipe2, ForkResult};
use tracing::info;
use warden_core::{Event, ServiceName, SystemClock};

use super::BootError;
use crate::engine::{
    signals, Engine, GlobalLog, Supervisor, SupervisorConfig, UnixSpawner,
};
use crate::listener::ControlSocket;
use crate::{env, platform};

pub fn startup(service_dir: Option<PathBuf>) -> Result<Engine, BootError> {
    let pid1 = nix::unistd::getpid().as_raw() == 1;
    let mut real_pid1 = pid1;

    if pid1 {
        nix::sys::stat::umask(Mode::from_bits_truncate(0o022));
        platform::init_mounts();
        if platform::set_ctrl_alt_del(false).is_err() {
            // we are in a container
            real_pid1 = false;
        }
        platform::own_console();
    }

    let child_env = env::child_environment();
    let null_fd = claim_stdio()?;

    let mut base = service_dir.unwrap_or_else(|| PathBuf::from(env::DEFAULT_SERVICE_DIR));
    if real_pid1 && (base == Path::new("S") || base == Path::new("single")) {
        base = PathBuf::from(env::SINGLE_USER_SERVICE_DIR);
    }
    let base = base.canonicalize().unwrap_or(base);
    std::fs::read_dir(&base).map_err(|e| BootError::ServiceDir(base.clone(), e))?;
    std::env::set_current_dir(&base).map_err(|e| BootError::ServiceDir(base.clone(), e))?;

    let self_pipe =
        pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC).map_err(BootError::Pipe)?;
    let global_log = GlobalLog::new().map_err(BootError::Pipe)?;

    signals::install(self_pipe.1.as_raw_fd(), real_pid1).map_err(BootError::Signals)?;

    let control = ControlSocket::open(&env::control_socket_path())?;
    let notifier = control.notifier()?;

    let mut sup = Supervisor::new(
        SystemClock,
        UnixSpawner,
        notifier,
        SupervisorConfig {
            base: base.clone(),
            child_env,
            pid1,
            real_pid1,
            null_fd,
            global_log,
        },
    );

    info!("booting");

    if base.join("SYS").join("setup").exists() {
        // bring the rest up only once SYS reports setup completion
        if let Some(b) = sup.add_service(&ServiceName::sys()) {
            sup.apply(b, Event::WantUp);
        }
    } else {
        if base.join(warden_core::name::LOG).exists() {
            if let Ok(log) = ServiceName::new(warden_core::name::LOG) {
                if let Some(l) = sup.add_service(&log) {
                    sup.apply(l, Event::WantUp);
                }
            }
        }
        sup.rescan();
    }

    Ok(Engine::new(sup, control, self_pipe))
}

/// A read descriptor of `/dev/null` for child stdin. When fd 0-2 were not
/// open at startup, they are claimed first so no child inherits garbage.
fn claim_stdio() -> Result<OwnedFd, BootError> {
    let null = match File::open("/dev/null") {
        Ok(f) => OwnedFd::from(f),
        Err(_) => {
            // no /dev/null: a closed pipe reads as EOF just the same
            let (r, w) = pipe2(OFlag::O_CLOEXEC).map_err(BootError::Pipe)?;
            drop(w);
            r
        }
    };
    if null.as_raw_fd() > 2 {
        return Ok(null);
    }

    let raised =
        fcntl(null.as_raw_fd(), FcntlArg::F_DUPFD_CLOEXEC(3)).map_err(BootError::Pipe)?;
    let raised = unsafe { OwnedFd::from_raw_fd(raised) };
    drop(null);
    let _ = dup2(raised.as_raw_fd(), 0);

    let void = match std::fs::OpenOptions::new().write(true).open("/dev/null") {
        Ok(f) => OwnedFd::from(f),
        Err(_) => spawn_void_drain()?,
    };
    let void_raw = void.as_raw_fd();
    let _ = dup2(void_raw, 1);
    let _ = dup2(void_raw, 2);
    if void_raw <= 2 {
        // already sitting on a stdio descriptor; keep it open
        std::mem::forget(void);
    }
    Ok(raised)
}

/// `/dev/null` exists but is not writable: fall back to a child that
/// drains a pipe, so writes to stdout/stderr go somewhere harmless.
fn spawn_void_drain() -> Result<OwnedFd, BootError> {
    let (r, w) = pipe2(OFlag::empty()).map_err(BootError::Pipe)?;
    match unsafe { fork() } {
        Err(e) => Err(BootError::Pipe(e)),
        Ok(ForkResult::Child) => {
            drop(w);
            let mut buf = [0u8; 1024];
            while matches!(nix::unistd::read(r.as_raw_fd(), &mut buf), Ok(n) if n > 0) {}
            unsafe { libc::_exit(0) }
        }
        Ok(ForkResult::Parent { .. }) => {
            drop(r);
            Ok(w)
        }
    }
}
