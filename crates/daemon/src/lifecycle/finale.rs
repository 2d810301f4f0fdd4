// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The final descent after the event loop exits: the reincarnation hook,
//! SYS/final, filesystem sync, and reboot, power-off, or re-exec.

use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{execv, execve, fork, ForkResult};
use tracing::{error, info, warn};
use warden_core::constants::TIMEOUT_SYS_FINAL;

use super::fatal_hook;
use crate::engine::Engine;
use crate::platform;

pub fn finale(engine: Engine) {
    let (sup, control, self_pipe_read) = engine.into_parts();
    control.unlink();
    drop(control);

    let base = sup.base().to_path_buf();
    let reboot = sup.reboot_requested();
    let real_pid1 = sup.is_real_pid1();
    let child_env = sup.child_env();

    // process-replacement hook; returns only when absent or broken
    let reincarnate = base.join("SYS").join("reincarnate");
    if let Ok(prog) = cstring_path(&reincarnate) {
        match execve(&prog, &[&prog], &child_env[..]) {
            Err(Errno::ENOENT) => {}
            Err(e) => warn!("SYS/reincarnate failed to exec: {e}"),
            Ok(never) => match never {},
        }
    }

    if real_pid1 {
        run_final_hook(&base, reboot, &self_pipe_read, &child_env);

        match platform::remount_root_readonly() {
            Ok(()) => info!("remounted / read-only"),
            Err(e) => warn!("could not remount / read-only: {e}"),
        }
        platform::sync_disks();

        info!("system {}", if reboot { "reboot" } else { "halt" });
        std::thread::sleep(Duration::from_secs(1));

        if let Err(e) = platform::power_cycle(reboot) {
            error!("reboot failed: {e}");
        }
        fatal_hook(&base);
    }

    if reboot {
        // standalone reboot means re-exec ourselves
        info!("re-executing");
        let args: Vec<CString> = std::env::args_os()
            .filter_map(|a| CString::new(a.as_os_str().as_bytes().to_vec()).ok())
            .collect();
        if let Some(argv0) = args.first() {
            let _ = execv(argv0, &args);
        }
        error!("could not re-exec");
        fatal_hook(&base);
    }

    info!("finished");
}

/// Run SYS/final bounded by [`TIMEOUT_SYS_FINAL`]; SIGCHLD wakes the wait
/// through the self-pipe.
fn run_final_hook(base: &Path, reboot: bool, self_pipe_read: &OwnedFd, env: &Arc<[CString]>) {
    let path = base.join("SYS").join("final");
    if nix::unistd::access(&path, nix::unistd::AccessFlags::X_OK).is_err() {
        return;
    }
    info!("SYS/final starting");

    let Ok(prog) = cstring_path(&path) else { return };
    let Ok(arg) = CString::new(if reboot { "reboot" } else { "shutdown" }) else { return };

    let child = match unsafe { fork() } {
        Err(e) => {
            warn!("SYS/final failed to fork: {e}");
            return;
        }
        Ok(ForkResult::Child) => {
            let _ = execve(&prog, &[prog.clone(), arg], &env[..]);
            unsafe { libc::_exit(127) }
        }
        Ok(ForkResult::Parent { child }) => child,
    };

    drain(self_pipe_read);
    let mut pfds = [PollFd::new(self_pipe_read.as_fd(), PollFlags::POLLIN)];
    let timeout = PollTimeout::try_from(TIMEOUT_SYS_FINAL as i32).unwrap_or(PollTimeout::MAX);
    let _ = poll(&mut pfds, timeout);

    let mut status: libc::c_int = 0;
    let reaped =
        unsafe { libc::waitpid(child.as_raw(), &mut status, libc::WNOHANG) } == child.as_raw();
    if reaped {
        info!("SYS/final finished with status {}", libc::WEXITSTATUS(status));
    } else {
        let _ = kill(child, Signal::SIGKILL);
        let _ = unsafe { libc::waitpid(child.as_raw(), &mut status, 0) };
        info!("SYS/final terminated after timeout");
    }
}

fn drain(fd: &OwnedFd) {
    let mut buf = [0u8; 64];
    while matches!(nix::unistd::read(fd.as_raw_fd(), &mut buf), Ok(n) if n > 0) {}
}

fn cstring_path(path: &Path) -> Result<CString, std::ffi::NulError> {
    CString::new(path.as_os_str().as_bytes().to_vec())
}
