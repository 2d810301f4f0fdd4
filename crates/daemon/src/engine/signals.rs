// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal handling via the self-pipe pattern.
//!
//! Handlers do the minimum: set a flag and write one byte into the
//! self-pipe to wake the poll. These statics are the only process-wide
//! mutable state outside the supervisor, since handlers get no context.

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static WANT_RESCAN: AtomicBool = AtomicBool::new(false);
static WANT_SHUTDOWN: AtomicBool = AtomicBool::new(false);
static WANT_REBOOT: AtomicBool = AtomicBool::new(false);
static SELF_PIPE_WRITE: AtomicI32 = AtomicI32::new(-1);
static AS_REAL_PID1: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(sig: libc::c_int) {
    // caught rather than SIG_IGN so children don't inherit the disposition
    if sig == libc::SIGPIPE {
        return;
    }

    let saved_errno = Errno::last_raw();

    match sig {
        // Linux Ctrl-Alt-Delete arrives as SIGINT on true init
        libc::SIGINT => {
            if AS_REAL_PID1.load(Ordering::Relaxed) {
                WANT_REBOOT.store(true, Ordering::Relaxed);
            } else {
                WANT_SHUTDOWN.store(true, Ordering::Relaxed);
            }
        }
        libc::SIGTERM => WANT_SHUTDOWN.store(true, Ordering::Relaxed),
        libc::SIGHUP => WANT_RESCAN.store(true, Ordering::Relaxed),
        // SIGCHLD just wakes the loop; the reaper drains
        _ => {}
    }

    let fd = SELF_PIPE_WRITE.load(Ordering::Relaxed);
    if fd >= 0 {
        loop {
            let r = unsafe { libc::write(fd, [0u8].as_ptr().cast(), 1) };
            if r != -1 || Errno::last_raw() != libc::EINTR {
                break;
            }
        }
    }

    Errno::set_raw(saved_errno);
}

/// Install the handlers. True init leaves SIGTERM at its default, which
/// for pid 1 means ignored by the kernel.
pub fn install(self_pipe_write: RawFd, real_pid1: bool) -> nix::Result<()> {
    SELF_PIPE_WRITE.store(self_pipe_write, Ordering::Relaxed);
    AS_REAL_PID1.store(real_pid1, Ordering::Relaxed);

    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::SA_NOCLDSTOP | SaFlags::SA_RESTART,
        SigSet::all(),
    );
    unsafe {
        sigaction(Signal::SIGPIPE, &action)?;
        sigaction(Signal::SIGCHLD, &action)?;
        sigaction(Signal::SIGHUP, &action)?;
        sigaction(Signal::SIGINT, &action)?;
        if !real_pid1 {
            sigaction(Signal::SIGTERM, &action)?;
        }
    }
    Ok(())
}

/// Consume a pending rescan wish.
pub fn take_rescan() -> bool {
    WANT_RESCAN.swap(false, Ordering::Relaxed)
}

/// Shutdown and reboot wishes are deliberately not consumed: they keep
/// driving the orchestrator forward on every wakeup.
pub fn shutdown_requested() -> bool {
    WANT_SHUTDOWN.load(Ordering::Relaxed)
}

pub fn reboot_requested() -> bool {
    WANT_REBOOT.load(Ordering::Relaxed)
}

pub fn request_rescan() {
    WANT_RESCAN.store(true, Ordering::Relaxed);
}

pub fn request_shutdown() {
    WANT_SHUTDOWN.store(true, Ordering::Relaxed);
}

pub fn request_reboot() {
    WANT_REBOOT.store(true, Ordering::Relaxed);
}
