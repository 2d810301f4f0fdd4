// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process creation behind a seam.
//!
//! The state machine describes a child with a [`ChildSpec`]; the
//! [`UnixSpawner`] realises it with fork/exec. Tests substitute a recording
//! spawner so transitions can be driven without creating processes.

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{chdir, dup2, execve, fork, pipe2, read, setsid, write, ForkResult, Pid};

/// What a stdio descriptor of the child should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioSpec {
    /// Leave the inherited descriptor alone (the console, for services
    /// wired to neither a logger nor the global log)
    Keep,
    /// Dup the given descriptor into place
    Fd(RawFd),
}

/// A fully-resolved launch request. All strings are `CString`s prepared
/// up front: the child must not allocate between fork and exec.
#[derive(Debug)]
pub struct ChildSpec {
    /// Directory to enter before exec
    pub dir: CString,
    /// Program path, relative to `dir`
    pub program: CString,
    /// argv, including argv[0]
    pub args: Vec<CString>,
    pub env: Arc<[CString]>,
    pub stdin: StdioSpec,
    pub stdout: StdioSpec,
    /// Dup stdout onto stderr after wiring stdout (the `LOG` service)
    pub stderr_to_stdout: bool,
    /// Readiness pipe write end and the descriptor number the service
    /// expects it on. Ownership rides along so the parent side is closed
    /// exactly once, after the fork.
    pub ready_fd: Option<(OwnedFd, RawFd)>,
    /// Acquire the controlling terminal after setsid (SYS setup)
    pub take_tty: bool,
    /// Report exec failure through a close-on-exec status pipe
    pub exec_guard: bool,
    /// Child exit code when chdir or exec fails and there is no guard
    pub fail_exit: i32,
}

/// Outcome of a launch attempt, as observed by the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Started(Pid),
    /// fork (or the status pipe) failed; nothing was created
    ForkFailed(Errno),
    /// The child reported exec failure through the guard pipe
    ExecFailed(Errno),
}

pub trait Spawner {
    fn spawn(&mut self, spec: ChildSpec) -> SpawnOutcome;
    fn kill(&mut self, pid: Pid, sig: Signal);
    /// Signal every process on the system (`kill(-1, ...)`).
    fn kill_everyone(&mut self, sig: Signal);
}

/// The real fork/exec implementation.
#[derive(Debug, Default)]
pub struct UnixSpawner;

impl Spawner for UnixSpawner {
    fn spawn(&mut self, spec: ChildSpec) -> SpawnOutcome {
        let guard = if spec.exec_guard {
            match pipe2(OFlag::O_CLOEXEC) {
                Ok(pair) => Some(pair),
                Err(e) => return SpawnOutcome::ForkFailed(e),
            }
        } else {
            None
        };

        match unsafe { fork() } {
            Err(e) => SpawnOutcome::ForkFailed(e),
            Ok(ForkResult::Child) => {
                let guard_write = guard.map(|(r, w)| {
                    drop(r);
                    w
                });
                exec_child(&spec, guard_write)
            }
            Ok(ForkResult::Parent { child }) => {
                // `spec` is dropped on return, closing the parent's copy of
                // the readiness write end.
                match guard {
                    None => SpawnOutcome::Started(child),
                    Some((reader, writer)) => {
                        drop(writer);
                        let mut byte = [0u8; 1];
                        loop {
                            match read(reader.as_raw_fd(), &mut byte) {
                                Ok(0) => return SpawnOutcome::Started(child),
                                Ok(_) => {
                                    return SpawnOutcome::ExecFailed(Errno::from_raw(
                                        byte[0] as i32,
                                    ))
                                }
                                Err(Errno::EINTR) => continue,
                                // reap will tell the real story
                                Err(_) => return SpawnOutcome::Started(child),
                            }
                        }
                    }
                }
            }
        }
    }

    fn kill(&mut self, pid: Pid, sig: Signal) {
        let _ = kill(pid, sig);
    }

    fn kill_everyone(&mut self, sig: Signal) {
        #[cfg(target_os = "linux")]
        if sig == Signal::SIGKILL {
            // kill(-1, SIGKILL) can block indefinitely when a process is
            // stuck in state D; fork and only block the child.
            if let Ok(ForkResult::Child) = unsafe { fork() } {
                let _ = kill(Pid::from_raw(-1), Signal::SIGKILL);
                unsafe { libc::_exit(0) }
            }
            return;
        }
        let _ = kill(Pid::from_raw(-1), sig);
    }
}

/// Everything between fork and exec. Only async-signal-safe calls; no
/// allocation, no logging.
fn exec_child(spec: &ChildSpec, guard_write: Option<OwnedFd>) -> ! {
    if chdir(spec.dir.as_c_str()).is_err() {
        unsafe { libc::_exit(spec.fail_exit) }
    }

    let _ = setsid();

    if spec.take_tty {
        // only effective after setsid
        unsafe {
            libc::ioctl(0, libc::TIOCSCTTY as _, 1);
        }
    }

    if let StdioSpec::Fd(fd) = spec.stdin {
        let _ = dup2(fd, 0);
    }
    if let StdioSpec::Fd(fd) = spec.stdout {
        let _ = dup2(fd, 1);
    }
    if spec.stderr_to_stdout {
        let _ = dup2(1, 2);
    }
    if let Some((src, target)) = &spec.ready_fd {
        let _ = dup2(src.as_raw_fd(), *target);
    }

    let errno = match execve(&spec.program, &spec.args[..], &spec.env[..]) {
        Err(e) => e,
        Ok(never) => match never {},
    };

    if let Some(w) = &guard_write {
        let _ = write(w, &[errno as i32 as u8]);
    }
    let code = if spec.exec_guard {
        if errno == Errno::ENOENT {
            127
        } else {
            126
        }
    } else {
        spec.fail_exit
    };
    unsafe { libc::_exit(code) }
}
