// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor lifecycle: boot, the final descent, and the fatal hook.

mod finale;
mod startup;

pub use finale::finale;
pub use startup::startup;

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::listener::ListenError;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("can't open service directory {0}: {1}")]
    ServiceDir(PathBuf, std::io::Error),

    #[error("can't create pipe: {0}")]
    Pipe(nix::errno::Errno),

    #[error("can't install signal handlers: {0}")]
    Signals(nix::errno::Errno),

    #[error(transparent)]
    Listen(#[from] ListenError),

    #[error("io error during boot: {0}")]
    Io(#[from] std::io::Error),
}

/// Last resort: hand the machine to the operator's hook, or exit 111.
/// Never returns.
pub fn fatal_hook(base: &Path) -> ! {
    let path = base.join("SYS").join("fatal");
    if let Ok(prog) = CString::new(path.as_os_str().as_bytes().to_vec()) {
        let _ = nix::unistd::execv(&prog, &[&prog]);
    }
    std::process::exit(111)
}
