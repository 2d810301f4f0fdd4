// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment access for the daemon crate.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default service catalog.
pub const DEFAULT_SERVICE_DIR: &str = "/etc/warden";

/// Catalog used in single-user mode (`wardend S` as true init).
pub const SINGLE_USER_SERVICE_DIR: &str = "/etc/warden.single";

/// Environment override for the control socket path.
pub const SOCKET_ENV: &str = "WARDEN_SOCK";

/// Symlink consulted when [`SOCKET_ENV`] is unset.
const SOCKET_LINK: &str = "/etc/warden.sock";

#[cfg(target_os = "linux")]
const DEFAULT_SOCKET: &str = "/run/warden/warden.sock";
#[cfg(not(target_os = "linux"))]
const DEFAULT_SOCKET: &str = "/var/run/warden/warden.sock";

/// PATH handed to children when the supervisor itself inherited none.
pub const DEFAULT_PATH: &str = "/usr/bin:/bin:/usr/sbin:/sbin";

/// Resolve the control socket path: `$WARDEN_SOCK`, then the target of the
/// `/etc/warden.sock` symlink, then the platform run directory.
pub fn control_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(SOCKET_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Ok(target) = std::fs::read_link(SOCKET_LINK) {
        return target;
    }
    PathBuf::from(DEFAULT_SOCKET)
}

/// The environment passed to every child, materialised once at startup so
/// nothing between fork and exec has to allocate.
///
/// The inherited environment is passed through unchanged except that PATH
/// is supplied when missing.
pub fn child_environment() -> Arc<[CString]> {
    let mut env = Vec::new();
    let mut has_path = false;
    for (key, value) in std::env::vars_os() {
        if key.as_bytes() == b"PATH" {
            has_path = true;
        }
        let mut entry = key.as_bytes().to_vec();
        entry.push(b'=');
        entry.extend_from_slice(value.as_bytes());
        if let Ok(cstr) = CString::new(entry) {
            env.push(cstr);
        }
    }
    if !has_path {
        if let Ok(cstr) = CString::new(format!("PATH={DEFAULT_PATH}")) {
            env.push(cstr);
        }
    }
    env.into()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
