// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Well-known files inside a service directory.
//!
//! Instances (`base@tag`) share the template directory `base@`; only the
//! `down` marker is looked up under the literal name, since it is consulted
//! solely for directories found on disk.

use std::path::{Path, PathBuf};

use nix::sys::signal::Signal;
use warden_core::{signal_for_letter, ServiceName};

/// Path of `file` inside the service's script directory.
pub fn script_path(base: &Path, name: &ServiceName, file: &str) -> PathBuf {
    base.join(name.script_dir()).join(file)
}

pub fn script_exists(base: &Path, name: &ServiceName, file: &str) -> bool {
    script_path(base, name, file).exists()
}

/// Whether the service's script directory itself still exists.
pub fn dir_exists(base: &Path, name: &ServiceName) -> bool {
    base.join(name.script_dir()).is_dir()
}

/// The `down` marker of a directory found by the rescanner.
pub fn down_marker(base: &Path, name: &str) -> bool {
    base.join(name).join("down").exists()
}

/// The descriptor number named by `notification-fd`, if the file exists
/// and is non-empty. Digits are accumulated wherever they appear; other
/// bytes are skipped.
pub fn notification_fd(base: &Path, name: &ServiceName) -> Option<i32> {
    let content = std::fs::read(script_path(base, name, "notification-fd")).ok()?;
    if content.is_empty() {
        return None;
    }
    let mut n: i32 = 0;
    for b in content {
        if b == 0 {
            break;
        }
        if b.is_ascii_digit() {
            n = n.saturating_mul(10).saturating_add((b - b'0') as i32);
        }
    }
    Some(n)
}

/// The signal used for a graceful stop of the main process: the letter in
/// `down-signal`, defaulting to SIGTERM.
pub fn down_signal(base: &Path, name: &ServiceName) -> Signal {
    let Ok(content) = std::fs::read(script_path(base, name, "down-signal")) else {
        return Signal::SIGTERM;
    };
    content
        .first()
        .and_then(|b| signal_for_letter(*b as char))
        .unwrap_or(Signal::SIGTERM)
}

#[cfg(test)]
#[path = "scripts_tests.rs"]
mod tests;
