// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service names.
//!
//! A service is addressed by its directory name. Parameterised services
//! live in a template directory whose name ends in `@`; a running instance
//! is addressed as `template@tag` and shares the template's scripts, with
//! the tag passed to them as an argument.

use std::fmt;

use thiserror::Error;

/// The boot/shutdown hook service. Never matched by directory scans.
pub const SYS: &str = "SYS";
/// The global logger service.
pub const LOG: &str = "LOG";
/// Synthetic slot carrying the global kill timers. Never on disk.
pub const SHUTDOWN_TIMER: &str = ".SHUTDOWN";

/// Longest accepted service name, in bytes.
pub const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("invalid service name: {0:?}")]
    Invalid(String),
}

/// A validated service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: &str) -> Result<Self, NameError> {
        if is_valid(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(NameError::Invalid(name.to_string()))
        }
    }

    /// The `SYS` hook service, which `is_valid` deliberately rejects.
    pub fn sys() -> Self {
        Self(SYS.to_string())
    }

    /// The synthetic `.SHUTDOWN` timer slot.
    pub fn shutdown_timer() -> Self {
        Self(SHUTDOWN_TIMER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sys(&self) -> bool {
        self.0 == SYS
    }

    pub fn is_log(&self) -> bool {
        self.0 == LOG
    }

    pub fn is_shutdown_timer(&self) -> bool {
        self.0 == SHUTDOWN_TIMER
    }

    /// The instance tag after `@`, if any.
    pub fn instance(&self) -> Option<&str> {
        self.0.split_once('@').map(|(_, tag)| tag)
    }

    pub fn is_instance(&self) -> bool {
        self.0.contains('@')
    }

    /// The directory holding this service's scripts: the template
    /// directory (`base@`) for instances, the name itself otherwise.
    pub fn script_dir(&self) -> &str {
        match self.0.find('@') {
            Some(at) => &self.0[..=at],
            None => &self.0,
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ServiceName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ServiceName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Whether `name` may appear in the catalog or on the control socket.
///
/// Rejected: the empty name, dot-prefixed names, the literal `SYS`, names
/// containing `/`, `,` or a newline, template names (trailing `@`), and
/// anything longer than [`MAX_NAME_LEN`] bytes.
pub fn is_valid(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name == SYS {
        return false;
    }
    if name.len() > MAX_NAME_LEN || name.ends_with('@') {
        return false;
    }
    !name.bytes().any(|b| matches!(b, b'/' | b',' | b'\n'))
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
