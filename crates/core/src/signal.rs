// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-letter signal names.
//!
//! Used both as control-protocol verbs (forward a signal to a service's
//! main process) and as the content of a service's `down-signal` file.

use nix::sys::signal::Signal;

pub fn signal_for_letter(c: char) -> Option<Signal> {
    match c {
        'p' => Some(Signal::SIGSTOP),
        'c' => Some(Signal::SIGCONT),
        'h' => Some(Signal::SIGHUP),
        'a' => Some(Signal::SIGALRM),
        'i' => Some(Signal::SIGINT),
        'q' => Some(Signal::SIGQUIT),
        '1' => Some(Signal::SIGUSR1),
        '2' => Some(Signal::SIGUSR2),
        't' => Some(Signal::SIGTERM),
        'k' => Some(Signal::SIGKILL),
        _ => None,
    }
}

pub fn is_signal_letter(c: char) -> bool {
    signal_for_letter(c).is_some()
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
