// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operator control channel: a bound datagram socket for one-packet
//! requests, plus the `notify/` subscriber directory beside it.

mod control;
mod notify;

pub use control::{handle_request, ControlSocket};
pub use notify::SocketNotifier;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListenError {
    #[error("control socket {0} already in use")]
    InUse(PathBuf),

    #[error("could not bind control socket {0}: {1}")]
    Bind(PathBuf, std::io::Error),

    #[error("could not create notify directory {0}: {1}")]
    NotifyDir(PathBuf, std::io::Error),

    #[error("io error on control socket: {0}")]
    Io(#[from] std::io::Error),
}
