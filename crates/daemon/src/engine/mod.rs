// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervision engine.

mod launch;
mod machine;
mod reap;
mod rescan;
mod run;
pub(crate) mod scripts;
mod service;
mod shutdown;
pub mod signals;
mod spawner;
mod supervisor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use run::{DaemonSupervisor, Engine};
pub use service::{GlobalLog, LogPipe, LogTarget, Service, ServiceTable, STATUS_EXEC_FAILED};
pub use spawner::{ChildSpec, SpawnOutcome, Spawner, StdioSpec, UnixSpawner};
pub use supervisor::{Notifier, Supervisor, SupervisorConfig};
