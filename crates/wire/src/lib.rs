// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control protocol for the warden supervisor.
//!
//! One datagram is one request; the first byte is a verb, the remainder a
//! service name. Replies are single datagrams of line-oriented text.
//! State-change notifications are one-line datagrams delivered to
//! subscriber sockets.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod notify;
mod reply;
mod request;

pub use notify::{render_state_change, subscriber_matches};
pub use reply::{render_list, render_query, render_stats, ServiceRow, ERROR, OK};
pub use request::{ProtocolError, Request};
