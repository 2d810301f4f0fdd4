// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request parsing: one datagram, one verb byte, optional service name.

use thiserror::Error;
use warden_core::is_signal_letter;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,

    #[error("request is not valid UTF-8")]
    NotUtf8,

    #[error("unknown verb: {0:?}")]
    UnknownVerb(char),

    #[error("verb {0:?} requires a service name")]
    MissingName(char),
}

/// A parsed control request.
///
/// Borrowing from the receive buffer; the supervisor answers each request
/// before reading the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// `l` — one reply line per service
    List,
    /// `?name` — state, pid, wstatus, uptime of one service
    Query(&'a str),
    /// `#` — engine counters
    Stats,
    /// `u name`
    Up(&'a str),
    /// `d name`
    Down(&'a str),
    /// `r name`
    Restart(&'a str),
    /// `s`
    Rescan,
    /// `S`
    Shutdown,
    /// `R`
    Reboot,
    /// signal letter + name — forward the signal to the main process
    Signal { letter: char, service: &'a str },
}

impl<'a> Request<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, ProtocolError> {
        if buf.is_empty() {
            return Err(ProtocolError::Empty);
        }

        // chop one trailing newline
        let buf = match buf.last() {
            Some(b'\n') => &buf[..buf.len() - 1],
            _ => buf,
        };
        let text = std::str::from_utf8(buf).map_err(|_| ProtocolError::NotUtf8)?;

        let mut chars = text.chars();
        let verb = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str();

        match verb {
            'l' => Ok(Request::List),
            '?' => Ok(Request::Query(rest)),
            '#' => Ok(Request::Stats),
            'u' | 'd' | 'r' => {
                if rest.is_empty() {
                    return Err(ProtocolError::MissingName(verb));
                }
                Ok(match verb {
                    'u' => Request::Up(rest),
                    'd' => Request::Down(rest),
                    _ => Request::Restart(rest),
                })
            }
            's' => Ok(Request::Rescan),
            'S' => Ok(Request::Shutdown),
            'R' => Ok(Request::Reboot),
            c if is_signal_letter(c) => Ok(Request::Signal { letter: c, service: rest }),
            c => Err(ProtocolError::UnknownVerb(c)),
        }
    }

    /// Render the request as a datagram payload.
    pub fn encode(&self) -> Vec<u8> {
        let text = match self {
            Request::List => "l".to_string(),
            Request::Query(name) => format!("?{name}"),
            Request::Stats => "#".to_string(),
            Request::Up(name) => format!("u{name}"),
            Request::Down(name) => format!("d{name}"),
            Request::Restart(name) => format!("r{name}"),
            Request::Rescan => "s".to_string(),
            Request::Shutdown => "S".to_string(),
            Request::Reboot => "R".to_string(),
            Request::Signal { letter, service } => format!("{letter}{service}"),
        };
        text.into_bytes()
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
