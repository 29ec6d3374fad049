// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Readiness multiplexer (§4.6 Reactor mode).
//!
//! Backed by `mio::Poll`, which already does exactly what the spec
//! asks of the portable back-end: epoll on Linux, kqueue on BSD/macOS,
//! a `select`-based fallback elsewhere, behind one interest-mask API.
//! A dedicated `mio::Waker` token is reserved so cross-thread posting
//! ([`super::posted_task::PostedTaskQueue`], timers) can interrupt a
//! blocked `poll()` call.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest as MioInterest, Poll, Token, Waker};

use crate::sync::Mutex;

/// Portable readiness interest: which directions a socket is watched
/// for. `ACCEPT`/`CONNECT` map onto `READ`/`WRITE` respectively, since
/// mio reports listener-readable and connect-writable through the
/// same two directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
}

impl Interest {
    pub const READ: Interest = Interest { readable: true, writable: false };
    pub const WRITE: Interest = Interest { readable: false, writable: true };
    pub const READ_WRITE: Interest = Interest { readable: true, writable: true };

    fn to_mio(self) -> MioInterest {
        match (self.readable, self.writable) {
            (true, true) => MioInterest::READABLE | MioInterest::WRITABLE,
            (true, false) => MioInterest::READABLE,
            (false, true) => MioInterest::WRITABLE,
            (false, false) => MioInterest::READABLE,
        }
    }
}

/// Readiness kind reported for a watched socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
    pub closed: bool,
}

/// Identifies a socket registered with a [`super::EventLoop`]. The
/// waker reserves token `usize::MAX`; real sockets start at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketToken(pub(super) usize);

pub(super) const WAKE_TOKEN: Token = Token(usize::MAX);

pub(super) struct Reactor {
    poll: Mutex<Poll>,
    waker: Waker,
    next_token: AtomicUsize,
}

impl Reactor {
    pub(super) fn new() -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        Ok(Self {
            poll: Mutex::new(poll),
            waker,
            next_token: AtomicUsize::new(0),
        })
    }

    pub(super) fn register(&self, source: &mut dyn Source, interest: Interest) -> io::Result<SocketToken> {
        let raw = self.next_token.fetch_add(1, Ordering::Relaxed);
        let token = Token(raw);
        self.poll.lock().registry().register(source, token, interest.to_mio())?;
        Ok(SocketToken(raw))
    }

    pub(super) fn reregister(&self, source: &mut dyn Source, token: SocketToken, interest: Interest) -> io::Result<()> {
        self.poll.lock().registry().reregister(source, Token(token.0), interest.to_mio())
    }

    pub(super) fn deregister(&self, source: &mut dyn Source) -> io::Result<()> {
        self.poll.lock().registry().deregister(source)
    }

    pub(super) fn wake(&self) {
        let _ = self.waker.wake();
    }

    /// Poll for readiness events, blocking up to `timeout` (`None` =
    /// forever). Returns `(token, readiness)` pairs; the waker token
    /// is filtered out before returning.
    pub(super) fn poll_once(&self, timeout: Option<Duration>) -> io::Result<Vec<(SocketToken, Readiness)>> {
        let mut events = Events::with_capacity(256);
        self.poll.lock().poll(&mut events, timeout)?;
        Ok(events
            .iter()
            .filter(|e| e.token() != WAKE_TOKEN)
            .map(|e| {
                (
                    SocketToken(e.token().0),
                    Readiness {
                        readable: e.is_readable(),
                        writable: e.is_writable(),
                        error: e.is_error(),
                        closed: e.is_read_closed() || e.is_write_closed(),
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_read_write_maps_to_both_directions() {
        let both = Interest::READ_WRITE.to_mio();
        assert!(both.is_readable());
        assert!(both.is_writable());
    }

    #[test]
    fn wake_unblocks_a_pending_poll() {
        let reactor = std::sync::Arc::new(Reactor::new().unwrap());
        let reactor2 = reactor.clone();
        let handle = std::thread::spawn(move || reactor2.poll_once(Some(Duration::from_secs(5))).unwrap());
        std::thread::sleep(Duration::from_millis(20));
        reactor.wake();
        let events = handle.join().unwrap();
        assert!(events.is_empty());
    }
}
