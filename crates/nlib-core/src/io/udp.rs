// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! High-level UDP façade over [`super::EventLoop`] (§4.6).
//!
//! Connectionless, so unlike [`super::tcp::TcpServerReactor`] there is
//! no per-client table: every packet carries its own source address.

use std::io;
use std::net::SocketAddr;

use mio::net::UdpSocket as MioUdpSocket;

use super::{EventLoop, IoHandler, Interest, Readiness, SocketToken};
use crate::error::IoLoopError;
use crate::sync::Mutex;

pub trait UdpCallbacks: Send {
    fn on_data(&mut self, from: SocketAddr, data: &[u8]);
    fn on_error(&mut self, error: &io::Error);
}

pub struct UdpReactor<C: UdpCallbacks> {
    event_loop: EventLoop,
    socket: Mutex<MioUdpSocket>,
    socket_token: SocketToken,
    callbacks: Mutex<C>,
}

impl<C: UdpCallbacks> UdpReactor<C> {
    pub fn bind(addr: SocketAddr, callbacks: C) -> Result<Self, IoLoopError> {
        let mut socket = MioUdpSocket::bind(addr).map_err(IoLoopError::Socket)?;
        let event_loop = EventLoop::new()?;
        let socket_token = event_loop.add_socket(&mut socket, Interest::READ)?;
        Ok(Self {
            event_loop,
            socket: Mutex::new(socket),
            socket_token,
            callbacks: Mutex::new(callbacks),
        })
    }

    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.lock().send_to(data, addr)
    }

    pub fn stop(&self) {
        self.event_loop.stop();
    }

    pub fn run(&self) -> Result<(), IoLoopError> {
        let mut dispatcher = UdpDispatch { udp: self };
        self.event_loop.run(&mut dispatcher)
    }

    fn read_all_pending(&self) {
        let mut buf = [0u8; 65536];
        loop {
            let result = self.socket.lock().recv_from(&mut buf);
            match result {
                Ok((n, from)) => self.callbacks.lock().on_data(from, &buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.callbacks.lock().on_error(&e);
                    break;
                }
            }
        }
    }
}

struct UdpDispatch<'a, C: UdpCallbacks> {
    udp: &'a UdpReactor<C>,
}

impl<'a, C: UdpCallbacks> IoHandler for UdpDispatch<'a, C> {
    fn on_ready(&mut self, token: SocketToken, _readiness: Readiness) {
        if token.0 == self.udp.socket_token.0 {
            self.udp.read_all_pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recording {
        received: Arc<AtomicUsize>,
    }
    impl UdpCallbacks for Recording {
        fn on_data(&mut self, _from: SocketAddr, _data: &[u8]) {
            self.received.fetch_add(1, Ordering::SeqCst);
        }
        fn on_error(&mut self, _error: &io::Error) {}
    }

    #[test]
    fn receives_a_datagram() {
        let received = Arc::new(AtomicUsize::new(0));
        let server = Arc::new(
            UdpReactor::bind(
                "127.0.0.1:0".parse().unwrap(),
                Recording { received: received.clone() },
            )
            .unwrap(),
        );
        let addr = server.socket.lock().local_addr().unwrap();
        let for_thread = server.clone();
        let handle = std::thread::spawn(move || {
            let _ = for_thread.run();
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(b"hello", addr).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        assert_eq!(received.load(Ordering::SeqCst), 1);
        server.stop();
        handle.join().unwrap();
    }
}
