// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! High-level TCP façades over [`super::EventLoop`] (§4.6).
//!
//! Grounded on the runtime/reactor split in the pack's Cyclone-style
//! event loop example: a thin struct that owns the loop and dispatches
//! readiness to named callbacks (`on_connected`/`on_data`/
//! `on_disconnected`/`on_error`) instead of exposing raw tokens.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

use mio::net::{TcpListener as MioTcpListener, TcpStream as MioTcpStream};

use super::{EventLoop, IoHandler, Interest, Readiness, SocketToken};
use crate::error::IoLoopError;
use crate::sync::Mutex;

/// Callbacks for an accepting TCP server driven by an [`EventLoop`].
pub trait TcpServerCallbacks: Send {
    fn on_connected(&mut self, client: SocketToken, addr: SocketAddr);
    fn on_data(&mut self, client: SocketToken, data: &[u8]);
    fn on_disconnected(&mut self, client: SocketToken);
    fn on_error(&mut self, client: Option<SocketToken>, error: &io::Error);
}

struct ClientConn {
    stream: MioTcpStream,
    addr: SocketAddr,
}

/// Accepts connections on one listening socket and fans out readiness
/// to per-client read/write handling.
pub struct TcpServerReactor<C: TcpServerCallbacks> {
    event_loop: EventLoop,
    listener: MioTcpListener,
    listener_token: SocketToken,
    clients: Mutex<HashMap<SocketToken, ClientConn>>,
    callbacks: Mutex<C>,
}

impl<C: TcpServerCallbacks> TcpServerReactor<C> {
    pub fn bind(addr: SocketAddr, callbacks: C) -> Result<Self, IoLoopError> {
        let mut listener = MioTcpListener::bind(addr).map_err(IoLoopError::Socket)?;
        let event_loop = EventLoop::new()?;
        let listener_token = event_loop.add_socket(&mut listener, Interest::READ)?;
        Ok(Self {
            event_loop,
            listener,
            listener_token,
            clients: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(callbacks),
        })
    }

    pub fn run(&self) -> Result<(), IoLoopError> {
        let mut dispatcher = ServerDispatch { server: self };
        self.event_loop.run(&mut dispatcher)
    }

    pub fn stop(&self) {
        self.event_loop.stop();
    }

    pub fn broadcast(&self, data: &[u8]) {
        let mut clients = self.clients.lock();
        for conn in clients.values_mut() {
            let _ = conn.stream.write_all(data);
        }
    }

    fn accept_all(&self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = match self.event_loop.add_socket(&mut stream, Interest::READ) {
                        Ok(token) => token,
                        Err(e) => {
                            self.callbacks.lock().on_error(None, io_error(&e));
                            continue;
                        }
                    };
                    self.clients.lock().insert(token, ClientConn { stream, addr });
                    self.callbacks.lock().on_connected(token, addr);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.callbacks.lock().on_error(None, &e);
                    break;
                }
            }
        }
    }

    fn read_client(&self, token: SocketToken) {
        let mut buf = [0u8; 4096];
        let result = {
            let mut clients = self.clients.lock();
            let Some(conn) = clients.get_mut(&token) else { return };
            conn.stream.read(&mut buf)
        };
        match result {
            Ok(0) => self.drop_client(token),
            Ok(n) => self.callbacks.lock().on_data(token, &buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                self.callbacks.lock().on_error(Some(token), &e);
                self.drop_client(token);
            }
        }
    }

    fn drop_client(&self, token: SocketToken) {
        if let Some(mut conn) = self.clients.lock().remove(&token) {
            let _ = self.event_loop.remove_socket(&mut conn.stream);
        }
        self.callbacks.lock().on_disconnected(token);
    }
}

fn io_error(e: &IoLoopError) -> &io::Error {
    match e {
        IoLoopError::Socket(inner) | IoLoopError::Multiplexer(inner) => inner,
        IoLoopError::ShutDown => unreachable!("accept path never produces ShutDown"),
    }
}

struct ServerDispatch<'a, C: TcpServerCallbacks> {
    server: &'a TcpServerReactor<C>,
}

impl<'a, C: TcpServerCallbacks> IoHandler for ServerDispatch<'a, C> {
    fn on_ready(&mut self, token: SocketToken, _readiness: Readiness) {
        if token.0 == self.server.listener_token.0 {
            self.server.accept_all();
        } else {
            self.server.read_client(token);
        }
    }
}

/// Callbacks for a client-side TCP connection driven by an [`EventLoop`].
pub trait TcpClientCallbacks: Send {
    fn on_connected(&mut self);
    fn on_data(&mut self, data: &[u8]);
    fn on_disconnected(&mut self);
    fn on_error(&mut self, error: &io::Error);
}

pub struct TcpClientReactor<C: TcpClientCallbacks> {
    event_loop: EventLoop,
    stream: Mutex<MioTcpStream>,
    callbacks: Mutex<C>,
}

impl<C: TcpClientCallbacks> TcpClientReactor<C> {
    pub fn connect(addr: SocketAddr, mut callbacks: C) -> Result<Self, IoLoopError> {
        let mut stream = MioTcpStream::connect(addr).map_err(IoLoopError::Socket)?;
        let event_loop = EventLoop::new()?;
        event_loop.add_socket(&mut stream, Interest::READ_WRITE)?;
        callbacks.on_connected();
        Ok(Self {
            event_loop,
            stream: Mutex::new(stream),
            callbacks: Mutex::new(callbacks),
        })
    }

    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.stream.lock().write(data)
    }

    pub fn stop(&self) {
        self.event_loop.stop();
    }

    pub fn run(&self) -> Result<(), IoLoopError> {
        let mut dispatcher = ClientDispatch { client: self };
        self.event_loop.run(&mut dispatcher)
    }

    fn read(&self) {
        let mut buf = [0u8; 4096];
        let result = self.stream.lock().read(&mut buf);
        match result {
            Ok(0) => self.callbacks.lock().on_disconnected(),
            Ok(n) => self.callbacks.lock().on_data(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => self.callbacks.lock().on_error(&e),
        }
    }
}

struct ClientDispatch<'a, C: TcpClientCallbacks> {
    client: &'a TcpClientReactor<C>,
}

impl<'a, C: TcpClientCallbacks> IoHandler for ClientDispatch<'a, C> {
    fn on_ready(&mut self, _token: SocketToken, _readiness: Readiness) {
        self.client.read();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recording {
        connects: Arc<AtomicUsize>,
    }
    impl TcpServerCallbacks for Recording {
        fn on_connected(&mut self, _client: SocketToken, _addr: SocketAddr) {
            self.connects.fetch_add(1, Ordering::SeqCst);
        }
        fn on_data(&mut self, _client: SocketToken, _data: &[u8]) {}
        fn on_disconnected(&mut self, _client: SocketToken) {}
        fn on_error(&mut self, _client: Option<SocketToken>, _error: &io::Error) {}
    }

    #[test]
    fn server_accepts_a_connection() {
        let connects = Arc::new(AtomicUsize::new(0));
        let server = Arc::new(
            TcpServerReactor::bind(
                "127.0.0.1:0".parse().unwrap(),
                Recording { connects: connects.clone() },
            )
            .unwrap(),
        );
        let addr = server.listener.local_addr().unwrap();
        let for_thread = server.clone();
        let handle = std::thread::spawn(move || {
            let _ = for_thread.run();
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        let _client = std::net::TcpStream::connect(addr).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        server.stop();
        handle.join().unwrap();
    }
}
