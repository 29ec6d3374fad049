// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Simulated Proactor mode (§4.6): async I/O completion modeled as a
//! scheduled [`crate::task::Task`] rather than a new primitive.
//!
//! Real proactors (IOCP on Windows, io_uring on Linux) hand the kernel
//! a buffer and get a completion notification back. Without binding to
//! either, the closest honest approximation is running the blocking
//! call on a worker thread and resolving a future when it returns —
//! which is exactly what the scheduler already does for any task. A
//! dedicated `cfg`-gated backend could replace this with true
//! completion-port I/O on a given platform without changing the
//! [`SimulatedProactor`] API.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;

use crate::error::ScheduleError;
use crate::scheduler::{Scheduler, TaskPriority};
use crate::task::{CancellationToken, Future, Task};

/// Outcome of a simulated async I/O operation.
#[derive(Debug, Clone)]
pub struct AsyncOutcome {
    pub success: bool,
    pub bytes_transferred: usize,
    pub error_code: i32,
}

impl AsyncOutcome {
    fn ok(bytes: usize) -> Self {
        Self { success: true, bytes_transferred: bytes, error_code: 0 }
    }

    fn err(error: &io::Error) -> Self {
        Self {
            success: false,
            bytes_transferred: 0,
            error_code: error.raw_os_error().unwrap_or(-1),
        }
    }
}

/// Runs blocking socket operations on a dedicated [`Scheduler`] and
/// resolves an [`AsyncOutcome`] future per call, giving proactor-style
/// call sites (`async_send`, `async_receive`, ...) without requiring a
/// platform completion port.
pub struct SimulatedProactor {
    scheduler: Arc<Scheduler>,
}

impl SimulatedProactor {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    fn submit<F>(&self, priority: TaskPriority, body: F) -> Result<(Arc<Task<AsyncOutcome>>, Future<AsyncOutcome>), ScheduleError>
    where
        F: FnOnce(&CancellationToken) -> AsyncOutcome + Send + 'static,
    {
        let task = Arc::new(Task::new(body));
        let future = task.future();
        self.scheduler.schedule(task.clone(), priority)?;
        Ok((task, future))
    }

    pub fn async_accept(&self, listener: Arc<TcpListener>) -> Result<(Arc<Task<AsyncOutcome>>, Future<AsyncOutcome>), ScheduleError> {
        self.submit(TaskPriority::Normal, move |_token| match listener.accept() {
            Ok(_) => AsyncOutcome::ok(0),
            Err(e) => AsyncOutcome::err(&e),
        })
    }

    pub fn async_connect(&self, addr: SocketAddr) -> Result<(Arc<Task<AsyncOutcome>>, Future<AsyncOutcome>), ScheduleError> {
        self.submit(TaskPriority::Normal, move |_token| match TcpStream::connect(addr) {
            Ok(_) => AsyncOutcome::ok(0),
            Err(e) => AsyncOutcome::err(&e),
        })
    }

    pub fn async_send(&self, stream: Arc<TcpStream>, data: Vec<u8>) -> Result<(Arc<Task<AsyncOutcome>>, Future<AsyncOutcome>), ScheduleError> {
        self.submit(TaskPriority::Normal, move |_token| {
            use std::io::Write;
            match (&*stream).write(&data) {
                Ok(n) => AsyncOutcome::ok(n),
                Err(e) => AsyncOutcome::err(&e),
            }
        })
    }

    pub fn async_receive(&self, stream: Arc<TcpStream>, max_len: usize) -> Result<(Arc<Task<AsyncOutcome>>, Future<AsyncOutcome>), ScheduleError> {
        self.submit(TaskPriority::Normal, move |_token| {
            use std::io::Read;
            let mut buf = vec![0u8; max_len];
            match (&*stream).read(&mut buf) {
                Ok(n) => AsyncOutcome::ok(n),
                Err(e) => AsyncOutcome::err(&e),
            }
        })
    }

    pub fn async_send_to(&self, socket: Arc<UdpSocket>, data: Vec<u8>, addr: SocketAddr) -> Result<(Arc<Task<AsyncOutcome>>, Future<AsyncOutcome>), ScheduleError> {
        self.submit(TaskPriority::Normal, move |_token| match socket.send_to(&data, addr) {
            Ok(n) => AsyncOutcome::ok(n),
            Err(e) => AsyncOutcome::err(&e),
        })
    }

    pub fn async_receive_from(&self, socket: Arc<UdpSocket>, max_len: usize) -> Result<(Arc<Task<AsyncOutcome>>, Future<AsyncOutcome>), ScheduleError> {
        self.submit(TaskPriority::Normal, move |_token| {
            let mut buf = vec![0u8; max_len];
            match socket.recv_from(&mut buf) {
                Ok((n, _)) => AsyncOutcome::ok(n),
                Err(e) => AsyncOutcome::err(&e),
            }
        })
    }

    /// Request cancellation of an in-flight operation. The blocking
    /// call itself cannot usually be interrupted, so this only takes
    /// effect if the task has not yet started running.
    pub fn cancel(&self, task: &Task<AsyncOutcome>) {
        task.cancellation_token().cancel();
    }
}
