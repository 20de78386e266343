// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket transport over Unix domain sockets or TCP

use super::{CancelFlag, Connector, Endpoint, Transport, TransportError};
use ctlwire_core::protocol::{write_frame, FrameBuffer};
use ctlwire_core::Fault;
use parking_lot::Mutex;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 64 * 1024;

/// Connects to controllers over real sockets
#[derive(Debug, Clone)]
pub struct StreamConnector {
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl StreamConnector {
    /// `poll_interval` bounds how long a blocked receive goes without
    /// checking for cancellation.
    pub fn new(connect_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            connect_timeout,
            poll_interval,
        }
    }
}

impl Connector for StreamConnector {
    fn connect(&self, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        let stream = match Endpoint::parse(address)? {
            Endpoint::Unix(path) => Stream::Unix(UnixStream::connect(path).map_err(|e| io_fault(&e))?),
            Endpoint::Tcp(host_port) => Stream::Tcp(self.connect_tcp(&host_port)?),
        };
        Ok(Box::new(StreamTransport {
            stream,
            poll_interval: self.poll_interval,
            open: AtomicBool::new(true),
            buffer: Mutex::new(FrameBuffer::new()),
        }))
    }
}

impl StreamConnector {
    fn connect_tcp(&self, host_port: &str) -> Result<TcpStream, TransportError> {
        let addrs = host_port
            .to_socket_addrs()
            .map_err(|_| TransportError::InvalidAddress(host_port.to_string()))?;

        let mut last = Fault::Refused;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => last = io_fault(&e),
            }
        }
        Err(last.into())
    }
}

/// Map an I/O error onto the fault reported to sessions
fn io_fault(error: &io::Error) -> Fault {
    match error.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::NotFound | ErrorKind::AddrNotAvailable => Fault::Refused,
        ErrorKind::PermissionDenied => Fault::AuthFailed,
        ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof | ErrorKind::NotConnected => Fault::HungUp,
        ErrorKind::TimedOut | ErrorKind::WouldBlock => Fault::TimedOut,
        _ => Fault::Reset,
    }
}

enum Stream {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Stream {
    fn set_read_timeout(&self, timeout: Duration) -> io::Result<()> {
        match self {
            Stream::Unix(s) => s.set_read_timeout(Some(timeout)),
            Stream::Tcp(s) => s.set_read_timeout(Some(timeout)),
        }
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Unix(s) => read_some(s, buf),
            Stream::Tcp(s) => read_some(s, buf),
        }
    }

    fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        let result = match self {
            Stream::Unix(s) => write_all_frame(s, frame),
            Stream::Tcp(s) => write_all_frame(s, frame),
        };
        result.map_err(|e| match e {
            ctlwire_core::ProtocolError::Io(io) => TransportError::Fault(io_fault(&io)),
            other => TransportError::Protocol(other),
        })
    }

    fn shutdown(&self) {
        let _ = match self {
            Stream::Unix(s) => s.shutdown(Shutdown::Both),
            Stream::Tcp(s) => s.shutdown(Shutdown::Both),
        };
    }
}

fn read_some(mut reader: impl Read, buf: &mut [u8]) -> io::Result<usize> {
    reader.read(buf)
}

fn write_all_frame(mut writer: impl Write, frame: &[u8]) -> Result<(), ctlwire_core::ProtocolError> {
    write_frame(&mut writer, frame)
}

struct StreamTransport {
    stream: Stream,
    poll_interval: Duration,
    open: AtomicBool,
    /// Partial frames survive a poll timeout
    buffer: Mutex<FrameBuffer>,
}

impl Transport for StreamTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.stream.write_frame(frame)
    }

    fn recv(&self, deadline: Option<Instant>, cancel: &CancelFlag) -> Result<Vec<u8>, TransportError> {
        let mut buffer = self.buffer.lock();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(frame) = buffer.next_frame()? {
                return Ok(frame);
            }
            if !self.is_open() {
                return Err(TransportError::Closed);
            }
            if cancel.is_canceled() {
                return Err(Fault::Canceled.into());
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Fault::TimedOut.into());
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };
            self.stream
                .set_read_timeout(wait.max(Duration::from_millis(1)))
                .map_err(|e| io_fault(&e))?;

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    // Closed locally while blocked, or the peer went away
                    if !self.is_open() {
                        return Err(TransportError::Closed);
                    }
                    return Err(Fault::HungUp.into());
                }
                Ok(n) => buffer.push(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(io_fault(&e).into()),
            }
        }
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.stream.shutdown();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
