//! Byte-stream transport.
//!
//! Device discovery and opening the serial channel happen outside this
//! crate; a session only needs something that can write a command line,
//! read response lines or raw bytes, and change its read timeout.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Line-oriented duplex channel to the pad.
pub trait Transport {
    /// Writes `data` completely and flushes it to the device.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Reads one line including its terminator. Returns an empty buffer at
    /// end of stream.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;

    /// Reads exactly `n` raw bytes.
    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>>;

    /// Sets how long a read may block before failing with `TimedOut`.
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_line()
    }

    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        (**self).read_bytes(n)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }
}

/// Streams whose read timeout can be changed at runtime.
pub trait ReadTimeout {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl ReadTimeout for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Adapts any buffered `Read + Write` stream (for example a serial-over-TCP
/// bridge) to `Transport`.
pub struct StreamTransport<S: Read + Write> {
    inner: BufReader<S>,
}

impl<S: Read + Write + ReadTimeout> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { inner: BufReader::new(stream) }
    }

    /// Returns the wrapped stream. Buffered but unread input is discarded.
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

impl<S: Read + Write + ReadTimeout> Transport for StreamTransport<S> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.inner.get_mut();
        stream.write_all(data)?;
        stream.flush()
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        self.inner.read_until(b'\n', &mut line)?;
        Ok(line)
    }

    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.inner.get_mut().set_read_timeout(Some(timeout))
    }
}
