//! Line transport to the reasoner process.
//!
//! `LineTransport` is the seam between the adapter and the wire:
//! - [`TcpTransport`] talks to a running reasoner over TCP.
//! - [`MockTransport`](super::mock::MockTransport) simulates one in memory.
//!
//! A read that hits the timeout is not an error: whatever arrived so far is
//! the reply, possibly empty.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A newline-delimited request/response channel.
pub trait LineTransport: Send {
    /// Send one request; the newline is appended here.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Read one reply line, trimmed. Returns what was read before a timeout
    /// or end of stream.
    fn read_line(&mut self) -> io::Result<String>;

    fn close(&mut self) -> io::Result<()>;
}

/// TCP connection to a reasoner server.
pub struct TcpTransport {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TcpTransport {
    /// Connect with `TCP_NODELAY` and the given read timeout.
    pub fn connect(address: &str, timeout: Option<Duration>) -> io::Result<Self> {
        let addr = address.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no address for {address}"),
            )
        })?;
        let stream = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(true)?;
        stream.set_read_timeout(timeout)?;
        let reader = BufReader::new(stream.try_clone()?);
        tracing::info!(%address, ?timeout, "connected to reasoner");
        Ok(Self {
            writer: stream,
            reader,
        })
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.writer.peer_addr().ok())
            .finish()
    }
}

impl LineTransport for TcpTransport {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                tracing::debug!(partial = buf.len(), "reasoner read timed out");
            }
            Err(e) => return Err(e),
        }
        Ok(String::from_utf8_lossy(&buf).trim().to_string())
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.shutdown(std::net::Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}
