//! Session operations abstraction
//!
//! The proxy speaks to both legs of a connection through the same trait
//! so plain TCP and TLS transports are interchangeable. Reader threads
//! additionally need to wait for readability without holding the session
//! lock, which is why the raw descriptor is part of the contract.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// Operations on one transport session, abstracting over plain TCP and
/// TLS connections.
pub trait SessionOps {
    /// Raw descriptor of the underlying socket.
    fn raw_fd(&self) -> RawFd;

    /// Read data from the session. `Ok(0)` means orderly EOF.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write data to the session.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Shut the session down.
    fn close(&mut self) -> io::Result<()>;

    /// Poll the session for readiness. `None` waits indefinitely. TLS
    /// sessions override this to account for already-buffered records.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
        poll_fd(self.raw_fd(), events, timeout)
    }
}

/// Poll a raw descriptor for readiness.
pub fn poll_fd(fd: RawFd, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
            PollEvents::Both => POLLIN | POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout.map(|d| d.as_millis() as i32).unwrap_or(-1);

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(result > 0)
}

/// Block until the descriptor is readable (or in an error state that a
/// subsequent read will surface).
pub fn wait_readable(fd: RawFd) -> io::Result<()> {
    poll_fd(fd, PollEvents::Read, None)?;
    Ok(())
}

/// Write an entire buffer through a session.
pub fn write_all(session: &mut dyn SessionOps, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = session.write(buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "session closed mid-write",
            ));
        }
        buf = &buf[n..];
    }
    Ok(())
}

/// Plain TCP session operations.
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    /// Wrap a connected TCP stream.
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }
}

impl SessionOps for FdSessionOps {
    fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        use std::net::Shutdown;
        self.stream.shutdown(Shutdown::Both)
    }
}
