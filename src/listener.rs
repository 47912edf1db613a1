//! Listening socket and the accept loop that feeds the dispatch queue.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::select::{select, FdSet};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::time::TimeVal;
use tracing::{debug, info, warn};

use crate::queue::BoundedQueue;

/// How often the accept loop wakes up to check for shutdown, whether waiting for a client or
/// for a free queue slot.
const TICK: Duration = Duration::from_secs(1);

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn stop_running(_signal: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

/// Ignore SIGPIPE and stop the accept loop on SIGINT or SIGTERM.
pub fn install_signal_handlers() -> Result<()> {
    unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) }
        .context("failed to set SIGPIPE handler")?;
    unsafe { signal(Signal::SIGINT, SigHandler::Handler(stop_running)) }
        .context("failed to set SIGINT handler")?;
    unsafe { signal(Signal::SIGTERM, SigHandler::Handler(stop_running)) }
        .context("failed to set SIGTERM handler")?;
    Ok(())
}

/// Accept failures that concern a single client rather than the listening socket.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[derive(Debug)]
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        // Sets `SO_REUSEADDR` implicitly.
        let listener = TcpListener::bind(addr)
            .with_context(|| format!("failed to create listening socket for {}", addr))?;
        // Readiness comes from select(); a racing client that vanished must not block accept().
        listener
            .set_nonblocking(true)
            .context("failed to make listening socket non-blocking")?;
        println!("listening on: http://{}/", addr);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to get listening address")
    }

    /// Accept connections into `queue` until a shutdown signal arrives.
    pub fn run(&self, queue: &BoundedQueue<TcpStream>) -> Result<()> {
        self.run_while(queue, &RUNNING)
    }

    /// Accept connections into `queue` while `running` is set.
    pub fn run_while(&self, queue: &BoundedQueue<TcpStream>, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::Relaxed) {
            if self.wait_readable()? {
                self.accept(queue, running)?;
            }
        }
        info!("accept loop stopped");
        Ok(())
    }

    /// Block for at most one tick. False if nothing is waiting or a signal cut the wait short.
    fn wait_readable(&self) -> Result<bool> {
        let mut recv_set = FdSet::new();
        recv_set.insert(self.listener.as_raw_fd());
        let mut timeout = TimeVal::from(libc::timeval {
            tv_sec: TICK.as_secs() as libc::time_t,
            tv_usec: 0,
        });
        match select(None, Some(&mut recv_set), None, None, Some(&mut timeout)) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(recv_set.contains(self.listener.as_raw_fd())),
            Err(e) if e.as_errno() == Some(Errno::EINTR) => Ok(false),
            Err(e) => Err(e).context("select() failed"),
        }
    }

    fn accept(&self, queue: &BoundedQueue<TcpStream>, running: &AtomicBool) -> Result<()> {
        let (stream, addr) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if is_transient(&e) => {
                warn!("accept() failed: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e).context("accept() failed"),
        };
        // Workers do plain blocking I/O bounded by socket timeouts.
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("{}: failed to make connection blocking: {}", addr, e);
            return Ok(());
        }
        debug!("{}: accepted, {} waiting", addr, queue.len());
        if queue.enqueue_while(stream, running, TICK).is_err() {
            debug!("{}: dropped, shutting down with the queue full", addr);
        }
        Ok(())
    }
}
