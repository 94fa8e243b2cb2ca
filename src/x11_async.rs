//! X11 Async Event Stream
//!
//! Lets the tokio loop wait on the X11 socket: a blocking mio poller watches
//! the connection's file descriptor and wakes the loop through a `Notify`.

use anyhow::{Context, Result};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const X11_TOKEN: mio::Token = mio::Token(0);

/// How often the poller checks whether the stream was dropped
const SHUTDOWN_CHECK: Duration = Duration::from_millis(100);

pub struct X11EventStream {
    conn: Arc<RustConnection>,
    readable: Arc<Notify>,
    /// Closing this tells the poller thread to exit
    _alive: oneshot::Receiver<()>,
}

impl X11EventStream {
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let readable = Arc::new(Notify::new());
        let waker = readable.clone();

        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), X11_TOKEN, mio::Interest::READABLE)
            .context("Failed to register X11 FD with mio")?;

        tokio::task::spawn_blocking(move || {
            let mut events = mio::Events::with_capacity(1);
            while !alive_tx.is_closed() {
                if let Err(err) = poll.poll(&mut events, Some(SHUTDOWN_CHECK)) {
                    tracing::warn!("X11 socket poll failed: {:?}", err);
                    continue;
                }
                if events.iter().any(|event| event.token() == X11_TOKEN) {
                    waker.notify_one();
                }
            }
            tracing::debug!("X11 socket poller stopped");
        });

        Ok(Self {
            conn,
            readable,
            _alive: alive_rx,
        })
    }

    /// Everything already queued on the connection, without blocking
    pub fn drain(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        while let Some(event) = self.conn.poll_for_event()? {
            events.push(event);
        }
        Ok(events)
    }

    /// Resolves once the socket has data
    pub async fn wait_readable(&self) {
        self.readable.notified().await;
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}

/// Errors after which the X server is gone for good
pub fn is_connection_lost(error: &anyhow::Error) -> bool {
    let text = error.to_string();
    text.contains("Broken pipe") || text.contains("Connection reset")
}
