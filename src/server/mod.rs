//! Client-facing request/response server.
//!
//! The server speaks a small typed message protocol: an 8-byte header
//! (message type + payload size, both big-endian u32) followed by the
//! payload. Produce appends a record and sends no response; consume and
//! stat are answered with their response frames. See [`codec`] for the
//! exact layout.
//!
//! Replication does not go through this server; replicas pull from the
//! leader's stream endpoint directly (see [`crate::replication`]).
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use samizdat::broker::Broker;
//! use samizdat::server::{BrokerHandler, BrokerServer};
//! use samizdat::types::PartitionId;
//!
//! #[tokio::main]
//! async fn main() -> samizdat::error::Result<()> {
//!     let broker = Arc::new(Broker::new());
//!     broker.create_partition(PartitionId::new(0))?;
//!
//!     let server = BrokerServer::bind(
//!         "127.0.0.1:3110".parse().unwrap(),
//!         BrokerHandler::new(broker),
//!     )
//!     .await?;
//!     server.run().await
//! }
//! ```

pub mod codec;
mod handler;

pub use handler::{BrokerHandler, Handler, RequestContext};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::constants::MESSAGE_HEADER_SIZE;
use crate::error::{Error, Result};

use self::codec::Request;

/// A TCP server for client produce/consume/stat requests, with graceful
/// shutdown support.
pub struct BrokerServer<H: Handler> {
    listener: TcpListener,
    handler: Arc<H>,
    shutdown_tx: broadcast::Sender<()>,
    active_connections: Arc<AtomicUsize>,
}

impl<H: Handler> BrokerServer<H> {
    /// Bind the server to the given address.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, handler: H) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        tracing::info!(addr = %listener.local_addr()?, "broker server listening");

        Ok(Self {
            listener,
            handler: Arc::new(handler),
            shutdown_tx,
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The local address the server is bound to.
    ///
    /// # Errors
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of active client connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Signal the server to stop accepting connections. Existing
    /// connections are told to finish up.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        tracing::info!("broker server shutdown signal sent");
    }

    /// Initiate shutdown and wait for connections to drain.
    ///
    /// Returns `true` if every connection drained within the timeout.
    pub async fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(100);

        while start.elapsed() < timeout {
            if self.active_connections() == 0 {
                return true;
            }
            tokio::time::sleep(check_interval).await;
        }

        tracing::warn!(
            remaining = self.active_connections(),
            "shutdown timeout, connections still active"
        );
        false
    }

    /// Accept and serve connections until shutdown is signalled.
    ///
    /// # Errors
    /// Returns an error if accepting fails in a way that is not tied to a
    /// single connection.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("broker server no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    tracing::debug!(client = %addr, "accepted client connection");

                    let handler = self.handler.clone();
                    let active = self.active_connections.clone();
                    let conn_shutdown = self.shutdown_tx.subscribe();

                    active.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(handler, stream, addr, conn_shutdown).await {
                            tracing::debug!(client = %addr, error = %e, "client connection ended");
                        }
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            }
        }
    }
}

async fn handle_connection<H: Handler>(
    handler: Arc<H>,
    mut stream: TcpStream,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let ctx = RequestContext { client_addr: addr };

    loop {
        let mut header_buf = [0u8; MESSAGE_HEADER_SIZE];
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            read = stream.read_exact(&mut header_buf) => {
                match read {
                    Ok(_) => {}
                    // The client hanging up between requests is a clean close.
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                    Err(e) => return Err(Error::from(e)),
                }
            }
        }

        let header = codec::parse_header(&header_buf)?;

        let mut payload = vec![0u8; header.payload_size as usize];
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            read = stream.read_exact(&mut payload) => { read?; }
        }

        match codec::parse_request(header.message_type, &payload)? {
            Request::Produce { partition, record } => {
                handler.handle_produce(&ctx, partition, record).await;
            }
            Request::Consume { partition, offset } => {
                let response = handler.handle_consume(&ctx, partition, offset).await;
                stream.write_all(&response.encode()).await?;
            }
            Request::Stat { partition } => {
                let response = handler.handle_stat(&ctx, partition).await;
                stream.write_all(&response.encode()).await?;
            }
        }
    }
}
