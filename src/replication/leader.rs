//! The leader-side stream server for one partition.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::constants::{MAX_RECORD_PAYLOAD, OFFSET_REQUEST_SIZE};
use crate::error::Result;
use crate::log::Log;
use crate::types::{Offset, PartitionId};

/// Per-partition network endpoint serving replica streams.
///
/// Every accepted connection is handled by an independent task with its own
/// cursor into the log: a slow or stalled replica never delays appends or
/// other replicas' streams. The server keeps streaming records as they are
/// appended (tailing) until the peer disconnects or the server shuts down.
pub struct LeaderServer {
    partition: PartitionId,
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    active_streams: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl LeaderServer {
    /// Bind the stream endpoint and start accepting replica connections.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    pub async fn bind(partition: PartitionId, log: Log, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let active_streams = Arc::new(AtomicUsize::new(0));

        tracing::info!(
            partition = %partition,
            addr = %local_addr,
            "leader stream server listening"
        );

        let accept_task = tokio::spawn(accept_loop(
            partition,
            log,
            listener,
            shutdown_tx.clone(),
            active_streams.clone(),
        ));

        Ok(Self {
            partition,
            local_addr,
            shutdown_tx,
            active_streams,
            accept_task,
        })
    }

    /// The local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of replica connections currently being served.
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }

    /// Stop accepting connections and tear down every serving task.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.accept_task.await;
        tracing::info!(partition = %self.partition, "leader stream server stopped");
    }
}

async fn accept_loop(
    partition: PartitionId,
    log: Log,
    listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
    active_streams: Arc<AtomicUsize>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!(partition = %partition, "stream server no longer accepting");
                return;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(partition = %partition, error = %e, "accept failed");
                        continue;
                    }
                };

                tracing::debug!(partition = %partition, peer = %peer, "accepted replica connection");

                let log = log.clone();
                let conn_shutdown = shutdown_tx.subscribe();
                let active = active_streams.clone();
                active.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    // A replica disconnecting is a normal event, never escalated.
                    if let Err(e) = serve_stream(partition, log, stream, conn_shutdown).await {
                        tracing::debug!(
                            partition = %partition,
                            peer = %peer,
                            error = %e,
                            "replica stream ended"
                        );
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
    }
}

/// Serve one replica connection: read the requested start offset, then
/// stream record frames from there on, tailing the log indefinitely.
async fn serve_stream(
    partition: PartitionId,
    log: Log,
    mut stream: TcpStream,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let mut request = [0u8; OFFSET_REQUEST_SIZE];
    tokio::select! {
        _ = shutdown_rx.recv() => return Ok(()),
        // A peer that closes before 4 bytes arrive just disconnects.
        read = stream.read_exact(&mut request) => { read?; }
    }
    let start = Offset::from_be_bytes(request);

    tracing::debug!(partition = %partition, offset = %start, "replica requested stream");

    // An offset beyond the log's next offset is a request "from the
    // future": the tail yields nothing until the log catches up.
    let mut tail = log.tail(start);
    let mut frame = BytesMut::with_capacity(1 + MAX_RECORD_PAYLOAD);

    loop {
        let record = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            record = tail.next_record() => record,
        };

        frame.clear();
        record.encode(&mut frame);

        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            written = stream.write_all(&frame) => { written?; }
        }
    }
}
