//! The replica-side fetch loop for one partition.

use std::net::SocketAddr;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::constants::{DEFAULT_FETCH_MAX_BACKOFF_MS, DEFAULT_FETCH_MIN_BACKOFF_MS};
use crate::log::Log;
use crate::record::Record;
use crate::types::PartitionId;

/// Reconnect backoff settings for a replica fetcher.
///
/// The fetcher retries forever; these only shape the capped exponential
/// delay (with jitter) between attempts while the leader is unreachable or
/// keeps closing the stream without delivering anything.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// First delay after a failed connect or an unproductive session.
    pub min_backoff: Duration,
    /// Cap on the exponential backoff.
    pub max_backoff: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_millis(DEFAULT_FETCH_MIN_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_FETCH_MAX_BACKOFF_MS),
        }
    }
}

impl FetcherConfig {
    /// A fresh backoff schedule: capped exponential with jitter, unbounded
    /// in attempts.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.min_backoff)
            .with_max_delay(self.max_backoff)
            .with_jitter()
            .without_max_times()
            .build()
    }
}

/// A long-lived background task that keeps a replica's log converging to
/// its leader's.
///
/// The loop moves through three phases, terminal only on [`shutdown`]:
///
/// - **disconnected**: connect to the leader; on failure sleep a backoff
///   interval and retry, indefinitely.
/// - **requesting**: send the local log's next offset as 4 big-endian
///   bytes ("send me everything I don't have yet").
/// - **streaming**: read one record frame at a time and append it to the
///   local log. Any read error or close, before a length byte or
///   mid-payload, drops back to disconnected; the next request naturally
///   resumes from the already-advanced next offset.
///
/// The next offset only advances on a fully-decoded record, so a partially
/// received frame is never applied and is re-requested on the next attempt.
///
/// [`shutdown`]: Fetcher::shutdown
pub struct Fetcher {
    partition: PartitionId,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl Fetcher {
    /// Spawn the fetch loop for a partition in the replica role.
    pub fn spawn(
        partition: PartitionId,
        log: Log,
        leader: SocketAddr,
        config: FetcherConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(run(partition, log, leader, config, shutdown_rx));

        tracing::info!(partition = %partition, leader = %leader, "replica fetcher started");

        Self {
            partition,
            shutdown_tx,
            task,
        }
    }

    /// True if the fetch loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the fetch loop.
    ///
    /// Interrupts the loop at whichever suspension point it is blocked on
    /// (connect, read, backoff sleep). An in-flight partially-received
    /// record is discarded, not appended.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
        tracing::info!(partition = %self.partition, "replica fetcher stopped");
    }
}

/// Outcome of one connection to the leader.
enum Session {
    /// Shutdown was signalled; the fetch loop must exit.
    Shutdown,
    /// The connection ended; `applied` records were appended from it.
    /// Zero is a valid, non-error outcome: the leader had nothing new.
    Ended { applied: u64 },
}

async fn run(
    partition: PartitionId,
    log: Log,
    leader: SocketAddr,
    config: FetcherConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut backoff = config.backoff();

    loop {
        // Disconnected: try to reach the leader.
        let stream = tokio::select! {
            _ = shutdown_rx.recv() => return,
            connected = TcpStream::connect(leader) => match connected {
                Ok(stream) => stream,
                Err(e) => {
                    let delay = backoff.next().unwrap_or(config.max_backoff);
                    tracing::debug!(
                        partition = %partition,
                        leader = %leader,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "leader unreachable, backing off"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            }
        };

        match stream_session(partition, &log, stream, &mut shutdown_rx).await {
            Session::Shutdown => return,
            Session::Ended { applied } => {
                if applied > 0 {
                    // Progress resets the schedule; reconnect immediately to
                    // pick up where the stream broke off.
                    backoff = config.backoff();
                } else {
                    let delay = backoff.next().unwrap_or(config.max_backoff);
                    tracing::debug!(
                        partition = %partition,
                        leader = %leader,
                        delay_ms = delay.as_millis() as u64,
                        "stream ended without data, backing off"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Requesting + streaming on one established connection.
async fn stream_session(
    partition: PartitionId,
    log: &Log,
    mut stream: TcpStream,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Session {
    // Requesting: ask for everything at or after the local next offset.
    let next = log.next_offset();
    let next_bytes = next.to_be_bytes();
    tokio::select! {
        _ = shutdown_rx.recv() => return Session::Shutdown,
        written = stream.write_all(&next_bytes) => {
            if let Err(e) = written {
                tracing::debug!(partition = %partition, error = %e, "failed to send stream request");
                return Session::Ended { applied: 0 };
            }
        }
    }

    tracing::debug!(partition = %partition, offset = %next, "streaming from leader");

    // Streaming: one frame at a time, appended as soon as it is complete.
    let mut applied = 0u64;
    loop {
        let len = tokio::select! {
            _ = shutdown_rx.recv() => return Session::Shutdown,
            read = stream.read_u8() => match read {
                Ok(len) => len,
                Err(e) => {
                    tracing::debug!(
                        partition = %partition,
                        applied,
                        error = %e,
                        "stream closed between frames"
                    );
                    return Session::Ended { applied };
                }
            }
        };

        let mut payload = vec![0u8; len as usize];
        if len > 0 {
            tokio::select! {
                _ = shutdown_rx.recv() => return Session::Shutdown,
                read = stream.read_exact(&mut payload) => {
                    if let Err(e) = read {
                        // Fewer than `len` bytes before close: the partial
                        // frame is discarded and re-requested next session.
                        tracing::debug!(
                            partition = %partition,
                            expected = len,
                            error = %e,
                            "stream closed mid-frame"
                        );
                        return Session::Ended { applied };
                    }
                }
            }
        }

        let offset = log.append_record(Record::from_wire(Bytes::from(payload)));
        applied += 1;
        tracing::trace!(partition = %partition, offset = %offset, "applied replicated record");
    }
}
