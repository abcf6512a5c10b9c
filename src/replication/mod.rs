//! Leader/replica replication for a partition log.
//!
//! Replication moves committed records from a partition's leader to any
//! number of replicas over plain TCP:
//!
//! - A [`LeaderServer`] accepts connections, reads a 4-byte big-endian
//!   start offset and streams record frames from that offset onward,
//!   tailing the log indefinitely. Each connection is served by its own
//!   task with an independent cursor.
//! - A [`Fetcher`] keeps a replica's local log converging to the leader's:
//!   connect, request the local next offset, append every fully-received
//!   frame, and on any transport failure back off, reconnect and resume
//!   from the already-advanced next offset.
//!
//! There is no end-of-stream marker and no consensus; leader identity is
//! assigned externally. The transport offers no delivery guarantees of its
//! own; exactness comes from the replica's next offset being the single
//! source of truth for what to request after a reconnect.

mod fetcher;
mod leader;

pub use fetcher::{Fetcher, FetcherConfig};
pub use leader::LeaderServer;
