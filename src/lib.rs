//! # Samizdat
//! Partitioned, append-only commit log with leader/replica replication.
//!
//! A broker owns a set of partitions; each partition owns an append-only,
//! offset-indexed [`log::Log`] of length-prefixed [`record::Record`]s and
//! plays exactly one replication role at a time:
//!
//! - **Leader**: serves the partition's log over a per-partition TCP
//!   endpoint ([`replication::LeaderServer`]). Each connection requests a
//!   start offset and then receives every record from there on, including
//!   ones appended after the connection was accepted (tailing).
//! - **Replica**: runs a resilient fetch loop
//!   ([`replication::Fetcher`]) that pulls from the leader, appends to the
//!   local log and, on any transport failure, reconnects and resumes from
//!   its own next offset. At-least-once delivery on the wire collapses to
//!   exactly-once application to the log.
//!
//! Roles are assigned externally; there is no election or consensus here.
//! Client writes and ad-hoc reads go through the [`server`] module's
//! request/response protocol.
//!
//! # Example
//! ```rust,no_run
//! use samizdat::broker::Broker;
//! use samizdat::partition::RoleAssignment;
//! use samizdat::types::PartitionId;
//!
//! #[tokio::main]
//! async fn main() -> samizdat::error::Result<()> {
//!     let broker = Broker::new();
//!     let partition = broker.create_partition(PartitionId::new(0))?;
//!
//!     // Lead partition 0, serving replica streams on an ephemeral port.
//!     partition
//!         .set_role(RoleAssignment::Leader {
//!             bind: "127.0.0.1:0".parse().unwrap(),
//!         })
//!         .await?;
//!
//!     partition.log().append(&b"first record"[..])?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod broker;
pub mod constants;
pub mod error;
pub mod log;
pub mod partition;
pub mod record;
pub mod replication;
pub mod server;
pub mod telemetry;
pub mod types;

pub mod prelude {
    //! Main exports for building and embedding a broker.

    pub use crate::broker::Broker;
    pub use crate::error::{Error, Result};
    pub use crate::log::{Log, Tail};
    pub use crate::partition::{Partition, Role, RoleAssignment};
    pub use crate::record::Record;
    pub use crate::replication::{Fetcher, FetcherConfig, LeaderServer};
    pub use crate::server::{BrokerHandler, BrokerServer, Handler};
    pub use crate::types::{Offset, PartitionId};

    pub use bytes;
}
