//! Request dispatch for the client-facing server.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::broker::Broker;
use crate::record::Record;
use crate::types::{Offset, PartitionId};

use super::codec::{ConsumeResponse, StatResponse};

/// Context for a single client request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    /// Address of the client that sent the request.
    pub client_addr: SocketAddr,
}

/// Defines how a server responds to client requests.
///
/// Implement this to put your own storage behind the wire protocol; the
/// provided [`BrokerHandler`] dispatches onto a [`Broker`]'s partitions.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Append a record to a partition. Produce has no response.
    async fn handle_produce(&self, ctx: &RequestContext, partition: PartitionId, record: Record);

    /// Read the record at an offset.
    async fn handle_consume(
        &self,
        ctx: &RequestContext,
        partition: PartitionId,
        offset: Offset,
    ) -> ConsumeResponse;

    /// Report a partition's next offset.
    async fn handle_stat(&self, ctx: &RequestContext, partition: PartitionId) -> StatResponse;
}

/// The standard [`Handler`]: client writes and reads against the logs of a
/// [`Broker`]'s partitions.
pub struct BrokerHandler {
    broker: Arc<Broker>,
}

impl BrokerHandler {
    /// Create a handler over a broker.
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Handler for BrokerHandler {
    async fn handle_produce(&self, ctx: &RequestContext, partition: PartitionId, record: Record) {
        match self.broker.partition(partition) {
            Some(p) => {
                let offset = p.log().append_record(record);
                tracing::debug!(
                    client = %ctx.client_addr,
                    partition = %partition,
                    offset = %offset,
                    "produced record"
                );
            }
            None => {
                // Produce has no response channel to report this on.
                tracing::warn!(
                    client = %ctx.client_addr,
                    partition = %partition,
                    "produce to unknown partition dropped"
                );
            }
        }
    }

    async fn handle_consume(
        &self,
        ctx: &RequestContext,
        partition: PartitionId,
        offset: Offset,
    ) -> ConsumeResponse {
        // An unknown partition or a not-yet-written offset both answer with
        // an empty record.
        let record = self
            .broker
            .partition(partition)
            .and_then(|p| p.log().read(offset).ok())
            .unwrap_or_default();

        tracing::debug!(
            client = %ctx.client_addr,
            partition = %partition,
            offset = %offset,
            found = !record.is_empty(),
            "consume"
        );

        ConsumeResponse { partition, record }
    }

    async fn handle_stat(&self, ctx: &RequestContext, partition: PartitionId) -> StatResponse {
        let next_offset = self
            .broker
            .partition(partition)
            .map(|p| p.log().next_offset())
            .unwrap_or_default();

        tracing::debug!(
            client = %ctx.client_addr,
            partition = %partition,
            next_offset = %next_offset,
            "stat"
        );

        StatResponse {
            partition,
            next_offset,
        }
    }
}
