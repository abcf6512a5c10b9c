//! The broker: a set of partitions exposed by id.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::partition::{Partition, RoleAssignment};
use crate::replication::FetcherConfig;
use crate::types::PartitionId;

/// Owns the partitions assigned to this node and hands them to the
/// client-facing server and to role management.
///
/// Partition placement and discovery live outside this crate; the broker
/// only creates, looks up and tears down the partitions it is told about.
pub struct Broker {
    partitions: DashMap<PartitionId, Arc<Partition>>,
    fetcher_config: FetcherConfig,
}

impl Broker {
    /// Create a broker with no partitions.
    pub fn new() -> Self {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a broker whose replica partitions use the given backoff
    /// settings.
    pub fn with_config(fetcher_config: FetcherConfig) -> Self {
        Self {
            partitions: DashMap::new(),
            fetcher_config,
        }
    }

    /// Create a partition.
    ///
    /// # Errors
    /// Returns [`Error::PartitionExists`] if the id is already taken.
    pub fn create_partition(&self, id: PartitionId) -> Result<Arc<Partition>> {
        match self.partitions.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::PartitionExists(id)),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let partition = Arc::new(Partition::with_config(id, self.fetcher_config.clone()));
                entry.insert(partition.clone());
                tracing::info!(partition = %id, "created partition");
                Ok(partition)
            }
        }
    }

    /// Look up a partition by id.
    pub fn partition(&self, id: PartitionId) -> Option<Arc<Partition>> {
        self.partitions.get(&id).map(|p| p.clone())
    }

    /// Number of partitions on this broker.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Ids of every partition on this broker.
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions.iter().map(|p| *p.key()).collect()
    }

    /// Assign a replication role to a partition.
    ///
    /// # Errors
    /// Returns [`Error::PartitionNotFound`] for an unknown id, or the
    /// partition's own error if the role cannot start.
    pub async fn set_role(&self, id: PartitionId, assignment: RoleAssignment) -> Result<()> {
        let partition = self.partition(id).ok_or(Error::PartitionNotFound(id))?;
        partition.set_role(assignment).await
    }

    /// Stop a partition's role tasks and drop the partition.
    ///
    /// # Errors
    /// Returns [`Error::PartitionNotFound`] for an unknown id.
    pub async fn remove_partition(&self, id: PartitionId) -> Result<()> {
        let (_, partition) = self
            .partitions
            .remove(&id)
            .ok_or(Error::PartitionNotFound(id))?;
        partition.shutdown().await;
        tracing::info!(partition = %id, "removed partition");
        Ok(())
    }

    /// Stop every partition's role tasks. Partitions and their logs are
    /// kept; this quiesces replication for broker shutdown.
    pub async fn shutdown(&self) {
        let partitions: Vec<Arc<Partition>> =
            self.partitions.iter().map(|p| p.value().clone()).collect();
        for partition in partitions {
            partition.shutdown().await;
        }
        tracing::info!(partitions = self.partition_count(), "broker shut down");
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let broker = Broker::new();
        broker.create_partition(PartitionId::new(0)).unwrap();
        broker.create_partition(PartitionId::new(1)).unwrap();

        assert_eq!(broker.partition_count(), 2);
        assert!(broker.partition(PartitionId::new(0)).is_some());
        assert!(broker.partition(PartitionId::new(2)).is_none());

        let mut ids = broker.partition_ids();
        ids.sort();
        assert_eq!(ids, vec![PartitionId::new(0), PartitionId::new(1)]);
    }

    #[tokio::test]
    async fn test_duplicate_partition_rejected() {
        let broker = Broker::new();
        broker.create_partition(PartitionId::new(7)).unwrap();
        assert_eq!(
            broker.create_partition(PartitionId::new(7)).unwrap_err(),
            Error::PartitionExists(PartitionId::new(7))
        );
    }

    #[tokio::test]
    async fn test_remove_partition() {
        let broker = Broker::new();
        broker.create_partition(PartitionId::new(3)).unwrap();
        broker.remove_partition(PartitionId::new(3)).await.unwrap();

        assert_eq!(broker.partition_count(), 0);
        assert_eq!(
            broker.remove_partition(PartitionId::new(3)).await.unwrap_err(),
            Error::PartitionNotFound(PartitionId::new(3))
        );
    }

    #[tokio::test]
    async fn test_set_role_unknown_partition() {
        let broker = Broker::new();
        let err = broker
            .set_role(
                PartitionId::new(9),
                RoleAssignment::Leader {
                    bind: "127.0.0.1:0".parse().unwrap(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, Error::PartitionNotFound(PartitionId::new(9)));
    }

    #[tokio::test]
    async fn test_set_role_through_broker() {
        let broker = Broker::new();
        broker.create_partition(PartitionId::new(0)).unwrap();
        broker
            .set_role(
                PartitionId::new(0),
                RoleAssignment::Leader {
                    bind: "127.0.0.1:0".parse().unwrap(),
                },
            )
            .await
            .unwrap();

        let partition = broker.partition(PartitionId::new(0)).unwrap();
        assert!(partition.leader_addr().await.is_some());

        broker.shutdown().await;
        assert_eq!(partition.role().await, None);
    }
}
