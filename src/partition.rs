//! A partition: one log plus one replication role.

use std::net::SocketAddr;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::log::Log;
use crate::replication::{Fetcher, FetcherConfig, LeaderServer};
use crate::types::PartitionId;

/// Replication role of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Single writer and stream source for the partition.
    Leader,
    /// Pulls records from the leader to converge to the same log prefix.
    Replica,
}

/// A role assignment, handed down by whatever owns placement decisions.
///
/// This crate performs no leader election; roles arrive fully formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    /// Serve replica streams on `bind` (port 0 picks an ephemeral port).
    Leader {
        /// Address for the leader stream endpoint.
        bind: SocketAddr,
    },
    /// Continuously fetch from the leader at `leader`.
    Replica {
        /// Address of the partition leader's stream endpoint.
        leader: SocketAddr,
    },
}

enum RoleState {
    Idle,
    Leader(LeaderServer),
    Replica(Fetcher),
}

/// A unit of the broker owning one [`Log`] and one replication role.
///
/// The log outlives role changes: switching between leader and replica
/// stops the old role's tasks and starts the new ones, but never touches
/// committed records.
pub struct Partition {
    id: PartitionId,
    log: Log,
    fetcher_config: FetcherConfig,
    role: Mutex<RoleState>,
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition").field("id", &self.id).finish()
    }
}

impl Partition {
    /// Create a partition with an empty log and no active role.
    pub fn new(id: PartitionId) -> Self {
        Self::with_config(id, FetcherConfig::default())
    }

    /// Create a partition with custom fetcher backoff settings.
    pub fn with_config(id: PartitionId, fetcher_config: FetcherConfig) -> Self {
        Self {
            id,
            log: Log::new(),
            fetcher_config,
            role: Mutex::new(RoleState::Idle),
        }
    }

    /// The partition id.
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// The partition's log.
    pub fn log(&self) -> &Log {
        &self.log
    }

    /// The current role, if one is active.
    pub async fn role(&self) -> Option<Role> {
        match *self.role.lock().await {
            RoleState::Idle => None,
            RoleState::Leader(_) => Some(Role::Leader),
            RoleState::Replica(_) => Some(Role::Replica),
        }
    }

    /// The bound address of the leader stream endpoint, when leading.
    pub async fn leader_addr(&self) -> Option<SocketAddr> {
        match &*self.role.lock().await {
            RoleState::Leader(server) => Some(server.local_addr()),
            _ => None,
        }
    }

    /// Assign a replication role, stopping whichever role was active.
    ///
    /// Stopping happens first and completes before the new role starts, so
    /// a partition never runs two roles at once and an in-progress log is
    /// never corrupted by the transition.
    ///
    /// # Errors
    /// Returns an error if a leader assignment cannot bind its address. The
    /// partition is left idle in that case.
    pub async fn set_role(&self, assignment: RoleAssignment) -> Result<()> {
        let mut role = self.role.lock().await;
        stop(std::mem::replace(&mut *role, RoleState::Idle)).await;

        match assignment {
            RoleAssignment::Leader { bind } => {
                let server = LeaderServer::bind(self.id, self.log.clone(), bind).await?;
                tracing::info!(partition = %self.id, addr = %server.local_addr(), "partition is leader");
                *role = RoleState::Leader(server);
            }
            RoleAssignment::Replica { leader } => {
                let fetcher =
                    Fetcher::spawn(self.id, self.log.clone(), leader, self.fetcher_config.clone());
                tracing::info!(partition = %self.id, leader = %leader, "partition is replica");
                *role = RoleState::Replica(fetcher);
            }
        }
        Ok(())
    }

    /// Stop the active role, leaving the partition idle. The log is kept.
    pub async fn shutdown(&self) {
        let mut role = self.role.lock().await;
        stop(std::mem::replace(&mut *role, RoleState::Idle)).await;
    }
}

async fn stop(state: RoleState) {
    match state {
        RoleState::Idle => {}
        RoleState::Leader(server) => server.shutdown().await,
        RoleState::Replica(fetcher) => fetcher.shutdown().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_new_partition_is_idle() {
        let partition = Partition::new(PartitionId::new(0));
        assert_eq!(partition.role().await, None);
        assert!(partition.leader_addr().await.is_none());
        assert!(partition.log().is_empty());
    }

    #[tokio::test]
    async fn test_leader_role_binds_endpoint() {
        let partition = Partition::new(PartitionId::new(1));
        partition
            .set_role(RoleAssignment::Leader { bind: ephemeral() })
            .await
            .unwrap();

        assert_eq!(partition.role().await, Some(Role::Leader));
        let addr = partition.leader_addr().await.unwrap();
        assert!(addr.port() > 0);

        partition.shutdown().await;
        assert_eq!(partition.role().await, None);
    }

    #[tokio::test]
    async fn test_role_change_keeps_log() {
        let partition = Partition::new(PartitionId::new(2));
        partition.log().append(&b"kept"[..]).unwrap();

        partition
            .set_role(RoleAssignment::Leader { bind: ephemeral() })
            .await
            .unwrap();
        let leader_addr = partition.leader_addr().await.unwrap();

        // Demote to replica of some other leader (nothing listens there;
        // the fetcher just backs off).
        partition
            .set_role(RoleAssignment::Replica {
                leader: leader_addr,
            })
            .await
            .unwrap();
        assert_eq!(partition.role().await, Some(Role::Replica));
        assert_eq!(partition.log().len(), 1);

        partition.shutdown().await;
        assert_eq!(partition.log().len(), 1);
    }

    #[tokio::test]
    async fn test_set_role_replaces_previous_role() {
        let partition = Partition::new(PartitionId::new(3));
        partition
            .set_role(RoleAssignment::Leader { bind: ephemeral() })
            .await
            .unwrap();
        let first = partition.leader_addr().await.unwrap();

        partition
            .set_role(RoleAssignment::Leader { bind: ephemeral() })
            .await
            .unwrap();
        let second = partition.leader_addr().await.unwrap();
        assert_ne!(first, second);

        partition.shutdown().await;
    }
}
