//! Two-broker demo: one leader, one replica, converging over TCP.
//!
//! ```bash
//! cargo run --example cluster
//! ```

use std::time::Duration;

use samizdat::broker::Broker;
use samizdat::partition::RoleAssignment;
use samizdat::telemetry::{init_logging, LogFormat};
use samizdat::types::{Offset, PartitionId};

#[tokio::main]
async fn main() -> samizdat::error::Result<()> {
    init_logging(LogFormat::Pretty)?;

    let partition_id = PartitionId::new(0);

    // Leader broker: owns the partition and serves its stream endpoint.
    let leader = Broker::new();
    let leader_partition = leader.create_partition(partition_id)?;
    leader_partition
        .set_role(RoleAssignment::Leader {
            bind: "127.0.0.1:0".parse().map_err(|e| {
                samizdat::error::Error::Config(format!("bad bind address: {e}"))
            })?,
        })
        .await?;
    let stream_addr = leader_partition
        .leader_addr()
        .await
        .ok_or_else(|| samizdat::error::Error::Config("leader endpoint missing".to_string()))?;

    // Replica broker: same partition id, pulling from the leader.
    let replica = Broker::new();
    let replica_partition = replica.create_partition(partition_id)?;
    replica_partition
        .set_role(RoleAssignment::Replica {
            leader: stream_addr,
        })
        .await?;

    // Writes land on the leader and flow to the replica.
    for i in 0..5u32 {
        let offset = leader_partition.log().append(format!("event-{i}"))?;
        tracing::info!(%offset, "appended to leader");
    }

    while replica_partition.log().len() < 5 {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for i in 0..5u32 {
        let record = replica_partition.log().read(Offset::new(i))?;
        tracing::info!(
            offset = i,
            payload = %String::from_utf8_lossy(record.payload()),
            "replicated record"
        );
    }

    replica.shutdown().await;
    leader.shutdown().await;
    Ok(())
}
