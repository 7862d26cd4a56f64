
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::command::CommandProcessor;
use crate::core::events::EventBus;
use crate::core::remote::RemoteGateway;
use crate::core::store::DataStore;
use crate::core::store::types::{AgentKind, AgentRecord, AgentStatus};
use crate::storage::MemStore;

/// Gateway that completes instantly; command execution ignores outcome
/// anyway, so tests never wait on simulated latency.
struct InstantRemote;

#[async_trait]
impl RemoteGateway for InstantRemote {
    async fn round_trip(&self, _op: &str) -> Result<()> {
        Ok(())
    }
}

pub(super) async fn processor_with_agents(
    agents: &[(&str, AgentKind)],
) -> (Arc<DataStore>, CommandProcessor) {
    let store = Arc::new(
        DataStore::new(Arc::new(MemStore::new()), Arc::new(EventBus::new())).await,
    );
    for (id, kind) in agents {
        store
            .save_agent(AgentRecord {
                id: id.to_string(),
                name: id.to_string(),
                kind: *kind,
                status: AgentStatus::Active,
                capabilities: Vec::new(),
            })
            .await
            .expect("seed agent");
    }
    let processor = CommandProcessor::new(Arc::clone(&store), Arc::new(InstantRemote));
    (store, processor)
}
