use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// The injected boundary standing in for the remote system. There is no real
/// backend anywhere behind this trait; implementations simulate latency and
/// outcome so the rest of the core can be exercised as if one existed.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// One simulated round trip for the named operation.
    async fn round_trip(&self, op: &str) -> Result<()>;
}

pub struct SimulatedRemote {
    latency: Duration,
    success_rate: f64,
}

impl SimulatedRemote {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            success_rate: 0.9,
        }
    }

    /// The success rate is a fault-injection hook, not a tuning knob; tests
    /// that care about outcomes inject deterministic gateways instead.
    pub fn with_success_rate(mut self, rate: f64) -> Self {
        self.success_rate = rate.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl RemoteGateway for SimulatedRemote {
    async fn round_trip(&self, op: &str) -> Result<()> {
        tokio::time::sleep(self.latency).await;
        if rand::random::<f64>() < self.success_rate {
            Ok(())
        } else {
            Err(anyhow::anyhow!("simulated network failure during '{}'", op))
        }
    }
}
