//! ICMP echo round trips

use anyhow::{Context, Result};
use engine::MeasureError;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use surge_ping::{Client, Config as PingConfig, ICMP, PingIdentifier, PingSequence};
use tracing::debug;

/// Standard ping payload size
const PAYLOAD_BYTES: usize = 56;

pub struct IcmpPinger {
    client: Client,
    target: IpAddr,
    timeout: Duration,
    sequence: AtomicU16,
}

impl IcmpPinger {
    /// Resolve `target` and open the raw socket (needs CAP_NET_RAW)
    pub async fn new(target: &str, timeout: Duration) -> Result<Self> {
        let target = resolve_target(target).await?;
        let client = Client::new(&ping_config(target))
            .context("Failed to create ICMP client (CAP_NET_RAW required)")?;

        debug!("ICMP latency target {}", target);
        Ok(Self {
            client,
            target,
            timeout,
            sequence: AtomicU16::new(0),
        })
    }

    pub fn target(&self) -> IpAddr {
        self.target
    }

    /// One echo request/reply
    pub async fn echo(&self) -> Result<(), MeasureError> {
        let payload = [0u8; PAYLOAD_BYTES];
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut pinger = self
            .client
            .pinger(self.target, PingIdentifier(rand::random()))
            .await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(sequence), &payload).await {
            Ok((_packet, rtt)) => {
                debug!("ICMP {} seq {} -> {:.2}ms", self.target, sequence, rtt.as_secs_f64() * 1000.0);
                Ok(())
            }
            Err(surge_ping::SurgeError::Timeout { .. }) => Err(MeasureError::Timeout(self.timeout)),
            Err(e) => Err(MeasureError::transport(e)),
        }
    }
}

/// Raw socket family must match the target's address family
fn ping_config(target: IpAddr) -> PingConfig {
    let kind = if target.is_ipv6() { ICMP::V6 } else { ICMP::V4 };
    PingConfig::builder().kind(kind).build()
}

async fn resolve_target(target: &str) -> Result<IpAddr> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addr = tokio::net::lookup_host(format!("{}:0", target))
        .await
        .with_context(|| format!("Failed to resolve {}", target))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("No addresses found for {}", target))?;

    Ok(addr.ip())
}
