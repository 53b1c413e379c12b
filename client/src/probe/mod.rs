//! Network transport used by the measurement engine

mod http;
mod icmp;

pub use http::{HttpBody, HttpTransport};
pub use icmp::IcmpPinger;

use crate::config::{Config, LatencyMethod};
use anyhow::Result;
use engine::{MeasureError, Transport};
use std::time::Duration;
use tracing::info;

/// HTTP for throughput, HTTP or ICMP for latency
pub struct NetworkTransport {
    http: HttpTransport,
    icmp: Option<IcmpPinger>,
}

impl NetworkTransport {
    pub async fn new(config: &Config) -> Result<Self> {
        let http = HttpTransport::new(&config.endpoints)?;

        let icmp = match config.latency.method {
            LatencyMethod::Http => None,
            LatencyMethod::Icmp => {
                let timeout = Duration::from_millis(config.latency.attempt_timeout_ms);
                let pinger = IcmpPinger::new(&config.latency.icmp_target, timeout).await?;
                info!("Measuring latency with ICMP echo to {}", pinger.target());
                Some(pinger)
            }
        };

        Ok(Self { http, icmp })
    }

    /// HTTP probes only, regardless of the configured latency method
    pub fn http_only(config: &Config) -> Result<Self> {
        Ok(Self {
            http: HttpTransport::new(&config.endpoints)?,
            icmp: None,
        })
    }
}

impl Transport for NetworkTransport {
    type Body = HttpBody;

    async fn round_trip(&self) -> Result<(), MeasureError> {
        match &self.icmp {
            Some(pinger) => pinger.echo().await,
            None => self.http.fetch_ping_resource().await,
        }
    }

    async fn open_download(&self) -> Result<HttpBody, MeasureError> {
        self.http.open_body().await
    }

    async fn upload(&self, payload: Vec<u8>) -> Result<(), MeasureError> {
        self.http.post(payload).await
    }
}
