//! Test sequencing
//!
//! An internet test runs latency, download and upload strictly one after
//! another so the probes never compete for the link. A wifi test runs the
//! link simulator alone. Per-phase failures become zero values here and
//! nowhere earlier; only cancellation aborts a run.

use crate::cancel::CancelToken;
use crate::error::MeasureError;
use crate::latency::{LatencySettings, PingStats, measure_ping};
use crate::link::{LinkSettings, measure_wifi_link};
use crate::throughput::{ThroughputReport, ThroughputSettings, measure_download, measure_upload};
use crate::transport::{DownlinkHint, Transport};
use crate::types::{ProgressSample, SpeedResult, TestPhase, WifiResult};
use rand::Rng;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub latency: LatencySettings,
    pub throughput: ThroughputSettings,
    pub link: LinkSettings,
}

/// Notifications emitted while a run progresses, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Phase(TestPhase),
    Progress {
        phase: TestPhase,
        sample: ProgressSample,
    },
    PhaseFailed {
        phase: TestPhase,
        error: MeasureError,
    },
}

/// A finished internet test with the per-phase outcomes behind it
#[derive(Debug, Clone)]
pub struct InternetRun {
    pub result: SpeedResult,
    pub ping: Result<PingStats, MeasureError>,
    pub download: Result<ThroughputReport, MeasureError>,
    pub upload: Result<ThroughputReport, MeasureError>,
}

impl InternetRun {
    /// True when any figure in `result` is a fallback rather than a measurement
    pub fn is_degraded(&self) -> bool {
        self.ping.is_err() || self.download.is_err() || self.upload.is_err()
    }
}

pub struct Orchestrator<T, H, R> {
    transport: T,
    hint: H,
    rng: R,
    settings: EngineSettings,
    cancel: CancelToken,
    last_timestamp: i64,
}

impl<T, H, R> Orchestrator<T, H, R>
where
    T: Transport,
    H: DownlinkHint,
    R: Rng,
{
    pub fn new(transport: T, hint: H, rng: R, settings: EngineSettings) -> Self {
        Self {
            transport,
            hint,
            rng,
            settings,
            cancel: CancelToken::new(),
            last_timestamp: i64::MIN,
        }
    }

    /// Token that aborts the run currently in flight
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Wall-clock epoch milliseconds, never behind a previously issued stamp
    fn stamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_timestamp = self.last_timestamp.max(now);
        self.last_timestamp
    }

    /// Latency, then download, then upload
    pub async fn run_internet<E>(&mut self, mut on_event: E) -> Result<InternetRun, MeasureError>
    where
        E: FnMut(Event),
    {
        let timestamp = self.stamp();
        info!("Starting internet test");

        on_event(Event::Phase(TestPhase::Ping));
        let ping = measure_ping(&self.transport, &self.settings.latency, &self.cancel).await;
        let ping = settle(TestPhase::Ping, ping, &mut on_event)?;

        on_event(Event::Phase(TestPhase::Download));
        let started = Instant::now();
        let download = measure_download(
            &self.transport,
            &self.settings.throughput,
            &self.cancel,
            |mbps| on_event(progress(TestPhase::Download, started, mbps)),
        )
        .await;
        let download = settle(TestPhase::Download, download, &mut on_event)?;

        on_event(Event::Phase(TestPhase::Upload));
        let started = Instant::now();
        let upload = measure_upload(
            &self.transport,
            &self.settings.throughput,
            &self.cancel,
            |mbps| on_event(progress(TestPhase::Upload, started, mbps)),
        )
        .await;
        let upload = settle(TestPhase::Upload, upload, &mut on_event)?;

        let (ping_ms, jitter_ms) = ping
            .as_ref()
            .map(|stats| (stats.ping_ms, stats.jitter_ms))
            .unwrap_or((0.0, 0.0));

        let result = SpeedResult {
            download: download.as_ref().map(|r| r.mbps).unwrap_or(0.0),
            upload: upload.as_ref().map(|r| r.mbps).unwrap_or(0.0),
            ping: ping_ms,
            jitter: jitter_ms,
            timestamp,
        };

        info!(
            "Internet test complete: down {:.2} Mbps, up {:.2} Mbps, ping {}ms, jitter {}ms",
            result.download, result.upload, result.ping, result.jitter
        );
        on_event(Event::Phase(TestPhase::Complete));

        Ok(InternetRun {
            result,
            ping,
            download,
            upload,
        })
    }

    /// Simulated link sampling only
    pub async fn run_wifi<E>(&mut self, mut on_event: E) -> Result<WifiResult, MeasureError>
    where
        E: FnMut(Event),
    {
        info!("Starting wifi link test");
        on_event(Event::Phase(TestPhase::MeasuringWifi));

        let started = Instant::now();
        let report = measure_wifi_link(
            &mut self.rng,
            &self.hint,
            &self.settings.link,
            &self.cancel,
            |mbps| on_event(progress(TestPhase::MeasuringWifi, started, mbps)),
        )
        .await?;

        let result = WifiResult {
            timestamp: self.stamp(),
            ..report.result
        };
        on_event(Event::Phase(TestPhase::Complete));
        Ok(result)
    }
}

fn progress(phase: TestPhase, started: Instant, value_mbps: f64) -> Event {
    Event::Progress {
        phase,
        sample: ProgressSample {
            at_time_ms: started.elapsed().as_millis() as u64,
            value_mbps,
        },
    }
}

/// Let cancellation abort the run; keep every other outcome for the caller
fn settle<V, E>(
    phase: TestPhase,
    outcome: Result<V, MeasureError>,
    on_event: &mut E,
) -> Result<Result<V, MeasureError>, MeasureError>
where
    E: FnMut(Event),
{
    match outcome {
        Err(MeasureError::Cancelled) => {
            warn!("{} phase cancelled", phase.label());
            Err(MeasureError::Cancelled)
        }
        Err(error) => {
            warn!("{} phase failed, reporting 0: {}", phase.label(), error);
            on_event(Event::PhaseFailed {
                phase,
                error: error.clone(),
            });
            Ok(Err(error))
        }
        Ok(value) => Ok(Ok(value)),
    }
}
