//! Download and upload throughput measurement

use crate::cancel::CancelToken;
use crate::constants::UPLOAD_PAYLOAD_BYTES;
use crate::error::MeasureError;
use crate::sampling::{SampleStream, rate_mbps};
use crate::transport::{ChunkSource, Transport};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ThroughputSettings {
    /// Size of the opaque upload payload in bytes
    pub upload_bytes: usize,

    /// Stop reading the download body once this much time has passed
    pub download_budget: Option<Duration>,
}

impl Default for ThroughputSettings {
    fn default() -> Self {
        Self {
            upload_bytes: UPLOAD_PAYLOAD_BYTES,
            download_budget: None,
        }
    }
}

/// Final figures of one transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub mbps: f64,
    pub bytes: u64,
    pub elapsed: Duration,
    /// Progress notifications delivered during the transfer
    pub updates: usize,
}

/// Stream the download payload, reporting the cumulative average rate after
/// every chunk.
///
/// `on_progress` fires once per delivered chunk, at whatever cadence the
/// transport produces them. The returned rate uses the elapsed time at end
/// of stream (or at budget exhaustion).
pub async fn measure_download<T, F>(
    transport: &T,
    settings: &ThroughputSettings,
    cancel: &CancelToken,
    on_progress: F,
) -> Result<ThroughputReport, MeasureError>
where
    T: Transport,
    F: FnMut(f64),
{
    let mut stream = SampleStream::new(cancel, on_progress).with_budget(settings.download_budget);
    let mut body = cancel.guard(transport.open_download()).await??;
    let mut received: u64 = 0;

    while let Some(len) = cancel.guard(body.next_chunk()).await?? {
        received += len as u64;
        let sample = stream.emit(rate_mbps(received, stream.elapsed()));
        debug!(
            "Download chunk {} bytes, total {} bytes, {:.2} Mbps at {}ms",
            len, received, sample.value_mbps, sample.at_time_ms
        );

        if stream.is_exhausted() {
            info!("Download budget reached after {} bytes", received);
            break;
        }
    }

    let elapsed = stream.elapsed();
    let report = ThroughputReport {
        mbps: rate_mbps(received, elapsed),
        bytes: received,
        elapsed,
        updates: stream.emitted(),
    };
    info!(
        "Download finished: {} bytes in {:.2}s = {:.2} Mbps",
        report.bytes,
        report.elapsed.as_secs_f64(),
        report.mbps
    );
    Ok(report)
}

/// Send a fixed-size payload in one request and derive the rate from the
/// total elapsed time. `on_progress` fires exactly once, with the result.
pub async fn measure_upload<T, F>(
    transport: &T,
    settings: &ThroughputSettings,
    cancel: &CancelToken,
    on_progress: F,
) -> Result<ThroughputReport, MeasureError>
where
    T: Transport,
    F: FnMut(f64),
{
    let payload = vec![0u8; settings.upload_bytes];
    let bytes = payload.len() as u64;

    let mut stream = SampleStream::new(cancel, on_progress);
    cancel.guard(transport.upload(payload)).await??;

    let elapsed = stream.elapsed();
    let mbps = rate_mbps(bytes, elapsed);
    stream.emit(mbps);

    info!(
        "Upload finished: {} bytes in {:.2}s = {:.2} Mbps",
        bytes,
        elapsed.as_secs_f64(),
        mbps
    );

    Ok(ThroughputReport {
        mbps,
        bytes,
        elapsed,
        updates: stream.emitted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const MB: usize = 1_000_000;

    /// Delivers chunks at fixed offsets from the moment the body is opened
    struct TimedBody {
        chunks: Vec<(Duration, Result<usize, MeasureError>)>,
        opened: tokio::time::Instant,
        next: usize,
    }

    impl ChunkSource for TimedBody {
        async fn next_chunk(&mut self) -> Result<Option<usize>, MeasureError> {
            let Some((at, chunk)) = self.chunks.get(self.next).cloned() else {
                return Ok(None);
            };
            self.next += 1;
            tokio::time::sleep_until(self.opened + at).await;
            chunk.map(Some)
        }
    }

    struct MockTransport {
        chunks: Vec<(Duration, Result<usize, MeasureError>)>,
        refuse_download: bool,
        upload_delay: Option<Duration>,
        uploaded: Mutex<Option<usize>>,
    }

    impl MockTransport {
        fn downloading(chunks: Vec<(u64, usize)>) -> Self {
            Self {
                chunks: chunks
                    .into_iter()
                    .map(|(ms, len)| (Duration::from_millis(ms), Ok(len)))
                    .collect(),
                refuse_download: false,
                upload_delay: Some(Duration::ZERO),
                uploaded: Mutex::new(None),
            }
        }

        fn uploading(delay: Option<Duration>) -> Self {
            Self {
                chunks: Vec::new(),
                refuse_download: true,
                upload_delay: delay,
                uploaded: Mutex::new(None),
            }
        }
    }

    impl Transport for MockTransport {
        type Body = TimedBody;

        async fn round_trip(&self) -> Result<(), MeasureError> {
            Ok(())
        }

        async fn open_download(&self) -> Result<TimedBody, MeasureError> {
            if self.refuse_download {
                return Err(MeasureError::transport("dns error"));
            }
            Ok(TimedBody {
                chunks: self.chunks.clone(),
                opened: tokio::time::Instant::now(),
                next: 0,
            })
        }

        async fn upload(&self, payload: Vec<u8>) -> Result<(), MeasureError> {
            *self.uploaded.lock().unwrap() = Some(payload.len());
            match self.upload_delay {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                None => Err(MeasureError::transport("connection reset")),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_chunk_download() {
        let transport = MockTransport::downloading(vec![(100, MB), (300, MB), (600, MB)]);
        let mut progress = Vec::new();

        let report = measure_download(
            &transport,
            &ThroughputSettings::default(),
            &CancelToken::new(),
            |mbps| progress.push(mbps),
        )
        .await
        .unwrap();

        // Cumulative averages: 1 MB by 0.1s, 2 MB by 0.3s, 3 MB by 0.6s
        assert_eq!(progress.len(), 3);
        assert!((progress[0] - 80.0).abs() < 1e-6);
        assert!((progress[1] - 160.0 / 3.0).abs() < 1e-6);
        assert!((progress[2] - 40.0).abs() < 1e-6);

        let expected = (3.0 * MB as f64 * 8.0) / 0.6 / 1e6;
        assert!((report.mbps - expected).abs() < 1e-6);
        assert!((progress[2] - report.mbps).abs() < 1e-9);
        assert_eq!(report.bytes, 3 * MB as u64);
        assert_eq!(report.updates, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn download_of_n_bytes_over_t_seconds() {
        let transport = MockTransport::downloading(vec![(500, 4 * MB), (1_000, 4 * MB), (2_000, 2 * MB)]);
        let report = measure_download(
            &transport,
            &ThroughputSettings::default(),
            &CancelToken::new(),
            |_| {},
        )
        .await
        .unwrap();

        assert!((report.mbps - 40.0).abs() < 1e-6);
        assert_eq!(report.elapsed, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn download_budget_stops_early() {
        let transport = MockTransport::downloading(vec![(500, MB), (1_000, MB), (5_000, MB)]);
        let settings = ThroughputSettings {
            download_budget: Some(Duration::from_secs(1)),
            ..ThroughputSettings::default()
        };
        let report = measure_download(&transport, &settings, &CancelToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(report.bytes, 2 * MB as u64);
        assert_eq!(report.updates, 2);
        assert!((report.mbps - 16.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn download_failure_is_reported() {
        let transport = MockTransport::uploading(Some(Duration::ZERO));
        let mut calls = 0;
        let err = measure_download(
            &transport,
            &ThroughputSettings::default(),
            &CancelToken::new(),
            |_| calls += 1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MeasureError::Transport(_)));
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mid_stream_failure_is_reported() {
        let mut transport = MockTransport::downloading(vec![(100, MB)]);
        transport
            .chunks
            .push((Duration::from_millis(200), Err(MeasureError::transport("reset by peer"))));

        let err = measure_download(
            &transport,
            &ThroughputSettings::default(),
            &CancelToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MeasureError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_download_stops() {
        let transport = MockTransport::downloading(vec![(100, MB), (60_000, MB)]);
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let err = measure_download(&transport, &ThroughputSettings::default(), &cancel, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, MeasureError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_rate_from_elapsed_time() {
        let transport = MockTransport::uploading(Some(Duration::from_secs(2)));
        let mut progress = Vec::new();

        let report = measure_upload(
            &transport,
            &ThroughputSettings::default(),
            &CancelToken::new(),
            |mbps| progress.push(mbps),
        )
        .await
        .unwrap();

        let expected = (UPLOAD_PAYLOAD_BYTES as f64 * 8.0) / 2.0 / 1e6;
        assert!((report.mbps - expected).abs() < 1e-9);
        assert_eq!(progress, vec![report.mbps]);
        assert_eq!(*transport.uploaded.lock().unwrap(), Some(2 * 1024 * 1024));
    }

    #[tokio::test(start_paused = true)]
    async fn instantaneous_upload_stays_finite() {
        let transport = MockTransport::uploading(Some(Duration::ZERO));
        let report = measure_upload(
            &transport,
            &ThroughputSettings::default(),
            &CancelToken::new(),
            |_| {},
        )
        .await
        .unwrap();

        assert!(report.mbps.is_finite());
        assert!(report.mbps > 0.0);
        assert!(report.mbps <= 1e9);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_failure_sends_no_progress() {
        let transport = MockTransport::uploading(None);
        let mut calls = 0;
        let err = measure_upload(
            &transport,
            &ThroughputSettings::default(),
            &CancelToken::new(),
            |_| calls += 1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MeasureError::Transport(_)));
        assert_eq!(calls, 0);
    }
}
