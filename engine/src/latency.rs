//! Round-trip latency probing

use crate::cancel::CancelToken;
use crate::constants::{PING_ATTEMPTS, PING_ATTEMPT_TIMEOUT};
use crate::error::MeasureError;
use crate::sampling::SampleStream;
use crate::transport::Transport;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LatencySettings {
    /// Sequential round trips per batch, never retried
    pub attempts: usize,

    /// Upper bound per round trip; slower attempts count as failed
    pub attempt_timeout: Duration,
}

impl Default for LatencySettings {
    fn default() -> Self {
        Self {
            attempts: PING_ATTEMPTS,
            attempt_timeout: PING_ATTEMPT_TIMEOUT,
        }
    }
}

/// Aggregate of one batch of successful round trips
#[derive(Debug, Clone, PartialEq)]
pub struct PingStats {
    /// Rounded arithmetic mean in milliseconds
    pub ping_ms: f64,

    /// Rounded (max - min) in milliseconds
    pub jitter_ms: f64,

    /// Raw round-trip times in attempt order
    pub samples: Vec<f64>,
}

impl PingStats {
    /// `None` when no attempt succeeded
    pub fn from_samples(samples: Vec<f64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            ping_ms: mean.round(),
            jitter_ms: (max - min).round(),
            samples,
        })
    }
}

/// Issue the configured number of round trips and aggregate the successes.
///
/// Failed or timed-out attempts are dropped from the batch. If none succeed
/// the result is [`MeasureError::EmptySampleSet`].
pub async fn measure_ping<T: Transport>(
    transport: &T,
    settings: &LatencySettings,
    cancel: &CancelToken,
) -> Result<PingStats, MeasureError> {
    let mut stream = SampleStream::new(cancel, |rtt| debug!("Round trip {:.2}ms", rtt));
    let mut samples = Vec::with_capacity(settings.attempts);

    for attempt in 1..=settings.attempts {
        let start = Instant::now();
        let outcome = cancel
            .guard(tokio::time::timeout(settings.attempt_timeout, transport.round_trip()))
            .await?;

        match outcome {
            Ok(Ok(())) => {
                let rtt_ms = start.elapsed().as_secs_f64() * 1000.0;
                samples.push(rtt_ms);
                stream.emit(rtt_ms);
            }
            Ok(Err(e)) => {
                debug!("Ping attempt {}/{} failed: {}", attempt, settings.attempts, e);
            }
            Err(_) => {
                debug!(
                    "Ping attempt {}/{} timed out after {:?}",
                    attempt, settings.attempts, settings.attempt_timeout
                );
            }
        }
    }

    PingStats::from_samples(samples).ok_or(MeasureError::EmptySampleSet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChunkSource;
    use std::sync::Mutex;

    /// Replays a scripted delay (or failure) per round trip
    struct ScriptedPing {
        script: Mutex<Vec<Option<u64>>>,
    }

    impl ScriptedPing {
        fn new(script: Vec<Option<u64>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
            }
        }
    }

    struct NoBody;

    impl ChunkSource for NoBody {
        async fn next_chunk(&mut self) -> Result<Option<usize>, MeasureError> {
            Ok(None)
        }
    }

    impl Transport for ScriptedPing {
        type Body = NoBody;

        async fn round_trip(&self) -> Result<(), MeasureError> {
            let step = self.script.lock().unwrap().pop().flatten();
            match step {
                Some(ms) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(())
                }
                None => Err(MeasureError::transport("connection refused")),
            }
        }

        async fn open_download(&self) -> Result<NoBody, MeasureError> {
            Ok(NoBody)
        }

        async fn upload(&self, _payload: Vec<u8>) -> Result<(), MeasureError> {
            Ok(())
        }
    }

    #[test]
    fn stats_round_mean_and_range() {
        let stats = PingStats::from_samples(vec![10.0, 12.5, 11.0, 30.5, 9.0]).unwrap();
        assert_eq!(stats.ping_ms, 15.0);
        assert_eq!(stats.jitter_ms, 22.0);
        assert_eq!(stats.samples.len(), 5);
    }

    #[test]
    fn stats_of_single_sample_have_zero_jitter() {
        let stats = PingStats::from_samples(vec![42.4]).unwrap();
        assert_eq!(stats.ping_ms, 42.0);
        assert_eq!(stats.jitter_ms, 0.0);
    }

    #[test]
    fn stats_of_nothing_is_none() {
        assert!(PingStats::from_samples(Vec::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn five_sequential_attempts() {
        let transport = ScriptedPing::new(vec![Some(20), Some(30), Some(25), Some(40), Some(35)]);
        let stats = measure_ping(&transport, &LatencySettings::default(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(stats.samples.len(), 5);
        assert_eq!(stats.ping_ms, 30.0);
        assert_eq!(stats.jitter_ms, 20.0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_are_dropped() {
        let transport = ScriptedPing::new(vec![Some(10), None, Some(50), None, Some(30)]);
        let stats = measure_ping(&transport, &LatencySettings::default(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(stats.samples.len(), 3);
        assert_eq!(stats.ping_ms, 30.0);
        assert_eq!(stats.jitter_ms, 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out() {
        let transport = ScriptedPing::new(vec![Some(10), Some(9_000), Some(20), Some(10), Some(20)]);
        let stats = measure_ping(&transport, &LatencySettings::default(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(stats.samples.len(), 4);
        assert_eq!(stats.jitter_ms, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_yield_empty_sample_set() {
        let transport = ScriptedPing::new(vec![None; 5]);
        let err = measure_ping(&transport, &LatencySettings::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, MeasureError::EmptySampleSet);
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_never_exceeds_range() {
        let batches = [
            vec![Some(5), Some(5), Some(5), Some(5), Some(5)],
            vec![Some(1), Some(100), None, Some(3), Some(7)],
            vec![None, None, None, None, Some(12)],
        ];
        for batch in batches {
            let transport = ScriptedPing::new(batch);
            let stats = measure_ping(&transport, &LatencySettings::default(), &CancelToken::new())
                .await
                .unwrap();
            let min = stats.samples.iter().copied().fold(f64::INFINITY, f64::min);
            let max = stats.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(stats.ping_ms >= 0.0);
            assert!(stats.jitter_ms >= 0.0);
            assert_eq!(stats.jitter_ms, (max - min).round());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_probe_stops() {
        let transport = ScriptedPing::new(vec![Some(10); 5]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = measure_ping(&transport, &LatencySettings::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, MeasureError::Cancelled);
    }
}
