//! Simulated wireless link quality.
//!
//! Radio telemetry (signal strength, channel, negotiated rate) is not
//! available to the measuring process, so this module produces plausible
//! synthetic values instead. Treat everything it returns as an estimate.

use crate::cancel::CancelToken;
use crate::constants::*;
use crate::error::MeasureError;
use crate::sampling::SampleStream;
use crate::transport::DownlinkHint;
use crate::types::WifiResult;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub iterations: usize,

    /// Pause before every sample; paces the live display
    pub interval: Duration,

    /// Multiplier applied to the platform downlink hint
    pub hint_scale: f64,

    /// Link speed used when no hint is available
    pub fallback_mbps: f64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            iterations: LINK_ITERATIONS,
            interval: LINK_SAMPLE_INTERVAL,
            hint_scale: LINK_HINT_SCALE,
            fallback_mbps: LINK_FALLBACK_MBPS,
        }
    }
}

/// Result of a simulated link run plus the last synthetic quality sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkReport {
    pub result: WifiResult,
    pub last_sample: Option<f64>,
}

/// Run the paced synthetic sampling and derive a [`WifiResult`].
///
/// Randomness comes from `rng` and the optional bandwidth figure from
/// `hint`, so seeded generators and fixed hints make runs reproducible.
/// `timestamp` is stamped by the caller.
pub async fn measure_wifi_link<R, H, F>(
    rng: &mut R,
    hint: &H,
    settings: &LinkSettings,
    cancel: &CancelToken,
    on_progress: F,
) -> Result<LinkReport, MeasureError>
where
    R: Rng,
    H: DownlinkHint + ?Sized,
    F: FnMut(f64),
{
    let mut stream = SampleStream::new(cancel, on_progress);

    for _ in 0..settings.iterations {
        stream.pace(settings.interval).await?;
        let quality = rng.gen_range(LINK_SAMPLE_MIN_MBPS..LINK_SAMPLE_MAX_MBPS);
        stream.emit(quality);
    }

    let link_speed = match hint.downlink_mbps() {
        Some(downlink) if downlink.is_finite() && downlink >= 0.0 => {
            (downlink * settings.hint_scale).round()
        }
        Some(downlink) => {
            debug!("Ignoring unusable downlink hint {}", downlink);
            settings.fallback_mbps
        }
        None => settings.fallback_mbps,
    };

    let result = WifiResult {
        link_speed,
        signal_strength: rng.gen_range(SIGNAL_MIN_DBM..=SIGNAL_MAX_DBM).round(),
        channel: rng.gen_range(CHANNEL_MIN..=CHANNEL_MAX),
        local_latency: rng.gen_range(LOCAL_LATENCY_MIN_MS..=LOCAL_LATENCY_MAX_MS).round(),
        timestamp: 0,
    };

    debug!(
        "Simulated link: {} Mbps, {} dBm, channel {}, {} ms",
        result.link_speed, result.signal_strength, result.channel, result.local_latency
    );

    Ok(LinkReport {
        result,
        last_sample: stream.last().map(|s| s.value_mbps),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fast() -> LinkSettings {
        LinkSettings {
            interval: Duration::ZERO,
            ..LinkSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_paced_samples_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut samples = Vec::new();
        let start = tokio::time::Instant::now();

        let report = measure_wifi_link(
            &mut rng,
            &None::<f64>,
            &LinkSettings::default(),
            &CancelToken::new(),
            |q| samples.push(q),
        )
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(samples.len(), 20);
        assert!(samples.iter().all(|q| (800.0..1200.0).contains(q)));
        assert_eq!(report.last_sample, samples.last().copied());
    }

    #[tokio::test(start_paused = true)]
    async fn hint_is_scaled() {
        let mut rng = StdRng::seed_from_u64(1);
        let report = measure_wifi_link(&mut rng, &Some(12.5), &fast(), &CancelToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(report.result.link_speed, 125.0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_hint_uses_fallback() {
        let mut rng = StdRng::seed_from_u64(1);
        let report = measure_wifi_link(&mut rng, &None::<f64>, &fast(), &CancelToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(report.result.link_speed, 866.0);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_hint_uses_fallback() {
        let mut rng = StdRng::seed_from_u64(1);
        let report = measure_wifi_link(&mut rng, &Some(-3.0), &fast(), &CancelToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(report.result.link_speed, 866.0);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_fields_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let settings = LinkSettings {
            iterations: 1,
            ..fast()
        };

        for _ in 0..1000 {
            let wifi = measure_wifi_link(&mut rng, &None::<f64>, &settings, &CancelToken::new(), |_| {})
                .await
                .unwrap()
                .result;
            assert!((1..=11).contains(&wifi.channel));
            assert!((-70.0..=-30.0).contains(&wifi.signal_strength));
            assert!((2.0..=7.0).contains(&wifi.local_latency));
            assert!(wifi.link_speed >= 0.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn same_seed_same_result() {
        let run = |seed| async move {
            let mut rng = StdRng::seed_from_u64(seed);
            measure_wifi_link(&mut rng, &None::<f64>, &fast(), &CancelToken::new(), |_| {})
                .await
                .unwrap()
        };
        assert_eq!(run(42).await, run(42).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_pacing() {
        let mut rng = StdRng::seed_from_u64(3);
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            canceller.cancel();
        });

        let mut samples = 0;
        let err = measure_wifi_link(
            &mut rng,
            &None::<f64>,
            &LinkSettings::default(),
            &cancel,
            |_| samples += 1,
        )
        .await
        .unwrap_err();

        assert_eq!(err, MeasureError::Cancelled);
        assert_eq!(samples, 4);
    }
}
