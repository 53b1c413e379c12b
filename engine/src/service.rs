//! External analysis services

use crate::error::ServiceError;
use crate::types::{AiAnalysis, CoverageReport, SpeedResult, TestKind, WifiResult};
use std::future::Future;
use tracing::warn;

/// A completed result together with its kind
#[derive(Debug, Clone, Copy)]
pub enum AnalysisSubject<'a> {
    Internet(&'a SpeedResult),
    Wifi(&'a WifiResult),
}

impl AnalysisSubject<'_> {
    pub fn kind(&self) -> TestKind {
        match self {
            AnalysisSubject::Internet(_) => TestKind::Internet,
            AnalysisSubject::Wifi(_) => TestKind::Wifi,
        }
    }
}

/// Natural-language analysis backend
pub trait AnalysisService {
    fn analyze(
        &self,
        subject: AnalysisSubject<'_>,
    ) -> impl Future<Output = Result<AiAnalysis, ServiceError>> + Send;

    fn analyze_coverage(
        &self,
        lat: f64,
        lng: f64,
    ) -> impl Future<Output = Result<CoverageReport, ServiceError>> + Send;
}

/// Analyze `subject`, substituting [`AiAnalysis::fallback`] on any error
pub async fn analyze_or_fallback<S: AnalysisService>(
    service: &S,
    subject: AnalysisSubject<'_>,
) -> AiAnalysis {
    match service.analyze(subject).await {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!("Analysis of {} result failed: {}", subject.kind(), e);
            AiAnalysis::fallback()
        }
    }
}

/// Coverage for `location`, substituting [`CoverageReport::fallback`] when
/// the location is unavailable or the service fails
pub async fn coverage_or_fallback<S: AnalysisService>(
    service: &S,
    location: Result<(f64, f64), ServiceError>,
) -> CoverageReport {
    let outcome = match location {
        Ok((lat, lng)) => service.analyze_coverage(lat, lng).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(report) => report,
        Err(e) => {
            warn!("Coverage lookup failed: {}", e);
            CoverageReport::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisStatus, MapMarker, MarkerKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedService {
        fail: bool,
        calls: AtomicUsize,
    }

    impl CannedService {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AnalysisService for CannedService {
        async fn analyze(&self, subject: AnalysisSubject<'_>) -> Result<AiAnalysis, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServiceError::Parse("expected value at line 1".to_string()));
            }
            Ok(AiAnalysis {
                status: AnalysisStatus::Excellent,
                explanation: format!("{} looks great", subject.kind()),
                recommendations: Vec::new(),
            })
        }

        async fn analyze_coverage(&self, lat: f64, lng: f64) -> Result<CoverageReport, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServiceError::Transport("503".to_string()));
            }
            Ok(CoverageReport {
                explanation: "Dense fiber".to_string(),
                markers: vec![MapMarker {
                    lat,
                    lng,
                    title: "Corner cafe".to_string(),
                    kind: MarkerKind::Cafe,
                    description: "Free WiFi".to_string(),
                }],
            })
        }
    }

    fn speed() -> SpeedResult {
        SpeedResult {
            download: 250.0,
            upload: 40.0,
            ping: 9.0,
            jitter: 1.0,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn successful_analysis_passes_through() {
        let service = CannedService::new(false);
        let result = speed();
        let analysis = analyze_or_fallback(&service, AnalysisSubject::Internet(&result)).await;
        assert_eq!(analysis.status, AnalysisStatus::Excellent);
        assert_eq!(analysis.explanation, "internet looks great");
    }

    #[tokio::test]
    async fn failed_analysis_falls_back() {
        let service = CannedService::new(true);
        let result = speed();
        let analysis = analyze_or_fallback(&service, AnalysisSubject::Internet(&result)).await;
        assert_eq!(analysis, AiAnalysis::fallback());
    }

    #[tokio::test]
    async fn coverage_without_location_skips_service() {
        let service = CannedService::new(false);
        let report = coverage_or_fallback(
            &service,
            Err(ServiceError::PermissionDenied("no coordinates".to_string())),
        )
        .await;
        assert_eq!(report, CoverageReport::fallback());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coverage_failure_falls_back() {
        let service = CannedService::new(true);
        let report = coverage_or_fallback(&service, Ok((48.2, 16.37))).await;
        assert_eq!(report, CoverageReport::fallback());
    }

    #[tokio::test]
    async fn coverage_markers_pass_through() {
        let service = CannedService::new(false);
        let report = coverage_or_fallback(&service, Ok((48.2, 16.37))).await;
        assert_eq!(report.markers.len(), 1);
        assert_eq!(report.markers[0].kind, MarkerKind::Cafe);
    }
}
