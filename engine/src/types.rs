//! Measurement result data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one completed internet test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedResult {
    /// Download throughput in Mbps
    pub download: f64,

    /// Upload throughput in Mbps
    pub upload: f64,

    /// Mean round-trip time in milliseconds
    pub ping: f64,

    /// Round-trip spread (max - min) in milliseconds
    pub jitter: f64,

    /// Unix timestamp in milliseconds, taken when the test started
    pub timestamp: i64,
}

/// Outcome of one simulated wireless link test.
///
/// Apart from `link_speed` (which may come from a platform hint) every field
/// is a simulated estimate, not a radio measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiResult {
    pub link_speed: f64,
    pub signal_strength: f64,
    pub channel: u8,
    pub local_latency: f64,
    pub timestamp: i64,
}

/// One point of live progress
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSample {
    /// Milliseconds since the routine started
    pub at_time_ms: u64,
    pub value_mbps: f64,
}

/// Kind of test a result or analysis belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Internet,
    Wifi,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestKind::Internet => write!(f, "internet"),
            TestKind::Wifi => write!(f, "wifi"),
        }
    }
}

/// Where an orchestrated run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestPhase {
    Idle,
    Ping,
    Download,
    Upload,
    Analyzing,
    Complete,
    MeasuringWifi,
}

impl TestPhase {
    pub fn label(self) -> &'static str {
        match self {
            TestPhase::Idle => "idle",
            TestPhase::Ping => "ping",
            TestPhase::Download => "download",
            TestPhase::Upload => "upload",
            TestPhase::Analyzing => "analyzing",
            TestPhase::Complete => "complete",
            TestPhase::MeasuringWifi => "measuring wifi",
        }
    }

    /// True while a measurement is in flight
    pub fn is_active(self) -> bool {
        !matches!(self, TestPhase::Idle | TestPhase::Complete)
    }
}

/// Overall verdict returned by the analysis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Excellent,
    Good,
    Average,
    Poor,
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Excellent => write!(f, "excellent"),
            AnalysisStatus::Good => write!(f, "good"),
            AnalysisStatus::Average => write!(f, "average"),
            AnalysisStatus::Poor => write!(f, "poor"),
        }
    }
}

/// Natural-language analysis of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub status: AnalysisStatus,
    pub explanation: String,
    pub recommendations: Vec<String>,
}

impl AiAnalysis {
    /// Returned whenever the analysis service cannot produce a usable answer
    pub fn fallback() -> Self {
        Self {
            status: AnalysisStatus::Average,
            explanation: "Analysis unavailable, but your results are recorded.".to_string(),
            recommendations: vec![
                "Check your router settings.".to_string(),
                "Contact your ISP if speeds persist.".to_string(),
                "Ensure no background downloads.".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Hotspot,
    Tower,
    Cafe,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Hotspot => write!(f, "hotspot"),
            MarkerKind::Tower => write!(f, "tower"),
            MarkerKind::Cafe => write!(f, "cafe"),
        }
    }
}

/// A point of interest on the coverage map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub description: String,
}

/// Coverage description around a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub explanation: String,
    #[serde(default)]
    pub markers: Vec<MapMarker>,
}

impl CoverageReport {
    pub fn fallback() -> Self {
        Self {
            explanation: "Unable to load precise coverage data. Generally, urban areas nearby have strong 5G and fiber availability.".to_string(),
            markers: Vec::new(),
        }
    }
}
