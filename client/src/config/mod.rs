//! Configuration management

use anyhow::{Context, Result};
use engine::EngineSettings;
use engine::constants::{
    LINK_FALLBACK_MBPS, LINK_HINT_SCALE, LINK_ITERATIONS, PING_ATTEMPTS, UPLOAD_PAYLOAD_BYTES,
};
use engine::latency::LatencySettings;
use engine::link::LinkSettings;
use engine::throughput::ThroughputSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub throughput: ThroughputConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    Sqlite,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_history_backend")]
    pub history_backend: HistoryBackend,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_ping_url")]
    pub ping_url: String,
    #[serde(default = "default_download_url")]
    pub download_url: String,
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyMethod {
    Http,
    Icmp,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatencyConfig {
    #[serde(default = "default_latency_method")]
    pub method: LatencyMethod,
    #[serde(default = "default_ping_attempts")]
    pub attempts: usize,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Host or address probed when `method = "icmp"`
    #[serde(default = "default_icmp_target")]
    pub icmp_target: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThroughputConfig {
    #[serde(default = "default_upload_bytes")]
    pub upload_bytes: usize,
    /// Stop the download after this many seconds; unlimited when unset
    #[serde(default)]
    pub download_budget_s: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintSource {
    None,
    Static,
    Interface,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default = "default_hint_source")]
    pub hint_source: HintSource,
    /// Downlink estimate used when `hint_source = "static"`
    #[serde(default)]
    pub static_mbps: Option<f64>,
    /// Interface read when `hint_source = "interface"`; default route when unset
    #[serde(default)]
    pub interface: Option<String>,
    /// Multiplier for the hint; defaults depend on the hint source
    #[serde(default)]
    pub hint_scale: Option<f64>,
    #[serde(default = "default_link_iterations")]
    pub iterations: usize,
    #[serde(default = "default_link_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_link_fallback_mbps")]
    pub fallback_mbps: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_analysis_model")]
    pub model: String,
    #[serde(default = "default_coverage_model")]
    pub coverage_model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_analysis_timeout_s")]
    pub timeout_s: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub use_colors: bool,
    /// Redraw a live progress line while measuring
    #[serde(default = "default_true")]
    pub live_progress: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
    #[serde(default = "default_export_directory")]
    pub export_directory: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_history_backend() -> HistoryBackend {
    HistoryBackend::Sqlite
}

fn default_database_path() -> String {
    "swiftsense.db".to_string()
}

fn default_history_path() -> String {
    "speed_history.json".to_string()
}

fn default_ping_url() -> String {
    "https://www.google.com/favicon.ico".to_string()
}

fn default_download_url() -> String {
    "https://picsum.photos/4000/4000".to_string()
}

fn default_upload_url() -> String {
    "https://httpbin.org/post".to_string()
}

fn default_request_timeout_s() -> u64 {
    60
}

fn default_latency_method() -> LatencyMethod {
    LatencyMethod::Http
}

fn default_ping_attempts() -> usize {
    PING_ATTEMPTS
}

fn default_attempt_timeout_ms() -> u64 {
    5000
}

fn default_icmp_target() -> String {
    "8.8.8.8".to_string()
}

fn default_upload_bytes() -> usize {
    UPLOAD_PAYLOAD_BYTES
}

fn default_hint_source() -> HintSource {
    HintSource::Interface
}

fn default_link_iterations() -> usize {
    LINK_ITERATIONS
}

fn default_link_interval_ms() -> u64 {
    100
}

fn default_link_fallback_mbps() -> f64 {
    LINK_FALLBACK_MBPS
}

fn default_analysis_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_analysis_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_coverage_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_analysis_timeout_s() -> u64 {
    30
}

fn default_chart_width() -> u32 {
    1600
}

fn default_chart_height() -> u32 {
    900
}

fn default_export_directory() -> String {
    ".".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            history_backend: default_history_backend(),
            database_path: default_database_path(),
            history_path: default_history_path(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            ping_url: default_ping_url(),
            download_url: default_download_url(),
            upload_url: default_upload_url(),
            request_timeout_s: default_request_timeout_s(),
        }
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            method: default_latency_method(),
            attempts: default_ping_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            icmp_target: default_icmp_target(),
        }
    }
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            upload_bytes: default_upload_bytes(),
            download_budget_s: None,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            hint_source: default_hint_source(),
            static_mbps: None,
            interface: None,
            hint_scale: None,
            iterations: default_link_iterations(),
            interval_ms: default_link_interval_ms(),
            fallback_mbps: default_link_fallback_mbps(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_analysis_endpoint(),
            model: default_analysis_model(),
            coverage_model: default_coverage_model(),
            api_key_env: default_api_key_env(),
            timeout_s: default_analysis_timeout_s(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            live_progress: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
            export_directory: default_export_directory(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LinkConfig {
    /// Scale applied to the hint. A browser-style downlink estimate is
    /// scaled up; an interface link rate is already the negotiated speed.
    pub fn effective_hint_scale(&self) -> f64 {
        match (self.hint_scale, self.hint_source) {
            (Some(scale), _) => scale,
            (None, HintSource::Interface) => 1.0,
            (None, _) => LINK_HINT_SCALE,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| "Failed to parse config file")?;

        if config.latency.attempts == 0 {
            anyhow::bail!("latency.attempts must be at least 1");
        }

        Ok(config)
    }

    /// Measurement parameters handed to the engine
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            latency: LatencySettings {
                attempts: self.latency.attempts,
                attempt_timeout: Duration::from_millis(self.latency.attempt_timeout_ms),
            },
            throughput: ThroughputSettings {
                upload_bytes: self.throughput.upload_bytes,
                download_budget: self
                    .throughput
                    .download_budget_s
                    .filter(|s| s.is_finite() && *s > 0.0)
                    .map(Duration::from_secs_f64),
            },
            link: LinkSettings {
                iterations: self.link.iterations,
                interval: Duration::from_millis(self.link.interval_ms),
                hint_scale: self.link.effective_hint_scale(),
                fallback_mbps: self.link.fallback_mbps,
            },
        }
    }

    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid log level: {}", self.logging.level))
    }
}
