//! Result analysis and coverage lookup via the Gemini API

use crate::config::AnalysisConfig;
use anyhow::{Context, Result};
use engine::{AiAnalysis, AnalysisService, AnalysisSubject, CoverageReport, ServiceError};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

pub struct GeminiAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    coverage_model: String,
    api_key: Option<String>,
    api_key_env: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .context("Failed to build HTTP client")?;

        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("${} is not set, analysis will use generic advice", config.api_key_env);
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            coverage_model: config.coverage_model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
        })
    }

    /// Ask `model` for a JSON document matching `schema`; returns the raw text
    async fn generate(&self, model: &str, prompt: String, schema: Value) -> Result<String, ServiceError> {
        let Some(api_key) = &self.api_key else {
            return Err(ServiceError::Transport(format!("${} is not set", self.api_key_env)));
        };

        let url = format!("{}/models/{}:generateContent", self.endpoint, model);
        debug!("Requesting analysis from {}", url);

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        });

        let response: GenerateResponse = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServiceError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        response_text(response)
    }
}

impl AnalysisService for GeminiAnalyzer {
    async fn analyze(&self, subject: AnalysisSubject<'_>) -> Result<AiAnalysis, ServiceError> {
        let text = self
            .generate(&self.model, analysis_prompt(subject), analysis_schema())
            .await?;
        parse_analysis(&text)
    }

    async fn analyze_coverage(&self, lat: f64, lng: f64) -> Result<CoverageReport, ServiceError> {
        let text = self
            .generate(&self.coverage_model, coverage_prompt(lat, lng), coverage_schema())
            .await?;
        parse_coverage(&text)
    }
}

fn response_text(response: GenerateResponse) -> Result<String, ServiceError> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| ServiceError::Parse("response carried no text".to_string()))
}

pub fn parse_analysis(text: &str) -> Result<AiAnalysis, ServiceError> {
    serde_json::from_str(text).map_err(|e| ServiceError::Parse(e.to_string()))
}

pub fn parse_coverage(text: &str) -> Result<CoverageReport, ServiceError> {
    serde_json::from_str(text).map_err(|e| ServiceError::Parse(e.to_string()))
}

pub fn analysis_prompt(subject: AnalysisSubject<'_>) -> String {
    match subject {
        AnalysisSubject::Internet(r) => format!(
            "Analyze these internet speed test results: Download: {:.2} Mbps, Upload: {:.2} Mbps, \
             Ping: {} ms, Jitter: {} ms. Provide a status assessment (excellent, good, average, poor), \
             an explanation of what this speed is capable of (e.g. 4K streaming, gaming), and 3 bullet \
             point recommendations for optimization if needed.",
            r.download, r.upload, r.ping, r.jitter
        ),
        AnalysisSubject::Wifi(w) => format!(
            "Analyze these WiFi system metrics: Link Speed: {} Mbps, Signal Strength: {} dBm, \
             Local Latency: {} ms. Provide a status assessment (excellent, good, average, poor), \
             explain how the local network environment (distance, walls, interference) might be \
             affecting these metrics, and provide 3 specific technical WiFi optimization tips \
             (e.g., channel switching, placement).",
            w.link_speed, w.signal_strength, w.local_latency
        ),
    }
}

pub fn coverage_prompt(lat: f64, lng: f64) -> String {
    format!(
        "Find 3-5 nearby locations with excellent public WiFi or known fiber internet hotspots near \
         coordinates {}, {}. Return a JSON with an explanation of coverage in the area and a list of \
         markers with lat, lng, title, type (hotspot, tower, cafe), and description.",
        lat, lng
    )
}

fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "status": { "type": "STRING", "enum": ["excellent", "good", "average", "poor"] },
            "explanation": { "type": "STRING" },
            "recommendations": { "type": "ARRAY", "items": { "type": "STRING" } },
        },
        "required": ["status", "explanation", "recommendations"],
    })
}

fn coverage_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "explanation": { "type": "STRING" },
            "markers": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "lat": { "type": "NUMBER" },
                        "lng": { "type": "NUMBER" },
                        "title": { "type": "STRING" },
                        "type": { "type": "STRING", "enum": ["hotspot", "tower", "cafe"] },
                        "description": { "type": "STRING" },
                    },
                    "required": ["lat", "lng", "title", "type", "description"],
                },
            },
        },
        "required": ["explanation"],
    })
}
