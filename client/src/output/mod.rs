//! Terminal output and CSV export

use crate::config::OutputConfig;
use anyhow::Result;
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, style::Print};
use engine::{
    AiAnalysis, AnalysisStatus, CoverageReport, Event, LiveBuffer, SpeedResult, TestPhase,
    WifiResult,
};
use std::io::{Write, stdout};
use std::path::Path;
use tracing::debug;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Live progress line fed by orchestrator events
pub struct LiveDisplay {
    buffer: LiveBuffer,
    use_colors: bool,
    enabled: bool,
    line_open: bool,
}

impl LiveDisplay {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            buffer: LiveBuffer::new(),
            use_colors: config.use_colors,
            enabled: config.live_progress,
            line_open: false,
        }
    }

    pub fn handle(&mut self, event: &Event) {
        if let Err(e) = self.render(event) {
            debug!("Progress output failed: {}", e);
        }
    }

    fn render(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Phase(phase) => {
                self.close_line()?;
                if matches!(
                    phase,
                    TestPhase::Download | TestPhase::Upload | TestPhase::MeasuringWifi
                ) {
                    self.buffer.clear();
                }
                if phase.is_active() {
                    println!("{}", paint(&format!("» {}", phase.label()), Color::Cyan, self.use_colors));
                }
            }
            Event::Progress { phase, sample } => {
                self.buffer.push(*sample);
                if !self.enabled {
                    return Ok(());
                }
                let values: Vec<f64> = self.buffer.iter().map(|s| s.value_mbps).collect();
                let line = format!(
                    "  {:<10} {:>9.2} Mbps  {}",
                    phase.label(),
                    sample.value_mbps,
                    sparkline(&values)
                );
                let mut out = stdout();
                execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line))?;
                out.flush()?;
                self.line_open = true;
            }
            Event::PhaseFailed { phase, error } => {
                self.close_line()?;
                println!(
                    "{}",
                    paint(
                        &format!("  {} failed ({}), reporting 0", phase.label(), error),
                        Color::Yellow,
                        self.use_colors
                    )
                );
            }
        }
        Ok(())
    }

    fn close_line(&mut self) -> Result<()> {
        if self.line_open {
            println!();
            self.line_open = false;
        }
        Ok(())
    }
}

/// Bar-character rendering of `values` scaled to their peak
pub fn sparkline(values: &[f64]) -> String {
    let peak = values.iter().copied().fold(0.0_f64, f64::max);
    if peak <= 0.0 {
        return values.iter().map(|_| SPARK_LEVELS[0]).collect();
    }

    let top = (SPARK_LEVELS.len() - 1) as f64;
    values
        .iter()
        .map(|v| {
            let level = (v.max(0.0) / peak * top).round() as usize;
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

fn paint(text: &str, color: Color, use_colors: bool) -> String {
    if use_colors {
        text.with(color).to_string()
    } else {
        text.to_string()
    }
}

fn status_color(status: AnalysisStatus) -> Color {
    match status {
        AnalysisStatus::Excellent => Color::Green,
        AnalysisStatus::Good => Color::Cyan,
        AnalysisStatus::Average => Color::Yellow,
        AnalysisStatus::Poor => Color::Red,
    }
}

pub fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

pub fn print_speed_result(result: &SpeedResult, use_colors: bool) {
    println!();
    println!("{}", paint("Internet speed", Color::White, use_colors));
    println!("  Download  {:>9.2} Mbps", result.download);
    println!("  Upload    {:>9.2} Mbps", result.upload);
    println!("  Ping      {:>9} ms", result.ping);
    println!("  Jitter    {:>9} ms", result.jitter);
    println!("  Tested    {}", format_timestamp(result.timestamp));
}

pub fn print_wifi_result(result: &WifiResult, use_colors: bool) {
    println!();
    println!("{}", paint("WiFi link (estimated)", Color::White, use_colors));
    println!("  Link speed     {:>6} Mbps", result.link_speed);
    println!("  Signal         {:>6} dBm", result.signal_strength);
    println!("  Channel        {:>6}", result.channel);
    println!("  Local latency  {:>6} ms", result.local_latency);
}

pub fn print_analysis(analysis: &AiAnalysis, use_colors: bool) {
    println!();
    println!(
        "Assessment: {}",
        paint(&analysis.status.to_string().to_uppercase(), status_color(analysis.status), use_colors)
    );
    println!("  {}", analysis.explanation);
    for tip in &analysis.recommendations {
        println!("  - {}", tip);
    }
}

pub fn print_coverage(report: &CoverageReport, use_colors: bool) {
    println!();
    println!("{}", paint("Coverage", Color::White, use_colors));
    println!("  {}", report.explanation);
    for marker in &report.markers {
        println!(
            "  [{}] {} ({:.4}, {:.4}): {}",
            marker.kind, marker.title, marker.lat, marker.lng, marker.description
        );
    }
}

pub fn print_history(entries: &[SpeedResult]) {
    if entries.is_empty() {
        println!("No speed tests recorded yet");
        return;
    }

    println!(
        "{:<20} {:>12} {:>12} {:>8} {:>8}",
        "Tested", "Down (Mbps)", "Up (Mbps)", "Ping", "Jitter"
    );
    for r in entries {
        println!(
            "{:<20} {:>12.2} {:>12.2} {:>8} {:>8}",
            format_timestamp(r.timestamp),
            r.download,
            r.upload,
            r.ping,
            r.jitter
        );
    }
}

/// Export history as CSV, most recent first
pub fn export_csv(entries: &[SpeedResult], output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;

    writer.write_record([
        "timestamp",
        "tested_at",
        "download_mbps",
        "upload_mbps",
        "ping_ms",
        "jitter_ms",
    ])?;

    for r in entries {
        let tested_at = chrono::DateTime::from_timestamp_millis(r.timestamp)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        writer.write_record([
            r.timestamp.to_string(),
            tested_at,
            format!("{:.2}", r.download),
            format!("{:.2}", r.upload),
            format!("{}", r.ping),
            format!("{}", r.jitter),
        ])?;
    }

    writer.flush()?;

    Ok(())
}
