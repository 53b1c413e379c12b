//! PNG chart of the stored speed history

use crate::config::ExportConfig;
use crate::output::format_timestamp;
use anyhow::Result;
use engine::SpeedResult;
use plotters::prelude::*;
use std::path::Path;

/// Padding added around a single-point time axis, in milliseconds
const LONE_POINT_PADDING_MS: i64 = 60_000;

/// Generate a download/upload over time chart
pub fn generate_history_chart(
    entries: &[SpeedResult],
    output_path: &Path,
    config: &ExportConfig,
) -> Result<()> {
    let Some(((min_time, max_time), (y_min, y_max))) = chart_bounds(entries) else {
        anyhow::bail!("No history to chart");
    };

    // Stored newest first; draw oldest to newest
    let mut points: Vec<&SpeedResult> = entries.iter().collect();
    points.sort_by_key(|r| r.timestamp);

    let root = BitMapBackend::new(output_path, (config.chart_width, config.chart_height))
        .into_drawing_area();

    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!(
                "Speed History ({} to {})",
                format_timestamp(points[0].timestamp),
                format_timestamp(points[points.len() - 1].timestamp)
            ),
            ("sans-serif", 40).into_font(),
        )
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(min_time..max_time, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x| {
            chrono::DateTime::from_timestamp_millis(*x)
                .map(|dt| dt.with_timezone(&chrono::Local).format("%m-%d %H:%M").to_string())
                .unwrap_or_default()
        })
        .y_desc("Throughput (Mbps)")
        .x_desc("Time")
        .label_style(("sans-serif", 20))
        .axis_desc_style(("sans-serif", 24))
        .draw()?;

    let series: [(&str, RGBColor, fn(&SpeedResult) -> f64); 2] = [
        ("Download", BLUE, |r| r.download),
        ("Upload", GREEN, |r| r.upload),
    ];

    for (label, color, value) in series {
        chart
            .draw_series(LineSeries::new(
                points.iter().map(|r| (r.timestamp, value(r))),
                color.stroke_width(3),
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));

        chart.draw_series(
            points
                .iter()
                .map(|r| Circle::new((r.timestamp, value(r)), 5, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 18))
        .draw()?;

    root.present()?;

    Ok(())
}

/// Time range in epoch millis and a throughput range with 10% headroom
fn chart_bounds(entries: &[SpeedResult]) -> Option<((i64, i64), (f64, f64))> {
    let min_time = entries.iter().map(|r| r.timestamp).min()?;
    let max_time = entries.iter().map(|r| r.timestamp).max()?;
    let (min_time, max_time) = if min_time == max_time {
        (min_time - LONE_POINT_PADDING_MS, max_time + LONE_POINT_PADDING_MS)
    } else {
        (min_time, max_time)
    };

    let peak = entries
        .iter()
        .flat_map(|r| [r.download, r.upload])
        .fold(0.0_f64, f64::max);
    let y_max = if peak > 0.0 { peak * 1.1 } else { 1.0 };

    Some(((min_time, max_time), (0.0, y_max)))
}
