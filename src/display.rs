//! Terminal UI display using ratatui.

use crate::metrics::{DerivedMetrics, MetricSnapshot};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
    Frame,
};

/// Get the last N elements from a slice to fit the graph width
/// The sparkline uses 1 char per data point, so we use area.width - 2 (for borders)
fn slice_for_width(data: &[u64], area: Rect) -> &[u64] {
    let graph_width = area.width.saturating_sub(2) as usize;
    if data.len() <= graph_width {
        data
    } else {
        &data[data.len() - graph_width..]
    }
}

/// Format bytes to human readable string
pub fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let magnitude = bytes.abs();
    if magnitude >= TB {
        format!("{:.2} TB", bytes / TB)
    } else if magnitude >= GB {
        format!("{:.2} GB", bytes / GB)
    } else if magnitude >= MB {
        format!("{:.2} MB", bytes / MB)
    } else if magnitude >= KB {
        format!("{:.2} KB", bytes / KB)
    } else {
        format!("{:.0} B", bytes)
    }
}

/// Format bytes per second
pub fn format_throughput(bytes_per_sec: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let magnitude = bytes_per_sec.abs();
    if magnitude >= GB {
        format!("{:.2} GB/s", bytes_per_sec / GB)
    } else if magnitude >= MB {
        format!("{:.2} MB/s", bytes_per_sec / MB)
    } else if magnitude >= KB {
        format!("{:.2} KB/s", bytes_per_sec / KB)
    } else {
        format!("{:.0} B/s", bytes_per_sec)
    }
}

/// Format an optional rate, "N/A" until two samples exist
pub fn format_rate(bytes_per_sec: Option<f64>) -> String {
    bytes_per_sec
        .map(format_throughput)
        .unwrap_or_else(|| "N/A".to_string())
}

/// Format a percentage; absent and non-finite values render as "N/A"
pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) if p.is_finite() => format!("{:.1}%", p),
        _ => "N/A".to_string(),
    }
}

/// Format a duration in seconds as "1d 2h 3m" or "2h 3m 4s"
pub fn format_uptime(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "N/A".to_string();
    }

    let total = seconds as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    if hours >= 24 {
        format!("{}d {}h {}m", hours / 24, hours % 24, mins)
    } else {
        format!("{}h {}m {}s", hours, mins, secs)
    }
}

/// Seconds elapsed at `now` since the given boot timestamp
pub fn uptime_since(boot_time_epoch_seconds: f64, now: DateTime<Utc>) -> f64 {
    now.timestamp_millis() as f64 / 1000.0 - boot_time_epoch_seconds
}

/// Local calendar date of a boot timestamp; `None` when the exporter did not report one
pub fn format_boot_date(boot_time_epoch_seconds: f64) -> Option<String> {
    if boot_time_epoch_seconds.is_nan() || boot_time_epoch_seconds <= 0.0 {
        return None;
    }
    let boot = DateTime::<Utc>::from_timestamp(boot_time_epoch_seconds as i64, 0)?;
    Some(boot.with_timezone(&Local).format("%Y-%m-%d").to_string())
}

/// Get color based on percentage value
fn percentage_color(value: f64, warn_threshold: f64, crit_threshold: f64) -> Color {
    if value >= crit_threshold {
        Color::Red
    } else if value >= warn_threshold {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// Helper to render a labeled progress bar with readable text
fn render_progress_bar(
    label: &str,
    value: &str,
    percent: f64,
    width: usize,
    warn: f64,
    crit: f64,
) -> Line<'static> {
    let bar_width = width.saturating_sub(label.len() + value.len() + 5);
    let pct = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = ((pct / 100.0) * bar_width as f64) as usize;
    let empty = bar_width.saturating_sub(filled);
    let color = percentage_color(pct, warn, crit);

    Line::from(vec![
        Span::raw(label.to_string()),
        Span::raw(" ["),
        Span::styled("█".repeat(filled), Style::default().fg(color)),
        Span::styled("░".repeat(empty), Style::default().fg(Color::DarkGray)),
        Span::raw("] "),
        Span::styled(
            value.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ])
}

fn card(title: &str, color: Color) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

/// CPU history for sparkline display
pub struct CpuHistory {
    pub utilization: Vec<u64>, // CPU % history (0-100)
    pub max_samples: usize,
}

impl CpuHistory {
    pub fn new(max_samples: usize) -> Self {
        Self {
            utilization: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn push(&mut self, cpu_percent: f64) {
        if self.utilization.len() >= self.max_samples {
            self.utilization.remove(0);
        }
        self.utilization.push(cpu_percent.clamp(0.0, 100.0) as u64);
    }

    pub fn clear(&mut self) {
        self.utilization.clear();
    }
}

impl Default for CpuHistory {
    fn default() -> Self {
        Self::new(500) // Large buffer, display will use graph width
    }
}

/// Network history for sparkline display
pub struct NetworkHistory {
    pub rx_history: Vec<u64>, // RX KB/s history
    pub tx_history: Vec<u64>, // TX KB/s history
    pub max_samples: usize,
}

impl NetworkHistory {
    pub fn new(max_samples: usize) -> Self {
        Self {
            rx_history: Vec::with_capacity(max_samples),
            tx_history: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn push(&mut self, rx_bytes_per_sec: f64, tx_bytes_per_sec: f64) {
        let rx_kb = (rx_bytes_per_sec / 1024.0).max(0.0) as u64;
        let tx_kb = (tx_bytes_per_sec / 1024.0).max(0.0) as u64;

        if self.rx_history.len() >= self.max_samples {
            self.rx_history.remove(0);
            self.tx_history.remove(0);
        }
        self.rx_history.push(rx_kb);
        self.tx_history.push(tx_kb);
    }

    pub fn clear(&mut self) {
        self.rx_history.clear();
        self.tx_history.clear();
    }
}

impl Default for NetworkHistory {
    fn default() -> Self {
        Self::new(500)
    }
}

/// Render CPU usage card with sparkline
pub fn render_cpu(f: &mut Frame, area: Rect, derived: Option<&DerivedMetrics>, history: &CpuHistory) {
    let block = card(" CPU ", Color::Cyan);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Usage bar
            Constraint::Min(4),    // Sparkline graph at bottom
        ])
        .split(inner);

    let usage = derived.and_then(|d| d.cpu_usage_percent);
    let line = match usage {
        Some(pct) => render_progress_bar(
            "Usage:",
            &format_percent(Some(pct)),
            pct,
            chunks[0].width as usize,
            70.0,
            90.0,
        ),
        None => Line::from(vec![
            Span::raw("Usage: "),
            Span::styled(
                "waiting for second sample",
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    };
    f.render_widget(Paragraph::new(line), chunks[0]);

    if !history.utilization.is_empty() {
        let data = slice_for_width(&history.utilization, chunks[1]);
        let sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(" CPU % "),
            )
            .data(data)
            .max(100)
            .style(Style::default().fg(Color::Cyan));
        f.render_widget(sparkline, chunks[1]);
    }
}

/// Render memory card
pub fn render_memory(
    f: &mut Frame,
    area: Rect,
    snapshot: Option<&MetricSnapshot>,
    derived: Option<&DerivedMetrics>,
) {
    let block = card(" Memory ", Color::Magenta);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (Some(snapshot), Some(derived)) = (snapshot, derived) else {
        f.render_widget(Paragraph::new("No data yet"), inner);
        return;
    };

    let mem_label = format!(
        "{} / {} ({})",
        format_bytes(snapshot.memory_used_bytes()),
        format_bytes(snapshot.memory.total_bytes),
        format_percent(Some(derived.memory_usage_percent))
    );
    let lines = vec![
        render_progress_bar(
            "RAM:",
            &mem_label,
            derived.memory_usage_percent,
            inner.width as usize,
            70.0,
            90.0,
        ),
        Line::from(vec![
            Span::raw("Avail: "),
            Span::styled(
                format_bytes(snapshot.memory.available_bytes),
                Style::default().fg(Color::Green),
            ),
        ]),
    ];
    f.render_widget(Paragraph::new(lines), inner);
}

/// Render network card with RX/TX sparklines
pub fn render_network(
    f: &mut Frame,
    area: Rect,
    derived: Option<&DerivedMetrics>,
    history: &NetworkHistory,
) {
    let block = card(" Network ", Color::Blue);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Speeds
            Constraint::Min(6),    // Sparklines area (fills remaining)
        ])
        .split(inner);

    let graph_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(main_chunks[1]);

    let down = format_rate(derived.and_then(|d| d.download_bytes_per_sec));
    let up = format_rate(derived.and_then(|d| d.upload_bytes_per_sec));
    let line = Line::from(vec![
        Span::raw("Down "),
        Span::styled(format!("{:>11}", down), Style::default().fg(Color::Cyan)),
        Span::raw("  Up "),
        Span::styled(format!("{:>11}", up), Style::default().fg(Color::Green)),
    ]);
    f.render_widget(Paragraph::new(line), main_chunks[0]);

    let graphs = [
        (&history.rx_history, " RX ▼ ", Color::Cyan),
        (&history.tx_history, " TX ▲ ", Color::Green),
    ];
    for ((data, label, color), chunk) in graphs.into_iter().zip(graph_chunks.iter()) {
        if data.is_empty() {
            continue;
        }
        let data = slice_for_width(data, *chunk);
        let max = data.iter().max().copied().unwrap_or(1).max(1);
        let title = format!("{}max:{} ", label, format_throughput(max as f64 * 1024.0));
        let sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(title),
            )
            .data(data)
            .max(max)
            .style(Style::default().fg(color));
        f.render_widget(sparkline, *chunk);
    }
}

/// Render one usage bar per tracked mountpoint
pub fn render_filesystems(
    f: &mut Frame,
    area: Rect,
    snapshot: Option<&MetricSnapshot>,
    derived: Option<&DerivedMetrics>,
) {
    let block = card(" Disks ", Color::Yellow);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (Some(snapshot), Some(derived)) = (snapshot, derived) else {
        f.render_widget(Paragraph::new("No data yet"), inner);
        return;
    };

    if snapshot.filesystems.is_empty() {
        let text = Paragraph::new(Span::styled(
            "No tracked mountpoints reported",
            Style::default().fg(Color::DarkGray),
        ));
        f.render_widget(text, inner);
        return;
    }

    let label_width = snapshot
        .filesystems
        .keys()
        .map(|m| m.chars().count())
        .max()
        .unwrap_or(0)
        .min(16);

    let lines: Vec<Line> = snapshot
        .filesystems
        .iter()
        .map(|(mountpoint, fs)| {
            let percent = derived.disk_usage_percent.get(mountpoint).copied().flatten();
            let value = format!(
                "{}/{} ({})",
                format_bytes(fs.used_bytes()),
                format_bytes(fs.size_bytes),
                format_percent(percent)
            );
            let label: String = mountpoint.chars().take(label_width).collect();
            render_progress_bar(
                &format!("{:<width$}", label, width = label_width),
                &value,
                percent.unwrap_or(0.0),
                inner.width as usize,
                80.0,
                95.0,
            )
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

/// Render system info card: uptime, boot date and temperature.
/// Uptime counts from the last reported boot time up to `now`.
pub fn render_system_info(
    f: &mut Frame,
    area: Rect,
    snapshot: Option<&MetricSnapshot>,
    now: DateTime<Utc>,
) {
    let block = card(" System ", Color::Gray);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(snapshot) = snapshot else {
        f.render_widget(Paragraph::new("No data yet"), inner);
        return;
    };

    let mut lines = Vec::new();
    match format_boot_date(snapshot.boot_time_epoch_seconds) {
        Some(date) => {
            let uptime = uptime_since(snapshot.boot_time_epoch_seconds, now);
            lines.push(Line::from(format!("Uptime: {}", format_uptime(uptime))));
            lines.push(Line::from(format!("Booted: {}", date)));
        }
        None => lines.push(Line::from("Uptime: N/A")),
    }

    if let Some(temp) = snapshot.temperature_celsius {
        let color = if temp >= 80.0 {
            Color::Red
        } else if temp >= 65.0 {
            Color::Yellow
        } else {
            Color::Green
        };
        lines.push(Line::from(vec![
            Span::raw("Temp: "),
            Span::styled(format!("{:.1}°C", temp), Style::default().fg(color)),
        ]));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

/// Render help bar at the bottom
pub fn render_help_bar(
    f: &mut Frame,
    area: Rect,
    source: &str,
    status: Option<&str>,
    last_update: Option<DateTime<Local>>,
) {
    let (text, style) = if let Some(msg) = status {
        (
            format!(" {} ", msg),
            Style::default().fg(Color::White).bg(Color::Red),
        )
    } else {
        let updated = last_update
            .map(|t| format!(" | updated {}", t.format("%H:%M:%S")))
            .unwrap_or_default();
        (
            format!(" q: Quit | r: Reset | {}{} ", source, updated),
            Style::default().fg(Color::Black).bg(Color::Gray),
        )
    };

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}
