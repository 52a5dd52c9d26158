//! nasmon - terminal dashboard for a node_exporter endpoint.
//!
//! Scrapes the exporter on a fixed interval and shows CPU, memory, network,
//! disk usage, uptime and temperature, either in a TUI or as plain/JSON lines.

mod logging;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use nasmon::display::{
    self, format_bytes, format_percent, format_rate, format_uptime, CpuHistory, NetworkHistory,
};
use nasmon::metrics::{
    DerivedMetrics, MetricSnapshot, MetricsTextParser, ParserConfig, RateEstimator,
};
use nasmon::source::MetricsSource;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    prelude::CrosstermBackend,
    Frame, Terminal,
};
use serde::Serialize;
use std::future::{self, Future};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{info, warn};

const UPTIME_REFRESH: Duration = Duration::from_secs(1);

/// Terminal dashboard for a node_exporter endpoint
#[derive(Parser, Debug)]
#[command(name = "nasmon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Exporter URL, or a path to a file containing exporter output
    #[arg(
        short,
        long,
        env = "NASMON_URL",
        default_value = "http://localhost:9100/metrics"
    )]
    url: String,

    /// Polling interval in seconds
    #[arg(short = 'i', long, default_value = "10")]
    interval: f64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: f64,

    /// Network interfaces summed into download/upload speed
    #[arg(long, value_delimiter = ',', default_value = "eth0,wlan0")]
    interfaces: Vec<String>,

    /// Filesystem mountpoints to report usage for
    #[arg(long, value_delimiter = ',', default_value = "/")]
    mountpoints: Vec<String>,

    /// Run for specified duration (seconds), then exit
    #[arg(short, long)]
    duration: Option<u64>,

    /// Disable TUI and output metrics to stdout
    #[arg(long)]
    no_tui: bool,

    /// Print one JSON object per sample to stdout (implies --no-tui)
    #[arg(long)]
    json: bool,

    /// Write diagnostic logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// One line of `--json` output
#[derive(Serialize)]
struct JsonSample<'a> {
    timestamp: DateTime<Utc>,
    snapshot: &'a MetricSnapshot,
    derived: &'a DerivedMetrics,
}

/// Application state
struct App {
    source: MetricsSource,
    parser: MetricsTextParser,
    estimator: RateEstimator,

    snapshot: Option<MetricSnapshot>,
    derived: Option<DerivedMetrics>,
    last_update: Option<DateTime<Utc>>,
    last_error: Option<String>,
    samples_collected: u64,

    // History for sparkline graphs
    cpu_history: CpuHistory,
    network_history: NetworkHistory,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let timeout = seconds_arg("--timeout", args.timeout)?;
        let source = MetricsSource::from_target(&args.url, timeout)
            .with_context(|| format!("Invalid metrics target: {}", args.url))?;

        let config = ParserConfig {
            interfaces: clean_list(&args.interfaces),
            mountpoints: clean_list(&args.mountpoints),
        };

        Ok(Self {
            source,
            parser: MetricsTextParser::new(config),
            estimator: RateEstimator::new(),
            snapshot: None,
            derived: None,
            last_update: None,
            last_error: None,
            samples_collected: 0,
            cpu_history: CpuHistory::default(),
            network_history: NetworkHistory::default(),
        })
    }

    /// Scrape, parse and derive one sample. A failed fetch keeps the
    /// previous values on display; returns whether a new sample was taken.
    async fn poll(&mut self) -> bool {
        let text = match self.source.fetch().await {
            Ok(text) => text,
            Err(e) => {
                warn!(source = %self.source, error = %e, "fetch failed, skipping cycle");
                self.last_error = Some(format!("Fetch failed: {}", e));
                return false;
            }
        };

        let now = Utc::now();
        let (snapshot, stats) = self.parser.parse_with_stats(&text);
        if stats.applied == 0 {
            warn!(
                source = %self.source,
                malformed = stats.malformed,
                "exporter output contained no tracked metrics"
            );
        }

        let derived = self.estimator.update(snapshot.clone(), now);

        if let Some(cpu) = derived.cpu_usage_percent {
            self.cpu_history.push(cpu);
        }
        if let (Some(rx), Some(tx)) = (
            derived.download_bytes_per_sec,
            derived.upload_bytes_per_sec,
        ) {
            self.network_history.push(rx, tx);
        }

        self.snapshot = Some(snapshot);
        self.derived = Some(derived);
        self.last_update = Some(now);
        self.last_error = None;
        self.samples_collected += 1;
        true
    }

    /// Drop the previous sample so the next rates start fresh
    fn reset(&mut self) {
        self.estimator.reset();
        self.cpu_history.clear();
        self.network_history.clear();
        info!("rate estimator reset");
    }

    fn print_metrics(&self) {
        let (Some(snapshot), Some(derived)) = (&self.snapshot, &self.derived) else {
            return;
        };

        let time = self
            .last_update
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_default();
        println!("\n--- Sample {} ({}) ---", self.samples_collected, time);
        println!(
            "CPU: {}  Memory: {} / {} ({})",
            format_percent(derived.cpu_usage_percent),
            format_bytes(snapshot.memory_used_bytes()),
            format_bytes(snapshot.memory.total_bytes),
            format_percent(Some(derived.memory_usage_percent)),
        );
        println!(
            "Network: Down {} Up {}",
            format_rate(derived.download_bytes_per_sec),
            format_rate(derived.upload_bytes_per_sec)
        );
        for (mountpoint, fs) in &snapshot.filesystems {
            let percent = derived.disk_usage_percent.get(mountpoint).copied().flatten();
            println!(
                "Disk {}: {} / {} ({})",
                mountpoint,
                format_bytes(fs.used_bytes()),
                format_bytes(fs.size_bytes),
                format_percent(percent)
            );
        }

        let mut system = String::new();
        if let Some(date) = display::format_boot_date(snapshot.boot_time_epoch_seconds) {
            system.push_str(&format!(
                "Uptime: {} (booted {})",
                format_uptime(derived.uptime_seconds),
                date
            ));
        }
        if let Some(temp) = snapshot.temperature_celsius {
            if !system.is_empty() {
                system.push_str("  ");
            }
            system.push_str(&format!("Temp: {:.1}°C", temp));
        }
        if !system.is_empty() {
            println!("{}", system);
        }
    }

    fn print_json(&self) -> Result<()> {
        let (Some(snapshot), Some(derived), Some(timestamp)) =
            (&self.snapshot, &self.derived, self.last_update)
        else {
            return Ok(());
        };

        let line = serde_json::to_string(&JsonSample {
            timestamp,
            snapshot,
            derived,
        })?;
        println!("{}", line);
        Ok(())
    }
}

/// Trim allow-list entries and drop empty ones
fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert a seconds flag into a non-zero `Duration`
fn seconds_arg(flag: &str, secs: f64) -> Result<Duration> {
    let duration = Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{} must be a positive number of seconds, got {}", flag, secs))?;
    anyhow::ensure!(
        !duration.is_zero(),
        "{} is too small, got {}",
        flag,
        secs
    );
    Ok(duration)
}

fn new_ticker(interval: Duration) -> Interval {
    let mut ticker = time::interval(interval);
    // A scrape slower than the interval drops ticks instead of queueing them
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Completes after `duration`, or never
async fn stop_after(duration: Option<Duration>) {
    match duration {
        Some(d) => time::sleep(d).await,
        None => future::pending().await,
    }
}

/// Take one sample unless `stop` completes first; `None` means stopped.
/// A cancelled poll leaves the app state untouched.
async fn poll_or_stop<S>(app: &mut App, stop: &mut S) -> Option<bool>
where
    S: Future<Output = ()> + Unpin,
{
    tokio::select! {
        taken = app.poll() => Some(taken),
        _ = stop => None,
    }
}

/// Forward key presses and resizes from a blocking reader thread.
/// The thread exits once the receiver is dropped.
fn spawn_event_reader(tx: mpsc::UnboundedSender<Event>) {
    std::thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(Duration::from_millis(200)) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if tx.send(Event::Key(key)).is_err() {
                            break;
                        }
                    }
                    Ok(Event::Resize(width, height)) => {
                        if tx.send(Event::Resize(width, height)).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        }
    });
}

fn draw(f: &mut Frame, app: &App) {
    let fs_rows = app
        .snapshot
        .as_ref()
        .map(|s| s.filesystems.len())
        .unwrap_or(0)
        .max(1) as u16;

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),             // CPU + Network
            Constraint::Length(5),           // Memory + System
            Constraint::Length(fs_rows + 2), // Disks
            Constraint::Length(1),           // Help bar
        ])
        .split(f.area());

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_chunks[0]);
    let mid_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_chunks[1]);

    let snapshot = app.snapshot.as_ref();
    let derived = app.derived.as_ref();

    display::render_cpu(f, top_chunks[0], derived, &app.cpu_history);
    display::render_network(f, top_chunks[1], derived, &app.network_history);
    display::render_memory(f, mid_chunks[0], snapshot, derived);
    display::render_system_info(f, mid_chunks[1], snapshot, Utc::now());
    display::render_filesystems(f, main_chunks[2], snapshot, derived);

    let source = if app.source.is_http() {
        app.source.to_string()
    } else {
        format!("file {}", app.source)
    };
    display::render_help_bar(
        f,
        main_chunks[3],
        &source,
        app.last_error.as_deref(),
        app.last_update.map(|t| t.with_timezone(&Local)),
    );
}

async fn tui_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    interval: Duration,
    duration: Option<Duration>,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    spawn_event_reader(event_tx);

    let mut ticker = new_ticker(interval);
    let mut clock = new_ticker(UPTIME_REFRESH);
    let stop = stop_after(duration);
    tokio::pin!(stop);

    loop {
        terminal.draw(|f| draw(f, app))?;

        tokio::select! {
            _ = &mut stop => break,
            // First tick fires immediately
            _ = ticker.tick() => {
                if poll_or_stop(app, &mut stop).await.is_none() {
                    break;
                }
            }
            // Redraw so the uptime keeps counting between scrapes
            _ = clock.tick() => {}
            ev = event_rx.recv() => match ev {
                Some(Event::Key(key)) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Char('r') => app.reset(),
                    _ => {}
                },
                Some(_) => {}
                None => break,
            },
        }
    }

    Ok(())
}

async fn run_tui(mut app: App, interval: Duration, duration: Option<Duration>) -> Result<App> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = tui_loop(&mut terminal, &mut app, interval, duration).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.map(|()| app)
}

async fn run_no_tui(
    mut app: App,
    interval: Duration,
    duration: Option<Duration>,
    json: bool,
) -> Result<App> {
    let mut ticker = new_ticker(interval);
    let stop = async {
        tokio::select! {
            _ = stop_after(duration) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => match poll_or_stop(&mut app, &mut stop).await {
                Some(true) if json => app.print_json()?,
                Some(true) => app.print_metrics(),
                Some(false) => {}
                None => break,
            },
        }
    }

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let tui = !(args.no_tui || args.json);

    logging::init(args.log_file.as_deref(), tui)?;

    let interval = seconds_arg("--interval", args.interval)?;
    let duration = args.duration.map(Duration::from_secs);

    let app = App::new(&args)?;
    info!(
        source = %app.source,
        interval_secs = args.interval,
        interfaces = ?app.parser.config().interfaces,
        mountpoints = ?app.parser.config().mountpoints,
        "starting"
    );

    let app = if tui {
        run_tui(app, interval, duration).await?
    } else {
        run_no_tui(app, interval, duration, args.json).await?
    };

    info!(samples = app.samples_collected, "stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_list_drops_blank_entries() {
        let values = vec![" eth0".to_string(), "".to_string(), "wlan0 ".to_string()];
        assert_eq!(clean_list(&values), vec!["eth0", "wlan0"]);
    }

    #[test]
    fn test_args_split_allow_lists() {
        let args = Args::try_parse_from([
            "nasmon",
            "--url",
            "metrics.prom",
            "--interfaces",
            "eth0,eth1",
            "--mountpoints",
            "/,/data",
        ])
        .unwrap();
        assert_eq!(args.interfaces, vec!["eth0", "eth1"]);
        assert_eq!(args.mountpoints, vec!["/", "/data"]);
        assert_eq!(args.interval, 10.0);
    }

    #[test]
    fn test_seconds_arg_rejects_unusable_durations() {
        assert_eq!(
            seconds_arg("--interval", 2.5).unwrap(),
            Duration::from_millis(2500)
        );
        for secs in [1e-12, 1e20, 0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(seconds_arg("--interval", secs).is_err(), "{} accepted", secs);
        }
    }

    #[test]
    fn test_tiny_timeout_fails_app_setup() {
        let args = Args::try_parse_from(["nasmon", "--timeout", "1e-12"]).unwrap();
        assert!(App::new(&args).is_err());

        let args = Args::try_parse_from(["nasmon", "--timeout", "1e20"]).unwrap();
        assert!(App::new(&args).is_err());
    }

    #[tokio::test]
    async fn test_stop_interrupts_slow_scrape() {
        // Accepts connections via the backlog but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/metrics", listener.local_addr().unwrap());

        let args = Args::try_parse_from(["nasmon", "--url", &url, "--timeout", "30"]).unwrap();
        let mut app = App::new(&args).unwrap();

        let stop = stop_after(Some(Duration::from_millis(50)));
        tokio::pin!(stop);

        let started = std::time::Instant::now();
        assert_eq!(poll_or_stop(&mut app, &mut stop).await, None);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(app.samples_collected, 0);
        assert!(app.last_error.is_none());
    }

    #[tokio::test]
    async fn test_poll_from_file_updates_state() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"node_memory_MemTotal_bytes 2000\nnode_memory_MemAvailable_bytes 500\n",
        )
        .unwrap();

        let args = Args::try_parse_from(["nasmon", "--url", file.path().to_str().unwrap()]).unwrap();
        let mut app = App::new(&args).unwrap();

        assert!(app.poll().await);
        assert!(app.poll().await);
        assert_eq!(app.samples_collected, 2);
        let derived = app.derived.as_ref().unwrap();
        assert_eq!(derived.memory_usage_percent, 75.0);
        assert_eq!(derived.cpu_usage_percent, Some(0.0));
        assert_eq!(app.cpu_history.utilization, vec![0]);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        std::fs::write(&path, "node_boot_time_seconds 100\n").unwrap();

        let args = Args::try_parse_from(["nasmon", "--url", path.to_str().unwrap()]).unwrap();
        let mut app = App::new(&args).unwrap();
        assert!(app.poll().await);

        std::fs::remove_file(&path).unwrap();
        assert!(!app.poll().await);
        assert!(app.last_error.is_some());
        assert_eq!(app.samples_collected, 1);
        assert_eq!(
            app.snapshot.as_ref().map(|s| s.boot_time_epoch_seconds),
            Some(100.0)
        );
    }
}
