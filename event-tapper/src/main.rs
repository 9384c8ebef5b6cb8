//! Event Tapper - monitor system-wide input events from the command line

use anyhow::Context;
use event_tapper::app::cli::{Cli, Commands, MonitorArgs};
use event_tapper::app::config::Config;
use event_tapper::app::output::{json_line, tap_locations, tap_placements, TableFormatter};
use event_tapper::app::timer::StopTimer;
use event_tapper::capture::{known_fields, native_backend, TapLocation, TapPlacement};
use event_tapper::pipeline::{MonitoringState, TapCoordinator};
use event_tapper::time::timebase::MachTimebase;
use std::io::Write;
use std::process::ExitCode;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often the output loop checks whether the session has ended
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const PERMISSION_GUIDANCE: &str =
    "Monitoring events in other applications requires the Input Monitoring permission.\n\
     Grant it in System Settings > Privacy & Security > Input Monitoring, then run again.";

fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    // Logs go to stderr so stdout stays machine-readable
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    MachTimebase::init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Monitor(args) => run_monitor(&args, &config),
        Commands::Fields { json } => run_fields(json).map(|()| ExitCode::SUCCESS),
        Commands::Config { write } => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            run_config(&config, write, &path).map(|()| ExitCode::SUCCESS)
        }
    }
}

/// Config values overridden by the monitor flags
fn effective_config(args: &MonitorArgs, config: &Config) -> anyhow::Result<Config> {
    let mut effective = config.clone();
    if let Some(location) = args.location {
        effective.tap.location = TapLocation::from(location);
    }
    if let Some(placement) = args.placement {
        effective.tap.placement = TapPlacement::from(placement);
    }
    if let Some(throttle_ms) = args.throttle_ms {
        effective.tap.throttle_ms = throttle_ms;
    }
    effective.validate()?;
    Ok(effective)
}

fn run_monitor(args: &MonitorArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let config = effective_config(args, config)?;

    let Some(backend) = native_backend() else {
        anyhow::bail!("Event taps are only available on macOS");
    };
    // Output comes from the subscription; the log is never read here
    let coordinator = Arc::new(TapCoordinator::with_options(
        backend,
        config.capture.streaming_options(),
    ));

    if !coordinator.has_listen_access() {
        let granted = coordinator.request_listen_access();
        debug!("Listen access requested, granted: {}", granted);
        eprintln!("{}", PERMISSION_GUIDANCE);
        return Ok(ExitCode::FAILURE);
    }

    let events = coordinator.subscribe();
    let state = coordinator.start_monitoring(
        config.tap.location,
        config.tap.placement,
        config.tap.throttle(),
    );
    if state == MonitoringState::Idle {
        let reason = coordinator
            .status()
            .last_stop_reason
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| "unknown reason".to_string());
        error!("Failed to start monitoring: {}", reason);
        return Ok(ExitCode::FAILURE);
    }

    info!(
        "Monitoring {} events at {} ({}), throttle {} ms. Press Ctrl+C to stop",
        format!("{:?}", args.types).to_lowercase(),
        config.tap.location.name(),
        config.tap.placement.name(),
        config.tap.throttle_ms
    );

    {
        let coordinator = Arc::clone(&coordinator);
        ctrlc::set_handler(move || {
            coordinator.stop_monitoring();
        })?;
    }

    let timer = match args.duration() {
        Some(duration) => {
            let coordinator = Arc::clone(&coordinator);
            Some(StopTimer::start(duration, move || {
                coordinator.stop_monitoring();
            })?)
        }
        None => None,
    };

    let formatter = TableFormatter::new(args.field_keys(), args.labeled_fields, args.timestamp);
    let mut stdout = std::io::stdout().lock();
    if !args.json {
        writeln!(stdout, "{}", formatter.header())?;
    }

    let started = Instant::now();
    let mut printed = 0u64;
    let mut print = |event: &event_tapper::Event| -> anyhow::Result<()> {
        if !args.types.matches(event.event_type()) {
            return Ok(());
        }
        let line = if args.json {
            json_line(event)?
        } else {
            formatter.row(event)
        };
        writeln!(stdout, "{}", line)?;
        printed += 1;
        Ok(())
    };

    let output = loop {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if let Err(e) = print(event.info()) {
                    break Err(e);
                }
            }
            Err(RecvTimeoutError::Timeout) if coordinator.state() == MonitoringState::Idle => {
                // The session is over; everything it delivered is queued already
                break events.try_iter().try_for_each(|event| print(event.info()));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }
    };

    if let Some(timer) = timer {
        timer.cancel();
    }

    if let Err(e) = output {
        coordinator.stop_monitoring();
        return Err(e.context("Failed to write event output"));
    }

    let status = coordinator.status();
    info!(
        "Monitoring stopped after {:.1}s, printed {} events",
        started.elapsed().as_secs_f64(),
        printed
    );
    if let Some(stats) = coordinator.delivery_stats() {
        debug!("Delivery stats: {:?}", stats);
        if stats.dropped > 0 {
            warn!("{} events were dropped because the delivery buffer was full", stats.dropped);
        }
    }

    match status.last_stop_reason {
        Some(reason) if reason.is_failure() => {
            error!("Monitoring ended: {}", reason);
            Ok(ExitCode::FAILURE)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn run_fields(json: bool) -> anyhow::Result<()> {
    let fields = known_fields();
    let mut stdout = std::io::stdout().lock();

    if json {
        let listing = serde_json::json!({
            "fields": fields,
            "locations": tap_locations(),
            "placements": tap_placements(),
        });
        writeln!(stdout, "{}", serde_json::to_string_pretty(&listing)?)?;
        return Ok(());
    }

    for field in fields {
        writeln!(
            stdout,
            "{:>3}  {:<40} {:<12} {}",
            field.key,
            field.label,
            format!("{:?}", field.applies_to),
            field.description
        )?;
    }

    writeln!(stdout, "\nLocations (--location):")?;
    for option in tap_locations() {
        writeln!(stdout, "  {}", option.line(18))?;
    }
    writeln!(stdout, "\nPlacements (--placement):")?;
    for option in tap_placements() {
        writeln!(stdout, "  {}", option.line(18))?;
    }
    Ok(())
}

fn run_config(config: &Config, write: bool, path: &std::path::Path) -> anyhow::Result<()> {
    let toml_str = config.to_toml()?;
    println!("{}", toml_str);

    if write {
        config.save(path)?;
        info!("Saved configuration to {}", path.display());
    }
    Ok(())
}
