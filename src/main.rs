//! attach-console demo host
//!
//! Runs a small workload that logs from several threads. With `--console`
//! a console window is attached for the duration of the run and every log
//! event shows up there in color.
//!
//! ```text
//! attach-console --console              # Attach a console, log into it
//! attach-console --console -t 4 -n 20   # 4 worker threads, 20 events each
//! attach-console                        # Same workload, no console
//! ```

use std::env;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use attach_console::config::Config as FileConfig;
use attach_console::console::{ConsoleError, ConsoleManager, NativeBackend, OutputSinkRegistry};
use attach_console::log::{LogBridgeLayer, LogEventSource};

/// Command line options
struct Args {
    /// Attach a console window for the run
    console: bool,
    /// Worker threads emitting log events
    threads: usize,
    /// Events per worker
    events: usize,
    /// Delay between events
    interval: Duration,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            console: false,
            threads: 2,
            events: 10,
            interval: Duration::from_millis(200),
        }
    }
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("attach-console {} - Attach a console window and stream logs into it", VERSION);
    eprintln!();
    eprintln!("Usage: attach-console [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --console             Attach a console window for the run");
    eprintln!("  -t, --threads <N>     Worker threads emitting log events (default: 2)");
    eprintln!("  -n, --events <N>      Events per worker (default: 10)");
    eprintln!("  -i, --interval <MS>   Delay between events in ms (default: 200)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.attach-console/config.toml");
    eprintln!("Log file:      ~/.attach-console/attach-console.log");
}

fn parse_number(args: &[String], i: usize, flag: &str) -> Result<u64, String> {
    let value = args
        .get(i)
        .ok_or_else(|| format!("Missing value for {}", flag))?;
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", flag, value))
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                eprintln!("attach-console {}", VERSION);
                std::process::exit(0);
            }
            "--console" => {
                parsed.console = true;
            }
            "-t" | "--threads" => {
                i += 1;
                parsed.threads = parse_number(&args, i, "--threads")? as usize;
            }
            "-n" | "--events" => {
                i += 1;
                parsed.events = parse_number(&args, i, "--events")? as usize;
            }
            "-i" | "--interval" => {
                i += 1;
                parsed.interval = Duration::from_millis(parse_number(&args, i, "--interval")?);
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// File logging plus the bridge feeding log events to the console
fn init_tracing(config: &FileConfig, events: &LogEventSource) {
    let log_path = FileConfig::config_dir()
        .map(|dir| dir.join("attach-console.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("attach-console.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file_layer = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()
        .map(|file| {
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
        });

    let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(LogBridgeLayer::new(events.clone()));
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run_workload(args: &Args, registry: &OutputSinkRegistry) {
    let _ = registry.println("Workload starting");

    let workers: Vec<_> = (0..args.threads)
        .map(|worker| {
            let events = args.events;
            let interval = args.interval;
            thread::spawn(move || {
                for n in 0..events {
                    match n % 5 {
                        0 | 1 => info!(worker, "step {} done", n),
                        2 => warn!(worker, "step {} slow", n),
                        3 => error!(worker, "step {} failed", n),
                        _ => error!(
                            worker,
                            severity = "exception",
                            stack_trace = "run_workload::step",
                            "step {} panicked",
                            n
                        ),
                    }
                    thread::sleep(interval);
                }
            })
        })
        .collect();

    for worker in workers {
        if worker.join().is_err() {
            error!("Worker thread panicked");
        }
    }

    let _ = registry.println("Workload finished");
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let config = FileConfig::load();
    let events = LogEventSource::new();
    init_tracing(&config, &events);

    info!("attach-console starting...");

    let registry = Arc::new(OutputSinkRegistry::default());
    let console = ConsoleManager::with_options(
        NativeBackend::default(),
        registry.clone(),
        events,
        config.session_options(),
    );

    if args.console {
        match console.start() {
            Ok(()) => {}
            Err(ConsoleError::AlreadyAttached) => {
                warn!("A console is already attached, continuing without a new one");
            }
            Err(e) => {
                // Host keeps running on its original stdout
                error!("{}", e);
                eprintln!("Error: {}", e);
            }
        }
    }

    run_workload(&args, &registry);

    console.stop()?;
    info!("attach-console finished");

    Ok(())
}
