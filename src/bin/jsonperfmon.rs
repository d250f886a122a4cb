//! jsonperfmon - host telemetry daemon.
//!
//! Samples CPU, memory, storage, NFS, adapter and process counters and writes
//! one JSON document per collection cycle to stdout. Each metric group takes
//! a signed period flag: `n > 0` embeds the group in the combined document
//! every `2^(n-1)` seconds, `n < 0` emits it as its own document, `0` turns it
//! off.
//!
//! Usage:
//!   jsonperfmon -A 1            # every group, every second, one document
//!   jsonperfmon -t 1 -p -3      # cpu totals each second, processes alone every 4s
//!   jsonperfmon -A 2 -n 0 -R    # every 2s without NFS, newline between documents

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{CommandFactory, Parser};
use tracing::level_filters::LevelFilter;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use jsonperfmon::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use jsonperfmon::collector::mock::MockFs;
use jsonperfmon::collector::ProcfsSource;
use jsonperfmon::monitor::{Monitor, StdoutSink};
use jsonperfmon::schedule::{FrequencyConfig, MetricGroup, Scheduler};

/// Host telemetry sampler emitting JSON documents.
#[derive(Parser, Debug)]
#[command(
    name = "jsonperfmon",
    about = "Host telemetry sampler emitting JSON documents",
    version,
    allow_negative_numbers = true
)]
struct Args {
    /// Default period for every group not set explicitly.
    #[arg(short = 'A', long = "all", value_name = "N")]
    all: Option<i32>,

    /// CPU totals.
    #[arg(short = 't', long = "cpu-total", value_name = "N")]
    cpu_total: Option<i32>,

    /// Per-CPU utilisation.
    #[arg(short = 'u', long = "cpus", value_name = "N")]
    cpus: Option<i32>,

    /// Memory and paging spaces.
    #[arg(short = 'm', long = "memory", value_name = "N")]
    memory: Option<i32>,

    /// Disks and filesystems.
    #[arg(short = 's', long = "storage", value_name = "N")]
    storage: Option<i32>,

    /// NFS client protocols.
    #[arg(short = 'n', long = "nfs", value_name = "N")]
    nfs: Option<i32>,

    /// Network interfaces and fibre-channel adapters.
    #[arg(short = 'i', long = "adapters", value_name = "N")]
    adapters: Option<i32>,

    /// Top processes by CPU and memory.
    #[arg(short = 'p', long = "processes", value_name = "N")]
    processes: Option<i32>,

    /// Put an empty line between documents.
    #[arg(short = 'R', long = "readable")]
    readable: bool,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to /sys filesystem (for testing/mocking).
    #[arg(long, default_value = "/sys")]
    sys_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn group_flags(&self) -> [(MetricGroup, Option<i32>); 7] {
        [
            (MetricGroup::CpuTotal, self.cpu_total),
            (MetricGroup::Cpus, self.cpus),
            (MetricGroup::Memory, self.memory),
            (MetricGroup::Disks, self.storage),
            (MetricGroup::Nfs, self.nfs),
            (MetricGroup::Adapters, self.adapters),
            (MetricGroup::Processes, self.processes),
        ]
    }

    /// Explicit group flags first, so they win over `-A`.
    fn scheduler(&self) -> Scheduler {
        let mut scheduler = Scheduler::new();
        for (group, flag) in self.group_flags() {
            if let Some(value) = flag {
                let config = FrequencyConfig::from_flag(value);
                scheduler.configure(group, config.kind, config.shift);
            }
        }
        if let Some(value) = self.all {
            let config = FrequencyConfig::from_flag(value);
            scheduler.configure_global_default(config.kind, config.shift);
        }
        scheduler
    }

    fn separator(&self) -> &'static str {
        if self.readable { "\n" } else { "" }
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr; stdout carries only documents.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    let scheduler = args.scheduler();

    if !scheduler.any_enabled() {
        // Nothing to collect: show usage and leave.
        if let Err(e) = Args::command().print_help() {
            eprintln!("{}", e);
        }
        return ExitCode::SUCCESS;
    }

    init_logging(args.verbose, args.quiet);

    info!("jsonperfmon {} starting", env!("CARGO_PKG_VERSION"));
    for group in MetricGroup::ALL {
        let config = scheduler.config(group);
        info!(
            "{}: {:?} every {}s",
            group,
            config.kind,
            config.period_secs()
        );
    }

    #[cfg(target_os = "linux")]
    let fs = RealFs::new();
    #[cfg(not(target_os = "linux"))]
    let fs = {
        warn!("not on Linux: sampling the built-in mock system");
        MockFs::typical_system()
    };

    let source = ProcfsSource::new(fs, &args.proc_path, &args.sys_path);
    let mut monitor = match Monitor::new(source, scheduler) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("reporting as {}", monitor.hostname());

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    if let Err(e) = monitor.run(&running, &mut StdoutSink, args.separator()) {
        error!("cannot write document: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
