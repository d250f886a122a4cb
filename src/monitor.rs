//! Collection orchestrator.
//!
//! [`Monitor`] owns every piece of per-process state (scheduler, snapshot
//! pairs, correlated tables, process table and output buffer) and drives one
//! collection cycle per wall-clock second. Embedded groups share one combined
//! document per cycle; each standalone group produces its own.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::buffer::OutputBuffer;
use crate::collector::{MetricSource, SourceError, fetch_all, fetch_one};
use crate::correlate::{CorrelatedTable, PositionalTable};
use crate::model::{
    CpuTicks, CpuTotal, DiskCounters, DiskSample, FcCounters, FcSample, Filesystem, MemoryTotal,
    NetCounters, NetSample, NfsCounters, NfsProtocol, PagingSpace, ProcessSample,
};
use crate::process::ProcessTable;
use crate::render::{self, Section};
use crate::schedule::{FrequencyKind, MetricGroup, Scheduler};
use crate::snapshot::SnapshotPair;

/// Initial output buffer size; grows on demand.
const INITIAL_BUFFER: usize = 16 * 1024;

/// Unrecoverable failure while building the monitor.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot determine host name: {0}")]
    Hostname(#[source] SourceError),
}

/// Process enumeration failed; the process table is left untouched.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process enumeration failed: {0}")]
    Enumerate(#[from] SourceError),
}

/// Failure of one section of a group.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("output buffer exhausted")]
    Render(#[from] fmt::Error),
}

/// Destination of finished documents.
pub trait Sink {
    fn emit(&mut self, document: &str) -> io::Result<()>;
}

/// Writes each document to stdout and flushes it.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&mut self, document: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(document.as_bytes())?;
        stdout.flush()
    }
}

/// Collects documents in memory.
impl Sink for Vec<String> {
    fn emit(&mut self, document: &str) -> io::Result<()> {
        self.push(document.to_string());
        Ok(())
    }
}

/// Collection engine state.
pub struct Monitor<S: MetricSource> {
    source: S,
    hostname: String,
    scheduler: Scheduler,
    out: OutputBuffer,

    cpu_total: SnapshotPair<CpuTotal>,
    cpus: PositionalTable<CpuTicks>,
    memory: SnapshotPair<MemoryTotal>,
    nfsv3: SnapshotPair<NfsCounters>,
    nfsv4: SnapshotPair<NfsCounters>,
    disks: CorrelatedTable<DiskCounters>,
    interfaces: CorrelatedTable<NetCounters>,
    adapters: CorrelatedTable<FcCounters>,
    processes: ProcessTable,

    // Live poll buffers, reused every cycle.
    cpu_live: Vec<CpuTicks>,
    paging_live: Vec<PagingSpace>,
    disk_live: Vec<DiskSample>,
    fs_live: Vec<Filesystem>,
    net_live: Vec<NetSample>,
    fc_live: Vec<FcSample>,
    process_live: Vec<ProcessSample>,
}

impl<S: MetricSource> Monitor<S> {
    /// Builds the monitor. Fails only when the host name cannot be read.
    pub fn new(mut source: S, scheduler: Scheduler) -> Result<Self, StartupError> {
        let hostname = source.hostname().map_err(StartupError::Hostname)?;
        Ok(Self {
            source,
            hostname,
            scheduler,
            out: OutputBuffer::with_capacity(INITIAL_BUFFER),
            cpu_total: SnapshotPair::new(),
            cpus: PositionalTable::new(),
            memory: SnapshotPair::new(),
            nfsv3: SnapshotPair::new(),
            nfsv4: SnapshotPair::new(),
            disks: CorrelatedTable::new(),
            interfaces: CorrelatedTable::new(),
            adapters: CorrelatedTable::new(),
            processes: ProcessTable::new(),
            cpu_live: Vec::new(),
            paging_live: Vec::new(),
            disk_live: Vec::new(),
            fs_live: Vec::new(),
            net_live: Vec::new(),
            fc_live: Vec::new(),
            process_live: Vec::new(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn process_table(&self) -> &ProcessTable {
        &self.processes
    }

    /// The last document built by [`standard`](Self::standard) or
    /// [`group`](Self::group).
    pub fn as_str(&self) -> &str {
        self.out.as_str()
    }

    /// Takes the startup reading of every enabled group so the first emitted
    /// deltas cover the interval since startup.
    pub fn prime(&mut self) {
        for group in MetricGroup::ALL {
            if self.scheduler.kind(group) == FrequencyKind::Disabled {
                continue;
            }
            if let Err(e) = self.prime_group(group) {
                debug!("priming {} failed: {}", group, e);
            }
        }
    }

    fn prime_group(&mut self, group: MetricGroup) -> Result<(), SourceError> {
        match group {
            MetricGroup::CpuTotal => {
                let mut reading = CpuTotal::default();
                fetch_one(&mut self.source, None, &mut reading)?;
                self.cpu_total.prime(reading);
            }
            MetricGroup::Cpus => {
                fetch_all(&mut self.source, None, &mut self.cpu_live)?;
                self.cpus.seed(&self.cpu_live);
            }
            MetricGroup::Memory => {
                let mut reading = MemoryTotal::default();
                fetch_one(&mut self.source, None, &mut reading)?;
                self.memory.prime(reading);
            }
            MetricGroup::Disks => {
                fetch_all(&mut self.source, None, &mut self.disk_live)?;
                self.disks.seed(&self.disk_live);
            }
            MetricGroup::Nfs => {
                for (protocol, pair) in [
                    (NfsProtocol::V3, &mut self.nfsv3),
                    (NfsProtocol::V4, &mut self.nfsv4),
                ] {
                    let mut reading = protocol.empty();
                    fetch_one(&mut self.source, Some(protocol.name()), &mut reading)?;
                    pair.prime(reading);
                }
            }
            MetricGroup::Adapters => {
                fetch_all(&mut self.source, None, &mut self.net_live)?;
                self.interfaces.seed(&self.net_live);
                fetch_all(&mut self.source, None, &mut self.fc_live)?;
                self.adapters.seed(&self.fc_live);
            }
            MetricGroup::Processes => {
                fetch_all(&mut self.source, None, &mut self.process_live)?;
                self.processes.seed(&self.process_live);
                debug!("tracking {} processes", self.processes.len());
            }
        }
        Ok(())
    }

    /// Builds the combined document of every embedded group due at
    /// `timestamp`. Returns `true` when at least one group ran.
    pub fn standard(&mut self, timestamp: i64, separator: &str) -> bool {
        if render::begin_document(&mut self.out).is_err() {
            return false;
        }

        let mut ran = false;
        for group in MetricGroup::ALL {
            if self.scheduler.kind(group) == FrequencyKind::Embedded
                && self.scheduler.is_due(group, timestamp as u64)
            {
                self.collect(group);
                ran = true;
            }
        }

        ran && self.finish(timestamp, separator)
    }

    /// Builds the standalone document of one group. Returns `false` when the
    /// document must not be emitted (both NFS protocols idle or unavailable).
    pub fn group(&mut self, group: MetricGroup, timestamp: i64, separator: &str) -> bool {
        if render::begin_document(&mut self.out).is_err() {
            return false;
        }
        let collected = self.collect(group);
        if group == MetricGroup::Nfs && !collected {
            return false;
        }
        self.finish(timestamp, separator)
    }

    fn finish(&mut self, timestamp: i64, separator: &str) -> bool {
        render::end_document(&mut self.out, &self.hostname, timestamp, separator).is_ok()
    }

    /// Runs every section of `group`; `true` if any section succeeded.
    fn collect(&mut self, group: MetricGroup) -> bool {
        match group {
            MetricGroup::CpuTotal => self.section("cpu_total", Self::cpu_total_section),
            MetricGroup::Cpus => self.section("cpus", Self::cpus_section),
            MetricGroup::Memory => {
                let memory = self.section("memory", Self::memory_section);
                let paging = self.section("pagingspaces", Self::paging_section);
                memory || paging
            }
            MetricGroup::Disks => {
                let disks = self.section("disks", Self::disks_section);
                let fs = self.section("fs", Self::filesystems_section);
                disks || fs
            }
            MetricGroup::Nfs => {
                let v3 = self.section("nfsv3", |m| m.nfs_section(NfsProtocol::V3));
                let v4 = self.section("nfsv4", |m| m.nfs_section(NfsProtocol::V4));
                v3 || v4
            }
            MetricGroup::Adapters => {
                let intfs = self.section("intfs", Self::interfaces_section);
                let fc = self.section("fcadapters", Self::adapters_section);
                intfs || fc
            }
            MetricGroup::Processes => self.section("processes", Self::processes_section),
        }
    }

    /// Runs one section writer. On failure whatever it wrote is rolled back,
    /// except the zero summary of an idle protocol.
    fn section<F>(&mut self, name: &str, write: F) -> bool
    where
        F: FnOnce(&mut Self) -> Result<(), CollectError>,
    {
        let mark = self.out.len();
        match write(self) {
            Ok(()) => true,
            Err(CollectError::Source(SourceError::Idle(protocol))) => {
                trace!("{} idle", protocol);
                false
            }
            Err(e) => {
                self.out.truncate(mark);
                debug!("section {} skipped: {}", name, e);
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Section writers
    // -----------------------------------------------------------------------

    fn cpu_total_section(&mut self) -> Result<(), CollectError> {
        let shift = self.scheduler.shift(MetricGroup::CpuTotal);
        let source = &mut self.source;
        let (curr, prev) = self
            .cpu_total
            .collect(|slot| fetch_one(source, None, slot))?;
        render::cpu_total(&mut self.out, curr, prev, shift)?;
        Ok(())
    }

    fn cpus_section(&mut self) -> Result<(), CollectError> {
        fetch_all(&mut self.source, None, &mut self.cpu_live)?;

        let mut section = Section::open(&mut self.out, "cpus")?;
        let mut written = Ok(());
        self.cpus.reconcile(&self.cpu_live, |idx, curr, prev| {
            if written.is_ok() {
                written = section.cpu(idx, curr, prev);
            }
        });
        written?;
        section.close()?;
        Ok(())
    }

    fn memory_section(&mut self) -> Result<(), CollectError> {
        let shift = self.scheduler.shift(MetricGroup::Memory);
        let source = &mut self.source;
        let (curr, prev) = self.memory.collect(|slot| fetch_one(source, None, slot))?;
        render::memory(&mut self.out, curr, prev, shift)?;
        Ok(())
    }

    fn paging_section(&mut self) -> Result<(), CollectError> {
        if fetch_all(&mut self.source, None, &mut self.paging_live)? == 0 {
            return Ok(());
        }
        let mut section = Section::open(&mut self.out, "pagingspaces")?;
        for space in &self.paging_live {
            section.paging_space(space)?;
        }
        section.close()?;
        Ok(())
    }

    fn disks_section(&mut self) -> Result<(), CollectError> {
        let shift = self.scheduler.shift(MetricGroup::Disks);
        fetch_all(&mut self.source, None, &mut self.disk_live)?;

        let mut section = Section::open(&mut self.out, "disks")?;
        let mut written = Ok(());
        self.disks.reconcile(&self.disk_live, |curr, prev| {
            if written.is_ok() {
                written = section.disk(curr, prev, shift);
            }
        });
        written?;
        section.close()?;
        Ok(())
    }

    fn filesystems_section(&mut self) -> Result<(), CollectError> {
        fetch_all(&mut self.source, None, &mut self.fs_live)?;
        let mut section = Section::open(&mut self.out, "fs")?;
        for fs in &self.fs_live {
            section.filesystem(fs)?;
        }
        section.close()?;
        Ok(())
    }

    /// One NFS protocol. Counters at zero on both readings write a zero
    /// summary and report [`SourceError::Idle`].
    fn nfs_section(&mut self, protocol: NfsProtocol) -> Result<(), CollectError> {
        let shift = self.scheduler.shift(MetricGroup::Nfs);
        let pair = match protocol {
            NfsProtocol::V3 => &mut self.nfsv3,
            NfsProtocol::V4 => &mut self.nfsv4,
        };
        let source = &mut self.source;
        let (curr, prev) = pair.collect(|slot| fetch_one(source, Some(protocol.name()), slot))?;

        if curr.calls() == 0 && prev.calls() == 0 {
            render::nfs_idle(&mut self.out, protocol)?;
            return Err(SourceError::Idle(protocol.name()).into());
        }
        render::nfs(&mut self.out, curr, prev, shift)?;
        Ok(())
    }

    fn interfaces_section(&mut self) -> Result<(), CollectError> {
        let shift = self.scheduler.shift(MetricGroup::Adapters);
        if fetch_all(&mut self.source, None, &mut self.net_live)? == 0 {
            return Ok(());
        }

        let mut section = Section::open(&mut self.out, "intfs")?;
        let mut written = Ok(());
        self.interfaces.reconcile(&self.net_live, |curr, prev| {
            if written.is_ok() {
                written = section.interface(curr, prev, shift);
            }
        });
        written?;
        section.close()?;
        Ok(())
    }

    fn adapters_section(&mut self) -> Result<(), CollectError> {
        let shift = self.scheduler.shift(MetricGroup::Adapters);
        if fetch_all(&mut self.source, None, &mut self.fc_live)? == 0 {
            return Ok(());
        }

        let mut section = Section::open(&mut self.out, "fcadapters")?;
        let mut written = Ok(());
        self.adapters.reconcile(&self.fc_live, |curr, prev| {
            if written.is_ok() {
                written = section.fc_adapter(curr, prev, shift);
            }
        });
        written?;
        section.close()?;
        Ok(())
    }

    fn processes_section(&mut self) -> Result<(), CollectError> {
        let shift = self.scheduler.shift(MetricGroup::Processes);
        fetch_all(&mut self.source, None, &mut self.process_live).map_err(ProcessError::from)?;
        let top = self.processes.update(&self.process_live);
        render::processes(&mut self.out, &top, shift)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loop
    // -----------------------------------------------------------------------

    /// Primes every group, then emits documents once per second until
    /// `running` is cleared. Returns only on shutdown or a sink failure.
    pub fn run(&mut self, running: &AtomicBool, sink: &mut dyn Sink, separator: &str) -> io::Result<()> {
        self.prime();

        let standalone: Vec<MetricGroup> =
            self.scheduler.groups_of(FrequencyKind::Standalone).collect();
        let has_embedded = self
            .scheduler
            .groups_of(FrequencyKind::Embedded)
            .next()
            .is_some();
        let standard_mask = self.scheduler.combined_standard_mask();
        info!(
            "collecting: {} standalone group(s), embedded every {}s",
            standalone.len(),
            standard_mask + 1
        );

        while running.load(Ordering::SeqCst) {
            let timestamp = sleep_until_next_second();
            if !running.load(Ordering::SeqCst) {
                break;
            }

            if has_embedded
                && (timestamp as u64) & standard_mask == 0
                && self.standard(timestamp, separator)
            {
                sink.emit(self.as_str())?;
            }

            for &group in &standalone {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if self.scheduler.is_due(group, timestamp as u64)
                    && self.group(group, timestamp, separator)
                {
                    sink.emit(self.as_str())?;
                }
            }
        }

        info!("collection stopped");
        Ok(())
    }
}

/// Sleeps to the next whole wall-clock second and returns it.
fn sleep_until_next_second() -> i64 {
    let now = Utc::now();
    let elapsed = u64::from(now.timestamp_subsec_micros().min(999_999));
    thread::sleep(Duration::from_micros(1_000_000 - elapsed));
    now.timestamp() + 1
}
