//! Raw readings returned by a metric source.
//!
//! Every counter is cumulative since boot unless noted otherwise; the engine
//! turns pairs of readings into interval values.

use crate::correlate::NamedSample;

/// Machine-wide processor counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTotal {
    /// Number of online processors.
    pub ncpus: u32,
    pub processor_hz: u64,
    /// Context switches.
    pub pswitch: u64,
    /// Processes blocked waiting to run.
    pub runque: u64,
    /// 1, 5 and 15 minute load averages (instantaneous).
    pub loadavg: [f64; 3],
    pub puser: u64,
    pub psys: u64,
    pub pidle: u64,
    pub pwait: u64,
}

/// Ticks of one logical processor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTicks {
    pub user: u64,
    pub sys: u64,
    pub idle: u64,
    pub wait: u64,
}

/// Memory and paging totals. Sizes are in KiB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTotal {
    pub virt_total: u64,
    pub real_total: u64,
    pub real_free: u64,
    pub huge_total: u64,
    pub huge_free: u64,
    pub huge_size: u64,
    pub pgexct: u64,
    pub pgins: u64,
    pub pgouts: u64,
    pub pgspins: u64,
    pub pgspouts: u64,
    pub pgsp_total: u64,
    pub pgsp_free: u64,
    pub virt_active: u64,
}

/// Backing store of a paging space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PagingKind {
    #[default]
    LogicalVolume,
    Nfs,
}

impl PagingKind {
    pub fn label(self) -> &'static str {
        match self {
            PagingKind::LogicalVolume => "LV",
            PagingKind::Nfs => "NFS",
        }
    }
}

/// One paging space (swap device or file). Instantaneous values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagingSpace {
    pub name: String,
    pub kind: PagingKind,
    pub mb_size: u64,
    pub mb_used: u64,
}

/// Block device counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskCounters {
    /// Time the device was busy (ms).
    pub time: u64,
    /// Sectors read.
    pub rblks: u64,
    /// Read service time (µs).
    pub rserv: u64,
    /// Reads completed.
    pub rfers: u64,
    /// Writes completed.
    pub wfers: u64,
    /// Sectors written.
    pub wblks: u64,
    /// Write service time (µs).
    pub wserv: u64,
    /// Weighted queue time (ms).
    pub wq_time: u64,
    /// Writes merged.
    pub wq_sampled: u64,
    /// Reads merged.
    pub q_sampled: u64,
    /// Requests in flight (instantaneous).
    pub wq_depth: u64,
}

/// Network interface counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetCounters {
    pub ipackets: u64,
    pub ibytes: u64,
    pub ierrors: u64,
    pub opackets: u64,
    pub obytes: u64,
    pub oerrors: u64,
    pub collisions: u64,
    pub xmitdrops: u64,
    pub iqdrops: u64,
}

/// Fibre-channel host adapter counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FcCounters {
    pub tx_words: u64,
    pub rx_words: u64,
    pub error_frames: u64,
    pub dumped_frames: u64,
    pub link_failures: u64,
}

pub type DiskSample = NamedSample<DiskCounters>;
pub type NetSample = NamedSample<NetCounters>;
pub type FcSample = NamedSample<FcCounters>;

/// NFS version 3 client operation counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nfs3Client {
    pub calls: u64,
    pub null: u64,
    pub getattr: u64,
    pub setattr: u64,
    pub lookup: u64,
    pub access: u64,
    pub read: u64,
    pub write: u64,
}

/// NFS version 4 client operation counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nfs4Client {
    pub operations: u64,
    pub null: u64,
    pub read: u64,
    pub write: u64,
    pub setattr: u64,
    pub lock: u64,
    pub unlock: u64,
    pub access: u64,
    pub getattr: u64,
    pub lookup: u64,
}

/// NFS client protocol counters for one protocol version.
#[derive(Debug, Clone, PartialEq)]
pub enum NfsCounters {
    V3(Nfs3Client),
    V4(Nfs4Client),
}

impl Default for NfsCounters {
    fn default() -> Self {
        NfsCounters::V3(Nfs3Client::default())
    }
}

impl NfsCounters {
    /// Protocol identity used as the query filter.
    pub fn protocol(&self) -> NfsProtocol {
        match self {
            NfsCounters::V3(_) => NfsProtocol::V3,
            NfsCounters::V4(_) => NfsProtocol::V4,
        }
    }

    /// Total calls (v3) or operations (v4).
    pub fn calls(&self) -> u64 {
        match self {
            NfsCounters::V3(c) => c.calls,
            NfsCounters::V4(c) => c.operations,
        }
    }
}

/// NFS protocol version tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfsProtocol {
    V3,
    V4,
}

impl NfsProtocol {
    pub fn name(self) -> &'static str {
        match self {
            NfsProtocol::V3 => "nfsv3",
            NfsProtocol::V4 => "nfsv4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nfsv3" => Some(NfsProtocol::V3),
            "nfsv4" => Some(NfsProtocol::V4),
            _ => None,
        }
    }

    /// Zeroed counters of this version.
    pub fn empty(self) -> NfsCounters {
        match self {
            NfsProtocol::V3 => NfsCounters::V3(Nfs3Client::default()),
            NfsProtocol::V4 => NfsCounters::V4(Nfs4Client::default()),
        }
    }
}

/// A mounted filesystem and its capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filesystem {
    /// Device name with the leading `/` dropped and `/` replaced by `_`.
    pub name: String,
    pub mount: String,
    pub remote: bool,
    pub size_mb: u64,
    pub free_pct: u64,
}

/// One live process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub state: char,
    pub kernel_thread: bool,
    /// Cumulative user + system CPU time (ms).
    pub cpu_ms: u64,
    /// Virtual size (KiB).
    pub memory_kb: u64,
}

impl ProcessSample {
    /// Zombies and kernel threads are not tracked.
    pub fn is_tracked(&self) -> bool {
        self.state != 'Z' && !self.kernel_thread
    }
}
