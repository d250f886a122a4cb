//! Metric source reading Linux `/proc` and `/sys`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::procfs::parser::{
    CpuInfo, count_cpu_lines, parse_cpuinfo, parse_diskstats, parse_fc_counter,
    parse_global_stat, parse_hostname, parse_loadavg, parse_meminfo, parse_mounts, parse_net_dev,
    parse_proc_stat, parse_rpc_nfs, parse_swaps, parse_vmstat,
};
use crate::collector::source::{MetricSource, Query, SourceError, require_slot};
use crate::collector::traits::FileSystem;
use crate::delta::wrapping_sum;
use crate::model::{
    CpuTicks, CpuTotal, DiskCounters, DiskSample, FcCounters, FcSample, Filesystem, MemoryTotal,
    NetCounters, NetSample, Nfs3Client, Nfs4Client, NfsCounters, NfsProtocol, PagingKind,
    PagingSpace, ProcessSample,
};

/// USER_HZ used when `sysconf` cannot report it.
pub const DEFAULT_CLK_TCK: u64 = 100;

/// `PF_KTHREAD` bit of the `flags` field in `/proc/[pid]/stat`.
const PF_KTHREAD: u32 = 0x0020_0000;

/// Loopback is never reported.
const LOOPBACK: &str = "lo";

/// Reads host counters through a [`FileSystem`].
///
/// The processor count, clock and the list of fibre-channel hosts are read
/// once and cached; everything else is read on every query.
pub struct ProcfsSource<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    sys_path: PathBuf,
    clock_ticks: u64,
    cpu_info: Option<CpuInfo>,
    fc_hosts: Option<Vec<String>>,
}

/// Clock ticks per second of process CPU times (`_SC_CLK_TCK`).
pub fn clock_ticks() -> u64 {
    // SAFETY: sysconf(_SC_CLK_TCK) has no preconditions and only reads a constant.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as u64
    } else {
        DEFAULT_CLK_TCK
    }
}

impl<F: FileSystem> ProcfsSource<F> {
    /// Creates a source.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `sys_path` - Base path to sysfs (usually "/sys")
    pub fn new(fs: F, proc_path: impl Into<PathBuf>, sys_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
            clock_ticks: clock_ticks(),
            cpu_info: None,
            fc_hosts: None,
        }
    }

    /// Overrides the tick rate used to convert process CPU times to ms.
    pub fn with_clock_ticks(mut self, ticks: u64) -> Self {
        self.clock_ticks = ticks.max(1);
        self
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Mutable access to the filesystem, used by tests to advance fixtures.
    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    fn read_path(&self, path: &Path) -> Result<String, SourceError> {
        self.fs
            .read_to_string(path)
            .map_err(|e| SourceError::unavailable(path, e))
    }

    fn read_proc(&self, name: &str) -> Result<String, SourceError> {
        self.read_path(&self.proc_path.join(name))
    }

    fn cpu_info(&mut self) -> CpuInfo {
        if let Some(info) = self.cpu_info {
            return info;
        }
        let info = match self.read_proc("cpuinfo") {
            Ok(content) => parse_cpuinfo(&content),
            Err(e) => {
                warn!("processor details unavailable: {}", e);
                CpuInfo::default()
            }
        };
        self.cpu_info = Some(info);
        info
    }

    fn fc_host_dir(&self) -> PathBuf {
        self.sys_path.join("class/fc_host")
    }

    /// Names of fibre-channel hosts, scanned on first use.
    fn fc_hosts(&mut self) -> Result<&[String], SourceError> {
        if self.fc_hosts.is_none() {
            let dir = self.fc_host_dir();
            let hosts = if self.fs.exists(&dir) {
                let mut hosts: Vec<String> = self
                    .fs
                    .read_dir(&dir)
                    .map_err(|e| SourceError::unavailable(&dir, e))?
                    .iter()
                    .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
                    .filter(|n| !n.starts_with('.'))
                    .map(str::to_string)
                    .collect();
                hosts.sort();
                hosts
            } else {
                Vec::new()
            };
            debug!("found {} fibre channel hosts", hosts.len());
            self.fc_hosts = Some(hosts);
        }
        Ok(self.fc_hosts.as_deref().unwrap_or_default())
    }

    fn fc_counter(&self, host: &str, name: &str) -> u64 {
        let path = self.fc_host_dir().join(host).join("statistics").join(name);
        self.fs
            .read_to_string(&path)
            .ok()
            .and_then(|content| parse_fc_counter(&content).ok())
            .unwrap_or(0)
    }

    /// Pids of every numeric entry under the proc root, ascending.
    fn pids(&self) -> Result<Vec<u32>, SourceError> {
        let entries = self
            .fs
            .read_dir(&self.proc_path)
            .map_err(|e| SourceError::unavailable(&self.proc_path, e))?;
        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .filter_map(|n| n.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    /// Reads one process; `None` when it exited or its stat is unreadable.
    fn read_process(&self, pid: u32) -> Option<ProcessSample> {
        let path = self.proc_path.join(pid.to_string()).join("stat");
        let content = self.fs.read_to_string(&path).ok()?;
        match parse_proc_stat(&content) {
            Ok(stat) => Some(ProcessSample {
                pid: stat.pid,
                name: stat.comm,
                state: stat.state,
                kernel_thread: stat.flags & PF_KTHREAD != 0,
                cpu_ms: stat.utime.wrapping_add(stat.stime).saturating_mul(1000) / self.clock_ticks,
                memory_kb: stat.vsize >> 10,
            }),
            Err(e) => {
                debug!("skipping pid {}: {}", pid, e);
                None
            }
        }
    }
}

fn protocol_of(filter: Option<&str>) -> Result<NfsProtocol, SourceError> {
    filter
        .and_then(NfsProtocol::from_name)
        .ok_or_else(|| SourceError::UnknownProtocol(filter.unwrap_or_default().to_string()))
}

/// Copies `items` into `out`, returning the number copied.
fn fill_from<T>(out: &mut [T], items: impl IntoIterator<Item = T>) -> usize {
    let mut filled = 0;
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item;
        filled += 1;
    }
    filled
}

impl<F: FileSystem> Query<CpuTotal> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        Ok(1)
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [CpuTotal]) -> Result<usize, SourceError> {
        let info = self.cpu_info();
        let stat = parse_global_stat(&self.read_proc("stat")?)?;
        let loadavg = parse_loadavg(&self.read_proc("loadavg")?)?;
        let ncpus = if info.processors > 0 {
            info.processors
        } else {
            stat.cpus.len() as u32
        };

        *require_slot(out)? = CpuTotal {
            ncpus,
            processor_hz: info.mhz * 1_000_000,
            pswitch: stat.ctxt,
            runque: stat.procs_blocked,
            loadavg,
            puser: stat.total.user.wrapping_add(stat.total.nice),
            psys: stat.total.system,
            pidle: stat.total.idle,
            pwait: stat.total.iowait,
        };
        Ok(1)
    }
}

impl<F: FileSystem> Query<CpuTicks> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        Ok(count_cpu_lines(&self.read_proc("stat")?))
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [CpuTicks]) -> Result<usize, SourceError> {
        let stat = parse_global_stat(&self.read_proc("stat")?)?;
        Ok(fill_from(
            out,
            stat.cpus.into_iter().map(|c| CpuTicks {
                user: c.user.wrapping_add(c.nice),
                sys: c.system,
                idle: c.idle,
                wait: c.iowait,
            }),
        ))
    }
}

impl<F: FileSystem> Query<MemoryTotal> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        Ok(1)
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [MemoryTotal]) -> Result<usize, SourceError> {
        let mem = parse_meminfo(&self.read_proc("meminfo")?)?;
        let vm = parse_vmstat(&self.read_proc("vmstat")?)?;

        *require_slot(out)? = MemoryTotal {
            virt_total: mem.mem_total + mem.swap_total,
            real_total: mem.mem_total,
            real_free: mem.mem_free,
            huge_total: mem.hugepages_total,
            huge_free: mem.hugepages_free,
            huge_size: mem.hugepage_size,
            pgexct: vm.pgfault,
            pgins: vm.pgpgin,
            pgouts: vm.pgpgout,
            pgspins: vm.pswpin,
            pgspouts: vm.pswpout,
            pgsp_total: mem.swap_total,
            pgsp_free: mem.swap_free,
            virt_active: mem.active,
        };
        Ok(1)
    }
}

impl<F: FileSystem> Query<PagingSpace> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        Ok(parse_swaps(&self.read_proc("swaps")?).len())
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [PagingSpace]) -> Result<usize, SourceError> {
        let swaps = parse_swaps(&self.read_proc("swaps")?);
        Ok(fill_from(
            out,
            swaps.into_iter().map(|s| PagingSpace {
                name: s.filename,
                kind: PagingKind::LogicalVolume,
                mb_size: s.size_kb >> 10,
                mb_used: s.used_kb >> 10,
            }),
        ))
    }
}

impl<F: FileSystem> Query<DiskSample> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        let disks = parse_diskstats(&self.read_proc("diskstats")?)?;
        Ok(disks.iter().filter(|d| d.is_whole_disk()).count())
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [DiskSample]) -> Result<usize, SourceError> {
        let disks = parse_diskstats(&self.read_proc("diskstats")?)?;
        Ok(fill_from(
            out,
            disks.into_iter().filter(|d| d.is_whole_disk()).map(|d| {
                DiskSample::new(
                    d.device,
                    DiskCounters {
                        time: d.io_time,
                        rblks: d.read_sectors,
                        rserv: d.read_time * 1000,
                        rfers: d.reads,
                        wfers: d.writes,
                        wblks: d.write_sectors,
                        wserv: d.write_time * 1000,
                        wq_time: d.io_weighted_time,
                        wq_sampled: d.w_merged,
                        q_sampled: d.r_merged,
                        wq_depth: d.io_in_progress,
                    },
                )
            }),
        ))
    }
}

impl<F: FileSystem> Query<Filesystem> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        let mounts = parse_mounts(&self.read_proc("mounts")?);
        Ok(mounts.iter().filter(|m| m.is_reported()).count())
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [Filesystem]) -> Result<usize, SourceError> {
        let mounts = parse_mounts(&self.read_proc("mounts")?);
        let reported = mounts.into_iter().filter(|m| m.is_reported()).map(|m| {
            let (size_mb, free_pct) = match self.fs.statvfs(Path::new(&m.mount_point)) {
                Ok(usage) => (usage.size_mb(), usage.free_pct()),
                Err(e) => {
                    debug!("statvfs {} failed: {}", m.mount_point, e);
                    (0, 0)
                }
            };
            Filesystem {
                name: m.device.trim_start_matches('/').replace('/', "_"),
                remote: m.is_remote(),
                mount: m.mount_point,
                size_mb,
                free_pct,
            }
        });
        Ok(fill_from(out, reported))
    }
}

impl<F: FileSystem> Query<NfsCounters> for ProcfsSource<F> {
    fn probe(&mut self, filter: Option<&str>) -> Result<usize, SourceError> {
        protocol_of(filter)?;
        Ok(1)
    }

    fn fill(&mut self, filter: Option<&str>, out: &mut [NfsCounters]) -> Result<usize, SourceError> {
        let protocol = protocol_of(filter)?;
        let content = self.read_proc("net/rpc/nfs")?;
        let slot = require_slot(out)?;

        let ops = match protocol {
            NfsProtocol::V3 => parse_rpc_nfs(&content, 3)?,
            NfsProtocol::V4 => parse_rpc_nfs(&content, 4)?,
        }
        .unwrap_or_default();
        let op = |idx: usize| ops.get(idx).copied().unwrap_or(0);
        let calls = wrapping_sum(ops.iter().copied());

        *slot = match protocol {
            NfsProtocol::V3 => NfsCounters::V3(Nfs3Client {
                calls,
                null: op(0),
                getattr: op(1),
                setattr: op(2),
                lookup: op(3),
                access: op(4),
                read: op(6),
                write: op(7),
            }),
            NfsProtocol::V4 => NfsCounters::V4(Nfs4Client {
                operations: calls,
                null: op(0),
                read: op(1),
                write: op(2),
                setattr: op(9),
                lock: op(14).wrapping_add(op(15)),
                unlock: op(16),
                access: op(17),
                getattr: op(18),
                lookup: op(19),
            }),
        };
        Ok(1)
    }
}

impl<F: FileSystem> Query<NetSample> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        let devs = parse_net_dev(&self.read_proc("net/dev")?)?;
        Ok(devs.iter().filter(|d| d.interface != LOOPBACK).count())
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [NetSample]) -> Result<usize, SourceError> {
        let devs = parse_net_dev(&self.read_proc("net/dev")?)?;
        Ok(fill_from(
            out,
            devs.into_iter().filter(|d| d.interface != LOOPBACK).map(|d| {
                NetSample::new(
                    d.interface,
                    NetCounters {
                        ipackets: d.rx_packets,
                        ibytes: d.rx_bytes,
                        ierrors: d.rx_errs,
                        opackets: d.tx_packets,
                        obytes: d.tx_bytes,
                        oerrors: d.tx_errs,
                        collisions: d.tx_colls,
                        xmitdrops: d.tx_drop,
                        iqdrops: d.rx_drop,
                    },
                )
            }),
        ))
    }
}

impl<F: FileSystem> Query<FcSample> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        Ok(self.fc_hosts()?.len())
    }

    fn fill(&mut self, _filter: Option<&str>, out: &mut [FcSample]) -> Result<usize, SourceError> {
        let hosts = self.fc_hosts()?.to_vec();
        Ok(fill_from(
            out,
            hosts.into_iter().map(|host| {
                let counters = FcCounters {
                    tx_words: self.fc_counter(&host, "tx_words"),
                    rx_words: self.fc_counter(&host, "rx_words"),
                    error_frames: self.fc_counter(&host, "error_frames"),
                    dumped_frames: self.fc_counter(&host, "dumped_frames"),
                    link_failures: self.fc_counter(&host, "link_failure_count"),
                };
                FcSample::new(host, counters)
            }),
        ))
    }
}

impl<F: FileSystem> Query<ProcessSample> for ProcfsSource<F> {
    fn probe(&mut self, _filter: Option<&str>) -> Result<usize, SourceError> {
        Ok(self.pids()?.len())
    }

    /// Processes that exit between listing and reading are skipped.
    fn fill(&mut self, _filter: Option<&str>, out: &mut [ProcessSample]) -> Result<usize, SourceError> {
        let pids = self.pids()?;
        Ok(fill_from(
            out,
            pids.into_iter().filter_map(|pid| self.read_process(pid)),
        ))
    }
}

impl<F: FileSystem> MetricSource for ProcfsSource<F> {
    fn hostname(&mut self) -> Result<String, SourceError> {
        Ok(parse_hostname(&self.read_proc("sys/kernel/hostname")?)?)
    }
}
