//! Parsers for `/proc` and `/sys` files.
//!
//! These are pure functions over file content so they can be tested with
//! string inputs.

use thiserror::Error;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

// ============ /proc/[pid]/stat ============

/// Fields of `/proc/[pid]/stat` used for process tracking.
#[derive(Debug, Clone, Default)]
pub struct ProcStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    pub flags: u32,
    pub utime: u64,
    pub stime: u64,
    pub vsize: u64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The comm field can contain spaces and parentheses, so it is delimited by
/// the first `(` and the last `)`.
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;

    let comm = content[open_paren + 1..close_paren].to_string();

    // Field 0 is the state, right after the closing parenthesis.
    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();
    if fields.len() < 21 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 21+, got {}",
            fields.len()
        )));
    }

    let parse_field = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        flags: parse_field(6, "flags")? as u32,
        utime: parse_field(11, "utime")?,
        stime: parse_field(12, "stime")?,
        vsize: parse_field(20, "vsize")?,
    })
}

// ============ /proc/stat ============

/// Tick counters of one `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
}

/// Global stats from `/proc/stat`.
#[derive(Debug, Clone, Default)]
pub struct GlobalStat {
    /// The aggregate `cpu` line.
    pub total: CpuStat,
    /// `cpuN` lines in file order.
    pub cpus: Vec<CpuStat>,
    pub ctxt: u64,
    pub procs_blocked: u64,
}

/// Parses `/proc/stat` content.
pub fn parse_global_stat(content: &str) -> Result<GlobalStat, ParseError> {
    let mut stat = GlobalStat::default();
    let mut seen_total = false;

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        if parts[0].starts_with("cpu") {
            let get_val =
                |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

            let cpu = CpuStat {
                user: get_val(1),
                nice: get_val(2),
                system: get_val(3),
                idle: get_val(4),
                iowait: get_val(5),
            };
            if parts[0] == "cpu" {
                stat.total = cpu;
                seen_total = true;
            } else {
                stat.cpus.push(cpu);
            }
        } else if parts[0] == "ctxt" {
            stat.ctxt = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        } else if parts[0] == "procs_blocked" {
            stat.procs_blocked = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        }
    }

    if !seen_total {
        return Err(ParseError::new("missing aggregate cpu line in stat"));
    }
    Ok(stat)
}

/// Counts `cpuN` lines without building the full structure.
pub fn count_cpu_lines(content: &str) -> usize {
    content
        .lines()
        .filter(|l| {
            l.strip_prefix("cpu")
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .count()
}

// ============ /proc/loadavg ============

/// Parses the 1, 5 and 15 minute averages of `/proc/loadavg`.
pub fn parse_loadavg(content: &str) -> Result<[f64; 3], ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    let mut loads = [0.0; 3];
    for (slot, (raw, name)) in loads
        .iter_mut()
        .zip(parts.iter().zip(["load1", "load5", "load15"]))
    {
        *slot = raw
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))?;
    }
    Ok(loads)
}

// ============ /proc/cpuinfo ============

/// Processor count and clock from `/proc/cpuinfo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuInfo {
    pub processors: u32,
    /// Clock of the first processor reporting one, in MHz.
    pub mhz: u64,
}

pub fn parse_cpuinfo(content: &str) -> CpuInfo {
    let mut info = CpuInfo::default();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "processor" => info.processors += 1,
            "cpu MHz" if info.mhz == 0 => {
                info.mhz = value.trim().parse::<f64>().map(|v| v as u64).unwrap_or(0);
            }
            _ => {}
        }
    }

    info
}

// ============ /proc/meminfo ============

/// Parsed data from `/proc/meminfo`. All values in KiB except hugepage counts.
#[derive(Debug, Clone, Default)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub active: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub hugepages_total: u64,
    pub hugepages_free: u64,
    pub hugepage_size: u64,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();
    let mut seen_total = false;

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        let Some((key, _)) = line.split_once(':') else {
            continue;
        };
        match key {
            "MemTotal" => {
                info.mem_total = parse_kb(line);
                seen_total = true;
            }
            "MemFree" => info.mem_free = parse_kb(line),
            "Active" => info.active = parse_kb(line),
            "SwapTotal" => info.swap_total = parse_kb(line),
            "SwapFree" => info.swap_free = parse_kb(line),
            "HugePages_Total" => info.hugepages_total = parse_kb(line),
            "HugePages_Free" => info.hugepages_free = parse_kb(line),
            "Hugepagesize" => info.hugepage_size = parse_kb(line),
            _ => {}
        }
    }

    if !seen_total {
        return Err(ParseError::new("missing MemTotal in meminfo"));
    }
    Ok(info)
}

// ============ /proc/vmstat ============

/// Paging counters from `/proc/vmstat`.
#[derive(Debug, Clone, Default)]
pub struct VmstatInfo {
    pub pgpgin: u64,
    pub pgpgout: u64,
    pub pswpin: u64,
    pub pswpout: u64,
    pub pgfault: u64,
}

/// Parses `/proc/vmstat` content.
///
/// Format: key value (one per line)
pub fn parse_vmstat(content: &str) -> Result<VmstatInfo, ParseError> {
    let mut info = VmstatInfo::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let value: u64 = parts[1].parse().unwrap_or(0);
        match parts[0] {
            "pgpgin" => info.pgpgin = value,
            "pgpgout" => info.pgpgout = value,
            "pswpin" => info.pswpin = value,
            "pswpout" => info.pswpout = value,
            "pgfault" => info.pgfault = value,
            _ => {}
        }
    }

    Ok(info)
}

// ============ /proc/swaps ============

/// One line of `/proc/swaps`. Sizes in KiB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwapEntry {
    pub filename: String,
    pub kind: String,
    pub size_kb: u64,
    pub used_kb: u64,
}

/// Parses `/proc/swaps`, skipping the header line.
pub fn parse_swaps(content: &str) -> Vec<SwapEntry> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            Some(SwapEntry {
                filename: parts[0].to_string(),
                kind: parts[1].to_string(),
                size_kb: parts[2].parse().unwrap_or(0),
                used_kb: parts[3].parse().unwrap_or(0),
            })
        })
        .collect()
}

// ============ /proc/diskstats ============

/// Parsed data from `/proc/diskstats`.
#[derive(Debug, Clone, Default)]
pub struct DiskStats {
    /// Block device major number.
    pub major: u32,
    /// Block device minor number.
    pub minor: u32,
    /// Device name (sda, nvme0n1, etc.)
    pub device: String,
    /// Number of reads completed
    pub reads: u64,
    /// Number of read requests merged
    pub r_merged: u64,
    /// Number of sectors read
    pub read_sectors: u64,
    /// Time spent reading (ms)
    pub read_time: u64,
    /// Number of writes completed
    pub writes: u64,
    /// Number of write requests merged
    pub w_merged: u64,
    /// Number of sectors written
    pub write_sectors: u64,
    /// Time spent writing (ms)
    pub write_time: u64,
    /// Number of I/Os currently in progress
    pub io_in_progress: u64,
    /// Time spent doing I/Os (ms)
    pub io_time: u64,
    /// Weighted time spent doing I/Os (ms)
    pub io_weighted_time: u64,
}

impl DiskStats {
    /// Whole SCSI disks, device-mapper volumes and NVMe namespaces.
    /// Partitions are skipped.
    pub fn is_whole_disk(&self) -> bool {
        match self.major {
            8 => self.minor % 16 == 0,
            253 => true,
            259 => self.device.starts_with("nvme") && !self.device.contains('p'),
            _ => false,
        }
    }
}

/// Parses `/proc/diskstats` content.
///
/// Format: major minor name reads r_merged r_sectors r_time writes w_merged w_sectors w_time io_pending io_time w_io_time [discards ...]
pub fn parse_diskstats(content: &str) -> Result<Vec<DiskStats>, ParseError> {
    let mut disks = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue; // Skip malformed lines
        }

        let major: u32 = parts[0].parse().unwrap_or(0);
        let minor: u32 = parts[1].parse().unwrap_or(0);

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        disks.push(DiskStats {
            major,
            minor,
            device: parts[2].to_string(),
            reads: get_val(3),
            r_merged: get_val(4),
            read_sectors: get_val(5),
            read_time: get_val(6),
            writes: get_val(7),
            w_merged: get_val(8),
            write_sectors: get_val(9),
            write_time: get_val(10),
            io_in_progress: get_val(11),
            io_time: get_val(12),
            io_weighted_time: get_val(13),
        });
    }

    Ok(disks)
}

// ============ /proc/net/dev ============

/// Parsed data from `/proc/net/dev`.
#[derive(Debug, Clone, Default)]
pub struct NetDevStats {
    /// Interface name (eth0, lo, etc.)
    pub interface: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errs: u64,
    pub rx_drop: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errs: u64,
    pub tx_drop: u64,
    pub tx_colls: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<&str> = counters.split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface: name.trim().to_string(),
            rx_bytes: get_val(0),
            rx_packets: get_val(1),
            rx_errs: get_val(2),
            rx_drop: get_val(3),
            tx_bytes: get_val(8),
            tx_packets: get_val(9),
            tx_errs: get_val(10),
            tx_drop: get_val(11),
            tx_colls: get_val(13),
        });
    }

    Ok(devices)
}

// ============ /proc/net/rpc/nfs ============

/// Per-operation counters of one `procN` line of `/proc/net/rpc/nfs`.
///
/// The line is `procN <count> <op0> <op1> ...`; the declared count is checked
/// against the values present. Returns `None` when the version has no line.
pub fn parse_rpc_nfs(content: &str, version: u8) -> Result<Option<Vec<u64>>, ParseError> {
    let key = format!("proc{}", version);

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some(key.as_str()) {
            continue;
        }

        let declared: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ParseError::new(format!("missing op count in {}", key)))?;
        let ops = parts
            .map(|s| {
                s.parse()
                    .map_err(|_| ParseError::new(format!("invalid counter in {}", key)))
            })
            .collect::<Result<Vec<u64>, _>>()?;
        if ops.len() != declared {
            return Err(ParseError::new(format!(
                "{} declares {} ops, found {}",
                key,
                declared,
                ops.len()
            )));
        }
        return Ok(Some(ops));
    }

    Ok(None)
}

// ============ /proc/mounts ============

/// One line of `/proc/mounts`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

impl MountEntry {
    /// Local ext/xfs filesystems and NFS mounts.
    pub fn is_reported(&self) -> bool {
        ["ext", "nfs", "xfs"]
            .iter()
            .any(|prefix| self.fs_type.starts_with(prefix))
    }

    pub fn is_remote(&self) -> bool {
        self.fs_type.starts_with("nfs")
    }
}

/// Parses `/proc/mounts`. Octal escapes (`\040` for space) are decoded.
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mount_point = parts.next()?;
            let fs_type = parts.next()?;
            Some(MountEntry {
                device: unescape_mount_field(device),
                mount_point: unescape_mount_field(mount_point),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && let Some(code) = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|oct| u8::from_str_radix(oct, 8).ok())
        {
            out.push(code);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============ /sys/class/fc_host ============

/// Parses a hexadecimal fibre-channel statistics counter (`0x1a2b`).
pub fn parse_fc_counter(content: &str) -> Result<u64, ParseError> {
    let raw = content.trim();
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|_| ParseError::new(format!("invalid fc counter {:?}", raw)))
}

// ============ /proc/sys/kernel/hostname ============

/// Short host name: the content up to the first dot.
pub fn parse_hostname(content: &str) -> Result<String, ParseError> {
    let name = content.trim().split('.').next().unwrap_or("");
    if name.is_empty() {
        return Err(ParseError::new("empty hostname"));
    }
    Ok(name.to_string())
}
