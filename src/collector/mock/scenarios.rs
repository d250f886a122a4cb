//! Pre-built mock filesystem scenarios for testing.
//!
//! `typical_system` is a small two-CPU host with one disk, one NFS mount, one
//! network interface and one fibre-channel adapter. `typical_system_next` is
//! the same host one second later, so a pair of polls yields known deltas.

use super::filesystem::MockFs;
use crate::collector::traits::FsUsage;

/// Formats a `/proc/[pid]/stat` line with the fields the sources read.
pub fn proc_stat_line(
    pid: u32,
    comm: &str,
    state: char,
    flags: u32,
    utime: u64,
    stime: u64,
    vsize: u64,
) -> String {
    format!(
        "{pid} ({comm}) {state} 1 {pid} {pid} 0 -1 {flags} 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 100 {vsize} 100 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0"
    )
}

/// `PF_KTHREAD` plus the usual kernel thread flags.
const KTHREAD_FLAGS: u32 = 0x0020_8040;
const USER_FLAGS: u32 = 0x0040_0100;

impl MockFs {
    /// Creates a typical system with a few processes.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();
        fs.add_static_files();

        fs.add_file(
            "/proc/stat",
            "\
cpu  100 0 50 800 50 0 0 0 0 0
cpu0 60 0 30 400 20 0 0 0 0 0
cpu1 40 0 20 400 30 0 0 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 1
",
        );
        fs.add_file(
            "/proc/vmstat",
            "\
nr_free_pages 2048000
pgpgin 1000
pgpgout 2000
pswpin 10
pswpout 20
pgfault 50000
pgmajfault 100
",
        );
        fs.add_file(
            "/proc/diskstats",
            "\
   8       0 sda 1000 10 8000 500 2000 20 16000 1000 2 1500 3000 0 0 0 0
   8       1 sda1 900 5 7000 400 1900 10 15000 900 0 1400 2800 0 0 0 0
 253       0 dm-0 300 0 2400 100 600 0 4800 300 0 350 400 0 0 0 0
",
        );
        fs.add_file(
            "/proc/net/rpc/nfs",
            "\
net 0 0 0 0
rpc 500 0 0
proc3 22 0 100 10 50 40 0 200 100 0 0 0 0 0 0 0 0 0 0 0 0 0 0
proc4 20 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
",
        );
        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:   50000      500    0    0    0     0          0         0    50000      500    0    0    0     0       0          0
  eth0: 1000000     1000    1    2    0     0          0         0   500000      800    0    1    0     3       0          0
",
        );
        fs.add_fc_host("host0", 0x1000, 0x2000, 1, 2, 0);

        fs.add_process(1, &proc_stat_line(1, "systemd", 'S', USER_FLAGS, 100, 50, 180_000_000));
        fs.add_process(2, &proc_stat_line(2, "kthreadd", 'S', KTHREAD_FLAGS, 0, 900, 0));
        fs.add_process(1000, &proc_stat_line(1000, "bash", 'S', USER_FLAGS, 10, 5, 25_000_000));
        fs.add_process(
            1001,
            &proc_stat_line(1001, "postgres", 'R', USER_FLAGS, 1000, 400, 2_000_000_000),
        );
        fs.add_process(1002, &proc_stat_line(1002, "defunct", 'Z', USER_FLAGS, 5, 5, 0));

        fs
    }

    /// The typical system one second later.
    ///
    /// Counters have advanced, zombie 1002 was reaped and `cron` (1003) started.
    pub fn typical_system_next() -> Self {
        let mut fs = Self::new();
        fs.add_static_files();

        fs.add_file(
            "/proc/stat",
            "\
cpu  150 0 70 1000 60 0 0 0 0 0
cpu0 90 0 40 500 25 0 0 0 0 0
cpu1 60 0 30 500 35 0 0 0 0 0
intr 1000400 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500400
btime 1700000000
processes 10001
procs_running 1
procs_blocked 2
",
        );
        fs.add_file(
            "/proc/vmstat",
            "\
nr_free_pages 2047000
pgpgin 1100
pgpgout 2300
pswpin 12
pswpout 20
pgfault 50800
pgmajfault 101
",
        );
        fs.add_file(
            "/proc/diskstats",
            "\
   8       0 sda 1100 15 8800 700 2200 30 17600 1400 1 1800 3600 0 0 0 0
   8       1 sda1 990 8 7700 560 2090 16 16500 1200 0 1650 3300 0 0 0 0
 253       0 dm-0 300 0 2400 100 600 0 4800 300 0 350 400 0 0 0 0
",
        );
        fs.add_file(
            "/proc/net/rpc/nfs",
            "\
net 0 0 0 0
rpc 800 0 0
proc3 22 0 150 20 70 60 0 300 200 0 0 0 0 0 0 0 0 0 0 0 0 0 0
proc4 20 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
",
        );
        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:   60000      600    0    0    0     0          0         0    60000      600    0    0    0     0       0          0
  eth0: 1100000     1100    1    2    0     0          0         0   550000      850    0    1    0     3       0          0
",
        );
        fs.add_fc_host("host0", 0x1400, 0x2800, 2, 2, 0);

        fs.add_process(1, &proc_stat_line(1, "systemd", 'S', USER_FLAGS, 101, 50, 180_000_000));
        fs.add_process(2, &proc_stat_line(2, "kthreadd", 'S', KTHREAD_FLAGS, 0, 950, 0));
        fs.add_process(1000, &proc_stat_line(1000, "bash", 'S', USER_FLAGS, 12, 5, 25_000_000));
        fs.add_process(
            1001,
            &proc_stat_line(1001, "postgres", 'R', USER_FLAGS, 1050, 410, 2_000_000_000),
        );
        fs.add_process(1003, &proc_stat_line(1003, "cron", 'S', USER_FLAGS, 3, 1, 9_000_000));

        fs
    }

    /// Adds one fibre-channel host with its statistics files.
    pub fn add_fc_host(
        &mut self,
        host: &str,
        rx_words: u64,
        tx_words: u64,
        error_frames: u64,
        dumped_frames: u64,
        link_failures: u64,
    ) {
        let base = format!("/sys/class/fc_host/{}/statistics", host);
        self.add_file(format!("{}/rx_words", base), format!("0x{:x}\n", rx_words));
        self.add_file(format!("{}/tx_words", base), format!("0x{:x}\n", tx_words));
        self.add_file(format!("{}/error_frames", base), format!("0x{:x}\n", error_frames));
        self.add_file(format!("{}/dumped_frames", base), format!("0x{:x}\n", dumped_frames));
        self.add_file(
            format!("{}/link_failure_count", base),
            format!("0x{:x}\n", link_failures),
        );
    }

    /// Files whose content does not change between the two polls.
    fn add_static_files(&mut self) {
        self.add_file("/proc/sys/kernel/hostname", "web01.example.com\n");
        self.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        self.add_file(
            "/proc/cpuinfo",
            "\
processor\t: 0
model name\t: Example CPU
cpu MHz\t\t: 2400.000

processor\t: 1
model name\t: Example CPU
cpu MHz\t\t: 2400.000
",
        );
        self.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        3072000 kB
HugePages_Total:      16
HugePages_Free:        4
Hugepagesize:       2048 kB
",
        );
        self.add_file(
            "/proc/swaps",
            "\
Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority
/dev/dm-1                               partition\t4096000\t\t1024000\t\t-2
",
        );
        self.add_file(
            "/proc/mounts",
            "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev 0 0
filer:/export /mnt/nfs nfs4 rw,relatime 0 0
",
        );
        self.set_usage(
            "/",
            FsUsage {
                fragment_size: 4096,
                blocks: 2_621_440,
                blocks_free: 655_360,
            },
        );
        self.set_usage(
            "/mnt/nfs",
            FsUsage {
                fragment_size: 1_048_576,
                blocks: 500,
                blocks_free: 450,
            },
        );
    }
}
