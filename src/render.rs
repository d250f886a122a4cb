//! JSON section writers.
//!
//! Every section is written as `"name":{...},`: the trailing comma lets the
//! document trailer (`"server"`, `"timestamp"`) follow any mix of sections.
//! Rates are per second over an interval of `2^shift` seconds; percentages
//! are computed against a [`safe_divisor`] so idle intervals print `0.0`.

use std::fmt::{self, Write};

use crate::buffer::OutputBuffer;
use crate::delta::{per_second, percent, safe_divisor, wrapping_delta, wrapping_sum};
use crate::model::{
    CpuTicks, CpuTotal, DiskCounters, DiskSample, FcCounters, FcSample, Filesystem, MemoryTotal,
    NetCounters, NetSample, NfsCounters, NfsProtocol, PagingSpace,
};
use crate::process::{ProcessRecord, TopProcesses};

/// Appends `text` as a JSON string literal.
fn write_quoted(out: &mut OutputBuffer, text: &str) -> fmt::Result {
    let quoted = serde_json::to_string(text).map_err(|_| fmt::Error)?;
    out.append(&quoted)
}

// ---------------------------------------------------------------------------
// Document framing
// ---------------------------------------------------------------------------

/// Starts a new document, discarding the previous content.
pub fn begin_document(out: &mut OutputBuffer) -> fmt::Result {
    out.assign("{")
}

/// Closes the document with the host name and cycle timestamp.
pub fn end_document(
    out: &mut OutputBuffer,
    server: &str,
    timestamp: i64,
    separator: &str,
) -> fmt::Result {
    out.append("\"server\":")?;
    write_quoted(out, server)?;
    writeln!(out, ",\"timestamp\":{}}}{}", timestamp, separator)
}

// ---------------------------------------------------------------------------
// Keyed sections
// ---------------------------------------------------------------------------

/// A section whose entries are keyed objects, e.g. `"disks":{"sda":{..},..}`.
pub struct Section<'a> {
    out: &'a mut OutputBuffer,
    entries: usize,
}

impl<'a> Section<'a> {
    pub fn open(out: &'a mut OutputBuffer, name: &str) -> Result<Self, fmt::Error> {
        write!(out, "\"{}\":{{", name)?;
        Ok(Self { out, entries: 0 })
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Closes the section and appends the section separator.
    pub fn close(self) -> fmt::Result {
        self.out.append("},")
    }

    /// Closes the section without a separator, for the last nested section.
    fn close_inner(self) -> fmt::Result {
        self.out.append("}")
    }

    fn begin_entry(&mut self, key: &str) -> fmt::Result {
        if self.entries > 0 {
            self.out.append(",")?;
        }
        self.entries += 1;
        write_quoted(self.out, key)?;
        self.out.append(":{")
    }

    /// One logical CPU, keyed by its index.
    pub fn cpu(&mut self, index: usize, curr: &CpuTicks, prev: &CpuTicks) -> fmt::Result {
        let user = wrapping_delta(curr.user, prev.user);
        let sys = wrapping_delta(curr.sys, prev.sys);
        let idle = wrapping_delta(curr.idle, prev.idle);
        let wait = wrapping_delta(curr.wait, prev.wait);
        let total = wrapping_sum([user, sys, idle, wait]);

        self.begin_entry(&index.to_string())?;
        write!(
            self.out,
            "\"user_pct\":{:.1},\"sys_pct\":{:.1},\"wait_pct\":{:.1},\"idle_pct\":{:.1}}}",
            percent(user, total),
            percent(sys, total),
            percent(wait, total),
            percent(idle, total),
        )
    }

    pub fn paging_space(&mut self, space: &PagingSpace) -> fmt::Result {
        self.begin_entry(&space.name)?;
        write!(
            self.out,
            "\"type\":\"{}\",\"size_mb\":{},\"used_pct\":{:.1}}}",
            space.kind.label(),
            space.mb_size,
            percent(space.mb_used, space.mb_size),
        )
    }

    pub fn disk(&mut self, curr: &DiskSample, prev: &DiskCounters, shift: u32) -> fmt::Result {
        let c = &curr.counters;
        let d = |f: fn(&DiskCounters) -> u64| wrapping_delta(f(c), f(prev));
        let rfers = d(|x| x.rfers);
        let wfers = d(|x| x.wfers);

        self.begin_entry(&curr.identity)?;
        write!(
            self.out,
            "\"busy_pct\":{},\
             \"read\":{{\"blocks_s\":{},\"time_avg_us\":{}}},\
             \"write\":{{\"blocks_s\":{},\"time_avg_us\":{}}},\
             \"queue\":{{\"time_avg_us\":{},\"write_len_avg\":{},\"read_len_avg\":{},\"wq_depth\":{}}}}}",
            per_second(d(|x| x.time), shift),
            per_second(d(|x| x.rblks), shift),
            d(|x| x.rserv) / safe_divisor(rfers),
            per_second(d(|x| x.wblks), shift),
            d(|x| x.wserv) / safe_divisor(wfers),
            d(|x| x.wq_time) / safe_divisor(wfers.wrapping_add(rfers)),
            per_second(d(|x| x.wq_sampled), shift),
            per_second(d(|x| x.q_sampled), shift),
            c.wq_depth,
        )
    }

    pub fn filesystem(&mut self, fs: &Filesystem) -> fmt::Result {
        self.begin_entry(&fs.name)?;
        self.out.append("\"mount\":")?;
        write_quoted(self.out, &fs.mount)?;
        write!(
            self.out,
            ",\"type\":\"{}\",\"size_mb\":{},\"free_pct\":{}}}",
            if fs.remote { "NFS" } else { "LUN" },
            fs.size_mb,
            fs.free_pct,
        )
    }

    pub fn interface(&mut self, curr: &NetSample, prev: &NetCounters, shift: u32) -> fmt::Result {
        let c = &curr.counters;
        let rate = |f: fn(&NetCounters) -> u64| per_second(wrapping_delta(f(c), f(prev)), shift);

        self.begin_entry(&curr.identity)?;
        write!(
            self.out,
            "\"in\":{{\"packets_s\":{},\"errors\":{},\"bytes_s\":{}}},\
             \"out\":{{\"packets_s\":{},\"errors\":{},\"bytes_s\":{}}},\
             \"collisions\":{},\"drops\":{}}}",
            rate(|x| x.ipackets),
            c.ierrors,
            rate(|x| x.ibytes),
            rate(|x| x.opackets),
            c.oerrors,
            rate(|x| x.obytes),
            c.collisions,
            c.xmitdrops.wrapping_add(c.iqdrops),
        )
    }

    pub fn fc_adapter(&mut self, curr: &FcSample, prev: &FcCounters, shift: u32) -> fmt::Result {
        let c = &curr.counters;
        let rate = |f: fn(&FcCounters) -> u64| per_second(wrapping_delta(f(c), f(prev)), shift);

        self.begin_entry(&curr.identity)?;
        write!(
            self.out,
            "\"rx_kb_s\":{},\"tx_kb_s\":{},\
             \"err_frm_s\":{},\"err_frm_tot\":{},\
             \"lost_frm_s\":{},\"lost_frm_tot\":{},\
             \"link_fail_s\":{},\"link_fail_tot\":{}}}",
            rate(|x| x.rx_words),
            rate(|x| x.tx_words),
            rate(|x| x.error_frames),
            c.error_frames,
            rate(|x| x.dumped_frames),
            c.dumped_frames,
            rate(|x| x.link_failures),
            c.link_failures,
        )
    }

    fn process(&mut self, rank: usize, record: &ProcessRecord) -> fmt::Result {
        self.begin_entry(&rank.to_string())?;
        write!(self.out, "\"pid\":{},\"process\":", record.pid)?;
        write_quoted(self.out, &record.name)
    }
}

// ---------------------------------------------------------------------------
// Total sections
// ---------------------------------------------------------------------------

pub fn cpu_total(out: &mut OutputBuffer, curr: &CpuTotal, prev: &CpuTotal, shift: u32) -> fmt::Result {
    let user = wrapping_delta(curr.puser, prev.puser);
    let sys = wrapping_delta(curr.psys, prev.psys);
    let idle = wrapping_delta(curr.pidle, prev.pidle);
    let wait = wrapping_delta(curr.pwait, prev.pwait);
    let total = wrapping_sum([user, sys, idle, wait]);

    write!(
        out,
        "\"cpu_total\":{{\"active\":{},\"processorMHZ\":{},\"run_queue_s\":{},\"context_switch_s\":{},\
         \"physique\":{{\"user_pct\":{:.1},\"sys_pct\":{:.1},\"wait_pct\":{:.1},\"idle_pct\":{:.1}}},\
         \"load_average\":{{\"T0\":{:.1},\"T5\":{:.1},\"T15\":{:.1}}}}},",
        curr.ncpus,
        curr.processor_hz / 1_000_000,
        wrapping_delta(curr.runque, prev.runque),
        per_second(wrapping_delta(curr.pswitch, prev.pswitch), shift),
        percent(user, total),
        percent(sys, total),
        percent(wait, total),
        percent(idle, total),
        curr.loadavg[0],
        curr.loadavg[1],
        curr.loadavg[2],
    )
}

pub fn memory(out: &mut OutputBuffer, curr: &MemoryTotal, prev: &MemoryTotal, shift: u32) -> fmt::Result {
    let rate = |f: fn(&MemoryTotal) -> u64| per_second(wrapping_delta(f(curr), f(prev)), shift);
    let free_pct = curr.pgsp_free.saturating_mul(100) / safe_divisor(curr.pgsp_total);

    write!(
        out,
        "\"memory\":{{\"virt_total\":{},\"real_total\":{},\"real_free\":{},\"virt_active_pg\":{},\
         \"pgins_s\":{},\"pgouts_s\":{},\"pgspins_s\":{},\"pgspouts_s\":{},\
         \"hugepage\":{{\"size_kb\":{},\"total\":{},\"free\":{}}},\
         \"paging\":{{\"total\":{},\"used_pct\":{},\"faults_s\":{}}}}},",
        curr.virt_total >> 10,
        curr.real_total >> 10,
        curr.real_free >> 10,
        curr.virt_active,
        rate(|m| m.pgins),
        rate(|m| m.pgouts),
        rate(|m| m.pgspins),
        rate(|m| m.pgspouts),
        curr.huge_size,
        curr.huge_total,
        curr.huge_free,
        curr.pgsp_total,
        100u64.saturating_sub(free_pct),
        rate(|m| m.pgexct),
    )
}

/// Protocol counters that stayed at zero: a single zero rate.
pub fn nfs_idle(out: &mut OutputBuffer, protocol: NfsProtocol) -> fmt::Result {
    write!(out, "\"{}\":{{\"calls_s\":0}},", protocol.name())
}

/// Operation mix of one NFS protocol. `prev` of another version counts as zero.
pub fn nfs(out: &mut OutputBuffer, curr: &NfsCounters, prev: &NfsCounters, shift: u32) -> fmt::Result {
    let empty = curr.protocol().empty();
    let prev = if prev.protocol() == curr.protocol() {
        prev
    } else {
        &empty
    };

    match (curr, prev) {
        (NfsCounters::V3(c), NfsCounters::V3(p)) => {
            let total = wrapping_delta(c.calls, p.calls);
            write!(
                out,
                "\"nfsv3\":{{\"calls_s\":{},\"access_pct\":{:.1},\"read_pct\":{:.1},\"write_pct\":{:.1},\
                 \"lookup_pct\":{:.1},\"attrGetSet_pct\":{:.1}}},",
                per_second(total, shift),
                percent(wrapping_delta(c.access, p.access), total),
                percent(wrapping_delta(c.read, p.read), total),
                percent(wrapping_delta(c.write, p.write), total),
                percent(wrapping_delta(c.lookup, p.lookup), total),
                percent(
                    wrapping_delta(c.getattr, p.getattr)
                        .wrapping_add(wrapping_delta(c.setattr, p.setattr)),
                    total
                ),
            )
        }
        (NfsCounters::V4(c), NfsCounters::V4(p)) => {
            let total = wrapping_delta(c.operations, p.operations);
            write!(
                out,
                "\"nfsv4\":{{\"calls_s\":{},\"access_pct\":{:.1},\"read_pct\":{:.1},\"write_pct\":{:.1},\
                 \"lookup_pct\":{:.1},\"attr_get_get_pct\":{:.1},\"lock_unlock_pct\":{:.1}}},",
                per_second(total, shift),
                percent(wrapping_delta(c.access, p.access), total),
                percent(wrapping_delta(c.read, p.read), total),
                percent(wrapping_delta(c.write, p.write), total),
                percent(wrapping_delta(c.lookup, p.lookup), total),
                percent(
                    wrapping_delta(c.getattr, p.getattr)
                        .wrapping_add(wrapping_delta(c.setattr, p.setattr)),
                    total
                ),
                percent(
                    wrapping_delta(c.lock, p.lock)
                        .wrapping_add(wrapping_delta(c.unlock, p.unlock)),
                    total
                ),
            )
        }
        _ => Err(fmt::Error),
    }
}

/// Top consumers by CPU and by memory.
pub fn processes(out: &mut OutputBuffer, top: &TopProcesses<'_>, shift: u32) -> fmt::Result {
    out.append("\"processes\":{")?;

    let mut cpu = Section::open(out, "cpu")?;
    for (rank, record) in top.cpu.iter().enumerate() {
        cpu.process(rank, record)?;
        write!(
            cpu.out,
            ",\"cpu_pct\":{:.1},\"mem_mb\":{}}}",
            per_second(record.cpu_delta, shift) as f64 / 10.0,
            record.memory_mb(),
        )?;
    }
    cpu.close()?;

    let mut mem = Section::open(out, "mem")?;
    for (rank, record) in top.memory.iter().enumerate() {
        mem.process(rank, record)?;
        write!(mem.out, ",\"mem_mb\":{}}}", record.memory_mb())?;
    }
    mem.close_inner()?;

    out.append("},")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Nfs3Client, Nfs4Client, PagingKind, ProcessSample};
    use crate::process::ProcessTable;
    use serde_json::Value;

    /// Wraps rendered sections in a document and parses it.
    fn parse(out: &mut OutputBuffer) -> Value {
        end_document(out, "host", 1_700_000_000, "").unwrap();
        serde_json::from_str(out.as_str()).unwrap()
    }

    fn document() -> OutputBuffer {
        let mut out = OutputBuffer::with_capacity(256);
        begin_document(&mut out).unwrap();
        out
    }

    #[test]
    fn test_empty_document() {
        let mut out = document();
        let doc = parse(&mut out);
        assert_eq!(doc["server"], "host");
        assert_eq!(doc["timestamp"], 1_700_000_000);
        assert!(out.as_str().ends_with("}\n"));
    }

    #[test]
    fn test_document_separator() {
        let mut out = document();
        end_document(&mut out, "h", 5, "\n").unwrap();
        assert_eq!(out.as_str(), "{\"server\":\"h\",\"timestamp\":5}\n\n");
    }

    #[test]
    fn test_cpu_total_percentages() {
        let prev = CpuTotal {
            ncpus: 2,
            processor_hz: 2_400_000_000,
            pswitch: 1000,
            puser: 100,
            psys: 50,
            pidle: 800,
            pwait: 50,
            ..Default::default()
        };
        let curr = CpuTotal {
            pswitch: 1400,
            runque: 3,
            loadavg: [1.5, 1.0, 0.5],
            puser: 150,
            psys: 70,
            pidle: 1000,
            pwait: 60,
            ..prev.clone()
        };

        let mut out = document();
        cpu_total(&mut out, &curr, &prev, 0).unwrap();
        let doc = parse(&mut out);
        let cpu = &doc["cpu_total"];

        assert_eq!(cpu["active"], 2);
        assert_eq!(cpu["processorMHZ"], 2400);
        assert_eq!(cpu["run_queue_s"], 3);
        assert_eq!(cpu["context_switch_s"], 400);
        assert_eq!(cpu["physique"]["user_pct"], 17.9);
        assert_eq!(cpu["physique"]["sys_pct"], 7.1);
        assert_eq!(cpu["physique"]["wait_pct"], 3.6);
        assert_eq!(cpu["physique"]["idle_pct"], 71.4);
        assert_eq!(cpu["load_average"]["T0"], 1.5);
    }

    #[test]
    fn test_cpu_total_iowait_going_backwards() {
        let prev = CpuTotal {
            puser: 100,
            psys: 50,
            pidle: 800,
            pwait: 60,
            runque: 4,
            ..Default::default()
        };
        let curr = CpuTotal {
            puser: 150,
            psys: 70,
            pidle: 1000,
            pwait: 50,
            runque: 4,
            ..Default::default()
        };

        let mut out = document();
        cpu_total(&mut out, &curr, &prev, 0).unwrap();
        let doc = parse(&mut out);
        let physique = &doc["cpu_total"]["physique"];

        // total is 50 + 20 + 200 - 10
        assert_eq!(physique["user_pct"], 19.3);
        assert_eq!(physique["sys_pct"], 7.7);
        assert_eq!(physique["idle_pct"], 77.2);
        assert_eq!(doc["cpu_total"]["run_queue_s"], 0);
    }

    #[test]
    fn test_cpu_total_idle_interval() {
        let reading = CpuTotal {
            puser: 10,
            pidle: 10,
            ..Default::default()
        };
        let mut out = document();
        cpu_total(&mut out, &reading, &reading, 0).unwrap();
        let doc = parse(&mut out);
        assert_eq!(doc["cpu_total"]["physique"]["idle_pct"], 0.0);
    }

    #[test]
    fn test_cpus_section() {
        let prev = CpuTicks {
            user: 60,
            sys: 30,
            idle: 400,
            wait: 20,
        };
        let curr = CpuTicks {
            user: 90,
            sys: 40,
            idle: 500,
            wait: 25,
        };

        let mut out = document();
        let mut section = Section::open(&mut out, "cpus").unwrap();
        section.cpu(0, &curr, &prev).unwrap();
        section.cpu(1, &curr, &curr).unwrap();
        assert_eq!(section.len(), 2);
        section.close().unwrap();

        let doc = parse(&mut out);
        assert_eq!(doc["cpus"]["0"]["user_pct"], 20.7);
        assert_eq!(doc["cpus"]["0"]["idle_pct"], 69.0);
        assert_eq!(doc["cpus"]["1"]["user_pct"], 0.0);
    }

    #[test]
    fn test_cpus_wait_going_backwards() {
        let prev = CpuTicks {
            user: 60,
            sys: 30,
            idle: 400,
            wait: 30,
        };
        let curr = CpuTicks {
            user: 90,
            sys: 40,
            idle: 500,
            wait: 25,
        };

        let mut out = document();
        let mut section = Section::open(&mut out, "cpus").unwrap();
        section.cpu(0, &curr, &prev).unwrap();
        section.close().unwrap();

        let doc = parse(&mut out);
        // total is 30 + 10 + 100 - 5
        assert_eq!(doc["cpus"]["0"]["user_pct"], 22.2);
        assert_eq!(doc["cpus"]["0"]["idle_pct"], 74.1);
    }

    #[test]
    fn test_memory_section() {
        let prev = MemoryTotal {
            pgins: 1000,
            pgexct: 50000,
            ..Default::default()
        };
        let curr = MemoryTotal {
            virt_total: 20480000,
            real_total: 16384000,
            real_free: 8192000,
            virt_active: 4096000,
            pgins: 1100,
            pgexct: 50800,
            huge_size: 2048,
            huge_total: 16,
            huge_free: 4,
            pgsp_total: 4096000,
            pgsp_free: 3072000,
            ..Default::default()
        };

        let mut out = document();
        memory(&mut out, &curr, &prev, 1).unwrap();
        let doc = parse(&mut out);
        let mem = &doc["memory"];

        assert_eq!(mem["virt_total"], 20000);
        assert_eq!(mem["real_total"], 16000);
        assert_eq!(mem["real_free"], 8000);
        assert_eq!(mem["virt_active_pg"], 4096000);
        assert_eq!(mem["pgins_s"], 50);
        assert_eq!(mem["hugepage"]["total"], 16);
        assert_eq!(mem["paging"]["total"], 4096000);
        assert_eq!(mem["paging"]["used_pct"], 25);
        assert_eq!(mem["paging"]["faults_s"], 400);
    }

    #[test]
    fn test_memory_without_swap() {
        let mem = MemoryTotal::default();
        let mut out = document();
        memory(&mut out, &mem, &mem, 0).unwrap();
        let doc = parse(&mut out);
        assert_eq!(doc["memory"]["paging"]["used_pct"], 100);
    }

    #[test]
    fn test_paging_space_zero_size() {
        let mut out = document();
        let mut section = Section::open(&mut out, "pagingspaces").unwrap();
        section
            .paging_space(&PagingSpace {
                name: "/dev/dm-1".to_string(),
                kind: PagingKind::LogicalVolume,
                mb_size: 0,
                mb_used: 0,
            })
            .unwrap();
        section.close().unwrap();

        let doc = parse(&mut out);
        let space = &doc["pagingspaces"]["/dev/dm-1"];
        assert_eq!(space["type"], "LV");
        assert_eq!(space["used_pct"], 0.0);
    }

    #[test]
    fn test_disk_entry() {
        let prev = DiskCounters {
            time: 1500,
            rblks: 8000,
            rserv: 500_000,
            rfers: 1000,
            wfers: 2000,
            wblks: 16000,
            wserv: 1_000_000,
            wq_time: 3000,
            wq_sampled: 20,
            q_sampled: 10,
            wq_depth: 2,
        };
        let curr = DiskSample::new(
            "sda",
            DiskCounters {
                time: 1800,
                rblks: 8800,
                rserv: 700_000,
                rfers: 1100,
                wfers: 2200,
                wblks: 17600,
                wserv: 1_400_000,
                wq_time: 3600,
                wq_sampled: 30,
                q_sampled: 15,
                wq_depth: 1,
            },
        );

        let mut out = document();
        let mut section = Section::open(&mut out, "disks").unwrap();
        section.disk(&curr, &prev, 0).unwrap();
        section.close().unwrap();

        let doc = parse(&mut out);
        let sda = &doc["disks"]["sda"];
        assert_eq!(sda["busy_pct"], 300);
        assert_eq!(sda["read"]["blocks_s"], 800);
        assert_eq!(sda["read"]["time_avg_us"], 2000);
        assert_eq!(sda["write"]["time_avg_us"], 2000);
        assert_eq!(sda["queue"]["time_avg_us"], 2);
        assert_eq!(sda["queue"]["write_len_avg"], 10);
        assert_eq!(sda["queue"]["read_len_avg"], 5);
        assert_eq!(sda["queue"]["wq_depth"], 1);
    }

    #[test]
    fn test_disk_transfers_going_backwards() {
        let prev = DiskCounters {
            rfers: 1100,
            wfers: 2000,
            rserv: 500_000,
            wq_time: 3000,
            ..Default::default()
        };
        let curr = DiskSample::new(
            "sdb",
            DiskCounters {
                rfers: 1000,
                wfers: 2200,
                rserv: 700_000,
                wq_time: 3600,
                ..Default::default()
            },
        );

        let mut out = document();
        let mut section = Section::open(&mut out, "disks").unwrap();
        section.disk(&curr, &prev, 0).unwrap();
        section.close().unwrap();

        let doc = parse(&mut out);
        let sdb = &doc["disks"]["sdb"];
        // transfers total is 200 - 100
        assert_eq!(sdb["queue"]["time_avg_us"], 6);
        assert_eq!(sdb["read"]["time_avg_us"], 0);
    }

    #[test]
    fn test_filesystem_entry_escapes_strings() {
        let mut out = document();
        let mut section = Section::open(&mut out, "fs").unwrap();
        section
            .filesystem(&Filesystem {
                name: "odd\"name".to_string(),
                mount: "/mnt/with space".to_string(),
                remote: true,
                size_mb: 500,
                free_pct: 90,
            })
            .unwrap();
        section.close().unwrap();

        let doc = parse(&mut out);
        let fs = &doc["fs"]["odd\"name"];
        assert_eq!(fs["mount"], "/mnt/with space");
        assert_eq!(fs["type"], "NFS");
        assert_eq!(fs["free_pct"], 90);
    }

    #[test]
    fn test_interface_entry() {
        let prev = NetCounters {
            ipackets: 1000,
            ibytes: 1_000_000,
            opackets: 800,
            obytes: 500_000,
            ..Default::default()
        };
        let curr = NetSample::new(
            "eth0",
            NetCounters {
                ipackets: 1100,
                ibytes: 1_100_000,
                ierrors: 1,
                opackets: 850,
                obytes: 550_000,
                collisions: 3,
                xmitdrops: 1,
                iqdrops: 2,
                ..Default::default()
            },
        );

        let mut out = document();
        let mut section = Section::open(&mut out, "intfs").unwrap();
        section.interface(&curr, &prev, 0).unwrap();
        section.close().unwrap();

        let doc = parse(&mut out);
        let eth0 = &doc["intfs"]["eth0"];
        assert_eq!(eth0["in"]["packets_s"], 100);
        assert_eq!(eth0["in"]["bytes_s"], 100_000);
        assert_eq!(eth0["in"]["errors"], 1);
        assert_eq!(eth0["out"]["bytes_s"], 50_000);
        assert_eq!(eth0["collisions"], 3);
        assert_eq!(eth0["drops"], 3);
    }

    #[test]
    fn test_fc_adapter_entry() {
        let prev = FcCounters {
            rx_words: 0x1000,
            tx_words: 0x2000,
            error_frames: 1,
            dumped_frames: 2,
            link_failures: 0,
        };
        let curr = FcSample::new(
            "host0",
            FcCounters {
                rx_words: 0x1400,
                tx_words: 0x2800,
                error_frames: 2,
                dumped_frames: 2,
                link_failures: 0,
            },
        );

        let mut out = document();
        let mut section = Section::open(&mut out, "fcadapters").unwrap();
        section.fc_adapter(&curr, &prev, 0).unwrap();
        section.close().unwrap();

        let doc = parse(&mut out);
        let host = &doc["fcadapters"]["host0"];
        assert_eq!(host["rx_kb_s"], 0x400);
        assert_eq!(host["tx_kb_s"], 0x800);
        assert_eq!(host["err_frm_s"], 1);
        assert_eq!(host["err_frm_tot"], 2);
        assert_eq!(host["lost_frm_s"], 0);
        assert_eq!(host["lost_frm_tot"], 2);
    }

    #[test]
    fn test_nfs_v3_mix() {
        let prev = NfsCounters::V3(Nfs3Client {
            calls: 500,
            getattr: 100,
            setattr: 10,
            lookup: 50,
            access: 40,
            read: 200,
            write: 100,
            ..Default::default()
        });
        let curr = NfsCounters::V3(Nfs3Client {
            calls: 800,
            getattr: 150,
            setattr: 20,
            lookup: 70,
            access: 60,
            read: 300,
            write: 200,
            ..Default::default()
        });

        let mut out = document();
        nfs(&mut out, &curr, &prev, 0).unwrap();
        let doc = parse(&mut out);
        let v3 = &doc["nfsv3"];
        assert_eq!(v3["calls_s"], 300);
        assert_eq!(v3["access_pct"], 6.7);
        assert_eq!(v3["read_pct"], 33.3);
        assert_eq!(v3["write_pct"], 33.3);
        assert_eq!(v3["lookup_pct"], 6.7);
        assert_eq!(v3["attrGetSet_pct"], 20.0);
    }

    #[test]
    fn test_nfs_v4_mix_against_other_version() {
        let curr = NfsCounters::V4(Nfs4Client {
            operations: 100,
            read: 50,
            lock: 5,
            unlock: 5,
            ..Default::default()
        });
        let prev = NfsCounters::default();

        let mut out = document();
        nfs(&mut out, &curr, &prev, 0).unwrap();
        let doc = parse(&mut out);
        assert_eq!(doc["nfsv4"]["read_pct"], 50.0);
        assert_eq!(doc["nfsv4"]["lock_unlock_pct"], 10.0);
    }

    #[test]
    fn test_nfs_idle_sections_are_valid() {
        let mut out = document();
        nfs_idle(&mut out, NfsProtocol::V3).unwrap();
        nfs_idle(&mut out, NfsProtocol::V4).unwrap();
        let doc = parse(&mut out);
        assert_eq!(doc["nfsv3"]["calls_s"], 0);
        assert_eq!(doc["nfsv4"]["calls_s"], 0);
    }

    #[test]
    fn test_processes_section() {
        let sample = |pid: u32, name: &str, cpu_ms: u64, memory_kb: u64| ProcessSample {
            pid,
            name: name.to_string(),
            state: 'S',
            cpu_ms,
            memory_kb,
            ..Default::default()
        };
        let mut table = ProcessTable::new();
        table.seed(&[sample(1, "init", 0, 10240), sample(2, "db", 1000, 2048000)]);
        let top = table.update(&[sample(1, "init", 10, 10240), sample(2, "db", 1500, 2048000)]);

        let mut out = document();
        processes(&mut out, &top, 0).unwrap();
        let doc = parse(&mut out);
        let procs = &doc["processes"];

        assert_eq!(procs["cpu"]["0"]["pid"], 2);
        assert_eq!(procs["cpu"]["0"]["process"], "db");
        assert_eq!(procs["cpu"]["0"]["cpu_pct"], 50.0);
        assert_eq!(procs["cpu"]["0"]["mem_mb"], 2000);
        assert_eq!(procs["cpu"]["1"]["cpu_pct"], 1.0);
        assert_eq!(procs["mem"]["0"]["pid"], 2);
        assert_eq!(procs["mem"]["1"]["mem_mb"], 10);
    }

    #[test]
    fn test_processes_empty() {
        let mut table = ProcessTable::new();
        let top = table.update(&[]);
        let mut out = document();
        processes(&mut out, &top, 0).unwrap();
        let doc = parse(&mut out);
        assert!(doc["processes"]["cpu"].as_object().unwrap().is_empty());
    }
}
