//! Live process table with generational reap and top-N rankings.
//!
//! Each cycle flips the table generation, stamps every process seen in the
//! live enumeration with it, then drops every record still carrying the old
//! generation: those processes have exited.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::trace;

use crate::delta::wrapping_delta;
use crate::model::ProcessSample;
use crate::ranking::TopN;

/// Size of the CPU ranking.
pub const TOP_CPU: usize = 10;
/// Size of the memory ranking.
pub const TOP_MEM: usize = 5;

/// Tracked state of one process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cumulative_cpu_ms: u64,
    /// CPU time consumed since the previous cycle; the whole cumulative time
    /// on the cycle the process is first seen.
    pub cpu_delta: u64,
    pub memory_kb: u64,
    generation: bool,
}

impl ProcessRecord {
    fn first_seen(sample: &ProcessSample, generation: bool) -> Self {
        Self {
            pid: sample.pid,
            name: sample.name.clone(),
            cumulative_cpu_ms: sample.cpu_ms,
            cpu_delta: sample.cpu_ms,
            memory_kb: sample.memory_kb,
            generation,
        }
    }

    fn observe(&mut self, sample: &ProcessSample, generation: bool) {
        self.cpu_delta = wrapping_delta(sample.cpu_ms, self.cumulative_cpu_ms);
        self.cumulative_cpu_ms = sample.cpu_ms;
        self.memory_kb = sample.memory_kb;
        if self.name != sample.name {
            self.name.clone_from(&sample.name);
        }
        self.generation = generation;
    }

    pub fn memory_mb(&self) -> u64 {
        self.memory_kb >> 10
    }
}

/// Rankings of one cycle, borrowing the table until rendered.
#[derive(Debug)]
pub struct TopProcesses<'a> {
    pub cpu: TopN<&'a ProcessRecord, TOP_CPU>,
    pub memory: TopN<&'a ProcessRecord, TOP_MEM>,
}

impl<'a> TopProcesses<'a> {
    fn new() -> Self {
        Self {
            cpu: TopN::new(|r| r.cpu_delta),
            memory: TopN::new(|r| r.memory_kb),
        }
    }

    fn offer(&mut self, record: &'a ProcessRecord) {
        self.cpu.offer(record);
        self.memory.offer(record);
    }
}

/// Processes keyed by pid, in ascending pid order.
#[derive(Debug, Default)]
pub struct ProcessTable {
    records: BTreeMap<u32, ProcessRecord>,
    generation: bool,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    /// Tracked pids, ascending.
    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.records.keys().copied()
    }

    /// Records the startup enumeration with zero deltas.
    pub fn seed(&mut self, live: &[ProcessSample]) {
        let generation = self.generation;
        for sample in live.iter().filter(|s| s.is_tracked()) {
            let mut record = ProcessRecord::first_seen(sample, generation);
            record.cpu_delta = 0;
            self.records.insert(sample.pid, record);
        }
    }

    /// Folds one enumeration into the table and ranks the result.
    ///
    /// Known pids get their CPU delta against the previous cycle, new pids are
    /// inserted with their cumulative time as delta, and pids absent from
    /// `live` are removed.
    pub fn update(&mut self, live: &[ProcessSample]) -> TopProcesses<'_> {
        let generation = !self.generation;
        self.generation = generation;

        let mut order = Vec::with_capacity(live.len());
        for sample in live.iter().filter(|s| s.is_tracked()) {
            match self.records.entry(sample.pid) {
                Entry::Occupied(mut slot) => {
                    let record = slot.get_mut();
                    if record.generation == generation {
                        continue;
                    }
                    record.observe(sample, generation);
                }
                Entry::Vacant(slot) => {
                    slot.insert(ProcessRecord::first_seen(sample, generation));
                }
            }
            order.push(sample.pid);
        }

        let before = self.records.len();
        self.records.retain(|_, r| r.generation == generation);
        trace!(
            "process table: {} live, {} reaped",
            self.records.len(),
            before - self.records.len()
        );

        let mut top = TopProcesses::new();
        for pid in order {
            if let Some(record) = self.records.get(&pid) {
                top.offer(record);
            }
        }
        top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc_sample(pid: u32, cpu_ms: u64, memory_kb: u64) -> ProcessSample {
        ProcessSample {
            pid,
            name: format!("proc{}", pid),
            state: 'S',
            kernel_thread: false,
            cpu_ms,
            memory_kb,
        }
    }

    #[test]
    fn test_cpu_delta_between_polls() {
        let mut table = ProcessTable::new();
        table.update(&[proc_sample(42, 1000, 2048)]);
        let top = table.update(&[proc_sample(42, 1400, 2048)]);
        assert_eq!(top.cpu.as_slice()[0].cpu_delta, 400);
        assert_eq!(table.get(42).map(|r| r.cpu_delta), Some(400));
    }

    #[test]
    fn test_exited_process_is_reaped() {
        let mut table = ProcessTable::new();
        table.update(&[proc_sample(42, 1000, 10), proc_sample(7, 5, 10)]);
        table.update(&[proc_sample(42, 1400, 10), proc_sample(7, 6, 10)]);

        let top = table.update(&[proc_sample(7, 8, 10)]);
        assert!(top.cpu.iter().all(|r| r.pid != 42));
        assert!(top.memory.iter().all(|r| r.pid != 42));
        assert!(table.get(42).is_none());

        let top = table.update(&[proc_sample(7, 9, 10)]);
        assert!(top.cpu.iter().all(|r| r.pid != 42));
    }

    #[test]
    fn test_first_seen_delta_is_cumulative() {
        let mut table = ProcessTable::new();
        table.update(&[proc_sample(1, 100, 1)]);
        let top = table.update(&[proc_sample(1, 150, 1), proc_sample(2, 900, 1)]);
        let ranked: Vec<(u32, u64)> = top.cpu.iter().map(|r| (r.pid, r.cpu_delta)).collect();
        assert_eq!(ranked, vec![(2, 900), (1, 50)]);
    }

    #[test]
    fn test_seed_gives_zero_deltas() {
        let mut table = ProcessTable::new();
        table.seed(&[proc_sample(3, 500, 1)]);
        assert_eq!(table.get(3).map(|r| r.cpu_delta), Some(0));
        table.update(&[proc_sample(3, 560, 1)]);
        assert_eq!(table.get(3).map(|r| r.cpu_delta), Some(60));
    }

    #[test]
    fn test_table_converges_to_latest_snapshot() {
        let polls: Vec<Vec<ProcessSample>> = vec![
            vec![proc_sample(10, 1, 1), proc_sample(3, 1, 1), proc_sample(99, 1, 1)],
            vec![proc_sample(3, 5, 1), proc_sample(11, 2, 1), proc_sample(99, 4, 1)],
            vec![proc_sample(99, 10, 1), proc_sample(12, 3, 1), proc_sample(3, 5, 1)],
        ];
        let mut table = ProcessTable::new();
        for poll in &polls {
            table.update(poll);
        }
        let pids: Vec<u32> = table.pids().collect();
        assert_eq!(pids, vec![3, 12, 99]);
        assert_eq!(table.get(99).map(|r| r.cpu_delta), Some(6));
        assert_eq!(table.get(3).map(|r| r.cpu_delta), Some(0));
        assert_eq!(table.get(12).map(|r| r.cpu_delta), Some(3));
    }

    #[test]
    fn test_rankings_are_bounded_and_sorted() {
        let live: Vec<ProcessSample> = (1..=50)
            .map(|pid| proc_sample(pid, (pid as u64 * 37) % 101, (pid as u64 * 53) % 97))
            .collect();
        let mut table = ProcessTable::new();
        let top = table.update(&live);

        assert_eq!(top.cpu.len(), TOP_CPU);
        assert_eq!(top.memory.len(), TOP_MEM);
        let cpu: Vec<u64> = top.cpu.iter().map(|r| r.cpu_delta).collect();
        assert!(cpu.windows(2).all(|w| w[0] >= w[1]));
        let mem: Vec<u64> = top.memory.iter().map(|r| r.memory_kb).collect();
        assert!(mem.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_zombies_and_kernel_threads_are_ignored() {
        let mut zombie = proc_sample(5, 10, 1);
        zombie.state = 'Z';
        let mut kthread = proc_sample(2, 10, 1);
        kthread.kernel_thread = true;

        let mut table = ProcessTable::new();
        let top = table.update(&[zombie, kthread, proc_sample(8, 1, 1)]);
        assert_eq!(top.cpu.len(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_pid_in_one_poll_is_counted_once() {
        let mut table = ProcessTable::new();
        table.update(&[proc_sample(4, 100, 1)]);
        let top = table.update(&[proc_sample(4, 130, 1), proc_sample(4, 130, 1)]);
        assert_eq!(top.cpu.len(), 1);
        assert_eq!(top.cpu.as_slice()[0].cpu_delta, 30);
    }

    #[test]
    fn test_memory_mb() {
        let mut table = ProcessTable::new();
        table.update(&[proc_sample(1, 0, 3 * 1024 + 5)]);
        assert_eq!(table.get(1).map(|r| r.memory_mb()), Some(3));
    }
}
