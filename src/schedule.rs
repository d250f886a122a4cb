//! Per-group sampling periods.
//!
//! A group samples every `2^shift` seconds. The period is kept as a bitmask
//! (`2^shift - 1`) so the per-second check is a single AND against the wall
//! clock second: a group is due when `timestamp & mask == 0`.

use std::fmt;

/// Largest shift; a group with this shift is treated as never firing.
pub const NEVER_SHIFT: u32 = 31;

/// Category of metrics sampled and emitted together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricGroup {
    CpuTotal,
    Cpus,
    Memory,
    Disks,
    Nfs,
    Adapters,
    Processes,
}

impl MetricGroup {
    /// All groups in emission order.
    pub const ALL: [MetricGroup; 7] = [
        MetricGroup::CpuTotal,
        MetricGroup::Cpus,
        MetricGroup::Memory,
        MetricGroup::Disks,
        MetricGroup::Nfs,
        MetricGroup::Adapters,
        MetricGroup::Processes,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            MetricGroup::CpuTotal => "cpu_total",
            MetricGroup::Cpus => "cpus",
            MetricGroup::Memory => "memory",
            MetricGroup::Disks => "disks",
            MetricGroup::Nfs => "nfs",
            MetricGroup::Adapters => "adapters",
            MetricGroup::Processes => "processes",
        }
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a group's output is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyKind {
    /// Never collected.
    #[default]
    Disabled,
    /// Shares the combined per-cycle document.
    Embedded,
    /// Emitted as its own document.
    Standalone,
}

/// Sampling configuration of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyConfig {
    pub kind: FrequencyKind,
    pub shift: u32,
    pub mask: u64,
    pub locked: bool,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            kind: FrequencyKind::Disabled,
            shift: NEVER_SHIFT,
            mask: mask_for(NEVER_SHIFT),
            locked: false,
        }
    }
}

impl FrequencyConfig {
    /// Builds an unlocked config; shifts above [`NEVER_SHIFT`] are clamped.
    pub fn new(kind: FrequencyKind, shift: u32) -> Self {
        let shift = shift.min(NEVER_SHIFT);
        Self {
            kind,
            shift,
            mask: mask_for(shift),
            locked: false,
        }
    }

    /// Decodes a command-line value.
    ///
    /// The sign selects the kind (positive embedded, negative standalone,
    /// zero disabled) and the magnitude `n` selects a period of `2^(n-1)`
    /// seconds.
    pub fn from_flag(value: i32) -> Self {
        let kind = match value.signum() {
            1 => FrequencyKind::Embedded,
            -1 => FrequencyKind::Standalone,
            _ => FrequencyKind::Disabled,
        };
        let shift = match value.unsigned_abs() {
            0 => NEVER_SHIFT,
            n => n - 1,
        };
        Self::new(kind, shift)
    }

    /// Period in seconds.
    pub fn period_secs(&self) -> u64 {
        1u64 << self.shift
    }
}

fn mask_for(shift: u32) -> u64 {
    (1u64 << shift) - 1
}

/// Sampling periods of all groups plus the derived combined masks.
#[derive(Debug, Clone)]
pub struct Scheduler {
    groups: [FrequencyConfig; 7],
    combined_mask: u64,
    combined_standard_mask: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler with every group disabled.
    pub fn new() -> Self {
        let mut scheduler = Self {
            groups: [FrequencyConfig::default(); 7],
            combined_mask: 0,
            combined_standard_mask: 0,
        };
        scheduler.recompute();
        scheduler
    }

    /// Sets a group's period and locks it. A locked group is left unchanged.
    ///
    /// Returns `false` when the group was already locked.
    pub fn configure(&mut self, group: MetricGroup, kind: FrequencyKind, shift: u32) -> bool {
        let slot = &mut self.groups[group.index()];
        if slot.locked {
            return false;
        }
        *slot = FrequencyConfig {
            locked: true,
            ..FrequencyConfig::new(kind, shift)
        };
        self.recompute();
        true
    }

    /// Applies the same period to every group not yet locked.
    pub fn configure_global_default(&mut self, kind: FrequencyKind, shift: u32) {
        let config = FrequencyConfig::new(kind, shift);
        for slot in self.groups.iter_mut().filter(|g| !g.locked) {
            *slot = config;
        }
        self.recompute();
    }

    pub fn config(&self, group: MetricGroup) -> &FrequencyConfig {
        &self.groups[group.index()]
    }

    pub fn kind(&self, group: MetricGroup) -> FrequencyKind {
        self.config(group).kind
    }

    pub fn shift(&self, group: MetricGroup) -> u32 {
        self.config(group).shift
    }

    /// True iff the group is enabled and `timestamp` is a multiple of its period.
    pub fn is_due(&self, group: MetricGroup, timestamp: u64) -> bool {
        let config = self.config(group);
        config.kind != FrequencyKind::Disabled && timestamp & config.mask == 0
    }

    /// Smallest mask over all enabled groups.
    pub fn combined_mask(&self) -> u64 {
        self.combined_mask
    }

    /// Smallest mask over embedded groups.
    pub fn combined_standard_mask(&self) -> u64 {
        self.combined_standard_mask
    }

    /// True when at least one group is enabled.
    pub fn any_enabled(&self) -> bool {
        self.groups.iter().any(|g| g.kind != FrequencyKind::Disabled)
    }

    /// Groups with the given kind, in emission order.
    pub fn groups_of(&self, kind: FrequencyKind) -> impl Iterator<Item = MetricGroup> + '_ {
        MetricGroup::ALL
            .into_iter()
            .filter(move |g| self.kind(*g) == kind)
    }

    fn recompute(&mut self) {
        let never = mask_for(NEVER_SHIFT);
        let min_mask = |kinds: &[FrequencyKind]| {
            self.groups
                .iter()
                .filter(|g| kinds.contains(&g.kind))
                .map(|g| g.mask)
                .min()
                .unwrap_or(never)
        };
        self.combined_mask = min_mask(&[FrequencyKind::Embedded, FrequencyKind::Standalone]);
        self.combined_standard_mask = min_mask(&[FrequencyKind::Embedded]);
    }
}
