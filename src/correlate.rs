//! Previous-poll tables for resource sets whose membership changes over time.
//!
//! Disks, network interfaces and fibre-channel adapters come and go between
//! polls, so the reading from the last poll is found by name rather than by
//! position. Slots are never removed: a resource that disappears keeps its
//! slot and is simply not visited until it shows up again.

use tracing::warn;

/// One resource reading keyed by a name that is stable across polls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedSample<C> {
    pub identity: String,
    pub counters: C,
}

impl<C> NamedSample<C> {
    pub fn new(identity: impl Into<String>, counters: C) -> Self {
        Self {
            identity: identity.into(),
            counters,
        }
    }
}

/// Append-only table of the last reading seen for every identity.
#[derive(Debug, Clone, Default)]
pub struct CorrelatedTable<C> {
    slots: Vec<NamedSample<C>>,
}

impl<C: Clone + Default> CorrelatedTable<C> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of slots ever allocated.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Last stored counters for `identity`.
    pub fn get(&self, identity: &str) -> Option<&C> {
        self.position(identity).map(|idx| &self.slots[idx].counters)
    }

    /// Identities in slot order.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.identity.as_str())
    }

    /// Stores `live` without visiting; used to take the startup reading.
    pub fn seed(&mut self, live: &[NamedSample<C>]) {
        self.reconcile(live, |_, _| {});
    }

    /// Matches every live sample with its previous reading.
    ///
    /// `visit` receives each live sample, in live order, together with the
    /// counters stored for the same identity. A first-seen identity is
    /// visited against zeroed counters. The live counters then replace the
    /// stored ones.
    pub fn reconcile<F>(&mut self, live: &[NamedSample<C>], mut visit: F)
    where
        F: FnMut(&NamedSample<C>, &C),
    {
        if live.len() > self.slots.capacity() {
            self.grow(live.len() - self.slots.len());
        }

        let zero = C::default();
        for sample in live {
            match self.position(&sample.identity) {
                Some(idx) => {
                    visit(sample, &self.slots[idx].counters);
                    self.slots[idx].counters = sample.counters.clone();
                }
                None => {
                    visit(sample, &zero);
                    if self.slots.len() == self.slots.capacity() && !self.grow(1) {
                        continue;
                    }
                    self.slots.push(sample.clone());
                }
            }
        }
    }

    fn position(&self, identity: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.identity == identity)
    }

    fn grow(&mut self, additional: usize) -> bool {
        match self.slots.try_reserve_exact(additional) {
            Ok(()) => true,
            Err(e) => {
                warn!("correlated table growth failed: {}", e);
                false
            }
        }
    }
}

/// Previous-poll table keyed by position, for resources without stable names
/// (logical CPUs are numbered by their order in the poll).
#[derive(Debug, Clone, Default)]
pub struct PositionalTable<C> {
    slots: Vec<C>,
}

impl<C: Clone + Default> PositionalTable<C> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn seed(&mut self, live: &[C]) {
        self.reconcile(live, |_, _, _| {});
    }

    /// Visits `(index, current, previous)` for each live entry, then stores
    /// the live entry. Positions beyond the table are visited against zero.
    pub fn reconcile<F>(&mut self, live: &[C], mut visit: F)
    where
        F: FnMut(usize, &C, &C),
    {
        if live.len() > self.slots.len()
            && let Err(e) = self.slots.try_reserve_exact(live.len() - self.slots.len())
        {
            warn!("positional table growth failed: {}", e);
        }

        let zero = C::default();
        for (idx, curr) in live.iter().enumerate() {
            match self.slots.get_mut(idx) {
                Some(prev) => {
                    visit(idx, curr, prev);
                    *prev = curr.clone();
                }
                None => {
                    visit(idx, curr, &zero);
                    if self.slots.len() < self.slots.capacity() {
                        self.slots.push(curr.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::wrapping_delta;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Io {
        reads: u64,
        writes: u64,
    }

    fn disk(name: &str, reads: u64, writes: u64) -> NamedSample<Io> {
        NamedSample::new(name, Io { reads, writes })
    }

    fn deltas(table: &mut CorrelatedTable<Io>, live: &[NamedSample<Io>]) -> Vec<(String, u64, u64)> {
        let mut out = Vec::new();
        table.reconcile(live, |curr, prev| {
            out.push((
                curr.identity.clone(),
                wrapping_delta(curr.counters.reads, prev.reads),
                wrapping_delta(curr.counters.writes, prev.writes),
            ));
        });
        out
    }

    #[test]
    fn test_first_seen_is_delta_against_zero() {
        let mut table = CorrelatedTable::new();
        let out = deltas(&mut table, &[disk("sda", 100, 50)]);
        assert_eq!(out, vec![("sda".to_string(), 100, 50)]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reconcile_same_set_twice_yields_zero() {
        let mut table = CorrelatedTable::new();
        let live = vec![disk("sda", 100, 50), disk("dm-0", 7, 3)];
        deltas(&mut table, &live);
        let out = deltas(&mut table, &live);
        assert!(out.iter().all(|(_, r, w)| *r == 0 && *w == 0));
    }

    #[test]
    fn test_matches_by_name_not_position() {
        let mut table = CorrelatedTable::new();
        table.seed(&[disk("sda", 100, 10), disk("sdb", 500, 50)]);

        let out = deltas(&mut table, &[disk("sdb", 600, 55), disk("sda", 130, 10)]);
        assert_eq!(
            out,
            vec![("sdb".to_string(), 100, 5), ("sda".to_string(), 30, 0)]
        );
    }

    #[test]
    fn test_vanished_resource_keeps_slot() {
        let mut table = CorrelatedTable::new();
        table.seed(&[disk("sda", 100, 10), disk("sdc", 9, 9)]);

        let out = deltas(&mut table, &[disk("sda", 110, 10)]);
        assert_eq!(out.len(), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("sdc"), Some(&Io { reads: 9, writes: 9 }));

        // When it comes back, the delta is measured against its last reading.
        let out = deltas(&mut table, &[disk("sda", 110, 10), disk("sdc", 19, 10)]);
        assert_eq!(out[1], ("sdc".to_string(), 10, 1));
    }

    #[test]
    fn test_new_identity_with_same_count_grows_table() {
        let mut table = CorrelatedTable::new();
        table.seed(&[disk("sda", 1, 1), disk("sdb", 1, 1)]);
        deltas(&mut table, &[disk("sda", 2, 2), disk("sdx", 5, 5)]);
        assert_eq!(table.len(), 3);
        let names: Vec<_> = table.identities().collect();
        assert_eq!(names, vec!["sda", "sdb", "sdx"]);
    }

    #[test]
    fn test_growth_sized_to_live_count() {
        let mut table: CorrelatedTable<Io> = CorrelatedTable::new();
        let live: Vec<_> = (0..5).map(|i| disk(&format!("sd{}", i), i, i)).collect();
        table.seed(&live);
        assert_eq!(table.len(), 5);
        assert!(table.capacity() >= 5);
    }

    #[test]
    fn test_wraparound_through_table() {
        let mut table = CorrelatedTable::new();
        table.seed(&[disk("eth0", u64::MAX - 4, 0)]);
        let out = deltas(&mut table, &[disk("eth0", 5, 0)]);
        assert_eq!(out[0].1, 9);
    }

    #[test]
    fn test_positional_table() {
        let mut table = PositionalTable::new();
        table.seed(&[Io { reads: 10, writes: 0 }]);

        let mut seen = Vec::new();
        table.reconcile(
            &[Io { reads: 15, writes: 0 }, Io { reads: 3, writes: 0 }],
            |idx, curr, prev| seen.push((idx, curr.reads - prev.reads)),
        );
        assert_eq!(seen, vec![(0, 5), (1, 3)]);
        assert_eq!(table.len(), 2);
    }
}
