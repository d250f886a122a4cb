//! Double-buffered current/previous readings for fixed-identity totals.

/// Two buffers whose roles swap on every successful collection.
///
/// After each swap `previous` holds the reading from exactly one collection
/// earlier. Until the first reading arrives both slots are empty; the first
/// reading is copied into both so its delta is zero.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPair<T> {
    data: [T; 2],
    current: usize,
    primed: bool,
}

impl<T: Clone + Default> SnapshotPair<T> {
    pub fn new() -> Self {
        Self {
            data: [T::default(), T::default()],
            current: 0,
            primed: false,
        }
    }

    /// True once a first reading has been stored.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Stores an initial reading in both slots.
    pub fn prime(&mut self, reading: T) {
        self.data = [reading.clone(), reading];
        self.current = 0;
        self.primed = true;
    }

    /// Fetches a fresh reading into the spare slot and swaps roles.
    ///
    /// On failure nothing changes: the previous pair stays intact for the
    /// next attempt.
    pub fn collect<E>(
        &mut self,
        fetch: impl FnOnce(&mut T) -> Result<(), E>,
    ) -> Result<(&T, &T), E> {
        let spare = 1 - self.current;
        fetch(&mut self.data[spare])?;
        if !self.primed {
            self.data[self.current] = self.data[spare].clone();
            self.primed = true;
        }
        self.current = spare;
        Ok(self.pair())
    }

    /// `(current, previous)`.
    pub fn pair(&self) -> (&T, &T) {
        (&self.data[self.current], &self.data[1 - self.current])
    }
}
