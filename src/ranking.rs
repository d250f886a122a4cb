//! Bounded descending rankings.

/// Fixed-capacity window of the `N` largest items by key, largest first.
///
/// Insertion shifts smaller entries down and stops at the first entry whose
/// key is greater or equal, so among equal keys the earlier offer stays ahead.
/// Items pushed past the last position are dropped.
#[derive(Debug, Clone)]
pub struct TopN<T, const N: usize> {
    items: Vec<T>,
    key: fn(&T) -> u64,
}

impl<T, const N: usize> TopN<T, N> {
    pub fn new(key: fn(&T) -> u64) -> Self {
        Self {
            items: Vec::with_capacity(N + 1),
            key,
        }
    }

    /// Offers a candidate to the ranking.
    pub fn offer(&mut self, item: T) {
        let key = (self.key)(&item);
        let mut pos = self.items.len();
        while pos > 0 && (self.key)(&self.items[pos - 1]) < key {
            pos -= 1;
        }
        if pos >= N {
            return;
        }
        self.items.insert(pos, item);
        self.items.truncate(N);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a TopN<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
