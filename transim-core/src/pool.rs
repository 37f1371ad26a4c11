//! Index-addressed arena with lowest-free-slot reuse.
//!
//! Iteration is always in ascending index order, which is the stable
//! enumeration order the tick loop relies on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool<T> {
    items: Vec<Option<T>>,
    len: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next [`Pool::insert_with`] will use.
    pub fn next_free(&self) -> usize {
        self.items
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.items.len())
    }

    /// Insert a value built from the slot index it will occupy.
    pub fn insert_with(&mut self, make: impl FnOnce(usize) -> T) -> usize {
        let index = self.next_free();
        let value = make(index);
        if index == self.items.len() {
            self.items.push(Some(value));
        } else {
            self.items[index] = Some(value);
        }
        self.len += 1;
        index
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        let removed = self.items.get_mut(index).and_then(Option::take);
        if removed.is_some() {
            self.len -= 1;
            while matches!(self.items.last(), Some(None)) {
                self.items.pop();
            }
        }
        removed
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index).and_then(Option::as_mut)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(|(i, v)| v.as_mut().map(|v| (i, v)))
    }

    /// Snapshot of live indices, for loops that mutate the pool.
    pub fn indices(&self) -> Vec<usize> {
        self.iter().map(|(i, _)| i).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_lowest_slot() {
        let mut pool = Pool::new();
        let a = pool.insert_with(|i| i * 10);
        let b = pool.insert_with(|i| i * 10);
        let c = pool.insert_with(|i| i * 10);
        assert_eq!((a, b, c), (0, 1, 2));

        assert_eq!(pool.remove(1), Some(10));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.insert_with(|i| i * 10), 1);
        assert_eq!(pool.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_trailing_slots_trimmed() {
        let mut pool = Pool::new();
        pool.insert_with(|_| 'a');
        pool.insert_with(|_| 'b');
        pool.remove(1);
        pool.remove(0);
        assert!(pool.is_empty());
        assert_eq!(pool.next_free(), 0);
    }
}
