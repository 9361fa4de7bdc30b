use std::collections::VecDeque;

/// Capacity used for both stream buffers
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded arrival-ordered buffer
///
/// Append-only: once full, each push evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct EventBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> EventBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the entry it evicted, if any
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// The last `limit` entries, oldest first
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(limit);
        self.items.iter().skip(skip)
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_under_capacity() {
        let mut buffer = EventBuffer::new(3);
        assert_eq!(buffer.push(1), None);
        assert_eq!(buffer.push(2), None);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut buffer = EventBuffer::default();
        for i in 0..DEFAULT_CAPACITY {
            assert_eq!(buffer.push(i), None);
        }
        assert_eq!(buffer.push(100), Some(0));
        assert_eq!(buffer.len(), DEFAULT_CAPACITY);
        assert_eq!(buffer.iter().next(), Some(&1));
    }

    #[test]
    fn test_recent_is_tail_in_arrival_order() {
        let mut buffer = EventBuffer::default();
        for i in 0..150 {
            buffer.push(i);
        }
        let recent: Vec<_> = buffer.recent(10).copied().collect();
        assert_eq!(recent, (140..150).collect::<Vec<_>>());

        // Larger than the buffer returns everything
        assert_eq!(buffer.recent(500).count(), DEFAULT_CAPACITY);
        assert_eq!(buffer.recent(0).count(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = EventBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push('a');
        assert_eq!(buffer.push('b'), Some('a'));
    }
}
