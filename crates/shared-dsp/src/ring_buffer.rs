//! Fixed-capacity FIFO queue with drop-oldest overflow.
//!
//! Absorbs the mismatch between a producer that delivers bursts (whole
//! codec frames) and a consumer that drains fixed host-sized blocks.
//! Storage is allocated once in `new`; the queue never grows.

/// Circular FIFO holding at most `capacity` values.
///
/// When full, `enqueue` evicts the oldest unread value. Reading from an
/// empty queue yields the `blank` value supplied at construction.
#[derive(Debug, Clone)]
pub struct QueueBuffer<T: Copy> {
    // One spare slot so a full queue is distinguishable from an empty one.
    data: Vec<T>,
    read_pos: usize,
    write_pos: usize,
    blank: T,
}

impl<T: Copy> QueueBuffer<T> {
    /// Create a queue able to hold `capacity` values.
    pub fn new(capacity: usize, blank: T) -> Self {
        Self {
            data: vec![blank; capacity + 1],
            read_pos: 0,
            write_pos: 0,
            blank,
        }
    }

    /// Append one value, evicting the oldest if the queue is full.
    #[inline]
    pub fn enqueue(&mut self, value: T) {
        let size = self.data.len();
        self.data[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % size;
        if self.write_pos == self.read_pos {
            self.read_pos = (self.read_pos + 1) % size;
        }
    }

    /// Append a slice of values in order.
    pub fn push_slice(&mut self, values: &[T]) {
        for &v in values {
            self.enqueue(v);
        }
    }

    /// Remove and return the oldest value, or the blank value if empty.
    #[inline]
    pub fn dequeue(&mut self) -> T {
        if self.read_pos == self.write_pos {
            return self.blank;
        }
        let value = self.data[self.read_pos];
        self.read_pos = (self.read_pos + 1) % self.data.len();
        value
    }

    /// Number of unread values.
    #[inline]
    pub fn len(&self) -> usize {
        let size = self.data.len();
        (self.write_pos + size - self.read_pos) % size
    }

    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    /// Maximum number of values held at once.
    pub fn capacity(&self) -> usize {
        self.data.len() - 1
    }

    /// Discard all unread values. Storage is kept.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(q: &mut QueueBuffer<f32>) -> Vec<f32> {
        let n = q.len();
        (0..n).map(|_| q.dequeue()).collect()
    }

    #[test]
    fn basic_enqueue_dequeue() {
        let mut q = QueueBuffer::new(4, 0.0_f32);
        q.enqueue(1.0);
        q.enqueue(2.0);
        q.enqueue(3.0);
        assert_eq!(q.len(), 3);
        assert_eq!(drain(&mut q), vec![1.0, 2.0, 3.0]);
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut q = QueueBuffer::new(4, 0.0_f32);
        for i in 0..6 {
            q.enqueue(i as f32);
        }
        assert_eq!(q.len(), 4);
        assert_eq!(drain(&mut q), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn push_slice_keeps_newest() {
        let mut q = QueueBuffer::new(4, 0.0_f32);
        q.push_slice(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(q.len(), 4);
        assert_eq!(drain(&mut q), vec![20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn empty_dequeue_returns_blank() {
        let mut q = QueueBuffer::new(3, -1.0_f32);
        assert_eq!(q.dequeue(), -1.0);
        q.enqueue(5.0);
        assert_eq!(q.dequeue(), 5.0);
        assert_eq!(q.dequeue(), -1.0);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn count_tracks_wrapped_cursors() {
        let mut q = QueueBuffer::new(5, 0_i16);
        for round in 0..20 {
            q.push_slice(&[round, round + 1, round + 2]);
            assert_eq!(q.len(), 3);
            assert_eq!(q.dequeue(), round);
            assert_eq!(q.dequeue(), round + 1);
            assert_eq!(q.dequeue(), round + 2);
            assert!(q.is_empty());
        }
    }

    #[test]
    fn capacity_is_fixed() {
        let mut q = QueueBuffer::new(8, 0.0_f32);
        assert_eq!(q.capacity(), 8);
        q.push_slice(&[1.0; 100]);
        assert_eq!(q.capacity(), 8);
        assert_eq!(q.len(), 8);
    }

    #[test]
    fn clear_resets() {
        let mut q = QueueBuffer::new(4, 0.0_f32);
        q.push_slice(&[1.0, 2.0, 3.0]);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.dequeue(), 0.0);
    }
}
