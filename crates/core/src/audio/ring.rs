use crate::{DemoError, Result};

/// Fixed-capacity circular byte store.
///
/// `occupied` always equals the number of readable bytes, and both cursors
/// stay in `0..capacity`. Synchronisation is left to the owner.
#[derive(Debug)]
pub struct RingBuffer {
    data: Box<[u8]>,
    read: usize,
    write: usize,
    occupied: usize,
}

impl RingBuffer {
    /// Allocates a zeroed ring. A zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DemoError::InvalidInput(
                "ring buffer capacity must be positive",
            ));
        }
        Ok(Self {
            data: vec![0; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
            occupied: 0,
        })
    }

    /// Returns the total number of bytes the ring can hold.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of bytes waiting to be read.
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Returns the number of bytes that can be pushed without overwriting.
    pub fn free(&self) -> usize {
        self.capacity() - self.occupied
    }

    /// `true` when nothing is left to read.
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// `true` when a push would store nothing.
    pub fn is_full(&self) -> bool {
        self.occupied == self.capacity()
    }

    /// Copies as much of `bytes` as fits and returns the count written.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.free());
        if count == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let first = count.min(capacity - self.write);
        self.data[self.write..self.write + first].copy_from_slice(&bytes[..first]);
        let rest = count - first;
        if rest > 0 {
            self.data[..rest].copy_from_slice(&bytes[first..count]);
        }

        self.write = (self.write + count) % capacity;
        self.occupied += count;
        count
    }

    /// Moves up to `out.len()` bytes into `out` and returns the count read.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.occupied);
        if count == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let first = count.min(capacity - self.read);
        out[..first].copy_from_slice(&self.data[self.read..self.read + first]);
        let rest = count - first;
        if rest > 0 {
            out[first..count].copy_from_slice(&self.data[..rest]);
        }

        self.read = (self.read + count) % capacity;
        self.occupied -= count;
        count
    }
}
