// Pitch history - bounded record of per-tick pitch values
//
// A fixed-capacity ring: once full, each push evicts the oldest entry.
// Unvoiced ticks are recorded as `None` so the trace keeps its timing.

/// Bounded FIFO of pitch estimates, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct PitchHistory {
    entries: Vec<Option<f64>>,
    head: usize,
    capacity: usize,
}

impl PitchHistory {
    /// # Panics
    /// Panics if `capacity` is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            entries: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn push(&mut self, pitch: Option<f64>) {
        if self.entries.len() < self.capacity {
            self.entries.push(pitch);
        } else {
            self.entries[self.head] = pitch;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in chronological order
    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        let (newer, older) = self.entries.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    pub fn to_vec(&self) -> Vec<Option<f64>> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = 0;
    }
}
