use super::PoolPos;

/// ClockReplacer implements the clock page replacement policy for the buffer pool.
///
/// Which frames may be evicted at all is decided by the caller; the buffer pool
/// only offers frames holding clean pages, so dirty pages are never stolen.
pub(in crate::buffer) struct ClockReplacer {
    pool_size: usize,
    clock_hand: PoolPos,
    ref_bits: Vec<bool>,
}

impl ClockReplacer {
    /// Construct a new ClockReplacer for a BufferPool with a given pool_size
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            clock_hand: 0,
            ref_bits: vec![false; pool_size],
        }
    }

    /// The page in the frame at the given position was accessed
    pub fn reference(&mut self, frame: PoolPos) {
        self.ref_bits[frame] = true;
    }

    /// The frame at the given position was emptied
    pub fn remove(&mut self, frame: PoolPos) {
        self.ref_bits[frame] = false;
    }

    /// Returns None if no frame is evictable, else the next victim according to the clock.
    /// Frames which were referenced since the hand last passed them get a second chance.
    pub fn find_victim(&mut self, evictable: impl Fn(PoolPos) -> bool) -> Option<PoolPos> {
        // two rounds: the first one may only clear reference bits
        for _ in 0..2 * self.pool_size {
            let frame = self.clock_hand;
            self.clock_hand = (self.clock_hand + 1) % self.pool_size;
            if !evictable(frame) {
                continue;
            }
            if !self.ref_bits[frame] {
                return Some(frame);
            } else {
                self.ref_bits[frame] = false;
            }
        }
        None
    }
}
