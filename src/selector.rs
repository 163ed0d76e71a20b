use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Source of uniformly distributed indices.
pub trait RandomSource: Send + Sync {
    /// Returns an index in `0..len`. Callers never pass `len == 0`.
    fn next_index(&self, len: usize) -> usize;
}

/// One generator shared by every request, seeded once.
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_clock() -> Self {
        Self::seeded(clock_seed())
    }
}

impl RandomSource for SharedRng {
    fn next_index(&self, len: usize) -> usize {
        self.inner.lock().gen_range(0..len)
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct RandomSelector {
    source: Arc<dyn RandomSource>,
}

impl RandomSelector {
    pub fn new(source: Arc<dyn RandomSource>) -> Self {
        Self { source }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Arc::new(SharedRng::seeded(seed)))
    }

    pub fn from_clock() -> Self {
        Self::new(Arc::new(SharedRng::from_clock()))
    }

    pub fn pick<'a, T>(&self, values: &'a [T]) -> Option<&'a T> {
        if values.is_empty() {
            return None;
        }
        // Clamp so a misbehaving source cannot index out of range.
        let index = self.source.next_index(values.len()).min(values.len() - 1);
        values.get(index)
    }
}
