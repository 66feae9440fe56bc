// Deterministic random streams for the simulator.
//
// `SimRng` is xoshiro256++ (Blackman & Vigna, 2019) seeded through
// SplitMix64. The simulator never touches OS entropy or a thread-local
// generator: every stochastic decision (worker visitation order, daughter
// placement jitter, behavior noise) draws from a `SimRng` that was derived
// from the world's master seed.
//
// Parallel phases need one stream per worker and one per agent. Rather than
// sharing a generator behind a lock, streams are split off with `fork()`,
// which mixes a caller-chosen stream key into a fresh SplitMix64 expansion.
// Two forks of the same parent state with the same key are identical, so
// the per-agent streams do not depend on how many worker threads ran.
//
// **Critical constraint: reproducibility.** For a fixed seed every method
// must return the same sequence on every platform. The core generator uses
// integer arithmetic only; float helpers convert from the upper bits.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ generator state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    s: [u64; 4],
}

impl SimRng {
    /// Seed a generator from a single `u64`.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Derive an independent stream keyed by `stream`.
    ///
    /// Advances `self` by one step. Calling `fork` with different keys on
    /// clones of the same state yields unrelated sequences.
    pub fn fork(&mut self, stream: u64) -> Self {
        let base = self.next_u64();
        Self::new(base ^ stream.wrapping_mul(0xd1b5_4a32_d192_ed03))
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f64` in `[0, 1)` built from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform `f64` in `[low, high)`. Panics if `low >= high`.
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        assert!(low < high, "uniform: low must be less than high");
        low + self.next_f64() * (high - low)
    }

    /// Symmetric noise in `[-amplitude / 2, amplitude / 2)`.
    ///
    /// Used for daughter placement jitter.
    pub fn centered(&mut self, amplitude: f64) -> f64 {
        amplitude * (self.next_f64() - 0.5)
    }

    /// Uniform integer in `[low, high)` via rejection sampling.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// In-place Fisher–Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range_usize(0, i + 1);
            items.swap(i, j);
        }
    }
}

/// SplitMix64 step, used only to expand seeds into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
