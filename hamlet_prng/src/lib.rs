// Seeded pseudo-random number generator for siting and placement.
//
// xoshiro256++ (Blackman & Vigna, 2019) seeded through SplitMix64. Every
// seed-dependent decision in the engine draws from a `SiteRng`: the
// neighbor expansion order used to break A* ties, the sweep corner chosen
// when a placement queue is prepared, and the rotation order tried while
// siting a structure. Callers pass a plain `u64` seed and get the same
// decisions back on every machine.
//
// **Critical constraint: determinism.** Output depends only on the seed
// and the number of draws so far. No floating point in the generator
// core, no OS entropy, no thread-local state.

use serde::{Deserialize, Serialize};

/// xoshiro256++ state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRng {
    s: [u64; 4],
}

impl SiteRng {
    /// Seed a generator. SplitMix64 expands the seed into the 256-bit
    /// state, so nearby seeds still produce unrelated streams.
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

    /// Derive an independent generator for a named sub-stream.
    ///
    /// Used when one request seed has to drive several decisions whose
    /// draw counts must not affect each other (e.g. rotation order vs.
    /// origin order during siting).
    pub fn fork(seed: u64, stream: u64) -> Self {
        let mut sm = seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self::new(splitmix64(&mut sm))
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

    /// Uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)`, rejection-sampled to avoid modulo
    /// bias. Panics if `low >= high`.
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

    /// Uniform `usize` in `[low, high)`. Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Fisher-Yates shuffle in place. A slice of length 0 or 1 consumes no
    /// draws.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range_usize(0, i + 1);
            items.swap(i, j);
        }
    }

    /// Pick one element, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.range_usize(0, items.len())])
        }
    }
}

/// SplitMix64, used only to expand seeds.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SiteRng::new(42);
        let mut b = SiteRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SiteRng::new(42);
        let mut b = SiteRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn forks_are_independent_of_each_other() {
        let mut a = SiteRng::fork(7, 1);
        let mut b = SiteRng::fork(7, 2);
        assert_ne!(a.next_u64(), b.next_u64());

        let mut c = SiteRng::fork(7, 1);
        let mut d = SiteRng::fork(7, 1);
        assert_eq!(c.next_u64(), d.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = SiteRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_usize_within_bounds() {
        let mut rng = SiteRng::new(555);
        for _ in 0..10_000 {
            let v = rng.range_usize(5, 15);
            assert!((5..15).contains(&v), "range_usize out of range: {v}");
        }
    }

    #[test]
    fn shuffle_is_a_permutation_and_reproducible() {
        let mut items: Vec<u32> = (0..8).collect();
        SiteRng::new(9).shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());

        let mut again: Vec<u32> = (0..8).collect();
        SiteRng::new(9).shuffle(&mut again);
        assert_eq!(items, again);
    }

    #[test]
    fn shuffle_of_single_item_consumes_nothing() {
        let mut rng = SiteRng::new(3);
        let mut one = [1u8];
        rng.shuffle(&mut one);
        let mut fresh = SiteRng::new(3);
        assert_eq!(rng.next_u64(), fresh.next_u64());
    }

    #[test]
    fn choose_empty_is_none() {
        let mut rng = SiteRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert_eq!(rng.choose(&[5u8]), Some(&5));
    }

    #[test]
    fn serialization_roundtrip_continues_stream() {
        let mut rng = SiteRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SiteRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
