//! Deterministic counter-based randomness
//!
//! Generated programs draw every random number as `mwg_mix(seed + counter)`,
//! a splitmix64 finalizer. The draw has no shared state, so it can sit inside
//! a parallel loop, and the same functions below let the generator reproduce
//! any layout the generated program builds.

/// Seed of every random layout in a generated workload
pub const SEED: u64 = 37;

/// C definitions of the seed and the `mwg_mix` draw
pub const MIX_DEFINITIONS: &str = "\
#define MWG_SEED 37ULL

static inline uint64_t mwg_mix(uint64_t x) {
    uint64_t z = x + 0x9E3779B97F4A7C15ULL;
    z = (z ^ (z >> 30)) * 0xBF58476D1CE4E5B9ULL;
    z = (z ^ (z >> 27)) * 0x94D049BB133111EBULL;
    return z ^ (z >> 31);
}";

/// Fisher-Yates shuffle of `a[start..start + len]`, needs [`MIX_DEFINITIONS`]
pub const SHUFFLE_DEFINITION: &str = "\
static void mwg_shuffle(size_t* a, size_t start, size_t len, uint64_t seed) {
    if (len < 2) {
        return;
    }
    for (size_t k = len - 1; k > 0; k--) {
        size_t j = (size_t) (mwg_mix(seed + start + k) % (k + 1));
        size_t tmp = a[start + k];
        a[start + k] = a[start + j];
        a[start + j] = tmp;
    }
}";

/// The splitmix64 finalizer, bit-identical to `mwg_mix`
pub fn mix(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Fisher-Yates shuffle of `values[start..start + len]`, identical to `mwg_shuffle`
pub fn shuffle_range(values: &mut [u64], start: usize, len: usize, seed: u64) {
    if len < 2 {
        return;
    }
    for k in (1..len).rev() {
        let j = (mix(seed.wrapping_add((start + k) as u64)) % (k as u64 + 1)) as usize;
        values.swap(start + k, start + j);
    }
}
