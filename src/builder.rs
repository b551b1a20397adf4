//! Perfect-hash construction.
//!
//! Given the hashes of `n` distinct keys, the builder finds a parameter
//! bundle — a 64-bit seed plus one small displacement per bucket — under
//! which every key maps to a distinct slot in a power-of-two region. Keys are
//! grouped into buckets by the low bits of their seeded hash; the remaining
//! high bits ("fold") are xor-combined with the bucket's displacement to pick
//! the slot. Buckets are placed largest-first, which is what keeps the
//! displacement search near-linear in expectation: the crowded buckets get
//! first pick of the empty region, and the long tail of one-key buckets can
//! always land in any remaining free slot.
//!
//! A bucket with no workable displacement dooms the whole attempt; the
//! builder then redraws the seed, and after a budget of seeds doubles the
//! bucket count (fewer keys per bucket) before trying again. When every
//! widening step is spent the build reports [`Failure::BuildFailed`], which
//! in practice means the hash family cannot tell some keys apart.

use core::cmp::Reverse;
use core::fmt;
use core::marker::PhantomData;

use log::debug;
use log::trace;
use rand::Rng;
use rand::RngCore;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::distr::Distribution;
use rand::distr::StandardUniform;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;

use crate::bits::Bitmap;
use crate::error::Failure;
use crate::error::Result;
use crate::seeded_hash::mix64;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// Unsigned integer type used to store per-bucket displacements.
///
/// The width bounds the table: a `P`-parameterized table can address at most
/// `2^P::BITS` slots (half that for the fingerprinted variant, which spends
/// one bit per slot on the occupancy flag). Narrower parameters shrink the
/// displacement table; `u32` is a comfortable default.
pub trait BucketParam: sealed::Sealed + Copy + fmt::Debug + Send + Sync + 'static {
    /// Width of the parameter in bits.
    const BITS: u32;

    /// Truncates `value` to the parameter width.
    fn from_u64(value: u64) -> Self;

    /// Widens the parameter back to a `u64` displacement.
    fn to_u64(self) -> u64;
}

macro_rules! impl_bucket_param {
    ($($ty:ty),*) => {$(
        impl BucketParam for $ty {
            const BITS: u32 = <$ty>::BITS;

            #[inline(always)]
            fn from_u64(value: u64) -> Self {
                value as $ty
            }

            #[inline(always)]
            fn to_u64(self) -> u64 {
                self as u64
            }
        }
    )*};
}

impl_bucket_param!(u8, u16, u32, u64);

/// A source of keys drawn from the key domain.
///
/// Dynamic rebuilds derive part of their seed schedule from hashes of
/// synthesized keys, so every dynamic table needs one of these. For key types
/// the standard distribution can sample, [`StandardKeys`] is picked up by
/// default; custom key types supply their own generator (see the crate docs).
pub trait RandomKeys<K> {
    /// Produces a fresh key.
    fn random_key(&mut self) -> K;
}

/// [`RandomKeys`] implementation for types `rand`'s standard distribution
/// can produce (fixed-width integers, floats, `bool`, `char`, tuples and
/// arrays thereof).
pub struct StandardKeys<K> {
    rng: SmallRng,
    _keys: PhantomData<fn() -> K>,
}

impl<K> StandardKeys<K> {
    /// Generator with a caller-chosen seed, for reproducible rebuilds.
    pub fn from_seed(seed: u64) -> Self {
        StandardKeys {
            rng: SmallRng::seed_from_u64(seed),
            _keys: PhantomData,
        }
    }
}

impl<K> Default for StandardKeys<K> {
    fn default() -> Self {
        Self::from_seed(entropy_seed())
    }
}

impl<K> Clone for StandardKeys<K> {
    fn clone(&self) -> Self {
        StandardKeys {
            rng: self.rng.clone(),
            _keys: PhantomData,
        }
    }
}

impl<K> fmt::Debug for StandardKeys<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardKeys").finish_non_exhaustive()
    }
}

impl<K> RandomKeys<K> for StandardKeys<K>
where
    StandardUniform: Distribution<K>,
{
    #[inline]
    fn random_key(&mut self) -> K {
        self.rng.random()
    }
}

/// One 64-bit word of OS entropy, with a fixed fallback when the OS source
/// is unavailable.
pub(crate) fn entropy_seed() -> u64 {
    OsRng.try_next_u64().unwrap_or(0x9E37_79B9_7F4A_7C15)
}

/// Knobs for the displacement search.
///
/// The defaults (64 seeds per bucket width, 3 widenings, 2 keys per bucket)
/// make spurious build failures effectively impossible for hash families
/// with ordinary 64-bit quality; they exist as tunables mainly for stress
/// tests and for callers who want to trade displacement-table size against
/// construction time.
#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    /// Target keys per bucket (`c`). Buckets number `next_pow2(n / c)`;
    /// smaller factors mean more, emptier buckets and an easier search at
    /// the cost of a larger displacement table.
    pub bucket_factor: f32,
    /// Seeds tried at each bucket width before widening.
    pub seed_attempts: u32,
    /// Bucket-count doublings allowed before the build is declared failed.
    pub max_bucket_doublings: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            bucket_factor: 2.0,
            seed_attempts: 64,
            max_bucket_doublings: 3,
        }
    }
}

/// Counters describing construction work done over a table's lifetime.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildStats {
    /// Seeds tried across all builds.
    pub seed_attempts: u64,
    /// Bucket-count doublings performed across all builds.
    pub bucket_doublings: u64,
    /// Full parameter rebuilds.
    pub rebuilds: u64,
    /// Single-bucket displacement repairs that avoided a rebuild.
    pub repairs: u64,
    /// Effective keys-per-bucket ratio of the most recent build.
    pub bucket_factor: f32,
}

/// The installed parameter bundle: seed, bucket count, slot count and the
/// per-bucket displacement table.
#[derive(Clone, Debug)]
pub(crate) struct Params<P> {
    pub seed: u64,
    pub bucket_bits: u32,
    pub slot_bits: u32,
    pub displacements: Box<[P]>,
}

impl<P: BucketParam> Params<P> {
    /// Parameters of an empty table: one bucket, zero displacement.
    pub fn trivial(seed: u64, slot_bits: u32) -> Self {
        Params {
            seed,
            bucket_bits: 0,
            slot_bits,
            displacements: vec![P::from_u64(0); 1].into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub fn bucket_count(&self) -> usize {
        1usize << self.bucket_bits
    }

    #[inline(always)]
    pub fn slot_count(&self) -> usize {
        1usize << self.slot_bits
    }

    #[inline(always)]
    pub fn bucket_of(&self, hash: u64) -> usize {
        (hash & (self.bucket_count() as u64 - 1)) as usize
    }

    /// The slot-selecting portion of the hash, disjoint from the bucket bits.
    #[inline(always)]
    pub fn fold(&self, hash: u64) -> u64 {
        if self.bucket_bits + self.slot_bits <= 64 {
            hash >> self.bucket_bits
        } else {
            mix64(hash ^ self.seed.rotate_left(32))
        }
    }

    #[inline(always)]
    pub fn slot_for_fold(&self, fold: u64, displacement: u64) -> usize {
        ((fold ^ displacement) & (self.slot_count() as u64 - 1)) as usize
    }

    #[inline(always)]
    pub fn slot_of(&self, hash: u64) -> usize {
        let displacement = self.displacements[self.bucket_of(hash)].to_u64();
        self.slot_for_fold(self.fold(hash), displacement)
    }
}

/// Slot bits needed to hold `n` entries under `max_load`.
pub(crate) fn required_slot_bits(n: usize, max_load: f32) -> u32 {
    if n == 0 {
        return 0;
    }
    let target = (n as f64 / max_load as f64).ceil() as usize;
    target.max(n).next_power_of_two().trailing_zeros()
}

fn bucket_bits_for(n: usize, factor: f32, slot_bits: u32) -> u32 {
    if n == 0 {
        return 0;
    }
    let target = (n as f64 / factor as f64).ceil() as usize;
    let bits = target.max(1).next_power_of_two().trailing_zeros();
    bits.min(slot_bits)
}

fn try_vec<T: Clone>(value: T, len: usize) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(len)
        .map_err(|_| Failure::AllocationFailed)?;
    vec.resize(len, value);
    Ok(vec)
}

/// Searches for a collision-free parameter bundle over `n` keys.
///
/// `fill_hashes` must fill its output with the `n` key hashes under the given
/// seed, in a stable order; `probe` contributes key-domain digests to the
/// seed schedule. `slot_bits` fixes the slot region (the caller has already
/// sized and validated it). On success the returned bundle maps the `n` keys
/// injectively into `2^slot_bits` slots.
pub(crate) fn build<P, F, G>(
    n: usize,
    mut fill_hashes: F,
    slot_bits: u32,
    options: &BuildOptions,
    rng: &mut SmallRng,
    mut probe: G,
    stats: &mut BuildStats,
) -> Result<Params<P>>
where
    P: BucketParam,
    F: FnMut(u64, &mut Vec<u64>),
    G: FnMut(u64) -> u64,
{
    let mut seed = mix64(rng.next_u64());
    if n == 0 {
        stats.bucket_factor = 0.0;
        return Ok(Params::trivial(seed, slot_bits));
    }
    if n > u32::MAX as usize {
        return Err(Failure::CapacityExceeded);
    }
    let slot_count = 1usize << slot_bits;
    debug_assert!(n <= slot_count);

    let mut hashes = Vec::new();
    hashes
        .try_reserve_exact(n)
        .map_err(|_| Failure::AllocationFailed)?;
    let mut folded = Vec::new();
    folded
        .try_reserve_exact(n)
        .map_err(|_| Failure::AllocationFailed)?;
    let mut used = Bitmap::try_new(slot_count)?;
    let mut items = try_vec(0u32, n)?;
    let mut bucket_slots: Vec<u64> = Vec::new();

    let mut bucket_bits = bucket_bits_for(n, options.bucket_factor, slot_bits);
    let mut widenings = 0;
    loop {
        let bucket_count = 1usize << bucket_bits;
        let mut displacements = try_vec(P::from_u64(0), bucket_count)?;
        let mut counts = try_vec(0u32, bucket_count)?;
        let mut starts = try_vec(0u32, bucket_count + 1)?;
        let mut order = try_vec(0u32, bucket_count)?;
        for (i, slot) in order.iter_mut().enumerate() {
            *slot = i as u32;
        }

        for _ in 0..options.seed_attempts {
            stats.seed_attempts += 1;
            seed = mix64(seed ^ rng.next_u64()).wrapping_add(probe(seed));
            fill_hashes(seed, &mut hashes);
            debug_assert_eq!(hashes.len(), n);
            let ok = try_displacements(
                seed,
                bucket_bits,
                slot_bits,
                &hashes,
                &mut folded,
                &mut used,
                &mut counts,
                &mut starts,
                &mut items,
                &mut order,
                &mut bucket_slots,
                &mut displacements,
            );
            if ok {
                stats.bucket_factor = n as f32 / bucket_count as f32;
                return Ok(Params {
                    seed,
                    bucket_bits,
                    slot_bits,
                    displacements: displacements.into_boxed_slice(),
                });
            }
            trace!(
                "displacement search failed: n={n} buckets={bucket_count} seed={seed:#018x}"
            );
        }

        if bucket_bits >= slot_bits || widenings >= options.max_bucket_doublings {
            break;
        }
        bucket_bits += 1;
        widenings += 1;
        stats.bucket_doublings += 1;
        debug!(
            "widening displacement buckets to {} after {} seeds (n={n})",
            1usize << bucket_bits,
            options.seed_attempts,
        );
    }

    debug!("displacement build failed: n={n} slot_bits={slot_bits}");
    Err(Failure::BuildFailed)
}

/// One seed attempt: groups keys into buckets, places buckets largest-first,
/// writes the displacement table. Returns false as soon as any bucket has no
/// workable displacement.
#[allow(clippy::too_many_arguments)]
fn try_displacements<P: BucketParam>(
    seed: u64,
    bucket_bits: u32,
    slot_bits: u32,
    hashes: &[u64],
    folded: &mut Vec<u64>,
    used: &mut Bitmap,
    counts: &mut [u32],
    starts: &mut [u32],
    items: &mut [u32],
    order: &mut [u32],
    bucket_slots: &mut Vec<u64>,
    displacements: &mut [P],
) -> bool {
    let bucket_count = counts.len();
    let bucket_mask = (bucket_count - 1) as u64;
    let slot_mask = ((1usize << slot_bits) - 1) as u64;

    folded.clear();
    if bucket_bits + slot_bits <= 64 {
        folded.extend(hashes.iter().map(|&h| h >> bucket_bits));
    } else {
        // Bucket and slot bits would overlap; re-derive the slot component
        // from a seed-keyed remix instead.
        folded.extend(hashes.iter().map(|&h| mix64(h ^ seed.rotate_left(32))));
    }

    counts.fill(0);
    for &hash in hashes {
        counts[(hash & bucket_mask) as usize] += 1;
    }
    starts[0] = 0;
    for bucket in 0..bucket_count {
        starts[bucket + 1] = starts[bucket] + counts[bucket];
    }
    // Scatter key indices grouped by bucket; afterwards bucket `b` owns
    // `items[starts[b] - counts[b] .. starts[b]]`.
    for (i, &hash) in hashes.iter().enumerate() {
        let bucket = (hash & bucket_mask) as usize;
        items[starts[bucket] as usize] = i as u32;
        starts[bucket] += 1;
    }

    order.sort_unstable_by_key(|&bucket| (Reverse(counts[bucket as usize]), bucket));

    used.fill_zero();
    displacements.fill(P::from_u64(0));

    for &bucket in order.iter() {
        let bucket = bucket as usize;
        let count = counts[bucket] as usize;
        if count == 0 {
            break;
        }
        let end = starts[bucket] as usize;
        let members = &items[end - count..end];

        let mut placed = false;
        'search: for displacement in 0..=slot_mask {
            bucket_slots.clear();
            for &key in members {
                let slot = (folded[key as usize] ^ displacement) & slot_mask;
                if used.get_bit(slot as usize) || bucket_slots.contains(&slot) {
                    continue 'search;
                }
                bucket_slots.push(slot);
            }
            for &slot in bucket_slots.iter() {
                used.set_bit(slot as usize);
            }
            displacements[bucket] = P::from_u64(displacement);
            placed = true;
            break;
        }
        if !placed {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_hash::DefaultSeededHash;
    use crate::seeded_hash::SeededHash;

    fn hash_filler<'a>(keys: &'a [u64]) -> impl FnMut(u64, &mut Vec<u64>) + 'a {
        let family = DefaultSeededHash::default();
        move |seed, out: &mut Vec<u64>| {
            out.clear();
            out.extend(keys.iter().map(|k| family.hash_one(k, seed)));
        }
    }

    fn assert_injective(params: &Params<u32>, keys: &[u64]) {
        let family = DefaultSeededHash::default();
        let mut seen = Bitmap::try_new(params.slot_count()).unwrap();
        for key in keys {
            let slot = params.slot_of(family.hash_one(key, params.seed));
            assert!(
                !seen.get_bit(slot),
                "slot {slot} assigned twice (key {key})"
            );
            seen.set_bit(slot);
        }
    }

    #[test]
    fn builds_injective_mapping() {
        let keys: Vec<u64> = (0..10_000u64).map(|i| i.wrapping_mul(0x9E37)).collect();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut stats = BuildStats::default();
        let slot_bits = required_slot_bits(keys.len(), 0.75);
        let params: Params<u32> = build(
            keys.len(),
            hash_filler(&keys),
            slot_bits,
            &BuildOptions::default(),
            &mut rng,
            mix64,
            &mut stats,
        )
        .unwrap();
        assert_eq!(params.slot_count(), 16_384);
        assert_injective(&params, &keys);
        assert!(stats.seed_attempts >= 1);
        assert!(stats.bucket_factor > 0.0);
    }

    #[test]
    fn empty_input_gets_trivial_parameters() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut stats = BuildStats::default();
        let params: Params<u32> = build(
            0,
            |_, out: &mut Vec<u64>| out.clear(),
            0,
            &BuildOptions::default(),
            &mut rng,
            mix64,
            &mut stats,
        )
        .unwrap();
        assert_eq!(params.bucket_count(), 1);
        assert_eq!(params.slot_count(), 1);
        assert_eq!(params.displacements.len(), 1);
    }

    #[test]
    fn single_key() {
        let keys = [42u64];
        let mut rng = SmallRng::seed_from_u64(2);
        let mut stats = BuildStats::default();
        let params: Params<u32> = build(
            1,
            hash_filler(&keys),
            required_slot_bits(1, 0.75),
            &BuildOptions::default(),
            &mut rng,
            mix64,
            &mut stats,
        )
        .unwrap();
        assert_injective(&params, &keys);
    }

    #[test]
    fn packs_to_high_load_with_narrow_params() {
        // 250 keys into 256 slots: the regime 8-bit parameters are for.
        let keys: Vec<u64> = (0..250u64)
            .map(|i| i.wrapping_mul(0x2545_F491_4F6C_DD1D))
            .collect();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut stats = BuildStats::default();
        let params: Params<u8> = build(
            keys.len(),
            hash_filler(&keys),
            8,
            &BuildOptions::default(),
            &mut rng,
            mix64,
            &mut stats,
        )
        .unwrap();
        let family = DefaultSeededHash::default();
        let mut seen = Bitmap::try_new(256).unwrap();
        for key in &keys {
            let slot = params.slot_of(family.hash_one(key, params.seed));
            assert!(!seen.get_bit(slot));
            seen.set_bit(slot);
        }
    }

    #[test]
    fn indistinguishable_keys_fail_the_budget() {
        // A degenerate family: every key hashes alike under every seed.
        let mut rng = SmallRng::seed_from_u64(4);
        let mut stats = BuildStats::default();
        let result: Result<Params<u32>> = build(
            2,
            |seed, out: &mut Vec<u64>| {
                out.clear();
                out.push(mix64(seed));
                out.push(mix64(seed));
            },
            2,
            &BuildOptions::default(),
            &mut rng,
            mix64,
            &mut stats,
        );
        assert_eq!(result.unwrap_err(), Failure::BuildFailed);
        assert!(stats.seed_attempts >= BuildOptions::default().seed_attempts as u64);
    }

    #[test]
    fn fold_and_bucket_use_disjoint_bits() {
        let params: Params<u32> = Params {
            seed: 99,
            bucket_bits: 4,
            slot_bits: 8,
            displacements: vec![0u32; 16].into_boxed_slice(),
        };
        // Varying only the low (bucket) bits must not move the fold.
        let base = 0xABCD_EF12_3456_7000u64;
        for low in 0..16u64 {
            assert_eq!(params.fold(base | low), params.fold(base));
        }
    }
}
