//! The dynamic perfect-hash table core.
//!
//! [`RawTable<T, P, M>`] stores values of type `T` in a flat slot array
//! governed by a perfect-hash parameter bundle: a seed plus one small
//! displacement per bucket (see [`builder`](crate::builder)). In steady state
//! every lookup is a single computed probe — hash, fold, xor, mask — followed
//! by one key comparison. There is no probing sequence and no tombstone
//! logic; a slot either holds the key or the key is absent.
//!
//! This is a low-level structure in the same spirit as the map/set wrappers'
//! underlying tables elsewhere in the ecosystem: every operation takes the
//! hashing and equality logic as closures. `hash` closures map a *seed* to
//! the probe key's digest under that seed (the table re-seeds on rebuild, so
//! a fixed digest is not enough); `rehash` closures do the same for stored
//! values; `probe` closures supply key-domain digests for the builder's seed
//! schedule. Prefer the [`HashMap`](crate::HashMap) and
//! [`HashSet`](crate::HashSet) wrappers unless you are building your own
//! container on top.
//!
//! ## Mutation strategy
//!
//! Inserting a key whose slot is free is a plain write. Inserting a key
//! whose slot is taken first attempts a *repair*: the key's bucket (a
//! handful of entries, tracked through an intrusive per-bucket chain) is
//! given a fresh displacement that moves all of its members, the new key
//! included, onto free slots. Only when no displacement works — or when the
//! load ceiling is hit — does the table fall back to a full rebuild with a
//! fresh seed. Repairs keep the common colliding insert at a cost
//! proportional to the bucket, not the table.
//!
//! Erase clears the slot's metadata and never rebuilds, so removal is O(1)
//! and leaves capacity slack behind; [`rehash`](RawTable::rehash) reclaims
//! it.
//!
//! ## Guarantees
//!
//! Failed mutations leave the table exactly as it was (the builder runs
//! against borrowed entries and new storage is fully allocated before
//! anything moves). Any operation that may relocate slots — any insert —
//! invalidates iterators and outstanding references, which the borrow
//! checker enforces. The table is single-threaded by construction: nothing
//! here synchronizes.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::mem::MaybeUninit;

use cfg_if::cfg_if;
use log::debug;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::builder;
use crate::builder::BucketParam;
use crate::builder::BuildOptions;
use crate::builder::BuildStats;
use crate::builder::Params;
use crate::builder::entropy_seed;
use crate::builder::required_slot_bits;
use crate::error::Failure;
use crate::error::Result;
use crate::meta::Filled;
use crate::meta::SlotMeta;
use crate::meta::fingerprint;
use crate::meta::fingerprint_seed;

cfg_if! {
    if #[cfg(feature = "load-ninety")] {
        const DEFAULT_MAX_LOAD: f32 = 0.90;
    } else {
        const DEFAULT_MAX_LOAD: f32 = 0.75;
    }
}

/// Chain terminator for the per-bucket member lists.
const NIL: usize = usize::MAX;

/// Buckets larger than this skip the repair path; displacement repair is for
/// the common small bucket, a bucket this crowded means the parameters are
/// degenerate and a rebuild is due anyway.
const REPAIR_MAX_BUCKET: usize = 16;

/// Displacement candidates examined during a repair before giving up.
const REPAIR_SCAN: u64 = 1 << 13;

fn try_uninit_slots<T>(len: usize) -> Result<Box<[MaybeUninit<T>]>> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(len)
        .map_err(|_| Failure::AllocationFailed)?;
    slots.resize_with(len, MaybeUninit::uninit);
    Ok(slots.into_boxed_slice())
}

fn try_links(len: usize) -> Result<Box<[usize]>> {
    let mut links = Vec::new();
    links
        .try_reserve_exact(len)
        .map_err(|_| Failure::AllocationFailed)?;
    links.resize(len, NIL);
    Ok(links.into_boxed_slice())
}

/// A dynamic perfect-hash table of values `T`, displacement type `P`, slot
/// metadata policy `M`.
///
/// See the [module documentation](self) for the closure conventions and the
/// mutation strategy.
pub struct RawTable<T, P: BucketParam = u32, M: SlotMeta = Filled> {
    params: Params<P>,
    slots: Box<[MaybeUninit<T>]>,
    meta: M,
    /// Head slot of each bucket's member chain.
    bucket_heads: Box<[usize]>,
    /// Next slot in the owning bucket's chain, per slot.
    slot_next: Box<[usize]>,
    len: usize,
    max_load: f32,
    /// Consecutive collision-forced rebuilds; drives adaptive bucket widening.
    collision_streak: u32,
    bucket_factor: f32,
    options: BuildOptions,
    stats: BuildStats,
    rng: SmallRng,
}

impl<T, P: BucketParam, M: SlotMeta> RawTable<T, P, M> {
    /// Creates an empty table.
    ///
    /// # Panics
    ///
    /// Panics if the one-slot initial storage cannot be allocated.
    pub fn new() -> Self {
        match Self::try_with_capacity_and_seed(0, entropy_seed()) {
            Ok(table) => table,
            Err(failure) => panic!("RawTable::new: {failure}"),
        }
    }

    /// Creates a table able to hold `capacity` entries without rebuilding.
    ///
    /// # Panics
    ///
    /// Panics if storage cannot be allocated or `capacity` is not
    /// addressable with parameter `P` (see [`Failure::CapacityExceeded`]).
    pub fn with_capacity(capacity: usize) -> Self {
        match Self::try_with_capacity(capacity) {
            Ok(table) => table,
            Err(failure) => panic!("RawTable::with_capacity: {failure}"),
        }
    }

    /// Fallible version of [`with_capacity`](Self::with_capacity).
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        Self::try_with_capacity_and_seed(capacity, entropy_seed())
    }

    /// Creates an empty table whose seed schedule is derived entirely from
    /// `seed`, for reproducible builds.
    pub fn with_seed(seed: u64) -> Self {
        match Self::try_with_capacity_and_seed(0, seed) {
            Ok(table) => table,
            Err(failure) => panic!("RawTable::with_seed: {failure}"),
        }
    }

    fn try_with_capacity_and_seed(capacity: usize, seed: u64) -> Result<Self> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let max_load = DEFAULT_MAX_LOAD.min(M::load_factor_ceiling(P::BITS));
        let slot_bits = required_slot_bits(capacity, max_load);
        if slot_bits > M::max_slot_bits(P::BITS) {
            return Err(Failure::CapacityExceeded);
        }
        let slot_count = 1usize << slot_bits;
        let options = BuildOptions::default();
        Ok(RawTable {
            params: Params::trivial(rng.next_u64(), slot_bits),
            slots: try_uninit_slots(slot_count)?,
            meta: M::for_slots(slot_count)?,
            bucket_heads: try_links(1)?,
            slot_next: try_links(slot_count)?,
            len: 0,
            max_load,
            collision_streak: 0,
            bucket_factor: options.bucket_factor,
            options,
            stats: BuildStats::default(),
            rng,
        })
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table stores no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the slot region.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.params.slot_count()
    }

    /// Number of displacement buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.params.bucket_count()
    }

    /// Entries the table can hold before the next insert forces a rebuild.
    #[inline]
    pub fn capacity(&self) -> usize {
        (self.params.slot_count() as f64 * self.max_load as f64) as usize
    }

    /// Current load: `len / slot_count`.
    #[inline]
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.params.slot_count() as f32
    }

    /// The configured load ceiling.
    #[inline]
    pub fn max_load_factor(&self) -> f32 {
        self.max_load
    }

    /// Sets the load ceiling.
    ///
    /// Values above the policy's limit for the parameter width are clamped
    /// down to it. Takes effect on the next rebuild; the table is not
    /// reorganized eagerly.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is not positive.
    pub fn set_max_load_factor(&mut self, factor: f32) {
        assert!(factor > 0.0, "max_load_factor must be positive");
        self.max_load = factor.min(M::load_factor_ceiling(P::BITS));
    }

    /// The builder knobs used by future rebuilds.
    pub fn build_options(&self) -> BuildOptions {
        self.options
    }

    /// Replaces the builder knobs (and resets adaptive widening).
    pub fn set_build_options(&mut self, options: BuildOptions) {
        self.bucket_factor = options.bucket_factor;
        self.collision_streak = 0;
        self.options = options;
    }

    /// Construction-work counters accumulated over the table's lifetime.
    pub fn build_stats(&self) -> BuildStats {
        self.stats
    }

    /// A snapshot of the installed parameter bundle.
    pub fn params(&self) -> TableParams {
        TableParams {
            seed: self.params.seed,
            bucket_count: self.params.bucket_count(),
            slot_count: self.params.slot_count(),
            len: self.len,
            load_factor: self.load_factor(),
            max_load_factor: self.max_load,
            displacement_bits: P::BITS,
            fingerprinted: M::USES_FINGERPRINT,
        }
    }

    /// Looks up a value.
    ///
    /// `hash` must map a seed to the probe key's digest under that seed;
    /// `eq` decides whether a candidate value carries the probe key.
    #[inline]
    pub fn find(&self, hash: impl Fn(u64) -> u64, eq: impl Fn(&T) -> bool) -> Option<&T> {
        let slot = match self.probe_slot(&hash) {
            Some(slot) => slot,
            None => return None,
        };
        // SAFETY: `probe_slot` only reports occupied slots, and occupied
        // slots always hold initialized values.
        let value = unsafe { self.slots[slot].assume_init_ref() };
        eq(value).then_some(value)
    }

    /// Looks up a value for mutation.
    #[inline]
    pub fn find_mut(&mut self, hash: impl Fn(u64) -> u64, eq: impl Fn(&T) -> bool) -> Option<&mut T> {
        let slot = match self.probe_slot(&hash) {
            Some(slot) => slot,
            None => return None,
        };
        // SAFETY: as in `find`.
        let value = unsafe { self.slots[slot].assume_init_mut() };
        if eq(value) { Some(value) } else { None }
    }

    /// Returns the value stored for the probe key without any occupancy or
    /// equality check.
    ///
    /// # Safety
    ///
    /// The key must currently be stored in the table.
    #[inline]
    pub unsafe fn get_unchecked(&self, hash: impl Fn(u64) -> u64) -> &T {
        let slot = self.params.slot_of(hash(self.params.seed));
        // SAFETY: the caller guarantees the key is present, so its computed
        // slot holds an initialized value.
        unsafe { self.slots[slot].assume_init_ref() }
    }

    /// Computes the probe key's slot and applies the metadata check.
    #[inline(always)]
    fn probe_slot(&self, hash: &impl Fn(u64) -> u64) -> Option<usize> {
        let slot = self.params.slot_of(hash(self.params.seed));
        if M::USES_FINGERPRINT {
            let tag = fingerprint(hash(fingerprint_seed(self.params.seed)));
            self.meta.matches(slot, tag).then_some(slot)
        } else {
            self.meta.is_occupied(slot).then_some(slot)
        }
    }

    /// Removes and returns the value stored for the probe key.
    pub fn remove(&mut self, hash: impl Fn(u64) -> u64, eq: impl Fn(&T) -> bool) -> Option<T> {
        let digest = hash(self.params.seed);
        let slot = self.params.slot_of(digest);
        if !self.meta.is_occupied(slot) {
            return None;
        }
        // SAFETY: occupied slots hold initialized values.
        if !eq(unsafe { self.slots[slot].assume_init_ref() }) {
            return None;
        }
        self.unlink(self.params.bucket_of(digest), slot);
        self.meta.clear(slot);
        self.len -= 1;
        // SAFETY: checked occupied above; metadata now marks it free, so the
        // value is moved out exactly once.
        Some(unsafe { self.slots[slot].assume_init_read() })
    }

    /// Removes and returns the value at `slot`, if any.
    ///
    /// `rehash` is needed to locate the entry's bucket chain.
    pub fn erase_slot(&mut self, slot: usize, rehash: impl Fn(&T, u64) -> u64) -> Option<T> {
        if slot >= self.slots.len() || !self.meta.is_occupied(slot) {
            return None;
        }
        // SAFETY: occupied slots hold initialized values.
        let digest = rehash(unsafe { self.slots[slot].assume_init_ref() }, self.params.seed);
        debug_assert_eq!(self.params.slot_of(digest), slot);
        self.unlink(self.params.bucket_of(digest), slot);
        self.meta.clear(slot);
        self.len -= 1;
        // SAFETY: as in `remove`.
        Some(unsafe { self.slots[slot].assume_init_read() })
    }

    /// Resolves the probe key to an [`Entry`], rebuilding if an insert into
    /// the vacant case would need it.
    ///
    /// # Panics
    ///
    /// Panics if a required rebuild fails; see [`try_entry`](Self::try_entry).
    pub fn entry<'a>(
        &'a mut self,
        hash: impl Fn(u64) -> u64,
        eq: impl Fn(&T) -> bool,
        rehash: impl Fn(&T, u64) -> u64,
        probe: impl FnMut(u64) -> u64,
    ) -> Entry<'a, T, P, M> {
        match self.try_entry(hash, eq, rehash, probe) {
            Ok(entry) => entry,
            Err(failure) => panic!("RawTable::entry: {failure}"),
        }
    }

    /// Resolves the probe key to an [`Entry`].
    ///
    /// The vacant case is fully placed on return: if the key's slot is taken
    /// or the table is at its load ceiling, the table is repaired or rebuilt
    /// *now*, so that [`VacantEntry::insert`] is a plain write. An `Err`
    /// leaves the table untouched.
    pub fn try_entry<'a>(
        &'a mut self,
        hash: impl Fn(u64) -> u64,
        eq: impl Fn(&T) -> bool,
        rehash: impl Fn(&T, u64) -> u64,
        mut probe: impl FnMut(u64) -> u64,
    ) -> Result<Entry<'a, T, P, M>> {
        let mut digest = hash(self.params.seed);
        let slot = self.params.slot_of(digest);
        let collided = self.meta.is_occupied(slot);
        if collided {
            // SAFETY: occupied slots hold initialized values.
            if eq(unsafe { self.slots[slot].assume_init_ref() }) {
                self.collision_streak = 0;
                return Ok(Entry::Occupied(OccupiedEntry {
                    bucket: self.params.bucket_of(digest),
                    table: self,
                    slot,
                }));
            }
        }

        let target = if !collided && self.len < self.capacity() {
            slot
        } else if collided && self.len < self.capacity() {
            match self.repair(digest) {
                Some(free) => {
                    self.stats.repairs += 1;
                    self.collision_streak = 0;
                    free
                }
                None => {
                    self.note_collision_rebuild();
                    self.rebuild_for(self.len + 1, true, Some(&hash), &rehash, &mut probe)?;
                    digest = hash(self.params.seed);
                    self.params.slot_of(digest)
                }
            }
        } else {
            self.collision_streak = 0;
            self.rebuild_for(self.len + 1, true, Some(&hash), &rehash, &mut probe)?;
            digest = hash(self.params.seed);
            self.params.slot_of(digest)
        };
        debug_assert!(!self.meta.is_occupied(target));

        let tag = if M::USES_FINGERPRINT {
            fingerprint(hash(fingerprint_seed(self.params.seed)))
        } else {
            0
        };
        Ok(Entry::Vacant(VacantEntry {
            bucket: self.params.bucket_of(digest),
            table: self,
            slot: target,
            tag,
        }))
    }

    /// Ensures room for `additional` more values, rebuilding at a larger
    /// slot region if needed.
    ///
    /// # Panics
    ///
    /// Panics on failure; see [`try_reserve`](Self::try_reserve).
    pub fn reserve(
        &mut self,
        additional: usize,
        rehash: impl Fn(&T, u64) -> u64,
        probe: impl FnMut(u64) -> u64,
    ) {
        if let Err(failure) = self.try_reserve(additional, rehash, probe) {
            panic!("RawTable::reserve: {failure}");
        }
    }

    /// Fallible version of [`reserve`](Self::reserve).
    pub fn try_reserve(
        &mut self,
        additional: usize,
        rehash: impl Fn(&T, u64) -> u64,
        mut probe: impl FnMut(u64) -> u64,
    ) -> Result<()> {
        let target = self
            .len
            .checked_add(additional)
            .ok_or(Failure::CapacityExceeded)?;
        if target <= self.capacity() {
            return Ok(());
        }
        self.rebuild_for(target, true, None, &rehash, &mut probe)
    }

    /// Forces a rebuild sized for `capacity_for` entries (at least the
    /// current length), reclaiming erase slack and redrawing all parameters.
    ///
    /// # Panics
    ///
    /// Panics on failure; see [`try_rehash`](Self::try_rehash).
    pub fn rehash(
        &mut self,
        capacity_for: usize,
        rehash: impl Fn(&T, u64) -> u64,
        probe: impl FnMut(u64) -> u64,
    ) {
        if let Err(failure) = self.try_rehash(capacity_for, rehash, probe) {
            panic!("RawTable::rehash: {failure}");
        }
    }

    /// Fallible version of [`rehash`](Self::rehash).
    pub fn try_rehash(
        &mut self,
        capacity_for: usize,
        rehash: impl Fn(&T, u64) -> u64,
        mut probe: impl FnMut(u64) -> u64,
    ) -> Result<()> {
        self.rebuild_for(capacity_for.max(self.len), false, None, &rehash, &mut probe)
    }

    /// Drops every value, retaining capacity and parameters.
    pub fn clear(&mut self) {
        if mem::needs_drop::<T>() {
            let mut cursor = self.meta.next_occupied(0);
            while let Some(slot) = cursor {
                // SAFETY: occupied slots hold initialized values; metadata is
                // wiped right after the loop, so nothing is dropped twice.
                unsafe { self.slots[slot].assume_init_drop() };
                cursor = self.meta.next_occupied(slot + 1);
            }
        }
        self.meta.clear_all();
        self.bucket_heads.fill(NIL);
        self.len = 0;
    }

    /// Borrowing iterator over the stored values, in slot order.
    pub fn iter(&self) -> Iter<'_, T, M> {
        Iter {
            slots: &self.slots,
            meta: &self.meta,
            cursor: 0,
            remaining: self.len,
        }
    }

    /// Mutably borrowing iterator over the stored values, in slot order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T, M> {
        IterMut {
            slots: self.slots.as_mut_ptr(),
            meta: &self.meta,
            cursor: 0,
            remaining: self.len,
            _values: PhantomData,
        }
    }

    /// Removes and yields every value. Dropping the iterator finishes the
    /// removal; the table is empty afterwards.
    pub fn drain(&mut self) -> Drain<'_, T, P, M> {
        Drain {
            table: self,
            cursor: 0,
        }
    }

    fn link(&mut self, bucket: usize, slot: usize) {
        self.slot_next[slot] = self.bucket_heads[bucket];
        self.bucket_heads[bucket] = slot;
    }

    fn unlink(&mut self, bucket: usize, slot: usize) {
        let mut cursor = self.bucket_heads[bucket];
        if cursor == slot {
            self.bucket_heads[bucket] = self.slot_next[slot];
            return;
        }
        while cursor != NIL {
            let next = self.slot_next[cursor];
            if next == slot {
                self.slot_next[cursor] = self.slot_next[slot];
                return;
            }
            cursor = next;
        }
        debug_assert!(false, "slot {slot} missing from its bucket chain");
    }

    fn note_collision_rebuild(&mut self) {
        self.collision_streak += 1;
        if self.collision_streak >= 2 && self.bucket_factor > 0.5 {
            self.bucket_factor /= 2.0;
            self.collision_streak = 0;
            debug!(
                "adaptive bucket widening: factor now {}",
                self.bucket_factor
            );
        }
    }

    /// Tries to resolve an insert collision by re-displacing the new key's
    /// bucket only.
    ///
    /// On success all of the bucket's members (the chain plus the pending
    /// key) sit on free, distinct slots under the bucket's new displacement;
    /// the pending key's slot is returned, still unoccupied.
    fn repair(&mut self, new_hash: u64) -> Option<usize> {
        let bucket = self.params.bucket_of(new_hash);
        let slot_mask = (self.params.slot_count() - 1) as u64;
        let current = self.params.displacements[bucket].to_u64();
        let new_fold = self.params.fold(new_hash) & slot_mask;

        // Collect the bucket's members; each fold is recovered from the slot
        // it currently occupies, no rehashing involved.
        let mut members: Vec<(usize, u64, u8)> = Vec::new();
        let mut cursor = self.bucket_heads[bucket];
        while cursor != NIL {
            if members.len() == REPAIR_MAX_BUCKET {
                return None;
            }
            let fold = (cursor as u64 ^ current) & slot_mask;
            if fold == new_fold {
                // The new key shadows a stored one under every displacement;
                // only a reseed can separate them.
                return None;
            }
            members.push((cursor, fold, self.meta.raw_tag(cursor)));
            cursor = self.slot_next[cursor];
        }

        // Member folds are pairwise distinct (they occupy distinct slots
        // under the current displacement), so candidate slots are too; the
        // scan only needs each candidate to be free or vacated by us.
        let is_member_slot = |members: &[(usize, u64, u8)], slot: usize| {
            members.iter().any(|&(member, _, _)| member == slot)
        };
        let mut chosen = None;
        'scan: for displacement in 0..=slot_mask.min(REPAIR_SCAN - 1) {
            if displacement == current {
                continue;
            }
            let candidate = (new_fold ^ displacement) as usize & slot_mask as usize;
            if self.meta.is_occupied(candidate) && !is_member_slot(&members, candidate) {
                continue;
            }
            for &(_, fold, _) in &members {
                let slot = (fold ^ displacement) as usize & slot_mask as usize;
                if self.meta.is_occupied(slot) && !is_member_slot(&members, slot) {
                    continue 'scan;
                }
            }
            chosen = Some(displacement);
            break;
        }
        let displacement = chosen?;

        // Relocate: move values out, clear the old slots, then write them
        // back under the new displacement. No user code runs in between.
        let mut values: Vec<T> = Vec::with_capacity(members.len());
        for &(slot, _, _) in &members {
            // SAFETY: members are occupied slots; each is read exactly once
            // and its metadata cleared below before anything can observe it.
            values.push(unsafe { self.slots[slot].assume_init_read() });
            self.meta.clear(slot);
        }
        self.bucket_heads[bucket] = NIL;
        self.params.displacements[bucket] = P::from_u64(displacement);
        for (&(_, fold, tag), value) in members.iter().zip(values) {
            let slot = (fold ^ displacement) as usize & slot_mask as usize;
            self.slots[slot].write(value);
            self.meta.mark(slot, tag);
            self.link(bucket, slot);
        }
        Some((new_fold ^ displacement) as usize & slot_mask as usize)
    }

    /// Rebuilds the parameter bundle for `target_n` entries (current entries
    /// plus, optionally, one pending key) and migrates storage.
    ///
    /// Nothing is mutated until a bundle is found and all new storage is
    /// allocated, so failure leaves the table intact.
    fn rebuild_for(
        &mut self,
        target_n: usize,
        keep_region: bool,
        pending: Option<&dyn Fn(u64) -> u64>,
        rehash: &impl Fn(&T, u64) -> u64,
        probe: &mut impl FnMut(u64) -> u64,
    ) -> Result<()> {
        let mut slot_bits = required_slot_bits(target_n, self.max_load);
        if keep_region {
            // Insert- and reserve-path rebuilds never shrink the slot
            // region; only an explicit rehash reclaims slack.
            slot_bits = slot_bits.max(self.params.slot_bits);
        }
        if slot_bits > M::max_slot_bits(P::BITS) {
            return Err(Failure::CapacityExceeded);
        }
        let n = self.len + pending.is_some() as usize;
        debug_assert!(n <= target_n.max(1));

        let new_params = {
            let RawTable {
                ref slots,
                ref meta,
                ref mut rng,
                ref mut stats,
                ..
            } = *self;
            let fill = |seed: u64, out: &mut Vec<u64>| {
                out.clear();
                let mut cursor = meta.next_occupied(0);
                while let Some(slot) = cursor {
                    // SAFETY: occupied slots hold initialized values.
                    out.push(rehash(unsafe { slots[slot].assume_init_ref() }, seed));
                    cursor = meta.next_occupied(slot + 1);
                }
                if let Some(pending) = pending {
                    out.push(pending(seed));
                }
            };
            let options = BuildOptions {
                bucket_factor: self.bucket_factor,
                ..self.options
            };
            builder::build::<P, _, _>(n, fill, slot_bits, &options, rng, &mut *probe, stats)?
        };

        // Plan every move up front; hashing is user code and must finish
        // before the first value is displaced.
        let tag_seed = fingerprint_seed(new_params.seed);
        let mut moves: Vec<(usize, u64, u8)> = Vec::new();
        moves
            .try_reserve_exact(self.len)
            .map_err(|_| Failure::AllocationFailed)?;
        let mut cursor = self.meta.next_occupied(0);
        while let Some(slot) = cursor {
            // SAFETY: occupied slots hold initialized values.
            let value = unsafe { self.slots[slot].assume_init_ref() };
            let digest = rehash(value, new_params.seed);
            let tag = if M::USES_FINGERPRINT {
                fingerprint(rehash(value, tag_seed))
            } else {
                0
            };
            moves.push((slot, digest, tag));
            cursor = self.meta.next_occupied(slot + 1);
        }

        let slot_count = new_params.slot_count();
        let mut new_slots = try_uninit_slots::<T>(slot_count)?;
        let mut new_meta = M::for_slots(slot_count)?;
        let mut new_heads = try_links(new_params.bucket_count())?;
        let mut new_next = try_links(slot_count)?;

        for &(old_slot, digest, tag) in &moves {
            // SAFETY: `moves` lists each occupied slot once; the old
            // metadata is discarded wholesale below, so no value is read or
            // dropped twice.
            let value = unsafe { self.slots[old_slot].assume_init_read() };
            let slot = new_params.slot_of(digest);
            let bucket = new_params.bucket_of(digest);
            debug_assert!(!new_meta.is_occupied(slot));
            new_slots[slot].write(value);
            new_meta.mark(slot, tag);
            new_next[slot] = new_heads[bucket];
            new_heads[bucket] = slot;
        }

        self.params = new_params;
        self.slots = new_slots;
        self.meta = new_meta;
        self.bucket_heads = new_heads;
        self.slot_next = new_next;
        self.stats.rebuilds += 1;
        debug!(
            "rebuilt: len={} slots={} buckets={} seed={:#018x}",
            self.len,
            self.params.slot_count(),
            self.params.bucket_count(),
            self.params.seed,
        );
        Ok(())
    }
}

impl<T, P: BucketParam, M: SlotMeta> Default for RawTable<T, P, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: BucketParam, M: SlotMeta> Drop for RawTable<T, P, M> {
    fn drop(&mut self) {
        if mem::needs_drop::<T>() {
            let mut cursor = self.meta.next_occupied(0);
            while let Some(slot) = cursor {
                // SAFETY: occupied slots hold initialized values, each
                // dropped exactly once here.
                unsafe { self.slots[slot].assume_init_drop() };
                cursor = self.meta.next_occupied(slot + 1);
            }
        }
    }
}

impl<T: Clone, P: BucketParam, M: SlotMeta> Clone for RawTable<T, P, M> {
    fn clone(&self) -> Self {
        let mut slots = match try_uninit_slots::<T>(self.slots.len()) {
            Ok(slots) => slots,
            Err(failure) => panic!("RawTable::clone: {failure}"),
        };

        // If a value's `clone` panics, the guard drops the clones made so
        // far instead of leaking them.
        struct PartialClone<'a, T> {
            slots: &'a mut [MaybeUninit<T>],
            written: Vec<usize>,
        }
        impl<T> Drop for PartialClone<'_, T> {
            fn drop(&mut self) {
                for &slot in &self.written {
                    // SAFETY: every recorded slot was just written.
                    unsafe { self.slots[slot].assume_init_drop() };
                }
            }
        }

        let mut guard = PartialClone {
            slots: &mut slots,
            written: Vec::with_capacity(self.len),
        };
        let mut cursor = self.meta.next_occupied(0);
        while let Some(slot) = cursor {
            // SAFETY: occupied slots hold initialized values.
            let value = unsafe { self.slots[slot].assume_init_ref() }.clone();
            guard.slots[slot].write(value);
            guard.written.push(slot);
            cursor = self.meta.next_occupied(slot + 1);
        }
        mem::forget(guard);

        RawTable {
            params: self.params.clone(),
            slots,
            meta: self.meta.clone(),
            bucket_heads: self.bucket_heads.clone(),
            slot_next: self.slot_next.clone(),
            len: self.len,
            max_load: self.max_load,
            collision_streak: self.collision_streak,
            bucket_factor: self.bucket_factor,
            options: self.options,
            stats: self.stats,
            rng: self.rng.clone(),
        }
    }
}

impl<T, P: BucketParam, M: SlotMeta> fmt::Debug for RawTable<T, P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTable")
            .field("len", &self.len)
            .field("slot_count", &self.params.slot_count())
            .field("bucket_count", &self.params.bucket_count())
            .field("seed", &self.params.seed)
            .finish_non_exhaustive()
    }
}

/// Introspection snapshot of a table's parameter bundle; [`Display`] prints
/// it on one line.
///
/// [`Display`]: fmt::Display
#[derive(Clone, Copy, Debug)]
pub struct TableParams {
    /// Seed of the installed perfect hash.
    pub seed: u64,
    /// Number of displacement buckets.
    pub bucket_count: usize,
    /// Size of the slot region.
    pub slot_count: usize,
    /// Stored entries.
    pub len: usize,
    /// `len / slot_count`.
    pub load_factor: f32,
    /// Configured load ceiling.
    pub max_load_factor: f32,
    /// Width of the displacement integers.
    pub displacement_bits: u32,
    /// Whether slots carry fingerprint tags.
    pub fingerprinted: bool,
}

impl fmt::Display for TableParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "len={} slots={} buckets={} load={:.3}/{:.3} disp=u{}{} seed={:#018x}",
            self.len,
            self.slot_count,
            self.bucket_count,
            self.load_factor,
            self.max_load_factor,
            self.displacement_bits,
            if self.fingerprinted { " tagged" } else { "" },
            self.seed,
        )
    }
}

/// A view into a slot resolved by [`RawTable::entry`].
pub enum Entry<'a, T, P: BucketParam, M: SlotMeta> {
    /// The key is stored.
    Occupied(OccupiedEntry<'a, T, P, M>),
    /// The key is absent; its slot is reserved and free.
    Vacant(VacantEntry<'a, T, P, M>),
}

/// A stored entry.
pub struct OccupiedEntry<'a, T, P: BucketParam, M: SlotMeta> {
    table: &'a mut RawTable<T, P, M>,
    slot: usize,
    bucket: usize,
}

impl<'a, T, P: BucketParam, M: SlotMeta> OccupiedEntry<'a, T, P, M> {
    /// The slot index the entry occupies (stable until the next rebuild).
    pub fn slot_index(&self) -> usize {
        self.slot
    }

    /// Borrows the value.
    pub fn get(&self) -> &T {
        // SAFETY: an OccupiedEntry always points at an occupied slot.
        unsafe { self.table.slots[self.slot].assume_init_ref() }
    }

    /// Mutably borrows the value.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: as in `get`.
        unsafe { self.table.slots[self.slot].assume_init_mut() }
    }

    /// Converts into a mutable borrow tied to the table.
    pub fn into_mut(self) -> &'a mut T {
        // SAFETY: as in `get`.
        unsafe { self.table.slots[self.slot].assume_init_mut() }
    }

    /// Removes the entry and returns the value.
    pub fn remove(self) -> T {
        self.table.unlink(self.bucket, self.slot);
        self.table.meta.clear(self.slot);
        self.table.len -= 1;
        // SAFETY: the slot was occupied and is now marked free, so the value
        // is moved out exactly once.
        unsafe { self.table.slots[self.slot].assume_init_read() }
    }
}

/// A reserved, free slot for an absent key.
pub struct VacantEntry<'a, T, P: BucketParam, M: SlotMeta> {
    table: &'a mut RawTable<T, P, M>,
    slot: usize,
    bucket: usize,
    tag: u8,
}

impl<'a, T, P: BucketParam, M: SlotMeta> VacantEntry<'a, T, P, M> {
    /// Writes the value and returns a mutable borrow of it.
    pub fn insert(self, value: T) -> &'a mut T {
        let VacantEntry {
            table,
            slot,
            bucket,
            tag,
        } = self;
        debug_assert!(!table.meta.is_occupied(slot));
        table.meta.mark(slot, tag);
        table.slot_next[slot] = table.bucket_heads[bucket];
        table.bucket_heads[bucket] = slot;
        table.len += 1;
        table.slots[slot].write(value)
    }
}

/// Borrowing iterator over a table's values.
pub struct Iter<'a, T, M: SlotMeta> {
    slots: &'a [MaybeUninit<T>],
    meta: &'a M,
    cursor: usize,
    remaining: usize,
}

impl<'a, T, M: SlotMeta> Iterator for Iter<'a, T, M> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.meta.next_occupied(self.cursor)?;
        self.cursor = slot + 1;
        self.remaining -= 1;
        // SAFETY: occupied slots hold initialized values.
        Some(unsafe { self.slots[slot].assume_init_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, M: SlotMeta> ExactSizeIterator for Iter<'_, T, M> {}

/// Mutably borrowing iterator over a table's values.
pub struct IterMut<'a, T, M: SlotMeta> {
    slots: *mut MaybeUninit<T>,
    meta: &'a M,
    cursor: usize,
    remaining: usize,
    _values: PhantomData<&'a mut T>,
}

impl<'a, T, M: SlotMeta> Iterator for IterMut<'a, T, M> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.meta.next_occupied(self.cursor)?;
        self.cursor = slot + 1;
        self.remaining -= 1;
        // SAFETY: occupied slots hold initialized values; the cursor only
        // advances, so each slot is handed out at most once.
        Some(unsafe { (*self.slots.add(slot)).assume_init_mut() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, M: SlotMeta> ExactSizeIterator for IterMut<'_, T, M> {}

/// Draining iterator; empties the table when dropped.
pub struct Drain<'a, T, P: BucketParam, M: SlotMeta> {
    table: &'a mut RawTable<T, P, M>,
    cursor: usize,
}

impl<T, P: BucketParam, M: SlotMeta> Iterator for Drain<'_, T, P, M> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.table.meta.next_occupied(self.cursor)?;
        self.cursor = slot + 1;
        self.table.meta.clear(slot);
        self.table.len -= 1;
        // SAFETY: the slot was occupied and is now marked free, so the value
        // is moved out exactly once.
        Some(unsafe { self.table.slots[slot].assume_init_read() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len, Some(self.table.len))
    }
}

impl<T, P: BucketParam, M: SlotMeta> Drop for Drain<'_, T, P, M> {
    fn drop(&mut self) {
        for _ in &mut *self {}
        self.table.bucket_heads.fill(NIL);
        debug_assert_eq!(self.table.len, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ByteTags;
    use crate::seeded_hash::DefaultSeededHash;
    use crate::seeded_hash::SeededHash;
    use crate::seeded_hash::mix64;

    fn family() -> DefaultSeededHash {
        DefaultSeededHash::default()
    }

    fn insert_key<P: BucketParam, M: SlotMeta>(table: &mut RawTable<u64, P, M>, key: u64) -> bool {
        let family = family();
        match table.entry(
            |seed| family.hash_one(&key, seed),
            |&stored| stored == key,
            |&stored, seed| family.hash_one(&stored, seed),
            mix64,
        ) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(key);
                true
            }
        }
    }

    fn find_key<P: BucketParam, M: SlotMeta>(table: &RawTable<u64, P, M>, key: u64) -> bool {
        let family = family();
        table
            .find(|seed| family.hash_one(&key, seed), |&stored| stored == key)
            .is_some()
    }

    fn check_invariants<P: BucketParam, M: SlotMeta>(table: &RawTable<u64, P, M>) {
        assert_eq!(table.len(), table.meta.occupied_count());
        assert!(table.len() <= table.capacity());
        assert_eq!(table.iter().count(), table.len());
        let family = family();
        for &key in table.iter() {
            let slot = table.params.slot_of(family.hash_one(&key, table.params.seed));
            assert!(table.meta.is_occupied(slot));
        }
    }

    fn exercise_generic<M: SlotMeta>() {
        let mut table: RawTable<u64, u32, M> = RawTable::with_seed(0xFEED);
        for key in 0..1_000u64 {
            assert!(insert_key(&mut table, key));
            assert!(!insert_key(&mut table, key));
        }
        assert_eq!(table.len(), 1_000);
        check_invariants(&table);
        for key in 0..1_000u64 {
            assert!(find_key(&table, key), "missing {key}");
        }
        for key in 1_000..2_000u64 {
            assert!(!find_key(&table, key), "phantom {key}");
        }

        let family = family();
        for key in (0..1_000u64).step_by(2) {
            let removed = table.remove(
                |seed| family.hash_one(&key, seed),
                |&stored| stored == key,
            );
            assert_eq!(removed, Some(key));
        }
        assert_eq!(table.len(), 500);
        check_invariants(&table);
        for key in 0..1_000u64 {
            assert_eq!(find_key(&table, key), key % 2 == 1);
        }

        // Erased slots are reusable without growing.
        let slots_before = table.slot_count();
        for key in (0..1_000u64).step_by(2) {
            assert!(insert_key(&mut table, key));
        }
        assert_eq!(table.len(), 1_000);
        assert_eq!(table.slot_count(), slots_before);
        check_invariants(&table);
    }

    #[test]
    fn insert_find_remove_bitmap() {
        exercise_generic::<Filled>();
    }

    #[test]
    fn insert_find_remove_tagged() {
        exercise_generic::<ByteTags>();
    }

    #[test]
    fn empty_table_probes_cleanly() {
        let table: RawTable<u64> = RawTable::with_seed(1);
        assert!(table.is_empty());
        assert_eq!(table.slot_count(), 1);
        assert!(!find_key(&table, 7));
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn entry_occupied_remove_by_slot() {
        let mut table: RawTable<u64> = RawTable::with_seed(2);
        for key in 0..50u64 {
            insert_key(&mut table, key);
        }
        let family = family();
        match table.entry(
            |seed| family.hash_one(&17u64, seed),
            |&stored| stored == 17,
            |&stored, seed| family.hash_one(&stored, seed),
            mix64,
        ) {
            Entry::Occupied(occupied) => {
                assert_eq!(*occupied.get(), 17);
                assert_eq!(occupied.remove(), 17);
            }
            Entry::Vacant(_) => panic!("17 should be stored"),
        }
        assert_eq!(table.len(), 49);
        assert!(!find_key(&table, 17));
        check_invariants(&table);
    }

    #[test]
    fn erase_slot_roundtrip() {
        let mut table: RawTable<u64> = RawTable::with_seed(3);
        for key in 0..20u64 {
            insert_key(&mut table, key);
        }
        let family = family();
        let slot = table
            .params
            .slot_of(family.hash_one(&5u64, table.params.seed));
        let erased = table.erase_slot(slot, |&stored, seed| family.hash_one(&stored, seed));
        assert_eq!(erased, Some(5));
        assert_eq!(table.erase_slot(slot, |&stored, seed| family.hash_one(&stored, seed)), None);
        assert!(!find_key(&table, 5));
        check_invariants(&table);
    }

    #[test]
    fn clear_retains_capacity() {
        let mut table: RawTable<u64> = RawTable::with_seed(4);
        for key in 0..100u64 {
            insert_key(&mut table, key);
        }
        let slots = table.slot_count();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.slot_count(), slots);
        assert!(!find_key(&table, 1));
        for key in 0..100u64 {
            assert!(insert_key(&mut table, key));
        }
        check_invariants(&table);
    }

    #[test]
    fn clone_is_independent() {
        let mut original: RawTable<u64> = RawTable::with_seed(5);
        for key in 0..200u64 {
            insert_key(&mut original, key);
        }
        let copy = original.clone();
        original.clear();
        assert_eq!(copy.len(), 200);
        for key in 0..200u64 {
            assert!(find_key(&copy, key));
        }
        let mut copy = copy;
        assert!(insert_key(&mut copy, 777));
        assert!(original.is_empty());
    }

    #[test]
    fn drain_empties() {
        let mut table: RawTable<u64> = RawTable::with_seed(6);
        for key in 0..64u64 {
            insert_key(&mut table, key);
        }
        let mut drained: Vec<u64> = table.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..64).collect::<Vec<u64>>());
        assert!(table.is_empty());
        assert!(insert_key(&mut table, 3));
        check_invariants(&table);
    }

    #[test]
    fn reserve_then_inserts_keep_the_region() {
        let mut table: RawTable<u64> = RawTable::with_seed(7);
        let family = family();
        table.reserve(
            500,
            |&stored, seed| family.hash_one(&stored, seed),
            mix64,
        );
        let rebuilds = table.build_stats().rebuilds;
        assert!(table.capacity() >= 500);
        for key in 0..400u64 {
            insert_key(&mut table, key);
        }
        // Repairs may run, but the slot region must not have regrown.
        assert!(table.build_stats().rebuilds >= rebuilds);
        assert!(table.capacity() >= 500);
        check_invariants(&table);
    }

    #[test]
    fn rehash_reclaims_slack() {
        let mut table: RawTable<u64> = RawTable::with_seed(8);
        for key in 0..1_000u64 {
            insert_key(&mut table, key);
        }
        let family = family();
        for key in 0..900u64 {
            table.remove(|seed| family.hash_one(&key, seed), |&stored| stored == key);
        }
        let before = table.slot_count();
        table.rehash(
            table.len(),
            |&stored, seed| family.hash_one(&stored, seed),
            mix64,
        );
        assert!(table.slot_count() < before);
        assert_eq!(table.len(), 100);
        for key in 900..1_000u64 {
            assert!(find_key(&table, key));
        }
        check_invariants(&table);
    }

    #[test]
    fn narrow_params_hit_capacity_ceiling() {
        let mut table: RawTable<u64, u8> = RawTable::with_seed(9);
        let family = family();
        let result = table.try_reserve(
            1_000,
            |&stored, seed| family.hash_one(&stored, seed),
            mix64,
        );
        assert_eq!(result.unwrap_err(), Failure::CapacityExceeded);
        // The failed reserve must not have disturbed the table.
        assert!(table.is_empty());
        assert!(insert_key(&mut table, 1));
        assert!(find_key(&table, 1));
    }

    #[test]
    fn iter_mut_updates_in_place() {
        let mut table: RawTable<u64> = RawTable::with_seed(10);
        for key in 0..10u64 {
            insert_key(&mut table, key);
        }
        for value in table.iter_mut() {
            *value += 1_000;
        }
        for key in 1_000..1_010u64 {
            assert!(find_key(&table, key));
        }
    }

    #[test]
    fn stats_track_construction_work() {
        let mut table: RawTable<u64> = RawTable::with_seed(11);
        for key in 0..5_000u64 {
            insert_key(&mut table, key);
        }
        let stats = table.build_stats();
        assert!(stats.rebuilds >= 1);
        assert!(stats.seed_attempts >= stats.rebuilds);
        assert!(stats.bucket_factor > 0.0);
        let params = table.params();
        assert_eq!(params.len, 5_000);
        assert!(params.slot_count >= 5_000);
        assert!(params.to_string().contains("slots="));
    }

    #[test]
    fn max_load_factor_is_clamped() {
        let mut table: RawTable<u64, u8> = RawTable::with_seed(12);
        table.set_max_load_factor(5.0);
        assert!(table.max_load_factor() <= 0.98);
        table.set_max_load_factor(0.5);
        assert_eq!(table.max_load_factor(), 0.5);
    }
}
