//! A set over the dynamic perfect-hash table.
//!
//! [`HashSet<K>`] stores keys alone, with the same lookup discipline as the
//! map: one computed probe, one comparison. [`MetaHashSet`] is the
//! byte-tagged flavour for workloads dominated by negative membership tests.

use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::Hash;

use crate::builder::BucketParam;
use crate::builder::BuildStats;
use crate::builder::RandomKeys;
use crate::builder::StandardKeys;
use crate::error::Result;
use crate::meta::ByteTags;
use crate::meta::Filled;
use crate::meta::SlotMeta;
use crate::seeded_hash::DefaultSeededHash;
use crate::seeded_hash::SeededHash;
use crate::table;
use crate::table::Entry as TableEntry;
use crate::table::RawTable;
use crate::table::TableParams;

/// A hash set whose steady-state membership tests are a single computed
/// probe.
///
/// Type parameters mirror [`HashMap`](crate::HashMap) minus the value:
/// key, seeded hash family `S`, displacement width `P`, key generator `R`,
/// slot metadata policy `M`.
#[derive(Clone)]
pub struct HashSet<
    K,
    S = DefaultSeededHash,
    P: BucketParam = u32,
    R = StandardKeys<K>,
    M: SlotMeta = Filled,
> {
    table: RawTable<K, P, M>,
    hasher: S,
    random_keys: R,
}

/// [`HashSet`] over the byte-tagged table: faster negative membership
/// tests, lower load ceiling, half the addressable slots per parameter
/// width.
pub type MetaHashSet<K, S = DefaultSeededHash, P = u32, R = StandardKeys<K>> =
    HashSet<K, S, P, R, ByteTags>;

impl<K> HashSet<K> {
    /// Creates an empty set with the default hash family and key generator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashSet;
    ///
    /// let mut set = HashSet::new();
    /// assert!(set.insert(3));
    /// assert!(!set.insert(3));
    /// assert!(set.contains(&3));
    /// ```
    pub fn new() -> Self {
        Self {
            table: RawTable::new(),
            hasher: DefaultSeededHash::default(),
            random_keys: StandardKeys::default(),
        }
    }

    /// Creates an empty set able to hold `capacity` keys without rebuilding.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: RawTable::with_capacity(capacity),
            hasher: DefaultSeededHash::default(),
            random_keys: StandardKeys::default(),
        }
    }

    /// Creates an empty set with a reproducible rebuild seed schedule.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            table: RawTable::with_seed(seed),
            hasher: DefaultSeededHash::default(),
            random_keys: StandardKeys::from_seed(seed ^ 0x5EED_5EED_5EED_5EED),
        }
    }
}

impl<K> Default for HashSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S, P, R, M> HashSet<K, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    M: SlotMeta,
{
    /// Creates an empty set with the given hash family.
    pub fn with_hasher(hasher: S) -> Self
    where
        R: Default,
    {
        Self::with_capacity_hasher_and_keys(0, hasher, R::default())
    }

    /// Creates an empty set with the given capacity and hash family.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self
    where
        R: Default,
    {
        Self::with_capacity_hasher_and_keys(capacity, hasher, R::default())
    }

    /// Creates an empty set from capacity target, hash family, and key
    /// generator.
    pub fn with_capacity_hasher_and_keys(capacity: usize, hasher: S, random_keys: R) -> Self {
        Self {
            table: RawTable::with_capacity(capacity),
            hasher,
            random_keys,
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Keys the set can hold before an insert forces a rebuild.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Size of the slot region backing the set.
    pub fn slot_count(&self) -> usize {
        self.table.slot_count()
    }

    /// Number of displacement buckets.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Current load: `len / slot_count`.
    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    /// The configured load ceiling.
    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor()
    }

    /// Sets the load ceiling (clamped to the policy limit).
    pub fn set_max_load_factor(&mut self, factor: f32) {
        self.table.set_max_load_factor(factor);
    }

    /// Construction-work counters.
    pub fn build_stats(&self) -> BuildStats {
        self.table.build_stats()
    }

    /// Snapshot of the installed parameter bundle.
    pub fn params(&self) -> TableParams {
        self.table.params()
    }

    /// Removes all keys, retaining capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

/// Mutations that may rebuild, and therefore need the key generator for
/// the builder's seed schedule. Membership tests and removals never do.
impl<K, S, P, R, M> HashSet<K, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    R: RandomKeys<K>,
    M: SlotMeta,
{
    /// Ensures room for `additional` more keys.
    ///
    /// # Panics
    ///
    /// Panics if the rebuild fails; see [`try_reserve`](Self::try_reserve).
    pub fn reserve(&mut self, additional: usize) {
        if let Err(failure) = self.try_reserve(additional) {
            panic!("HashSet::reserve: {failure}");
        }
    }

    /// Fallible version of [`reserve`](Self::reserve).
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let HashSet {
            table,
            hasher,
            random_keys,
        } = self;
        table.try_reserve(
            additional,
            |stored: &K, seed| hasher.hash_one(stored, seed),
            |seed| hasher.hash_one(&random_keys.random_key(), seed),
        )
    }

    /// Forces a rebuild sized for `capacity_for` keys.
    ///
    /// # Panics
    ///
    /// Panics if the rebuild fails; see [`try_rehash`](Self::try_rehash).
    pub fn rehash(&mut self, capacity_for: usize) {
        if let Err(failure) = self.try_rehash(capacity_for) {
            panic!("HashSet::rehash: {failure}");
        }
    }

    /// Fallible version of [`rehash`](Self::rehash).
    pub fn try_rehash(&mut self, capacity_for: usize) -> Result<()> {
        let HashSet {
            table,
            hasher,
            random_keys,
        } = self;
        table.try_rehash(
            capacity_for,
            |stored: &K, seed| hasher.hash_one(stored, seed),
            |seed| hasher.hash_one(&random_keys.random_key(), seed),
        )
    }

    /// Shrinks the slot region to fit the current keys.
    pub fn shrink_to_fit(&mut self) {
        let len = self.len();
        self.rehash(len);
    }

    /// Adds a key; returns whether it was newly inserted.
    ///
    /// # Panics
    ///
    /// Panics if a required rebuild fails; see
    /// [`try_insert`](Self::try_insert).
    pub fn insert(&mut self, key: K) -> bool {
        match self.try_insert(key) {
            Ok(inserted) => inserted,
            Err(failure) => panic!("HashSet::insert: {failure}"),
        }
    }

    /// Fallible version of [`insert`](Self::insert). `Err` leaves the set
    /// unchanged.
    pub fn try_insert(&mut self, key: K) -> Result<bool> {
        let HashSet {
            table,
            hasher,
            random_keys,
        } = self;
        let entry = table.try_entry(
            |seed| hasher.hash_one(&key, seed),
            |stored: &K| *stored == key,
            |stored: &K, seed| hasher.hash_one(stored, seed),
            |seed| hasher.hash_one(&random_keys.random_key(), seed),
        )?;
        Ok(match entry {
            TableEntry::Occupied(_) => false,
            TableEntry::Vacant(vacant) => {
                vacant.insert(key);
                true
            }
        })
    }
}

/// Membership tests and removals; these run against the installed
/// parameters and never rebuild, so they work without a key generator.
impl<K, S, P, R, M> HashSet<K, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    M: SlotMeta,
{
    /// Whether the set holds `key`. Accepts any borrowed form of the key
    /// type.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns the stored key equal to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.find(
            |seed| self.hasher.hash_one(key, seed),
            |stored: &K| stored.borrow() == key,
        )
    }

    /// Returns the stored key for a probe the caller has already proven
    /// present, skipping the occupancy and equality checks.
    ///
    /// # Safety
    ///
    /// `key` must currently be in the set.
    pub unsafe fn get_unchecked<Q>(&self, key: &Q) -> &K
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        // SAFETY: forwarded; the caller guarantees presence.
        unsafe {
            self.table
                .get_unchecked(|seed| self.hasher.hash_one(key, seed))
        }
    }

    /// Removes `key`; returns whether it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.take(key).is_some()
    }

    /// Removes and returns the stored key equal to `key`.
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let HashSet { table, hasher, .. } = self;
        table.remove(
            |seed| hasher.hash_one(key, seed),
            |stored: &K| stored.borrow() == key,
        )
    }

    /// Iterates over the keys in slot order (unspecified but stable between
    /// rebuilds).
    pub fn iter(&self) -> Iter<'_, K, M> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Removes and yields every key; the set is empty afterwards.
    pub fn drain(&mut self) -> Drain<'_, K, P, M> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<K, S, P, R, M> Debug for HashSet<K, S, P, R, M>
where
    K: Debug + Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    M: SlotMeta,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, S, P, R, M> FromIterator<K> for HashSet<K, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash + Default,
    P: BucketParam,
    R: RandomKeys<K> + Default,
    M: SlotMeta,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut set =
            Self::with_capacity_hasher_and_keys(iter.size_hint().0, S::default(), R::default());
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl<K, S, P, R, M> Extend<K> for HashSet<K, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    R: RandomKeys<K>,
    M: SlotMeta,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for key in iter {
            self.insert(key);
        }
    }
}

/// Iterator over a set's keys.
pub struct Iter<'a, K, M: SlotMeta> {
    inner: table::Iter<'a, K, M>,
}

impl<'a, K, M: SlotMeta> Iterator for Iter<'a, K, M> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, M: SlotMeta> ExactSizeIterator for Iter<'_, K, M> {}

/// Draining iterator over a set's keys.
pub struct Drain<'a, K, P: BucketParam, M: SlotMeta> {
    inner: table::Drain<'a, K, P, M>,
}

impl<K, P: BucketParam, M: SlotMeta> Iterator for Drain<'_, K, P, M> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
