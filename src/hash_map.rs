//! A key-value map over the dynamic perfect-hash table.
//!
//! [`HashMap<K, V>`] wraps [`RawTable`] with a standard map interface: it
//! owns a seeded hash family and a key-domain generator and turns them into
//! the closures the table core wants. Successful lookups cost one computed
//! probe and one key comparison. [`MetaHashMap`] is the same map over the
//! byte-tagged table, which rejects most negative lookups without touching
//! the stored pairs.
//!
//! Keys only need `Hash + Eq`. Key types outside the standard distribution's
//! reach additionally need a [`RandomKeys`] implementation, because rebuild
//! seed schedules draw on the key domain; see the crate docs for an example.

use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::Hash;
use core::mem;
use core::ops::Index;

use crate::builder::BucketParam;
use crate::builder::BuildOptions;
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

/// A hash map whose steady-state lookups are a single computed probe.
///
/// Type parameters, in order: key, value, seeded hash family `S`,
/// displacement width `P` (`u8`/`u16`/`u32`/`u64`), key generator `R`, and
/// slot metadata policy `M`.
///
/// # Performance characteristics
///
/// - **Lookup**: one probe plus one key comparison; no probe sequences.
/// - **Insert**: O(1) when the slot is free; a colliding insert re-displaces
///   one bucket, and only occasionally rebuilds the whole table.
/// - **Remove**: O(1), never rebuilds.
///
/// References and iterators are invalidated by any insert, since a rebuild
/// may relocate every entry.
#[derive(Clone)]
pub struct HashMap<
    K,
    V,
    S = DefaultSeededHash,
    P: BucketParam = u32,
    R = StandardKeys<K>,
    M: SlotMeta = Filled,
> {
    table: RawTable<(K, V), P, M>,
    hasher: S,
    random_keys: R,
}

/// [`HashMap`] over the byte-tagged table: faster negative lookups, lower
/// load ceiling, half the addressable slots per parameter width.
pub type MetaHashMap<K, V, S = DefaultSeededHash, P = u32, R = StandardKeys<K>> =
    HashMap<K, V, S, P, R, ByteTags>;

impl<K, V> HashMap<K, V> {
    /// Creates an empty map with the default hash family and key generator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// ```
    pub fn new() -> Self {
        Self {
            table: RawTable::new(),
            hasher: DefaultSeededHash::default(),
            random_keys: StandardKeys::default(),
        }
    }

    /// Creates an empty map able to hold `capacity` entries without
    /// rebuilding.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let map: HashMap<u64, u64> = HashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: RawTable::with_capacity(capacity),
            hasher: DefaultSeededHash::default(),
            random_keys: StandardKeys::default(),
        }
    }

    /// Creates an empty map whose rebuild seed schedule derives entirely
    /// from `seed`, so construction behaviour is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            table: RawTable::with_seed(seed),
            hasher: DefaultSeededHash::default(),
            random_keys: StandardKeys::from_seed(seed ^ 0x5EED_5EED_5EED_5EED),
        }
    }
}

impl<K, V> Default for HashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, P, R, M> HashMap<K, V, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    M: SlotMeta,
{
    /// Creates an empty map with the given hash family.
    pub fn with_hasher(hasher: S) -> Self
    where
        R: Default,
    {
        Self::with_capacity_hasher_and_keys(0, hasher, R::default())
    }

    /// Creates an empty map with the given capacity and hash family.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self
    where
        R: Default,
    {
        Self::with_capacity_hasher_and_keys(capacity, hasher, R::default())
    }

    /// Creates an empty map from all three collaborators: capacity target,
    /// hash family, and key generator.
    pub fn with_capacity_hasher_and_keys(capacity: usize, hasher: S, random_keys: R) -> Self {
        Self {
            table: RawTable::with_capacity(capacity),
            hasher,
            random_keys,
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Entries the map can hold before an insert forces a rebuild.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Size of the slot region backing the map.
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

    /// Sets the load ceiling; values above the policy limit for the
    /// parameter width are clamped. Takes effect at the next rebuild.
    pub fn set_max_load_factor(&mut self, factor: f32) {
        self.table.set_max_load_factor(factor);
    }

    /// The builder knobs used by future rebuilds.
    pub fn build_options(&self) -> BuildOptions {
        self.table.build_options()
    }

    /// Replaces the builder knobs.
    pub fn set_build_options(&mut self, options: BuildOptions) {
        self.table.set_build_options(options);
    }

    /// Construction-work counters (seeds tried, rebuilds, repairs, ...).
    pub fn build_stats(&self) -> BuildStats {
        self.table.build_stats()
    }

    /// Snapshot of the installed parameter bundle, printable on one line.
    pub fn params(&self) -> TableParams {
        self.table.params()
    }

    /// Removes all entries, retaining capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// map.clear();
    /// assert!(map.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

/// Mutations that may rebuild, and therefore need the key generator for
/// the builder's seed schedule. Lookups and removals never do.
impl<K, V, S, P, R, M> HashMap<K, V, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    R: RandomKeys<K>,
    M: SlotMeta,
{
    /// Ensures room for `additional` more entries.
    ///
    /// # Panics
    ///
    /// Panics if the rebuild fails; see [`try_reserve`](Self::try_reserve).
    pub fn reserve(&mut self, additional: usize) {
        if let Err(failure) = self.try_reserve(additional) {
            panic!("HashMap::reserve: {failure}");
        }
    }

    /// Fallible version of [`reserve`](Self::reserve).
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let HashMap {
            table,
            hasher,
            random_keys,
        } = self;
        table.try_reserve(
            additional,
            |(stored, _): &(K, V), seed| hasher.hash_one(stored, seed),
            |seed| hasher.hash_one(&random_keys.random_key(), seed),
        )
    }

    /// Forces a rebuild sized for `capacity_for` entries, redrawing all
    /// parameters and reclaiming erase slack.
    ///
    /// # Panics
    ///
    /// Panics if the rebuild fails; see [`try_rehash`](Self::try_rehash).
    pub fn rehash(&mut self, capacity_for: usize) {
        if let Err(failure) = self.try_rehash(capacity_for) {
            panic!("HashMap::rehash: {failure}");
        }
    }

    /// Fallible version of [`rehash`](Self::rehash).
    pub fn try_rehash(&mut self, capacity_for: usize) -> Result<()> {
        let HashMap {
            table,
            hasher,
            random_keys,
        } = self;
        table.try_rehash(
            capacity_for,
            |(stored, _): &(K, V), seed| hasher.hash_one(stored, seed),
            |seed| hasher.hash_one(&random_keys.random_key(), seed),
        )
    }

    /// Shrinks the slot region to fit the current entries.
    pub fn shrink_to_fit(&mut self) {
        let len = self.len();
        self.rehash(len);
    }

    /// Inserts a key-value pair, returning the previous value if the key was
    /// present.
    ///
    /// # Panics
    ///
    /// Panics if a required rebuild fails; see
    /// [`try_insert`](Self::try_insert).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.try_insert(key, value) {
            Ok(previous) => previous,
            Err(failure) => panic!("HashMap::insert: {failure}"),
        }
    }

    /// Fallible version of [`insert`](Self::insert). `Err` leaves the map
    /// unchanged.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let HashMap {
            table,
            hasher,
            random_keys,
        } = self;
        let entry = table.try_entry(
            |seed| hasher.hash_one(&key, seed),
            |(stored, _): &(K, V)| *stored == key,
            |(stored, _): &(K, V), seed| hasher.hash_one(stored, seed),
            |seed| hasher.hash_one(&random_keys.random_key(), seed),
        )?;
        Ok(match entry {
            TableEntry::Occupied(mut occupied) => {
                Some(mem::replace(&mut occupied.get_mut().1, value))
            }
            TableEntry::Vacant(vacant) => {
                vacant.insert((key, value));
                None
            }
        })
    }

    /// Gets the key's entry for in-place manipulation.
    ///
    /// # Panics
    ///
    /// Panics if a required rebuild fails; see
    /// [`try_entry`](Self::try_entry).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.entry(1).or_insert("a");
    /// map.entry(1).or_insert("b");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, P, M> {
        match self.try_entry(key) {
            Ok(entry) => entry,
            Err(failure) => panic!("HashMap::entry: {failure}"),
        }
    }

    /// Fallible version of [`entry`](Self::entry). `Err` leaves the map
    /// unchanged.
    pub fn try_entry(&mut self, key: K) -> Result<Entry<'_, K, V, P, M>> {
        let HashMap {
            table,
            hasher,
            random_keys,
        } = self;
        let raw = table.try_entry(
            |seed| hasher.hash_one(&key, seed),
            |(stored, _): &(K, V)| *stored == key,
            |(stored, _): &(K, V), seed| hasher.hash_one(stored, seed),
            |seed| hasher.hash_one(&random_keys.random_key(), seed),
        )?;
        Ok(match raw {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        })
    }
}

/// Lookups and removals; these run against the installed parameters and
/// never rebuild, so they work without a key generator.
impl<K, V, S, P, R, M> HashMap<K, V, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    M: SlotMeta,
{
    /// Returns a reference to the value for `key`.
    ///
    /// Accepts any borrowed form of the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table
            .find(
                |seed| self.hasher.hash_one(key, seed),
                |(stored, _): &(K, V)| stored.borrow() == key,
            )
            .map(|(stored, value)| (stored, value))
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let HashMap { table, hasher, .. } = self;
        table
            .find_mut(
                |seed| hasher.hash_one(key, seed),
                |(stored, _): &(K, V)| stored.borrow() == key,
            )
            .map(|(_, value)| value)
    }

    /// Whether the map holds `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns the value for a key the caller has already proven present,
    /// skipping the occupancy and equality checks.
    ///
    /// # Safety
    ///
    /// `key` must currently be in the map.
    pub unsafe fn get_unchecked<Q>(&self, key: &Q) -> &V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        // SAFETY: forwarded; the caller guarantees presence.
        let (_, value) = unsafe {
            self.table
                .get_unchecked(|seed| self.hasher.hash_one(key, seed))
        };
        value
    }

    /// Removes `key`, returning its value.
    ///
    /// Removal never rebuilds: it is O(1) and leaves capacity slack that
    /// [`rehash`](Self::rehash) can reclaim.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let HashMap { table, hasher, .. } = self;
        table.remove(
            |seed| hasher.hash_one(key, seed),
            |(stored, _): &(K, V)| stored.borrow() == key,
        )
    }

    /// Iterates over `(&K, &V)` pairs in slot order (unspecified but stable
    /// between rebuilds).
    pub fn iter(&self) -> Iter<'_, K, V, M> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Iterates over the keys.
    pub fn keys(&self) -> Keys<'_, K, V, M> {
        Keys { inner: self.iter() }
    }

    /// Iterates over the values.
    pub fn values(&self) -> Values<'_, K, V, M> {
        Values { inner: self.iter() }
    }

    /// Iterates over the values mutably.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V, M> {
        ValuesMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Removes and yields every pair; the map is empty afterwards.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fch_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// let pairs: Vec<_> = map.drain().collect();
    /// assert!(map.is_empty());
    /// assert_eq!(pairs.len(), 2);
    /// ```
    pub fn drain(&mut self) -> Drain<'_, K, V, P, M> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<K, V, S, P, R, M> Debug for HashMap<K, V, S, P, R, M>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: SeededHash,
    P: BucketParam,
    M: SlotMeta,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(key, value);
        }
        map.finish()
    }
}

impl<K, V, Q, S, P, R, M> Index<&Q> for HashMap<K, V, S, P, R, M>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: SeededHash,
    P: BucketParam,
    M: SlotMeta,
{
    type Output = V;

    /// Returns the value for `key`, panicking if it is absent.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S, P, R, M> FromIterator<(K, V)> for HashMap<K, V, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash + Default,
    P: BucketParam,
    R: RandomKeys<K> + Default,
    M: SlotMeta,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map =
            Self::with_capacity_hasher_and_keys(iter.size_hint().0, S::default(), R::default());
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K, V, S, P, R, M> Extend<(K, V)> for HashMap<K, V, S, P, R, M>
where
    K: Hash + Eq,
    S: SeededHash,
    P: BucketParam,
    R: RandomKeys<K>,
    M: SlotMeta,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// A view into a single map entry, vacant or occupied.
///
/// Constructed by [`HashMap::entry`].
pub enum Entry<'a, K, V, P: BucketParam, M: SlotMeta> {
    /// The key is absent; its slot is already reserved.
    Vacant(VacantEntry<'a, K, V, P, M>),
    /// The key is present.
    Occupied(OccupiedEntry<'a, K, V, P, M>),
}

impl<'a, K, V, P: BucketParam, M: SlotMeta> Entry<'a, K, V, P, M> {
    /// Inserts `default` if vacant; returns a mutable borrow of the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the closure's value if vacant; the closure only runs then.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Mutates the value in place if present.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// The entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, P: BucketParam, M: SlotMeta> Entry<'a, K, V, P, M>
where
    V: Default,
{
    /// Inserts `V::default()` if vacant; returns a mutable borrow of the
    /// value. This is the map's subscript-assignment building block.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A vacant map entry with its slot already reserved.
pub struct VacantEntry<'a, K, V, P: BucketParam, M: SlotMeta> {
    entry: table::VacantEntry<'a, (K, V), P, M>,
    key: K,
}

impl<'a, K, V, P: BucketParam, M: SlotMeta> VacantEntry<'a, K, V, P, M> {
    /// The key that would be inserted.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value; returns a mutable borrow of it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// An occupied map entry.
pub struct OccupiedEntry<'a, K, V, P: BucketParam, M: SlotMeta> {
    entry: table::OccupiedEntry<'a, (K, V), P, M>,
}

impl<'a, K, V, P: BucketParam, M: SlotMeta> OccupiedEntry<'a, K, V, P, M> {
    /// The stored key.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Borrows the value.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Mutably borrows the value.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts into a mutable borrow tied to the map.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Replaces the value, returning the old one.
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }

    /// Removes the entry, returning the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry, returning the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// Iterator over a map's `(&K, &V)` pairs.
pub struct Iter<'a, K, V, M: SlotMeta> {
    inner: table::Iter<'a, (K, V), M>,
}

impl<'a, K, V, M: SlotMeta> Iterator for Iter<'a, K, V, M> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, value)| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, M: SlotMeta> ExactSizeIterator for Iter<'_, K, V, M> {}

/// Iterator over a map's keys.
pub struct Keys<'a, K, V, M: SlotMeta> {
    inner: Iter<'a, K, V, M>,
}

impl<'a, K, V, M: SlotMeta> Iterator for Keys<'a, K, V, M> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Iterator over a map's values.
pub struct Values<'a, K, V, M: SlotMeta> {
    inner: Iter<'a, K, V, M>,
}

impl<'a, K, V, M: SlotMeta> Iterator for Values<'a, K, V, M> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Iterator over a map's values, mutably.
pub struct ValuesMut<'a, K, V, M: SlotMeta> {
    inner: table::IterMut<'a, (K, V), M>,
}

impl<'a, K, V, M: SlotMeta> Iterator for ValuesMut<'a, K, V, M> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Draining iterator over a map's pairs.
pub struct Drain<'a, K, V, P: BucketParam, M: SlotMeta> {
    inner: table::Drain<'a, (K, V), P, M>,
}

impl<K, V, P: BucketParam, M: SlotMeta> Iterator for Drain<'_, K, V, P, M> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
