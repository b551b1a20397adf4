#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod bits;
pub mod builder;
pub mod error;

/// A HashMap implementation backed by a dynamic perfect hash.
///
/// This module provides a `HashMap` that wraps the `RawTable` and offers a
/// standard key-value interface with configurable hashing, displacement
/// width, and slot metadata policy.
pub mod hash_map;

/// A hash set backed by a dynamic perfect hash.
///
/// This module provides a `HashSet` that wraps the `RawTable` and offers a
/// standard set interface with the same configuration axes as the map.
pub mod hash_set;

pub mod meta;
pub mod seeded_hash;
pub mod table;

pub use builder::BucketParam;
pub use builder::BuildOptions;
pub use builder::BuildStats;
pub use builder::RandomKeys;
pub use builder::StandardKeys;
pub use error::Failure;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_map::MetaHashMap;
pub use hash_set::HashSet;
pub use hash_set::MetaHashSet;
pub use meta::ByteTags;
pub use meta::Filled;
pub use meta::SlotMeta;
pub use seeded_hash::DefaultSeededHash;
pub use seeded_hash::MixSeeded;
pub use seeded_hash::SeedFirst;
pub use seeded_hash::SeededHash;
pub use table::RawTable;
pub use table::TableParams;
