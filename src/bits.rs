//! Bit-packed fixed-width arrays.
//!
//! Two views over a `Box<[u64]>` backing buffer: [`BitArray`] stores items of
//! an arbitrary width between 1 and 64 bits, assembling values from two
//! adjacent words when an item straddles a word boundary; [`Bitmap`] is the
//! single-bit case with the operations the table actually wants (set, clear,
//! population count, next-set-bit scan).
//!
//! The table uses a `Bitmap` for its "filled" slot map and for the builder's
//! scratch occupancy; the meta variant packs its per-slot tag bytes the same
//! way. `BitArray` carries the general machinery and is held to a strict
//! contract: for any sequence of `set`/`get` at any alignment and width it
//! must behave exactly like a plain array of W-bit integers.

use crate::error::Failure;
use crate::error::Result;

fn try_zeroed_words(len: usize) -> Result<Box<[u64]>> {
    let mut words = Vec::new();
    words
        .try_reserve_exact(len)
        .map_err(|_| Failure::AllocationFailed)?;
    words.resize(len, 0u64);
    Ok(words.into_boxed_slice())
}

#[inline(always)]
fn low_bits(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

/// An array of `len` unsigned integers, each `width` bits wide, packed into
/// 64-bit words.
#[derive(Clone, Debug)]
pub struct BitArray {
    words: Box<[u64]>,
    width: u32,
    len: usize,
}

impl BitArray {
    /// Creates a zero-filled array of `len` items of `width` bits each.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero or greater than 64, or if allocation fails.
    pub fn new(len: usize, width: u32) -> Self {
        match Self::try_new(len, width) {
            Ok(array) => array,
            Err(failure) => panic!("BitArray::new: {failure}"),
        }
    }

    /// Fallible version of [`new`](Self::new).
    pub fn try_new(len: usize, width: u32) -> Result<Self> {
        assert!(width >= 1 && width <= 64, "item width must be in 1..=64");
        let bits = len
            .checked_mul(width as usize)
            .unwrap_or_else(|| panic!("BitArray::new: size overflow"));
        let words = try_zeroed_words(bits.div_ceil(64))?;
        Ok(BitArray { words, width, len })
    }

    /// Number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Item width in bits.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Total size of the logical array in bits.
    #[inline]
    pub fn size_in_bits(&self) -> usize {
        self.len * self.width as usize
    }

    /// Returns the item at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.len);
        let begin = index * self.width as usize;
        let segment = begin / 64;
        let offset = (begin % 64) as u32;
        let first = self.words[segment] >> offset;
        let end = offset + self.width;
        if end > 64 {
            first | ((self.words[segment + 1] & low_bits(end - 64)) << (64 - offset))
        } else {
            first & low_bits(self.width)
        }
    }

    /// Stores the low `width` bits of `value` at `index`, preserving the
    /// neighbouring items.
    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.len);
        let mask = low_bits(self.width);
        let value = value & mask;
        let begin = index * self.width as usize;
        let segment = begin / 64;
        let offset = (begin % 64) as u32;
        let end = offset + self.width;
        if end > 64 {
            let shift = 64 - offset;
            self.words[segment + 1] &= !(mask >> shift);
            self.words[segment + 1] |= value >> shift;
        }
        self.words[segment] &= !(mask << offset);
        self.words[segment] |= value << offset;
    }

    /// Resets every item to zero.
    pub fn fill_zero(&mut self) {
        self.words.fill(0);
    }
}

/// A plain bitmap: [`BitArray`] specialized to one bit per item, with the
/// scan operations the slot map needs.
#[derive(Clone, Debug)]
pub struct Bitmap {
    words: Box<[u64]>,
    len: usize,
}

impl Bitmap {
    /// Creates a zeroed bitmap of `len` bits.
    pub fn try_new(len: usize) -> Result<Self> {
        let words = try_zeroed_words(len.div_ceil(64))?;
        Ok(Bitmap { words, len })
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the bitmap holds no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns bit `index`.
    #[inline]
    pub fn get_bit(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Sets bit `index` to 1.
    #[inline]
    pub fn set_bit(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    /// Sets bit `index` to 0.
    #[inline]
    pub fn clear_bit(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Index of the first set bit at or after `from`, if any.
    #[inline]
    pub fn next_set_bit(&self, mut from: usize) -> Option<usize> {
        while from < self.len {
            let word = self.words[from / 64] >> (from % 64);
            if word != 0 {
                let index = from + word.trailing_zeros() as usize;
                return (index < self.len).then_some(index);
            }
            from = (from / 64 + 1) * 64;
        }
        None
    }

    /// Clears every bit.
    pub fn fill_zero(&mut self) {
        self.words.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use rand::TryRngCore;
    use rand::rngs::OsRng;

    use super::*;
    use crate::seeded_hash::mix64;

    #[test]
    fn straddles_word_boundaries() {
        let mut array = BitArray::new(40, 30);
        array.set(1, 0b10110_10110_10110_10110_10110_10110);
        assert_eq!(array.get(1), 0b10110_10110_10110_10110_10110_10110);
        assert_eq!(array.get(0), 0);
        assert_eq!(array.get(2), 0);
        array.set(2, u64::MAX);
        assert_eq!(array.get(2), low_bits(30));
        assert_eq!(array.get(1), 0b10110_10110_10110_10110_10110_10110);
        assert_eq!(array.get(3), 0);
    }

    #[test]
    fn full_width_items() {
        let mut array = BitArray::new(8, 64);
        array.set(3, u64::MAX);
        array.set(4, 0xDEAD_BEEF);
        assert_eq!(array.get(3), u64::MAX);
        assert_eq!(array.get(4), 0xDEAD_BEEF);
        assert_eq!(array.get(2), 0);
        assert_eq!(array.get(5), 0);
    }

    /// For every width, a random op sequence must match a plain integer
    /// array element for element.
    #[test]
    fn matches_naive_model_at_every_width() {
        let mut seed = OsRng.try_next_u64().unwrap_or(0x5EED);
        for width in 1..=64u32 {
            const LEN: usize = 257;
            let mut array = BitArray::new(LEN, width);
            let mut model = vec![0u64; LEN];
            for _ in 0..2_000 {
                seed = mix64(seed);
                let index = (seed % LEN as u64) as usize;
                seed = mix64(seed);
                let value = seed & low_bits(width);
                array.set(index, value);
                model[index] = value;
            }
            for (index, expected) in model.iter().enumerate() {
                assert_eq!(array.get(index), *expected, "width {width}, index {index}");
            }
        }
    }

    /// Random nibble-wide set/get interleave, checksummed against the same
    /// sequence applied to a plain `u32` table.
    #[test]
    fn checksum_agrees_with_plain_array() {
        const ITEMS: usize = 1 << 16;
        const WIDTH: u32 = 4;

        let original_seed = mix64(OsRng.try_next_u64().unwrap_or(0x1234));

        let mut array = BitArray::new(ITEMS, WIDTH);
        let mut seed = original_seed;
        let mut packed_sum = 0u64;
        for _ in 0..ITEMS {
            seed = mix64(seed);
            let index = (seed % ITEMS as u64) as usize;
            let value = seed & low_bits(WIDTH);
            array.set(index, value);
            seed = mix64(seed);
            let index = (seed % ITEMS as u64) as usize;
            packed_sum += array.get(index);
        }

        let mut table = vec![0u32; ITEMS];
        let mut seed = original_seed;
        let mut plain_sum = 0u64;
        for _ in 0..ITEMS {
            seed = mix64(seed);
            let index = (seed % ITEMS as u64) as usize;
            let value = seed & low_bits(WIDTH);
            table[index] = value as u32;
            seed = mix64(seed);
            let index = (seed % ITEMS as u64) as usize;
            plain_sum += table[index] as u64;
        }

        assert_eq!(packed_sum, plain_sum);
    }

    /// The checksum test at its original scale (2^22 nibbles over a 64 MiB
    /// logical array); ignored by default for test-suite latency.
    #[test]
    #[ignore = "large allocation, slow in debug builds"]
    fn checksum_agrees_with_plain_array_full_scale() {
        const ITEMS: usize = 1 << 22;
        const WIDTH: u32 = 4;

        let original_seed = mix64(OsRng.try_next_u64().unwrap_or(0x4242));

        let mut array = BitArray::new(ITEMS, WIDTH);
        let mut seed = original_seed;
        let mut packed_sum = 0u64;
        for _ in 0..ITEMS {
            seed = mix64(seed);
            let index = (seed % ITEMS as u64) as usize;
            array.set(index, seed & low_bits(WIDTH));
            seed = mix64(seed);
            packed_sum += array.get((seed % ITEMS as u64) as usize);
        }

        let mut table = vec![0u32; ITEMS];
        let mut seed = original_seed;
        let mut plain_sum = 0u64;
        for _ in 0..ITEMS {
            seed = mix64(seed);
            let index = (seed % ITEMS as u64) as usize;
            table[index] = (seed & low_bits(WIDTH)) as u32;
            seed = mix64(seed);
            plain_sum += table[(seed % ITEMS as u64) as usize] as u64;
        }

        assert_eq!(packed_sum, plain_sum);
    }

    #[test]
    fn bitmap_scan_and_popcount() {
        let mut bitmap = Bitmap::try_new(200).unwrap();
        assert_eq!(bitmap.count_ones(), 0);
        assert_eq!(bitmap.next_set_bit(0), None);

        for index in [0usize, 63, 64, 130, 199] {
            bitmap.set_bit(index);
        }
        assert_eq!(bitmap.count_ones(), 5);
        assert_eq!(bitmap.next_set_bit(0), Some(0));
        assert_eq!(bitmap.next_set_bit(1), Some(63));
        assert_eq!(bitmap.next_set_bit(64), Some(64));
        assert_eq!(bitmap.next_set_bit(65), Some(130));
        assert_eq!(bitmap.next_set_bit(131), Some(199));
        assert_eq!(bitmap.next_set_bit(200), None);

        bitmap.clear_bit(63);
        assert!(!bitmap.get_bit(63));
        assert_eq!(bitmap.next_set_bit(1), Some(64));

        bitmap.fill_zero();
        assert_eq!(bitmap.count_ones(), 0);
    }
}
