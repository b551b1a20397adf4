//! The failure type shared by all fallible table operations.
//!
//! Mutating operations that may rebuild the table come in two versions: a
//! fallible `try_xxx` version returning [`Result`], and a convenience `xxx`
//! version that panics on failure. Lookup operations never fail; a missing
//! key is reported through `Option` instead.

use core::fmt;

/// Reasons a table mutation can fail.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Failure {
    /// The displacement builder exhausted its attempt budget without finding
    /// collision-free parameters for the key set.
    ///
    /// This is almost always a sign of a degenerate hash function (many keys
    /// with identical digests) rather than bad luck; the seed-retry and
    /// bucket-widening schedule makes spurious failures vanishingly rare.
    BuildFailed,
    /// The requested slot count cannot be addressed by the chosen bucket
    /// parameter width. Pick a wider parameter type (`u16`, `u32`, `u64`).
    CapacityExceeded,
    /// A backing buffer could not be allocated. The table is left exactly as
    /// it was before the call.
    AllocationFailed,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::BuildFailed => write!(f, "perfect-hash construction exhausted its budget"),
            Failure::CapacityExceeded => {
                write!(f, "slot count exceeds the bucket parameter's addressable range")
            }
            Failure::AllocationFailed => write!(f, "failed to allocate table storage"),
        }
    }
}

impl std::error::Error for Failure {}

/// Result type of the fallible table operations.
pub type Result<T> = core::result::Result<T, Failure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            Failure::CapacityExceeded.to_string(),
            "slot count exceeds the bucket parameter's addressable range"
        );
        assert_ne!(Failure::BuildFailed.to_string(), "");
    }
}
