//! Aspect version numbers
//!
//! Every (URN, aspect kind) pair owns a contiguous run of versions starting
//! at 0. Version 0 is reserved as the "latest" slot: the newest value always
//! lives there, and each superseded value is archived at the next free
//! number. After `n` updates the slots are:
//!
//! ```text
//! 0      -> newest value
//! 1      -> first value ever written
//! 2..n   -> later values, oldest first
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of a stored aspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectVersion(u64);

impl AspectVersion {
    /// Sentinel naming the latest value
    pub const LATEST: AspectVersion = AspectVersion(0);

    /// Create a version from its number
    #[inline]
    pub const fn new(n: u64) -> Self {
        AspectVersion(n)
    }

    /// Get the numeric value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for the latest sentinel
    #[inline]
    pub const fn is_latest(&self) -> bool {
        self.0 == 0
    }

    /// The following version number
    #[inline]
    pub const fn next(&self) -> Self {
        AspectVersion(self.0.saturating_add(1))
    }
}

impl Default for AspectVersion {
    fn default() -> Self {
        AspectVersion::LATEST
    }
}

impl From<u64> for AspectVersion {
    fn from(v: u64) -> Self {
        AspectVersion(v)
    }
}

impl fmt::Display for AspectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_latest() {
            write!(f, "v0 (latest)")
        } else {
            write!(f, "v{}", self.0)
        }
    }
}
