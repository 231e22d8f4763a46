//! Read results carrying version and audit metadata
//!
//! Plain reads return the aspect alone. When a caller needs to know which
//! version it saw and who wrote it, the store returns [`Versioned<T>`].
//! Paginated listings return [`ListResult<T>`].

use serde::{Deserialize, Serialize};

use crate::audit::AuditStamp;
use crate::version::AspectVersion;

/// A value with the version slot it was read from and its audit stamp
///
/// ## Invariants
///
/// - `version` is the slot the value was read from
/// - `audit` is the stamp recorded when that slot was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The actual value
    pub value: T,

    /// Version slot
    pub version: AspectVersion,

    /// Who wrote it and when
    pub audit: AuditStamp,
}

impl<T> Versioned<T> {
    /// Wrap a value
    pub fn new(value: T, version: AspectVersion, audit: AuditStamp) -> Self {
        Versioned {
            value,
            version,
            audit,
        }
    }

    /// Map the inner value to a new type
    pub fn map<U, F>(self, f: F) -> Versioned<U>
    where
        F: FnOnce(T) -> U,
    {
        Versioned {
            value: f(self.value),
            version: self.version,
            audit: self.audit,
        }
    }

    /// Fallible map, keeping version and audit
    pub fn try_map<U, E, F>(self, f: F) -> Result<Versioned<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        Ok(Versioned {
            value: f(self.value)?,
            version: self.version,
            audit: self.audit,
        })
    }

    /// Consume and return the inner value
    #[inline]
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> AsRef<T> for Versioned<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult<T> {
    /// Items on this page
    pub values: Vec<T>,
    /// Total number of items across all pages
    pub total_count: usize,
    /// Start offset of the next page, if any
    pub next_start: Option<usize>,
}

impl<T> ListResult<T> {
    /// Slice a page out of a complete, ordered listing
    pub fn paginate(all: Vec<T>, start: usize, count: usize) -> Self {
        let total_count = all.len();
        let values: Vec<T> = all.into_iter().skip(start).take(count).collect();
        let end = start.saturating_add(values.len());
        let next_start = if end < total_count && count > 0 {
            Some(end)
        } else {
            None
        };
        ListResult {
            values,
            total_count,
            next_start,
        }
    }

    /// True if more pages follow
    pub fn has_more(&self) -> bool {
        self.next_start.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Urn;

    fn stamp() -> AuditStamp {
        AuditStamp::new(Urn::parse("urn:li:corpuser:alice").unwrap(), 10)
    }

    #[test]
    fn test_versioned_map() {
        let v = Versioned::new(5i32, AspectVersion::new(2), stamp());
        let v2 = v.map(|n| n * 2);
        assert_eq!(v2.value, 10);
        assert_eq!(v2.version, AspectVersion::new(2));
        assert_eq!(v2.audit, stamp());
    }

    #[test]
    fn test_versioned_try_map() {
        let v = Versioned::new("7", AspectVersion::LATEST, stamp());
        let parsed: Versioned<u32> = v.try_map(|s| s.parse::<u32>()).unwrap();
        assert_eq!(parsed.value, 7);

        let bad = Versioned::new("x", AspectVersion::LATEST, stamp());
        assert!(bad.try_map(|s| s.parse::<u32>()).is_err());
    }

    #[test]
    fn test_paginate_middle_page() {
        let page = ListResult::paginate((0..10).collect(), 3, 4);
        assert_eq!(page.values, vec![3, 4, 5, 6]);
        assert_eq!(page.total_count, 10);
        assert_eq!(page.next_start, Some(7));
        assert!(page.has_more());
    }

    #[test]
    fn test_paginate_last_page() {
        let page = ListResult::paginate((0..10).collect(), 8, 4);
        assert_eq!(page.values, vec![8, 9]);
        assert_eq!(page.next_start, None);
    }

    #[test]
    fn test_paginate_past_end() {
        let page: ListResult<i32> = ListResult::paginate(vec![1, 2], 5, 4);
        assert!(page.values.is_empty());
        assert_eq!(page.total_count, 2);
        assert!(!page.has_more());
    }
}
