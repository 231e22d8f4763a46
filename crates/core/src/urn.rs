//! Entity identifiers
//!
//! A [`Urn`] addresses one entity. Its canonical form is the string it was
//! parsed from; equality, ordering and hashing all use that string, so two
//! URNs are the same key exactly when their strings are equal.
//!
//! ## Grammar
//!
//! ```text
//! urn     := ["urn:"] body
//! body    := namespace ":" entity ":" id     (three or more segments)
//!          | entity ":" id                   (two segments)
//! ```
//!
//! Everything after the entity segment belongs to the id, so nested URNs such
//! as `urn:li:dataset:(urn:li:dataPlatform:hive,foo,PROD)` parse with the
//! whole parenthesised tuple as id.
//!
//! Typed identifiers (one entity kind only) are declared with
//! [`typed_urn!`](crate::typed_urn) and implement [`EntityUrn`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{StoreError, StoreResult};

const URN_PREFIX: &str = "urn:";

/// Namespace used by [`Urn::from_type_specific`]
pub const DEFAULT_NAMESPACE: &str = "li";

/// Canonical, string-serializable entity identifier
#[derive(Clone)]
pub struct Urn {
    raw: String,
    namespace: Option<String>,
    entity_type: String,
    id: String,
}

impl Urn {
    /// Parse a URN from its canonical string form
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` when the string is empty, contains
    /// whitespace, lacks a `:` separator or has an empty segment.
    pub fn parse(input: &str) -> StoreResult<Self> {
        if input.is_empty() {
            return Err(StoreError::parse("empty URN"));
        }
        if input.chars().any(char::is_whitespace) {
            return Err(StoreError::parse(format!(
                "URN `{}` contains whitespace",
                input
            )));
        }

        let body = input.strip_prefix(URN_PREFIX).unwrap_or(input);
        let segments: Vec<&str> = body.splitn(3, ':').collect();

        let (namespace, entity_type, id) = match segments.as_slice() {
            [entity, id] => (None, *entity, *id),
            [namespace, entity, id] => (Some(*namespace), *entity, *id),
            _ => {
                return Err(StoreError::parse(format!(
                    "URN `{}` is missing a ':' separator",
                    input
                )))
            }
        };

        if namespace.map_or(false, str::is_empty) || entity_type.is_empty() || id.is_empty() {
            return Err(StoreError::parse(format!(
                "URN `{}` has an empty segment",
                input
            )));
        }

        Ok(Urn {
            raw: input.to_string(),
            namespace: namespace.map(str::to_string),
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })
    }

    /// Build `urn:<namespace>:<entity_type>:<id>`
    pub fn new(namespace: &str, entity_type: &str, id: &str) -> StoreResult<Self> {
        Self::parse(&format!("{}{}:{}:{}", URN_PREFIX, namespace, entity_type, id))
    }

    /// Build `urn:li:<entity_type>:<id>`
    pub fn from_type_specific(entity_type: &str, id: &str) -> StoreResult<Self> {
        Self::new(DEFAULT_NAMESPACE, entity_type, id)
    }

    /// Build `urn:<namespace>:<entity_type>:<id>` from segments known to be valid
    pub(crate) fn from_trusted_parts(namespace: &str, entity_type: &str, id: &str) -> Self {
        Urn {
            raw: format!("{}{}:{}:{}", URN_PREFIX, namespace, entity_type, id),
            namespace: Some(namespace.to_string()),
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    /// The canonical string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Namespace segment, when the URN has three or more segments
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Entity kind tag
    #[inline]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Type-specific id (may itself contain `:`)
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consume and return the canonical string
    pub fn into_string(self) -> String {
        self.raw
    }
}

impl PartialEq for Urn {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Urn {}

impl Hash for Urn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Urn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Urn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Debug for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Urn({})", self.raw)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Urn {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Urn::parse(s)
    }
}

impl TryFrom<String> for Urn {
    type Error = StoreError;

    fn try_from(s: String) -> StoreResult<Self> {
        Urn::parse(&s)
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for Urn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Urn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Urn::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A URN type bound to one entity kind (or to any, for [`Urn`] itself)
///
/// Stores are generic over this trait so a store for datasets cannot be
/// handed a URN for a user.
pub trait EntityUrn: Clone + Ord + fmt::Debug + Send + Sync + 'static {
    /// Entity kind accepted by this type; `None` accepts every kind
    const ENTITY_TYPE: Option<&'static str>;

    /// Narrow a generic URN to this type
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` when the entity kind does not match.
    fn from_urn(urn: Urn) -> StoreResult<Self>;

    /// Borrow the underlying generic URN
    fn as_urn(&self) -> &Urn;
}

impl EntityUrn for Urn {
    const ENTITY_TYPE: Option<&'static str> = None;

    fn from_urn(urn: Urn) -> StoreResult<Self> {
        Ok(urn)
    }

    fn as_urn(&self) -> &Urn {
        self
    }
}

/// Check a URN's entity kind against an expected one
pub fn check_entity_type(urn: &Urn, expected: &str) -> StoreResult<()> {
    if urn.entity_type() == expected {
        Ok(())
    } else {
        Err(StoreError::parse(format!(
            "URN `{}` has entity type `{}`, expected `{}`",
            urn,
            urn.entity_type(),
            expected
        )))
    }
}

/// Declare a newtype URN restricted to one entity kind
///
/// ```
/// use aspectdb_core::{typed_urn, EntityUrn, Urn};
///
/// typed_urn!(
///     /// Identifies a dataset
///     DatasetUrn, "dataset"
/// );
///
/// let urn = DatasetUrn::from_urn(Urn::parse("corp:dataset:foo").unwrap()).unwrap();
/// assert_eq!(urn.as_urn().id(), "foo");
/// assert!(DatasetUrn::from_urn(Urn::parse("corp:user:bob").unwrap()).is_err());
/// ```
#[macro_export]
macro_rules! typed_urn {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name($crate::Urn);

        impl $crate::EntityUrn for $name {
            const ENTITY_TYPE: Option<&'static str> = Some($entity);

            fn from_urn(urn: $crate::Urn) -> $crate::StoreResult<Self> {
                $crate::urn::check_entity_type(&urn, $entity)?;
                Ok($name(urn))
            }

            fn as_urn(&self) -> &$crate::Urn {
                &self.0
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::StoreError;

            fn from_str(s: &str) -> $crate::StoreResult<Self> {
                <$name as $crate::EntityUrn>::from_urn($crate::Urn::parse(s)?)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$name> for $crate::Urn {
            fn from(urn: $name) -> $crate::Urn {
                urn.0
            }
        }
    };
}
