//! Aspects and aspect unions
//!
//! An [`Aspect`] is one typed facet of an entity's metadata. The aspects an
//! entity kind may carry form a closed set, expressed as an enum that
//! implements [`AspectUnion`]. Declare both sides at once with
//! [`aspect_union!`](crate::aspect_union):
//!
//! ```
//! use aspectdb_core::{aspect_union, Aspect, AspectUnion, UnionMember};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! pub struct DatasetProperties {
//!     pub description: String,
//! }
//!
//! impl Aspect for DatasetProperties {
//!     const KIND: &'static str = "DatasetProperties";
//! }
//!
//! aspect_union! {
//!     /// Everything a dataset can carry
//!     pub enum DatasetAspect {
//!         DatasetProperties(DatasetProperties),
//!     }
//! }
//!
//! let value: DatasetAspect = DatasetProperties { description: "d".into() }.into();
//! assert_eq!(value.kind(), "DatasetProperties");
//! assert!(DatasetProperties::from_union(value).is_some());
//! ```
//!
//! Payloads are stored as JSON text; the kind tag travels beside the payload
//! rather than inside it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// A structured record stored under a kind tag
pub trait Aspect:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Kind tag, unique within any union this aspect belongs to
    const KIND: &'static str;
}

/// A closed set of aspect shapes
pub trait AspectUnion: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Kind tags of every member, in declaration order
    const KINDS: &'static [&'static str];

    /// Kind tag of the held member
    fn kind(&self) -> &'static str;

    /// Encode the held member as JSON text
    fn to_payload(&self) -> StoreResult<String>;

    /// Decode a member from its kind tag and JSON text
    fn from_payload(kind: &str, payload: &str) -> StoreResult<Self>;

    /// True if `kind` names a member of this union
    fn contains_kind(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }
}

/// Membership of an aspect in a union
pub trait UnionMember<U: AspectUnion>: Aspect {
    /// Wrap into the union
    fn into_union(self) -> U;

    /// Unwrap from the union; `None` if another member is held
    fn from_union(value: U) -> Option<Self>;
}

/// Encode any aspect as JSON text
pub fn encode_payload<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::serialization(e.to_string()))
}

/// Decode an aspect from JSON text
pub fn decode_payload<T: DeserializeOwned>(payload: &str) -> StoreResult<T> {
    serde_json::from_str(payload).map_err(|e| StoreError::serialization(e.to_string()))
}

/// Error for a kind tag that is not part of a union
pub fn unknown_kind(union: &str, kind: &str) -> StoreError {
    StoreError::parse(format!("aspect kind `{}` is not a member of `{}`", kind, union))
}

/// Declare an aspect union enum and its membership impls
///
/// Every member type must implement [`Aspect`]. The macro derives
/// `Debug`, `Clone` and `PartialEq` on the enum and generates
/// [`AspectUnion`], [`UnionMember`] and `From<Member>`.
#[macro_export]
macro_rules! aspect_union {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident($ty:ty) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant($ty), )+
        }

        impl $crate::AspectUnion for $name {
            const KINDS: &'static [&'static str] = &[ $( <$ty as $crate::Aspect>::KIND ),+ ];

            fn kind(&self) -> &'static str {
                match self {
                    $( $name::$variant(_) => <$ty as $crate::Aspect>::KIND, )+
                }
            }

            fn to_payload(&self) -> $crate::StoreResult<String> {
                match self {
                    $( $name::$variant(value) => $crate::aspect::encode_payload(value), )+
                }
            }

            fn from_payload(kind: &str, payload: &str) -> $crate::StoreResult<Self> {
                $(
                    if kind == <$ty as $crate::Aspect>::KIND {
                        return $crate::aspect::decode_payload::<$ty>(payload).map($name::$variant);
                    }
                )+
                Err($crate::aspect::unknown_kind(stringify!($name), kind))
            }
        }

        $(
            impl $crate::UnionMember<$name> for $ty {
                fn into_union(self) -> $name {
                    $name::$variant(self)
                }

                fn from_union(value: $name) -> Option<Self> {
                    #[allow(unreachable_patterns)]
                    match value {
                        $name::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for $name {
                fn from(value: $ty) -> Self {
                    $name::$variant(value)
                }
            }
        )+
    };
}
