//! Change events
//!
//! A [`ChangeEvent`] describes one successful write. Stores hand it to their
//! change notifier after the write commits; it is never persisted.

use crate::aspect::AspectUnion;
use crate::audit::AuditStamp;
use crate::urn::EntityUrn;
use crate::version::AspectVersion;

/// Observable effect of a committed write
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<U: EntityUrn, A: AspectUnion> {
    /// Entity that was written
    pub urn: U,
    /// Value previously held by the written slot, if any
    pub old_value: Option<A>,
    /// Value now held by the written slot
    pub new_value: A,
    /// Slot that was written
    pub version: AspectVersion,
    /// Attribution of the write
    pub audit_stamp: AuditStamp,
}

impl<U: EntityUrn, A: AspectUnion> ChangeEvent<U, A> {
    /// Kind tag of the written aspect
    pub fn aspect_kind(&self) -> &'static str {
        self.new_value.kind()
    }

    /// True when the write created the slot
    pub fn is_create(&self) -> bool {
        self.old_value.is_none()
    }
}
