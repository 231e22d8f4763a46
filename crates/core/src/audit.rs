//! Write attribution
//!
//! Every persisted aspect version carries exactly one [`AuditStamp`] naming
//! who wrote it and when. Stamps are always supplied by the caller; the store
//! never fabricates one.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::urn::Urn;

/// Actor recorded on snapshot bootstrap writes
pub const BOOTSTRAP_ACTOR: &str = "urn:li:dummy:unknown";

/// (actor, time) attribution attached to a write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Who performed the write
    pub actor: Urn,
    /// Milliseconds since Unix epoch
    pub time: i64,
    /// Actor acting on behalf of `actor`, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonator: Option<Urn>,
}

impl AuditStamp {
    /// Stamp with an explicit time
    pub fn new(actor: Urn, time: i64) -> Self {
        AuditStamp {
            actor,
            time,
            impersonator: None,
        }
    }

    /// Stamp with the current wall-clock time
    pub fn now(actor: Urn) -> Self {
        Self::new(actor, Utc::now().timestamp_millis())
    }

    /// The fixed stamp used to seed stores from a snapshot:
    /// actor `urn:li:dummy:unknown`, time 0
    pub fn bootstrap() -> Self {
        Self::new(Urn::from_trusted_parts("li", "dummy", "unknown"), 0)
    }

    /// Attach an impersonator
    pub fn with_impersonator(mut self, impersonator: Urn) -> Self {
        self.impersonator = Some(impersonator);
        self
    }

    /// Write time as a UTC datetime
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` when `time` is outside chrono's range.
    pub fn created_on(&self) -> StoreResult<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.time)
            .single()
            .ok_or_else(|| StoreError::parse(format!("audit time {} out of range", self.time)))
    }
}
