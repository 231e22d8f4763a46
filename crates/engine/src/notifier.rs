//! Change notification
//!
//! Stores call their [`ChangeNotifier`] once per committed write, after the
//! commit. Delivery is fire-and-forget: a failing notifier is logged and the
//! write still succeeds.

use std::sync::Arc;

use parking_lot::Mutex;

use aspectdb_core::{AspectUnion, ChangeEvent, EntityUrn, StoreResult};

/// Receiver of change events
pub trait ChangeNotifier<U: EntityUrn, A: AspectUnion>: Send + Sync {
    /// Deliver one event
    fn notify(&self, event: &ChangeEvent<U, A>) -> StoreResult<()>;
}

/// Notifier that drops every event
///
/// Used for bootstrap loads and stores without an event pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl<U: EntityUrn, A: AspectUnion> ChangeNotifier<U, A> for NoopNotifier {
    fn notify(&self, _event: &ChangeEvent<U, A>) -> StoreResult<()> {
        Ok(())
    }
}

/// Notifier that keeps every event in memory
#[derive(Debug)]
pub struct CollectingNotifier<U: EntityUrn, A: AspectUnion> {
    events: Mutex<Vec<ChangeEvent<U, A>>>,
}

impl<U: EntityUrn, A: AspectUnion> CollectingNotifier<U, A> {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Events received so far, in delivery order
    pub fn events(&self) -> Vec<ChangeEvent<U, A>> {
        self.events.lock().clone()
    }

    /// Number of events received
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing was received
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return everything received so far
    pub fn drain(&self) -> Vec<ChangeEvent<U, A>> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl<U: EntityUrn, A: AspectUnion> Default for CollectingNotifier<U, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: EntityUrn, A: AspectUnion> ChangeNotifier<U, A> for CollectingNotifier<U, A> {
    fn notify(&self, event: &ChangeEvent<U, A>) -> StoreResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

impl<U, A, N> ChangeNotifier<U, A> for Arc<N>
where
    U: EntityUrn,
    A: AspectUnion,
    N: ChangeNotifier<U, A> + ?Sized,
{
    fn notify(&self, event: &ChangeEvent<U, A>) -> StoreResult<()> {
        (**self).notify(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspectdb_core::{aspect_union, Aspect, AspectVersion, AuditStamp, Urn};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Status {
        removed: bool,
    }

    impl Aspect for Status {
        const KIND: &'static str = "Status";
    }

    aspect_union! {
        enum TestAspect {
            Status(Status),
        }
    }

    fn event(removed: bool) -> ChangeEvent<Urn, TestAspect> {
        ChangeEvent {
            urn: Urn::parse("x:1").unwrap(),
            old_value: None,
            new_value: Status { removed }.into(),
            version: AspectVersion::LATEST,
            audit_stamp: AuditStamp::bootstrap(),
        }
    }

    #[test]
    fn test_noop_accepts_everything() {
        assert!(NoopNotifier.notify(&event(false)).is_ok());
    }

    #[test]
    fn test_collecting_keeps_order() {
        let notifier = CollectingNotifier::new();
        notifier.notify(&event(false)).unwrap();
        notifier.notify(&event(true)).unwrap();
        assert_eq!(notifier.len(), 2);

        let events = notifier.drain();
        assert_eq!(events[0], event(false));
        assert_eq!(events[1], event(true));
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_shared_notifier_sees_events() {
        let shared = Arc::new(CollectingNotifier::new());
        let handle: Arc<dyn ChangeNotifier<Urn, TestAspect>> = shared.clone();
        handle.notify(&event(true)).unwrap();
        assert_eq!(shared.len(), 1);
    }
}
