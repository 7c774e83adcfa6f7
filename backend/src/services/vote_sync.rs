//! Cross-view vote count propagation.
//!
//! A `VoteSync` is a session-scoped broadcast channel. The action store
//! publishes a `VoteEvent` after every vote the catalog accepted, and every
//! view of an entity holds a `VoteCounter` that replaces its displayed count
//! with the published one. Events are delivered in publish order and are not
//! replayed: a counter mounted after an event only sees later ones.

use serde::Serialize;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{trace, warn};

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteEvent {
    pub entity_id: String,
    pub new_count: u64,
    pub upvoted: bool,
}

/// Publish side of the channel. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct VoteSync {
    sender: broadcast::Sender<VoteEvent>,
}

impl VoteSync {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends `event` to every current subscriber, returning how many there were.
    pub fn publish(&self, event: VoteEvent) -> usize {
        trace!(entity_id = %event.entity_id, new_count = event.new_count, "publishing vote event");
        // No subscribers is not an error: nothing is mounted.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoteEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for VoteSync {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One rendered view of an entity's vote count.
///
/// Mounting subscribes, dropping unsubscribes.
pub struct VoteCounter {
    entity_id: String,
    count: u64,
    receiver: broadcast::Receiver<VoteEvent>,
}

impl VoteCounter {
    pub fn mount(sync: &VoteSync, entity_id: impl Into<String>, initial_count: u64) -> Self {
        Self {
            entity_id: entity_id.into(),
            count: initial_count,
            receiver: sync.subscribe(),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Applies every event already delivered, without waiting, and returns the count.
    pub fn sync(&mut self) -> u64 {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    self.apply(&event);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(entity_id = %self.entity_id, skipped, "vote counter lagged behind");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        self.count
    }

    /// Waits for the next event about this entity. `None` once the channel is gone.
    pub async fn changed(&mut self) -> Option<u64> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.apply(&event) {
                        return Some(self.count);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(entity_id = %self.entity_id, skipped, "vote counter lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn apply(&mut self, event: &VoteEvent) -> bool {
        if event.entity_id != self.entity_id {
            return false;
        }
        self.count = event.new_count;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(entity_id: &str, new_count: u64) -> VoteEvent {
        VoteEvent {
            entity_id: entity_id.to_string(),
            new_count,
            upvoted: true,
        }
    }

    #[test]
    fn counters_only_apply_their_own_entity() {
        let sync = VoteSync::new(8);
        let mut a = VoteCounter::mount(&sync, "a", 1);
        let mut b = VoteCounter::mount(&sync, "b", 5);

        assert_eq!(sync.publish(event("a", 2)), 2);

        assert_eq!(a.sync(), 2);
        assert_eq!(b.sync(), 5);
    }

    #[test]
    fn events_apply_in_publish_order() {
        let sync = VoteSync::new(8);
        let mut view = VoteCounter::mount(&sync, "a", 0);

        sync.publish(event("a", 3));
        sync.publish(event("a", 4));
        sync.publish(event("a", 3));

        assert_eq!(view.sync(), 3);
    }

    #[test]
    fn late_mounts_do_not_see_earlier_events() {
        let sync = VoteSync::new(8);
        sync.publish(event("a", 9));

        let mut late = VoteCounter::mount(&sync, "a", 7);
        assert_eq!(late.sync(), 7);
    }

    #[test]
    fn dropping_a_counter_unsubscribes() {
        let sync = VoteSync::new(8);
        let view = VoteCounter::mount(&sync, "a", 0);
        assert_eq!(sync.subscriber_count(), 1);

        drop(view);
        assert_eq!(sync.subscriber_count(), 0);
        assert_eq!(sync.publish(event("a", 1)), 0);
    }

    #[test]
    fn lagging_counter_keeps_latest_value() {
        let sync = VoteSync::new(2);
        let mut view = VoteCounter::mount(&sync, "a", 0);

        for count in 1..=5 {
            sync.publish(event("a", count));
        }

        assert_eq!(view.sync(), 5);
    }

    #[tokio::test]
    async fn changed_waits_for_matching_event() {
        let sync = VoteSync::new(8);
        let mut view = VoteCounter::mount(&sync, "a", 0);

        let publisher = sync.clone();
        tokio::spawn(async move {
            publisher.publish(event("b", 1));
            publisher.publish(event("a", 11));
        });

        assert_eq!(view.changed().await, Some(11));
        assert_eq!(view.count(), 11);
    }
}
