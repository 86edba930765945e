//! Event broadcaster — per-room and operator observer scopes backed by
//! tokio [`broadcast`] channels.
//!
//! Delivery is fire-and-forget with latest-value semantics: publishing
//! succeeds even with zero subscribers (the event is simply dropped), and a
//! subscriber that falls behind skips ahead to the newest events rather
//! than replaying what it missed.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use chiller_domain::event::{Envelope, OperatorEvent, RoomEvent};
use chiller_domain::id::RoomId;

/// Publish/subscribe hub for room-scoped and operator-scoped events.
pub struct EventBroadcaster {
    capacity: usize,
    rooms: Mutex<HashMap<RoomId, broadcast::Sender<Envelope<RoomEvent>>>>,
    operator: broadcast::Sender<Envelope<OperatorEvent>>,
}

impl EventBroadcaster {
    /// Create a broadcaster whose channels buffer up to `capacity` events
    /// before lagging subscribers start skipping.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (operator, _) = broadcast::channel(capacity);
        Self {
            capacity,
            rooms: Mutex::new(HashMap::new()),
            operator,
        }
    }

    /// Publish an event to one room's observers.
    ///
    /// A room nobody has subscribed to has no channel yet; the event is
    /// dropped, which is exactly the latest-value contract.
    pub fn publish_room(&self, room_id: &RoomId, event: RoomEvent) {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = rooms.get(room_id) {
            // send fails only with zero receivers, which is fine.
            let _ = sender.send(Envelope::new(event));
        }
    }

    /// Publish an event to the operator observers.
    pub fn publish_operator(&self, event: OperatorEvent) {
        let _ = self.operator.send(Envelope::new(event));
    }

    /// Subscribe to one room's events.
    ///
    /// The channel is created lazily on first subscription; only events
    /// published *after* the subscription are delivered.
    pub fn subscribe_room(&self, room_id: &RoomId) -> broadcast::Receiver<Envelope<RoomEvent>> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to the operator scope.
    #[must_use]
    pub fn subscribe_operator(&self) -> broadcast::Receiver<Envelope<OperatorEvent>> {
        self.operator.subscribe()
    }

    /// Number of room channels that have been materialized so far.
    ///
    /// Channels come into being on first subscription only, so this stays
    /// bounded by the set of rooms somebody actually watched.
    #[must_use]
    pub fn room_channel_count(&self) -> usize {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of currently attached observers across all scopes.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        self.operator.receiver_count()
            + rooms
                .values()
                .map(broadcast::Sender::receiver_count)
                .sum::<usize>()
    }
}

/// Turn a subscription into a stream of envelopes, skipping over lag.
pub fn event_stream<P>(
    receiver: broadcast::Receiver<Envelope<P>>,
) -> impl tokio_stream::Stream<Item = Envelope<P>>
where
    P: Clone + Send + 'static,
{
    BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(envelope) => Some(envelope),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "observer lagged, skipping to latest events");
            None
        }
    })
}
