//! Latest-value table
//!
//! Keeps only the newest message per kind plus the time anything was last
//! received. Written by the receive loop, read and cleared by API callers.

use contracts::{Message, MessageKind};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::warn;

/// Distinct unrecognized kinds kept at once
pub const MAX_UNRECOGNIZED_KINDS: usize = 32;

#[derive(Debug, Default)]
struct Slots {
    latest: HashMap<MessageKind, Message>,
    unrecognized: usize,
    last_receipt: Option<Instant>,
}

/// Latest-wins message buffer
#[derive(Debug, Default)]
pub struct LatestTable {
    slots: Mutex<Slots>,
}

impl LatestTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a message, replacing any previous one of the same kind
    ///
    /// The receipt time is updated even when the message itself is dropped
    /// because the unrecognized-kind cap is reached: any datagram proves the
    /// peer is alive.
    ///
    /// Returns `false` if the message was dropped.
    pub fn store(&self, kind: MessageKind, message: Message, received_at: Instant) -> bool {
        let mut slots = self.lock();
        slots.last_receipt = Some(received_at);

        let is_new_other = !kind.is_recognized() && !slots.latest.contains_key(&kind);
        if is_new_other {
            if slots.unrecognized >= MAX_UNRECOGNIZED_KINDS {
                warn!(kind = %kind, "Unrecognized kind limit reached, message dropped");
                return false;
            }
            slots.unrecognized += 1;
        }

        slots.latest.insert(kind, message);
        true
    }

    /// Remove and return the latest message of a kind
    pub fn take(&self, kind: &MessageKind) -> Option<Message> {
        let mut slots = self.lock();
        let message = slots.latest.remove(kind);
        if message.is_some() && !kind.is_recognized() {
            slots.unrecognized -= 1;
        }
        message
    }

    /// Time of the last stored datagram (`None` = never)
    pub fn last_receipt(&self) -> Option<Instant> {
        self.lock().last_receipt
    }

    /// Drop every buffered message and forget the last receipt
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.latest.clear();
        slots.unrecognized = 0;
        slots.last_receipt = None;
    }

    /// Number of buffered kinds
    pub fn len(&self) -> usize {
        self.lock().latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DataMessage, EventKind, HeartbeatResponse, RawMessage};
    use std::sync::Arc;
    use std::time::Duration;

    fn status(s: &str) -> Message {
        Message::Data(DataMessage::HeartbeatResponse(HeartbeatResponse::new(s)))
    }

    fn other(tag: &str) -> (MessageKind, Message) {
        let raw = RawMessage {
            message_type: RawMessage::DATA.into(),
            data_type: Some(tag.into()),
            event_type: None,
            data: None,
        };
        (MessageKind::from(tag), Message::Unrecognized(raw))
    }

    #[test]
    fn only_the_latest_value_is_observable() {
        let table = LatestTable::new();
        let now = Instant::now();
        for s in ["WAITING", "POSITIONING", "PLAYING"] {
            table.store(MessageKind::HeartbeatResponse, status(s), now);
        }

        assert_eq!(
            table.take(&MessageKind::HeartbeatResponse),
            Some(status("PLAYING"))
        );
        assert_eq!(table.take(&MessageKind::HeartbeatResponse), None);
    }

    #[test]
    fn kinds_are_independent() {
        let table = LatestTable::new();
        let now = Instant::now();
        table.store(MessageKind::PlayStart, Message::Event(EventKind::PlayStart), now);
        table.store(MessageKind::Reset, Message::Event(EventKind::Reset), now);

        assert!(table.take(&MessageKind::Reset).is_some());
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.take(&MessageKind::PlayStart),
            Some(Message::Event(EventKind::PlayStart))
        );
    }

    #[test]
    fn last_receipt_tracks_newest_store_and_clear_forgets_it() {
        let table = LatestTable::new();
        assert_eq!(table.last_receipt(), None);

        let first = Instant::now();
        let second = first + Duration::from_millis(10);
        table.store(MessageKind::Reset, Message::Event(EventKind::Reset), first);
        table.store(MessageKind::Reset, Message::Event(EventKind::Reset), second);
        assert_eq!(table.last_receipt(), Some(second));

        table.clear();
        assert_eq!(table.last_receipt(), None);
        assert!(table.is_empty());
    }

    #[test]
    fn unrecognized_kinds_are_capped() {
        let table = LatestTable::new();
        let now = Instant::now();
        for i in 0..MAX_UNRECOGNIZED_KINDS {
            let (kind, message) = other(&format!("custom_{i}"));
            assert!(table.store(kind, message, now));
        }

        let (kind, message) = other("one_too_many");
        assert!(!table.store(kind.clone(), message.clone(), now));

        // Replacing an existing kind is still allowed
        let (existing, replacement) = other("custom_0");
        assert!(table.store(existing.clone(), replacement, now));

        // Taking one frees a slot
        assert!(table.take(&existing).is_some());
        assert!(table.store(kind, message, now));
    }

    #[test]
    fn concurrent_writers_keep_one_value_per_kind() {
        let table = Arc::new(LatestTable::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        table.store(
                            MessageKind::HeartbeatResponse,
                            status(&format!("writer-{i}")),
                            Instant::now(),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 1);
        assert!(table.last_receipt().is_some());
    }
}
