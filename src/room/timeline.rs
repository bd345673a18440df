use crate::event::Event;

/// Ordered message history of a room, oldest first.
///
/// The sequence is kept sorted by each event's intra-timeline order key.
/// Insertion locates the slot instead of appending because pagination
/// prepends older events out of band from the live tail.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    events: Vec<Event>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in timeline order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Insert an event at the first position whose occupant does not
    /// precede it. Ties go before earlier arrivals with the same key.
    pub fn insert(&mut self, event: Event) {
        let at = self.events.partition_point(|e| e.order < event.order);
        self.events.insert(at, event);
    }
}
