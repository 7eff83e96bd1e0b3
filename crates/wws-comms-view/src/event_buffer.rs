use std::collections::VecDeque;

use wws_comms_protocol::{CommsEvent, EVENT_BUFFER_CAPACITY};

/// Bounded newest-first event log.
///
/// Order is insertion order, not timestamp order: index 0 is always the
/// most recently inserted event.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: VecDeque<CommsEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the contents with an already newest-first page, keeping at
    /// most `capacity` of its leading events.
    pub fn seed(&mut self, page: impl IntoIterator<Item = CommsEvent>) {
        self.events.clear();
        self.events.extend(page.into_iter().take(self.capacity));
    }

    /// Insert at the front. Returns the evicted oldest event when full.
    pub fn push_front(&mut self, event: CommsEvent) -> Option<CommsEvent> {
        self.events.push_front(event);
        if self.events.len() > self.capacity {
            self.events.pop_back()
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&CommsEvent> {
        self.events.get(index)
    }

    pub fn newest(&self) -> Option<&CommsEvent> {
        self.events.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommsEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}
