//! Typed event stream with pre-allocated ring buffers.
//!
//! Every observable state transition in a run (release, operation start and
//! end, breakdown, deposit, trip completion) is emitted as an [`Event`] and
//! recorded in a per-kind [`EventBuffer`]. The engine delivers buffered
//! events to passive listeners whenever simulated time advances, so a
//! listener sees all events of one timestamp before the clock moves on.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind. Suppressed events have zero cost.

use crate::fixed::SimTime;
use crate::id::*;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the time at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Job lifecycle --
    JobSubmitted {
        job: JobId,
        at: SimTime,
    },
    JobReleased {
        job: JobId,
        at: SimTime,
    },
    OperationStarted {
        job: JobId,
        server: ServerId,
        op_index: usize,
        at: SimTime,
    },
    OperationCompleted {
        job: JobId,
        server: ServerId,
        op_index: usize,
        at: SimTime,
    },
    JobFinished {
        job: JobId,
        at: SimTime,
    },
    ReworkTriggered {
        job: JobId,
        server: ServerId,
        loopback: usize,
        at: SimTime,
    },

    // -- Server state --
    ServerDown {
        server: ServerId,
        at: SimTime,
    },
    ServerRepaired {
        server: ServerId,
        at: SimTime,
    },

    // -- Intralogistics --
    StockShort {
        store: StoreId,
        product: ProductId,
        missing: u32,
        at: SimTime,
    },
    StockDeposited {
        store: StoreId,
        product: ProductId,
        quantity: u32,
        at: SimTime,
    },
    PickCompleted {
        store: StoreId,
        job: JobId,
        product: ProductId,
        quantity: u32,
        at: SimTime,
    },
    AgvTripCompleted {
        agv: AgvId,
        job: JobId,
        at: SimTime,
    },
}

/// Discriminant tag for event kinds, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobSubmitted,
    JobReleased,
    OperationStarted,
    OperationCompleted,
    JobFinished,
    ReworkTriggered,
    ServerDown,
    ServerRepaired,
    StockShort,
    StockDeposited,
    PickCompleted,
    AgvTripCompleted,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 12;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::JobSubmitted { .. } => EventKind::JobSubmitted,
            Event::JobReleased { .. } => EventKind::JobReleased,
            Event::OperationStarted { .. } => EventKind::OperationStarted,
            Event::OperationCompleted { .. } => EventKind::OperationCompleted,
            Event::JobFinished { .. } => EventKind::JobFinished,
            Event::ReworkTriggered { .. } => EventKind::ReworkTriggered,
            Event::ServerDown { .. } => EventKind::ServerDown,
            Event::ServerRepaired { .. } => EventKind::ServerRepaired,
            Event::StockShort { .. } => EventKind::StockShort,
            Event::StockDeposited { .. } => EventKind::StockDeposited,
            Event::PickCompleted { .. } => EventKind::PickCompleted,
            Event::AgvTripCompleted { .. } => EventKind::AgvTripCompleted,
        }
    }

    /// The time at which this event occurred.
    pub fn at(&self) -> SimTime {
        match self {
            Event::JobSubmitted { at, .. }
            | Event::JobReleased { at, .. }
            | Event::OperationStarted { at, .. }
            | Event::OperationCompleted { at, .. }
            | Event::JobFinished { at, .. }
            | Event::ReworkTriggered { at, .. }
            | Event::ServerDown { at, .. }
            | Event::ServerRepaired { at, .. }
            | Event::StockShort { at, .. }
            | Event::StockDeposited { at, .. }
            | Event::PickCompleted { at, .. }
            | Event::AgvTripCompleted { at, .. } => *at,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer — pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    /// Number of events currently stored (may be less than capacity).
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event into the ring buffer. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    /// The total capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    /// Number of events currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head points to the next write position, which is the oldest entry
            self.head
        };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    /// Clear all events from the buffer.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventBuffer`], from oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// The central event bus. One ring buffer per event kind, passive listener
/// lists, and suppression flags.
pub struct EventBus {
    /// One ring buffer per event kind, allocated on first emit.
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],

    /// Suppressed event kinds. Suppressed events are never buffered.
    suppressed: [bool; EVENT_KIND_COUNT],

    /// Listeners indexed by event kind, called in registration order.
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],

    /// Default buffer capacity for new event buffers.
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

const fn empty_listener_array() -> [Vec<PassiveListener>; EVENT_KIND_COUNT] {
    // Cannot use Default in const context, so we build it manually.
    [
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
    ]
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: empty_listener_array(),
            default_capacity,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    /// Check if an event kind is suppressed.
    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event. Stores it in the appropriate ring buffer. No-ops if
    /// the event kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();

        if self.suppressed[idx] {
            return;
        }

        let buffer = self.buffers[idx].get_or_insert_with(|| EventBuffer::new(self.default_capacity));
        buffer.push(event);
    }

    /// Register a passive listener for an event kind. Listeners are called
    /// in registration order during delivery.
    pub fn on(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Deliver all buffered events to listeners, oldest to newest per kind,
    /// and clear the buffers. Called by the engine whenever time advances.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            if self.suppressed[idx] {
                continue;
            }

            let Some(buffer) = self.buffers[idx].as_ref() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            // Collect events into a temporary Vec to avoid borrow conflicts
            // between the buffer and listeners.
            let events: Vec<Event> = buffer.iter().cloned().collect();

            for listener in &mut self.listeners[idx] {
                for event in &events {
                    listener(event);
                }
            }

            if let Some(buffer) = self.buffers[idx].as_mut() {
                buffer.clear();
            }
        }
    }

    /// Get the event buffer for a specific event kind (read-only).
    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Get the count of events currently buffered for a kind.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Get the total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.total_written())
            .unwrap_or(0)
    }

    /// Clear all buffers. Does not remove listeners or suppression settings.
    pub fn clear_all(&mut self) {
        for buffer in &mut self.buffers {
            if let Some(b) = buffer.as_mut() {
                b.clear();
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
