//! Tick-based event scheduling
//!
//! Key principles:
//! - Events carry a small integer type tag and an opaque payload
//! - Fire times are absolute ticks, fixed when the event is scheduled
//! - Due events leave the queue before their callback runs
//! - Ties on fire time are broken by insertion order (FIFO)
//!
//! There is no cancellation. A callback whose subject went away simply
//! receives the event and decides for itself to ignore it.

use std::collections::BTreeMap;

use crate::world::World;

slotmap::new_key_type! {
    /// Handle to a callback registered with the world
    pub struct CallbackId;
}

/// Event fired by the world when its tick counter reaches the fire time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEvent {
    /// Callback that receives the event
    pub callback: CallbackId,
    /// Absolute tick at which the event fires
    pub fire_tick: u64,
    /// Caller-defined event type
    pub type_tag: u32,
    /// Caller-defined payload
    pub payload: String,
    /// Insertion order, unique per queue
    pub sequence: u64,
}

/// Receiver of fired events
///
/// The world is handed back to the callback so that it can spawn entities and
/// schedule follow-up events. Events scheduled from inside a callback are
/// never fired within the same update.
pub trait EventCallback {
    /// Handle a fired event
    fn on_event(&mut self, world: &mut World, event: &GameEvent);
}

impl<F> EventCallback for F
where
    F: FnMut(&mut World, &GameEvent),
{
    fn on_event(&mut self, world: &mut World, event: &GameEvent) {
        self(world, event);
    }
}

/// Time-ordered queue of scheduled events
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: BTreeMap<(u64, u64), GameEvent>,
    next_sequence: u64,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event `delay` ticks after `now`
    ///
    /// Returns the absolute fire tick.
    pub fn schedule(
        &mut self,
        callback: CallbackId,
        now: u64,
        delay: u64,
        type_tag: u32,
        payload: impl Into<String>,
    ) -> u64 {
        let fire_tick = now.saturating_add(delay);
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.pending.insert(
            (fire_tick, sequence),
            GameEvent {
                callback,
                fire_tick,
                type_tag,
                payload: payload.into(),
                sequence,
            },
        );
        fire_tick
    }

    /// Remove and return every event with a fire tick at or before `tick`
    ///
    /// Events come out in ascending fire tick, then insertion order.
    pub fn advance(&mut self, tick: u64) -> Vec<GameEvent> {
        let due = match tick.checked_add(1) {
            Some(bound) => {
                let later = self.pending.split_off(&(bound, 0));
                std::mem::replace(&mut self.pending, later)
            }
            None => std::mem::take(&mut self.pending),
        };
        due.into_values().collect()
    }

    /// Fire tick of the earliest pending event
    pub fn next_fire_tick(&self) -> Option<u64> {
        self.pending.keys().next().map(|(tick, _)| *tick)
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no event is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
