//! World: entity container, frame clock and event scheduler
//!
//! Every call to [`World::update`] advances the logical clock by exactly one
//! tick and runs the same passes in the same order:
//!
//! 0. Admit entities passed to [`World::add`] since the previous update
//! 1. Fire due events
//! 2. Advance running behaviors by one command
//! 3. Apply velocities
//! 4. Prune destroyed entities
//! 5. Recycle pooled instances whose predicate holds
//! 6. Increment the tick counter
//!
//! Entities are visited in the order they joined the active set and events in
//! fire-tick-then-insertion order, so identical inputs replay identically.
//! Nothing here looks at wall-clock time.

use std::collections::BTreeMap;
use std::fmt;

use slotmap::SlotMap;
use thiserror::Error;

use crate::config::WorldConfig;
use crate::entity::{Command, EntityId, EntityKind, GameEntity};
use crate::events::{CallbackId, EventCallback, EventQueue, GameEvent};
use crate::pool::{ObjectPool, PoolError};

#[cfg(test)]
mod tests;

/// Configuration errors surfaced by world operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// No entity is stored under this handle
    #[error("Entity {0:?} does not exist")]
    EntityNotFound(EntityId),

    /// The entity is already active or waiting to become active
    #[error("Entity {0:?} is already in the world")]
    AlreadyActive(EntityId),

    /// The entity sits in a pool's free list
    #[error("Entity {0:?} is held by its pool; request it with create_entity")]
    EntityPooled(EntityId),

    /// No pool is registered for the requested kind
    #[error("No pool registered for {0:?}")]
    UnregisteredPool(EntityKind),

    /// A pool is already registered for this kind
    #[error("A pool for {0:?} is already registered")]
    DuplicatePool(EntityKind),

    /// A pool factory produced an entity of another kind
    #[error("Pool for {expected:?} produced an entity of kind {found:?}")]
    PoolKindMismatch {
        /// Kind the pool is registered for
        expected: EntityKind,
        /// Kind of the entity the factory returned
        found: EntityKind,
    },

    /// No callback is registered under this handle
    #[error("Callback {0:?} is not registered")]
    UnknownCallback(CallbackId),

    /// The entity has no behavior to start
    #[error("Entity {0:?} has no behavior attached")]
    NoBehavior(EntityId),

    /// Pool configuration error
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Where an entity currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Stored but not part of the simulation
    Detached,
    /// Added; joins the active set at the start of the next update
    Pending,
    /// In the active set
    Active,
    /// In its pool's free list
    Pooled,
}

/// Bookkeeping from the most recent update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Tick counter after the update
    pub tick: u64,
    /// Events removed from the queue
    pub events_fired: usize,
    /// Behavior commands applied
    pub commands_applied: usize,
    /// Destroyed entities removed
    pub pruned: usize,
    /// Instances returned to their pools
    pub recycled: usize,
    /// Size of the active set after the update
    pub active: usize,
}

struct Slot {
    entity: GameEntity,
    residency: Residency,
}

type CallbackSlot = Option<Box<dyn EventCallback>>;

/// Composition root of the runtime
pub struct World {
    config: WorldConfig,
    tick: u64,
    entities: SlotMap<EntityId, Slot>,
    active: Vec<EntityId>,
    pending: Vec<EntityId>,
    pools: BTreeMap<EntityKind, ObjectPool>,
    events: EventQueue,
    callbacks: SlotMap<CallbackId, CallbackSlot>,
    stats: FrameStats,
    updating: bool,
}

impl World {
    /// Create a world with the default configuration
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a world with an explicit configuration
    pub fn with_config(config: WorldConfig) -> Self {
        log::debug!("Creating world {}x{}", config.width, config.height);
        Self {
            config,
            tick: 0,
            entities: SlotMap::with_key(),
            active: Vec::new(),
            pending: Vec::new(),
            pools: BTreeMap::new(),
            events: EventQueue::new(),
            callbacks: SlotMap::with_key(),
            stats: FrameStats::default(),
            updating: false,
        }
    }

    /// World configuration
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Current tick counter
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Tick that scheduling delays are measured from
    ///
    /// Equal to [`World::tick`] between updates. Inside an update, and so
    /// inside event callbacks, it is the tick the update is producing.
    pub fn now(&self) -> u64 {
        if self.updating {
            self.tick + 1
        } else {
            self.tick
        }
    }

    /// Bookkeeping from the most recent update
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Store an entity without activating it
    pub fn insert(&mut self, entity: GameEntity) -> EntityId {
        self.entities.insert(Slot {
            entity,
            residency: Residency::Detached,
        })
    }

    /// Store an entity and add it to the world
    pub fn spawn(&mut self, entity: GameEntity) -> EntityId {
        let id = self.entities.insert(Slot {
            entity,
            residency: Residency::Pending,
        });
        self.pending.push(id);
        id
    }

    /// Add a stored entity to the world
    ///
    /// The entity joins the active set at the start of the next update, so an
    /// entity added from an event callback is first moved one update later.
    pub fn add(&mut self, id: EntityId) -> Result<(), WorldError> {
        let slot = self.entities.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        match slot.residency {
            Residency::Detached => {
                slot.residency = Residency::Pending;
                self.pending.push(id);
                Ok(())
            }
            Residency::Pending | Residency::Active => Err(WorldError::AlreadyActive(id)),
            Residency::Pooled => Err(WorldError::EntityPooled(id)),
        }
    }

    /// Read access to a stored entity
    pub fn entity(&self, id: EntityId) -> Option<&GameEntity> {
        self.entities.get(id).map(|slot| &slot.entity)
    }

    /// Write access to a stored entity
    ///
    /// Instances waiting in a pool's free list are not accessible.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut GameEntity> {
        self.entities
            .get_mut(id)
            .filter(|slot| slot.residency != Residency::Pooled)
            .map(|slot| &mut slot.entity)
    }

    /// Where an entity currently lives
    pub fn residency(&self, id: EntityId) -> Option<Residency> {
        self.entities.get(id).map(|slot| slot.residency)
    }

    /// Whether the entity is in the active set
    pub fn is_active(&self, id: EntityId) -> bool {
        self.residency(id) == Some(Residency::Active)
    }

    /// Whether an entity is stored under this handle
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Active entity handles in update order
    pub fn active_ids(&self) -> &[EntityId] {
        &self.active
    }

    /// Active entities in update order
    pub fn active(&self) -> impl Iterator<Item = (EntityId, &GameEntity)> {
        self.active
            .iter()
            .filter_map(|id| self.entities.get(*id).map(|slot| (*id, &slot.entity)))
    }

    /// Size of the active set
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Attach a behavior to an entity, replacing any previous one
    pub fn attach_behavior(
        &mut self,
        id: EntityId,
        commands: Vec<Command>,
    ) -> Result<(), WorldError> {
        self.usable_entity(id)?.set_behavior(commands);
        Ok(())
    }

    /// Start an entity's behavior; its first command runs on the next update
    pub fn start_behavior(&mut self, id: EntityId) -> Result<(), WorldError> {
        if self.usable_entity(id)?.start_behavior() {
            Ok(())
        } else {
            Err(WorldError::NoBehavior(id))
        }
    }

    fn usable_entity(&mut self, id: EntityId) -> Result<&mut GameEntity, WorldError> {
        let slot = self.entities.get_mut(id).ok_or(WorldError::EntityNotFound(id))?;
        if slot.residency == Residency::Pooled {
            return Err(WorldError::EntityPooled(id));
        }
        Ok(&mut slot.entity)
    }

    // ------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------

    /// Register the pool for its entity kind
    pub fn register_pool(&mut self, pool: ObjectPool) -> Result<(), WorldError> {
        let kind = pool.kind();
        if self.pools.contains_key(&kind) {
            return Err(WorldError::DuplicatePool(kind));
        }
        log::info!("Registered object pool for {kind:?}");
        self.pools.insert(kind, pool);
        Ok(())
    }

    /// Pool registered for `kind`
    pub fn pool(&self, kind: EntityKind) -> Option<&ObjectPool> {
        self.pools.get(&kind)
    }

    /// Obtain an entity of `kind` from its pool
    ///
    /// Recycled instances are handed out first, untouched; the caller resets
    /// whatever spawn state it needs. The factory runs only when the free list
    /// is empty. The returned entity is not active until passed to [`World::add`].
    pub fn create_entity(&mut self, kind: EntityKind) -> Result<EntityId, WorldError> {
        let pool = self.pools.get_mut(&kind).ok_or(WorldError::UnregisteredPool(kind))?;

        if let Some(id) = pool.acquire() {
            match self.entities.get_mut(id) {
                Some(slot) => {
                    debug_assert_eq!(slot.residency, Residency::Pooled);
                    slot.residency = Residency::Detached;
                    log::debug!("Reusing pooled {kind:?} {id:?}");
                    return Ok(id);
                }
                None => debug_assert!(false, "pooled instance {id:?} missing from storage"),
            }
        }

        let entity = pool
            .create()
            .map_err(|found| WorldError::PoolKindMismatch { expected: kind, found })?;
        let id = self.insert(entity);
        log::debug!("Created new {kind:?} {id:?}");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Register an event callback
    pub fn register_callback(&mut self, callback: impl EventCallback + 'static) -> CallbackId {
        self.callbacks.insert(Some(Box::new(callback)))
    }

    /// Unregister an event callback
    ///
    /// Events already scheduled for it still fire but reach nobody.
    pub fn unregister_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(id).is_some()
    }

    /// Schedule an event `delay` ticks from now
    ///
    /// The event fires during the update that brings the tick counter to the
    /// returned fire tick. Between updates "now" is the current counter; from
    /// inside an event callback it is the tick being produced, so a callback
    /// that reschedules itself with delay `n` fires every `n` updates.
    /// The callback never runs synchronously; with a delay of zero it runs
    /// during the next update.
    pub fn add_event_after_current_time(
        &mut self,
        callback: CallbackId,
        delay: u64,
        type_tag: u32,
        payload: impl Into<String>,
    ) -> Result<u64, WorldError> {
        if !self.callbacks.contains_key(callback) {
            return Err(WorldError::UnknownCallback(callback));
        }
        let fire_tick = self.events.schedule(callback, self.now(), delay, type_tag, payload);
        log::trace!("Scheduled event type {type_tag} for tick {fire_tick}");
        Ok(fire_tick)
    }

    /// Number of scheduled events not yet fired
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Fire tick of the earliest scheduled event
    pub fn next_event_tick(&self) -> Option<u64> {
        self.events.next_fire_tick()
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Advance the world by exactly one tick
    ///
    /// Must not be called from an event callback. Development builds panic on
    /// a nested call; release builds ignore it.
    pub fn update(&mut self) {
        debug_assert!(!self.updating, "World::update called re-entrantly");
        if self.updating {
            log::error!("Ignoring nested World::update at tick {}", self.tick);
            return;
        }
        self.updating = true;
        self.admit_pending();

        let events_fired = self.fire_due_events();
        let commands_applied = self.advance_behaviors();
        self.advance_motion();
        let pruned = self.prune_destroyed();
        let recycled = self.recycle_pass();

        self.updating = false;
        self.tick += 1;
        self.stats = FrameStats {
            tick: self.tick,
            events_fired,
            commands_applied,
            pruned,
            recycled,
            active: self.active.len(),
        };
        log::trace!("Tick {} done: {:?}", self.tick, self.stats);
    }

    fn admit_pending(&mut self) {
        for id in std::mem::take(&mut self.pending) {
            if let Some(slot) = self.entities.get_mut(id) {
                if slot.residency == Residency::Pending {
                    slot.residency = Residency::Active;
                    self.active.push(id);
                }
            }
        }
    }

    /// Events due by the tick this update completes
    fn fire_due_events(&mut self) -> usize {
        let due = self.events.advance(self.tick + 1);
        let fired = due.len();

        for event in due {
            self.dispatch(&event);
        }
        fired
    }

    fn dispatch(&mut self, event: &GameEvent) {
        let taken = self.callbacks.get_mut(event.callback).and_then(Option::take);
        let Some(mut callback) = taken else {
            log::warn!(
                "Event type {} ({}) fired for unregistered callback",
                event.type_tag,
                event.payload
            );
            return;
        };

        log::debug!(
            "Firing event type {} ({}) at tick {}",
            event.type_tag,
            event.payload,
            self.tick
        );
        callback.on_event(self, event);

        // The callback may have unregistered itself while it was running
        if let Some(slot) = self.callbacks.get_mut(event.callback) {
            *slot = Some(callback);
        }
    }

    fn advance_behaviors(&mut self) -> usize {
        let step = self.config.behavior_step;
        let mut applied = 0;
        for id in &self.active {
            if let Some(slot) = self.entities.get_mut(*id) {
                if !slot.entity.is_destroyed() && slot.entity.step_behavior(step) {
                    applied += 1;
                }
            }
        }
        applied
    }

    fn advance_motion(&mut self) {
        for id in &self.active {
            if let Some(slot) = self.entities.get_mut(*id) {
                if !slot.entity.is_destroyed() {
                    slot.entity.integrate();
                }
            }
        }
    }

    /// Free destroyed entities, active or detached
    fn prune_destroyed(&mut self) -> usize {
        let entities = &mut self.entities;
        let mut pruned = 0;
        self.active.retain(|id| {
            let destroyed = entities.get(*id).map_or(true, |slot| slot.entity.is_destroyed());
            if destroyed {
                entities.remove(*id);
                pruned += 1;
            }
            !destroyed
        });

        let before = self.entities.len();
        self.entities.retain(|_, slot| {
            slot.residency != Residency::Detached || !slot.entity.is_destroyed()
        });
        pruned + (before - self.entities.len())
    }

    fn recycle_pass(&mut self) -> usize {
        let entities = &mut self.entities;
        let active = &mut self.active;
        let mut recycled = 0;

        for pool in self.pools.values_mut() {
            let kind = pool.kind();
            active.retain(|id| {
                let Some(slot) = entities.get_mut(*id) else {
                    return false;
                };
                if slot.entity.kind != kind || !pool.should_recycle(&slot.entity) {
                    return true;
                }
                slot.residency = Residency::Pooled;
                pool.release(*id);
                log::debug!("Recycling {kind:?} {id:?}");
                recycled += 1;
                false
            });
        }
        recycled
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("active", &self.active.len())
            .field("pending", &self.pending.len())
            .field("stored", &self.entities.len())
            .field("pools", &self.pools)
            .field("events", &self.events.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
