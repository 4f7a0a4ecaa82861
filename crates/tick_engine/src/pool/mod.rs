//! Typed object pooling
//!
//! One [`ObjectPool`] per recyclable [`EntityKind`]. A pool keeps a free list
//! of entity handles that were reclaimed by the world's recycle pass and hands
//! them out again before falling back to its factory.
//!
//! # Lifecycle
//!
//! - **Live**: the instance is in the world's active set
//! - **Pending recycle check**: once per tick the world evaluates the pool's
//!   predicate over every live instance of the pool's kind
//! - **Free**: the predicate returned `true`; the instance left the active set
//!   and waits in the free list with its identity and last state intact
//!
//! Instances are never destroyed by recycling, so high-churn kinds such as
//! bullets and asteroids stop allocating once the pool has warmed up.

use std::fmt;

use crate::entity::{EntityId, EntityKind, GameEntity};

/// Factory invoked when the free list is empty
pub type Factory = Box<dyn FnMut() -> GameEntity>;

/// Predicate deciding whether a live instance goes back to the free list
pub type RecyclePredicate = Box<dyn Fn(&GameEntity) -> bool>;

/// Errors raised while configuring a pool
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The builder was finished without a factory
    #[error("Pool for {0:?} has no factory")]
    MissingFactory(EntityKind),

    /// The builder was finished without a recycle predicate
    #[error("Pool for {0:?} has no recycle predicate")]
    MissingRecyclePredicate(EntityKind),
}

/// Counters for monitoring pool churn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances built by the factory
    pub created: u64,
    /// Requests served from the free list
    pub reused: u64,
    /// Instances returned to the free list
    pub recycled: u64,
}

/// Recycling allocator for one entity kind
pub struct ObjectPool {
    kind: EntityKind,
    factory: Factory,
    should_recycle: RecyclePredicate,
    free: Vec<EntityId>,
    stats: PoolStats,
}

impl ObjectPool {
    /// Start configuring a pool for `kind`
    pub fn builder(kind: EntityKind) -> PoolBuilder {
        PoolBuilder::new(kind)
    }

    /// Kind of entity this pool recycles
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Evaluate the recycle predicate for a live instance
    pub fn should_recycle(&self, entity: &GameEntity) -> bool {
        (self.should_recycle)(entity)
    }

    /// Number of instances waiting for reuse
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Whether `id` is waiting in the free list
    pub fn contains(&self, id: EntityId) -> bool {
        self.free.contains(&id)
    }

    /// Churn counters
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Build a brand new instance with the factory
    ///
    /// An instance of the wrong kind is dropped, uncounted, and its kind returned.
    pub(crate) fn create(&mut self) -> Result<GameEntity, EntityKind> {
        let entity = (self.factory)();
        if entity.kind != self.kind {
            return Err(entity.kind);
        }
        self.stats.created += 1;
        Ok(entity)
    }

    /// Pop the most recently recycled instance
    pub(crate) fn acquire(&mut self) -> Option<EntityId> {
        let id = self.free.pop()?;
        self.stats.reused += 1;
        Some(id)
    }

    /// Push an instance onto the free list
    pub(crate) fn release(&mut self, id: EntityId) {
        debug_assert!(!self.free.contains(&id), "instance {id:?} recycled twice");
        self.free.push(id);
        self.stats.recycled += 1;
    }
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("kind", &self.kind)
            .field("free", &self.free.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Builder pairing a factory with a recycle predicate
pub struct PoolBuilder {
    kind: EntityKind,
    factory: Option<Factory>,
    should_recycle: Option<RecyclePredicate>,
    capacity: usize,
}

impl PoolBuilder {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            factory: None,
            should_recycle: None,
            capacity: 0,
        }
    }

    /// Factory used when the free list is empty
    ///
    /// The produced entity must be of the pool's kind.
    pub fn factory(mut self, factory: impl FnMut() -> GameEntity + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Predicate deciding when a live instance is reclaimed
    pub fn recycle_when(mut self, predicate: impl Fn(&GameEntity) -> bool + 'static) -> Self {
        self.should_recycle = Some(Box::new(predicate));
        self
    }

    /// Reserve room in the free list
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Finish the pool
    pub fn build(self) -> Result<ObjectPool, PoolError> {
        let factory = self.factory.ok_or(PoolError::MissingFactory(self.kind))?;
        let should_recycle = self
            .should_recycle
            .ok_or(PoolError::MissingRecyclePredicate(self.kind))?;

        Ok(ObjectPool {
            kind: self.kind,
            factory,
            should_recycle,
            free: Vec::with_capacity(self.capacity),
            stats: PoolStats::default(),
        })
    }
}
