//! # Tick Engine
//!
//! A small frame-stepped game runtime. The host owns the frame loop and calls
//! [`World::update`] once per rendered frame; everything else is driven by the
//! world's logical tick counter.
//!
//! ## Features
//!
//! - **World**: flat collection of game entities advanced one tick at a time
//! - **Event Scheduling**: callbacks fired at a future tick with a type tag and payload
//! - **Object Pooling**: typed recycling of short-lived entities (bullets, asteroids)
//! - **Scripted Behaviors**: command sequences applied one step per tick
//! - **Player Control**: key-to-action bindings applied to a controlled entity
//!
//! ## Quick Start
//!
//! ```rust
//! use tick_engine::prelude::*;
//!
//! let mut world = World::new();
//!
//! world.register_pool(
//!     ObjectPool::builder(EntityKind::Enemy)
//!         .factory(|| GameEntity::new(EntityKind::Enemy, "asteroid.png"))
//!         .recycle_when(|enemy| enemy.position.y > 500.0)
//!         .build()?,
//! )?;
//!
//! let asteroid = world.create_entity(EntityKind::Enemy)?;
//! if let Some(entity) = world.entity_mut(asteroid) {
//!     entity.velocity.y = 2.0;
//! }
//! world.add(asteroid)?;
//!
//! world.update();
//! assert_eq!(world.tick(), 1);
//! # Ok::<(), WorldError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod entity;
pub mod pool;
pub mod events;
pub mod input;
pub mod world;

pub use world::{World, WorldError, FrameStats, Residency};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        World, WorldError, FrameStats, Residency,
        config::{Config, ConfigError, WorldConfig},
        entity::{Behavior, BehaviorState, Command, EntityId, EntityKind, GameEntity},
        events::{CallbackId, EventCallback, GameEvent},
        foundation::math::Vec2,
        input::{Action, InputState, KeyCode, PlayerController, Trigger},
        pool::{ObjectPool, PoolBuilder, PoolError, PoolStats},
    };
}
