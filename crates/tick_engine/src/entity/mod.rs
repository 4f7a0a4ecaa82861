//! Game entities and the scripted behaviors that drive them
//!
//! The entity model is a flat collection of game objects: every entity carries
//! the same base fields and a closed [`EntityKind`] tag instead of a component
//! table.

pub mod game_entity;
pub mod behavior;

pub use game_entity::{EntityId, EntityKind, GameEntity};
pub use behavior::{Behavior, BehaviorState, Command};
