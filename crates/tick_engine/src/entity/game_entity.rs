//! Game entity implementation

use crate::entity::behavior::{Behavior, Command};
use crate::foundation::math::{vec2, Vec2};

slotmap::new_key_type! {
    /// Opaque entity handle
    ///
    /// A handle stays valid for as long as the entity is stored by the world,
    /// including while a pool holds it for reuse.
    pub struct EntityId;
}

/// Closed set of entity kinds
///
/// Object pools are registered per kind, and the recycle pass finds a pool's
/// live instances by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Plain entity with no special role
    Basic,
    /// Player-controlled ship
    Player,
    /// Hostile entity, including asteroids
    Enemy,
    /// Short-lived projectile
    Bullet,
    /// Game-defined kind
    Custom(u16),
}

/// Mutable positioned game object
///
/// Fields are public so that input and scene code can adjust them between
/// frames. The world only reads `destroyed`, `velocity` and the behavior.
#[derive(Debug, Clone)]
pub struct GameEntity {
    /// Entity kind tag
    pub kind: EntityKind,

    /// Top-left corner in world units
    pub position: Vec2,

    /// Width and height in world units
    pub size: Vec2,

    /// Displacement applied every tick
    pub velocity: Vec2,

    /// Remaining life points
    pub life: i32,

    /// Sprite reference for the rendering layer
    pub sprite: String,

    destroyed: bool,
    behavior: Option<Behavior>,
}

impl GameEntity {
    /// Default edge length of a freshly created entity
    pub const DEFAULT_SIZE: f64 = 32.0;

    /// Create an entity at the origin
    pub fn new(kind: EntityKind, sprite: impl Into<String>) -> Self {
        Self {
            kind,
            position: Vec2::zeros(),
            size: vec2(Self::DEFAULT_SIZE, Self::DEFAULT_SIZE),
            velocity: Vec2::zeros(),
            life: 1,
            sprite: sprite.into(),
            destroyed: false,
            behavior: None,
        }
    }

    /// Builder-style position setter
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = vec2(x, y);
        self
    }

    /// Builder-style size setter
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = vec2(width, height);
        self
    }

    /// Builder-style velocity setter
    pub fn with_velocity(mut self, x: f64, y: f64) -> Self {
        self.velocity = vec2(x, y);
        self
    }

    /// Width in world units
    pub fn width(&self) -> f64 {
        self.size.x
    }

    /// Height in world units
    pub fn height(&self) -> f64 {
        self.size.y
    }

    /// Set remaining life points
    pub fn set_life(&mut self, life: i32) {
        self.life = life;
    }

    /// Remove life points; the entity is destroyed once life reaches zero
    pub fn damage(&mut self, amount: i32) {
        self.life -= amount;
        if self.life <= 0 {
            self.destroy();
        }
    }

    /// Flag the entity for removal at the end of the current tick
    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    /// Whether the entity has been flagged for removal
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether the entity's bounding box lies entirely outside `width` x `height`
    pub fn is_outside(&self, width: f64, height: f64) -> bool {
        self.position.x + self.size.x < 0.0
            || self.position.y + self.size.y < 0.0
            || self.position.x > width
            || self.position.y > height
    }

    /// Attach a behavior, replacing any previous one
    pub fn set_behavior(&mut self, commands: Vec<Command>) {
        self.behavior = Some(Behavior::new(commands));
    }

    /// Start the attached behavior, if any
    ///
    /// Returns `false` when no behavior is attached.
    pub fn start_behavior(&mut self) -> bool {
        match self.behavior.as_mut() {
            Some(behavior) => {
                behavior.start();
                true
            }
            None => false,
        }
    }

    /// Drop the attached behavior
    pub fn clear_behavior(&mut self) {
        self.behavior = None;
    }

    /// Currently attached behavior
    pub fn behavior(&self) -> Option<&Behavior> {
        self.behavior.as_ref()
    }

    /// Advance the behavior by one tick and apply its displacement
    ///
    /// Returns whether a command was consumed.
    pub(crate) fn step_behavior(&mut self, step: f64) -> bool {
        let Some(command) = self.behavior.as_mut().and_then(Behavior::step) else {
            return false;
        };
        self.position += command.displacement(step);
        true
    }

    /// Apply velocity to position
    pub(crate) fn integrate(&mut self) {
        self.position += self.velocity;
    }
}
