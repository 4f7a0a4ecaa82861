//! Input state and player control
//!
//! The windowing layer feeds key transitions into an [`InputState`]; a
//! [`PlayerController`] turns held or freshly pressed keys into small
//! [`Action`] values applied to its entity once per frame.

use std::collections::{BTreeMap, HashSet};

use crate::entity::{Command, EntityId};
use crate::foundation::math::vec2;
use crate::world::World;

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    /// A key
    A,
    /// D key
    D,
    /// S key
    S,
    /// W key
    W,
    /// Space bar
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

/// Keyboard state for the current frame
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    pressed: HashSet<KeyCode>,
}

impl InputState {
    /// Create an empty input state
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle key input
    pub fn handle_key_input(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            if self.held.insert(key) {
                self.pressed.insert(key);
            }
        } else {
            self.held.remove(&key);
        }
    }

    /// Whether the key is currently down
    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// Whether the key went down during this frame
    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// Forget this frame's key-down transitions; call after the frame is processed
    pub fn end_frame(&mut self) {
        self.pressed.clear();
    }
}

/// When a binding fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every frame while the key is down
    Held,
    /// Once, on the frame the key goes down
    Pressed,
}

/// Effect applied to the controlled entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Move by a fixed offset
    Translate {
        /// Horizontal offset
        dx: f64,
        /// Vertical offset
        dy: f64,
    },
    /// Replace the velocity
    SetVelocity {
        /// Horizontal velocity
        x: f64,
        /// Vertical velocity
        y: f64,
    },
    /// Apply one behavior command using the world's step size
    Step(Command),
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    trigger: Trigger,
    action: Action,
}

/// Maps keys to actions on a single controlled entity
#[derive(Debug, Clone, Default)]
pub struct PlayerController {
    entity: Option<EntityId>,
    bindings: BTreeMap<KeyCode, Vec<Binding>>,
}

impl PlayerController {
    /// Create a controller with no entity and no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Take control of an entity
    pub fn control(&mut self, entity: EntityId) {
        self.entity = Some(entity);
    }

    /// Controlled entity
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Bind an action to a key; several actions may share a key
    pub fn add_action_to_key(&mut self, key: KeyCode, trigger: Trigger, action: Action) {
        self.bindings.entry(key).or_default().push(Binding { trigger, action });
    }

    /// Remove every action bound to a key
    pub fn clear_key(&mut self, key: KeyCode) {
        self.bindings.remove(&key);
    }

    /// Apply the actions of the current frame's keys
    ///
    /// Keys are visited in a fixed order, so the result does not depend on
    /// the order in which they were pressed. Returns the number of actions
    /// applied; zero when the controlled entity is gone.
    pub fn update(&self, world: &mut World, input: &InputState) -> usize {
        let Some(id) = self.entity else {
            return 0;
        };
        let step = world.config().behavior_step;
        let Some(entity) = world.entity_mut(id) else {
            log::trace!("Controlled entity {id:?} is no longer available");
            return 0;
        };

        let mut applied = 0;
        for (key, bindings) in &self.bindings {
            for binding in bindings {
                let fires = match binding.trigger {
                    Trigger::Held => input.is_held(*key),
                    Trigger::Pressed => input.just_pressed(*key),
                };
                if !fires {
                    continue;
                }

                match binding.action {
                    Action::Translate { dx, dy } => entity.position += vec2(dx, dy),
                    Action::SetVelocity { x, y } => entity.velocity = vec2(x, y),
                    Action::Step(command) => entity.position += command.displacement(step),
                }
                applied += 1;
            }
        }
        applied
    }
}
