//! Command-driven scripted motion
//!
//! A [`Behavior`] is a finite script of [`Command`]s. Once started it applies
//! exactly one command per tick, in order, and then stops for good. There is
//! no branching: the only state is the cursor into the command list.

use crate::foundation::math::{vec2, Vec2};

/// Atomic directive executed by a behavior in one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move one step towards the top of the screen
    Up,
    /// Move one step towards the bottom of the screen
    Down,
    /// Move one step left
    Left,
    /// Move one step right
    Right,
    /// Spend the tick without moving
    Wait,
}

impl Command {
    /// Displacement produced by this command for a given step size
    pub fn displacement(self, step: f64) -> Vec2 {
        match self {
            Command::Up => vec2(0.0, -step),
            Command::Down => vec2(0.0, step),
            Command::Left => vec2(-step, 0.0),
            Command::Right => vec2(step, 0.0),
            Command::Wait => Vec2::zeros(),
        }
    }
}

/// Execution state of a behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorState {
    /// Attached but not started
    Idle,
    /// Applying one command per tick
    Running,
    /// Every command has been applied
    Finished,
}

/// Ordered command script owned by a single entity
#[derive(Debug, Clone, PartialEq)]
pub struct Behavior {
    commands: Vec<Command>,
    cursor: usize,
    state: BehaviorState,
}

impl Behavior {
    /// Create an idle behavior from a command sequence
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            commands,
            cursor: 0,
            state: BehaviorState::Idle,
        }
    }

    /// Mark the behavior as running
    ///
    /// Nothing is applied here; the first command runs on the next tick.
    /// An empty script finishes immediately. Starting a running or finished
    /// behavior has no effect.
    pub fn start(&mut self) {
        if self.state != BehaviorState::Idle {
            return;
        }
        self.state = if self.commands.is_empty() {
            BehaviorState::Finished
        } else {
            BehaviorState::Running
        };
    }

    /// Advance by one tick, returning the command to apply (if any)
    pub fn step(&mut self) -> Option<Command> {
        if self.state != BehaviorState::Running {
            return None;
        }

        let command = self.commands.get(self.cursor).copied();
        self.cursor += 1;
        if self.cursor >= self.commands.len() {
            self.state = BehaviorState::Finished;
        }
        command
    }

    /// Current execution state
    pub fn state(&self) -> BehaviorState {
        self.state
    }

    /// Whether the behavior applies a command on the next tick
    pub fn is_running(&self) -> bool {
        self.state == BehaviorState::Running
    }

    /// Whether every command has been applied
    pub fn is_finished(&self) -> bool {
        self.state == BehaviorState::Finished
    }

    /// Commands not yet applied
    pub fn remaining(&self) -> &[Command] {
        &self.commands[self.cursor.min(self.commands.len())..]
    }

    /// Full command script
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_behavior_does_nothing() {
        let mut behavior = Behavior::new(vec![Command::Down]);
        assert_eq!(behavior.step(), None);
        assert_eq!(behavior.state(), BehaviorState::Idle);
    }

    #[test]
    fn test_commands_applied_in_order_then_finished() {
        let mut behavior = Behavior::new(vec![Command::Down, Command::Left, Command::Up]);
        behavior.start();

        assert_eq!(behavior.step(), Some(Command::Down));
        assert_eq!(behavior.remaining(), &[Command::Left, Command::Up]);
        assert_eq!(behavior.step(), Some(Command::Left));
        assert_eq!(behavior.step(), Some(Command::Up));
        assert!(behavior.is_finished());
        assert_eq!(behavior.step(), None);
        assert!(behavior.remaining().is_empty());
    }

    #[test]
    fn test_empty_behavior_finishes_on_start() {
        let mut behavior = Behavior::new(Vec::new());
        behavior.start();
        assert!(behavior.is_finished());
        assert_eq!(behavior.step(), None);
    }

    #[test]
    fn test_restart_after_finish_is_ignored() {
        let mut behavior = Behavior::new(vec![Command::Right]);
        behavior.start();
        behavior.step();
        behavior.start();
        assert_eq!(behavior.step(), None);
    }

    #[test]
    fn test_displacement_directions() {
        assert_eq!(Command::Down.displacement(2.0), vec2(0.0, 2.0));
        assert_eq!(Command::Up.displacement(2.0), vec2(0.0, -2.0));
        assert_eq!(Command::Left.displacement(1.0), vec2(-1.0, 0.0));
        assert_eq!(Command::Right.displacement(1.0), vec2(1.0, 0.0));
        assert_eq!(Command::Wait.displacement(5.0), Vec2::zeros());
    }
}
