//! The scripted first stage
//!
//! A player ship sits at the bottom of the playfield while a recursive event
//! script sends a straight-falling asteroid and a scripted enemy every wave.
//! Both kinds of enemy come from one pool and go back to it once they fall
//! below the recycle line.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tick_engine::prelude::*;

use crate::config::{GameplayConfig, StageConfig};

/// Restart the wave
pub const WAVE_EVENT: u32 = 1;
/// Drop an asteroid from the top centre
pub const ASTEROID_EVENT: u32 = 2;
/// Drop an enemy that runs a command script
pub const BEHAVIOR_ENEMY_EVENT: u32 = 3;

const ENEMY_POOL_CAPACITY: usize = 4;

const ENEMY_SCRIPT: [Command; 7] = [
    Command::Down,
    Command::Down,
    Command::Left,
    Command::Left,
    Command::Right,
    Command::Right,
    Command::Up,
];

/// Stage state owned by the frame loop
#[derive(Debug)]
pub struct Stage {
    world: World,
    controller: PlayerController,
    input: InputState,
    player: EntityId,
    script: CallbackId,
}

impl Stage {
    /// Build the world, the player and the enemy pool, and start the wave script
    pub fn new(config: &StageConfig) -> Result<Self, WorldError> {
        let mut world = World::with_config(config.world.clone());
        let gameplay = config.gameplay.clone();

        let size = GameEntity::DEFAULT_SIZE;
        let player = world.spawn(
            GameEntity::new(EntityKind::Player, "player.png")
                .with_position(world.config().centered_x(size), world.config().height - size),
        );

        let recycle_below = gameplay.recycle_below;
        let (width, height) = (world.config().width, world.config().height);
        world.register_pool(
            ObjectPool::builder(EntityKind::Enemy)
                .factory(|| {
                    log::info!("Enemy created");
                    GameEntity::new(EntityKind::Enemy, "asteroid.png")
                })
                .recycle_when(move |enemy| {
                    enemy.position.y > recycle_below || enemy.is_outside(width, height)
                })
                .capacity(ENEMY_POOL_CAPACITY)
                .build()?,
        )?;

        let mut controller = PlayerController::new();
        controller.control(player);
        let speed = gameplay.player_speed;
        for (key, dx, dy) in [
            (KeyCode::Up, 0.0, -speed),
            (KeyCode::Down, 0.0, speed),
            (KeyCode::Left, -speed, 0.0),
            (KeyCode::Right, speed, 0.0),
        ] {
            controller.add_action_to_key(key, Trigger::Held, Action::Translate { dx, dy });
        }

        let script = StageScript::new(gameplay.clone(), config.run.seed);
        let script = world.register_callback(script);
        schedule_wave(&mut world, script, &gameplay)?;

        log::info!("Stage ready: player {player:?}, {} events queued", world.pending_events());
        Ok(Self {
            world,
            controller,
            input: InputState::new(),
            player,
            script,
        })
    }

    /// Run one frame: world first, then player input
    pub fn update(&mut self) {
        self.world.update();
        self.controller.update(&mut self.world, &self.input);
        self.input.end_frame();
    }

    /// Input fed by the host before each frame
    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    /// Simulation state
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Player entity
    pub fn player(&self) -> EntityId {
        self.player
    }

    /// Callback driving the wave script
    pub fn script(&self) -> CallbackId {
        self.script
    }

    /// Whether the player is still inside the playfield
    pub fn player_in_bounds(&self) -> bool {
        self.world
            .entity(self.player)
            .is_some_and(|player| self.world.config().contains(&player.position))
    }

    /// Counters of the enemy pool
    pub fn enemy_stats(&self) -> PoolStats {
        self.world.pool(EntityKind::Enemy).map(ObjectPool::stats).unwrap_or_default()
    }
}

fn schedule_wave(
    world: &mut World,
    script: CallbackId,
    gameplay: &GameplayConfig,
) -> Result<(), WorldError> {
    for (delay, type_tag, payload) in [
        (gameplay.wave_period, WAVE_EVENT, "wave"),
        (gameplay.asteroid_delay, ASTEROID_EVENT, "asteroid"),
        (gameplay.behavior_enemy_delay, BEHAVIOR_ENEMY_EVENT, "behavior enemy"),
    ] {
        world.add_event_after_current_time(script, delay, type_tag, payload)?;
    }
    Ok(())
}

struct StageScript {
    gameplay: GameplayConfig,
    rng: StdRng,
}

impl StageScript {
    fn new(gameplay: GameplayConfig, seed: u64) -> Self {
        Self {
            gameplay,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn create_asteroid(&self, world: &mut World) -> Result<EntityId, WorldError> {
        let id = world.create_entity(EntityKind::Enemy)?;
        let x = world.config().centered_x(GameEntity::DEFAULT_SIZE);
        if let Some(asteroid) = world.entity_mut(id) {
            asteroid.clear_behavior();
            asteroid.set_life(self.gameplay.asteroid_life);
            asteroid.position = Vec2::new(x, 0.0);
            asteroid.velocity = Vec2::new(0.0, self.gameplay.asteroid_speed);
        }
        world.add(id)?;
        Ok(id)
    }

    fn create_behavior_enemy(&mut self, world: &mut World) -> Result<EntityId, WorldError> {
        let id = world.create_entity(EntityKind::Enemy)?;
        let field_width = world.config().width;
        if let Some(enemy) = world.entity_mut(id) {
            let width = enemy.width();
            let max_x = (field_width - width).max(width);
            enemy.set_life(self.gameplay.asteroid_life);
            enemy.position = Vec2::new(self.rng.gen_range(width..=max_x), 0.0);
            enemy.velocity = Vec2::new(0.0, self.gameplay.behavior_enemy_speed);
        }
        world.attach_behavior(id, ENEMY_SCRIPT.to_vec())?;
        world.start_behavior(id)?;
        world.add(id)?;
        Ok(id)
    }

    fn handle(&mut self, world: &mut World, event: &GameEvent) -> Result<(), WorldError> {
        match event.type_tag {
            WAVE_EVENT => schedule_wave(world, event.callback, &self.gameplay),
            ASTEROID_EVENT => {
                let id = self.create_asteroid(world)?;
                log::debug!("Asteroid {id:?} launched at tick {}", world.tick());
                Ok(())
            }
            BEHAVIOR_ENEMY_EVENT => {
                let id = self.create_behavior_enemy(world)?;
                log::debug!("Scripted enemy {id:?} launched at tick {}", world.tick());
                Ok(())
            }
            other => {
                log::warn!("Unknown stage event type {other} ({})", event.payload);
                Ok(())
            }
        }
    }
}

impl EventCallback for StageScript {
    fn on_event(&mut self, world: &mut World, event: &GameEvent) {
        if let Err(e) = self.handle(world, event) {
            log::error!("Stage event type {} failed: {e}", event.type_tag);
        }
    }
}
