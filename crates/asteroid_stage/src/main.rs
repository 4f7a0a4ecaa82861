//! Headless runner for the asteroid stage
//!
//! Usage: `asteroid_stage [config.toml|config.ron]`

mod config;
mod stage;

use std::path::PathBuf;

use tick_engine::config::Config;
use tick_engine::foundation::logging;
use tick_engine::input::KeyCode;

use config::StageConfig;
use stage::Stage;

/// Frames each arrow key is held by the scripted pilot
const PILOT_SEGMENT: u64 = 120;
const PILOT_KEYS: [KeyCode; 4] = [KeyCode::Left, KeyCode::Up, KeyCode::Right, KeyCode::Down];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    log::info!("Starting asteroid stage");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = StageConfig::load_or_default(config_path.as_deref())?;

    let result = run(&config);
    match &result {
        Ok(()) => log::info!("Stage finished"),
        Err(e) => log::error!("Stage failed: {e}"),
    }
    result
}

fn run(config: &StageConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut stage = Stage::new(config)?;
    log::debug!("Wave script registered as {:?}", stage.script());
    let mut held: Option<KeyCode> = None;

    for frame in 0..config.run.frames {
        let key = pilot_key(frame);
        if held != Some(key) {
            if let Some(previous) = held {
                stage.input_mut().handle_key_input(previous, false);
            }
            stage.input_mut().handle_key_input(key, true);
            held = Some(key);
        }

        stage.update();

        if config.run.report_every > 0 && stage.world().tick() % config.run.report_every == 0 {
            let stats = stage.world().stats();
            log::info!(
                "Tick {}: {} active, {} events pending, {} recycled this frame",
                stats.tick,
                stats.active,
                stage.world().pending_events(),
                stats.recycled
            );
        }
    }

    let pool = stage.enemy_stats();
    log::info!(
        "Enemy pool: {} created, {} reused, {} recycled",
        pool.created,
        pool.reused,
        pool.recycled
    );
    if let Some(player) = stage.world().entity(stage.player()) {
        log::info!("Player finished at ({:.1}, {:.1})", player.position.x, player.position.y);
    }
    if !stage.player_in_bounds() {
        log::warn!("Player ended outside the playfield");
    }
    log::debug!("Final state: {:?}", stage.world());
    Ok(())
}

fn pilot_key(frame: u64) -> KeyCode {
    let segment = (frame / PILOT_SEGMENT) as usize % PILOT_KEYS.len();
    PILOT_KEYS[segment]
}
