//! World integration tests
//!
//! Exercise the tick pipeline end to end: event timing, pooling round trips,
//! behavior execution and the add/prune policies.

use super::*;
use crate::entity::BehaviorState;
use crate::foundation::math::Vec2;
use approx::assert_relative_eq;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Log = Rc<RefCell<Vec<(u32, String, u64)>>>;

/// Callback that records (type tag, payload, tick seen) for every fired event
fn recorder() -> (Log, impl FnMut(&mut World, &GameEvent)) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let callback = move |world: &mut World, event: &GameEvent| {
        sink.borrow_mut().push((event.type_tag, event.payload.clone(), world.tick()));
    };
    (log, callback)
}

fn register_asteroid_pool(world: &mut World) -> Rc<Cell<u32>> {
    let created = Rc::new(Cell::new(0));
    let counter = Rc::clone(&created);
    let pool = ObjectPool::builder(EntityKind::Enemy)
        .factory(move || {
            counter.set(counter.get() + 1);
            GameEntity::new(EntityKind::Enemy, "asteroid.png")
        })
        .recycle_when(|enemy| enemy.position.y > 500.0)
        .build()
        .unwrap();
    world.register_pool(pool).unwrap();
    created
}

fn run(world: &mut World, ticks: u64) {
    for _ in 0..ticks {
        world.update();
    }
}

// ----------------------------------------------------------------------
// Clock
// ----------------------------------------------------------------------

#[test]
fn test_tick_advances_once_per_update() {
    for n in [0, 1, 2, 37] {
        let mut world = World::new();
        run(&mut world, n);
        assert_eq!(world.tick(), n);
        assert_eq!(world.stats().tick, n);
    }
}

// ----------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------

#[test]
fn test_scheduled_event_fires_on_the_200th_update() {
    let mut world = World::new();
    let (log, callback) = recorder();
    let id = world.register_callback(callback);

    let fire_tick = world.add_event_after_current_time(id, 200, 2, "Enemy1").unwrap();
    assert_eq!(fire_tick, 200);

    run(&mut world, 199);
    assert!(log.borrow().is_empty());

    world.update();
    assert_eq!(world.tick(), 200);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0].0, 2);
    assert_eq!(log.borrow()[0].1, "Enemy1");

    run(&mut world, 300);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(world.pending_events(), 0);
}

#[test]
fn test_event_scheduled_mid_run_uses_current_tick() {
    let mut world = World::new();
    let (log, callback) = recorder();
    let id = world.register_callback(callback);

    run(&mut world, 3);
    assert_eq!(world.add_event_after_current_time(id, 4, 9, "later").unwrap(), 7);

    run(&mut world, 3);
    assert!(log.borrow().is_empty());

    world.update();
    assert_eq!(world.tick(), 7);
    // Callback runs before the counter is incremented
    assert_eq!(log.borrow().as_slice(), &[(9_u32, "later".to_string(), 6_u64)]);
}

#[test]
fn test_callback_sees_the_tick_being_produced_as_now() {
    let mut world = World::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let id = world.register_callback(move |world: &mut World, event: &GameEvent| {
        sink.borrow_mut().push((world.tick(), world.now(), event.fire_tick));
    });

    run(&mut world, 3);
    assert_eq!(world.now(), 3);
    world.add_event_after_current_time(id, 4, 1, "later").unwrap();
    run(&mut world, 4);

    assert_eq!(seen.borrow().as_slice(), &[(6, 7, 7)]);
    assert_eq!(world.now(), world.tick());
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "re-entrantly")]
fn test_nested_update_from_callback_panics() {
    let mut world = World::new();
    let id = world.register_callback(|world: &mut World, _: &GameEvent| world.update());
    world.add_event_after_current_time(id, 0, 1, "nested").unwrap();
    world.update();
}

#[test]
#[cfg(not(debug_assertions))]
fn test_nested_update_from_callback_is_ignored() {
    let mut world = World::new();
    let (log, callback) = recorder();
    let recorder_id = world.register_callback(callback);
    let id = world.register_callback(|world: &mut World, _: &GameEvent| world.update());
    world.add_event_after_current_time(id, 0, 1, "nested").unwrap();
    world.add_event_after_current_time(recorder_id, 1, 2, "due").unwrap();
    world.add_event_after_current_time(recorder_id, 2, 3, "later").unwrap();

    world.update();
    assert_eq!(world.tick(), 1);
    assert_eq!(log.borrow().len(), 1);

    world.update();
    assert_eq!(world.tick(), 2);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn test_zero_delay_fires_on_next_update_not_synchronously() {
    let mut world = World::new();
    let (log, callback) = recorder();
    let id = world.register_callback(callback);

    world.add_event_after_current_time(id, 0, 1, "now").unwrap();
    assert!(log.borrow().is_empty());

    world.update();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(world.stats().events_fired, 1);
}

#[test]
fn test_same_fire_tick_events_fire_fifo() {
    let mut world = World::new();
    let (log, callback) = recorder();
    let id = world.register_callback(callback);

    world.add_event_after_current_time(id, 5, 1, "a").unwrap();
    world.update();
    // Same absolute fire tick (5), scheduled later
    world.add_event_after_current_time(id, 4, 2, "b").unwrap();
    world.add_event_after_current_time(id, 4, 3, "c").unwrap();
    // Earlier fire tick, scheduled last
    world.add_event_after_current_time(id, 2, 4, "d").unwrap();

    run(&mut world, 10);
    let order: Vec<u32> = log.borrow().iter().map(|(tag, _, _)| *tag).collect();
    assert_eq!(order, vec![4, 1, 2, 3]);
}

#[test]
fn test_callback_rescheduling_itself_fires_once_per_update() {
    let mut world = World::new();
    let fired = Rc::new(Cell::new(0));
    let count = Rc::clone(&fired);

    let id = world.register_callback(move |world: &mut World, event: &GameEvent| {
        count.set(count.get() + 1);
        world
            .add_event_after_current_time(event.callback, 0, event.type_tag, "again")
            .unwrap();
    });
    world.add_event_after_current_time(id, 0, 1, "start").unwrap();

    world.update();
    assert_eq!(fired.get(), 1);
    assert_eq!(world.pending_events(), 1);

    run(&mut world, 4);
    assert_eq!(fired.get(), 5);
}

#[test]
fn test_recursive_script_repeats_every_period() {
    let mut world = World::new();
    let (log, mut record) = recorder();

    let id = world.register_callback(move |world: &mut World, event: &GameEvent| {
        record(world, event);
        if event.type_tag == 1 {
            world.add_event_after_current_time(event.callback, 10, 1, "wave").unwrap();
        }
    });
    world.add_event_after_current_time(id, 10, 1, "wave").unwrap();

    run(&mut world, 35);
    let ticks: Vec<u64> = log.borrow().iter().map(|(_, _, tick)| *tick).collect();
    assert_eq!(ticks, vec![9, 19, 29]);
}

#[test]
fn test_event_for_unregistered_callback_is_dropped() {
    let mut world = World::new();
    let (log, callback) = recorder();
    let id = world.register_callback(callback);

    world.add_event_after_current_time(id, 2, 1, "stale").unwrap();
    assert!(world.unregister_callback(id));

    run(&mut world, 3);
    assert!(log.borrow().is_empty());
    assert_eq!(world.pending_events(), 0);
}

#[test]
fn test_scheduling_for_unknown_callback_is_rejected() {
    let mut world = World::new();
    let (_, callback) = recorder();
    let id = world.register_callback(callback);
    world.unregister_callback(id);

    assert_eq!(
        world.add_event_after_current_time(id, 1, 1, "x"),
        Err(WorldError::UnknownCallback(id))
    );
}

// ----------------------------------------------------------------------
// Pools
// ----------------------------------------------------------------------

#[test]
fn test_asteroid_recycled_and_reused_without_factory() {
    let mut world = World::new();
    let created = register_asteroid_pool(&mut world);

    let asteroid = world.create_entity(EntityKind::Enemy).unwrap();
    assert_eq!(created.get(), 1);
    assert!(!world.is_active(asteroid));

    world.entity_mut(asteroid).unwrap().position.y = 600.0;
    world.add(asteroid).unwrap();
    world.update();

    assert!(!world.is_active(asteroid));
    assert!(!world.active_ids().contains(&asteroid));
    let pool = world.pool(EntityKind::Enemy).unwrap();
    assert!(pool.contains(asteroid));
    assert_eq!(world.residency(asteroid), Some(Residency::Pooled));
    assert_eq!(world.stats().recycled, 1);

    let reused = world.create_entity(EntityKind::Enemy).unwrap();
    assert_eq!(reused, asteroid);
    assert_eq!(created.get(), 1);
    assert!(!world.pool(EntityKind::Enemy).unwrap().contains(asteroid));
}

#[test]
fn test_pool_serves_free_list_before_factory() {
    let mut world = World::new();
    let created = register_asteroid_pool(&mut world);

    let mut first_wave = Vec::new();
    for _ in 0..3 {
        let id = world.create_entity(EntityKind::Enemy).unwrap();
        world.entity_mut(id).unwrap().position.y = 501.0;
        world.add(id).unwrap();
        first_wave.push(id);
    }
    world.update();
    assert_eq!(world.pool(EntityKind::Enemy).unwrap().free_count(), 3);
    assert_eq!(world.active_count(), 0);

    let mut second_wave: Vec<EntityId> = (0..3)
        .map(|_| world.create_entity(EntityKind::Enemy).unwrap())
        .collect();
    assert_eq!(created.get(), 3);

    second_wave.sort();
    first_wave.sort();
    assert_eq!(second_wave, first_wave);

    let fresh = world.create_entity(EntityKind::Enemy).unwrap();
    assert_eq!(created.get(), 4);
    assert!(!first_wave.contains(&fresh));

    let stats = world.pool(EntityKind::Enemy).unwrap().stats();
    assert_eq!(stats.created, 4);
    assert_eq!(stats.reused, 3);
    assert_eq!(stats.recycled, 3);
}

#[test]
fn test_recycled_instance_keeps_its_state() {
    let mut world = World::new();
    register_asteroid_pool(&mut world);

    let id = world.create_entity(EntityKind::Enemy).unwrap();
    {
        let asteroid = world.entity_mut(id).unwrap();
        asteroid.position.y = 499.0;
        asteroid.velocity.y = 2.0;
        asteroid.set_life(7);
    }
    world.add(id).unwrap();
    world.update();
    assert!(!world.is_active(id));

    let reused = world.create_entity(EntityKind::Enemy).unwrap();
    let asteroid = world.entity(reused).unwrap();
    assert_relative_eq!(asteroid.position.y, 501.0);
    assert_eq!(asteroid.life, 7);
}

#[test]
fn test_pooled_instance_is_locked_until_reacquired() {
    let mut world = World::new();
    register_asteroid_pool(&mut world);

    let id = world.create_entity(EntityKind::Enemy).unwrap();
    world.entity_mut(id).unwrap().position.y = 600.0;
    world.add(id).unwrap();
    world.update();

    assert!(world.entity(id).is_some());
    assert!(world.entity_mut(id).is_none());
    assert_eq!(world.add(id), Err(WorldError::EntityPooled(id)));
    assert_eq!(
        world.attach_behavior(id, vec![Command::Down]),
        Err(WorldError::EntityPooled(id))
    );
}

#[test]
fn test_recycle_only_checks_matching_kind() {
    let mut world = World::new();
    let created = register_asteroid_pool(&mut world);

    let bullet = world.spawn(
        GameEntity::new(EntityKind::Bullet, "bullet.png").with_position(0.0, 900.0),
    );
    world.update();

    assert!(world.is_active(bullet));
    assert_eq!(created.get(), 0);
}

#[test]
fn test_directly_spawned_enemy_joins_pool_on_recycle() {
    let mut world = World::new();
    let created = register_asteroid_pool(&mut world);

    let enemy = world.spawn(
        GameEntity::new(EntityKind::Enemy, "asteroid.png").with_position(0.0, 700.0),
    );
    world.update();

    assert_eq!(world.residency(enemy), Some(Residency::Pooled));
    assert_eq!(world.create_entity(EntityKind::Enemy).unwrap(), enemy);
    assert_eq!(created.get(), 0);
}

#[test]
fn test_pool_configuration_errors() {
    let mut world = World::new();
    assert_eq!(
        world.create_entity(EntityKind::Enemy),
        Err(WorldError::UnregisteredPool(EntityKind::Enemy))
    );

    register_asteroid_pool(&mut world);
    let duplicate = ObjectPool::builder(EntityKind::Enemy)
        .factory(|| GameEntity::new(EntityKind::Enemy, "asteroid.png"))
        .recycle_when(|_| false)
        .build()
        .unwrap();
    assert_eq!(
        world.register_pool(duplicate),
        Err(WorldError::DuplicatePool(EntityKind::Enemy))
    );

    let mismatched = ObjectPool::builder(EntityKind::Bullet)
        .factory(|| GameEntity::new(EntityKind::Enemy, "asteroid.png"))
        .recycle_when(|_| false)
        .build()
        .unwrap();
    world.register_pool(mismatched).unwrap();
    assert_eq!(
        world.create_entity(EntityKind::Bullet),
        Err(WorldError::PoolKindMismatch {
            expected: EntityKind::Bullet,
            found: EntityKind::Enemy,
        })
    );
    assert_eq!(world.pool(EntityKind::Bullet).unwrap().stats().created, 0);
}

#[test]
fn test_destroyed_pooled_instance_is_freed_not_recycled() {
    let mut world = World::new();
    let created = register_asteroid_pool(&mut world);

    let asteroid = world.create_entity(EntityKind::Enemy).unwrap();
    let entity = world.entity_mut(asteroid).unwrap();
    entity.position.y = 600.0;
    entity.destroy();
    world.add(asteroid).unwrap();
    world.update();

    assert!(!world.contains(asteroid));
    let pool = world.pool(EntityKind::Enemy).unwrap();
    assert_eq!(pool.free_count(), 0);
    assert_eq!(pool.stats().recycled, 0);
    assert_eq!(world.stats().pruned, 1);
    assert_eq!(world.stats().recycled, 0);

    let fresh = world.create_entity(EntityKind::Enemy).unwrap();
    assert_ne!(fresh, asteroid);
    assert_eq!(created.get(), 2);
}

#[test]
fn test_destroyed_instance_never_added_is_freed() {
    let mut world = World::new();
    register_asteroid_pool(&mut world);

    let kept = world.create_entity(EntityKind::Enemy).unwrap();
    let dropped = world.create_entity(EntityKind::Enemy).unwrap();
    world.entity_mut(dropped).unwrap().destroy();
    world.update();

    assert!(!world.contains(dropped));
    assert_eq!(world.residency(kept), Some(Residency::Detached));
    assert_eq!(world.stats().pruned, 1);
}

// ----------------------------------------------------------------------
// Behaviors
// ----------------------------------------------------------------------

#[test]
fn test_behavior_applies_each_command_once_then_stops() {
    let mut world = World::new();
    let commands = vec![
        Command::Down,
        Command::Down,
        Command::Left,
        Command::Left,
        Command::Right,
        Command::Right,
        Command::Up,
    ];
    let k = commands.len();

    let id = world.spawn(
        GameEntity::new(EntityKind::Enemy, "enemy.png").with_position(100.0, 100.0),
    );
    world.attach_behavior(id, commands).unwrap();
    world.start_behavior(id).unwrap();

    // Nothing happens synchronously
    assert_relative_eq!(world.entity(id).unwrap().position.y, 100.0);

    let mut moves = 0;
    let mut last = world.entity(id).unwrap().position;
    for _ in 0..k + 5 {
        world.update();
        let now = world.entity(id).unwrap().position;
        if now != last {
            moves += 1;
        }
        last = now;
    }

    assert_eq!(moves, k);
    let entity = world.entity(id).unwrap();
    assert_relative_eq!(entity.position.x, 100.0);
    assert_relative_eq!(entity.position.y, 101.0);
    assert_eq!(entity.behavior().unwrap().state(), BehaviorState::Finished);
    assert!(world.is_active(id));
}

#[test]
fn test_behavior_combines_with_velocity() {
    let mut world = World::with_config(WorldConfig {
        behavior_step: 3.0,
        ..WorldConfig::default()
    });
    let id = world.spawn(GameEntity::new(EntityKind::Enemy, "enemy.png").with_velocity(0.0, 1.0));
    world.attach_behavior(id, vec![Command::Right, Command::Down]).unwrap();
    world.start_behavior(id).unwrap();

    run(&mut world, 2);
    assert_eq!(world.stats().commands_applied, 1);
    run(&mut world, 2);
    assert_eq!(world.stats().commands_applied, 0);

    let entity = world.entity(id).unwrap();
    assert_relative_eq!(entity.position.x, 3.0);
    assert_relative_eq!(entity.position.y, 7.0);
}

#[test]
fn test_empty_behavior_is_a_no_op() {
    let mut world = World::new();
    let id = world.spawn(GameEntity::new(EntityKind::Basic, "dot.png"));
    world.attach_behavior(id, Vec::new()).unwrap();
    world.start_behavior(id).unwrap();

    run(&mut world, 3);
    assert_eq!(world.entity(id).unwrap().position, Vec2::zeros());
}

#[test]
fn test_behavior_errors() {
    let mut world = World::new();
    let id = world.spawn(GameEntity::new(EntityKind::Basic, "dot.png"));
    assert_eq!(world.start_behavior(id), Err(WorldError::NoBehavior(id)));

    world.entity_mut(id).unwrap().destroy();
    world.update();
    assert_eq!(
        world.attach_behavior(id, vec![Command::Up]),
        Err(WorldError::EntityNotFound(id))
    );
}

// ----------------------------------------------------------------------
// Add / prune policies
// ----------------------------------------------------------------------

#[test]
fn test_added_entity_moves_from_the_next_update() {
    let mut world = World::new();
    let id = world.insert(GameEntity::new(EntityKind::Basic, "dot.png").with_velocity(1.0, 0.0));
    assert_eq!(world.residency(id), Some(Residency::Detached));

    world.add(id).unwrap();
    assert_eq!(world.residency(id), Some(Residency::Pending));
    assert_eq!(world.add(id), Err(WorldError::AlreadyActive(id)));

    world.update();
    assert!(world.is_active(id));
    assert_relative_eq!(world.entity(id).unwrap().position.x, 1.0);
}

#[test]
fn test_entity_added_by_callback_waits_for_next_update() {
    let mut world = World::new();
    let spawned: Rc<Cell<Option<EntityId>>> = Rc::new(Cell::new(None));
    let slot = Rc::clone(&spawned);

    let id = world.register_callback(move |world: &mut World, _event: &GameEvent| {
        let id = world.spawn(
            GameEntity::new(EntityKind::Enemy, "enemy.png").with_velocity(0.0, 2.0),
        );
        slot.set(Some(id));
    });
    world.add_event_after_current_time(id, 0, 3, "spawn").unwrap();

    world.update();
    let enemy = spawned.get().unwrap();
    assert_eq!(world.residency(enemy), Some(Residency::Pending));
    assert_relative_eq!(world.entity(enemy).unwrap().position.y, 0.0);

    world.update();
    assert!(world.is_active(enemy));
    assert_relative_eq!(world.entity(enemy).unwrap().position.y, 2.0);
}

#[test]
fn test_destroyed_entity_is_pruned_without_further_updates() {
    let mut world = World::new();
    let id = world.spawn(
        GameEntity::new(EntityKind::Bullet, "bullet.png").with_velocity(0.0, -4.0),
    );
    world.update();
    assert_relative_eq!(world.entity(id).unwrap().position.y, -4.0);

    world.entity_mut(id).unwrap().destroy();
    world.update();

    assert!(!world.contains(id));
    assert_eq!(world.active_count(), 0);
    assert_eq!(world.stats().pruned, 1);
}

#[test]
fn test_entity_destroyed_by_callback_skips_motion() {
    let mut world = World::new();
    let doomed = world.spawn(
        GameEntity::new(EntityKind::Enemy, "enemy.png").with_velocity(0.0, 3.0),
    );
    let witness = world.spawn(
        GameEntity::new(EntityKind::Enemy, "enemy.png").with_velocity(0.0, 3.0),
    );
    world.attach_behavior(doomed, vec![Command::Down, Command::Down]).unwrap();
    world.update();
    world.start_behavior(doomed).unwrap();

    let id = world.register_callback(move |world: &mut World, _: &GameEvent| {
        world.entity_mut(doomed).unwrap().destroy();
    });
    world.add_event_after_current_time(id, 0, 1, "destroy").unwrap();
    world.update();

    let stats = world.stats();
    assert_eq!(stats.commands_applied, 0);
    assert_eq!(stats.pruned, 1);
    assert!(!world.contains(doomed));
    assert_relative_eq!(world.entity(witness).unwrap().position.y, 6.0);
}

#[test]
fn test_identical_inputs_replay_identically() {
    fn simulate() -> Vec<(f64, f64)> {
        let mut world = World::new();
        register_asteroid_pool(&mut world);

        let id = world.register_callback(|world: &mut World, event: &GameEvent| {
            let enemy = world.create_entity(EntityKind::Enemy).unwrap();
            let entity = world.entity_mut(enemy).unwrap();
            entity.position = Vec2::new(f64::from(event.type_tag) * 10.0, 450.0);
            entity.velocity.y = 5.0;
            entity.set_behavior(vec![Command::Left, Command::Wait, Command::Right]);
            entity.start_behavior();
            world.add(enemy).unwrap();
            world
                .add_event_after_current_time(event.callback, 3, event.type_tag + 1, "next")
                .unwrap();
        });
        world.add_event_after_current_time(id, 1, 1, "first").unwrap();

        let mut trace = Vec::new();
        for _ in 0..60 {
            world.update();
            trace.extend(world.active().map(|(_, entity)| (entity.position.x, entity.position.y)));
        }
        trace
    }

    assert_eq!(simulate(), simulate());
}
