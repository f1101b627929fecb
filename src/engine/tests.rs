use crate::constants::{CELL_SIZE, ORIGIN, SAVE_KEY};
use crate::engine::{GameConfig, GameEngine, WinBannerPolicy};
use crate::error::{MovementError, PersistenceError};
use crate::movement::{ManualLocation, NoLocation};
use crate::rng::luck;
use crate::save_store::{decode, KeyValueStore, MemoryKeyValueStore};
use crate::types::{
    CellCoord, Direction, InteractionEvent, LatLng, MovementMode, RenderCommand, RuntimeEvent,
};
use crate::world::{default_value, find_cell};

struct FailingStore;

impl KeyValueStore for FailingStore {
    fn read(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(None)
    }

    fn write(&mut self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("disk full".to_string()))
    }
}

fn make_engine(store: &MemoryKeyValueStore) -> GameEngine {
    GameEngine::start(
        GameConfig::default(),
        Box::new(store.clone()),
        Box::new(ManualLocation::new()),
    )
}

fn point(i: f64, j: f64) -> LatLng {
    LatLng::new(ORIGIN.lat + i * CELL_SIZE, ORIGIN.lng + j * CELL_SIZE)
}

fn won_events(events: &[RuntimeEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|event| match event {
            RuntimeEvent::Won { value } => Some(*value),
            _ => None,
        })
        .collect()
}

fn empty_cell_near(engine: &GameEngine) -> CellCoord {
    let origin = engine.player.position;
    for di in -3..=3 {
        for dj in -3..=3 {
            let coord = CellCoord::new(origin.i + di, origin.j + dj);
            if engine.cell_value(coord) == 0 {
                return coord;
            }
        }
    }
    panic!("expected an empty cell in range");
}

#[test]
fn fresh_start_draws_viewport_and_hud() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let render = engine.drain_render();
    let draws = render
        .iter()
        .filter(|command| matches!(command, RenderCommand::Draw { .. }))
        .count();
    let visible = engine.visible_cells().expect("viewport computed");
    assert_eq!(draws, visible.len());
    assert!(visible.contains(CellCoord::new(0, 0)));
    assert!(matches!(
        render.last(),
        Some(RenderCommand::Hud { text }) if text == "Position: (0, 0) | Held: (empty)"
    ));
    assert_eq!(engine.player().position, CellCoord::new(0, 0));
}

#[test]
fn pickup_from_lucky_cell() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let lucky = find_cell(|coord| luck(&coord.key()) < 0.15);
    assert_eq!(default_value(lucky), 1);
    engine.player.position = lucky;

    let event = engine.handle_interaction(lucky);
    assert_eq!(event, InteractionEvent::PickedUp(1));
    assert_eq!(engine.player().held, Some(1));
    assert_eq!(engine.cell_value(lucky), 0);
}

#[test]
fn drop_onto_matching_override_merges() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.world.set(target, 1);
    engine.player.held = Some(1);

    assert_eq!(engine.handle_interaction(target), InteractionEvent::Merged(2));
    assert_eq!(engine.cell_value(target), 2);
    assert_eq!(engine.player().held, None);
}

#[test]
fn full_table_through_engine() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);

    assert_eq!(engine.handle_interaction(target), InteractionEvent::NoOp);

    engine.world.set(target, 4);
    assert_eq!(engine.handle_interaction(target), InteractionEvent::PickedUp(4));
    assert_eq!(engine.handle_interaction(target), InteractionEvent::Dropped(4));
    assert_eq!(engine.player().held, None);

    engine.player.held = Some(2);
    assert_eq!(engine.handle_interaction(target), InteractionEvent::NoOp);
    assert_eq!(engine.player().held, Some(2));
    assert_eq!(engine.cell_value(target), 4);
}

#[test]
fn interaction_range_is_inclusive() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    engine.player.held = Some(8);
    let edge = find_cell(|coord| {
        coord.i == 3 && (-3..=3).contains(&coord.j) && default_value(coord) == 0
    });
    assert_eq!(engine.handle_interaction(edge), InteractionEvent::Dropped(8));

    engine.player.held = Some(8);
    let far = CellCoord::new(4, 0);
    let before = engine.cell_value(far);
    engine.drain_render();
    assert_eq!(engine.handle_interaction(far), InteractionEvent::TooFar);
    assert_eq!(engine.cell_value(far), before);
    assert_eq!(engine.player().held, Some(8));
    assert!(engine.drain_render().is_empty());
}

#[test]
fn successful_action_refreshes_only_the_affected_cell() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.player.held = Some(16);
    engine.drain_render();

    engine.handle_interaction(target);
    let refreshed: Vec<CellCoord> = engine
        .drain_render()
        .into_iter()
        .filter_map(|command| match command {
            RenderCommand::Refresh { cell } => Some(cell.coord),
            RenderCommand::Draw { .. } | RenderCommand::Remove { .. } => {
                panic!("unexpected viewport change")
            }
            _ => None,
        })
        .collect();
    assert_eq!(refreshed, vec![target]);
}

#[test]
fn merge_reaching_win_value_emits_one_won_event() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.world.set(target, 16);
    engine.player.held = Some(16);
    engine.drain_events();

    assert_eq!(engine.handle_interaction(target), InteractionEvent::Merged(32));
    assert_eq!(won_events(&engine.drain_events()), vec![32]);
    assert_eq!(engine.hud_text(), "You crafted 32! You win!");
}

#[test]
fn below_win_value_never_emits_won() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.world.set(target, 8);
    engine.player.held = Some(8);
    engine.drain_events();

    assert_eq!(engine.handle_interaction(target), InteractionEvent::Merged(16));
    assert_eq!(engine.handle_interaction(target), InteractionEvent::PickedUp(16));
    assert_eq!(engine.handle_interaction(target), InteractionEvent::Dropped(16));
    assert!(won_events(&engine.drain_events()).is_empty());
}

#[test]
fn dropping_a_winning_token_emits_won() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.player.held = Some(64);
    engine.drain_events();

    assert_eq!(engine.handle_interaction(target), InteractionEvent::Dropped(64));
    assert_eq!(won_events(&engine.drain_events()), vec![64]);
}

#[test]
fn picking_up_a_winning_token_does_not_emit_won() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.world.set(target, 32);
    engine.drain_events();

    assert_eq!(engine.handle_interaction(target), InteractionEvent::PickedUp(32));
    assert!(won_events(&engine.drain_events()).is_empty());
}

#[test]
fn sticky_banner_keeps_interaction_enabled() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.player.held = Some(32);
    engine.handle_interaction(target);
    assert_eq!(engine.hud_text(), "You crafted 32! You win!");

    assert_eq!(engine.handle_interaction(target), InteractionEvent::PickedUp(32));
    assert_eq!(engine.hud_text(), "You crafted 32! You win!");
    assert!(engine.press_direction(Direction::North));
    assert_eq!(engine.hud_text(), "You crafted 32! You win!");
}

#[test]
fn transient_banner_reverts_to_status() {
    let store = MemoryKeyValueStore::new();
    let config = GameConfig {
        win_banner: WinBannerPolicy::Transient,
        ..GameConfig::default()
    };
    let mut engine = GameEngine::start(
        config,
        Box::new(store.clone()),
        Box::new(ManualLocation::new()),
    );
    let target = empty_cell_near(&engine);
    engine.player.held = Some(32);
    engine.handle_interaction(target);
    assert_eq!(engine.hud_text(), "You crafted 32! You win!");

    engine.press_direction(Direction::East);
    assert_eq!(engine.hud_text(), "Position: (0, 1) | Held: (empty)");
}

#[test]
fn every_mutation_is_persisted() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.player.held = Some(4);
    engine.handle_interaction(target);

    let saved = decode(&store.get(SAVE_KEY).expect("saved")).expect("valid save");
    assert_eq!(saved.held, None);
    assert!(saved.overrides.contains(&(target, 4)));

    engine.press_direction(Direction::South);
    let saved = decode(&store.get(SAVE_KEY).expect("saved")).expect("valid save");
    assert_eq!(saved.player, CellCoord::new(-1, 0));
}

#[test]
fn restart_resumes_from_saved_state() {
    let store = MemoryKeyValueStore::new();
    let target;
    {
        let mut engine = make_engine(&store);
        target = empty_cell_near(&engine);
        engine.player.held = Some(2);
        engine.handle_interaction(target);
        engine.press_direction(Direction::West);
        engine.shutdown();
    }

    let engine = make_engine(&store);
    assert_eq!(engine.player().position, CellCoord::new(0, -1));
    assert_eq!(engine.player().held, None);
    assert_eq!(engine.cell_value(target), 2);
}

#[test]
fn merging_largest_tokens_keeps_both_and_survives_restart() {
    let store = MemoryKeyValueStore::new();
    let top = 1u32 << 31;
    let target = empty_cell_near(&make_engine(&store));
    {
        let mut engine = make_engine(&store);
        engine.world.set(target, top);
        engine.player.held = Some(top);
        engine.drain_events();

        assert_eq!(engine.handle_interaction(target), InteractionEvent::NoOp);
        assert_eq!(engine.cell_value(target), top);
        assert_eq!(engine.player().held, Some(top));
        engine.press_direction(Direction::North);
        engine.press_direction(Direction::South);
    }

    let engine = make_engine(&store);
    assert_eq!(engine.cell_value(target), top);
    assert_eq!(engine.player().held, Some(top));
}

#[test]
fn malformed_save_starts_fresh() {
    let store = MemoryKeyValueStore::new();
    store.insert(SAVE_KEY, "definitely not json");
    let engine = make_engine(&store);
    assert_eq!(engine.player().position, CellCoord::new(0, 0));
    assert_eq!(engine.player().held, None);
    assert_eq!(engine.world().override_count(), 0);
}

#[test]
fn write_failure_keeps_in_memory_state() {
    let mut engine = GameEngine::start(
        GameConfig::default(),
        Box::new(FailingStore),
        Box::new(ManualLocation::new()),
    );
    let target = empty_cell_near(&engine);
    engine.player.held = Some(8);
    engine.drain_events();

    assert_eq!(engine.handle_interaction(target), InteractionEvent::Dropped(8));
    assert_eq!(engine.cell_value(target), 8);
    assert!(engine
        .drain_events()
        .iter()
        .any(|event| matches!(event, RuntimeEvent::PersistenceWriteFailed { .. })));
}

#[test]
fn button_presses_after_switch_to_geolocation_are_ignored() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    assert!(engine.press_direction(Direction::North));
    engine
        .set_movement_mode(MovementMode::Geolocation)
        .expect("manual location available");

    let before = engine.player().position;
    for dir in [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ] {
        assert!(!engine.press_direction(dir));
    }
    assert_eq!(engine.player().position, before);
}

#[test]
fn location_samples_move_player_in_geolocation_mode() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    assert!(!engine.location_sample(point(5.5, 5.5)));

    engine
        .set_movement_mode(MovementMode::Geolocation)
        .expect("manual location available");
    assert!(engine.location_sample(point(5.5, -2.5)));
    assert_eq!(engine.player().position, CellCoord::new(5, -3));
    assert!(!engine.location_sample(point(5.9, -2.1)));

    engine
        .set_movement_mode(MovementMode::Button)
        .expect("buttons always available");
    assert!(!engine.location_sample(point(9.5, 9.5)));
    assert_eq!(engine.player().position, CellCoord::new(5, -3));
}

#[test]
fn unavailable_location_keeps_button_mode() {
    let store = MemoryKeyValueStore::new();
    let mut engine = GameEngine::start(
        GameConfig::default(),
        Box::new(store.clone()),
        Box::new(NoLocation),
    );
    let result = engine.set_movement_mode(MovementMode::Geolocation);
    assert!(matches!(result, Err(MovementError::LocationUnavailable(_))));
    assert_eq!(engine.movement_mode(), MovementMode::Button);
    assert!(engine.press_direction(Direction::East));
    assert!(engine
        .drain_events()
        .iter()
        .any(|event| matches!(event, RuntimeEvent::LocationUnavailable { .. })));
}

#[test]
fn saved_geolocation_mode_is_restored() {
    let store = MemoryKeyValueStore::new();
    {
        let mut engine = make_engine(&store);
        engine
            .set_movement_mode(MovementMode::Geolocation)
            .expect("manual location available");
    }
    let engine = make_engine(&store);
    assert_eq!(engine.movement_mode(), MovementMode::Geolocation);

    let fallback = GameEngine::start(
        GameConfig::default(),
        Box::new(store.clone()),
        Box::new(NoLocation),
    );
    assert_eq!(fallback.movement_mode(), MovementMode::Button);
}

#[test]
fn saved_geolocation_fallback_rewrites_mode() {
    let store = MemoryKeyValueStore::new();
    {
        let mut engine = make_engine(&store);
        engine
            .set_movement_mode(MovementMode::Geolocation)
            .expect("manual location available");
    }

    let engine = GameEngine::start(
        GameConfig::default(),
        Box::new(store.clone()),
        Box::new(NoLocation),
    );
    assert_eq!(engine.movement_mode(), MovementMode::Button);
    let saved = decode(&store.get(SAVE_KEY).expect("save written")).expect("valid save");
    assert_eq!(saved.movement_mode, MovementMode::Button);
}

#[test]
fn moving_recenters_and_shifts_viewport() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    engine.map_moved(point(3.7, -2.7), point(-2.7, 3.7));
    let before = engine.visible_cells().expect("visible");
    engine.drain_render();

    engine.press_direction(Direction::North);
    let render = engine.drain_render();
    assert!(matches!(render.first(), Some(RenderCommand::Recenter { .. })));
    let added = render
        .iter()
        .filter(|command| matches!(command, RenderCommand::Draw { .. }))
        .count();
    let removed = render
        .iter()
        .filter(|command| matches!(command, RenderCommand::Remove { .. }))
        .count();
    let after = engine.visible_cells().expect("visible");
    assert_eq!(before.len(), after.len());
    assert_eq!(added, removed);
    assert!(added > 0);
    assert_eq!(after.min.i, before.min.i + 1);
}

#[test]
fn map_pan_does_not_persist_or_move_player() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    engine.map_moved(point(50.5, 40.5), point(30.5, 60.5));
    assert_eq!(store.get(SAVE_KEY), None);
    assert_eq!(engine.player().position, CellCoord::new(0, 0));
    let visible = engine.visible_cells().expect("visible");
    assert!(visible.contains(CellCoord::new(40, 50)));
    assert!(!visible.contains(CellCoord::new(0, 0)));
}

#[test]
fn drawn_cells_carry_resolved_values() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.world.set(target, 128);
    engine.drain_render();
    engine.map_moved(point(2.5, -2.5), point(-2.5, 2.5));
    engine.map_moved(point(40.5, 40.5), point(30.5, 50.5));
    engine.map_moved(point(2.5, -2.5), point(-2.5, 2.5));

    let drawn = engine
        .drain_render()
        .into_iter()
        .rev()
        .find_map(|command| match command {
            RenderCommand::Draw { cell } if cell.coord == target => Some(cell.value),
            _ => None,
        });
    assert_eq!(drawn, Some(128));
}

#[test]
fn reset_returns_to_clean_slate() {
    let store = MemoryKeyValueStore::new();
    let mut engine = make_engine(&store);
    let target = empty_cell_near(&engine);
    engine.player.held = Some(32);
    engine.handle_interaction(target);
    engine.press_direction(Direction::North);
    engine.drain_events();

    engine.reset();
    assert_eq!(engine.world().override_count(), 0);
    assert_eq!(engine.cell_value(target), default_value(target));
    assert_eq!(engine.player().position, CellCoord::new(0, 0));
    assert_eq!(engine.player().held, None);
    assert_eq!(engine.won_value(), None);
    assert_eq!(engine.hud_text(), "Position: (0, 0) | Held: (empty)");
    assert!(engine.drain_events().contains(&RuntimeEvent::GameReset));

    let saved = decode(&store.get(SAVE_KEY).expect("saved")).expect("valid save");
    assert!(saved.overrides.is_empty());
}
