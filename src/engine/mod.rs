use tracing::{debug, info, warn};

use crate::constants::{
    FALLBACK_VIEW_RADIUS, INTERACT_RADIUS, ORIGIN, SAVE_KEY, VIEW_MARGIN, WIN_VALUE,
};
use crate::error::MovementError;
use crate::movement::{LocationProvider, MovementController};
use crate::save_store::{load_snapshot, save_snapshot, KeyValueStore, SaveSnapshot};
use crate::types::{
    CellCoord, CellView, Direction, InteractionEvent, LatLng, MovementMode, PlayerState,
    RenderCommand, RuntimeEvent,
};
use crate::viewport::{CellRect, ViewportController, ViewportDiff};
use crate::world::{cell_bounds, cell_center, lat_lng_to_cell, WorldState};

mod hud;
mod interaction;

pub use self::hud::{status_line, win_banner, WinBannerPolicy};
pub use self::interaction::{resolve, within_range, Transition};

use self::hud::HudState;

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub interact_radius: i32,
    pub win_value: u32,
    pub view_margin: i32,
    pub fallback_view_radius: i32,
    pub win_banner: WinBannerPolicy,
    pub origin: LatLng,
    pub save_key: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            interact_radius: INTERACT_RADIUS,
            win_value: WIN_VALUE,
            view_margin: VIEW_MARGIN,
            fallback_view_radius: FALLBACK_VIEW_RADIUS,
            win_banner: WinBannerPolicy::default(),
            origin: ORIGIN,
            save_key: SAVE_KEY.to_string(),
        }
    }
}

/// Owns the whole game: world ledger, player, movement source, viewport and
/// the collaborators it writes to. All mutation happens through `&mut self`
/// from one event handler at a time.
pub struct GameEngine {
    config: GameConfig,
    world: WorldState,
    player: PlayerState,
    movement: MovementController,
    viewport: ViewportController,
    hud: HudState,
    hud_text: String,
    location: Box<dyn LocationProvider>,
    store: Box<dyn KeyValueStore>,
    events: Vec<RuntimeEvent>,
    render: Vec<RenderCommand>,
}

impl GameEngine {
    /// Restores the saved game (or starts fresh) and queues the first frame.
    pub fn start(
        config: GameConfig,
        store: Box<dyn KeyValueStore>,
        location: Box<dyn LocationProvider>,
    ) -> Self {
        let snapshot = load_snapshot(store.as_ref(), &config.save_key);
        let mut world = WorldState::new();
        let mut player = PlayerState {
            position: start_cell(&config),
            held: None,
        };
        let mut mode = MovementMode::Button;
        let mut won_value = None;

        match snapshot {
            Some(snapshot) => {
                world.restore(snapshot.overrides);
                player.position = snapshot.player;
                player.held = snapshot.held;
                mode = snapshot.movement_mode;
                won_value = snapshot.won_value;
                info!(
                    i = player.position.i,
                    j = player.position.j,
                    overrides = world.override_count(),
                    "restored saved game"
                );
            }
            None => info!("starting new game"),
        }

        let viewport = ViewportController::new(
            config.origin,
            config.view_margin,
            config.fallback_view_radius,
        );
        let hud = HudState::new(config.win_banner, won_value);
        let mut engine = Self {
            config,
            world,
            player,
            movement: MovementController::buttons(),
            viewport,
            hud,
            hud_text: String::new(),
            location,
            store,
            events: Vec::new(),
            render: Vec::new(),
        };

        if mode == MovementMode::Geolocation {
            if let Err(error) = engine.switch_source(mode) {
                warn!(%error, "saved geolocation mode unavailable, using buttons");
                engine.persist();
            }
        }
        engine.redraw_all();
        engine
    }

    /// Stops the active movement source. No position events are accepted
    /// afterwards until a mode is started again.
    pub fn shutdown(&mut self) {
        self.movement.stop(self.location.as_mut());
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn player(&self) -> PlayerState {
        self.player
    }

    pub fn movement_mode(&self) -> MovementMode {
        self.movement.mode()
    }

    pub fn cell_value(&self, coord: CellCoord) -> u32 {
        self.world.get(coord)
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn visible_cells(&self) -> Option<CellRect> {
        self.viewport.current()
    }

    pub fn hud_text(&self) -> &str {
        &self.hud_text
    }

    pub fn won_value(&self) -> Option<u32> {
        self.hud.won_value()
    }

    pub fn drain_events(&mut self) -> Vec<RuntimeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn drain_render(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.render)
    }

    pub fn snapshot(&self) -> SaveSnapshot {
        SaveSnapshot {
            player: self.player.position,
            held: self.player.held,
            overrides: self.world.serialize(),
            movement_mode: self.movement.mode(),
            won_value: self.hud.won_value(),
        }
    }

    /// A click on `coord`.
    pub fn handle_interaction(&mut self, coord: CellCoord) -> InteractionEvent {
        if !within_range(self.player.position, coord, self.config.interact_radius) {
            debug!(i = coord.i, j = coord.j, "too far to interact");
            self.push_interaction(coord, InteractionEvent::TooFar);
            return InteractionEvent::TooFar;
        }

        let transition = resolve(self.player.held, self.world.get(coord));
        if !transition.event.changed_state() {
            debug!(
                i = coord.i,
                j = coord.j,
                held = ?self.player.held,
                "no action for cell"
            );
            self.push_interaction(coord, transition.event);
            return transition.event;
        }

        self.world.set(coord, transition.cell);
        self.player.held = transition.held;
        info!(i = coord.i, j = coord.j, event = ?transition.event, "cell interaction");
        self.push_interaction(coord, transition.event);

        if let InteractionEvent::Dropped(value) | InteractionEvent::Merged(value) =
            transition.event
        {
            if value >= self.config.win_value {
                info!(value, "win value reached");
                self.hud.record_win(value);
                self.events.push(RuntimeEvent::Won { value });
            }
        }

        if self.viewport.is_visible(coord) {
            let cell = self.cell_view(coord);
            self.render.push(RenderCommand::Refresh { cell });
        }
        self.persist();
        self.push_hud();
        transition.event
    }

    /// A direction button. Ignored unless button movement is active.
    pub fn press_direction(&mut self, dir: Direction) -> bool {
        let Some((di, dj)) = self.movement.step(dir) else {
            debug!(?dir, "direction ignored, buttons inactive");
            return false;
        };
        let position = self.player.position;
        let next = CellCoord::new(position.i.saturating_add(di), position.j.saturating_add(dj));
        self.move_player(next);
        true
    }

    /// A device location update. Ignored unless geolocation is active.
    pub fn location_sample(&mut self, sample: LatLng) -> bool {
        match self.movement.sample(sample, self.player.position) {
            Some(next) => {
                self.move_player(next);
                true
            }
            None => false,
        }
    }

    pub fn set_movement_mode(&mut self, mode: MovementMode) -> Result<(), MovementError> {
        if self.movement.mode() == mode {
            return Ok(());
        }
        self.switch_source(mode)?;
        self.persist();
        Ok(())
    }

    /// The map finished a pan or zoom gesture.
    pub fn map_moved(&mut self, north_west: LatLng, south_east: LatLng) {
        if !north_west.is_finite() || !south_east.is_finite() {
            warn!("ignoring non-finite map bounds");
            return;
        }
        let diff = self.viewport.recompute_bounds(north_west, south_east);
        self.apply_diff(diff);
    }

    /// Starts a new game: every cell back to its default, empty hand, player
    /// at the start cell. The movement mode is kept.
    pub fn reset(&mut self) {
        self.world.restore(Vec::new());
        self.player = PlayerState {
            position: start_cell(&self.config),
            held: None,
        };
        self.hud.clear();
        self.events.push(RuntimeEvent::GameReset);
        info!("game reset");
        self.redraw_all();
        self.persist();
    }

    fn switch_source(&mut self, mode: MovementMode) -> Result<(), MovementError> {
        match self
            .movement
            .switch(mode, self.config.origin, self.location.as_mut())
        {
            Ok(()) => {
                info!(?mode, "movement mode changed");
                self.events.push(RuntimeEvent::MovementModeChanged { mode });
                Ok(())
            }
            Err(error) => {
                self.events.push(RuntimeEvent::LocationUnavailable {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    fn move_player(&mut self, next: CellCoord) {
        if next == self.player.position {
            return;
        }
        self.player.position = next;
        debug!(i = next.i, j = next.j, "player moved");
        self.events.push(RuntimeEvent::PlayerMoved {
            i: next.i,
            j: next.j,
        });
        self.render.push(RenderCommand::Recenter {
            center: cell_center(next, self.config.origin),
        });
        let diff = self.viewport.follow(next);
        self.apply_diff(diff);
        self.persist();
        self.push_hud();
    }

    fn redraw_all(&mut self) {
        self.render.push(RenderCommand::Recenter {
            center: cell_center(self.player.position, self.config.origin),
        });
        let diff = self.viewport.rebuild(self.player.position);
        self.apply_diff(diff);
        self.push_hud();
    }

    fn apply_diff(&mut self, diff: ViewportDiff) {
        for coord in diff.removed {
            self.render.push(RenderCommand::Remove { coord });
        }
        for coord in diff.added {
            let cell = self.cell_view(coord);
            self.render.push(RenderCommand::Draw { cell });
        }
    }

    fn cell_view(&self, coord: CellCoord) -> CellView {
        CellView {
            coord,
            value: self.world.get(coord),
            bounds: cell_bounds(coord, self.config.origin),
        }
    }

    fn push_interaction(&mut self, coord: CellCoord, event: InteractionEvent) {
        self.events.push(RuntimeEvent::Interaction {
            i: coord.i,
            j: coord.j,
            event,
        });
    }

    fn push_hud(&mut self) {
        self.hud_text = self.hud.render(&self.player);
        self.render.push(RenderCommand::Hud {
            text: self.hud_text.clone(),
        });
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        if let Err(error) = save_snapshot(self.store.as_mut(), &self.config.save_key, &snapshot) {
            warn!(%error, "failed to persist game state");
            self.events.push(RuntimeEvent::PersistenceWriteFailed {
                message: error.to_string(),
            });
        }
    }
}

fn start_cell(config: &GameConfig) -> CellCoord {
    lat_lng_to_cell(config.origin, config.origin)
}

#[cfg(test)]
mod tests;
