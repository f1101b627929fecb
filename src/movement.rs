use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::MovementError;
use crate::types::{CellCoord, Direction, LatLng, MovementMode};
use crate::world::lat_lng_to_cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WatchId(pub u64);

/// Host capability that delivers device locations. Samples themselves are
/// pushed into the engine by the host while a watch is active.
pub trait LocationProvider {
    fn watch_position(&mut self) -> Result<WatchId, MovementError>;
    fn clear_watch(&mut self, id: WatchId);
}

/// A host without any location capability.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn watch_position(&mut self) -> Result<WatchId, MovementError> {
        Err(MovementError::LocationUnavailable(
            "geolocation is not supported on this host".to_string(),
        ))
    }

    fn clear_watch(&mut self, _id: WatchId) {}
}

/// Location fed by hand (terminal driver, simulator, tests).
#[derive(Clone, Debug, Default)]
pub struct ManualLocation {
    next_id: u64,
    active: BTreeSet<WatchId>,
}

impl ManualLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_watches(&self) -> usize {
        self.active.len()
    }
}

impl LocationProvider for ManualLocation {
    fn watch_position(&mut self) -> Result<WatchId, MovementError> {
        self.next_id += 1;
        let id = WatchId(self.next_id);
        self.active.insert(id);
        Ok(id)
    }

    fn clear_watch(&mut self, id: WatchId) {
        self.active.remove(&id);
    }
}

#[derive(Clone, Debug, Default)]
pub struct ButtonMovement {
    bound: bool,
}

impl ButtonMovement {
    pub fn start(&mut self) {
        self.bound = true;
    }

    pub fn stop(&mut self) {
        self.bound = false;
    }

    pub fn is_active(&self) -> bool {
        self.bound
    }

    pub fn step(&self, dir: Direction) -> Option<(i32, i32)> {
        self.bound.then(|| dir.delta())
    }
}

#[derive(Clone, Debug)]
pub struct GeolocationMovement {
    origin: LatLng,
    watch: Option<WatchId>,
}

impl GeolocationMovement {
    pub fn new(origin: LatLng) -> Self {
        Self {
            origin,
            watch: None,
        }
    }

    pub fn start(&mut self, provider: &mut dyn LocationProvider) -> Result<(), MovementError> {
        if self.watch.is_some() {
            return Ok(());
        }
        self.watch = Some(provider.watch_position()?);
        Ok(())
    }

    pub fn stop(&mut self, provider: &mut dyn LocationProvider) {
        if let Some(id) = self.watch.take() {
            provider.clear_watch(id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.watch.is_some()
    }

    /// Grid cell for `sample` when it differs from `current`.
    pub fn sample(&self, sample: LatLng, current: CellCoord) -> Option<CellCoord> {
        if self.watch.is_none() || !sample.is_finite() {
            return None;
        }
        let next = lat_lng_to_cell(sample, self.origin);
        (next != current).then_some(next)
    }
}

/// The single active movement source.
#[derive(Clone, Debug)]
pub enum MovementController {
    Button(ButtonMovement),
    Geolocation(GeolocationMovement),
}

impl MovementController {
    pub fn buttons() -> Self {
        let mut buttons = ButtonMovement::default();
        buttons.start();
        MovementController::Button(buttons)
    }

    pub fn mode(&self) -> MovementMode {
        match self {
            MovementController::Button(_) => MovementMode::Button,
            MovementController::Geolocation(_) => MovementMode::Geolocation,
        }
    }

    pub fn stop(&mut self, provider: &mut dyn LocationProvider) {
        match self {
            MovementController::Button(buttons) => buttons.stop(),
            MovementController::Geolocation(geo) => geo.stop(provider),
        }
    }

    /// Stops the current source, then starts `mode`. When the new source
    /// cannot start the previous one is restarted and the error returned.
    pub fn switch(
        &mut self,
        mode: MovementMode,
        origin: LatLng,
        provider: &mut dyn LocationProvider,
    ) -> Result<(), MovementError> {
        if self.mode() == mode {
            return Ok(());
        }
        self.stop(provider);
        match mode {
            MovementMode::Button => {
                *self = MovementController::buttons();
                debug!(mode = ?mode, "movement source started");
                Ok(())
            }
            MovementMode::Geolocation => {
                let mut geo = GeolocationMovement::new(origin);
                match geo.start(provider) {
                    Ok(()) => {
                        *self = MovementController::Geolocation(geo);
                        debug!(mode = ?mode, "movement source started");
                        Ok(())
                    }
                    Err(error) => {
                        warn!(%error, "geolocation unavailable, keeping button movement");
                        *self = MovementController::buttons();
                        Err(error)
                    }
                }
            }
        }
    }

    pub fn step(&self, dir: Direction) -> Option<(i32, i32)> {
        match self {
            MovementController::Button(buttons) => buttons.step(dir),
            MovementController::Geolocation(_) => None,
        }
    }

    pub fn sample(&self, sample: LatLng, current: CellCoord) -> Option<CellCoord> {
        match self {
            MovementController::Geolocation(geo) => geo.sample(sample, current),
            MovementController::Button(_) => None,
        }
    }
}
