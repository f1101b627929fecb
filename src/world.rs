use std::collections::BTreeMap;

use crate::constants::{CELL_SIZE, SPAWN_PROBABILITY};
use crate::rng::luck;
use crate::types::{CellCoord, LatLng, LatLngBounds};

/// Value a cell holds before anyone touches it. Depends on the coordinate
/// alone, so the same world comes back after every restart.
pub fn default_value(coord: CellCoord) -> u32 {
    if luck(&coord.key()) < SPAWN_PROBABILITY {
        1
    } else {
        0
    }
}

/// 0 (empty) or a positive power of two.
pub fn is_valid_token(value: u32) -> bool {
    value == 0 || value.is_power_of_two()
}

/// Sparse ledger of cells whose value differs from [`default_value`].
///
/// Writing a cell back to its default removes the entry, so the ledger only
/// grows with real changes to the world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    overrides: BTreeMap<CellCoord, u32>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: CellCoord) -> u32 {
        self.overrides
            .get(&coord)
            .copied()
            .unwrap_or_else(|| default_value(coord))
    }

    pub fn set(&mut self, coord: CellCoord, value: u32) {
        if value == default_value(coord) {
            self.overrides.remove(&coord);
        } else {
            self.overrides.insert(coord, value);
        }
    }

    pub fn serialize(&self) -> Vec<(CellCoord, u32)> {
        self.overrides
            .iter()
            .map(|(coord, value)| (*coord, *value))
            .collect()
    }

    /// Replaces the whole ledger. Prior entries never survive a restore.
    pub fn restore<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (CellCoord, u32)>,
    {
        self.overrides.clear();
        for (coord, value) in pairs {
            self.set(coord, value);
        }
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

pub fn lat_lng_to_cell(point: LatLng, origin: LatLng) -> CellCoord {
    CellCoord {
        i: ((point.lat - origin.lat) / CELL_SIZE).floor() as i32,
        j: ((point.lng - origin.lng) / CELL_SIZE).floor() as i32,
    }
}

pub fn cell_bounds(coord: CellCoord, origin: LatLng) -> LatLngBounds {
    let lat = origin.lat + coord.i as f64 * CELL_SIZE;
    let lng = origin.lng + coord.j as f64 * CELL_SIZE;
    LatLngBounds {
        south_west: LatLng { lat, lng },
        north_east: LatLng {
            lat: lat + CELL_SIZE,
            lng: lng + CELL_SIZE,
        },
    }
}

pub fn cell_center(coord: CellCoord, origin: LatLng) -> LatLng {
    cell_bounds(coord, origin).center()
}

#[cfg(test)]
pub(crate) fn find_cell(predicate: impl Fn(CellCoord) -> bool) -> CellCoord {
    for i in -200..200 {
        for j in -200..200 {
            let coord = CellCoord::new(i, j);
            if predicate(coord) {
                return coord;
            }
        }
    }
    panic!("no cell matches predicate");
}
