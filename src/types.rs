use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CellKeyError;

/// One cell of the unbounded grid. `i` follows latitude, `j` longitude.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CellCoord {
    pub i: i32,
    pub j: i32,
}

impl CellCoord {
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    pub fn key(&self) -> String {
        format!("{},{}", self.i, self.j)
    }

    pub fn parse_key(raw: &str) -> Result<Self, CellKeyError> {
        let (i, j) = raw
            .split_once(',')
            .ok_or_else(|| CellKeyError::MissingSeparator(raw.to_string()))?;
        let parse = |part: &str| {
            part.parse::<i32>()
                .map_err(|_| CellKeyError::InvalidComponent(part.to_string()))
        };
        Ok(Self::new(parse(i)?, parse(j)?))
    }

    pub fn chebyshev(&self, other: CellCoord) -> i64 {
        let di = (self.i as i64 - other.i as i64).abs();
        let dj = (self.j as i64 - other.j as i64).abs();
        di.max(dj)
    }

    pub fn offset(&self, dir: Direction) -> Self {
        let (di, dj) = dir.delta();
        Self::new(self.i.saturating_add(di), self.j.saturating_add(dj))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatLngBounds {
    #[serde(rename = "southWest")]
    pub south_west: LatLng,
    #[serde(rename = "northEast")]
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lng: (self.south_west.lng + self.north_east.lng) / 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "n" | "north" => Some(Self::North),
            "s" | "south" => Some(Self::South),
            "e" | "east" => Some(Self::East),
            "w" | "west" => Some(Self::West),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (1, 0),
            Direction::South => (-1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    #[default]
    Button,
    Geolocation,
}

impl MovementMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "button" | "buttons" => Some(Self::Button),
            "geo" | "geolocation" => Some(Self::Geolocation),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InteractionEvent {
    PickedUp(u32),
    Dropped(u32),
    Merged(u32),
    NoOp,
    TooFar,
}

impl InteractionEvent {
    pub fn changed_state(self) -> bool {
        matches!(
            self,
            InteractionEvent::PickedUp(_) | InteractionEvent::Dropped(_) | InteractionEvent::Merged(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    Interaction {
        i: i32,
        j: i32,
        event: InteractionEvent,
    },
    Won {
        value: u32,
    },
    PlayerMoved {
        i: i32,
        j: i32,
    },
    MovementModeChanged {
        mode: MovementMode,
    },
    LocationUnavailable {
        message: String,
    },
    PersistenceWriteFailed {
        message: String,
    },
    GameReset,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CellView {
    pub coord: CellCoord,
    pub value: u32,
    pub bounds: LatLngBounds,
}

/// Instructions for the map widget and the HUD.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderCommand {
    Draw { cell: CellView },
    Refresh { cell: CellView },
    Remove { coord: CellCoord },
    Recenter { center: LatLng },
    Hud { text: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PlayerState {
    pub position: CellCoord,
    pub held: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_key_round_trips_negative_coordinates() {
        let coord = CellCoord::new(-12, 40);
        assert_eq!(coord.key(), "-12,40");
        assert_eq!(CellCoord::parse_key("-12,40"), Ok(coord));
    }

    #[test]
    fn parse_key_rejects_garbage() {
        assert!(CellCoord::parse_key("").is_err());
        assert!(CellCoord::parse_key("3").is_err());
        assert!(CellCoord::parse_key("a,1").is_err());
        assert!(CellCoord::parse_key("1,2,3").is_err());
        assert!(CellCoord::parse_key(" 1,2").is_err());
    }

    #[test]
    fn chebyshev_uses_largest_axis_delta() {
        let origin = CellCoord::new(0, 0);
        assert_eq!(origin.chebyshev(CellCoord::new(3, -1)), 3);
        assert_eq!(origin.chebyshev(CellCoord::new(-2, 2)), 2);
        assert_eq!(
            CellCoord::new(i32::MIN, 0).chebyshev(CellCoord::new(i32::MAX, 0)),
            u32::MAX as i64
        );
    }

    #[test]
    fn directions_are_unit_steps() {
        let start = CellCoord::new(5, 5);
        assert_eq!(start.offset(Direction::North), CellCoord::new(6, 5));
        assert_eq!(start.offset(Direction::South), CellCoord::new(4, 5));
        assert_eq!(start.offset(Direction::East), CellCoord::new(5, 6));
        assert_eq!(start.offset(Direction::West), CellCoord::new(5, 4));
    }

    #[test]
    fn runtime_event_serializes_with_type_tag() {
        let event = RuntimeEvent::Interaction {
            i: 1,
            j: -2,
            event: InteractionEvent::Merged(4),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "interaction");
        assert_eq!(json["event"]["kind"], "merged");
        assert_eq!(json["event"]["value"], 4);
    }
}
