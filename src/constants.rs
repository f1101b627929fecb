use crate::types::LatLng;

/// Edge length of one cell in degrees, roughly the size of a house.
pub const CELL_SIZE: f64 = 0.0001;

/// Geographic position of the south-west corner of cell (0,0).
pub const ORIGIN: LatLng = LatLng {
    lat: 36.997936938057016,
    lng: -122.05703507501151,
};

pub const INTERACT_RADIUS: i32 = 3;
pub const WIN_VALUE: u32 = 32;
pub const VIEW_MARGIN: i32 = 2;
pub const SPAWN_PROBABILITY: f64 = 0.15;

/// Radius used around the player until the map reports its first bounds.
pub const FALLBACK_VIEW_RADIUS: i32 = 8;

/// Upper bound on cells per axis in a viewport.
pub const MAX_VIEW_SPAN: i32 = 400;

pub const SAVE_KEY: &str = "gridmerge.save";
pub const SAVE_VERSION: u8 = 1;
