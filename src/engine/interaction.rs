use crate::types::{CellCoord, InteractionEvent};

/// Result of applying one click to a (held, cell) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub held: Option<u32>,
    pub cell: u32,
    pub event: InteractionEvent,
}

pub fn within_range(player: CellCoord, target: CellCoord, radius: i32) -> bool {
    player.chebyshev(target) <= radius as i64
}

/// Pickup, drop or merge. Only the cell value matters here, never where it
/// came from.
pub fn resolve(held: Option<u32>, cell: u32) -> Transition {
    match (held, cell) {
        (None, value) if value > 0 => Transition {
            held: Some(value),
            cell: 0,
            event: InteractionEvent::PickedUp(value),
        },
        (None, _) => Transition {
            held: None,
            cell,
            event: InteractionEvent::NoOp,
        },
        (Some(token), 0) => Transition {
            held: None,
            cell: token,
            event: InteractionEvent::Dropped(token),
        },
        (Some(token), value) if value == token => match token.checked_mul(2) {
            Some(merged) => Transition {
                held: None,
                cell: merged,
                event: InteractionEvent::Merged(merged),
            },
            // 1 << 31 is the largest token a u32 cell can hold.
            None => Transition {
                held,
                cell,
                event: InteractionEvent::NoOp,
            },
        },
        (Some(_), _) => Transition {
            held,
            cell,
            event: InteractionEvent::NoOp,
        },
    }
}
