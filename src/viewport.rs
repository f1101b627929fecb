use crate::constants::MAX_VIEW_SPAN;
use crate::types::{CellCoord, LatLng};
use crate::world::{cell_center, lat_lng_to_cell};

/// Inclusive rectangle of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRect {
    pub min: CellCoord,
    pub max: CellCoord,
}

impl CellRect {
    pub fn spanning(a: CellCoord, b: CellCoord) -> Self {
        Self {
            min: CellCoord::new(a.i.min(b.i), a.j.min(b.j)),
            max: CellCoord::new(a.i.max(b.i), a.j.max(b.j)),
        }
    }

    pub fn around(center: CellCoord, radius: i32) -> Self {
        let radius = radius.max(0);
        Self {
            min: CellCoord::new(center.i.saturating_sub(radius), center.j.saturating_sub(radius)),
            max: CellCoord::new(center.i.saturating_add(radius), center.j.saturating_add(radius)),
        }
    }

    pub fn expand(&self, margin: i32) -> Self {
        let margin = margin.max(0);
        Self {
            min: CellCoord::new(self.min.i.saturating_sub(margin), self.min.j.saturating_sub(margin)),
            max: CellCoord::new(self.max.i.saturating_add(margin), self.max.j.saturating_add(margin)),
        }
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        (self.min.i..=self.max.i).contains(&coord.i) && (self.min.j..=self.max.j).contains(&coord.j)
    }

    pub fn len(&self) -> usize {
        let rows = (self.max.i as i64 - self.min.i as i64 + 1) as usize;
        let cols = (self.max.j as i64 - self.min.j as i64 + 1) as usize;
        rows * cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major, south to north then west to east.
    pub fn iter(&self) -> impl Iterator<Item = CellCoord> {
        let (min, max) = (self.min, self.max);
        (min.i..=max.i).flat_map(move |i| (min.j..=max.j).map(move |j| CellCoord::new(i, j)))
    }

    fn clamp_span(self, max_span: i32) -> Self {
        let (min_i, max_i) = clamp_axis(self.min.i, self.max.i, max_span);
        let (min_j, max_j) = clamp_axis(self.min.j, self.max.j, max_span);
        Self {
            min: CellCoord::new(min_i, min_j),
            max: CellCoord::new(max_i, max_j),
        }
    }
}

fn clamp_axis(min: i32, max: i32, max_span: i32) -> (i32, i32) {
    let span = max as i64 - min as i64 + 1;
    if span <= max_span as i64 {
        return (min, max);
    }
    let center = (min as i64 + max as i64).div_euclid(2);
    let low = center - (max_span as i64 - 1) / 2;
    let high = low + max_span as i64 - 1;
    (low as i32, high as i32)
}

/// Cells covered by the map corners plus `margin` on every side. The corners
/// may arrive in any orientation.
pub fn visible_cells(nw: LatLng, se: LatLng, margin: i32, origin: LatLng) -> CellRect {
    let a = lat_lng_to_cell(nw, origin);
    let b = lat_lng_to_cell(se, origin);
    CellRect::spanning(a, b)
        .expand(margin)
        .clamp_span(MAX_VIEW_SPAN)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewportDiff {
    pub added: Vec<CellCoord>,
    pub removed: Vec<CellCoord>,
}

impl ViewportDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ViewportController {
    origin: LatLng,
    margin: i32,
    fallback_radius: i32,
    current: Option<CellRect>,
    span: Option<(f64, f64)>,
}

impl ViewportController {
    pub fn new(origin: LatLng, margin: i32, fallback_radius: i32) -> Self {
        Self {
            origin,
            margin,
            fallback_radius,
            current: None,
            span: None,
        }
    }

    pub fn current(&self) -> Option<CellRect> {
        self.current
    }

    pub fn is_visible(&self, coord: CellCoord) -> bool {
        self.current.is_some_and(|rect| rect.contains(coord))
    }

    /// The map finished a pan or zoom.
    pub fn recompute_bounds(&mut self, nw: LatLng, se: LatLng) -> ViewportDiff {
        self.span = Some(((nw.lat - se.lat).abs(), (se.lng - nw.lng).abs()));
        let next = visible_cells(nw, se, self.margin, self.origin);
        self.replace(next)
    }

    /// Re-centres on `center`, keeping the last reported map span. Before any
    /// bounds are known a fixed radius around the player is used.
    pub fn follow(&mut self, center: CellCoord) -> ViewportDiff {
        let next = match self.span {
            Some((lat_span, lng_span)) => {
                let mid = cell_center(center, self.origin);
                let nw = LatLng::new(mid.lat + lat_span / 2.0, mid.lng - lng_span / 2.0);
                let se = LatLng::new(mid.lat - lat_span / 2.0, mid.lng + lng_span / 2.0);
                visible_cells(nw, se, self.margin, self.origin)
            }
            None => CellRect::around(center, self.fallback_radius)
                .expand(self.margin)
                .clamp_span(MAX_VIEW_SPAN),
        };
        self.replace(next)
    }

    /// Drops every visible cell and redraws the area around `center`.
    pub fn rebuild(&mut self, center: CellCoord) -> ViewportDiff {
        let mut diff = self.clear();
        diff.added = self.follow(center).added;
        diff
    }

    pub fn clear(&mut self) -> ViewportDiff {
        let removed = self
            .current
            .take()
            .map(|rect| rect.iter().collect())
            .unwrap_or_default();
        ViewportDiff {
            added: Vec::new(),
            removed,
        }
    }

    fn replace(&mut self, next: CellRect) -> ViewportDiff {
        let previous = self.current.replace(next);
        match previous {
            None => ViewportDiff {
                added: next.iter().collect(),
                removed: Vec::new(),
            },
            Some(previous) if previous == next => ViewportDiff::default(),
            Some(previous) => ViewportDiff {
                added: next.iter().filter(|coord| !previous.contains(*coord)).collect(),
                removed: previous.iter().filter(|coord| !next.contains(*coord)).collect(),
            },
        }
    }
}
