//! Arena records for cells and region groups.
//!
//! The grid stores only stable integer ids; cells own their current
//! location and the grid owns occupancy. Groups list member ids and
//! cells carry an optional group id, so there is no cyclic ownership.

use crate::design::{MasterKind, Orient};
use crate::geom::{Dbu, Point, Rect};

/// Stable identity of a cell within one legalization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub usize);

/// Stable identity of a region group within one legalization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub usize);

/// A movable or fixed instance, in the core-origin frame.
#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub id: CellId,
    /// Index of the originating instance in the input design.
    pub inst: usize,
    pub name: String,
    pub kind: MasterKind,
    /// Current lower-left corner.
    pub x: Dbu,
    pub y: Dbu,
    /// Location handed in by global placement.
    pub init_x: Dbu,
    pub init_y: Dbu,
    pub width: Dbu,
    pub height: Dbu,
    pub orient: Orient,
    /// Grid layer matching this cell's row height.
    pub layer: usize,
    /// True once the master is taller than the base row.
    pub is_multi_row: bool,
    pub is_fixed: bool,
    pub is_placed: bool,
    /// Pinned by a pre-placement pass; later passes must not move it.
    pub hold: bool,
    pub group: Option<GroupId>,
    /// Index of the assigned region within the group's region list.
    pub region: Option<usize>,
}

impl Cell {
    pub fn area(&self) -> i64 {
        self.width * self.height
    }

    pub fn in_group(&self) -> bool {
        self.group.is_some()
    }

    pub fn is_block(&self) -> bool {
        self.kind == MasterKind::Block
    }

    /// Standard cells are the ones whose final locations are reported.
    pub fn is_std(&self) -> bool {
        matches!(self.kind, MasterKind::Std | MasterKind::Spacer)
    }

    /// Initial location, optionally shifted left by the padding so the
    /// padded footprint starts at the returned point.
    pub fn initial_location(&self, padded: bool, pad_left_dbu: Dbu) -> Point {
        if padded {
            Point::new(self.init_x - pad_left_dbu, self.init_y)
        } else {
            Point::new(self.init_x, self.init_y)
        }
    }

    /// L1 displacement from the initial location.
    pub fn disp(&self) -> Dbu {
        (self.init_x - self.x).abs() + (self.init_y - self.y).abs()
    }

    /// Change in displacement if the cell moved to `(x, y)`.
    pub fn disp_change(&self, x: Dbu, y: Dbu) -> Dbu {
        let pt_dist = (self.init_x - x).abs() + (self.init_y - y).abs();
        pt_dist - self.disp()
    }
}

/// A region group resolved against the session's cell arena.
#[derive(Debug, Clone)]
pub(crate) struct Group {
    pub id: GroupId,
    pub name: String,
    /// Region rectangles in the core-origin frame.
    pub regions: Vec<Rect>,
    /// Axis-aligned hull of the regions.
    pub boundary: Rect,
    pub members: Vec<CellId>,
    /// Padded cell area over region site area, filled in before the
    /// group passes run.
    pub util: f64,
}
