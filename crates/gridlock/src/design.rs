//! Read-only input model for legalization.
//!
//! The legalizer does not talk to a design database directly; the caller
//! assembles a [`Design`] from whatever database it uses and applies the
//! returned placements back itself. Coordinates here are absolute design
//! units; the legalizer normalizes to a core-origin frame internally.

use crate::geom::{Dbu, Rect};
use serde::{Deserialize, Serialize};

/// Standard-cell orientation. Rows alternate `R0` and `MX` so that
/// power rails of adjacent rows line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orient {
    R0,
    MX,
}

/// Power rail net at the top edge of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Power {
    Vdd,
    Vss,
}

/// Classification of a master, deciding how the placer treats its
/// instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MasterKind {
    /// Placeable standard cell; receives configured site padding.
    Std,
    /// Placeable standard cell that never receives padding (fillers,
    /// spacers).
    Spacer,
    /// Fixed macro block. Blocks are painted into the grid and repel
    /// the legal-point resolver.
    Block,
    /// Invisible to the placer (pads, covers, rings).
    Ignored,
}

/// A cell master: the library definition instances refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Master {
    pub name: String,
    pub width: Dbu,
    pub height: Dbu,
    pub kind: MasterKind,
}

/// One placement row. Orientation and rail pattern are derived from the
/// configured parity, not stored per row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Row {
    /// Absolute origin of the row's first site.
    pub x: Dbu,
    pub y: Dbu,
    /// Number of sites in the row.
    pub site_count: i32,
    /// Row height in design units.
    pub height: Dbu,
}

/// An instance with its approximate location from global placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    /// Index into [`Design::masters`].
    pub master: usize,
    /// Absolute lower-left corner.
    pub x: Dbu,
    pub y: Dbu,
    /// Fixed instances are painted into the grid and never moved.
    pub fixed: bool,
}

/// A named constraint binding member instances to a union of rectangular
/// regions inside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionGroup {
    pub name: String,
    /// Region rectangles, absolute coordinates.
    pub regions: Vec<Rect>,
    /// Indices into [`Design::insts`].
    pub members: Vec<usize>,
}

/// A complete legalization input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    /// The core placement area.
    pub core: Rect,
    /// Site width shared by all rows.
    pub site_width: Dbu,
    /// Base (single) row height.
    pub row_height: Dbu,
    pub rows: Vec<Row>,
    pub masters: Vec<Master>,
    pub insts: Vec<Instance>,
    pub groups: Vec<RegionGroup>,
}

impl Design {
    /// Master of an instance.
    pub fn master_of(&self, inst: &Instance) -> &Master {
        &self.masters[inst.master]
    }
}
