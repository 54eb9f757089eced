//! Optional debug observer for visualization frontends.
//!
//! All methods have empty defaults; a headless run installs no observer
//! and pays nothing.

use crate::geom::Dbu;

/// Callbacks fired at the interesting moments of a legalization run.
pub trait PlacementObserver {
    /// The session is initialized and about to place cells.
    fn start_placement(&mut self) {}

    /// All passes have finished.
    fn end_placement(&mut self) {}

    /// A cell was painted at `(x, y)` (core-origin design units).
    fn place_instance(&mut self, _name: &str, _x: Dbu, _y: Dbu) {}

    /// The diamond search scanned the bin `[x, x_end) x [y, y_end)`
    /// (grid coordinates) for the named cell.
    fn bin_search(&mut self, _name: &str, _x: i32, _y: i32, _x_end: i32, _y_end: i32) {}
}
