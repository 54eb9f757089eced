//! Main placement pass.
//!
//! Orders the movable, ungrouped cells and maps each to its nearest
//! feasible site; cells the diamond search cannot map fall back to
//! shift-move, which evicts a neighborhood around the target point and
//! retries.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;

use crate::cell::CellId;
use crate::error::{LegalizeError, Result};
use crate::geom::{div_ceil, div_floor, Dbu};

use super::Session;

impl Session<'_> {
    /// Placement order: larger cells first, among equals the ones
    /// closer to the core center, with the name as the deterministic
    /// tie-break.
    pub(crate) fn place_order(&self, a: CellId, b: CellId) -> Ordering {
        let center_x = self.grid.core_dx / 2;
        let center_y = self.grid.core_dy / 2;
        let ca = &self.cells[a.0];
        let cb = &self.cells[b.0];
        let dist_a = (ca.x - center_x).abs() + (ca.y - center_y).abs();
        let dist_b = (cb.x - center_x).abs() + (cb.y - center_y).abs();
        cb.area()
            .cmp(&ca.area())
            .then(dist_a.cmp(&dist_b))
            .then_with(|| ca.name.cmp(&cb.name))
    }

    /// Place every movable cell that no earlier pass handled,
    /// multi-row cells first.
    pub(crate) fn place(&mut self) -> Result<()> {
        let mut sorted: Vec<CellId> = Vec::new();
        for cell in &self.cells {
            if !(cell.is_fixed || cell.in_group() || cell.is_placed) {
                if !self.fits_in_core(cell.id) {
                    return Err(LegalizeError::DoesNotFit(cell.name.clone()));
                }
                sorted.push(cell.id);
            }
        }
        sorted.sort_by(|&a, &b| self.place_order(a, b));
        debug!(cells = sorted.len(), "main placement pass");

        if self.have_multi_row {
            for &id in &sorted {
                if self.cells[id.0].is_multi_row && !self.map_move(id) {
                    self.shift_move(id);
                }
            }
        }
        for &id in &sorted {
            if !self.cells[id.0].is_multi_row && !self.map_move(id) {
                self.shift_move(id);
            }
        }
        Ok(())
    }

    pub(crate) fn fits_in_core(&self, id: CellId) -> bool {
        let cell = &self.cells[id.0];
        let info = self.grid.info(cell.layer);
        self.grid.grid_padded_width(cell) <= info.site_count
            && self.grid.grid_height(cell) <= info.row_count
    }

    /// Resolve the cell's legal start point and diamond-search from it;
    /// paint on success.
    pub(crate) fn map_move(&mut self, id: CellId) -> bool {
        let cell = self.cells[id.0].clone();
        let pt = self.legal_grid_pt_initial(&cell);
        self.map_move_to(id, pt)
    }

    pub(crate) fn map_move_to(&mut self, id: CellId, grid_pt: (i32, i32)) -> bool {
        let cell = self.cells[id.0].clone();
        if let Some((grid_x, grid_y)) = self.diamond_search(&cell, grid_pt.0, grid_pt.1) {
            self.grid.paint(&mut self.cells[id.0], grid_x, grid_y);
            self.notify_place(id);
            true
        } else {
            false
        }
    }

    /// Evict every movable cell near the target's legal point, place
    /// the target, then re-place the evicted cells. Anything that still
    /// cannot be placed is recorded as a failure.
    pub(crate) fn shift_move(&mut self, id: CellId) {
        let cell = self.cells[id.0].clone();
        debug!(cell = %cell.name, "shift move");
        let (grid_x, grid_y) = self.legal_grid_pt_initial(&cell);
        let margin = self.cfg.shift_margin;
        let margin_width = self.grid.grid_padded_width(&cell) * margin;

        let info = *self.grid.info(cell.layer);
        let site_width = self.grid.site_width;
        let x0 = ((grid_x - margin_width) as Dbu * site_width).max(0);
        let x1 = ((grid_x + margin_width) as Dbu * site_width).max(0);
        let y0 = ((grid_y - margin) as Dbu * info.row_height).max(0);
        let y1 = ((grid_y + margin) as Dbu * info.row_height).max(0);

        // Occupants of the eviction window, on every layer.
        let mut region_cells: BTreeSet<CellId> = BTreeSet::new();
        for layer in 0..self.grid.layer_count() {
            let other = self.grid.info(layer);
            let gx0 = div_floor(x0, site_width) as i32;
            let gx1 = (div_ceil(x1, site_width) as i32).min(other.site_count);
            let gy0 = div_floor(y0, other.row_height) as i32;
            let gy1 = (div_ceil(y1, other.row_height) as i32).min(other.row_count);
            for y in gy0..gy1 {
                for x in gx0..gx1 {
                    if let Some(occupant) = self.grid.pixel(layer, x, y).and_then(|p| p.cell) {
                        if !self.cells[occupant.0].is_fixed {
                            region_cells.insert(occupant);
                        }
                    }
                }
            }
        }

        // Only cells sharing the target's group membership status move.
        for &other in &region_cells {
            if cell.in_group() == self.cells[other.0].in_group() {
                self.grid.erase(&mut self.cells[other.0]);
            }
        }

        if !self.map_move(id) {
            self.failures.push(id);
        }

        for &other in &region_cells {
            if cell.in_group() == self.cells[other.0].in_group()
                && !self.cells[other.0].is_placed
                && !self.map_move(other)
            {
                // Historical behavior: the failure list references the
                // shift target, not the evicted cell.
                self.failures.push(id);
            }
        }
    }
}
