//! Feasible-site search.
//!
//! The diamond search enumerates candidate grid points in expanding L1
//! diamonds around a target, scanning a short horizontal bin at each
//! candidate, and keeps the hit closest to the target in design units.
//! The legal-point resolver produces the starting point for that
//! search: clamped into the core, aligned to the row/site grid, moved
//! off hopeless pixels and away from macro blocks.

use tracing::trace;

use crate::cell::Cell;
use crate::geom::{div_ceil, div_floor, Dbu, Point, Rect};

use super::Session;

impl Session<'_> {
    /// Find the feasible grid point nearest `(x, y)` on the cell's
    /// layer, within the configured displacement budget. Returns the
    /// padded grid location to paint at.
    pub(crate) fn diamond_search(&mut self, cell: &Cell, x: i32, y: i32) -> Option<(i32, i32)> {
        let max_disp_x = self.cfg.max_displacement_x;
        let scaled_max_disp_y = self.scaled_max_displacement_y(cell);

        let mut x_min = x - max_disp_x;
        let mut x_max = x + max_disp_x;
        let mut y_min = y - scaled_max_disp_y;
        let mut y_max = y + scaled_max_disp_y;

        // Cells in a group never search outside the group hull.
        if let Some(gid) = cell.group {
            let boundary = self.groups[gid.0].boundary;
            let site_width = self.grid.site_width;
            let row_height = self.grid.info(cell.layer).row_height;
            let grid_boundary = Rect::new(
                div_ceil(boundary.x_min, site_width),
                div_ceil(boundary.y_min, row_height),
                div_floor(boundary.x_max, site_width),
                div_floor(boundary.y_max, row_height),
            );
            let min = grid_boundary.closest_pt_inside(Point::new(x_min as Dbu, y_min as Dbu));
            let max = grid_boundary.closest_pt_inside(Point::new(x_max as Dbu, y_max as Dbu));
            x_min = min.x as i32;
            y_min = min.y as i32;
            x_max = max.x as i32;
            y_max = max.y as i32;
        }

        let info = *self.grid.info(cell.layer);
        x_min = x_min.max(0);
        y_min = y_min.max(0);
        x_max = x_max.min(info.site_count);
        y_max = y_max.min(info.row_count);
        trace!(
            cell = %cell.name,
            x, y, x_min, x_max, y_min, y_max,
            "diamond search bounds"
        );

        // The bin at the target itself wins outright when it has room.
        if let Some(pt) = self.bin_search(x, cell, x, y) {
            return Some(pt);
        }

        for i in 1..max_disp_x.max(scaled_max_disp_y) {
            let mut best: Option<(i32, i32)> = None;
            let mut best_dist: Dbu = 0;

            // Left wing of the diamond at radius i.
            for j in 1..i * 2 {
                let x_offset = -((j + 1) / 2);
                let mut y_offset = (i * 2 - j) / 2;
                if x_offset.abs() < max_disp_x && y_offset.abs() < scaled_max_disp_y {
                    if j % 2 == 1 {
                        y_offset = -y_offset;
                    }
                    self.diamond_search_side(
                        cell, x, y, x_min, y_min, x_max, y_max, x_offset, y_offset, &mut best,
                        &mut best_dist,
                    );
                }
            }

            // Right wing, one column wider.
            for j in 1..(i + 1) * 2 {
                let x_offset = (j - 1) / 2;
                let mut y_offset = ((i + 1) * 2 - j) / 2;
                if x_offset.abs() < max_disp_x && y_offset.abs() < scaled_max_disp_y {
                    if j % 2 == 1 {
                        y_offset = -y_offset;
                    }
                    self.diamond_search_side(
                        cell, x, y, x_min, y_min, x_max, y_max, x_offset, y_offset, &mut best,
                        &mut best_dist,
                    );
                }
            }

            if best.is_some() {
                return best;
            }
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn diamond_search_side(
        &mut self,
        cell: &Cell,
        x: i32,
        y: i32,
        x_min: i32,
        y_min: i32,
        x_max: i32,
        y_max: i32,
        x_offset: i32,
        y_offset: i32,
        best: &mut Option<(i32, i32)>,
        best_dist: &mut Dbu,
    ) {
        let bin_x = (x + x_offset * self.bin_search_width).max(x_min).min(x_max);
        let bin_y = (y + y_offset).max(y_min).min(y_max);
        if let Some((avail_x, avail_y)) = self.bin_search(x, cell, bin_x, bin_y) {
            let row_height = self.grid.info(cell.layer).row_height;
            let avail_dist = (x - avail_x).abs() as Dbu * self.grid.site_width
                + (y - avail_y).abs() as Dbu * row_height;
            if best.is_none() || avail_dist < *best_dist {
                *best = Some((avail_x, avail_y));
                *best_dist = avail_dist;
            }
        }
    }

    /// Scan one bin of sites starting at `(bin_x, bin_y)` for a spot the
    /// cell's padded footprint fits. The scan walks toward the target
    /// column `x` first.
    pub(crate) fn bin_search(
        &mut self,
        x: i32,
        cell: &Cell,
        bin_x: i32,
        bin_y: i32,
    ) -> Option<(i32, i32)> {
        let x_end = bin_x + self.grid.grid_padded_width(cell);
        let y_end = bin_y + self.grid.grid_height(cell);
        if let Some(observer) = self.observer.as_mut() {
            observer.bin_search(&cell.name, bin_x, bin_y, x_end, y_end);
        }
        if y_end > self.grid.info(cell.layer).row_count {
            return None;
        }

        if x > bin_x {
            for i in (0..self.bin_search_width).rev() {
                if self.grid.check_empty(cell, bin_x + i, bin_y, x_end + i, y_end) {
                    return Some((bin_x + i, bin_y));
                }
            }
        } else {
            for i in 0..self.bin_search_width {
                if self.grid.check_empty(cell, bin_x + i, bin_y, x_end + i, y_end) {
                    return Some((bin_x + i, bin_y));
                }
            }
        }
        None
    }

    // ---- legal-point resolution ------------------------------------------

    /// Clamp a point into the core and align it to the cell's row and
    /// site grid, rounding half away from zero.
    pub(crate) fn legal_pt_in_core(&self, cell: &Cell, pt: Point) -> Point {
        let info = self.grid.info(cell.layer);
        let site_width = self.grid.site_width;
        let row_height = info.row_height;
        let core_x = pt
            .x
            .clamp(0, info.site_count as Dbu * site_width - cell.width);
        let core_y = pt
            .y
            .clamp(0, info.row_count as Dbu * row_height - cell.height);
        Point::new(
            crate::geom::div_round(core_x, site_width) * site_width,
            crate::geom::div_round(core_y, row_height) * row_height,
        )
    }

    /// Resolve an arbitrary point to the legal grid point the diamond
    /// search starts from: inside the core, on the row/site grid, off
    /// hopeless pixels, and off macro blocks.
    pub(crate) fn legal_grid_pt(&self, cell: &Cell, pt: Point) -> (i32, i32) {
        assert!(!cell.is_fixed, "legal point requested for a fixed cell");
        let info = self.grid.info(cell.layer);
        let site_width = self.grid.site_width;
        let row_height = info.row_height;

        let mut legal = self.legal_pt_in_core(cell, pt);
        let mut grid_x = self.grid.grid_x(legal.x);
        let mut grid_y = self.grid.grid_y(cell.layer, legal.y);

        if let Some(pixel) = self.grid.pixel(cell.layer, grid_x, grid_y) {
            if pixel.is_hopeless {
                if let Some((nx, ny)) = self.move_hopeless(cell, grid_x, grid_y) {
                    grid_x = nx;
                    grid_y = ny;
                    legal = Point::new(grid_x as Dbu * site_width, grid_y as Dbu * row_height);
                    trace!(cell = %cell.name, grid_x, grid_y, "moved off hopeless pixel");
                }
            }

            // Falling inside a macro block: push to its nearest edge.
            // This does not consider availability at the far end, so it
            // is secondary to the hopeless escape.
            if let Some(block_id) = self
                .grid
                .pixel(cell.layer, grid_x, grid_y)
                .and_then(|p| p.cell)
            {
                let block = &self.cells[block_id.0];
                if block.is_block() {
                    let bbox = Rect::new(
                        block.x,
                        block.y,
                        block.x + block.width,
                        block.y + block.height,
                    );
                    if legal.x + cell.width >= bbox.x_min
                        && legal.x <= bbox.x_max
                        && legal.y + cell.height >= bbox.y_min
                        && legal.y <= bbox.y_max
                    {
                        legal = self.nearest_block_edge(cell, legal, &bbox);
                    }
                }
            }
        }

        (
            self.grid.grid_x(legal.x),
            self.grid.grid_y(cell.layer, legal.y),
        )
    }

    /// Starting grid point for a cell from its initial (padded)
    /// location.
    pub(crate) fn legal_grid_pt_initial(&self, cell: &Cell) -> (i32, i32) {
        let init = cell.initial_location(true, self.grid.pad_left_dbu(cell));
        self.legal_grid_pt(cell, init)
    }

    /// Nearest valid pixel left/right/below/above a hopeless start, by
    /// axial distance; earlier directions win ties.
    fn move_hopeless(&self, cell: &Cell, grid_x: i32, grid_y: i32) -> Option<(i32, i32)> {
        let info = self.grid.info(cell.layer);
        let site_width = self.grid.site_width;
        let row_height = info.row_height;
        let mut best: Option<(i32, i32)> = None;
        let mut best_dist = Dbu::MAX;

        for x in (0..grid_x).rev() {
            if self.grid.pixel(cell.layer, x, grid_y).map(|p| p.is_valid) == Some(true) {
                best_dist = (grid_x - x - 1) as Dbu * site_width;
                best = Some((x, grid_y));
                break;
            }
        }
        for x in grid_x + 1..info.site_count {
            if self.grid.pixel(cell.layer, x, grid_y).map(|p| p.is_valid) == Some(true) {
                let dist = (x - grid_x) as Dbu * site_width - cell.width;
                if dist < best_dist {
                    best_dist = dist;
                    best = Some((x, grid_y));
                }
                break;
            }
        }
        for y in (0..grid_y).rev() {
            if self.grid.pixel(cell.layer, grid_x, y).map(|p| p.is_valid) == Some(true) {
                let dist = (grid_y - y - 1) as Dbu * row_height;
                if dist < best_dist {
                    best_dist = dist;
                    best = Some((grid_x, y));
                }
                break;
            }
        }
        for y in grid_y + 1..info.row_count {
            if self.grid.pixel(cell.layer, grid_x, y).map(|p| p.is_valid) == Some(true) {
                let dist = (y - grid_y) as Dbu * row_height - cell.height;
                if dist < best_dist {
                    best = Some((grid_x, y));
                }
                break;
            }
        }
        best
    }

    /// Snap to the aligned point just outside the block on the side
    /// with the smallest axial distance.
    fn nearest_block_edge(&self, cell: &Cell, legal: Point, bbox: &Rect) -> Point {
        let row_height = self.grid.info(cell.layer).row_height;
        let x_min_dist = (legal.x - bbox.x_min).abs();
        let x_max_dist = (bbox.x_max - (legal.x + cell.width)).abs();
        let y_min_dist = (legal.y - bbox.y_min).abs();
        let y_max_dist = (bbox.y_max - (legal.y + cell.height)).abs();

        if x_min_dist < x_max_dist && x_min_dist < y_min_dist && x_min_dist < y_max_dist {
            // left of the block
            return self.legal_pt_in_core(cell, Point::new(bbox.x_min - cell.width, legal.y));
        }
        if x_max_dist <= x_min_dist && x_max_dist <= y_min_dist && x_max_dist <= y_max_dist {
            // right of the block
            return self.legal_pt_in_core(cell, Point::new(bbox.x_max, legal.y));
        }
        if y_min_dist <= x_min_dist && y_min_dist <= x_max_dist && y_min_dist <= y_max_dist {
            // below the block
            return self.legal_pt_in_core(
                cell,
                Point::new(
                    legal.x,
                    div_floor(bbox.y_min, row_height) * row_height - cell.height,
                ),
            );
        }
        // above the block
        self.legal_pt_in_core(
            cell,
            Point::new(legal.x, div_ceil(bbox.y_max, row_height) * row_height),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LegalizerConfig;
    use crate::design::{Design, Instance, Master, MasterKind, Row};
    use crate::geom::{Point, Rect};
    use crate::legalizer::Session;

    fn design_with_cells(sites: i32, rows: i32, insts: Vec<Instance>) -> Design {
        Design {
            core: Rect::new(0, 0, sites as i64 * 200, rows as i64 * 1000),
            site_width: 200,
            row_height: 1000,
            rows: (0..rows)
                .map(|r| Row {
                    x: 0,
                    y: r as i64 * 1000,
                    site_count: sites,
                    height: 1000,
                })
                .collect(),
            masters: vec![
                Master {
                    name: "STD2".into(),
                    width: 400,
                    height: 1000,
                    kind: MasterKind::Std,
                },
                Master {
                    name: "MACRO".into(),
                    width: 1200,
                    height: 2000,
                    kind: MasterKind::Block,
                },
            ],
            insts,
            groups: vec![],
        }
    }

    fn inst(name: &str, master: usize, x: i64, y: i64, fixed: bool) -> Instance {
        Instance {
            name: name.into(),
            master,
            x,
            y,
            fixed,
        }
    }

    #[test]
    fn test_legal_grid_pt_is_idempotent() {
        let design = design_with_cells(10, 4, vec![inst("u0", 0, 530, 1720, false)]);
        let cfg = LegalizerConfig::default();
        let session = Session::new(&design, &cfg, None).unwrap();
        let cell = session.cells[0].clone();

        let (gx, gy) = session.legal_grid_pt(&cell, Point::new(530, 1720));
        let again = session.legal_grid_pt(&cell, Point::new(gx as i64 * 200, gy as i64 * 1000));
        assert_eq!((gx, gy), again);
    }

    #[test]
    fn test_legal_pt_rounds_half_away_from_zero() {
        let design = design_with_cells(10, 1, vec![inst("u0", 0, 500, 0, false)]);
        let cfg = LegalizerConfig::default();
        let session = Session::new(&design, &cfg, None).unwrap();
        let cell = session.cells[0].clone();
        // 500 / 200 = 2.5 rounds up to site 3.
        let pt = session.legal_pt_in_core(&cell, Point::new(500, 0));
        assert_eq!(pt, Point::new(600, 0));
    }

    #[test]
    fn test_diamond_search_prefers_nearest_site() {
        let design = design_with_cells(
            20,
            1,
            vec![
                inst("blocker", 0, 2000, 0, true),
                inst("u0", 0, 2000, 0, false),
            ],
        );
        let cfg = LegalizerConfig::default();
        let mut session = Session::new(&design, &cfg, None).unwrap();
        session.grid.paint_fixed(&session.cells[0]);
        let cell = session.cells[1].clone();

        // Sites 10 and 11 hold the blocker. The bin at the target scans
        // forward and lands on the first free two-site run at site 12.
        let (gx, gy) = session.diamond_search(&cell, 10, 0).unwrap();
        assert_eq!(gy, 0);
        assert_eq!(gx, 12);
    }

    #[test]
    fn test_legal_pt_escapes_macro_block() {
        let design = design_with_cells(
            20,
            4,
            vec![
                inst("macro", 1, 800, 1000, true),
                inst("u0", 0, 1200, 1500, false),
            ],
        );
        let cfg = LegalizerConfig::default();
        let mut session = Session::new(&design, &cfg, None).unwrap();
        session.grid.paint_fixed(&session.cells[0]);
        let cell = session.cells[1].clone();

        let (gx, gy) = session.legal_grid_pt(&cell, Point::new(1200, 1500));
        let pixel = session.grid.pixel(cell.layer, gx, gy).unwrap();
        assert!(!pixel.is_hopeless, "resolver left the start on the macro");
    }
}
