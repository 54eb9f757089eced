//! Region-group placement.
//!
//! Group cells are pulled into their regions before the main pass:
//! members already inside a region are pre-placed and pinned,
//! non-members overlapping a region are pushed out, then the remaining
//! members are bulk-placed. When bulk placement fails, the whole group
//! is repacked brick-style against region corners, which always
//! succeeds or proves the group unplaceable. A short refine and
//! random-swap loop then trims displacement.

use tracing::debug;

use crate::cell::{Cell, CellId};
use crate::error::{LegalizeError, Result};
use crate::geom::{Dbu, Point, Rect};

use super::Session;

impl Session<'_> {
    pub(crate) fn place_groups(&mut self) -> Result<()> {
        self.group_assign_cell_regions();
        self.pre_place_groups();
        self.pre_place();
        self.place_groups2()?;

        for gi in 0..self.groups.len() {
            for _pass in 0..self.cfg.refine_passes {
                let refine_count = self.group_refine(gi);
                let swap_count = self.random_swap(gi);
                debug!(
                    group = %self.groups[gi].name,
                    refine_count, swap_count, "group refine pass"
                );
                if refine_count < self.cfg.min_refines || swap_count < self.cfg.min_swaps {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Compute each group's utilization and assign every member its
    /// containing region (the last match wins; cells outside every
    /// region take the first).
    fn group_assign_cell_regions(&mut self) {
        for gi in 0..self.groups.len() {
            let members = self.groups[gi].members.clone();
            let regions = self.groups[gi].regions.clone();
            if regions.is_empty() {
                continue;
            }

            let mut total_site_area = 0i64;
            if let Some(&first) = members.first() {
                let layer = self.cells[first.0].layer;
                let site_area = self.grid.info(layer).row_height * self.grid.site_width;
                total_site_area =
                    self.grid.group_pixel_count(layer, self.groups[gi].id) * site_area;
            }

            let mut cell_area = 0i64;
            for &cid in &members {
                cell_area += self.grid.padded_width(&self.cells[cid.0]) * self.cells[cid.0].height;
                let mut assigned = None;
                for (ri, rect) in regions.iter().enumerate() {
                    if is_inside(&self.cells[cid.0], rect) {
                        assigned = Some(ri);
                    }
                }
                self.cells[cid.0].region = Some(assigned.unwrap_or(0));
            }
            self.groups[gi].util = if total_site_area > 0 {
                cell_area as f64 / total_site_area as f64
            } else {
                0.0
            };
            debug!(group = %self.groups[gi].name, util = self.groups[gi].util, "group utilization");
        }
    }

    /// Snap unplaced group members to the nearest legal point of their
    /// nearest region and pin the ones that land.
    fn pre_place_groups(&mut self) {
        for gi in 0..self.groups.len() {
            let members = self.groups[gi].members.clone();
            let regions = self.groups[gi].regions.clone();
            for &cid in &members {
                let cell = &self.cells[cid.0];
                if cell.is_fixed || cell.is_placed {
                    continue;
                }
                let mut dist = Dbu::MAX;
                let mut nearest: Option<usize> = None;
                let mut in_region = false;
                for (ri, rect) in regions.iter().enumerate() {
                    if is_inside(cell, rect) {
                        in_region = true;
                    }
                    let rect_dist = self.dist_to_rect(cell, rect);
                    if rect_dist < dist {
                        dist = rect_dist;
                        nearest = Some(ri);
                    }
                }
                // Degenerate group without regions.
                let Some(ri) = nearest else { continue };
                if !in_region {
                    let target = nearest_pt(cell, &regions[ri]);
                    let legal = self.legal_grid_pt(cell, target);
                    debug!(cell = %cell.name, ?legal, "pre-place group member");
                    if self.map_move_to(cid, legal) {
                        self.cells[cid.0].hold = true;
                    }
                }
            }
        }
    }

    /// Push ungrouped cells whose initial footprint overlaps a group
    /// region to the nearest point outside it, and pin the ones that
    /// land.
    fn pre_place(&mut self) {
        for ci in 0..self.cells.len() {
            let cell = &self.cells[ci];
            if cell.in_group() || cell.is_placed {
                continue;
            }
            let mut hit: Option<Rect> = None;
            for group in &self.groups {
                for rect in &group.regions {
                    if check_overlap(cell, rect) {
                        hit = Some(*rect);
                    }
                }
            }
            if let Some(rect) = hit {
                let target = nearest_pt(cell, &rect);
                let legal = self.legal_grid_pt(cell, target);
                debug!(cell = %cell.name, ?legal, "pre-place around group region");
                if self.map_move_to(CellId(ci), legal) {
                    self.cells[ci].hold = true;
                }
            }
        }
    }

    /// Bulk placement, multi-row members first. Any failure drops the
    /// whole group into brick packing.
    fn place_groups2(&mut self) -> Result<()> {
        for gi in 0..self.groups.len() {
            let mut group_cells: Vec<CellId> = self.groups[gi]
                .members
                .iter()
                .copied()
                .filter(|&cid| {
                    !self.cells[cid.0].is_fixed && !self.cells[cid.0].is_placed
                })
                .collect();
            group_cells.sort_by(|&a, &b| self.place_order(a, b));

            let mut multi_pass = true;
            for &cid in &group_cells {
                let cell = &self.cells[cid.0];
                if !cell.is_fixed && !cell.is_placed && cell.is_multi_row {
                    multi_pass = self.map_move(cid);
                    if !multi_pass {
                        break;
                    }
                }
            }
            let mut single_pass = true;
            if multi_pass {
                for &cid in &group_cells {
                    let cell = &self.cells[cid.0];
                    if !cell.is_fixed && !cell.is_placed && !cell.is_multi_row {
                        single_pass = self.map_move(cid);
                        if !single_pass {
                            break;
                        }
                    }
                }
            }

            if !single_pass || !multi_pass {
                debug!(group = %self.groups[gi].name, "bulk placement failed, brick packing");
                for &cid in &self.groups[gi].members.clone() {
                    if !self.cells[cid.0].is_fixed && self.cells[cid.0].is_placed {
                        self.grid.erase(&mut self.cells[cid.0]);
                    }
                }
                if self.groups[gi].util > self.cfg.brick_util_threshold {
                    self.brick_place_hull(gi)?;
                } else {
                    self.brick_place_regions(gi)?;
                }
            }
        }
        Ok(())
    }

    /// Pack a dense group against the corners of its hull, nearest
    /// cells first.
    fn brick_place_hull(&mut self, gi: usize) -> Result<()> {
        let boundary = self.groups[gi].boundary;
        let mut sorted = self.groups[gi].members.clone();
        sorted.sort_by_key(|&cid| rect_dist(&self.cells[cid.0], &boundary));

        for &cid in &sorted {
            let cell = self.cells[cid.0].clone();
            if cell.is_fixed {
                continue;
            }
            // The target is the nearest *corner* of the rect, matching
            // the legacy outputs; the nearest boundary point would
            // displace less.
            let target = rect_corner(&cell, &boundary);
            let legal = self.legal_grid_pt(&cell, target);
            debug!(cell = %cell.name, ?legal, "brick place");
            if !self.map_move_to(cid, legal) {
                return Err(LegalizeError::GroupPlacement(cell.name));
            }
        }
        Ok(())
    }

    /// Pack a sparser group against the corners of each cell's assigned
    /// region.
    fn brick_place_regions(&mut self, gi: usize) -> Result<()> {
        let regions = self.groups[gi].regions.clone();
        let mut sorted = self.groups[gi].members.clone();
        sorted.sort_by_key(|&cid| {
            let cell = &self.cells[cid.0];
            cell.region
                .map(|ri| rect_dist(cell, &regions[ri]))
                .unwrap_or(Dbu::MAX)
        });

        for &cid in &sorted {
            let cell = self.cells[cid.0].clone();
            if cell.is_fixed || cell.hold {
                continue;
            }
            let Some(ri) = cell.region else { continue };
            let target = rect_corner(&cell, &regions[ri]);
            let legal = self.legal_grid_pt(&cell, target);
            debug!(cell = %cell.name, ?legal, "brick place region");
            if !self.map_move_to(cid, legal) {
                return Err(LegalizeError::GroupPlacement(cell.name));
            }
        }
        Ok(())
    }

    /// Give the most-displaced fraction of the group a refine move.
    fn group_refine(&mut self, gi: usize) -> usize {
        let mut sorted = self.groups[gi].members.clone();
        sorted.sort_by(|&a, &b| self.cells[b.0].disp().cmp(&self.cells[a.0].disp()));

        let mut count = 0;
        let len = sorted.len();
        let mut i = 0;
        while i < len && (i as f64) < len as f64 * self.cfg.group_refine_percent {
            let cid = sorted[i];
            if !self.cells[cid.0].hold && self.refine_move(cid) {
                count += 1;
            }
            i += 1;
        }
        count
    }

    /// Padded distance of a cell's initial location to a region.
    fn dist_to_rect(&self, cell: &Cell, rect: &Rect) -> Dbu {
        let init = cell.initial_location(true, self.grid.pad_left_dbu(cell));
        let mut dist_x = 0;
        let mut dist_y = 0;
        if init.x < rect.x_min {
            dist_x = rect.x_min - init.x;
        } else if init.x + cell.width > rect.x_max {
            dist_x = init.x + cell.width - rect.x_max;
        }
        if init.y < rect.y_min {
            dist_y = rect.y_min - init.y;
        } else if init.y + cell.height > rect.y_max {
            dist_y = init.y + cell.height - rect.y_max;
        }
        dist_x + dist_y
    }
}

/// Initial footprint entirely inside the rectangle.
fn is_inside(cell: &Cell, rect: &Rect) -> bool {
    cell.init_x >= rect.x_min
        && cell.init_x + cell.width <= rect.x_max
        && cell.init_y >= rect.y_min
        && cell.init_y + cell.height <= rect.y_max
}

/// Initial footprint overlaps the rectangle.
fn check_overlap(cell: &Cell, rect: &Rect) -> bool {
    cell.init_x + cell.width > rect.x_min
        && cell.init_x < rect.x_max
        && cell.init_y + cell.height > rect.y_min
        && cell.init_y < rect.y_max
}

/// The axial push that moves the cell's initial location out of (or
/// into) the rectangle with the least displacement.
fn nearest_pt(cell: &Cell, rect: &Rect) -> Point {
    let x = cell.init_x;
    let y = cell.init_y;
    let mut temp_x = x;
    let mut temp_y = y;

    if check_overlap(cell, rect) {
        let dist_x;
        let dist_y;
        if (x + cell.width - rect.x_min).abs() > (rect.x_max - x).abs() {
            dist_x = (rect.x_max - x).abs();
            temp_x = rect.x_max;
        } else {
            dist_x = (x - rect.x_min).abs();
            temp_x = rect.x_min - cell.width;
        }
        if (y + cell.height - rect.y_min).abs() > (rect.y_max - y).abs() {
            dist_y = (rect.y_max - y).abs();
            temp_y = rect.y_max;
        } else {
            dist_y = (y - rect.y_min).abs();
            temp_y = rect.y_min - cell.height;
        }
        if dist_x < dist_y {
            return Point::new(temp_x, y);
        }
        return Point::new(x, temp_y);
    }

    if x < rect.x_min {
        temp_x = rect.x_min;
    } else if x + cell.width > rect.x_max {
        temp_x = rect.x_max - cell.width;
    }
    if y < rect.y_min {
        temp_y = rect.y_min;
    } else if y + cell.height > rect.y_max {
        temp_y = rect.y_max - cell.height;
    }
    Point::new(temp_x, temp_y)
}

/// The corner of the rectangle nearest the cell's initial location.
fn rect_corner(cell: &Cell, rect: &Rect) -> Point {
    let x = if cell.init_x > (rect.x_min + rect.x_max) / 2 {
        rect.x_max
    } else {
        rect.x_min
    };
    let y = if cell.init_y > (rect.y_min + rect.y_max) / 2 {
        rect.y_max
    } else {
        rect.y_min
    };
    Point::new(x, y)
}

/// L1 distance of the initial location to the nearest corner.
fn rect_dist(cell: &Cell, rect: &Rect) -> Dbu {
    let corner = rect_corner(cell, rect);
    (cell.init_x - corner.x).abs() + (cell.init_y - corner.y).abs()
}
