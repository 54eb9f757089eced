//! Occupancy grid for placement legalization.
//!
//! The grid is a stack of pixel layers, one per distinct cell row
//! height. Every layer covers the same core area at the same site
//! pitch; only the vertical granularity differs. A cell's occupancy is
//! painted on the layer matching its own row height, and emptiness
//! checks look across the remaining layers through the design-unit
//! footprint, so mixed-height designs cannot interleave overlapping
//! cells.
//!
//! Pixels hold stable cell ids, never references; cells own their
//! current location and the grid owns the topology.

use std::collections::BTreeMap;

use tracing::warn;

use crate::cell::{Cell, CellId, Group, GroupId};
use crate::config::LegalizerConfig;
use crate::design::{Design, MasterKind, Orient, Power};
use crate::error::{LegalizeError, Result};
use crate::geom::{div_ceil, div_floor, Dbu, Rect};

/// One grid position on one layer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pixel {
    /// Occupying cell, if any. Fixed cells occupy pixels on every
    /// layer; movable cells only on their own.
    pub cell: Option<CellId>,
    /// Set when only members of this group may occupy the pixel.
    pub group: Option<GroupId>,
    /// A row exists here and the site is usable.
    pub is_valid: bool,
    /// No legal footprint can start here (under a macro block).
    pub is_hopeless: bool,
    /// Fractional region coverage, only meaningful while the group
    /// regions are being rasterized.
    pub util: f64,
}

impl Pixel {
    fn empty() -> Self {
        Self {
            cell: None,
            group: None,
            is_valid: false,
            is_hopeless: false,
            util: 0.0,
        }
    }
}

/// Per-layer dimensions.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GridInfo {
    pub row_height: Dbu,
    pub site_count: i32,
    pub row_count: i32,
}

/// The occupancy grid for one legalization session.
#[derive(Debug, Clone)]
pub(crate) struct Grid {
    pub site_width: Dbu,
    /// Base (single) row height.
    pub row_height: Dbu,
    pub core_dx: Dbu,
    pub core_dy: Dbu,
    pad_left: i32,
    pad_right: i32,
    disallow_one_site_gaps: bool,
    row0_orient_is_r0: bool,
    row0_top_power_is_vdd: bool,
    infos: Vec<GridInfo>,
    height_to_layer: BTreeMap<Dbu, usize>,
    /// Row-major pixels per layer: `pixels[layer][y * site_count + x]`.
    pixels: Vec<Vec<Pixel>>,
}

impl Grid {
    /// Build the layer stack for a design. One layer exists for the base
    /// row height and for every distinct movable-cell height; pixels are
    /// valid where the design's rows cover them.
    pub fn new(design: &Design, cfg: &LegalizerConfig) -> Result<Grid> {
        let site_width = design.site_width;
        let row_height = design.row_height;
        let core_dx = design.core.dx();
        let core_dy = design.core.dy();
        let site_count = div_floor(core_dx, site_width) as i32;
        let base_rows = div_floor(core_dy, row_height) as i32;

        // Validity of the base fabric, from the design's rows.
        let mut base_valid = vec![false; (site_count as usize) * (base_rows as usize)];
        for (i, row) in design.rows.iter().enumerate() {
            let rx = row.x - design.core.x_min;
            let ry = row.y - design.core.y_min;
            if rx % site_width != 0 || ry % row_height != 0 || row.height % row_height != 0 {
                return Err(LegalizeError::MisalignedRow(i));
            }
            let gx0 = div_floor(rx, site_width);
            let gy0 = div_floor(ry, row_height);
            let gy1 = gy0 + row.height / row_height;
            for gy in gy0.max(0)..gy1.min(base_rows as Dbu) {
                for gx in gx0.max(0)..(gx0 + row.site_count as Dbu).min(site_count as Dbu) {
                    base_valid[gy as usize * site_count as usize + gx as usize] = true;
                }
            }
        }

        // One layer per distinct movable-cell height, base first.
        let mut heights: Vec<Dbu> = vec![row_height];
        for inst in &design.insts {
            let master = design.master_of(inst);
            if inst.fixed || matches!(master.kind, MasterKind::Block | MasterKind::Ignored) {
                continue;
            }
            if !heights.contains(&master.height) {
                heights.push(master.height);
            }
        }
        heights.sort_unstable();

        let mut infos = Vec::new();
        let mut height_to_layer = BTreeMap::new();
        let mut pixels = Vec::new();
        for height in heights {
            let row_count = div_floor(core_dy, height) as i32;
            let layer = infos.len();
            height_to_layer.insert(height, layer);
            infos.push(GridInfo {
                row_height: height,
                site_count,
                row_count,
            });

            let mut layer_pixels =
                vec![Pixel::empty(); (site_count as usize) * (row_count as usize)];
            for gy in 0..row_count {
                // A pixel of a taller layer is valid only when every base
                // row it spans is valid at that site.
                let b0 = div_floor(gy as Dbu * height, row_height);
                let b1 = div_ceil((gy as Dbu + 1) * height, row_height).min(base_rows as Dbu);
                for gx in 0..site_count {
                    let valid = (b0..b1).all(|b| {
                        base_valid[b as usize * site_count as usize + gx as usize]
                    });
                    layer_pixels[gy as usize * site_count as usize + gx as usize].is_valid = valid;
                }
            }
            pixels.push(layer_pixels);
        }

        Ok(Grid {
            site_width,
            row_height,
            core_dx,
            core_dy,
            pad_left: cfg.pad_left,
            pad_right: cfg.pad_right,
            disallow_one_site_gaps: cfg.disallow_one_site_gaps,
            row0_orient_is_r0: cfg.row0_orient_is_r0,
            row0_top_power_is_vdd: cfg.row0_top_power_is_vdd,
            infos,
            height_to_layer,
            pixels,
        })
    }

    pub fn layer_count(&self) -> usize {
        self.infos.len()
    }

    pub fn info(&self, layer: usize) -> &GridInfo {
        &self.infos[layer]
    }

    /// Layer whose row height matches `height` exactly.
    pub fn layer_of_height(&self, height: Dbu) -> Option<usize> {
        self.height_to_layer.get(&height).copied()
    }

    pub fn pixel(&self, layer: usize, x: i32, y: i32) -> Option<&Pixel> {
        let info = &self.infos[layer];
        if x < 0 || x >= info.site_count || y < 0 || y >= info.row_count {
            return None;
        }
        Some(&self.pixels[layer][y as usize * info.site_count as usize + x as usize])
    }

    fn pixel_mut(&mut self, layer: usize, x: i32, y: i32) -> Option<&mut Pixel> {
        let info = &self.infos[layer];
        if x < 0 || x >= info.site_count || y < 0 || y >= info.row_count {
            return None;
        }
        Some(&mut self.pixels[layer][y as usize * info.site_count as usize + x as usize])
    }

    // ---- padding and coordinate conversion -------------------------------

    pub fn is_padded(&self, cell: &Cell) -> bool {
        cell.kind == MasterKind::Std && (self.pad_left > 0 || self.pad_right > 0)
    }

    pub fn pad_left_dbu(&self, cell: &Cell) -> Dbu {
        if self.is_padded(cell) {
            self.pad_left as Dbu * self.site_width
        } else {
            0
        }
    }

    pub fn padded_width(&self, cell: &Cell) -> Dbu {
        if self.is_padded(cell) {
            cell.width + (self.pad_left + self.pad_right) as Dbu * self.site_width
        } else {
            cell.width
        }
    }

    pub fn grid_padded_width(&self, cell: &Cell) -> i32 {
        div_ceil(self.padded_width(cell), self.site_width) as i32
    }

    pub fn grid_height(&self, cell: &Cell) -> i32 {
        div_ceil(cell.height, self.infos[cell.layer].row_height) as i32
    }

    pub fn grid_x(&self, x: Dbu) -> i32 {
        div_floor(x, self.site_width) as i32
    }

    pub fn grid_y(&self, layer: usize, y: Dbu) -> i32 {
        div_floor(y, self.infos[layer].row_height) as i32
    }

    /// Grid x of the padded footprint origin.
    pub fn grid_padded_x(&self, cell: &Cell) -> i32 {
        self.grid_x(cell.x - self.pad_left_dbu(cell))
    }

    /// Orientation of a base row under the configured parity.
    pub fn row_orient(&self, base_row: i32) -> Orient {
        let row = if self.row0_orient_is_r0 {
            base_row
        } else {
            base_row + 1
        };
        if row % 2 == 0 {
            Orient::R0
        } else {
            Orient::MX
        }
    }

    /// Top power rail of a base row under the configured parity.
    pub fn row_top_power(&self, base_row: i32) -> Power {
        let row = if self.row0_top_power_is_vdd {
            base_row
        } else {
            base_row + 1
        };
        if row % 2 == 0 {
            Power::Vdd
        } else {
            Power::Vss
        }
    }

    // ---- occupancy -------------------------------------------------------

    /// Paint a movable cell at padded grid location `(grid_x, grid_y)` on
    /// its layer, updating the cell's location, orientation and placed
    /// flag. The footprint must be empty.
    pub fn paint(&mut self, cell: &mut Cell, grid_x: i32, grid_y: i32) {
        let info = self.infos[cell.layer];
        let pad = if self.is_padded(cell) {
            self.pad_left
        } else {
            0
        };
        cell.x = (grid_x + pad) as Dbu * self.site_width;
        cell.y = grid_y as Dbu * info.row_height;
        if cell.is_std() {
            let base_row = div_floor(cell.y, self.row_height) as i32;
            cell.orient = self.row_orient(base_row);
        }

        let x_end = grid_x + self.grid_padded_width(cell);
        let y_end = grid_y + self.grid_height(cell);
        for y in grid_y..y_end {
            for x in grid_x..x_end {
                let pixel = self
                    .pixel_mut(cell.layer, x, y)
                    .expect("paint outside the grid");
                assert!(
                    pixel.cell.is_none(),
                    "paint onto occupied pixel ({}, {})",
                    x,
                    y
                );
                pixel.cell = Some(cell.id);
            }
        }
        cell.is_placed = true;
    }

    /// Erase a placed movable cell from its layer. Exact inverse of
    /// [`Grid::paint`].
    pub fn erase(&mut self, cell: &mut Cell) {
        assert!(cell.is_placed, "erase of a cell that is not placed");
        let info = self.infos[cell.layer];
        let grid_x = self.grid_padded_x(cell);
        let x_end = grid_x + self.grid_padded_width(cell);
        let grid_y = div_floor(cell.y, info.row_height) as i32;
        let y_end = grid_y + self.grid_height(cell);
        for y in grid_y..y_end {
            for x in grid_x..x_end {
                if let Some(pixel) = self.pixel_mut(cell.layer, x, y) {
                    if pixel.cell == Some(cell.id) {
                        pixel.cell = None;
                    }
                }
            }
        }
        cell.is_placed = false;
    }

    /// Paint a fixed cell onto every layer. Fixed occupancy is never
    /// erased; macro blocks additionally poison their pixels as hopeless
    /// search origins.
    pub fn paint_fixed(&mut self, cell: &Cell) {
        let x0 = cell.x - self.pad_left_dbu(cell);
        let x1 = cell.x + cell.width
            + if self.is_padded(cell) {
                self.pad_right as Dbu * self.site_width
            } else {
                0
            };
        let y0 = cell.y;
        let y1 = cell.y + cell.height;
        let is_block = cell.is_block();
        for layer in 0..self.infos.len() {
            let info = self.infos[layer];
            let gx0 = div_floor(x0, self.site_width).max(0) as i32;
            let gx1 = div_ceil(x1, self.site_width).min(info.site_count as Dbu) as i32;
            let gy0 = div_floor(y0, info.row_height).max(0) as i32;
            let gy1 = div_ceil(y1, info.row_height).min(info.row_count as Dbu) as i32;
            for y in gy0..gy1 {
                for x in gx0..gx1 {
                    let pixel = self.pixel_mut(layer, x, y).expect("fixed paint in bounds");
                    pixel.cell = Some(cell.id);
                    pixel.util = 1.0;
                    if is_block {
                        pixel.is_hopeless = true;
                    }
                }
            }
        }
    }

    /// True when the padded footprint `[x, x_end) x [y, y_end)` (grid
    /// coordinates on the cell's layer) is valid, empty and
    /// group-compatible, and no cell on any other layer covers it.
    pub fn check_empty(&self, cell: &Cell, x: i32, y: i32, x_end: i32, y_end: i32) -> bool {
        let info = self.infos[cell.layer];
        if x_end > info.site_count {
            return false;
        }
        for y1 in y..y_end {
            for x1 in x..x_end {
                let pixel = match self.pixel(cell.layer, x1, y1) {
                    Some(p) => p,
                    None => return false,
                };
                if pixel.cell.is_some() || !pixel.is_valid {
                    return false;
                }
                if cell.group != pixel.group {
                    return false;
                }
            }
        }

        if self.disallow_one_site_gaps && !self.corner_gaps_ok(cell.layer, x, y, x_end, y_end) {
            return false;
        }

        // Cells of other heights live on other layers; reject when any
        // of them covers this footprint.
        let x0d = x as Dbu * self.site_width;
        let x1d = x_end as Dbu * self.site_width;
        let y0d = y as Dbu * info.row_height;
        let y1d = y_end as Dbu * info.row_height;
        for layer in 0..self.infos.len() {
            if layer == cell.layer {
                continue;
            }
            let other = self.infos[layer];
            let gy0 = div_floor(y0d, other.row_height).max(0) as i32;
            let gy1 = div_ceil(y1d, other.row_height).min(other.row_count as Dbu) as i32;
            let gx0 = div_floor(x0d, self.site_width).max(0) as i32;
            let gx1 = div_ceil(x1d, self.site_width).min(other.site_count as Dbu) as i32;
            for y1i in gy0..gy1 {
                for x1i in gx0..gx1 {
                    if self.pixels[layer][y1i as usize * other.site_count as usize + x1i as usize]
                        .cell
                        .is_some()
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// A placement may not leave a single empty site pinched between the
    /// new footprint and a neighbor at any of its four corners.
    fn corner_gaps_ok(&self, layer: usize, x: i32, y: i32, x_end: i32, y_end: i32) -> bool {
        let info = self.infos[layer];
        let x_begin = (x - 1).max(0);
        let y_begin = (y - 1).max(0);
        let x_finish = x_end.min(info.site_count - 1);
        let y_finish = y_end.min(info.row_count - 1);
        let abutted = |px: i32, py: i32| match self.pixel(layer, px, py) {
            None => true,
            Some(p) => p.cell.is_some(),
        };
        let cell_at = |px: i32, py: i32| {
            self.pixel(layer, px, py)
                .map(|p| p.cell.is_some())
                .unwrap_or(false)
        };
        // An empty corner site with a cell one further out is a
        // single-site gap; an abutting cell at the corner is fine.
        if !abutted(x_begin, y_begin) && cell_at(x_begin - 1, y_begin) {
            return false;
        }
        if !abutted(x_begin, y_finish) && cell_at(x_begin - 1, y_finish) {
            return false;
        }
        if !abutted(x_finish, y_begin) && cell_at(x_finish + 1, y_begin) {
            return false;
        }
        if !abutted(x_finish, y_finish) && cell_at(x_finish + 1, y_finish) {
            return false;
        }
        true
    }

    // ---- region-group pixel conditioning ---------------------------------

    /// Invalidate pixels a region boundary cuts through horizontally, so
    /// no footprint can straddle a region edge.
    pub fn group_init_edge_pixels(&mut self, groups: &[Group]) {
        for layer in 0..self.infos.len() {
            let info = self.infos[layer];
            for y in 0..info.row_count {
                for x in 0..info.site_count {
                    let sub = Rect::new(
                        x as Dbu * self.site_width,
                        y as Dbu * info.row_height,
                        (x + 1) as Dbu * self.site_width,
                        (y + 1) as Dbu * info.row_height,
                    );
                    for group in groups {
                        for rect in &group.regions {
                            if !rect.contains(&sub) && rect.overlaps(&sub) {
                                if let Some(pixel) = self.pixel_mut(layer, x, y) {
                                    pixel.util = 0.0;
                                    pixel.is_valid = false;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Rasterize the group regions onto the layer of each group's cells:
    /// fully covered pixels take the group tag, partially covered pixels
    /// become invalid.
    pub fn group_init_pixels(&mut self, groups: &[Group], cells: &[Cell]) {
        for layer_pixels in &mut self.pixels {
            for pixel in layer_pixels.iter_mut() {
                pixel.util = 0.0;
            }
        }
        for group in groups {
            let Some(&first) = group.members.first() else {
                warn!(group = %group.name, "no cells found in group");
                continue;
            };
            let layer = cells[first.0].layer;
            let row_height = self.infos[layer].row_height;
            let site_width = self.site_width;

            for rect in &group.regions {
                let row_start = div_ceil(rect.y_min, row_height) as i32;
                let row_end = div_floor(rect.y_max, row_height) as i32;
                let col_start = div_ceil(rect.x_min, site_width) as i32;
                let col_end = div_floor(rect.x_max, site_width) as i32;
                for k in row_start..row_end {
                    for l in col_start..col_end {
                        if let Some(pixel) = self.pixel_mut(layer, l, k) {
                            pixel.util += 1.0;
                        }
                    }
                    // Fractional site coverage at the vertical edges.
                    if rect.x_min % site_width != 0 {
                        if let Some(pixel) = self.pixel_mut(layer, col_start, k) {
                            pixel.util -= (rect.x_min % site_width) as f64 / site_width as f64;
                        }
                    }
                    if rect.x_max % site_width != 0 {
                        if let Some(pixel) = self.pixel_mut(layer, col_end - 1, k) {
                            pixel.util -= ((site_width - rect.x_max % site_width) % site_width)
                                as f64
                                / site_width as f64;
                        }
                    }
                }
            }
            for rect in &group.regions {
                let row_start = div_ceil(rect.y_min, row_height) as i32;
                let row_end = div_floor(rect.y_max, row_height) as i32;
                let col_start = div_ceil(rect.x_min, site_width) as i32;
                let col_end = div_floor(rect.x_max, site_width) as i32;
                for k in row_start..row_end {
                    for l in col_start..col_end {
                        let Some(pixel) = self.pixel_mut(layer, l, k) else {
                            continue;
                        };
                        if pixel.util == 1.0 {
                            pixel.group = Some(group.id);
                            pixel.is_valid = true;
                        } else if pixel.util > 0.0 && pixel.util < 1.0 {
                            pixel.is_valid = false;
                            pixel.util = 0.0;
                        }
                    }
                }
            }
        }
    }

    /// Valid pixels carrying this group's tag on `layer`, for the
    /// utilization bookkeeping.
    pub fn group_pixel_count(&self, layer: usize, group: GroupId) -> i64 {
        self.pixels[layer]
            .iter()
            .filter(|p| p.is_valid && p.group == Some(group))
            .count() as i64
    }
}
