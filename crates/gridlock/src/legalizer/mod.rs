//! The placement legalizer.
//!
//! Orchestrates a legalization session: builds the cell arena and the
//! occupancy grid, paints fixed cells, conditions region-group pixels,
//! runs the group passes, then the main placement pass, and finally
//! collects the result.
//!
//! The session is a value constructed per call; there is no global
//! state and two runs with the same input and seed produce identical
//! placements.

mod groups;
mod place;
mod search;
mod swap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cell::{Cell, CellId, Group, GroupId};
use crate::config::LegalizerConfig;
use crate::design::{Design, MasterKind, Orient, Power};
use crate::error::{LegalizeError, Result};
use crate::geom::{div_round, Dbu};
use crate::grid::Grid;
use crate::observer::PlacementObserver;

/// Final location of one instance, in absolute design units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    /// Index of the instance in the input design.
    pub inst: usize,
    pub name: String,
    pub x: Dbu,
    pub y: Dbu,
    /// Orientation of the landing row.
    pub orient: Orient,
    /// Power rail at the top edge of the landing row.
    pub top_power: Power,
}

/// Displacement summary over all cells, in design units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DisplacementStats {
    pub sum: Dbu,
    pub avg: Dbu,
    pub max: Dbu,
}

/// Result of a legalization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Legalization {
    /// One entry per movable standard cell.
    pub placements: Vec<Placement>,
    /// Names of instances no pass could place. Non-empty results are
    /// still returned; deciding whether that is fatal is the caller's
    /// business.
    pub failures: Vec<String>,
    pub stats: DisplacementStats,
}

/// Detailed-placement legalizer.
pub struct Legalizer {
    cfg: LegalizerConfig,
    observer: Option<Box<dyn PlacementObserver>>,
}

impl Legalizer {
    pub fn new(cfg: LegalizerConfig) -> Self {
        Self {
            cfg,
            observer: None,
        }
    }

    /// Install a debug observer notified as cells are placed.
    pub fn with_observer(mut self, observer: Box<dyn PlacementObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Legalize a design. The input is read-only; the returned
    /// [`Legalization`] carries the final coordinates.
    pub fn legalize(&mut self, design: &Design) -> Result<Legalization> {
        let mut session = Session::new(design, &self.cfg, self.observer.as_deref_mut())?;
        session.run()
    }
}

/// All mutable state of one legalization call.
pub(crate) struct Session<'a> {
    pub(crate) cfg: &'a LegalizerConfig,
    pub(crate) grid: Grid,
    pub(crate) cells: Vec<Cell>,
    pub(crate) groups: Vec<Group>,
    pub(crate) failures: Vec<CellId>,
    pub(crate) observer: Option<&'a mut (dyn PlacementObserver + 'static)>,
    pub(crate) have_multi_row: bool,
    pub(crate) bin_search_width: i32,
    core_x: Dbu,
    core_y: Dbu,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        design: &Design,
        cfg: &'a LegalizerConfig,
        observer: Option<&'a mut (dyn PlacementObserver + 'static)>,
    ) -> Result<Session<'a>> {
        // The grid and the arena below both dereference masters.
        for inst in &design.insts {
            if inst.master >= design.masters.len() {
                return Err(LegalizeError::BadMaster {
                    inst: inst.name.clone(),
                    index: inst.master,
                });
            }
        }
        let grid = Grid::new(design, cfg)?;

        // Cell arena. Ignored masters never become cells.
        let mut cells: Vec<Cell> = Vec::new();
        let mut cell_of_inst: Vec<Option<CellId>> = vec![None; design.insts.len()];
        let mut have_multi_row = false;
        for (inst_idx, inst) in design.insts.iter().enumerate() {
            let master = design.master_of(inst);
            if master.kind == MasterKind::Ignored {
                continue;
            }
            let id = CellId(cells.len());
            let is_fixed = inst.fixed || master.kind == MasterKind::Block;
            let is_multi_row = master.height > design.row_height;
            if !is_fixed && is_multi_row {
                have_multi_row = true;
            }
            let x = inst.x - design.core.x_min;
            let y = inst.y - design.core.y_min;
            cells.push(Cell {
                id,
                inst: inst_idx,
                name: inst.name.clone(),
                kind: master.kind,
                x,
                y,
                init_x: x,
                init_y: y,
                width: master.width,
                height: master.height,
                orient: Orient::R0,
                layer: grid.layer_of_height(master.height).unwrap_or(0),
                is_multi_row,
                is_fixed,
                is_placed: is_fixed,
                hold: false,
                group: None,
                region: None,
            });
            cell_of_inst[inst_idx] = Some(id);
        }

        // Region groups, resolved to cell ids and the core-origin frame.
        let mut groups: Vec<Group> = Vec::new();
        for region_group in &design.groups {
            let gid = GroupId(groups.len());
            let mut members = Vec::new();
            for &inst_idx in &region_group.members {
                if inst_idx >= design.insts.len() {
                    return Err(LegalizeError::BadGroupMember {
                        group: region_group.name.clone(),
                        index: inst_idx,
                    });
                }
                if let Some(id) = cell_of_inst[inst_idx] {
                    cells[id.0].group = Some(gid);
                    members.push(id);
                }
            }
            let regions: Vec<_> = region_group
                .regions
                .iter()
                .map(|r| r.shifted(design.core.x_min, design.core.y_min))
                .collect();
            let mut boundary = regions.first().copied().unwrap_or_default();
            for rect in &regions {
                boundary.merge(rect);
            }
            groups.push(Group {
                id: gid,
                name: region_group.name.clone(),
                regions,
                boundary,
                members,
                util: 0.0,
            });
        }

        let bin_search_width = cfg
            .bin_search_width
            .unwrap_or_else(|| 5 * div_round(design.row_height, design.site_width) as i32)
            .max(1);

        Ok(Session {
            cfg,
            grid,
            cells,
            groups,
            failures: Vec::new(),
            observer,
            have_multi_row,
            bin_search_width,
            core_x: design.core.x_min,
            core_y: design.core.y_min,
        })
    }

    pub(crate) fn run(&mut self) -> Result<Legalization> {
        if let Some(observer) = self.observer.as_mut() {
            observer.start_placement();
        }

        self.check_utilization()?;

        // Fixed cells first, so the searches see them.
        for i in 0..self.cells.len() {
            if self.cells[i].is_fixed {
                self.grid.paint_fixed(&self.cells[i]);
            }
        }
        self.grid.group_init_edge_pixels(&self.groups);
        self.grid.group_init_pixels(&self.groups, &self.cells);

        if !self.groups.is_empty() {
            self.place_groups()?;
        }
        self.place()?;

        if let Some(observer) = self.observer.as_mut() {
            observer.end_placement();
        }

        Ok(self.collect())
    }

    /// Movable cell area against the free area of the core grid.
    fn check_utilization(&self) -> Result<()> {
        let info = self.grid.info(0);
        let design_area = info.row_count as i64
            * info.site_count as i64
            * self.grid.site_width
            * self.grid.row_height;
        let mut movable_area = 0i64;
        let mut fixed_area = 0i64;
        for cell in &self.cells {
            if cell.is_fixed {
                fixed_area += cell.area();
            } else {
                movable_area += cell.area();
            }
        }
        let free = design_area - fixed_area;
        if free <= 0 && movable_area > 0 {
            return Err(LegalizeError::UtilizationExceeded(f64::INFINITY));
        }
        let util = movable_area as f64 / free as f64;
        debug!(util, "design utilization");
        if util > 1.0 {
            return Err(LegalizeError::UtilizationExceeded(util * 100.0));
        }
        Ok(())
    }

    fn collect(&self) -> Legalization {
        let mut placements = Vec::new();
        for cell in &self.cells {
            if !cell.is_fixed && cell.is_std() {
                let base_row = crate::geom::div_floor(cell.y, self.grid.row_height) as i32;
                placements.push(Placement {
                    inst: cell.inst,
                    name: cell.name.clone(),
                    x: self.core_x + cell.x,
                    y: self.core_y + cell.y,
                    orient: cell.orient,
                    top_power: self.grid.row_top_power(base_row),
                });
            }
        }

        let mut stats = DisplacementStats::default();
        for cell in &self.cells {
            let disp = cell.disp();
            stats.sum += disp;
            stats.max = stats.max.max(disp);
        }
        if !self.cells.is_empty() {
            stats.avg = stats.sum / self.cells.len() as i64;
        }

        let failures = self
            .failures
            .iter()
            .map(|id| self.cells[id.0].name.clone())
            .collect();

        Legalization {
            placements,
            failures,
            stats,
        }
    }

    // ---- shared helpers --------------------------------------------------

    /// The vertical search budget of a cell, in rows of its own layer.
    /// The configured budget is expressed in base-row units and scaled
    /// down for taller cells, floored.
    pub(crate) fn scaled_max_displacement_y(&self, cell: &Cell) -> i32 {
        let base = self.grid.row_height;
        let cell_height = self.grid.info(cell.layer).row_height;
        (self.cfg.max_displacement_y as i64 * base / cell_height) as i32
    }

    pub(crate) fn notify_place(&mut self, id: CellId) {
        if let Some(observer) = self.observer.as_mut() {
            let cell = &self.cells[id.0];
            observer.place_instance(&cell.name, cell.x, cell.y);
        }
    }
}
