//! Displacement-reducing moves.
//!
//! Pairwise swaps and targeted refine moves, both accepted only when
//! they strictly reduce total L1 displacement. The bulk driver is a
//! seeded random pairing over a group; it is plain random swapping, not
//! annealing (there is no temperature and no uphill acceptance).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cell::CellId;
use crate::geom::Dbu;

use super::Session;

impl Session<'_> {
    /// Swap two cells when they are interchangeable and the exchange
    /// strictly reduces their combined displacement.
    pub(crate) fn swap_cells(&mut self, id1: CellId, id2: CellId) -> bool {
        if id1 == id2 {
            return false;
        }
        let c1 = &self.cells[id1.0];
        let c2 = &self.cells[id2.0];
        if c1.hold
            || c2.hold
            || c1.is_fixed
            || c2.is_fixed
            || c1.width != c2.width
            || c1.height != c2.height
        {
            return false;
        }
        let dist_change = c1.disp_change(c2.x, c2.y) + c2.disp_change(c1.x, c1.y);
        if dist_change >= 0 {
            return false;
        }

        let grid_x1 = self.grid.grid_padded_x(c2);
        let grid_y1 = self.grid.grid_y(c2.layer, c2.y);
        let grid_x2 = self.grid.grid_padded_x(c1);
        let grid_y2 = self.grid.grid_y(c1.layer, c1.y);

        self.grid.erase(&mut self.cells[id1.0]);
        self.grid.erase(&mut self.cells[id2.0]);
        self.grid.paint(&mut self.cells[id1.0], grid_x1, grid_y1);
        self.grid.paint(&mut self.cells[id2.0], grid_x2, grid_y2);
        true
    }

    /// Re-run the search from the cell's legal start point and move it
    /// when the result is inside the displacement budget and strictly
    /// closer to its initial location.
    pub(crate) fn refine_move(&mut self, id: CellId) -> bool {
        let cell = self.cells[id.0].clone();
        let (grid_x, grid_y) = self.legal_grid_pt_initial(&cell);
        let Some((avail_x, avail_y)) = self.diamond_search(&cell, grid_x, grid_y) else {
            return false;
        };

        let scaled_max_disp_y = self.scaled_max_displacement_y(&cell);
        if (grid_x - avail_x).abs() > self.cfg.max_displacement_x
            || (grid_y - avail_y).abs() > scaled_max_disp_y
        {
            return false;
        }

        let row_height = self.grid.info(cell.layer).row_height;
        let dist_change = cell.disp_change(
            avail_x as Dbu * self.grid.site_width,
            avail_y as Dbu * row_height,
        );
        if dist_change < 0 {
            self.grid.erase(&mut self.cells[id.0]);
            self.grid.paint(&mut self.cells[id.0], avail_x, avail_y);
            return true;
        }
        false
    }

    /// Try `swaps_per_cell` random pairings per group member, counting
    /// accepted swaps. Reseeded from the configured seed on every call,
    /// so runs are reproducible.
    pub(crate) fn random_swap(&mut self, gi: usize) -> usize {
        let members = self.groups[gi].members.clone();
        if members.is_empty() {
            return 0;
        }
        let mut rng = StdRng::seed_from_u64(self.cfg.rand_seed);
        let mut count = 0;
        for _ in 0..self.cfg.swaps_per_cell * members.len() {
            let c1 = members[rng.gen_range(0..members.len())];
            let c2 = members[rng.gen_range(0..members.len())];
            if self.swap_cells(c1, c2) {
                count += 1;
            }
        }
        count
    }
}
