//! Legalizer configuration.
//!
//! Every tunable that shapes the search or the group passes lives here.
//! The defaults reproduce the historical behavior of the algorithm;
//! changing any of them changes the output placement, so callers must
//! opt in explicitly.

use serde::{Deserialize, Serialize};

/// Configuration for a legalization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalizerConfig {
    /// Maximum horizontal displacement of the diamond search, in sites.
    pub max_displacement_x: i32,
    /// Maximum vertical displacement, in row units of the base row
    /// height. For taller cells the budget is scaled down by
    /// `base_row_height / cell_row_height`, floored.
    pub max_displacement_y: i32,
    /// Empty sites reserved left of every padded standard cell.
    pub pad_left: i32,
    /// Empty sites reserved right of every padded standard cell.
    pub pad_right: i32,
    /// Reject placements that would leave a single-site empty column
    /// abutting another cell at a corner of the footprint.
    pub disallow_one_site_gaps: bool,
    /// Length of the horizontal bin scan at each diamond-search
    /// candidate, in sites. `None` selects the built-in default of
    /// five row-height-equivalents of sites.
    pub bin_search_width: Option<i32>,
    /// Shift-move evicts every movable cell within this many padded
    /// cell widths horizontally (and the same count of rows vertically)
    /// of the target point.
    pub shift_margin: i32,
    /// Group utilization above which brick packing targets the corners
    /// of the group hull rather than each cell's region.
    pub brick_util_threshold: f64,
    /// Fraction of a group's most-displaced cells given a refine move
    /// per pass.
    pub group_refine_percent: f64,
    /// Maximum refine + random-swap passes per group.
    pub refine_passes: usize,
    /// Random swap attempts per group cell in each pass.
    pub swaps_per_cell: usize,
    /// A pass producing fewer refine moves than this ends the group loop.
    pub min_refines: usize,
    /// A pass producing fewer accepted swaps than this ends the group loop.
    pub min_swaps: usize,
    /// Seed for the random-swap generator. Runs with equal seeds and
    /// inputs produce identical placements.
    pub rand_seed: u64,
    /// When true, row 0 has orientation `R0` and rows alternate `R0`/`MX`
    /// upward; when false the pattern starts on `MX`.
    pub row0_orient_is_r0: bool,
    /// When true, row 0 has its power rail on top; alternates per row.
    pub row0_top_power_is_vdd: bool,
}

impl Default for LegalizerConfig {
    fn default() -> Self {
        Self {
            max_displacement_x: 500,
            max_displacement_y: 100,
            pad_left: 0,
            pad_right: 0,
            disallow_one_site_gaps: false,
            bin_search_width: None,
            shift_margin: 3,
            brick_util_threshold: 0.95,
            group_refine_percent: 0.05,
            refine_passes: 3,
            swaps_per_cell: 100,
            min_refines: 10,
            min_swaps: 100,
            rand_seed: 1,
            row0_orient_is_r0: true,
            row0_top_power_is_vdd: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_legacy_values() {
        let cfg = LegalizerConfig::default();
        assert_eq!(cfg.max_displacement_x, 500);
        assert_eq!(cfg.max_displacement_y, 100);
        assert_eq!(cfg.shift_margin, 3);
        assert_eq!(cfg.refine_passes, 3);
        assert_eq!(cfg.swaps_per_cell, 100);
        assert!((cfg.brick_util_threshold - 0.95).abs() < 1e-12);
    }
}
