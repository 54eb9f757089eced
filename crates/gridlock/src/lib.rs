//! Detailed standard-cell placement legalization.
//!
//! Takes the approximate cell locations produced by a global placer and
//! snaps every movable cell onto a legal row-and-site position:
//! - inside the core, aligned to the site and row grid,
//! - free of overlaps, across mixed row heights,
//! - honoring region-group constraints,
//! - with best-effort minimal displacement from the initial locations.
//!
//! The engine is a grid-based search: an occupancy grid with one layer
//! per cell height, a diamond search that enumerates candidate sites in
//! expanding L1 rings, a shift-move fallback that evicts and re-places
//! neighbors, and a displacement-reducing swap pass for region groups.
//!
//! ```no_run
//! use gridlock::{Design, Legalizer, LegalizerConfig};
//!
//! # fn load_design() -> Design { unimplemented!() }
//! let design = load_design();
//! let mut legalizer = Legalizer::new(LegalizerConfig::default());
//! let result = legalizer.legalize(&design).unwrap();
//! for placement in &result.placements {
//!     println!("{} -> ({}, {})", placement.name, placement.x, placement.y);
//! }
//! ```

pub mod config;
pub mod design;
pub mod error;
pub mod geom;
pub mod legalizer;
pub mod observer;

mod cell;
mod grid;

pub use config::LegalizerConfig;
pub use design::{Design, Instance, Master, MasterKind, Orient, Power, RegionGroup, Row};
pub use error::{LegalizeError, Result};
pub use legalizer::{DisplacementStats, Legalization, Legalizer, Placement};
pub use observer::PlacementObserver;
