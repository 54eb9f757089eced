//! End-to-end legalization scenarios.

use gridlock::{
    Design, Instance, Legalization, Legalizer, LegalizerConfig, Master, MasterKind, Orient,
    RegionGroup, Row,
};
use gridlock::geom::{Dbu, Rect};

const SITE: Dbu = 200;
const ROW: Dbu = 1000;

/// A rectangular core of `sites` x `rows`, fully covered by rows.
fn core_design(sites: i32, rows: i32) -> Design {
    Design {
        core: Rect::new(0, 0, sites as Dbu * SITE, rows as Dbu * ROW),
        site_width: SITE,
        row_height: ROW,
        rows: (0..rows)
            .map(|r| Row {
                x: 0,
                y: r as Dbu * ROW,
                site_count: sites,
                height: ROW,
            })
            .collect(),
        masters: vec![],
        insts: vec![],
        groups: vec![],
    }
}

fn std_master(design: &mut Design, name: &str, sites: Dbu, rows: Dbu) -> usize {
    design.masters.push(Master {
        name: name.into(),
        width: sites * SITE,
        height: rows * ROW,
        kind: MasterKind::Std,
    });
    design.masters.len() - 1
}

fn add_inst(design: &mut Design, name: &str, master: usize, x: Dbu, y: Dbu, fixed: bool) -> usize {
    design.insts.push(Instance {
        name: name.into(),
        master,
        x,
        y,
        fixed,
    });
    design.insts.len() - 1
}

fn legalize(design: &Design) -> Legalization {
    Legalizer::new(LegalizerConfig::default())
        .legalize(design)
        .expect("legalization failed")
}

fn placement_of<'a>(result: &'a Legalization, name: &str) -> &'a gridlock::Placement {
    result
        .placements
        .iter()
        .find(|p| p.name == name)
        .unwrap_or_else(|| panic!("no placement for {name}"))
}

/// Alignment, containment and pairwise non-overlap over the final
/// placements.
fn assert_legal(design: &Design, result: &Legalization) {
    let mut rects: Vec<(String, Rect)> = Vec::new();
    for placement in &result.placements {
        let inst = &design.insts[placement.inst];
        let master = design.master_of(inst);
        assert_eq!(
            (placement.x - design.core.x_min) % design.site_width,
            0,
            "{} off the site grid",
            placement.name
        );
        assert_eq!(
            (placement.y - design.core.y_min) % master.height,
            0,
            "{} off the row grid",
            placement.name
        );
        assert!(
            placement.x >= design.core.x_min
                && placement.x + master.width <= design.core.x_max
                && placement.y >= design.core.y_min
                && placement.y + master.height <= design.core.y_max,
            "{} outside the core",
            placement.name
        );
        rects.push((
            placement.name.clone(),
            Rect::new(
                placement.x,
                placement.y,
                placement.x + master.width,
                placement.y + master.height,
            ),
        ));
    }
    for inst in design.insts.iter().filter(|i| i.fixed) {
        let master = design.master_of(inst);
        rects.push((
            inst.name.clone(),
            Rect::new(inst.x, inst.y, inst.x + master.width, inst.y + master.height),
        ));
    }
    for i in 0..rects.len() {
        for j in i + 1..rects.len() {
            assert!(
                !rects[i].1.overlaps(&rects[j].1),
                "{} overlaps {}",
                rects[i].0,
                rects[j].0
            );
        }
    }
}

#[test]
fn single_cell_snaps_to_nearest_site() {
    let mut design = core_design(10, 1);
    let m = std_master(&mut design, "STD2", 2, 1);
    add_inst(&mut design, "u0", m, 450, 0, false);

    let result = legalize(&design);
    assert!(result.failures.is_empty());
    let p = placement_of(&result, "u0");
    assert_eq!((p.x, p.y), (400, 0));
    assert_eq!(p.orient, Orient::R0);
    assert_legal(&design, &result);
}

#[test]
fn half_site_ties_round_away_from_zero() {
    let mut design = core_design(10, 1);
    let m = std_master(&mut design, "STD2", 2, 1);
    add_inst(&mut design, "u0", m, 500, 0, false);

    let result = legalize(&design);
    // 500 / 200 = 2.5: round half away from zero lands on site 3.
    assert_eq!(placement_of(&result, "u0").x, 600);
}

#[test]
fn exact_fit_chain_does_not_move() {
    let mut design = core_design(4, 1);
    let m = std_master(&mut design, "STD1", 1, 1);
    for (i, x) in [0, 200, 400, 600].into_iter().enumerate() {
        add_inst(&mut design, &format!("u{i}"), m, x, 0, false);
    }

    let result = legalize(&design);
    assert!(result.failures.is_empty());
    for (i, x) in [0, 200, 400, 600].into_iter().enumerate() {
        assert_eq!(placement_of(&result, &format!("u{i}")).x, x);
    }
    assert_eq!(result.stats.sum, 0);
    assert_legal(&design, &result);
}

#[test]
fn displaced_chain_snaps_without_overlap() {
    let mut design = core_design(4, 1);
    let m = std_master(&mut design, "STD1", 1, 1);
    for (i, x) in [50, 250, 450, 650].into_iter().enumerate() {
        add_inst(&mut design, &format!("u{i}"), m, x, 0, false);
    }

    let result = legalize(&design);
    assert!(result.failures.is_empty());
    let mut xs: Vec<Dbu> = result.placements.iter().map(|p| p.x).collect();
    xs.sort_unstable();
    assert_eq!(xs, vec![0, 200, 400, 600]);
    assert_legal(&design, &result);
}

#[test]
fn colliding_cells_spread_to_free_sites() {
    let mut design = core_design(2, 1);
    let m = std_master(&mut design, "STD1", 1, 1);
    add_inst(&mut design, "a", m, 0, 0, false);
    add_inst(&mut design, "b", m, 0, 0, false);

    let result = legalize(&design);
    assert!(result.failures.is_empty());
    let mut xs: Vec<Dbu> = result.placements.iter().map(|p| p.x).collect();
    xs.sort_unstable();
    assert_eq!(xs, vec![0, 200]);
    assert_legal(&design, &result);
}

#[test]
fn unplaceable_cell_is_reported_not_fatal() {
    // The whole core belongs to a region group, so the groupless cell
    // has nowhere to go.
    let mut design = core_design(10, 1);
    let m = std_master(&mut design, "STD1", 1, 1);
    let g = add_inst(&mut design, "g0", m, 0, 0, false);
    add_inst(&mut design, "b", m, 1000, 0, false);
    design.groups.push(RegionGroup {
        name: "g".into(),
        regions: vec![Rect::new(0, 0, 2000, 1000)],
        members: vec![g],
    });

    let result = legalize(&design);
    assert_eq!(result.failures, vec!["b".to_string()]);
}

#[test]
fn group_members_land_inside_region_and_outsiders_leave() {
    let mut design = core_design(10, 2);
    let m = std_master(&mut design, "STD1", 1, 1);
    let g1 = add_inst(&mut design, "g1", m, 0, 0, false);
    let g2 = add_inst(&mut design, "g2", m, 1800, 0, false);
    add_inst(&mut design, "o", m, 1000, 500, false);
    let region = Rect::new(800, 0, 1600, 2000);
    design.groups.push(RegionGroup {
        name: "g".into(),
        regions: vec![region],
        members: vec![g1, g2],
    });

    let result = legalize(&design);
    assert!(result.failures.is_empty());
    for name in ["g1", "g2"] {
        let p = placement_of(&result, name);
        let master = &design.masters[0];
        assert!(
            p.x >= region.x_min
                && p.x + master.width <= region.x_max
                && p.y >= region.y_min
                && p.y + master.height <= region.y_max,
            "{name} landed outside its region"
        );
    }
    let o = placement_of(&result, "o");
    let o_rect = Rect::new(o.x, o.y, o.x + SITE, o.y + ROW);
    assert!(!region.overlaps(&o_rect), "outsider left inside the region");
    assert_legal(&design, &result);
}

#[test]
fn fixed_cells_never_move() {
    let mut design = core_design(10, 2);
    let m = std_master(&mut design, "STD2", 2, 1);
    add_inst(&mut design, "anchor", m, 800, 1000, true);
    add_inst(&mut design, "u0", m, 850, 1000, false);

    let result = legalize(&design);
    // Fixed instances are not reported and not repositioned; the
    // movable cell avoids the anchor's sites.
    assert!(result.placements.iter().all(|p| p.name != "anchor"));
    assert_legal(&design, &result);
}

#[test]
fn cell_under_macro_escapes_to_free_row() {
    let mut design = core_design(10, 2);
    let m = std_master(&mut design, "STD1", 1, 1);
    design.masters.push(Master {
        name: "RAM".into(),
        width: 2000,
        height: 1000,
        kind: MasterKind::Block,
    });
    add_inst(&mut design, "ram", 1, 0, 0, true);
    add_inst(&mut design, "u0", m, 400, 0, false);

    let result = legalize(&design);
    assert!(result.failures.is_empty());
    let p = placement_of(&result, "u0");
    assert_eq!(p.y, 1000, "cell must leave the macro row");
    assert_eq!(p.orient, Orient::MX);
    assert_legal(&design, &result);
}

#[test]
fn multi_row_cells_block_both_rows() {
    let mut design = core_design(10, 4);
    let single = std_master(&mut design, "STD1", 1, 1);
    let tall = std_master(&mut design, "TALL", 1, 2);
    add_inst(&mut design, "t", tall, 0, 0, false);
    add_inst(&mut design, "s1", single, 0, 0, false);
    add_inst(&mut design, "s2", single, 0, 1000, false);

    let result = legalize(&design);
    assert!(result.failures.is_empty());
    let t = placement_of(&result, "t");
    assert_eq!((t.x, t.y), (0, 0));
    // The tall cell owns sites in both rows; the single-row cells must
    // land beside it, not inside it.
    for name in ["s1", "s2"] {
        let p = placement_of(&result, name);
        assert!(p.x >= 200, "{name} overlaps the tall cell");
    }
    assert_legal(&design, &result);
}

#[test]
fn same_seed_same_placement() {
    let mut design = core_design(12, 3);
    let m = std_master(&mut design, "STD1", 1, 1);
    let mut members = Vec::new();
    for i in 0..6 {
        members.push(add_inst(
            &mut design,
            &format!("g{i}"),
            m,
            (i as Dbu) * 170 + 30,
            ((i % 3) as Dbu) * 900,
            false,
        ));
    }
    for i in 0..4 {
        add_inst(&mut design, &format!("u{i}"), m, 2000 - (i as Dbu) * 130, 2500, false);
    }
    design.groups.push(RegionGroup {
        name: "g".into(),
        regions: vec![Rect::new(0, 0, 1200, 2000)],
        members,
    });

    let first = legalize(&design);
    let second = legalize(&design);
    let coords = |r: &Legalization| -> Vec<(String, Dbu, Dbu)> {
        r.placements
            .iter()
            .map(|p| (p.name.clone(), p.x, p.y))
            .collect()
    };
    assert_eq!(coords(&first), coords(&second));
    assert_legal(&design, &first);
}

#[test]
fn displacement_stays_within_budget_on_open_core() {
    let mut design = core_design(20, 4);
    let m = std_master(&mut design, "STD1", 1, 1);
    for i in 0..10 {
        add_inst(
            &mut design,
            &format!("u{i}"),
            m,
            (i as Dbu) * 390 + 70,
            ((i % 4) as Dbu) * 960 + 40,
            false,
        );
    }
    let cfg = LegalizerConfig::default();
    let result = Legalizer::new(cfg.clone()).legalize(&design).unwrap();
    assert!(result.failures.is_empty());
    for p in &result.placements {
        let inst = &design.insts[p.inst];
        assert!(
            (p.x - inst.x).abs() <= cfg.max_displacement_x as Dbu * SITE,
            "{} exceeded the horizontal budget",
            p.name
        );
        assert!(
            (p.y - inst.y).abs() <= cfg.max_displacement_y as Dbu * ROW,
            "{} exceeded the vertical budget",
            p.name
        );
    }
    assert_legal(&design, &result);
}

#[test]
fn oversized_cell_is_a_configuration_error() {
    let mut design = core_design(4, 2);
    let m = std_master(&mut design, "WIDE", 5, 1);
    add_inst(&mut design, "wide", m, 0, 0, false);

    let err = Legalizer::new(LegalizerConfig::default())
        .legalize(&design)
        .unwrap_err();
    assert!(matches!(
        err,
        gridlock::LegalizeError::DoesNotFit(ref name) if name == "wide"
    ));
}

#[test]
fn dangling_master_reference_is_a_configuration_error() {
    let mut design = core_design(4, 1);
    design.insts.push(Instance {
        name: "ghost".into(),
        master: 7,
        x: 0,
        y: 0,
        fixed: false,
    });

    let err = Legalizer::new(LegalizerConfig::default())
        .legalize(&design)
        .unwrap_err();
    assert!(matches!(
        err,
        gridlock::LegalizeError::BadMaster { ref inst, index: 7 } if inst == "ghost"
    ));
}

#[test]
fn overfull_core_is_a_configuration_error() {
    let mut design = core_design(1, 1);
    let m = std_master(&mut design, "STD1", 1, 1);
    add_inst(&mut design, "a", m, 0, 0, false);
    add_inst(&mut design, "b", m, 0, 0, false);

    let err = Legalizer::new(LegalizerConfig::default())
        .legalize(&design)
        .unwrap_err();
    assert!(matches!(
        err,
        gridlock::LegalizeError::UtilizationExceeded(_)
    ));
}

#[test]
fn orientation_follows_landing_row() {
    let mut design = core_design(4, 4);
    let m = std_master(&mut design, "STD1", 1, 1);
    for i in 0..4 {
        add_inst(&mut design, &format!("u{i}"), m, 0, (i as Dbu) * ROW, false);
    }

    let result = legalize(&design);
    for (i, orient) in [Orient::R0, Orient::MX, Orient::R0, Orient::MX]
        .into_iter()
        .enumerate()
    {
        let p = placement_of(&result, &format!("u{i}"));
        assert_eq!(p.y, i as Dbu * ROW);
        assert_eq!(p.orient, orient);
    }
}
