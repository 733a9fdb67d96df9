//! A small surface-fire catalog shared by the unit tests.
//!
//! Reaction intensity is `1000 * load * (1 - mois) / depth`, the no-wind
//! spread rate is a hundredth of that, and the head fire spreads at
//! `no_wind * (1 + wind / 88 + slope)`.
use crate::compute::error::ComputationError;
use crate::config::properties::{Properties, PropertyValue};
use crate::model::activation::{ActivationPlan, ActivationRules};
use crate::model::condition::Condition;
use crate::model::masking::MaskRules;
use crate::store::catalog::{Catalog, ContinuousDef};
use crate::store::items::ItemList;
use crate::store::types::ReleaseRange;
use crate::store::Tree;

pub(crate) const POINT: [(&str, &str); 5] = [
    ("vSurfaceFuelBedModel", "gr2"),
    ("vSurfaceFuelLoadHerb", "1"),
    ("vSurfaceFuelMoisLiveHerb", "0.5"),
    ("vWindSpeedAtMidflame", "88"),
    ("vSiteSlopeFraction", "0.5"),
];

pub(crate) fn catalog() -> Catalog {
    let mut c = Catalog::new();

    c.add_item_list(
        ItemList::new("FuelModels")
            .with_indexed_item("101", "gr1", "Short, sparse dry climate grass", 101)
            .with_indexed_item("102", "gr2", "Low load, dry climate grass", 102)
            .with_indexed_item("141", "sh1", "Low load, dry climate shrub", 141)
            .with_indexed_item("199", "zero", "Degenerate bed without depth", 199),
    )
    .unwrap();
    c.add_item_list(
        ItemList::new("FirePhase")
            .with_indexed_item("1", "surface", "Surface fire", 0)
            .with_indexed_item("2", "crown", "Active crown fire", 3)
            .with_indexed_item("3", "torching", "Passive crown fire", 2),
    )
    .unwrap();

    // Inputs
    c.add_discrete("vSurfaceFuelBedModel", "FuelModels").unwrap();
    c.add_continuous("vSurfaceFuelLoadHerb", ContinuousDef::new("lb/ft2", 2, 0.0, 100.0).english("tons/ac", 2).metric("kg/m2", 2))
        .unwrap();
    c.add_continuous("vSurfaceFuelMoisLiveHerb", ContinuousDef::new("fraction", 2, 0.0, 3.0).english("%", 0).metric("%", 0))
        .unwrap()
        .master = Some("vSurfaceFuelLoadHerb".into());
    c.add_continuous("vWindSpeedAtMidflame", ContinuousDef::new("ft/min", 0, 0.0, 8800.0).english("mi/h", 1).metric("km/h", 1))
        .unwrap();
    c.add_continuous("vSiteSlopeFraction", ContinuousDef::new("", 2, 0.0, 10.0)).unwrap();
    c.add_continuous("vWindDirFromUpslope", ContinuousDef::new("deg", 0, 0.0, 360.0).wrapping()).unwrap();

    // Intermediates and outputs
    c.add_continuous("vSurfaceFuelBedDepth", ContinuousDef::new("ft", 2, 0.0, 10.0).metric("m", 2)).unwrap();
    c.add_continuous("vSurfaceFireReactionInt", ContinuousDef::new("Btu/ft2/min", 0, 0.0, 1.0e6).metric("kJ/m2/min", 0))
        .unwrap();
    c.add_continuous("vSurfaceFireSpreadNoWind", ContinuousDef::new("ft/min", 1, 0.0, 1.0e4).english("ch/h", 1).metric("m/min", 1))
        .unwrap();
    c.add_continuous("vSurfaceFireSpreadAtHead", ContinuousDef::new("ft/min", 1, 0.0, 1.0e4).english("ch/h", 1).metric("m/min", 1))
        .unwrap();
    c.add_continuous("vSurfaceFireFlameLeng", ContinuousDef::new("ft", 1, 0.0, 1000.0).metric("m", 1)).unwrap();
    c.add_continuous("vSurfaceFireSpreadDirFromUpslope", ContinuousDef::new("deg", 0, 0.0, 360.0).wrapping()).unwrap();
    c.add_discrete("vSurfaceFirePhase", "FirePhase").unwrap();
    c.add_text("vDocNotes").unwrap();

    c.add_equation("EqFuelBedDepth", &["vSurfaceFuelBedModel"], &["vSurfaceFuelBedDepth"], |calc| {
        let depth = match calc.input(0) as usize {
            101 => 0.4,
            102 | 141 => 1.0,
            199 => 0.0,
            other => return Err(ComputationError::equation(calc.equation(), format!("no bed depth for model {}", other))),
        };
        calc.set_output(0, depth);
        Ok(())
    })
    .unwrap();

    c.add_equation(
        "EqReactionInt",
        &["vSurfaceFuelLoadHerb", "vSurfaceFuelMoisLiveHerb", "vSurfaceFuelBedDepth"],
        &["vSurfaceFireReactionInt"],
        |calc| {
            let (load, mois, depth) = (calc.input(0), calc.input(1), calc.input(2));
            if depth <= 0.0 {
                return Err(ComputationError::equation(calc.equation(), "fuel bed depth must be positive"));
            }
            calc.set_output(0, 1000.0 * load * (1.0 - mois) / depth);
            Ok(())
        },
    )
    .unwrap();

    c.add_equation("EqSpreadNoWind", &["vSurfaceFireReactionInt"], &["vSurfaceFireSpreadNoWind"], |calc| {
        calc.set_output(0, calc.input(0) / 100.0);
        Ok(())
    })
    .unwrap();

    c.add_equation(
        "EqSpreadAtHead",
        &["vSurfaceFireSpreadNoWind", "vWindSpeedAtMidflame", "vSiteSlopeFraction"],
        &["vSurfaceFireSpreadAtHead"],
        |calc| {
            calc.set_output(0, calc.input(0) * (1.0 + calc.input(1) / 88.0 + calc.input(2)));
            Ok(())
        },
    )
    .unwrap();

    c.add_equation(
        "EqSpreadAtHeadNoSlope",
        &["vSurfaceFireSpreadNoWind", "vWindSpeedAtMidflame"],
        &["vSurfaceFireSpreadAtHead"],
        |calc| {
            calc.set_output(0, calc.input(0) * (1.0 + calc.input(1) / 88.0));
            Ok(())
        },
    )
    .unwrap();

    c.add_equation(
        "EqFlameLength",
        &["vSurfaceFireReactionInt", "vSurfaceFireSpreadAtHead"],
        &["vSurfaceFireFlameLeng"],
        |calc| {
            let intensity = (calc.input(0) * calc.input(1) / 60.0).max(0.0);
            calc.set_output(0, 0.45 * intensity.powf(0.46));
            Ok(())
        },
    )
    .unwrap()
    .release = ReleaseRange::new(1, u32::MAX);

    c.add_equation("EqSpreadDir", &["vWindDirFromUpslope"], &["vSurfaceFireSpreadDirFromUpslope"], |calc| {
        calc.set_output(0, calc.input(0).rem_euclid(360.0));
        Ok(())
    })
    .unwrap();

    c.add_equation("EqFirePhase", &["vSurfaceFireSpreadAtHead"], &["vSurfaceFirePhase"], |calc| {
        let index = if calc.input(0) > 10.0 { 3 } else { 0 };
        calc.set_output_index(0, index)
    })
    .unwrap();

    c.add_equation("EqNotes", &[], &["vDocNotes"], |calc| {
        calc.set_output_text(0, "surface fire");
        Ok(())
    })
    .unwrap();

    c.retire("vSurfaceFuelBedCoverage1");
    c
}

pub(crate) fn properties(overrides: &[(&str, bool)]) -> Properties {
    let mut props = Properties::with_defaults();
    props.insert("surfaceConfSlopeEffect", PropertyValue::Bool(true), ReleaseRange::ALWAYS);
    props.insert("surfaceCalcFlameLeng", PropertyValue::Bool(true), ReleaseRange::ALWAYS);
    props.insert("surfaceCalcSpreadDir", PropertyValue::Bool(false), ReleaseRange::ALWAYS);
    for &(key, value) in overrides {
        props.set_bool(key, value).unwrap();
    }
    props
}

pub(crate) fn activation_rules() -> ActivationRules {
    let plan = |equations: &[&str], outputs: &[&str]| ActivationPlan {
        equations: equations.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        constants: vec![],
    };
    ActivationRules::new()
        .rule(
            Condition::Always,
            plan(
                &["EqFuelBedDepth", "EqReactionInt", "EqSpreadNoWind", "EqNotes"],
                &["vSurfaceFireReactionInt", "vSurfaceFireSpreadAtHead", "vDocNotes"],
            ),
        )
        .rule(Condition::Flag("surfaceConfSlopeEffect".into()), plan(&["EqSpreadAtHead"], &[]))
        .rule(Condition::NotFlag("surfaceConfSlopeEffect".into()), plan(&["EqSpreadAtHeadNoSlope"], &[]))
        .rule(Condition::Flag("surfaceCalcFlameLeng".into()), plan(&["EqFlameLength"], &["vSurfaceFireFlameLeng"]))
        .rule(
            Condition::Flag("surfaceCalcSpreadDir".into()),
            plan(&["EqSpreadDir"], &["vSurfaceFireSpreadDirFromUpslope"]),
        )
}

pub(crate) fn mask_rules() -> MaskRules {
    MaskRules::new()
        .rule(
            Condition::Always,
            &["vSurfaceFuelBedModel", "vSurfaceFuelLoadHerb", "vWindSpeedAtMidflame", "vSiteSlopeFraction", "vWindDirFromUpslope"],
        )
        .rule(Condition::StoreNonZero("vSurfaceFuelLoadHerb".into()), &["vSurfaceFuelMoisLiveHerb"])
}

/// An instantiated, unconfigured tree with the fixture properties and masks.
pub(crate) fn tree() -> Tree {
    let mut tree = Tree::instantiate(&catalog()).unwrap();
    tree.properties = properties(&[]);
    tree.set_mask_rules(mask_rules()).unwrap();
    tree
}

/// A tree reconfigured at release 1 with the given flags.
pub(crate) fn configured_tree(flags: &[(&str, bool)]) -> Tree {
    let mut tree = tree();
    for &(key, value) in flags {
        tree.properties.set_bool(key, value).unwrap();
    }
    tree.reconfigure(1, &activation_rules()).unwrap();
    tree
}

pub(crate) fn set_stores(tree: &mut Tree, stores: &[(&str, &str)]) {
    for &(name, store) in stores {
        let id = tree.var_id(name).unwrap();
        tree.set_store(id, store).unwrap();
    }
}

/// The hand-checked point: stores and current values both set.
pub(crate) fn set_inputs(tree: &mut Tree) {
    set_stores(tree, &POINT);
    for &(name, token) in &POINT {
        let id = tree.var_id(name).unwrap();
        tree.set_leaf_token(id, token).unwrap();
    }
}
