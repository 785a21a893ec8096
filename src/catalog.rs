use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::pricing::{client_price, CatalogItem, PriceTier, Trade};

/// Profit applied to subcontracted items when the profile sets none.
pub fn default_profit_percent(trade: Trade) -> f64 {
    match trade {
        Trade::Electrical | Trade::Plumbing => 40.0,
        Trade::Paint => 45.0,
        Trade::Tiling => 35.0,
        Trade::Demolition | Trade::Construction => 30.0,
    }
}

fn subcontracted(id: &str, name: &str, sub_category: &str, unit: &str, cost: f64) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        sub_category: Some(sub_category.to_string()),
        is_active: true,
        contractor_cost_per_unit: Some(cost),
        ..Default::default()
    }
}

fn tiers(rows: &[(f64, f64)]) -> Vec<PriceTier> {
    rows.iter()
        .map(|(max, price)| PriceTier {
            max: *max,
            price: *price,
            prices_by_layer: BTreeMap::new(),
        })
        .collect()
}

fn paint_items() -> Vec<CatalogItem> {
    let paint = |id: &str, name: &str, bucket: f64, coverage: f64, day: f64, output: f64| {
        CatalogItem {
            id: id.to_string(),
            name: name.to_string(),
            unit: "m2".to_string(),
            sub_category: Some("paint".to_string()),
            is_active: true,
            bucket_price: bucket,
            coverage,
            worker_daily_cost: day,
            daily_output: output,
            ..Default::default()
        }
    };
    vec![
        CatalogItem {
            equipment_cost: 5.0,
            desired_profit_percent: Some(45.0),
            ..paint("default_pnt_1", "Interior wall acrylic", 180.0, 40.0, 400.0, 60.0)
        },
        CatalogItem {
            equipment_cost: 5.0,
            desired_profit_percent: Some(50.0),
            ..paint("default_pnt_2", "Ceiling supercryl", 220.0, 35.0, 400.0, 50.0)
        },
        CatalogItem {
            sub_category: Some("plaster".to_string()),
            equipment_cost: 10.0,
            desired_profit_percent: Some(40.0),
            ..paint("default_pnt_3", "Exterior acrylic plaster", 250.0, 20.0, 450.0, 30.0)
        },
        CatalogItem {
            price_tiers: tiers(&[(50.0, 45.0), (150.0, 38.0), (400.0, 32.0)]),
            customer_price: Some(35.0),
            ..paint("default_pnt_4", "Repaint, tiered", 180.0, 40.0, 400.0, 60.0)
        },
    ]
}

fn tiling_items() -> Vec<CatalogItem> {
    let tile = |id: &str, name: &str, material: f64, additional: f64, profit: f64| CatalogItem {
        id: id.to_string(),
        name: name.to_string(),
        unit: "m2".to_string(),
        sub_category: Some("tiling".to_string()),
        is_active: true,
        material_cost: material,
        additional_cost: additional,
        wastage_percent: 10.0,
        daily_output: 20.0,
        labor_cost_per_day: 800.0,
        desired_profit_percent: Some(profit),
        ..Default::default()
    };
    vec![
        CatalogItem {
            has_panel: true,
            ..tile("default_til_1", "Porcelain granite 60x60", 80.0, 10.0, 35.0)
        },
        CatalogItem {
            sub_category: Some("cladding".to_string()),
            ..tile("default_til_2", "Wall ceramic 30x60", 60.0, 8.0, 40.0)
        },
        CatalogItem {
            daily_output: 15.0,
            has_panel: true,
            ..tile("default_til_3", "Large porcelain 120x60 premium", 150.0, 15.0, 30.0)
        },
    ]
}

fn demolition_items() -> Vec<CatalogItem> {
    let demo = |id: &str, name: &str, unit: &str, output: f64, tiers_rows: &[(f64, f64)]| CatalogItem {
        id: id.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        sub_category: Some("demolition".to_string()),
        is_active: true,
        worker_daily_cost: 450.0,
        daily_output: output,
        price_tiers: tiers(tiers_rows),
        ..Default::default()
    };
    vec![
        demo("dm_floor_1", "Floor tile removal", "m2", 25.0, &[(20.0, 60.0), (60.0, 50.0)]),
        demo("dm_wall_1", "Wall cladding removal", "m2", 30.0, &[(20.0, 55.0), (60.0, 45.0)]),
        demo("dm_block_1", "Block partition demolition", "m2", 12.0, &[(10.0, 120.0), (40.0, 100.0)]),
    ]
}

fn electrical_items() -> Vec<CatalogItem> {
    vec![
        subcontracted("el_pt_1", "Standard power point", "points", "point", 120.0),
        subcontracted("el_pt_2", "16A power socket point", "points", "point", 180.0),
        subcontracted("el_pt_3", "Single socket", "points", "point", 350.0),
        subcontracted("el_pt_4", "Double socket", "points", "point", 450.0),
        subcontracted("el_pt_11", "Three-phase socket 3x16A", "points", "point", 1300.0),
        subcontracted("el_lgt_1", "Light fixture installation", "lighting", "unit", 150.0),
        subcontracted("el_lgt_2", "Spotlight installation", "lighting", "unit", 90.0),
        subcontracted("el_lgt_3", "Light point", "lighting", "point", 380.0),
        subcontracted("el_pnl_1", "Panel upgrade", "panels", "set", 1500.0),
        subcontracted("el_pnl_2", "Three-phase panel up to 48 slots", "panels", "set", 6000.0),
        subcontracted("el_com_1", "RJ45 data point", "communications", "point", 130.0),
        subcontracted("el_rep_1", "Short circuit trace and repair", "repairs", "service", 220.0),
        subcontracted("el_rep_5", "RCD replacement", "repairs", "unit", 380.0),
    ]
}

fn plumbing_items() -> Vec<CatalogItem> {
    vec![
        subcontracted("pl_san_1", "Toilet installation", "sanitary", "unit", 350.0),
        subcontracted("pl_san_2", "Washbasin installation", "sanitary", "unit", 280.0),
        subcontracted("pl_san_3", "Shower mixer installation", "sanitary", "unit", 320.0),
        subcontracted("pl_con_1", "Water point", "connections", "point", 180.0),
        subcontracted("pl_con_2", "Drain point", "connections", "point", 200.0),
        subcontracted("pl_con_3", "Washing machine connection", "connections", "point", 220.0),
    ]
}

fn construction_items() -> Vec<CatalogItem> {
    // Construction work is quoted per job; costs start at zero until the
    // contractor fills them in.
    let rows: [(&str, &str, &str, &str); 8] = [
        ("cn_walls_1", "Block wall 10cm (partition)", "walls", "m2"),
        ("cn_walls_2", "Block wall 20cm (load bearing)", "walls", "m2"),
        ("cn_walls_5", "Drywall, single sided", "walls", "m2"),
        ("cn_ceil_1", "Smooth drywall ceiling", "ceilings", "m2"),
        ("cn_flvl_1", "Self-levelling screed up to 5mm", "floor_leveling", "m2"),
        ("cn_conc_1", "Concrete slab B30, 10cm", "concrete", "m2"),
        ("cn_wat_1", "Roof waterproofing, 5mm bitumen sheets", "waterproofing", "m2"),
        ("cn_wat_2", "Wet room cementitious waterproofing", "waterproofing", "m2"),
    ];
    rows.iter()
        .map(|(id, name, sub, unit)| subcontracted(id, name, sub, unit, 0.0))
        .collect()
}

pub fn default_items(trade: Trade) -> Vec<CatalogItem> {
    match trade {
        Trade::Paint => paint_items(),
        Trade::Tiling => tiling_items(),
        Trade::Demolition => demolition_items(),
        Trade::Electrical => electrical_items(),
        Trade::Plumbing => plumbing_items(),
        Trade::Construction => construction_items(),
    }
}

fn with_client_price(mut item: CatalogItem, profit_percent: f64) -> CatalogItem {
    if let Some(cost) = item.contractor_cost_per_unit {
        item.client_price_per_unit = Some(client_price(cost, profit_percent));
    }
    item
}

/// Seeds an empty catalog with the trade defaults, or appends defaults whose
/// id is missing. Existing items are never touched. Returns the merged list
/// and the number of items added.
pub fn merge_defaults(
    existing: Vec<CatalogItem>,
    trade: Trade,
    profit_percent: f64,
) -> (Vec<CatalogItem>, usize) {
    let known: HashSet<String> = existing.iter().map(|i| i.id.clone()).collect();
    let missing: Vec<CatalogItem> = default_items(trade)
        .into_iter()
        .filter(|i| !known.contains(&i.id))
        .map(|i| with_client_price(i, profit_percent))
        .collect();
    let added = missing.len();
    let mut merged = existing;
    merged.extend(missing);
    (merged, added)
}
