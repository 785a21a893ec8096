#[path = "../src/pricing.rs"]
mod pricing;

use pricing::{identify_price_tier, CatalogItem, PriceTier, GENERAL_RANGE};
use std::collections::BTreeMap;

fn tier(max: f64, price: f64) -> PriceTier {
    PriceTier {
        max,
        price,
        prices_by_layer: BTreeMap::new(),
    }
}

fn item_with_tiers(tiers: Vec<PriceTier>) -> CatalogItem {
    CatalogItem {
        id: "tiered".into(),
        name: "Tiered item".into(),
        price_tiers: tiers,
        customer_price: Some(55.0),
        ..Default::default()
    }
}

#[test]
fn quantity_selects_tier_by_upper_bound() {
    let item = item_with_tiers(vec![tier(10.0, 100.0), tier(20.0, 90.0)]);

    let m = identify_price_tier(&item, 5.0, 1).expect("tier for 5");
    assert_eq!(m.range, "1 - 10");
    assert_eq!(m.price, 100.0);

    let m = identify_price_tier(&item, 15.0, 1).expect("tier for 15");
    assert_eq!(m.range, "11 - 20");
    assert_eq!(m.price, 90.0);

    let m = identify_price_tier(&item, 25.0, 1).expect("tier for 25");
    assert_eq!(m.price, 90.0);
    assert_eq!(m.tier.map(|t| t.max), Some(20.0));
}

#[test]
fn boundary_quantity_stays_in_lower_tier() {
    let item = item_with_tiers(vec![tier(10.0, 100.0), tier(20.0, 90.0)]);
    let m = identify_price_tier(&item, 10.0, 1).expect("tier for 10");
    assert_eq!(m.price, 100.0);
    let m = identify_price_tier(&item, 10.5, 1).expect("tier for 10.5");
    assert_eq!(m.price, 90.0);
}

#[test]
fn item_without_tiers_uses_flat_price() {
    let item = item_with_tiers(Vec::new());
    let m = identify_price_tier(&item, 7.0, 1).expect("general match");
    assert_eq!(m.range, GENERAL_RANGE);
    assert!(m.tier.is_none());
    assert_eq!(m.price, 55.0);
}

#[test]
fn tiers_without_a_bound_are_ignored() {
    let item = item_with_tiers(vec![tier(0.0, 999.0), tier(30.0, 70.0)]);
    let m = identify_price_tier(&item, 12.0, 1).expect("match");
    assert_eq!(m.range, "1 - 30");
    assert_eq!(m.price, 70.0);
}

#[test]
fn layer_price_overrides_tier_price() {
    let mut by_layer = BTreeMap::new();
    by_layer.insert("2".to_string(), 130.0);
    let item = item_with_tiers(vec![PriceTier {
        max: 50.0,
        price: 80.0,
        prices_by_layer: by_layer,
    }]);
    assert_eq!(identify_price_tier(&item, 20.0, 1).expect("one coat").price, 80.0);
    assert_eq!(identify_price_tier(&item, 20.0, 2).expect("two coats").price, 130.0);
}

#[test]
fn unpriced_tiers_fall_back_to_flat_price() {
    let item = item_with_tiers(vec![tier(10.0, 0.0), tier(20.0, 0.0)]);
    let m = identify_price_tier(&item, 15.0, 1).expect("match");
    assert_eq!(m.price, 55.0);
}

#[test]
fn tiers_parse_from_catalog_json() {
    let item: CatalogItem = serde_json::from_value(serde_json::json!({
        "id": "json-tiers",
        "name": "From JSON",
        "priceTiers": [
            { "maxArea": 20, "pricePerUnit": 90 },
            { "max": 10, "price": 100 }
        ]
    }))
    .expect("parse item");
    assert!(item.is_active);
    let m = identify_price_tier(&item, 15.0, 1).expect("match");
    assert_eq!(m.range, "11 - 20");
    assert_eq!(m.price, 90.0);
}
