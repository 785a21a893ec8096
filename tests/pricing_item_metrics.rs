#[path = "../src/pricing.rs"]
mod pricing;
#[path = "../src/quote.rs"]
mod quote;

use pricing::{
    check_profit_margin, client_price, item_metrics_for_quantity, CatalogItem, MetricsOptions, PriceTier,
    PricingMethod, Trade,
};
use quote::{price_quote_item, quote_totals, AdditionalCost, Quote, QuoteItem};
use std::collections::BTreeMap;

fn opts(layers: u32) -> MetricsOptions {
    MetricsOptions {
        layers,
        apply_fixed_cost: true,
    }
}

#[test]
fn profit_percent_on_cost_of_100_prices_at_120() {
    let item = CatalogItem {
        id: "pp".into(),
        bucket_price: 100.0,
        coverage: 10.0,
        desired_profit_percent: Some(20.0),
        ..Default::default()
    };
    let m = item_metrics_for_quantity(&item, 10.0, &opts(1)).expect("metrics");
    assert_eq!(m.total_contractor_cost, 100.0);
    assert_eq!(m.total_customer_price, 120.0);
    assert_eq!(m.total_profit, 20.0);
    assert_eq!(m.profit_percent, Some(20.0));
    assert_eq!(m.pricing_method, PricingMethod::ProfitPercent);
}

#[test]
fn partial_buckets_are_charged_whole() {
    let item = CatalogItem {
        id: "buckets".into(),
        bucket_price: 50.0,
        coverage: 10.0,
        daily_output: 10.0,
        worker_daily_cost: 300.0,
        desired_profit_percent: Some(10.0),
        ..Default::default()
    };
    let m = item_metrics_for_quantity(&item, 25.0, &opts(1)).expect("metrics");
    assert_eq!(m.buckets_needed, 3.0);
    assert_eq!(m.material_cost_total, 150.0);
    assert_eq!(m.raw_work_days, 2.5);
    assert_eq!(m.work_days, 3.0);
    assert_eq!(m.labor_cost_total, 900.0);
}

#[test]
fn customer_price_never_drops_below_cost() {
    let cases = [
        (0.0, 0.0, 0.0, 1.0),
        (200.0, 5.0, 800.0, 3.0),
        (90.0, 12.0, 450.0, 40.0),
        (10.0, 100.0, 0.0, 250.0),
    ];
    for (bucket_price, coverage, day_cost, qty) in cases {
        let item = CatalogItem {
            id: "cheap".into(),
            bucket_price,
            coverage,
            daily_output: 20.0,
            worker_daily_cost: day_cost,
            fixed_project_cost: 150.0,
            price_tiers: vec![PriceTier {
                max: 1000.0,
                price: 1.0,
                prices_by_layer: BTreeMap::new(),
            }],
            ..Default::default()
        };
        for layers in 1..=3 {
            let m = item_metrics_for_quantity(&item, qty, &opts(layers)).expect("metrics");
            assert!(
                m.total_customer_price >= m.total_contractor_cost,
                "price {} below cost {} for qty {} layers {}",
                m.total_customer_price,
                m.total_contractor_cost,
                qty,
                layers
            );
            assert!(m.total_profit >= 0.0);
        }
    }
}

#[test]
fn layers_multiply_material_and_labor() {
    let item = CatalogItem {
        id: "coats".into(),
        bucket_price: 100.0,
        coverage: 20.0,
        daily_output: 40.0,
        worker_daily_cost: 400.0,
        desired_profit_percent: Some(30.0),
        ..Default::default()
    };
    let one = item_metrics_for_quantity(&item, 40.0, &opts(1)).expect("one coat");
    let two = item_metrics_for_quantity(&item, 40.0, &opts(2)).expect("two coats");
    assert_eq!(one.buckets_needed, 2.0);
    assert_eq!(two.buckets_needed, 4.0);
    assert_eq!(one.work_days, 1.0);
    assert_eq!(two.work_days, 2.0);
}

#[test]
fn fixed_costs_can_be_excluded() {
    let item = CatalogItem {
        id: "fixed".into(),
        equipment_cost: 40.0,
        fixed_project_cost: 60.0,
        desired_profit_percent: Some(50.0),
        ..Default::default()
    };
    let with = item_metrics_for_quantity(&item, 1.0, &opts(1)).expect("with fixed");
    let without = item_metrics_for_quantity(
        &item,
        1.0,
        &MetricsOptions {
            layers: 1,
            apply_fixed_cost: false,
        },
    )
    .expect("without fixed");
    assert_eq!(with.total_contractor_cost, 100.0);
    assert_eq!(without.total_contractor_cost, 0.0);
}

#[test]
fn tier_priced_item_without_cost_has_open_profit_percent() {
    let item = CatalogItem {
        id: "free".into(),
        customer_price: Some(30.0),
        ..Default::default()
    };
    let m = item_metrics_for_quantity(&item, 4.0, &opts(1)).expect("metrics");
    assert_eq!(m.pricing_method, PricingMethod::Tiers);
    assert_eq!(m.total_customer_price, 120.0);
    assert_eq!(m.profit_percent, None);
    assert!(item_metrics_for_quantity(&item, 0.0, &opts(1)).is_none());
}

#[test]
fn tiling_line_uses_trade_profit_when_item_has_none() {
    let item = CatalogItem {
        id: "tile".into(),
        name: "Floor tiles".into(),
        unit: "m2".into(),
        material_cost: 100.0,
        wastage_percent: 10.0,
        daily_output: 20.0,
        labor_cost_per_day: 800.0,
        ..Default::default()
    };
    let line = price_quote_item(&item, Trade::Tiling, 20.0, 1, Some(50.0)).expect("tiling line");
    // 20 m² * 1.1 * 100 = 2200 materials, one day of labor.
    assert_eq!(line.material_cost, 2200.0);
    assert_eq!(line.labor_cost, 800.0);
    assert_eq!(line.total_cost, 3000.0);
    assert_eq!(line.total_price, 4500.0);
    assert_eq!(line.category_id, "cat_tiling");
}

fn quote_with(items: Vec<QuoteItem>) -> Quote {
    serde_json::from_value::<Quote>(serde_json::json!({
        "id": "q1",
        "projectName": "Kitchen",
        "createdAt": "2026-05-01"
    }))
    .map(|mut q| {
        q.items = items;
        q
    })
    .expect("quote")
}

fn line(price: f64, cost: f64) -> QuoteItem {
    QuoteItem {
        total_price: price,
        total_cost: cost,
        ..Default::default()
    }
}

#[test]
fn totals_apply_increase_then_discount() {
    let mut q = quote_with(vec![line(1000.0, 600.0), line(500.0, 300.0)]);
    q.additional_costs.push(AdditionalCost {
        description: "Skip hire".into(),
        cost: 500.0,
        contractor_cost: Some(400.0),
    });
    q.price_increase_percent = 10.0;
    q.discount_percent = 5.0;

    let t = quote_totals(&q);
    assert_eq!(t.subtotal, 2000.0);
    assert_eq!(t.price_increase_amount, 200.0);
    assert_eq!(t.discount_amount, 110.0);
    assert_eq!(t.total, 2090.0);
    assert_eq!(t.total_contractor_cost, 1300.0);
    assert_eq!(t.profit, 790.0);
    assert!(!t.is_low_profit);

    q.refresh_totals();
    assert_eq!(q.total_price, 2090.0);
    assert_eq!(q.total_cost, 1300.0);
}

#[test]
fn thin_margin_is_flagged() {
    let q = quote_with(vec![line(1100.0, 1000.0)]);
    let t = quote_totals(&q);
    assert!(t.is_low_profit);

    let guard = check_profit_margin(t.total, t.total_contractor_cost, 30.0).expect("guard");
    assert!(guard.needs_adjustment);
    assert_eq!(guard.recommended_price, Some(1300.0));
    assert!(check_profit_margin(0.0, 100.0, 30.0).is_none());
}

#[test]
fn out_of_range_discount_is_rejected() {
    let mut q = quote_with(Vec::new());
    q.discount_percent = 120.0;
    let e = q.validate().expect_err("discount over 100");
    assert_eq!(e.code, "bad_params");
}

#[test]
fn client_price_rounds_and_never_goes_negative() {
    assert_eq!(client_price(100.0, 40.0), 140.0);
    assert_eq!(client_price(120.0, 40.0), 168.0);
    assert_eq!(client_price(10.5, 0.0), 11.0);
    assert_eq!(client_price(100.0, -150.0), 0.0);
    assert_eq!(client_price(f64::NAN, 40.0), 0.0);
}
