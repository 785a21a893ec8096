#[path = "../src/keys.rs"]
mod keys;

use serde_json::json;

#[test]
fn single_keys_convert_both_ways() {
    assert_eq!(keys::to_snake_case("desiredProfitPercent"), "desired_profit_percent");
    assert_eq!(keys::to_camel_case("desired_profit_percent"), "desiredProfitPercent");
    assert_eq!(keys::to_snake_case("already_snake"), "already_snake");
    assert_eq!(keys::to_camel_case("plain"), "plain");
}

#[test]
fn nested_objects_and_arrays_are_mapped() {
    let camel = json!({
        "expenseTiming": { "labor": { "type": "offset_from_category_end", "offsetDays": 2 } },
        "priceTiers": [ { "maxArea": 10, "pricesByLayer": { "2": 40 } } ]
    });
    let snake = keys::keys_to_snake(camel.clone());
    assert_eq!(snake["expense_timing"]["labor"]["offset_days"], 2);
    // Values are never touched.
    assert_eq!(snake["expense_timing"]["labor"]["type"], "offset_from_category_end");
    assert_eq!(snake["price_tiers"][0]["max_area"], 10);
    assert_eq!(snake["price_tiers"][0]["prices_by_layer"]["2"], 40);

    assert_eq!(keys::keys_to_camel(snake), camel);
}

#[test]
fn scalars_pass_through() {
    assert_eq!(keys::keys_to_camel(json!(12.5)), json!(12.5));
    assert_eq!(keys::keys_to_snake(json!("someValue")), json!("someValue"));
}
