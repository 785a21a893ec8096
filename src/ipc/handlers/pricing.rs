use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::handlers::{catalog, setup};
use crate::ipc::helpers::{
    layers_param, opt_f64, parse_param, require_db, require_f64, require_str, require_trade,
};
use crate::ipc::types::{AppState, Request};
use crate::pricing::{self, CatalogItem, MetricsOptions, PaintOptions, PanelDefaults};
use serde_json::{json, Value};

/// The item to price: inline `params.item`, or `params.trade` + `params.itemId`
/// looked up in the workspace catalog.
fn resolve_item(state: &AppState, req: &Request) -> Result<CatalogItem, Value> {
    if req.params.get("item").is_some() {
        let item: CatalogItem = parse_param(req, "item")?;
        item.validate().map_err(|e| calc_err(&req.id, e))?;
        return Ok(item);
    }
    let conn = require_db(state, req)?;
    let trade = require_trade(req)?;
    let item_id = require_str(req, "itemId")?;
    match catalog::find_item(conn, trade, item_id) {
        Ok(Some(item)) => Ok(item),
        Ok(None) => Err(err(
            &req.id,
            "not_found",
            "catalog item not found",
            Some(json!({ "trade": trade, "itemId": item_id })),
        )),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn to_json<T: serde::Serialize>(req: &Request, v: &T) -> Value {
    match serde_json::to_value(v) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_identify_tier(state: &mut AppState, req: &Request) -> Value {
    let item = try_param!(resolve_item(state, req));
    let quantity = try_param!(require_f64(req, "quantity"));
    let layers = try_param!(layers_param(req));
    to_json(req, &pricing::identify_price_tier(&item, quantity, layers))
}

fn handle_item_metrics(state: &mut AppState, req: &Request) -> Value {
    let item = try_param!(resolve_item(state, req));
    let quantity = try_param!(require_f64(req, "quantity"));
    let layers = try_param!(layers_param(req));
    let apply_fixed_cost = req
        .params
        .get("applyFixedCost")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let opts = MetricsOptions {
        layers,
        apply_fixed_cost,
    };
    to_json(req, &pricing::item_metrics_for_quantity(&item, quantity, &opts))
}

fn handle_paint_contractor_costs(state: &mut AppState, req: &Request) -> Value {
    let item = try_param!(resolve_item(state, req));
    let quantity = try_param!(require_f64(req, "quantity"));
    let layers = try_param!(layers_param(req));
    to_json(req, &pricing::paint_contractor_costs(&item, quantity, layers))
}

fn paint_options(state: &AppState, req: &Request) -> Result<PaintOptions, Value> {
    let (mut round_buckets, mut round_work_days) = (true, false);
    if let Some(conn) = state.db.as_ref() {
        match setup::paint_rounding(conn) {
            Ok(v) => (round_buckets, round_work_days) = v,
            Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
        }
    }
    if let Some(v) = req.params.get("roundBuckets").and_then(|v| v.as_bool()) {
        round_buckets = v;
    }
    if let Some(v) = req.params.get("roundWorkDays").and_then(|v| v.as_bool()) {
        round_work_days = v;
    }
    let difficulty_multiplier = opt_f64(req, "difficultyMultiplier")?.unwrap_or(1.0);
    if difficulty_multiplier <= 0.0 {
        return Err(err(
            &req.id,
            "bad_params",
            "params.difficultyMultiplier must be greater than 0",
            None,
        ));
    }
    Ok(PaintOptions {
        layers: layers_param(req)?,
        round_buckets,
        round_work_days,
        difficulty_multiplier,
    })
}

fn handle_exact_paint_metrics(state: &mut AppState, req: &Request) -> Value {
    let item = try_param!(resolve_item(state, req));
    let square_meters = try_param!(require_f64(req, "squareMeters"));
    let opts = try_param!(paint_options(state, req));
    to_json(req, &pricing::exact_paint_metrics(&item, square_meters, &opts))
}

fn handle_paint_metrics(state: &mut AppState, req: &Request) -> Value {
    let item = try_param!(resolve_item(state, req));
    let square_meters = try_param!(require_f64(req, "squareMeters"));
    let opts = try_param!(paint_options(state, req));
    let profit_percent = match opt_f64(req, "profitPercent") {
        Ok(Some(p)) => p,
        Ok(None) => match (item.desired_profit_percent, state.db.as_ref()) {
            (Some(p), _) => p,
            (None, Some(conn)) => {
                match setup::trade_profit_percent(conn, pricing::Trade::Paint) {
                    Ok(p) => p,
                    Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                }
            }
            (None, None) => 0.0,
        },
        Err(resp) => return resp,
    };
    to_json(
        req,
        &pricing::paint_metrics(&item, square_meters, &opts, profit_percent),
    )
}

fn handle_panel_costs(state: &mut AppState, req: &Request) -> Value {
    let item = try_param!(resolve_item(state, req));
    let linear_meters = try_param!(require_f64(req, "linearMeters"));
    let defaults = match state.db.as_ref() {
        Some(conn) => match setup::panel_defaults(conn) {
            Ok(d) => d,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        None => PanelDefaults::default(),
    };
    let settings = pricing::panel_settings(&item, &defaults);
    let costs = pricing::panel_costs(&item, linear_meters, &defaults);
    ok(
        &req.id,
        json!({
            "supportsPanel": pricing::supports_panel(&item),
            "settings": settings,
            "settingsValid": settings.map(|s| s.is_valid()).unwrap_or(false),
            "quickPrice": pricing::panel_quick_price(&item, linear_meters, &defaults),
            "costs": costs,
        }),
    )
}

fn handle_tiling_metrics(state: &mut AppState, req: &Request) -> Value {
    let item = try_param!(resolve_item(state, req));
    let area = try_param!(require_f64(req, "area"));
    to_json(req, &pricing::tiling_metrics(&item, area))
}

fn handle_profit_guard(_state: &mut AppState, req: &Request) -> Value {
    let revenue = try_param!(require_f64(req, "revenue"));
    let cost = try_param!(require_f64(req, "cost"));
    let minimum = try_param!(opt_f64(req, "minimumPercent"))
        .unwrap_or(pricing::DEFAULT_MINIMUM_PROFIT_PERCENT);
    to_json(req, &pricing::check_profit_margin(revenue, cost, minimum))
}

fn handle_client_price(_state: &mut AppState, req: &Request) -> Value {
    let cost = try_param!(require_f64(req, "cost"));
    let profit_percent = try_param!(require_f64(req, "profitPercent"));
    ok(
        &req.id,
        json!({ "clientPrice": pricing::client_price(cost, profit_percent) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "pricing.identifyTier" => Some(handle_identify_tier(state, req)),
        "pricing.itemMetrics" => Some(handle_item_metrics(state, req)),
        "pricing.paintContractorCosts" => Some(handle_paint_contractor_costs(state, req)),
        "pricing.exactPaintMetrics" => Some(handle_exact_paint_metrics(state, req)),
        "pricing.paintMetrics" => Some(handle_paint_metrics(state, req)),
        "pricing.panelCosts" => Some(handle_panel_costs(state, req)),
        "pricing.tilingMetrics" => Some(handle_tiling_metrics(state, req)),
        "pricing.profitGuard" => Some(handle_profit_guard(state, req)),
        "pricing.clientPrice" => Some(handle_client_price(state, req)),
        _ => None,
    }
}
