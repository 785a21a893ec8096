use crate::catalog;
use crate::db;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{parse_param, require_db, require_trade};
use crate::ipc::types::{AppState, Request};
use crate::pricing::{client_price, CatalogItem, Trade};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;

fn catalog_key(trade: Trade) -> String {
    format!("catalog.{}", trade.as_str())
}

fn read_catalog(conn: &Connection, trade: Trade) -> anyhow::Result<Vec<CatalogItem>> {
    match db::settings_get_json(conn, &catalog_key(trade))? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(Vec::new()),
    }
}

fn write_catalog(conn: &Connection, trade: Trade, items: &[CatalogItem]) -> anyhow::Result<()> {
    db::settings_set_json(conn, &catalog_key(trade), &serde_json::to_value(items)?)
}

/// The trade's catalog, with missing defaults merged in and persisted.
pub fn load_catalog(conn: &Connection, trade: Trade) -> anyhow::Result<Vec<CatalogItem>> {
    let existing = read_catalog(conn, trade)?;
    let profit = setup::trade_profit_percent(conn, trade)?;
    let (merged, added) = catalog::merge_defaults(existing, trade, profit);
    if added > 0 {
        write_catalog(conn, trade, &merged)?;
        tracing::info!(trade = trade.as_str(), added, "seeded catalog defaults");
    }
    Ok(merged)
}

pub fn find_item(
    conn: &Connection,
    trade: Trade,
    item_id: &str,
) -> anyhow::Result<Option<CatalogItem>> {
    Ok(load_catalog(conn, trade)?
        .into_iter()
        .find(|i| i.id == item_id))
}

fn handle_catalog_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let trade = match require_trade(req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let include_inactive = req
        .params
        .get("includeInactive")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    match load_catalog(conn, trade) {
        Ok(items) => {
            let items: Vec<CatalogItem> = items
                .into_iter()
                .filter(|i| include_inactive || i.is_active)
                .collect();
            ok(&req.id, json!({ "trade": trade, "items": items }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_catalog_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let trade = match require_trade(req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let mut items: Vec<CatalogItem> = match parse_param(req, "items") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let profit = match setup::trade_profit_percent(conn, trade) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut seen: HashSet<String> = HashSet::new();
    for item in items.iter_mut() {
        if item.id.trim().is_empty() {
            item.id = uuid::Uuid::new_v4().to_string();
        }
        if !seen.insert(item.id.clone()) {
            return err(
                &req.id,
                "bad_params",
                "duplicate item id",
                Some(json!({ "itemId": item.id })),
            );
        }
        if item.name.trim().is_empty() {
            return err(
                &req.id,
                "bad_params",
                "item name must not be empty",
                Some(json!({ "itemId": item.id })),
            );
        }
        if let Err(e) = item.validate() {
            return calc_err(&req.id, e);
        }
        if let (Some(cost), None) = (item.contractor_cost_per_unit, item.client_price_per_unit) {
            item.client_price_per_unit = Some(client_price(cost, profit));
        }
    }

    if let Err(e) = write_catalog(conn, trade, &items) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(trade = trade.as_str(), count = items.len(), "catalog saved");
    ok(&req.id, json!({ "trade": trade, "items": items }))
}

fn handle_catalog_trades(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let trades: Vec<serde_json::Value> = Trade::ALL
        .iter()
        .map(|t| {
            json!({
                "trade": t,
                "categoryId": t.category_id(),
                "label": t.label(),
                "subcontracted": t.is_subcontracted(),
            })
        })
        .collect();
    ok(&req.id, json!({ "trades": trades }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalog.list" => Some(handle_catalog_list(state, req)),
        "catalog.save" => Some(handle_catalog_save(state, req)),
        "catalog.trades" => Some(handle_catalog_trades(state, req)),
        _ => None,
    }
}
